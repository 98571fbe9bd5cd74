use std::error::Error;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use traceview::{
    MultiscaleSource, Range, RenderCommand, SegmentRequest, SegmentedSignalStore, SignalHandle,
    TimeseriesView, TraceviewConfig,
};

fn main() -> Result<(), Box<dyn Error>> {
    let channels: Vec<Vec<f32>> = (0..8)
        .map(|c| {
            (0..200_000)
                .map(|i| ((i as f32) * 0.002 * (c + 1) as f32).sin())
                .collect()
        })
        .collect();
    let source = MultiscaleSource::new(30_000.0, channels, None)?;

    let handle = SignalHandle::new(SegmentedSignalStore::new(source.descriptor()));
    let requests: Arc<Mutex<Vec<SegmentRequest>>> = Arc::default();
    {
        let requests = Arc::clone(&requests);
        handle.write(|store| {
            store.on_request_segment(move |request: &SegmentRequest| {
                if let Ok(mut queue) = requests.lock() {
                    queue.push(*request);
                }
            })
        });
    }

    let mut view = TimeseriesView::new(handle, TraceviewConfig::default());
    let mut now = Instant::now();
    view.set_size(960.0, 540.0, now);
    view.set_channel_layout(source.channel_layout(10_000), now);
    view.set_time_range(Range::new(0.0, 60_000.0), now);

    let mut served = 0;
    loop {
        let painted = view.poll(now);
        if !painted.is_empty() {
            println!("painted {} layers", painted.len());
        }
        let pending = match requests.lock() {
            Ok(mut queue) => std::mem::take(&mut *queue),
            Err(_) => break,
        };
        view.handle().write(|store| {
            for request in &pending {
                if source.fulfill(store, *request).is_ok() {
                    served += 1;
                }
            }
        });
        match view.next_deadline() {
            Some(at) => now = now.max(at),
            None => break,
        }
    }
    println!("served {served} segments, complete: {:?}", view.last_paint_complete());

    view.jump_to_time(150_000.0, now + Duration::from_millis(20));
    let exported = view.export();
    let rects = exported
        .commands()
        .iter()
        .filter(|c| matches!(c, RenderCommand::Rect { .. }))
        .count();
    println!(
        "export: {} commands, {} polylines, {} rects, labels {:?}",
        exported.commands().len(),
        exported.polyline_count(),
        rects,
        exported.texts().collect::<Vec<_>>()
    );
    Ok(())
}
