#[cfg(feature = "gpui")]
use std::sync::{Arc, Mutex};
#[cfg(feature = "gpui")]
use std::time::Duration;

#[cfg(feature = "gpui")]
use gpui::{
    AppContext, Application, AsyncWindowContext, Bounds, Timer, WindowBounds, WindowOptions, px,
    size,
};

#[cfg(feature = "gpui")]
use traceview::gpui_backend::GpuiTimeseriesView;
#[cfg(feature = "gpui")]
use traceview::{
    MultiscaleSource, SegmentRequest, SegmentedSignalStore, SignalHandle, TimeseriesView,
    TraceviewConfig,
};

#[cfg(feature = "gpui")]
fn main() {
    let channels: Vec<Vec<f32>> = (0..32)
        .map(|c| {
            (0..2_000_000)
                .map(|i| ((i as f32) * 0.0005 * (1 + c % 5) as f32).sin() * 0.8)
                .collect()
        })
        .collect();
    let source = match MultiscaleSource::new(30_000.0, channels, None) {
        Ok(source) => Arc::new(source),
        Err(err) => {
            eprintln!("cannot build the demo signal: {err}");
            return;
        }
    };

    Application::new().run(move |cx| {
        let options = WindowOptions {
            window_bounds: Some(WindowBounds::Windowed(Bounds::centered(
                None,
                size(px(1100.0), px(700.0)),
                cx,
            ))),
            ..Default::default()
        };

        cx.open_window(options, move |window, cx| {
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

            let mut timeseries = TimeseriesView::new(handle, TraceviewConfig::default());
            timeseries.bind_key("c", |controller| controller.ensure_current_time_visible());
            let view = GpuiTimeseriesView::new(timeseries, cx);
            let signal = view.signal_handle();
            let view_handle = cx.new(|_| view);

            let view_for_task = view_handle.clone();
            window
                .spawn(cx, move |cx: &mut AsyncWindowContext| {
                    let mut cx = cx.clone();
                    async move {
                        loop {
                            // stand-in for a network round trip
                            Timer::after(Duration::from_millis(30)).await;
                            let pending = match requests.lock() {
                                Ok(mut queue) => std::mem::take(&mut *queue),
                                Err(_) => break,
                            };
                            if pending.is_empty() {
                                continue;
                            }
                            signal.write(|store| {
                                for request in pending {
                                    let _ = source.fulfill(store, request);
                                }
                            });
                            cx.update(|_, cx| {
                                view_for_task.update(cx, |_view, view_cx| view_cx.notify());
                            })
                            .ok();
                        }
                    }
                })
                .detach();

            view_handle
        })
        .unwrap();
    });
}

#[cfg(not(feature = "gpui"))]
fn main() {
    eprintln!("Enable the gpui feature to run this demo.");
}
