//! Channel panels and trace rendering.
//!
//! A [`Panel`] is the horizontal band one channel is drawn into. The
//! [`ChannelPanelRenderer`] reads the channel's buckets from the store and
//! strokes them, either as a polyline at full resolution or as min/max
//! envelope strokes when downsampled.

use std::fmt;
use std::sync::{Arc, LazyLock};

use crate::canvas::{Color, LineStyle, Painter, PainterPath, Space};
use crate::geom::Margins;
use crate::signal::{ChannelDataOptions, SegmentedSignalStore};
use crate::view::{Range, Viewport};

/// Trace colors, cycled by channel index.
pub const CHANNEL_COLORS: [Color; 4] = [
    Color::rgb8(80, 80, 80),
    Color::rgb8(104, 42, 42),
    Color::rgb8(42, 104, 42),
    Color::rgb8(42, 42, 152),
];

const TRACE_WIDTH: f32 = 1.0;
const HIGHLIGHT_WIDTH: f32 = 6.0;

static DEFAULT_PAINTER: LazyLock<Arc<dyn PanelPaint>> =
    LazyLock::new(|| Arc::new(ChannelPanelRenderer));

/// Trace color of a channel.
pub fn channel_color(channel: usize) -> Color {
    CHANNEL_COLORS[channel % CHANNEL_COLORS.len()]
}

/// Draws the contents of one panel.
///
/// The painter passed in covers the whole trace area; implementations place
/// themselves with [`Panel::margins`]. Exports must not queue fetches.
pub trait PanelPaint: fmt::Debug + Send + Sync {
    /// Paint `panel` and report whether all of its data was available.
    fn paint(
        &self,
        painter: &mut Painter<'_>,
        store: &mut SegmentedSignalStore,
        panel: &Panel,
        params: &TraceParams,
    ) -> TraceCompleteness;
}

/// One channel's band in the trace area.
#[derive(Debug, Clone)]
pub struct Panel {
    /// Channel drawn in this panel.
    pub channel: usize,
    /// Label, absent when thinned out.
    pub label: Option<String>,
    /// Whether the channel is selected.
    pub selected: bool,
    /// Vertical pixel extent, top to bottom.
    pub pixel_range: Range,
    /// Data values mapped onto the pixel extent.
    pub coord_y: Range,
    /// Paints this panel.
    pub painter: Arc<dyn PanelPaint>,
}

impl PartialEq for Panel {
    fn eq(&self, other: &Self) -> bool {
        self.channel == other.channel
            && self.label == other.label
            && self.selected == other.selected
            && self.pixel_range == other.pixel_range
            && self.coord_y == other.coord_y
            && Arc::ptr_eq(&self.painter, &other.painter)
    }
}

impl Panel {
    /// Create a panel with the default `[-1, 1]` value range, painted by a
    /// shared [`ChannelPanelRenderer`].
    pub fn new(channel: usize, pixel_range: Range) -> Self {
        Self {
            channel,
            label: None,
            selected: false,
            pixel_range,
            coord_y: Range::new(-1.0, 1.0),
            painter: Arc::clone(&DEFAULT_PAINTER),
        }
    }

    /// Replace the panel painter.
    pub fn with_painter(mut self, painter: Arc<dyn PanelPaint>) -> Self {
        self.painter = painter;
        self
    }

    /// Set the label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the selected flag.
    pub fn with_selected(mut self, selected: bool) -> Self {
        self.selected = selected;
        self
    }

    /// Margins placing this panel inside a surface of `height` pixels.
    pub fn margins(&self, left: f32, right: f32, height: f32) -> Margins {
        Margins::new(
            left,
            right,
            self.pixel_range.min as f32,
            height - self.pixel_range.max as f32,
        )
    }
}

/// Whether every bucket of a painted trace was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceCompleteness {
    /// All buckets were cached.
    Complete,
    /// Some buckets are still being fetched.
    Incomplete,
}

impl TraceCompleteness {
    /// Combine the completeness of two traces.
    pub fn and(self, other: Self) -> Self {
        if self == Self::Complete && other == Self::Complete {
            Self::Complete
        } else {
            Self::Incomplete
        }
    }
}

/// How a trace is read and placed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraceParams {
    /// Visible time range in timepoints.
    pub time_range: Range,
    /// Downsample factor to read at.
    pub ds: usize,
    /// Additive offset of the channel.
    pub offset: f32,
    /// Multiplier applied after the offset.
    pub scale: f64,
    /// Draw the selection highlight for selected panels.
    pub highlight_selected: bool,
}

/// Paints channel traces.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChannelPanelRenderer;

impl ChannelPanelRenderer {
    /// Bucket span `[t1b, t2b)` read for a time range at factor `ds`.
    pub fn bucket_span(time_range: Range, ds: usize, num_timepoints: usize) -> (usize, usize) {
        if ds == 0 || !time_range.is_finite() {
            return (0, 0);
        }
        let n = num_timepoints as f64;
        let t1 = time_range.min.floor().clamp(0.0, n) as usize;
        let t2 = (time_range.max + 1.0).floor().clamp(0.0, n) as usize;
        (t1 / ds, t2 / ds)
    }

    /// Build the pen path of buckets read starting at `t1b`.
    ///
    /// Unresolved samples lift the pen; nothing is bridged across them.
    pub fn trace_path(data: &[f32], t1b: usize, ds: usize, offset: f32, scale: f64) -> PainterPath {
        let mut path = PainterPath::new();
        let place = |v: f32| (v + offset) as f64 * scale;
        let mut pen_down = false;
        if ds <= 1 {
            for (i, &v) in data.iter().enumerate() {
                if v.is_nan() {
                    pen_down = false;
                    continue;
                }
                let t = (t1b + i) as f64;
                if pen_down {
                    path.line_to(t, place(v));
                } else {
                    path.move_to(t, place(v));
                    pen_down = true;
                }
            }
        } else {
            for (i, pair) in data.chunks_exact(2).enumerate() {
                let (lo, hi) = (pair[0], pair[1]);
                if lo.is_nan() || hi.is_nan() {
                    pen_down = false;
                    continue;
                }
                let t = ((t1b + i) * ds) as f64;
                if pen_down {
                    path.line_to(t, place(lo));
                } else {
                    path.move_to(t, place(lo));
                    pen_down = true;
                }
                path.line_to(t, place(hi));
            }
        }
        path
    }
}

impl PanelPaint for ChannelPanelRenderer {
    /// Paint one panel's trace.
    ///
    /// Missing buckets are requested from the store and left blank. Exports
    /// read only what is cached.
    fn paint(
        &self,
        painter: &mut Painter<'_>,
        store: &mut SegmentedSignalStore,
        panel: &Panel,
        params: &TraceParams,
    ) -> TraceCompleteness {
        let num_timepoints = store.descriptor().num_timepoints();
        let (t1b, t2b) = Self::bucket_span(params.time_range, params.ds, num_timepoints);
        if t1b >= t2b {
            return TraceCompleteness::Complete;
        }
        let opts = if painter.exporting() {
            ChannelDataOptions::cached_only()
        } else {
            ChannelDataOptions::default()
        };
        let data = store.get_channel_data(panel.channel, t1b, t2b, params.ds, opts);
        let completeness = if data.iter().any(|v| v.is_nan()) {
            TraceCompleteness::Incomplete
        } else {
            TraceCompleteness::Complete
        };
        let path = Self::trace_path(&data, t1b, params.ds, params.offset, params.scale);
        if path.is_empty() {
            return completeness;
        }

        let outer = painter.transform().margins();
        let height = painter.size().1;
        let viewport = Viewport::new(params.time_range, panel.coord_y);
        let margins = panel.margins(outer.left, outer.right, height);
        painter.scoped(viewport, margins, |p| {
            if panel.selected && params.highlight_selected {
                p.draw_path(Space::Data, &path, LineStyle::new(Color::YELLOW, HIGHLIGHT_WIDTH));
            }
            p.draw_path(
                Space::Data,
                &path,
                LineStyle::new(channel_color(panel.channel), TRACE_WIDTH),
            );
        });
        completeness
    }
}

/// Split `[top, bottom]` into `count` equal bands.
pub fn panel_pixel_ranges(count: usize, top: f32, bottom: f32) -> Vec<Range> {
    if count == 0 || !(bottom > top) {
        return Vec::new();
    }
    let step = (bottom - top) as f64 / count as f64;
    (0..count)
        .map(|i| {
            let y0 = top as f64 + step * i as f64;
            Range::new(y0, y0 + step)
        })
        .collect()
}

/// Every how many panels a label is shown.
///
/// At most one label fits per `row_px` of `height`.
pub fn label_stride(count: usize, height: f32, row_px: f32) -> usize {
    let max_labels = if row_px > 0.0 {
        (height / row_px).max(1.0) as f64
    } else {
        1.0
    };
    ((count as f64 / max_labels).ceil() as usize).max(1)
}

/// Order to paint `n` panels in so any prefix covers the view evenly.
///
/// Starts with a stride of `n / 2`, halving it each time the walk wraps.
pub fn paint_order(n: usize) -> Vec<usize> {
    let mut order = Vec::with_capacity(n);
    let mut used = vec![false; n];
    let mut increment = (n / 2).max(1);
    let mut cur = 0;
    while order.len() < n {
        if cur >= n {
            cur = 0;
            increment = (increment / 2).max(1);
        }
        if !used[cur] {
            used[cur] = true;
            order.push(cur);
        }
        cur += increment;
    }
    order
}

/// Build the panels for the displayed channels.
///
/// `channels` lists the displayed channel indices top to bottom, `labels`
/// holds a label per channel index and `is_selected` reports selection.
pub fn build_panels(
    channels: &[usize],
    labels: &[String],
    is_selected: impl Fn(usize) -> bool,
    top: f32,
    bottom: f32,
    label_every: usize,
) -> Vec<Panel> {
    let stride = label_every.max(1);
    panel_pixel_ranges(channels.len(), top, bottom)
        .into_iter()
        .zip(channels)
        .enumerate()
        .map(|(i, (pixels, &channel))| {
            let mut panel = Panel::new(channel, pixels).with_selected(is_selected(channel));
            if i % stride == 0 {
                panel.label = Some(
                    labels
                        .get(channel)
                        .cloned()
                        .unwrap_or_else(|| channel.to_string()),
                );
            }
            panel
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{RenderCommand, RenderList, TextStyle};
    use crate::signal::SignalDescriptor;
    use crate::transform::Transform;

    fn runs(path: &PainterPath) -> Vec<Vec<(f64, f64)>> {
        path.runs()
            .iter()
            .map(|run| run.iter().map(|p| (p.x, p.y)).collect())
            .collect()
    }

    #[test]
    fn full_resolution_path_breaks_at_nan() {
        let data = [1.0, 2.0, f32::NAN, 3.0, 4.0];
        let path = ChannelPanelRenderer::trace_path(&data, 10, 1, 0.0, 1.0);
        assert_eq!(
            runs(&path),
            vec![vec![(10.0, 1.0), (11.0, 2.0)], vec![(13.0, 3.0), (14.0, 4.0)]]
        );
    }

    #[test]
    fn envelope_path_strokes_min_to_max() {
        let data = [-1.0, 1.0, -2.0, 2.0, f32::NAN, f32::NAN, 0.0, 0.5];
        let path = ChannelPanelRenderer::trace_path(&data, 2, 3, 1.0, 0.5);
        assert_eq!(
            runs(&path),
            vec![
                vec![(6.0, 0.0), (6.0, 1.0), (9.0, -0.5), (9.0, 1.5)],
                vec![(15.0, 0.5), (15.0, 0.75)],
            ]
        );
    }

    #[test]
    fn bucket_span_clamps_to_data() {
        assert_eq!(ChannelPanelRenderer::bucket_span(Range::new(-5.0, 99.5), 1, 50), (0, 50));
        assert_eq!(ChannelPanelRenderer::bucket_span(Range::new(10.0, 99.0), 3, 1000), (3, 33));
        assert_eq!(ChannelPanelRenderer::bucket_span(Range::new(0.0, 9.0), 0, 1000), (0, 0));
    }

    #[test]
    fn paint_requests_missing_data_and_draws_nothing() {
        let desc = SignalDescriptor::new(1000.0, 2, 1000, 100).unwrap();
        let mut store = SegmentedSignalStore::new(desc);
        let mut list = RenderList::new();
        let transform = Transform::new(
            Viewport::new(Range::new(0.0, 99.0), Range::new(0.0, 1.0)),
            (400.0, 200.0),
            Margins::new(50.0, 10.0, 15.0, 50.0),
        )
        .unwrap();
        let mut painter = Painter::new(&mut list, transform);
        let panel = Panel::new(1, Range::new(15.0, 82.5));
        let params = TraceParams {
            time_range: Range::new(0.0, 99.0),
            ds: 1,
            offset: 0.0,
            scale: 1.0,
            highlight_selected: true,
        };
        let done = ChannelPanelRenderer.paint(&mut painter, &mut store, &panel, &params);
        assert_eq!(done, TraceCompleteness::Incomplete);
        assert!(list.is_empty());
        assert!(store.pending_count() > 0);
    }

    #[test]
    fn export_paint_reads_cache_without_fetching() {
        let desc = SignalDescriptor::new(1000.0, 1, 1000, 100).unwrap();
        let mut store = SegmentedSignalStore::new(desc);
        let mut list = RenderList::for_export();
        let transform = Transform::new(
            Viewport::new(Range::new(0.0, 99.0), Range::new(0.0, 1.0)),
            (400.0, 200.0),
            Margins::new(50.0, 10.0, 15.0, 50.0),
        )
        .unwrap();
        let mut painter = Painter::new(&mut list, transform);
        let panel = Panel::new(0, Range::new(15.0, 150.0));
        let params = TraceParams {
            time_range: Range::new(0.0, 99.0),
            ds: 1,
            offset: 0.0,
            scale: 1.0,
            highlight_selected: false,
        };
        let done = panel.painter.paint(&mut painter, &mut store, &panel, &params);
        assert_eq!(done, TraceCompleteness::Incomplete);
        assert_eq!(store.pending_count(), 0);
    }

    #[derive(Debug)]
    struct Marker;

    impl PanelPaint for Marker {
        fn paint(
            &self,
            painter: &mut Painter<'_>,
            _store: &mut SegmentedSignalStore,
            panel: &Panel,
            _params: &TraceParams,
        ) -> TraceCompleteness {
            painter.draw_text(Space::Pixels, (0.0, panel.pixel_range.min), "marker", TextStyle::default());
            TraceCompleteness::Complete
        }
    }

    #[test]
    fn panels_paint_through_their_own_painter() {
        let desc = SignalDescriptor::new(1000.0, 1, 100, 100).unwrap();
        let mut store = SegmentedSignalStore::new(desc);
        let mut list = RenderList::new();
        let transform = Transform::new(
            Viewport::new(Range::new(0.0, 99.0), Range::new(0.0, 1.0)),
            (400.0, 200.0),
            Margins::new(50.0, 10.0, 15.0, 50.0),
        )
        .unwrap();
        let mut painter = Painter::new(&mut list, transform);
        let marker: Arc<dyn PanelPaint> = Arc::new(Marker);
        let panel = Panel::new(0, Range::new(15.0, 150.0)).with_painter(Arc::clone(&marker));
        assert_ne!(panel, Panel::new(0, Range::new(15.0, 150.0)));
        assert_eq!(Panel::new(0, Range::new(15.0, 150.0)), Panel::new(0, Range::new(15.0, 150.0)));
        let params = TraceParams {
            time_range: Range::new(0.0, 99.0),
            ds: 1,
            offset: 0.0,
            scale: 1.0,
            highlight_selected: false,
        };
        panel.painter.paint(&mut painter, &mut store, &panel, &params);
        assert_eq!(list.texts().collect::<Vec<_>>(), vec!["marker"]);
        assert_eq!(store.pending_count(), 0);
    }

    #[test]
    fn selected_panel_is_highlighted_first() {
        let desc = SignalDescriptor::new(1000.0, 1, 100, 100).unwrap();
        let mut store = SegmentedSignalStore::new(desc);
        store
            .set_segment(1, 0, (0..100).map(|i| (i as f32 / 100.0) - 0.5).collect())
            .unwrap();
        let mut list = RenderList::new();
        let transform = Transform::new(
            Viewport::new(Range::new(0.0, 99.0), Range::new(0.0, 1.0)),
            (400.0, 200.0),
            Margins::new(50.0, 10.0, 15.0, 50.0),
        )
        .unwrap();
        let mut painter = Painter::new(&mut list, transform);
        let panel = Panel::new(0, Range::new(15.0, 150.0)).with_selected(true);
        let params = TraceParams {
            time_range: Range::new(0.0, 99.0),
            ds: 1,
            offset: 0.0,
            scale: 1.0,
            highlight_selected: true,
        };
        let done = ChannelPanelRenderer.paint(&mut painter, &mut store, &panel, &params);
        assert_eq!(done, TraceCompleteness::Complete);
        let widths: Vec<_> = list
            .commands()
            .iter()
            .filter_map(|c| match c {
                RenderCommand::Polyline { style, .. } => Some(style.width),
                _ => None,
            })
            .collect();
        assert_eq!(widths, vec![HIGHLIGHT_WIDTH, TRACE_WIDTH]);
    }

    #[test]
    fn paint_order_interleaves() {
        assert_eq!(paint_order(0), Vec::<usize>::new());
        assert_eq!(paint_order(1), vec![0]);
        assert_eq!(paint_order(5), vec![0, 2, 4, 1, 3]);
        assert_eq!(paint_order(8), vec![0, 4, 2, 6, 1, 3, 5, 7]);
        let mut sorted = paint_order(37);
        sorted.sort_unstable();
        assert_eq!(sorted, (0..37).collect::<Vec<_>>());
    }

    #[test]
    fn labels_are_thinned_to_fit() {
        // 64 channels in 360 px: 20 labels fit, so every 4th channel
        assert_eq!(label_stride(64, 360.0, 18.0), 4);
        assert_eq!(label_stride(10, 360.0, 18.0), 1);
        assert_eq!(label_stride(10, 5.0, 18.0), 10);

        let labels: Vec<String> = (0..6).map(|i| format!("ch{i}")).collect();
        let panels = build_panels(&[0, 1, 2, 3, 4, 5], &labels, |c| c == 2, 15.0, 75.0, 4);
        let shown: Vec<_> = panels.iter().filter_map(|p| p.label.as_deref()).collect();
        assert_eq!(shown, vec!["ch0", "ch4"]);
        assert!(panels[2].selected);
        assert_eq!(panels[1].pixel_range, Range::new(25.0, 35.0));
    }

    #[test]
    fn pixel_ranges_split_evenly() {
        let ranges = panel_pixel_ranges(4, 10.0, 50.0);
        assert_eq!(ranges.len(), 4);
        assert_eq!(ranges[3], Range::new(40.0, 50.0));
        assert!(panel_pixel_ranges(3, 50.0, 10.0).is_empty());
    }
}
