//! Time axis navigation state.
//!
//! [`TimeAxisController`] owns the visible time range, the cursor, the
//! amplitude scale and the derived downsample factor. Every mutator keeps the
//! state inside the signal's bounds and reports what changed.

use crate::config::NavigationConfig;
use crate::events::{SubscriptionId, Subscribers};
use crate::view::Range;

/// What a controller call changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ViewUpdate {
    /// The time range moved or resized.
    pub time_range_changed: bool,
    /// The cursor moved.
    pub current_time_changed: bool,
    /// The downsample factor changed.
    pub downsample_changed: bool,
    /// The amplitude scale changed.
    pub amplitude_changed: bool,
}

impl ViewUpdate {
    /// Nothing changed.
    pub const NONE: Self = Self {
        time_range_changed: false,
        current_time_changed: false,
        downsample_changed: false,
        amplitude_changed: false,
    };

    /// Check whether nothing changed.
    pub fn is_empty(&self) -> bool {
        *self == Self::NONE
    }

    /// Whether the trace layers need repainting.
    pub fn needs_trace_repaint(&self) -> bool {
        self.time_range_changed || self.downsample_changed || self.amplitude_changed
    }

    /// Combine two updates.
    pub fn merge(self, other: Self) -> Self {
        Self {
            time_range_changed: self.time_range_changed || other.time_range_changed,
            current_time_changed: self.current_time_changed || other.current_time_changed,
            downsample_changed: self.downsample_changed || other.downsample_changed,
            amplitude_changed: self.amplitude_changed || other.amplitude_changed,
        }
    }
}

/// Notification published to controller observers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewEvent {
    /// New visible time range.
    TimeRangeChanged(Range),
    /// New cursor position.
    CurrentTimeChanged(Option<f64>),
    /// New downsample factor.
    DownsampleChanged(usize),
    /// New amplitude scale.
    AmplitudeScaleChanged(f64),
}

/// Discrete navigation commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeAction {
    /// Shift left by a fraction of the span.
    PanLeft,
    /// Shift right by a fraction of the span.
    PanRight,
    /// Narrow the time range.
    ZoomIn,
    /// Widen the time range.
    ZoomOut,
    /// Jump to the start.
    Home,
    /// Jump to the end.
    End,
    /// Enlarge traces.
    AmplitudeUp,
    /// Shrink traces.
    AmplitudeDown,
}

impl TimeAction {
    /// Map a key name to an action.
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "left" | "ArrowLeft" => Some(Self::PanLeft),
            "right" | "ArrowRight" => Some(Self::PanRight),
            "=" | "+" => Some(Self::ZoomIn),
            "-" => Some(Self::ZoomOut),
            "home" | "Home" => Some(Self::Home),
            "end" | "End" => Some(Self::End),
            "up" | "ArrowUp" => Some(Self::AmplitudeUp),
            "down" | "ArrowDown" => Some(Self::AmplitudeDown),
            _ => None,
        }
    }
}

/// Pick the downsample factor for `num_in_view` visible timepoints.
///
/// The result is the smallest power of the configured ratio that brings the
/// bucket count down to the pixel target.
pub fn select_downsample_factor(
    num_in_view: f64,
    width_px: f64,
    num_channels: usize,
    config: &NavigationConfig,
) -> usize {
    let safety = if num_channels > config.dense_channel_threshold {
        config.dense_downsample_safety
    } else {
        config.downsample_safety
    };
    let target = (width_px * safety).max(config.min_target_pixels);
    let ratio = config.downsample_ratio.max(2) as usize;
    if !num_in_view.is_finite() || !(target > 0.0) {
        return 1;
    }
    let mut factor = 1usize;
    while num_in_view / factor as f64 > target && factor < usize::MAX {
        factor = factor.saturating_mul(ratio);
    }
    factor
}

/// Time range, cursor and amplitude state of a timeseries view.
#[derive(Debug)]
pub struct TimeAxisController {
    config: NavigationConfig,
    num_timepoints: usize,
    num_channels: usize,
    width_px: f32,
    time_range: Range,
    current_time: Option<f64>,
    downsample_factor: usize,
    amplitude_scale: f64,
    max_time_span: Option<f64>,
    pan_anchor: Option<Range>,
    observers: Subscribers<ViewEvent>,
}

impl TimeAxisController {
    /// Create a controller for a signal of `num_timepoints` samples.
    pub fn new(num_timepoints: usize, num_channels: usize, config: NavigationConfig) -> Self {
        let max_time_span = config
            .max_samples_in_view
            .map(|budget| budget / num_channels.max(1) as f64);
        let (t1, t2) = config.initial_time_range;
        let mut controller = Self {
            config,
            num_timepoints,
            num_channels,
            width_px: 0.0,
            time_range: Range::new(t1, t2),
            current_time: None,
            downsample_factor: 1,
            amplitude_scale: 1.0,
            max_time_span,
            pan_anchor: None,
            observers: Subscribers::new(),
        };
        let mut initial = controller
            .clamp_range(controller.time_range)
            .unwrap_or(controller.time_range);
        if let Some(max) = controller.max_time_span
            && initial.span() > max
        {
            initial.max = initial.min + max;
        }
        controller.time_range = initial;
        controller.downsample_factor = controller.compute_downsample_factor();
        controller
    }

    /// Visible time range.
    pub fn time_range(&self) -> Range {
        self.time_range
    }

    /// Cursor position.
    pub fn current_time(&self) -> Option<f64> {
        self.current_time
    }

    /// Factor traces are currently read at.
    pub fn downsample_factor(&self) -> usize {
        self.downsample_factor
    }

    /// Amplitude multiplier.
    pub fn amplitude_scale(&self) -> f64 {
        self.amplitude_scale
    }

    /// Number of timepoints of the signal.
    pub fn num_timepoints(&self) -> usize {
        self.num_timepoints
    }

    /// Widest accepted time range.
    pub fn max_time_span(&self) -> Option<f64> {
        self.max_time_span
    }

    /// Override the widest accepted time range.
    pub fn set_max_time_span(&mut self, span: Option<f64>) {
        self.max_time_span = span.filter(|s| s.is_finite() && *s > 0.0);
    }

    /// Register an observer.
    pub fn subscribe(
        &mut self,
        handler: impl FnMut(&ViewEvent) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.observers.subscribe(handler)
    }

    /// Remove an observer.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }

    /// Set the pixel width the traces are drawn into.
    pub fn set_width(&mut self, width_px: f32) -> ViewUpdate {
        if !width_px.is_finite() || width_px == self.width_px {
            return ViewUpdate::NONE;
        }
        self.width_px = width_px.max(0.0);
        self.refresh_downsample()
    }

    /// Set the number of displayed channels, which affects the factor choice.
    pub fn set_num_channels(&mut self, num_channels: usize) -> ViewUpdate {
        if num_channels == self.num_channels {
            return ViewUpdate::NONE;
        }
        self.num_channels = num_channels;
        self.refresh_downsample()
    }

    /// Move the time range into the data, preserving its width when possible.
    ///
    /// Ranges running past the end are shifted to end at `N` and then capped
    /// at the last timepoint; ranges starting before zero are shifted right.
    ///
    /// Rejected without effect when the input is not finite, has no span,
    /// ends up wider than the maximum span, or equals the current range.
    pub fn set_time_range(&mut self, range: Range) -> ViewUpdate {
        let Some(clamped) = self.clamp_range(range) else {
            return ViewUpdate::NONE;
        };
        if let Some(max) = self.max_time_span
            && clamped.span() > max
        {
            tracing::trace!(span = clamped.span(), max, "time range wider than allowed");
            return ViewUpdate::NONE;
        }
        if clamped == self.time_range {
            return ViewUpdate::NONE;
        }
        self.time_range = clamped;
        self.observers.emit(&ViewEvent::TimeRangeChanged(clamped));
        ViewUpdate {
            time_range_changed: true,
            ..self.refresh_downsample()
        }
    }

    /// Place the cursor, clamped to `[0, N-1]`. `None` hides it.
    pub fn set_current_time(&mut self, time: Option<f64>) -> ViewUpdate {
        let clamped = match time {
            Some(t) if t.is_nan() => return ViewUpdate::NONE,
            Some(t) => Some(t.clamp(0.0, self.last_timepoint())),
            None => None,
        };
        if clamped == self.current_time {
            return ViewUpdate::NONE;
        }
        self.current_time = clamped;
        self.observers.emit(&ViewEvent::CurrentTimeChanged(clamped));
        ViewUpdate {
            current_time_changed: true,
            ..ViewUpdate::NONE
        }
    }

    /// Zoom by `factor` (greater than one narrows the range).
    ///
    /// The cursor stays fixed on screen when it is visible; otherwise the
    /// range start does.
    pub fn zoom(&mut self, factor: f64) -> ViewUpdate {
        if !factor.is_finite() || factor <= 0.0 {
            return ViewUpdate::NONE;
        }
        let range = self.time_range;
        let anchor = self
            .current_time
            .filter(|t| range.contains(*t))
            .unwrap_or(range.min);
        let t1 = anchor + (range.min - anchor) / factor;
        let t2 = anchor + (range.max - anchor) / factor;
        self.set_time_range(Range::new(t1, t2))
    }

    /// Shift both the cursor and the range by `dt` timepoints.
    pub fn translate(&mut self, dt: f64) -> ViewUpdate {
        if !dt.is_finite() {
            return ViewUpdate::NONE;
        }
        let cursor = match self.current_time {
            Some(t) => self.set_current_time(Some(t + dt)),
            None => ViewUpdate::NONE,
        };
        cursor.merge(self.set_time_range(self.time_range.translated(dt)))
    }

    /// Multiply the amplitude scale.
    pub fn scale_amplitude(&mut self, factor: f64) -> ViewUpdate {
        if !factor.is_finite() || factor <= 0.0 {
            return ViewUpdate::NONE;
        }
        let next = self.amplitude_scale * factor;
        if !(next.is_finite() && next > 0.0) || next == self.amplitude_scale {
            return ViewUpdate::NONE;
        }
        self.amplitude_scale = next;
        self.observers.emit(&ViewEvent::AmplitudeScaleChanged(next));
        ViewUpdate {
            amplitude_changed: true,
            ..ViewUpdate::NONE
        }
    }

    /// Recenter the range on the cursor when the cursor is off screen.
    pub fn ensure_current_time_visible(&mut self) -> ViewUpdate {
        let Some(t) = self.current_time else {
            return ViewUpdate::NONE;
        };
        if self.time_range.min < t && t < self.time_range.max {
            return ViewUpdate::NONE;
        }
        self.set_time_range(self.time_range.recentered(t))
    }

    /// Move the cursor to the range midpoint when it is off screen.
    pub fn ensure_current_time_in_range(&mut self) -> ViewUpdate {
        let Some(t) = self.current_time else {
            return ViewUpdate::NONE;
        };
        if self.time_range.min < t && t < self.time_range.max {
            return ViewUpdate::NONE;
        }
        self.set_current_time(Some(self.time_range.center()))
    }

    /// Apply a navigation command.
    pub fn apply_action(&mut self, action: TimeAction) -> ViewUpdate {
        let span = self.time_range.span();
        match action {
            TimeAction::PanLeft => self.translate(-span * self.config.pan_fraction),
            TimeAction::PanRight => self.translate(span * self.config.pan_fraction),
            TimeAction::ZoomIn => self.zoom(self.config.zoom_ratio),
            TimeAction::ZoomOut => self.zoom(1.0 / self.config.zoom_ratio),
            TimeAction::Home => {
                let from = self.current_time.unwrap_or(self.time_range.min);
                self.translate(-from)
            }
            TimeAction::End => {
                let from = self.current_time.unwrap_or(self.time_range.max);
                self.translate(self.num_timepoints as f64 - from)
            }
            TimeAction::AmplitudeUp => self.scale_amplitude(self.config.amplitude_ratio),
            TimeAction::AmplitudeDown => self.scale_amplitude(1.0 / self.config.amplitude_ratio),
        }
    }

    /// Capture the current range as the anchor of a pan gesture.
    pub fn begin_pan(&mut self) {
        self.pan_anchor = Some(self.time_range);
    }

    /// Whether a pan gesture is in progress.
    pub fn is_panning(&self) -> bool {
        self.pan_anchor.is_some()
    }

    /// Move the range captured by [`begin_pan`](Self::begin_pan).
    ///
    /// `anchor_time` and `pointer_time` are the times under the press and
    /// the current pointer; the range follows the pointer.
    pub fn pan(&mut self, anchor_time: f64, pointer_time: f64) -> ViewUpdate {
        let Some(anchor) = self.pan_anchor else {
            return ViewUpdate::NONE;
        };
        let dt = anchor_time - pointer_time;
        if !dt.is_finite() {
            return ViewUpdate::NONE;
        }
        self.set_time_range(anchor.translated(dt))
    }

    /// Finish a pan gesture.
    pub fn end_pan(&mut self) {
        self.pan_anchor = None;
    }

    /// Apply the action bound to a key name, if any.
    pub fn handle_key(&mut self, key: &str) -> Option<ViewUpdate> {
        TimeAction::from_key(key).map(|action| self.apply_action(action))
    }

    fn last_timepoint(&self) -> f64 {
        self.num_timepoints.saturating_sub(1) as f64
    }

    fn clamp_range(&self, range: Range) -> Option<Range> {
        if !range.is_valid() {
            return None;
        }
        let end = self.num_timepoints as f64;
        let mut r = range;
        if r.max > end {
            r = r.translated(end - r.max);
        }
        if r.min < 0.0 {
            r = r.translated(-r.min);
        }
        r.max = r.max.min(self.last_timepoint());
        r.is_valid().then_some(r)
    }

    fn compute_downsample_factor(&self) -> usize {
        select_downsample_factor(
            self.time_range.span(),
            self.width_px as f64,
            self.num_channels,
            &self.config,
        )
    }

    fn refresh_downsample(&mut self) -> ViewUpdate {
        let factor = self.compute_downsample_factor();
        if factor == self.downsample_factor {
            return ViewUpdate::NONE;
        }
        tracing::debug!(from = self.downsample_factor, to = factor, "downsample factor changed");
        self.downsample_factor = factor;
        self.observers.emit(&ViewEvent::DownsampleChanged(factor));
        ViewUpdate {
            downsample_changed: true,
            ..ViewUpdate::NONE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn controller(n: usize) -> TimeAxisController {
        let config = NavigationConfig {
            max_samples_in_view: None,
            initial_time_range: (0.0, 100.0),
            ..NavigationConfig::default()
        };
        TimeAxisController::new(n, 4, config)
    }

    #[test]
    fn boundary_ranges_are_translated_inside() {
        let mut c = controller(1000);
        c.set_time_range(Range::new(-50.0, 100.0));
        assert_eq!(c.time_range(), Range::new(0.0, 150.0));
        c.set_time_range(Range::new(900.0, 1200.0));
        assert_eq!(c.time_range(), Range::new(700.0, 999.0));
    }

    #[test]
    fn range_wider_than_data_is_clipped() {
        let mut c = controller(1000);
        c.set_time_range(Range::new(-500.0, 2000.0));
        assert_eq!(c.time_range(), Range::new(0.0, 999.0));
    }

    #[test]
    fn set_time_range_is_idempotent() {
        let mut c = controller(1000);
        let events = Arc::new(Mutex::new(0));
        {
            let events = Arc::clone(&events);
            c.subscribe(move |e| {
                if matches!(e, ViewEvent::TimeRangeChanged(_)) {
                    *events.lock().unwrap() += 1;
                }
            });
        }
        let first = c.set_time_range(Range::new(10.0, 60.0));
        assert!(first.time_range_changed);
        let second = c.set_time_range(Range::new(10.0, 60.0));
        assert!(second.is_empty());
        assert_eq!(*events.lock().unwrap(), 1);
    }

    #[test]
    fn invalid_ranges_are_ignored() {
        let mut c = controller(1000);
        let before = c.time_range();
        assert!(c.set_time_range(Range::new(f64::NAN, 10.0)).is_empty());
        assert!(c.set_time_range(Range::new(5.0, 5.0)).is_empty());
        assert!(c.set_time_range(Range::new(0.0, f64::INFINITY)).is_empty());
        assert_eq!(c.time_range(), before);
    }

    #[test]
    fn max_time_span_rejects_wide_ranges() {
        let config = NavigationConfig {
            initial_time_range: (0.0, 100.0),
            ..NavigationConfig::default()
        };
        let mut c = TimeAxisController::new(1_000_000, 100, config);
        assert_eq!(c.max_time_span(), Some(10_000.0));
        assert!(c.set_time_range(Range::new(0.0, 20_000.0)).is_empty());
        assert!(c.set_time_range(Range::new(0.0, 9_000.0)).time_range_changed);
    }

    #[test]
    fn initial_range_respects_max_time_span() {
        let c = TimeAxisController::new(1_000_000, 40, NavigationConfig::default());
        assert_eq!(c.max_time_span(), Some(25_000.0));
        assert_eq!(c.time_range(), Range::new(0.0, 25_000.0));

        let c = TimeAxisController::new(1_000_000, 4, NavigationConfig::default());
        assert_eq!(c.time_range(), Range::new(0.0, 30_000.0));
    }

    #[test]
    fn current_time_is_clamped() {
        let mut c = controller(1000);
        c.set_current_time(Some(-5.0));
        assert_eq!(c.current_time(), Some(0.0));
        c.set_current_time(Some(5000.0));
        assert_eq!(c.current_time(), Some(999.0));
        assert!(c.set_current_time(Some(999.0)).is_empty());
        assert!(c.set_current_time(Some(f64::NAN)).is_empty());
    }

    #[test]
    fn zoom_anchors_on_visible_cursor() {
        let mut c = controller(10_000);
        c.set_time_range(Range::new(1000.0, 2000.0));
        c.set_current_time(Some(1500.0));
        c.zoom(2.0);
        assert_eq!(c.time_range(), Range::new(1250.0, 1750.0));

        c.set_current_time(Some(5000.0));
        c.zoom(0.5);
        assert_eq!(c.time_range(), Range::new(1250.0, 2250.0));
        assert!(c.zoom(0.0).is_empty());
        assert!(c.zoom(f64::NAN).is_empty());
    }

    #[test]
    fn translate_moves_cursor_and_range() {
        let mut c = controller(10_000);
        c.set_time_range(Range::new(100.0, 200.0));
        c.set_current_time(Some(150.0));
        let update = c.translate(20.0);
        assert!(update.time_range_changed && update.current_time_changed);
        assert_eq!(c.time_range(), Range::new(120.0, 220.0));
        assert_eq!(c.current_time(), Some(170.0));
    }

    #[test]
    fn actions_pan_zoom_and_jump() {
        let mut c = controller(10_000);
        c.set_time_range(Range::new(1000.0, 2000.0));
        c.apply_action(TimeAction::PanRight);
        assert_eq!(c.time_range(), Range::new(1200.0, 2200.0));
        c.apply_action(TimeAction::PanLeft);
        assert_eq!(c.time_range(), Range::new(1000.0, 2000.0));

        c.set_current_time(Some(1500.0));
        c.apply_action(TimeAction::Home);
        assert_eq!(c.current_time(), Some(0.0));
        assert_eq!(c.time_range(), Range::new(0.0, 1000.0));

        c.apply_action(TimeAction::End);
        assert_eq!(c.current_time(), Some(9999.0));
        assert_eq!(c.time_range(), Range::new(9000.0, 9999.0));

        let before = c.amplitude_scale();
        assert!(c.handle_key("up").is_some_and(|u| u.amplitude_changed));
        assert!((c.amplitude_scale() - before * 1.15).abs() < 1e-12);
        assert!(c.handle_key("q").is_none());
    }

    #[test]
    fn ensure_visible_variants() {
        let mut c = controller(10_000);
        c.set_time_range(Range::new(0.0, 100.0));
        c.set_current_time(Some(500.0));
        c.ensure_current_time_visible();
        assert_eq!(c.time_range(), Range::new(450.0, 550.0));

        c.set_time_range(Range::new(0.0, 100.0));
        c.ensure_current_time_in_range();
        assert_eq!(c.current_time(), Some(50.0));
    }

    #[test]
    fn pan_follows_pointer_from_anchor_range() {
        let mut c = controller(10_000);
        c.set_time_range(Range::new(1000.0, 2000.0));
        assert!(c.pan(10.0, 0.0).is_empty());
        c.begin_pan();
        c.pan(1500.0, 1400.0);
        assert_eq!(c.time_range(), Range::new(1100.0, 2100.0));
        c.pan(1500.0, 1450.0);
        assert_eq!(c.time_range(), Range::new(1050.0, 2050.0));
        c.end_pan();
        assert!(!c.is_panning());
    }

    #[test]
    fn downsample_factor_for_known_spans() {
        let config = NavigationConfig::default();
        assert_eq!(select_downsample_factor(300_000.0, 1000.0, 4, &config), 243);
        assert_eq!(select_downsample_factor(30_000.0, 1000.0, 4, &config), 27);
        assert_eq!(select_downsample_factor(400.0, 1000.0, 4, &config), 1);
        // many channels trade resolution for speed: target 500 px floor
        assert_eq!(select_downsample_factor(30_000.0, 1000.0, 64, &config), 81);
        // saturates instead of looping forever
        assert_eq!(select_downsample_factor(1e300, 1000.0, 4, &config), usize::MAX);
    }

    #[test]
    fn downsample_changes_are_reported_once() {
        let mut c = controller(1_000_000);
        let update = c.set_width(1000.0);
        assert!(update.is_empty());
        assert_eq!(c.downsample_factor(), 1);
        let update = c.set_time_range(Range::new(0.0, 300_000.0));
        assert!(update.downsample_changed);
        assert_eq!(c.downsample_factor(), 243);
        let update = c.set_time_range(Range::new(1.0, 300_001.0));
        assert!(update.time_range_changed && !update.downsample_changed);
    }
}
