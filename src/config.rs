//! Tunable behavior for the viewer core.
//!
//! Intervals that were tuned by inspection (drag throttle, repaint
//! coalescing) live here instead of being hard-coded.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::geom::Margins;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceviewConfig {
    /// Pointer gesture settings.
    pub gesture: GestureConfig,
    /// Repaint scheduling settings.
    pub repaint: RepaintConfig,
    /// Segment cache settings.
    pub segments: SegmentConfig,
    /// Time axis navigation settings.
    pub navigation: NavigationConfig,
    /// Panel layout settings.
    pub layout: LayoutConfig,
}

impl TraceviewConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        tracing::debug!(?config, "loaded traceview configuration");
        Ok(config)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.gesture.drag_threshold_px >= 0.0) {
            return Err(invalid("gesture.drag_threshold_px", "must be non-negative"));
        }
        if self.segments.wait_poll_interval_ms == 0 {
            return Err(invalid("segments.wait_poll_interval_ms", "must be positive"));
        }
        if self.navigation.downsample_ratio < 2 {
            return Err(invalid("navigation.downsample_ratio", "must be at least 2"));
        }
        if !(self.navigation.downsample_safety > 0.0)
            || !(self.navigation.dense_downsample_safety > 0.0)
        {
            return Err(invalid("navigation.downsample_safety", "must be positive"));
        }
        if !(self.navigation.zoom_ratio > 1.0) {
            return Err(invalid("navigation.zoom_ratio", "must be greater than 1"));
        }
        if !(self.navigation.amplitude_ratio > 1.0) {
            return Err(invalid("navigation.amplitude_ratio", "must be greater than 1"));
        }
        if !(self.navigation.pan_fraction > 0.0) {
            return Err(invalid("navigation.pan_fraction", "must be positive"));
        }
        if !(self.layout.overview_height >= 0.0) {
            return Err(invalid("layout.overview_height", "must be non-negative"));
        }
        if !(self.layout.label_row_px > 0.0) {
            return Err(invalid("layout.label_row_px", "must be positive"));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: &'static str) -> ConfigError {
    ConfigError::Invalid { field, reason }
}

/// Pointer gesture settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    /// Displacement on either axis that turns a press into a drag.
    pub drag_threshold_px: f32,
    /// Minimum interval between reported drag events.
    pub drag_throttle_ms: u64,
}

impl GestureConfig {
    /// Drag throttle as a duration.
    pub fn drag_throttle(&self) -> Duration {
        Duration::from_millis(self.drag_throttle_ms)
    }
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            drag_threshold_px: 4.0,
            drag_throttle_ms: 50,
        }
    }
}

/// Repaint scheduling settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepaintConfig {
    /// Delay used to merge bursts of repaint requests.
    pub coalesce_window_ms: u64,
    /// Paint immediately once a layer has been idle this long.
    pub stale_after_ms: u64,
    /// Time spent painting panels before yielding to the host.
    pub panel_budget_ms: u64,
    /// Pause before painting the remaining panels.
    pub panel_resume_ms: u64,
}

impl RepaintConfig {
    /// Coalescing window as a duration.
    pub fn coalesce_window(&self) -> Duration {
        Duration::from_millis(self.coalesce_window_ms)
    }

    /// Staleness threshold as a duration.
    pub fn stale_after(&self) -> Duration {
        Duration::from_millis(self.stale_after_ms)
    }

    /// Panel painting budget as a duration.
    pub fn panel_budget(&self) -> Duration {
        Duration::from_millis(self.panel_budget_ms)
    }

    /// Resume delay as a duration.
    pub fn panel_resume(&self) -> Duration {
        Duration::from_millis(self.panel_resume_ms)
    }
}

impl Default for RepaintConfig {
    fn default() -> Self {
        Self {
            coalesce_window_ms: 5,
            stale_after_ms: 10,
            panel_budget_ms: 200,
            panel_resume_ms: 100,
        }
    }
}

/// Segment cache settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentConfig {
    /// Extra segments requested on each side of a read.
    pub lookahead: usize,
    /// Poll interval of [`SignalHandle::wait_for_channel_data`](crate::signal::SignalHandle::wait_for_channel_data).
    pub wait_poll_interval_ms: u64,
}

impl SegmentConfig {
    /// Poll interval as a duration.
    pub fn wait_poll_interval(&self) -> Duration {
        Duration::from_millis(self.wait_poll_interval_ms)
    }
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            lookahead: 1,
            wait_poll_interval_ms: 100,
        }
    }
}

/// Time axis navigation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationConfig {
    /// Ratio between consecutive downsample factors.
    pub downsample_ratio: u32,
    /// Pixel multiplier applied before choosing a factor.
    pub downsample_safety: f64,
    /// Multiplier used instead when many channels are shown.
    pub dense_downsample_safety: f64,
    /// Channel count above which the dense multiplier applies.
    pub dense_channel_threshold: usize,
    /// Lower bound on the target bucket count.
    pub min_target_pixels: f64,
    /// Time zoom step.
    pub zoom_ratio: f64,
    /// Amplitude zoom step.
    pub amplitude_ratio: f64,
    /// Fraction of the visible span moved by one pan step.
    pub pan_fraction: f64,
    /// Upper bound on visible samples across all channels.
    pub max_samples_in_view: Option<f64>,
    /// Time range shown before the host sets one.
    pub initial_time_range: (f64, f64),
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            downsample_ratio: 3,
            downsample_safety: 1.3,
            dense_downsample_safety: 0.5,
            dense_channel_threshold: 32,
            min_target_pixels: 500.0,
            zoom_ratio: 1.15,
            amplitude_ratio: 1.15,
            pan_fraction: 0.2,
            max_samples_in_view: Some(1e6),
            initial_time_range: (0.0, 30000.0),
        }
    }
}

/// Panel layout settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Margins of the trace area, not counting the overview strip.
    pub plot_margins: Margins,
    /// Height of the overview strip at the top. Zero hides it.
    pub overview_height: f32,
    /// Height of the time axis strip at the bottom.
    pub time_axis_height: f32,
    /// Minimum vertical pixels per channel label.
    pub label_row_px: f32,
}

impl LayoutConfig {
    /// Margins of the trace area below the overview strip.
    pub fn trace_margins(&self) -> Margins {
        Margins {
            top: self.plot_margins.top + self.overview_height,
            ..self.plot_margins
        }
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            plot_margins: Margins::new(50.0, 10.0, 15.0, 50.0),
            overview_height: 50.0,
            time_axis_height: 50.0,
            label_row_px: 18.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(TraceviewConfig::default().validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = TraceviewConfig::from_json_str(
            r#"{ "gesture": { "drag_throttle_ms": 20 }, "segments": { "lookahead": 2 } }"#,
        )
        .expect("valid config");
        assert_eq!(config.gesture.drag_throttle(), Duration::from_millis(20));
        assert_eq!(config.gesture.drag_threshold_px, 4.0);
        assert_eq!(config.segments.lookahead, 2);
        assert_eq!(config.repaint, RepaintConfig::default());
    }

    #[test]
    fn rejects_small_downsample_ratio() {
        let err = TraceviewConfig::from_json_str(r#"{ "navigation": { "downsample_ratio": 1 } }"#)
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "navigation.downsample_ratio",
                ..
            }
        ));
    }

    #[test]
    fn trace_area_sits_below_the_overview() {
        let layout = LayoutConfig::default();
        assert_eq!(layout.trace_margins(), Margins::new(50.0, 10.0, 65.0, 50.0));
        let config = TraceviewConfig::from_json_str(r#"{ "layout": { "overview_height": 0 } }"#)
            .expect("valid config");
        assert_eq!(config.layout.trace_margins(), config.layout.plot_margins);
        assert_eq!(config.repaint.panel_budget(), Duration::from_millis(200));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = TraceviewConfig::from_json_str("{ nope").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
