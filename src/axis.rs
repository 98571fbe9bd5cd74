//! Time axis tick generation.
//!
//! Ticks are placed on a fixed ladder of wall-clock intervals converted to
//! samples. Each visible level draws slightly taller ticks than the one
//! below it, and the finest visible level gets a labelled scale bar.

use crate::view::Range;

/// Minimum pixel distance between ticks of one level.
pub const MIN_TICK_SPACING_PX: f64 = 15.0;

const BASE_TICK_HEIGHT: f64 = 0.2;
const TICK_HEIGHT_STEP: f64 = 0.1;
const MAX_TICK_HEIGHT: f64 = 0.45;

/// A tick interval with its display name.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickScale {
    /// Label used for the scale bar.
    pub name: &'static str,
    /// Interval in seconds.
    pub seconds: f64,
}

/// Intervals considered for ticks, finest first.
pub const TICK_SCALES: [TickScale; 9] = [
    TickScale { name: "1 ms", seconds: 1e-3 },
    TickScale { name: "10 ms", seconds: 1e-2 },
    TickScale { name: "100 ms", seconds: 0.1 },
    TickScale { name: "1 s", seconds: 1.0 },
    TickScale { name: "10 s", seconds: 10.0 },
    TickScale { name: "1 m", seconds: 60.0 },
    TickScale { name: "10 m", seconds: 600.0 },
    TickScale { name: "1 h", seconds: 3600.0 },
    TickScale { name: "1 day", seconds: 86_400.0 },
];

/// A tick mark at a timepoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tick {
    /// Position in timepoints.
    pub time: f64,
    /// Height as a fraction of the axis band.
    pub height: f64,
}

/// Labelled bar showing the length of the finest visible interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleBar {
    /// Start in timepoints.
    pub start: f64,
    /// End in timepoints.
    pub end: f64,
    /// Interval name.
    pub label: &'static str,
}

/// Ticks for one time range.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeTicks {
    /// Tick marks, without near-duplicates.
    pub ticks: Vec<Tick>,
    /// Scale bar of the finest visible level.
    pub scale_bar: Option<ScaleBar>,
}

/// Compute the ticks of `range` drawn `width_px` wide.
///
/// Where levels coincide, the tick of the coarser level wins.
pub fn time_ticks(range: Range, width_px: f64, sample_rate: f64) -> TimeTicks {
    let mut out = TimeTicks::default();
    if !range.is_valid() || !(width_px > 0.0) || !(sample_rate > 0.0) {
        return out;
    }
    let mut height = BASE_TICK_HEIGHT;
    let mut raw = Vec::new();
    for scale in TICK_SCALES {
        let interval = scale.seconds * sample_rate;
        if width_px / range.span() * interval < MIN_TICK_SPACING_PX {
            continue;
        }
        let first = (range.min / interval).floor() as i64;
        let last = (range.max / interval).ceil() as i64;
        for u in first..=last {
            let time = u as f64 * interval;
            if !range.contains(time) {
                continue;
            }
            if out.scale_bar.is_none() {
                out.scale_bar = Some(ScaleBar {
                    start: range.min,
                    end: range.min + interval,
                    label: scale.name,
                });
            }
            raw.push(Tick { time, height });
        }
        height = (height + TICK_HEIGHT_STEP).min(MAX_TICK_HEIGHT);
    }
    out.ticks = raw
        .iter()
        .enumerate()
        .filter(|(i, tick)| !raw[i + 1..].iter().any(|later| (later.time - tick.time).abs() < 1.0))
        .map(|(_, tick)| *tick)
        .collect();
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_second() -> TimeTicks {
        time_ticks(Range::new(0.0, 30_000.0), 1000.0, 30_000.0)
    }

    #[test]
    fn scale_bar_uses_finest_visible_level() {
        let bar = one_second().scale_bar.unwrap();
        assert_eq!(bar.label, "100 ms");
        assert_eq!(bar.start, 0.0);
        assert_eq!(bar.end, 3000.0);
    }

    #[test]
    fn coincident_ticks_keep_the_coarser_level() {
        let ticks = one_second().ticks;
        assert_eq!(ticks.len(), 11);
        let height_at = |time: f64| {
            ticks
                .iter()
                .find(|t| (t.time - time).abs() < 1.0)
                .map(|t| t.height)
                .unwrap()
        };
        assert!((height_at(3000.0) - 0.2).abs() < 1e-12);
        assert!((height_at(30_000.0) - 0.3).abs() < 1e-12);
        assert!((height_at(0.0) - MAX_TICK_HEIGHT).abs() < 1e-12);
    }

    #[test]
    fn dense_levels_are_skipped() {
        // 1 ms and 10 ms ticks would be 1 px and 10 px apart
        let ticks = one_second().ticks;
        assert!(ticks.iter().all(|t| (t.time / 3000.0).fract().abs() < 1e-9));
    }

    #[test]
    fn degenerate_input_yields_nothing() {
        assert_eq!(time_ticks(Range::new(5.0, 5.0), 100.0, 1000.0), TimeTicks::default());
        assert_eq!(time_ticks(Range::new(0.0, 5.0), 0.0, 1000.0), TimeTicks::default());
        assert_eq!(time_ticks(Range::new(0.0, 5.0), 100.0, f64::NAN), TimeTicks::default());
    }
}
