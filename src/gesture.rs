//! Pointer gesture recognition.
//!
//! Raw pointer input is turned into press, release, move, enter, leave,
//! wheel, drag and drag-release events. A press only becomes a drag once the
//! pointer travels past a threshold with the primary button held, and drag
//! events are throttled with the latest position always delivered.

use std::time::{Duration, Instant};

use crate::config::GestureConfig;
use crate::geom::{ScreenPoint, ScreenRect};

/// Geometry of an ongoing or finished drag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragInfo {
    /// Press position.
    pub anchor: ScreenPoint,
    /// Current pointer position.
    pub pos: ScreenPoint,
    /// Bounding box of anchor and position.
    pub rect: ScreenRect,
}

impl DragInfo {
    fn new(anchor: ScreenPoint, pos: ScreenPoint) -> Self {
        Self {
            anchor,
            pos,
            rect: ScreenRect::bounding(anchor, pos),
        }
    }
}

/// Recognized pointer events.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureEvent {
    /// Button pressed.
    Press(ScreenPoint),
    /// Button released without dragging.
    Release(ScreenPoint),
    /// Pointer moved.
    Move(ScreenPoint),
    /// Pointer entered the surface.
    Enter(ScreenPoint),
    /// Pointer left the surface.
    Leave(ScreenPoint),
    /// Wheel scrolled; positive `delta_y` scrolls down.
    Wheel {
        /// Pointer position.
        pos: ScreenPoint,
        /// Vertical scroll amount.
        delta_y: f32,
    },
    /// Drag in progress.
    Drag(DragInfo),
    /// Button released after dragging.
    DragRelease(DragInfo),
}

/// Tracker state.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum GestureState {
    /// No button held.
    #[default]
    Idle,
    /// Button held, threshold not yet crossed.
    Armed {
        /// Press position.
        anchor: ScreenPoint,
    },
    /// Dragging.
    Dragging {
        /// Press position.
        anchor: ScreenPoint,
        /// Last pointer position.
        pos: ScreenPoint,
    },
}

/// Turns raw pointer input into [`GestureEvent`]s.
///
/// Drags are reported at most once per throttle interval. Positions arriving
/// faster are kept (latest wins) and delivered by [`poll`](Self::poll), or
/// just before the drag release.
#[derive(Debug, Clone)]
pub struct MouseGestureTracker {
    threshold: f32,
    throttle: Duration,
    state: GestureState,
    last_drag_emit: Option<Instant>,
    pending_drag: Option<DragInfo>,
}

impl Default for MouseGestureTracker {
    fn default() -> Self {
        Self::new(&GestureConfig::default())
    }
}

impl MouseGestureTracker {
    /// Create a tracker.
    pub fn new(config: &GestureConfig) -> Self {
        Self {
            threshold: config.drag_threshold_px,
            throttle: config.drag_throttle(),
            state: GestureState::Idle,
            last_drag_emit: None,
            pending_drag: None,
        }
    }

    /// Current state.
    pub fn state(&self) -> GestureState {
        self.state
    }

    /// Primary button pressed.
    pub fn press(&mut self, pos: ScreenPoint, _now: Instant) -> Vec<GestureEvent> {
        self.state = GestureState::Armed { anchor: pos };
        self.pending_drag = None;
        self.last_drag_emit = None;
        vec![GestureEvent::Press(pos)]
    }

    /// Pointer moved. `primary_down` reports whether the primary button is held.
    pub fn moved(&mut self, pos: ScreenPoint, primary_down: bool, now: Instant) -> Vec<GestureEvent> {
        let mut events = vec![GestureEvent::Move(pos)];
        match self.state {
            GestureState::Idle => {}
            GestureState::Armed { anchor } => {
                let dx = (pos.x - anchor.x).abs();
                let dy = (pos.y - anchor.y).abs();
                if primary_down && (dx > self.threshold || dy > self.threshold) {
                    self.state = GestureState::Dragging { anchor, pos };
                    self.emit_drag(DragInfo::new(anchor, pos), now, &mut events);
                }
            }
            GestureState::Dragging { anchor, .. } => {
                self.state = GestureState::Dragging { anchor, pos };
                self.emit_drag(DragInfo::new(anchor, pos), now, &mut events);
            }
        }
        events
    }

    /// Primary button released.
    pub fn release(&mut self, pos: ScreenPoint, _now: Instant) -> Vec<GestureEvent> {
        let mut events = Vec::new();
        match self.state {
            GestureState::Dragging { anchor, .. } => {
                if let Some(pending) = self.pending_drag.take() {
                    events.push(GestureEvent::Drag(pending));
                }
                events.push(GestureEvent::DragRelease(DragInfo::new(anchor, pos)));
            }
            GestureState::Armed { .. } | GestureState::Idle => {
                events.push(GestureEvent::Release(pos));
            }
        }
        self.state = GestureState::Idle;
        self.last_drag_emit = None;
        events
    }

    /// Pointer entered the surface.
    pub fn enter(&mut self, pos: ScreenPoint) -> Vec<GestureEvent> {
        vec![GestureEvent::Enter(pos)]
    }

    /// Pointer left the surface. An active drag continues.
    pub fn leave(&mut self, pos: ScreenPoint) -> Vec<GestureEvent> {
        vec![GestureEvent::Leave(pos)]
    }

    /// Wheel scrolled.
    pub fn wheel(&mut self, pos: ScreenPoint, delta_y: f32) -> Vec<GestureEvent> {
        vec![GestureEvent::Wheel { pos, delta_y }]
    }

    /// Deliver a throttled drag whose interval has elapsed.
    pub fn poll(&mut self, now: Instant) -> Option<GestureEvent> {
        let deadline = self.next_deadline()?;
        if now < deadline {
            return None;
        }
        let pending = self.pending_drag.take()?;
        self.last_drag_emit = Some(now);
        Some(GestureEvent::Drag(pending))
    }

    /// When a held-back drag becomes deliverable.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending_drag?;
        self.last_drag_emit.map(|last| last + self.throttle)
    }

    fn emit_drag(&mut self, info: DragInfo, now: Instant, events: &mut Vec<GestureEvent>) {
        let ready = self
            .last_drag_emit
            .is_none_or(|last| now.saturating_duration_since(last) >= self.throttle);
        if ready {
            self.pending_drag = None;
            self.last_drag_emit = Some(now);
            events.push(GestureEvent::Drag(info));
        } else {
            self.pending_drag = Some(info);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pt(x: f32, y: f32) -> ScreenPoint {
        ScreenPoint::new(x, y)
    }

    fn drags(events: &[GestureEvent]) -> Vec<DragInfo> {
        events
            .iter()
            .filter_map(|e| match e {
                GestureEvent::Drag(info) => Some(*info),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn small_motion_is_a_click() {
        let mut tracker = MouseGestureTracker::default();
        let t0 = Instant::now();
        assert_eq!(tracker.press(pt(10.0, 10.0), t0), vec![GestureEvent::Press(pt(10.0, 10.0))]);
        let events = tracker.moved(pt(12.0, 11.0), true, t0);
        assert_eq!(events, vec![GestureEvent::Move(pt(12.0, 11.0))]);
        assert_eq!(tracker.release(pt(12.0, 11.0), t0), vec![GestureEvent::Release(pt(12.0, 11.0))]);
        assert_eq!(tracker.state(), GestureState::Idle);
    }

    #[test]
    fn threshold_crossing_starts_drag_and_release_ends_it() {
        let mut tracker = MouseGestureTracker::default();
        let t0 = Instant::now();
        tracker.press(pt(10.0, 10.0), t0);
        let events = tracker.moved(pt(15.0, 10.0), true, t0);
        assert_eq!(events[0], GestureEvent::Move(pt(15.0, 10.0)));
        let drag = drags(&events);
        assert_eq!(drag.len(), 1);
        assert_eq!(drag[0].anchor, pt(10.0, 10.0));
        assert_eq!(drag[0].rect, ScreenRect::bounding(pt(10.0, 10.0), pt(15.0, 10.0)));

        let t1 = t0 + Duration::from_millis(60);
        let events = tracker.release(pt(20.0, 5.0), t1);
        assert_eq!(events.len(), 1);
        let GestureEvent::DragRelease(info) = events[0] else {
            panic!("expected drag release, got {events:?}");
        };
        assert_eq!(info.rect.min, pt(10.0, 5.0));
        assert_eq!(info.rect.max, pt(20.0, 10.0));
        assert!(!events.iter().any(|e| matches!(e, GestureEvent::Release(_))));
    }

    #[test]
    fn drag_starts_only_once_past_threshold() {
        let mut tracker = MouseGestureTracker::default();
        let t0 = Instant::now();
        let mut events = tracker.press(pt(10.0, 10.0), t0);
        events.extend(tracker.moved(pt(12.0, 11.0), true, t0));
        assert!(drags(&events).is_empty());
        events.extend(tracker.moved(pt(20.0, 10.0), true, t0));

        let drag = drags(&events);
        assert_eq!(drag.len(), 1);
        assert_eq!(drag[0].anchor, pt(10.0, 10.0));
        assert_eq!(drag[0].pos, pt(20.0, 10.0));
        assert_eq!(
            tracker.state(),
            GestureState::Dragging {
                anchor: pt(10.0, 10.0),
                pos: pt(20.0, 10.0)
            }
        );
    }

    #[test]
    fn motion_without_primary_button_does_not_drag() {
        let mut tracker = MouseGestureTracker::default();
        let t0 = Instant::now();
        tracker.press(pt(0.0, 0.0), t0);
        let events = tracker.moved(pt(50.0, 0.0), false, t0);
        assert!(drags(&events).is_empty());
        assert!(matches!(tracker.state(), GestureState::Armed { .. }));
    }

    #[test]
    fn fast_drags_are_throttled_latest_wins() {
        let mut tracker = MouseGestureTracker::default();
        let t0 = Instant::now();
        tracker.press(pt(0.0, 0.0), t0);
        assert_eq!(drags(&tracker.moved(pt(10.0, 0.0), true, t0)).len(), 1);
        for (i, x) in [20.0, 30.0, 40.0].into_iter().enumerate() {
            let t = t0 + Duration::from_millis(10 * (i as u64 + 1));
            assert!(drags(&tracker.moved(pt(x, 0.0), true, t)).is_empty());
        }
        let deadline = tracker.next_deadline().expect("pending drag");
        assert_eq!(deadline, t0 + Duration::from_millis(50));
        assert!(tracker.poll(t0 + Duration::from_millis(40)).is_none());
        let Some(GestureEvent::Drag(info)) = tracker.poll(deadline) else {
            panic!("expected flushed drag");
        };
        assert_eq!(info.pos, pt(40.0, 0.0));
        assert!(tracker.next_deadline().is_none());
    }

    #[test]
    fn pending_drag_flushes_before_release() {
        let mut tracker = MouseGestureTracker::default();
        let t0 = Instant::now();
        tracker.press(pt(0.0, 0.0), t0);
        tracker.moved(pt(10.0, 0.0), true, t0);
        tracker.moved(pt(25.0, 0.0), true, t0 + Duration::from_millis(5));
        let events = tracker.release(pt(25.0, 0.0), t0 + Duration::from_millis(6));
        assert!(matches!(events[0], GestureEvent::Drag(info) if info.pos == pt(25.0, 0.0)));
        assert!(matches!(events[1], GestureEvent::DragRelease(_)));
    }

    #[test]
    fn leaving_does_not_cancel_drag() {
        let mut tracker = MouseGestureTracker::default();
        let t0 = Instant::now();
        tracker.press(pt(0.0, 0.0), t0);
        tracker.moved(pt(10.0, 0.0), true, t0);
        assert_eq!(tracker.leave(pt(-1.0, 0.0)), vec![GestureEvent::Leave(pt(-1.0, 0.0))]);
        assert!(matches!(tracker.state(), GestureState::Dragging { .. }));
    }
}
