use std::time::{Duration, Instant};

use crate::config::RepaintConfig;

use super::LayerId;

/// What a repaint request turned into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepaintDecision {
    /// A repaint was already scheduled; nothing changed.
    Coalesced,
    /// The layer was idle long enough to paint right away.
    Immediate,
    /// The repaint is deferred until the given instant.
    Scheduled(Instant),
}

#[derive(Debug, Clone, Copy, Default)]
struct Slot {
    due: Option<Instant>,
    last_paint: Option<Instant>,
}

/// Per-layer repaint coalescing driven by caller-supplied time.
///
/// Requests inside the coalescing window merge into one paint; a layer that
/// has been idle longer than the staleness threshold paints immediately.
/// Hosts call [`poll`](Self::poll) at [`next_deadline`](Self::next_deadline).
#[derive(Debug, Clone)]
pub struct RepaintScheduler {
    coalesce_window: Duration,
    stale_after: Duration,
    slots: Vec<Slot>,
}

impl Default for RepaintScheduler {
    fn default() -> Self {
        Self::new(&RepaintConfig::default())
    }
}

impl RepaintScheduler {
    /// Create a scheduler.
    pub fn new(config: &RepaintConfig) -> Self {
        Self {
            coalesce_window: config.coalesce_window(),
            stale_after: config.stale_after(),
            slots: Vec::new(),
        }
    }

    fn slot_mut(&mut self, layer: LayerId) -> &mut Slot {
        if self.slots.len() <= layer.0 {
            self.slots.resize(layer.0 + 1, Slot::default());
        }
        &mut self.slots[layer.0]
    }

    /// Ask for a layer to be repainted.
    pub fn request(&mut self, layer: LayerId, now: Instant) -> RepaintDecision {
        let coalesce_window = self.coalesce_window;
        let stale_after = self.stale_after;
        let slot = self.slot_mut(layer);
        if slot.due.is_some() {
            return RepaintDecision::Coalesced;
        }
        let stale = slot
            .last_paint
            .is_none_or(|last| now.saturating_duration_since(last) > stale_after);
        if stale {
            slot.due = Some(now);
            tracing::trace!(layer = layer.0, "repaint due immediately");
            RepaintDecision::Immediate
        } else {
            let due = now + coalesce_window;
            slot.due = Some(due);
            tracing::trace!(layer = layer.0, "repaint scheduled");
            RepaintDecision::Scheduled(due)
        }
    }

    /// Request every layer in `layers`.
    pub fn request_all(&mut self, layers: impl IntoIterator<Item = LayerId>, now: Instant) {
        for layer in layers {
            self.request(layer, now);
        }
    }

    /// Check whether a repaint is outstanding for the layer.
    pub fn is_scheduled(&self, layer: LayerId) -> bool {
        self.slots.get(layer.0).is_some_and(|slot| slot.due.is_some())
    }

    /// Take the layers whose repaint is due and record them as painted now.
    pub fn poll(&mut self, now: Instant) -> Vec<LayerId> {
        let mut ready = Vec::new();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.due.is_some_and(|due| due <= now) {
                slot.due = None;
                slot.last_paint = Some(now);
                ready.push(LayerId(index));
            }
        }
        ready
    }

    /// Earliest outstanding repaint.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.slots.iter().filter_map(|slot| slot.due).min()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAIN: LayerId = LayerId(1);

    #[test]
    fn first_request_paints_immediately() {
        let mut scheduler = RepaintScheduler::default();
        let t0 = Instant::now();
        assert_eq!(scheduler.request(MAIN, t0), RepaintDecision::Immediate);
        assert_eq!(scheduler.request(MAIN, t0), RepaintDecision::Coalesced);
        assert_eq!(scheduler.poll(t0), vec![MAIN]);
        assert_eq!(scheduler.next_deadline(), None);
    }

    #[test]
    fn burst_after_recent_paint_is_coalesced() {
        let mut scheduler = RepaintScheduler::default();
        let t0 = Instant::now();
        scheduler.request(MAIN, t0);
        scheduler.poll(t0);

        let t1 = t0 + Duration::from_millis(2);
        let due = t1 + Duration::from_millis(5);
        assert_eq!(scheduler.request(MAIN, t1), RepaintDecision::Scheduled(due));
        for ms in 3..7 {
            assert_eq!(
                scheduler.request(MAIN, t0 + Duration::from_millis(ms)),
                RepaintDecision::Coalesced
            );
        }
        assert!(scheduler.poll(t1).is_empty());
        assert_eq!(scheduler.next_deadline(), Some(due));
        assert_eq!(scheduler.poll(due), vec![MAIN]);
        assert!(!scheduler.is_scheduled(MAIN));
    }

    #[test]
    fn stale_layer_paints_immediately_again() {
        let mut scheduler = RepaintScheduler::default();
        let t0 = Instant::now();
        scheduler.request(MAIN, t0);
        scheduler.poll(t0);
        let later = t0 + Duration::from_millis(11);
        assert_eq!(scheduler.request(MAIN, later), RepaintDecision::Immediate);
    }

    #[test]
    fn layers_are_independent() {
        let mut scheduler = RepaintScheduler::default();
        let t0 = Instant::now();
        let axis = LayerId(0);
        scheduler.request_all([axis, MAIN], t0);
        assert_eq!(scheduler.poll(t0), vec![axis, MAIN]);
        scheduler.request(axis, t0 + Duration::from_millis(1));
        assert!(scheduler.is_scheduled(axis));
        assert!(!scheduler.is_scheduled(MAIN));
    }
}
