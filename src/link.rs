//! Time synchronization between views.
//!
//! A [`TimeSyncGroup`] is a shared mailbox: members publish their time range
//! and cursor, and every other member picks up the latest value when it
//! polls. Identical payloads are not republished, so applying a peer's update
//! and echoing it back settles after one round.

use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};

use crate::view::Range;

const SYNC_EPSILON: f64 = 1e-9;

/// Member identifier inside a time sync group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeSyncMemberId(u64);

/// What a member shares with its group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSyncOptions {
    /// Synchronize the visible time range.
    pub sync_time_range: bool,
    /// Synchronize the cursor.
    pub sync_cursor: bool,
}

impl Default for TimeSyncOptions {
    fn default() -> Self {
        Self {
            sync_time_range: true,
            sync_cursor: true,
        }
    }
}

/// Shared group synchronizing the time axes of several views.
///
/// Cloning yields another handle to the same group.
#[derive(Debug, Clone, Default)]
pub struct TimeSyncGroup {
    inner: Arc<RwLock<SyncGroupState>>,
}

impl TimeSyncGroup {
    /// Create an empty group.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a member.
    pub fn register_member(&self) -> TimeSyncMemberId {
        let mut state = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        state.next_member_id = state.next_member_id.wrapping_add(1);
        let id = TimeSyncMemberId(state.next_member_id);
        state.members.insert(id);
        id
    }

    /// Remove a member. Its later publications are ignored.
    pub fn unregister_member(&self, member: TimeSyncMemberId) -> bool {
        let mut state = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        state.members.remove(&member)
    }

    /// Number of registered members.
    pub fn member_count(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .members
            .len()
    }

    /// Publish a member's time range.
    pub fn publish_time_range(&self, source: TimeSyncMemberId, range: Range) {
        let mut state = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if !state.members.contains(&source) {
            return;
        }
        if let Some(current) = state.range_update
            && range_approx_eq(current.range, range)
        {
            return;
        }
        let seq = state.next_seq();
        tracing::trace!(seq, min = range.min, max = range.max, "time range published");
        state.range_update = Some(TimeRangeUpdate { seq, source, range });
    }

    /// Publish a member's cursor.
    pub fn publish_current_time(&self, source: TimeSyncMemberId, time: Option<f64>) {
        let mut state = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if !state.members.contains(&source) {
            return;
        }
        if let Some(current) = state.cursor_update
            && option_f64_approx_eq(current.time, time)
        {
            return;
        }
        let seq = state.next_seq();
        state.cursor_update = Some(CursorUpdate { seq, source, time });
    }

    /// Most recent time range publication.
    pub fn latest_time_range(&self) -> Option<TimeRangeUpdate> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .range_update
    }

    /// Most recent cursor publication.
    pub fn latest_current_time(&self) -> Option<CursorUpdate> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .cursor_update
    }
}

#[derive(Debug, Default)]
struct SyncGroupState {
    next_member_id: u64,
    next_seq: u64,
    members: HashSet<TimeSyncMemberId>,
    range_update: Option<TimeRangeUpdate>,
    cursor_update: Option<CursorUpdate>,
}

impl SyncGroupState {
    fn next_seq(&mut self) -> u64 {
        self.next_seq = self.next_seq.wrapping_add(1);
        self.next_seq
    }
}

/// A published time range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeRangeUpdate {
    /// Publication sequence number.
    pub seq: u64,
    /// Publishing member.
    pub source: TimeSyncMemberId,
    /// Published range.
    pub range: Range,
}

/// A published cursor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CursorUpdate {
    /// Publication sequence number.
    pub seq: u64,
    /// Publishing member.
    pub source: TimeSyncMemberId,
    /// Published cursor.
    pub time: Option<f64>,
}

/// One member's view of a group: what it shares and what it has seen.
#[derive(Debug, Clone)]
pub(crate) struct TimeSyncBinding {
    pub(crate) group: TimeSyncGroup,
    pub(crate) member_id: TimeSyncMemberId,
    pub(crate) options: TimeSyncOptions,
    seen_range_seq: u64,
    seen_cursor_seq: u64,
}

impl TimeSyncBinding {
    pub(crate) fn join(group: TimeSyncGroup, options: TimeSyncOptions) -> Self {
        let member_id = group.register_member();
        let seen_range_seq = group.latest_time_range().map_or(0, |u| u.seq);
        let seen_cursor_seq = group.latest_current_time().map_or(0, |u| u.seq);
        Self {
            group,
            member_id,
            options,
            seen_range_seq,
            seen_cursor_seq,
        }
    }

    pub(crate) fn leave(&self) {
        self.group.unregister_member(self.member_id);
    }

    pub(crate) fn publish_time_range(&self, range: Range) {
        if self.options.sync_time_range {
            self.group.publish_time_range(self.member_id, range);
        }
    }

    pub(crate) fn publish_current_time(&self, time: Option<f64>) {
        if self.options.sync_cursor {
            self.group.publish_current_time(self.member_id, time);
        }
    }

    /// Peer time range not yet applied by this member.
    pub(crate) fn take_time_range(&mut self) -> Option<Range> {
        if !self.options.sync_time_range {
            return None;
        }
        let update = self.group.latest_time_range()?;
        if update.seq == self.seen_range_seq {
            return None;
        }
        self.seen_range_seq = update.seq;
        (update.source != self.member_id).then_some(update.range)
    }

    /// Peer cursor not yet applied by this member.
    pub(crate) fn take_current_time(&mut self) -> Option<Option<f64>> {
        if !self.options.sync_cursor {
            return None;
        }
        let update = self.group.latest_current_time()?;
        if update.seq == self.seen_cursor_seq {
            return None;
        }
        self.seen_cursor_seq = update.seq;
        (update.source != self.member_id).then_some(update.time)
    }
}

fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= SYNC_EPSILON
}

fn option_f64_approx_eq(a: Option<f64>, b: Option<f64>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => approx_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}

fn range_approx_eq(a: Range, b: Range) -> bool {
    approx_eq(a.min, b.min) && approx_eq(a.max, b.max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_range_is_not_republished() {
        let group = TimeSyncGroup::new();
        let a = group.register_member();
        let b = group.register_member();
        group.publish_time_range(a, Range::new(0.0, 10.0));
        let first = group.latest_time_range().expect("range update");
        group.publish_time_range(b, Range::new(0.0, 10.0));
        let second = group.latest_time_range().expect("range update");
        assert_eq!(first.seq, second.seq);
        assert_eq!(second.source, a);
    }

    #[test]
    fn unregistered_members_are_ignored() {
        let group = TimeSyncGroup::new();
        let a = group.register_member();
        assert_eq!(group.member_count(), 1);
        assert!(group.unregister_member(a));
        assert!(!group.unregister_member(a));
        group.publish_current_time(a, Some(3.0));
        assert!(group.latest_current_time().is_none());
    }

    #[test]
    fn bindings_see_peer_updates_once() {
        let group = TimeSyncGroup::new();
        let mut a = TimeSyncBinding::join(group.clone(), TimeSyncOptions::default());
        let mut b = TimeSyncBinding::join(group.clone(), TimeSyncOptions::default());

        a.publish_time_range(Range::new(5.0, 15.0));
        assert_eq!(a.take_time_range(), None);
        assert_eq!(b.take_time_range(), Some(Range::new(5.0, 15.0)));
        assert_eq!(b.take_time_range(), None);

        b.publish_current_time(Some(7.0));
        assert_eq!(a.take_current_time(), Some(Some(7.0)));
        b.publish_current_time(None);
        assert_eq!(a.take_current_time(), Some(None));
    }

    #[test]
    fn options_disable_directions() {
        let group = TimeSyncGroup::new();
        let cursor_only = TimeSyncOptions {
            sync_time_range: false,
            sync_cursor: true,
        };
        let a = TimeSyncBinding::join(group.clone(), cursor_only);
        let mut b = TimeSyncBinding::join(group.clone(), TimeSyncOptions::default());
        a.publish_time_range(Range::new(0.0, 1.0));
        assert!(group.latest_time_range().is_none());
        b.publish_time_range(Range::new(0.0, 2.0));
        assert_eq!(b.take_time_range(), None);
        a.leave();
        assert_eq!(group.member_count(), 1);
    }
}
