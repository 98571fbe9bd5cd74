//! Multi-resolution segment cache with lazy loading.

use std::collections::HashMap;

use crate::config::SegmentConfig;
use crate::error::SegmentError;
use crate::events::{SubscriptionId, Subscribers};

use super::{DataSegment, SegmentKey, SignalDescriptor};

/// A fetch the host should perform, tagged with the epoch it was issued in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentRequest {
    /// Requested segment.
    pub key: SegmentKey,
    /// Store epoch at issue time. Pass it back to
    /// [`SegmentedSignalStore::accept_segment`].
    pub epoch: u64,
}

/// Notification that a segment became available.
///
/// `[t1, t2)` is the raw timepoint span nominally covered by the segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentSet {
    /// Downsample factor of the segment.
    pub ds: usize,
    /// First covered timepoint.
    pub t1: usize,
    /// One past the last covered timepoint.
    pub t2: usize,
}

/// A payload the store rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeFailure {
    /// Segment the payload was meant for.
    pub key: SegmentKey,
    /// Why it was rejected.
    pub error: SegmentError,
}

/// Outcome of [`SegmentedSignalStore::accept_segment`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentStatus {
    /// The segment was cached.
    Stored(SegmentSet),
    /// The response belonged to an earlier epoch and was dropped.
    Stale,
}

/// Options for [`SegmentedSignalStore::get_channel_data`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ChannelDataOptions {
    /// Only issue requests; return an empty vector.
    pub request_only: bool,
    /// Read what is cached without requesting anything.
    pub cached_only: bool,
    /// Give up waiting after this long (async wait only).
    pub timeout: Option<std::time::Duration>,
}

impl ChannelDataOptions {
    /// Options that only trigger fetches.
    pub fn request_only() -> Self {
        Self {
            request_only: true,
            ..Self::default()
        }
    }

    /// Options that leave the fetch queue alone.
    pub fn cached_only() -> Self {
        Self {
            cached_only: true,
            ..Self::default()
        }
    }

    /// Options with a wait timeout.
    pub fn with_timeout(timeout: std::time::Duration) -> Self {
        Self {
            timeout: Some(timeout),
            ..Self::default()
        }
    }
}

/// Cache of downsampled segments keyed by `(ds, index)`.
///
/// Reads never block: absent buckets come back as `f32::NAN` and the missing
/// segments (plus a lookahead margin) are requested from the registered
/// handlers exactly once until they arrive, fail or the store is cleared.
#[derive(Debug)]
pub struct SegmentedSignalStore {
    descriptor: SignalDescriptor,
    lookahead: usize,
    segments: HashMap<SegmentKey, DataSegment>,
    pending: HashMap<SegmentKey, u64>,
    epoch: u64,
    request_handlers: Subscribers<SegmentRequest>,
    segment_set_handlers: Subscribers<SegmentSet>,
    decode_failure_handlers: Subscribers<DecodeFailure>,
}

impl SegmentedSignalStore {
    /// Create an empty store with default settings.
    pub fn new(descriptor: SignalDescriptor) -> Self {
        Self::with_config(descriptor, &SegmentConfig::default())
    }

    /// Create an empty store.
    pub fn with_config(descriptor: SignalDescriptor, config: &SegmentConfig) -> Self {
        Self {
            descriptor,
            lookahead: config.lookahead,
            segments: HashMap::new(),
            pending: HashMap::new(),
            epoch: 0,
            request_handlers: Subscribers::new(),
            segment_set_handlers: Subscribers::new(),
            decode_failure_handlers: Subscribers::new(),
        }
    }

    /// Signal metadata.
    pub fn descriptor(&self) -> &SignalDescriptor {
        &self.descriptor
    }

    /// Current epoch.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Buckets at factor `ds`.
    pub fn num_buckets(&self, ds: usize) -> usize {
        self.descriptor.num_buckets(ds)
    }

    /// Segments at factor `ds`.
    pub fn segment_count(&self, ds: usize) -> usize {
        self.descriptor.segment_count(ds)
    }

    /// Check whether a segment is cached.
    pub fn has_segment(&self, key: SegmentKey) -> bool {
        self.segments.contains_key(&key)
    }

    /// Access a cached segment.
    pub fn segment(&self, key: SegmentKey) -> Option<&DataSegment> {
        self.segments.get(&key)
    }

    /// Check whether a fetch for the segment is outstanding.
    pub fn is_pending(&self, key: SegmentKey) -> bool {
        self.pending.contains_key(&key)
    }

    /// Number of outstanding fetches.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Register a handler invoked once per issued fetch.
    pub fn on_request_segment(
        &mut self,
        handler: impl FnMut(&SegmentRequest) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.request_handlers.subscribe(handler)
    }

    /// Remove a request handler.
    pub fn remove_request_handler(&mut self, id: SubscriptionId) -> bool {
        self.request_handlers.unsubscribe(id)
    }

    /// Register a handler invoked after each cached segment.
    pub fn on_segment_set(
        &mut self,
        handler: impl FnMut(&SegmentSet) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.segment_set_handlers.subscribe(handler)
    }

    /// Remove a segment-set handler.
    pub fn remove_segment_set_handler(&mut self, id: SubscriptionId) -> bool {
        self.segment_set_handlers.unsubscribe(id)
    }

    /// Register a handler invoked for each rejected payload.
    pub fn on_decode_failure(
        &mut self,
        handler: impl FnMut(&DecodeFailure) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.decode_failure_handlers.subscribe(handler)
    }

    /// Remove a decode-failure handler.
    pub fn remove_decode_failure_handler(&mut self, id: SubscriptionId) -> bool {
        self.decode_failure_handlers.unsubscribe(id)
    }

    /// Validate and cache a segment payload, then notify subscribers.
    ///
    /// `data` is channel-major with `channels * width * stride` values, where
    /// `width` is the segment size or, for the final segment, the clipped
    /// bucket count. A rejected payload leaves the segment absent, clears its
    /// pending flag and is reported to the decode-failure handlers.
    pub fn set_segment(
        &mut self,
        ds: usize,
        index: usize,
        data: Vec<f32>,
    ) -> Result<SegmentSet, SegmentError> {
        let key = SegmentKey::new(ds, index);
        let segment = match self.validate(key, data) {
            Ok(segment) => segment,
            Err(error) => {
                self.pending.remove(&key);
                tracing::warn!(%key, %error, "rejected segment payload");
                self.decode_failure_handlers.emit(&DecodeFailure {
                    key,
                    error: error.clone(),
                });
                return Err(error);
            }
        };
        self.segments.insert(key, segment);
        self.pending.remove(&key);
        let (t1, t2) = self.descriptor.segment_timepoints(key);
        let event = SegmentSet { ds, t1, t2 };
        tracing::trace!(%key, t1, t2, "segment stored");
        self.segment_set_handlers.emit(&event);
        Ok(event)
    }

    /// Like [`set_segment`](Self::set_segment), but drops responses issued
    /// before the last [`clear`](Self::clear).
    pub fn accept_segment(
        &mut self,
        epoch: u64,
        ds: usize,
        index: usize,
        data: Vec<f32>,
    ) -> Result<SegmentStatus, SegmentError> {
        if epoch != self.epoch {
            tracing::debug!(
                key = %SegmentKey::new(ds, index),
                epoch,
                current = self.epoch,
                "dropping stale segment response"
            );
            return Ok(SegmentStatus::Stale);
        }
        self.set_segment(ds, index, data).map(SegmentStatus::Stored)
    }

    /// Forget an outstanding fetch so the next read retries it.
    pub fn mark_failed(&mut self, ds: usize, index: usize) -> bool {
        let key = SegmentKey::new(ds, index);
        let removed = self.pending.remove(&key).is_some();
        if removed {
            tracing::debug!(%key, "segment fetch failed; will retry");
        }
        removed
    }

    /// Drop every segment and pending marker and start a new epoch.
    pub fn clear(&mut self) {
        self.segments.clear();
        self.pending.clear();
        self.epoch = self.epoch.wrapping_add(1);
        tracing::debug!(epoch = self.epoch, "segment cache cleared");
    }

    /// Read buckets `[t1, t2)` of one channel at factor `ds`.
    ///
    /// Returns `t2 - t1` samples when `ds == 1`, otherwise `2 * (t2 - t1)`
    /// interleaved min/max values. Unresolved slots are `f32::NAN`. Invalid
    /// arguments yield an empty vector.
    pub fn get_channel_data(
        &mut self,
        channel: usize,
        t1: usize,
        t2: usize,
        ds: usize,
        opts: ChannelDataOptions,
    ) -> Vec<f32> {
        if ds == 0 || t1 >= t2 || channel >= self.descriptor.num_channels() {
            return Vec::new();
        }
        let segment_size = self.descriptor.segment_size();
        let s1 = t1 / segment_size;
        let s2 = (t2 - 1) / segment_size;

        let out = if opts.request_only {
            Vec::new()
        } else {
            self.extract(channel, t1, t2, ds, s1, s2)
        };
        if !opts.cached_only {
            self.request_missing(ds, s1, s2);
        }
        out
    }

    fn extract(
        &self,
        channel: usize,
        t1: usize,
        t2: usize,
        ds: usize,
        s1: usize,
        s2: usize,
    ) -> Vec<f32> {
        let stride = SignalDescriptor::stride(ds);
        let segment_size = self.descriptor.segment_size();
        let mut out = vec![f32::NAN; (t2 - t1) * stride];
        for index in s1..=s2 {
            let Some(segment) = self.segments.get(&SegmentKey::new(ds, index)) else {
                continue;
            };
            let seg_start = index * segment_size;
            let from = t1.max(seg_start);
            let to = t2.min(seg_start + segment.width());
            if from >= to {
                continue;
            }
            let values = segment.channel(channel);
            let src = &values[(from - seg_start) * stride..(to - seg_start) * stride];
            out[(from - t1) * stride..(to - t1) * stride].copy_from_slice(src);
        }
        out
    }

    fn request_missing(&mut self, ds: usize, s1: usize, s2: usize) {
        let count = self.descriptor.segment_count(ds);
        let first = s1.saturating_sub(self.lookahead);
        let last = s2.saturating_add(self.lookahead).min(count.saturating_sub(1));
        if count == 0 || first > last {
            return;
        }
        for index in first..=last {
            let key = SegmentKey::new(ds, index);
            if self.segments.contains_key(&key) || self.pending.contains_key(&key) {
                continue;
            }
            self.pending.insert(key, self.epoch);
            tracing::debug!(%key, epoch = self.epoch, "requesting segment");
            self.request_handlers.emit(&SegmentRequest {
                key,
                epoch: self.epoch,
            });
        }
    }

    fn validate(&self, key: SegmentKey, data: Vec<f32>) -> Result<DataSegment, SegmentError> {
        if key.ds == 0 {
            return Err(SegmentError::InvalidFactor);
        }
        let count = self.descriptor.segment_count(key.ds);
        if key.index >= count {
            return Err(SegmentError::OutOfRange { key, count });
        }
        let channels = self.descriptor.num_channels();
        let stride = SignalDescriptor::stride(key.ds);
        let full = self.descriptor.segment_size();
        let clipped = self.descriptor.segment_width(key);
        let width = if data.len() == channels * full * stride {
            full
        } else if data.len() == channels * clipped * stride {
            clipped
        } else {
            return Err(SegmentError::WrongLength {
                key,
                expected: channels * clipped * stride,
                actual: data.len(),
            });
        };
        Ok(DataSegment::new(key, channels, width, stride, data))
    }
}
