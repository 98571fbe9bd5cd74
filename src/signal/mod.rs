//! Segment-addressable signal data.
//!
//! A signal is `num_channels` traces of `num_timepoints` samples. Readers ask
//! for buckets at a downsample factor `ds`; buckets are grouped into fixed-size
//! segments that an external backend computes on request and the
//! [`SegmentedSignalStore`] caches.

mod envelope;
mod handle;
mod layout;
pub mod payload;
mod segment;
mod source;
mod store;

use std::fmt;

use crate::error::DescriptorError;

pub use envelope::{MinMax, minmax_buckets, reduce_envelope};
pub use handle::SignalHandle;
pub use layout::ChannelLayout;
pub use segment::DataSegment;
pub use source::MultiscaleSource;
pub use store::{
    ChannelDataOptions, DecodeFailure, SegmentRequest, SegmentSet, SegmentStatus,
    SegmentedSignalStore,
};

/// Product of segment size and channel count used to size segments.
pub const SEGMENT_VALUES_BUDGET: usize = 1_000_000;

/// Immutable signal metadata.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalDescriptor {
    sample_rate: f64,
    num_channels: usize,
    num_timepoints: usize,
    segment_size: usize,
}

impl SignalDescriptor {
    /// Validate and create a descriptor.
    pub fn new(
        sample_rate: f64,
        num_channels: usize,
        num_timepoints: usize,
        segment_size: usize,
    ) -> Result<Self, DescriptorError> {
        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            return Err(DescriptorError::SampleRate(sample_rate));
        }
        if num_channels == 0 {
            return Err(DescriptorError::NoChannels);
        }
        if segment_size == 0 {
            return Err(DescriptorError::SegmentSize);
        }
        Ok(Self {
            sample_rate,
            num_channels,
            num_timepoints,
            segment_size,
        })
    }

    /// Create a descriptor whose segments hold about [`SEGMENT_VALUES_BUDGET`]
    /// values across all channels.
    pub fn with_default_segments(
        sample_rate: f64,
        num_channels: usize,
        num_timepoints: usize,
    ) -> Result<Self, DescriptorError> {
        if num_channels == 0 {
            return Err(DescriptorError::NoChannels);
        }
        Self::new(
            sample_rate,
            num_channels,
            num_timepoints,
            SEGMENT_VALUES_BUDGET.div_ceil(num_channels),
        )
    }

    /// Samples per second.
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Number of channels.
    pub fn num_channels(&self) -> usize {
        self.num_channels
    }

    /// Number of raw timepoints.
    pub fn num_timepoints(&self) -> usize {
        self.num_timepoints
    }

    /// Buckets per segment.
    pub fn segment_size(&self) -> usize {
        self.segment_size
    }

    /// Buckets at factor `ds`, counting a trailing partial bucket.
    pub fn num_buckets(&self, ds: usize) -> usize {
        if ds == 0 {
            return 0;
        }
        self.num_timepoints.div_ceil(ds)
    }

    /// Segments at factor `ds`.
    pub fn segment_count(&self, ds: usize) -> usize {
        self.num_buckets(ds).div_ceil(self.segment_size)
    }

    /// Bucket count of a segment; the final segment may be clipped.
    ///
    /// Returns zero for segments past the end.
    pub fn segment_width(&self, key: SegmentKey) -> usize {
        let start = key.index.saturating_mul(self.segment_size);
        self.num_buckets(key.ds)
            .saturating_sub(start)
            .min(self.segment_size)
    }

    /// Raw timepoint span `[t1, t2)` nominally covered by a segment.
    pub fn segment_timepoints(&self, key: SegmentKey) -> (usize, usize) {
        let per_segment = self.segment_size.saturating_mul(key.ds);
        (
            key.index.saturating_mul(per_segment),
            (key.index + 1).saturating_mul(per_segment),
        )
    }

    /// Values per (channel, bucket) at factor `ds`: one sample or a min/max pair.
    pub fn stride(ds: usize) -> usize {
        if ds > 1 { 2 } else { 1 }
    }
}

/// Address of one cached segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SegmentKey {
    /// Downsample factor.
    pub ds: usize,
    /// Segment index at that factor.
    pub index: usize,
}

impl SegmentKey {
    /// Create a key.
    pub fn new(ds: usize, index: usize) -> Self {
        Self { ds, index }
    }
}

impl fmt::Display for SegmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}--{}", self.ds, self.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_rejects_bad_metadata() {
        assert_eq!(
            SignalDescriptor::new(0.0, 4, 100, 10),
            Err(DescriptorError::SampleRate(0.0))
        );
        assert!(matches!(
            SignalDescriptor::new(f64::NAN, 4, 100, 10),
            Err(DescriptorError::SampleRate(_))
        ));
        assert_eq!(
            SignalDescriptor::new(30000.0, 0, 100, 10),
            Err(DescriptorError::NoChannels)
        );
        assert_eq!(
            SignalDescriptor::new(30000.0, 4, 100, 0),
            Err(DescriptorError::SegmentSize)
        );
    }

    #[test]
    fn bucket_and_segment_counts_round_up() {
        let desc = SignalDescriptor::new(30000.0, 4, 1000, 100).unwrap();
        assert_eq!(desc.num_buckets(1), 1000);
        assert_eq!(desc.num_buckets(3), 334);
        assert_eq!(desc.segment_count(1), 10);
        assert_eq!(desc.segment_count(3), 4);
        assert_eq!(desc.segment_width(SegmentKey::new(3, 3)), 34);
        assert_eq!(desc.segment_width(SegmentKey::new(3, 4)), 0);
        assert_eq!(desc.segment_timepoints(SegmentKey::new(3, 1)), (300, 600));
    }

    #[test]
    fn default_segment_size_splits_value_budget() {
        let desc = SignalDescriptor::with_default_segments(30000.0, 3, 10).unwrap();
        assert_eq!(desc.segment_size(), 333_334);
    }

    #[test]
    fn key_display() {
        assert_eq!(SegmentKey::new(9, 2).to_string(), "9--2");
    }
}
