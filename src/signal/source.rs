//! In-memory segment provider backed by a min/max pyramid.

use crate::error::{DescriptorError, SegmentError};

use super::envelope::{MinMax, minmax_buckets, reduce_envelope};
use super::{
    ChannelLayout, SegmentKey, SegmentRequest, SegmentStatus, SegmentedSignalStore,
    SignalDescriptor, payload,
};

/// Ratio between consecutive pyramid levels.
pub const PYRAMID_RATIO: usize = 3;

#[derive(Debug, Clone)]
struct Level {
    ds: usize,
    channels: Vec<Vec<MinMax>>,
}

/// Serves segment payloads for any `(ds, index)` from raw channel data.
///
/// Levels at powers of [`PYRAMID_RATIO`] are precomputed, each from the level
/// below it; other factors are bucketed from the raw samples on demand.
#[derive(Debug, Clone)]
pub struct MultiscaleSource {
    descriptor: SignalDescriptor,
    raw: Vec<Vec<f32>>,
    levels: Vec<Level>,
}

impl MultiscaleSource {
    /// Build a source. Channels are truncated to the shortest one.
    ///
    /// `segment_size` defaults to splitting
    /// [`SEGMENT_VALUES_BUDGET`](super::SEGMENT_VALUES_BUDGET) across channels.
    pub fn new(
        sample_rate: f64,
        mut channels: Vec<Vec<f32>>,
        segment_size: Option<usize>,
    ) -> Result<Self, DescriptorError> {
        let num_timepoints = channels.iter().map(Vec::len).min().unwrap_or(0);
        for channel in &mut channels {
            channel.truncate(num_timepoints);
        }
        let descriptor = match segment_size {
            Some(size) => SignalDescriptor::new(sample_rate, channels.len(), num_timepoints, size)?,
            None => {
                SignalDescriptor::with_default_segments(sample_rate, channels.len(), num_timepoints)?
            }
        };

        let mut levels: Vec<Level> = Vec::new();
        let mut ds = PYRAMID_RATIO;
        while ds < num_timepoints {
            let built = match levels.last() {
                None => channels.iter().map(|ch| minmax_buckets(ch, ds)).collect(),
                Some(prev) => prev
                    .channels
                    .iter()
                    .map(|buckets| reduce_envelope(buckets, PYRAMID_RATIO))
                    .collect(),
            };
            levels.push(Level { ds, channels: built });
            ds *= PYRAMID_RATIO;
        }
        tracing::debug!(
            channels = descriptor.num_channels(),
            timepoints = num_timepoints,
            levels = levels.len(),
            "built multiscale pyramid"
        );

        Ok(Self {
            descriptor,
            raw: channels,
            levels,
        })
    }

    /// Signal metadata.
    pub fn descriptor(&self) -> SignalDescriptor {
        self.descriptor
    }

    /// Factors with a precomputed level.
    pub fn level_factors(&self) -> Vec<usize> {
        self.levels.iter().map(|level| level.ds).collect()
    }

    /// Raw samples of one channel.
    pub fn raw_channel(&self, channel: usize) -> Option<&[f32]> {
        self.raw.get(channel).map(Vec::as_slice)
    }

    /// Channel-major payload for a segment, or `None` past the end.
    pub fn segment_payload(&self, key: SegmentKey) -> Option<Vec<f32>> {
        if key.ds == 0 {
            return None;
        }
        let width = self.descriptor.segment_width(key);
        if width == 0 {
            return None;
        }
        let start = key.index * self.descriptor.segment_size();
        let stride = SignalDescriptor::stride(key.ds);
        let mut out = Vec::with_capacity(self.raw.len() * width * stride);

        if key.ds == 1 {
            for channel in &self.raw {
                out.extend_from_slice(&channel[start..start + width]);
            }
            return Some(out);
        }

        if let Some(level) = self.levels.iter().find(|level| level.ds == key.ds) {
            for buckets in &level.channels {
                push_envelope(&mut out, &buckets[start..start + width]);
            }
        } else {
            let t1 = start * key.ds;
            let t2 = ((start + width) * key.ds).min(self.descriptor.num_timepoints());
            for channel in &self.raw {
                push_envelope(&mut out, &minmax_buckets(&channel[t1..t2], key.ds));
            }
        }
        Some(out)
    }

    /// Encoded payload for a segment, as a backend would send it.
    pub fn encoded_segment(&self, key: SegmentKey) -> Option<Vec<u8>> {
        let values = self.segment_payload(key)?;
        Some(payload::encode_segment(self.raw.len(), &values))
    }

    /// Answer a request by writing the segment into `store`.
    pub fn fulfill(
        &self,
        store: &mut SegmentedSignalStore,
        request: SegmentRequest,
    ) -> Result<SegmentStatus, SegmentError> {
        let Some(values) = self.segment_payload(request.key) else {
            store.mark_failed(request.key.ds, request.key.index);
            let count = self.descriptor.segment_count(request.key.ds);
            return Err(SegmentError::OutOfRange {
                key: request.key,
                count,
            });
        };
        store.accept_segment(request.epoch, request.key.ds, request.key.index, values)
    }

    /// Estimate a channel layout from the first `max_samples` samples.
    pub fn channel_layout(&self, max_samples: usize) -> ChannelLayout {
        let heads: Vec<&[f32]> = self
            .raw
            .iter()
            .map(|ch| &ch[..ch.len().min(max_samples)])
            .collect();
        ChannelLayout::estimate(&heads)
    }
}

fn push_envelope(out: &mut Vec<f32>, buckets: &[MinMax]) {
    for bucket in buckets {
        out.push(bucket.min);
        out.push(bucket.max);
    }
}
