use super::SegmentKey;

/// One cached block of buckets for every channel.
///
/// Values are channel-major: `values[ch * width * stride + i * stride + k]`
/// where `k` selects min (0) or max (1) when `stride == 2`.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSegment {
    key: SegmentKey,
    num_channels: usize,
    width: usize,
    stride: usize,
    values: Vec<f32>,
}

impl DataSegment {
    /// Wrap a payload whose length was already checked against the shape.
    pub(crate) fn new(
        key: SegmentKey,
        num_channels: usize,
        width: usize,
        stride: usize,
        values: Vec<f32>,
    ) -> Self {
        debug_assert_eq!(values.len(), num_channels * width * stride);
        Self {
            key,
            num_channels,
            width,
            stride,
            values,
        }
    }

    /// Segment address.
    pub fn key(&self) -> SegmentKey {
        self.key
    }

    /// Number of channels.
    pub fn num_channels(&self) -> usize {
        self.num_channels
    }

    /// Buckets held per channel.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Values per bucket.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// All values of one channel, or an empty slice when out of range.
    pub fn channel(&self, channel: usize) -> &[f32] {
        if channel >= self.num_channels {
            return &[];
        }
        let len = self.width * self.stride;
        &self.values[channel * len..(channel + 1) * len]
    }

    /// Raw payload.
    pub fn values(&self) -> &[f32] {
        &self.values
    }
}
