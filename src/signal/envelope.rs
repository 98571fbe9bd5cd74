//! Min/max envelopes for downsampled buckets.

/// Min/max envelope of one bucket.
///
/// An empty bucket, or one holding only NaN samples, has both bounds NaN.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinMax {
    /// Smallest sample.
    pub min: f32,
    /// Largest sample.
    pub max: f32,
}

impl MinMax {
    /// Envelope with no samples.
    pub const EMPTY: Self = Self {
        min: f32::NAN,
        max: f32::NAN,
    };

    /// Envelope of a single sample.
    pub fn from_sample(value: f32) -> Self {
        Self {
            min: value,
            max: value,
        }
    }

    /// Check whether the envelope holds any sample.
    pub fn is_empty(&self) -> bool {
        self.min.is_nan() || self.max.is_nan()
    }

    /// Combine two envelopes: min of mins and max of maxes.
    pub fn merge(self, other: Self) -> Self {
        // f32::min/max ignore a NaN operand, so empty envelopes drop out.
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    fn push(&mut self, value: f32) {
        *self = self.merge(Self::from_sample(value));
    }
}

/// Reduce raw samples into buckets of `ds` samples.
///
/// The trailing bucket may be partial. `ds == 0` yields no buckets.
pub fn minmax_buckets(samples: &[f32], ds: usize) -> Vec<MinMax> {
    if ds == 0 {
        return Vec::new();
    }
    samples
        .chunks(ds)
        .map(|chunk| {
            let mut bucket = MinMax::EMPTY;
            for value in chunk {
                bucket.push(*value);
            }
            bucket
        })
        .collect()
}

/// Reduce an envelope level by `ratio`, merging consecutive buckets.
pub fn reduce_envelope(level: &[MinMax], ratio: usize) -> Vec<MinMax> {
    if ratio == 0 {
        return Vec::new();
    }
    level
        .chunks(ratio)
        .map(|chunk| chunk.iter().fold(MinMax::EMPTY, |acc, b| acc.merge(*b)))
        .collect()
}
