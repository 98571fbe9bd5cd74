//! Error types surfaced at construction and segment boundaries.
//!
//! View-state mutations never fail loudly; they return an empty
//! [`ViewUpdate`](crate::timeaxis::ViewUpdate) instead. Errors here cover the
//! places where the host hands the core something it cannot use.

use thiserror::Error;

use crate::signal::SegmentKey;

/// Invalid signal metadata.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DescriptorError {
    /// Sample rate must be finite and positive.
    #[error("sample rate must be finite and positive, got {0}")]
    SampleRate(f64),
    /// At least one channel is required.
    #[error("signal must have at least one channel")]
    NoChannels,
    /// Segments must hold at least one bucket.
    #[error("segment size must be positive")]
    SegmentSize,
}

/// A segment payload the store refused to cache.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SegmentError {
    /// Downsample factors start at 1.
    #[error("downsample factor must be at least 1")]
    InvalidFactor,
    /// The segment index lies past the end of the signal.
    #[error("segment {key} is outside the signal ({count} segments at this factor)")]
    OutOfRange {
        /// Offending segment.
        key: SegmentKey,
        /// Number of segments available at the factor.
        count: usize,
    },
    /// The payload length does not match the segment shape.
    #[error("segment {key} payload has {actual} values, expected {expected}")]
    WrongLength {
        /// Offending segment.
        key: SegmentKey,
        /// Accepted payload length (full or clipped final segment).
        expected: usize,
        /// Received payload length.
        actual: usize,
    },
}

/// Failure decoding a binary segment payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    /// Buffer shorter than the header it announces.
    #[error("payload truncated: need {needed} bytes, have {available}")]
    Truncated {
        /// Bytes required.
        needed: usize,
        /// Bytes present.
        available: usize,
    },
    /// Unknown element type code.
    #[error("unsupported sample type code {0}")]
    UnsupportedType(i32),
    /// Header entry size disagrees with the type code.
    #[error("bytes per entry {actual} does not match sample type ({expected})")]
    EntrySize {
        /// Size implied by the type code.
        expected: i32,
        /// Size in the header.
        actual: i32,
    },
    /// Dimension count outside 1..=5.
    #[error("invalid number of dimensions {0}")]
    Dimensions(i32),
    /// Negative dimension length.
    #[error("invalid dimension length {0}")]
    DimensionLength(i32),
    /// Body length differs from the declared shape.
    #[error("payload body holds {actual} entries, header declares {expected}")]
    BodyLength {
        /// Entries declared by the header.
        expected: usize,
        /// Entries present in the body.
        actual: usize,
    },
    /// Shape is not a two-dimensional channel array.
    #[error("expected a [channels, buckets] array, got dims {0:?}")]
    Shape(Vec<usize>),
    /// Declared dimensions multiply past the addressable size.
    #[error("declared dims {0:?} overflow the entry count")]
    Oversized(Vec<usize>),
}

/// Invalid configuration values.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// JSON could not be parsed.
    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),
    /// A field is out of range.
    #[error("configuration field `{field}` {reason}")]
    Invalid {
        /// Field path.
        field: &'static str,
        /// What is wrong with it.
        reason: &'static str,
    },
}
