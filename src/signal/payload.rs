//! Binary array codec for segment payloads.
//!
//! Layout: a little-endian `i32` header `[type_code, bytes_per_entry,
//! num_dims, dim_1, .., dim_n]` followed by the entries in column-major order
//! (first index fastest). A `[channels, buckets]` array therefore stores
//! `value(ch, t)` at `ch + channels * t`.

use crate::error::PayloadError;

const MAX_DIMS: i32 = 5;

/// Element type of an encoded array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleType {
    /// Signed 16-bit integers.
    Int16,
    /// 32-bit floats.
    Float32,
    /// 64-bit floats.
    Float64,
}

impl SampleType {
    /// Header type code.
    pub fn code(self) -> i32 {
        match self {
            Self::Int16 => -4,
            Self::Float32 => -3,
            Self::Float64 => -7,
        }
    }

    /// Decode a header type code.
    pub fn from_code(code: i32) -> Result<Self, PayloadError> {
        match code {
            -4 => Ok(Self::Int16),
            -3 => Ok(Self::Float32),
            -7 => Ok(Self::Float64),
            other => Err(PayloadError::UnsupportedType(other)),
        }
    }

    /// Bytes per entry.
    pub fn size(self) -> usize {
        match self {
            Self::Int16 => 2,
            Self::Float32 => 4,
            Self::Float64 => 8,
        }
    }

    fn read(self, bytes: &[u8]) -> f32 {
        match self {
            Self::Int16 => i16::from_le_bytes([bytes[0], bytes[1]]) as f32,
            Self::Float32 => f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            Self::Float64 => {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(&bytes[..8]);
                f64::from_le_bytes(raw) as f32
            }
        }
    }
}

/// A decoded array, values widened or narrowed to `f32`.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedArray {
    /// Encoded element type.
    pub sample_type: SampleType,
    /// Dimension lengths.
    pub dims: Vec<usize>,
    /// Entries in column-major order.
    pub values: Vec<f32>,
}

impl DecodedArray {
    /// Parse an encoded buffer.
    pub fn decode(bytes: &[u8]) -> Result<Self, PayloadError> {
        let num_dims = read_i32(bytes, 2)?;
        if !(1..=MAX_DIMS).contains(&num_dims) {
            return Err(PayloadError::Dimensions(num_dims));
        }
        let header_len = (num_dims as usize + 3) * 4;
        if bytes.len() < header_len {
            return Err(PayloadError::Truncated {
                needed: header_len,
                available: bytes.len(),
            });
        }

        let sample_type = SampleType::from_code(read_i32(bytes, 0)?)?;
        let entry_size = read_i32(bytes, 1)?;
        if entry_size != sample_type.size() as i32 {
            return Err(PayloadError::EntrySize {
                expected: sample_type.size() as i32,
                actual: entry_size,
            });
        }

        let mut dims = Vec::with_capacity(num_dims as usize);
        for i in 0..num_dims as usize {
            let len = read_i32(bytes, 3 + i)?;
            if len < 0 {
                return Err(PayloadError::DimensionLength(len));
            }
            dims.push(len as usize);
        }

        let Some(expected) = dims.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d)) else {
            return Err(PayloadError::Oversized(dims));
        };
        let body = &bytes[header_len..];
        let size = sample_type.size();
        if body.len() % size != 0 || body.len() / size != expected {
            return Err(PayloadError::BodyLength {
                expected,
                actual: body.len() / size,
            });
        }
        let values = body.chunks_exact(size).map(|raw| sample_type.read(raw)).collect();
        Ok(Self {
            sample_type,
            dims,
            values,
        })
    }

    /// Convert a `[channels, buckets]` array into the store's channel-major
    /// layout. Trailing unit dimensions are ignored.
    pub fn into_channel_major(self) -> Result<Vec<f32>, PayloadError> {
        let (channels, len) = match self.dims.as_slice() {
            [channels] => (*channels, 1),
            [channels, len, rest @ ..] if rest.iter().all(|d| *d == 1) => (*channels, *len),
            _ => return Err(PayloadError::Shape(self.dims)),
        };
        let mut out = vec![0.0; channels * len];
        for t in 0..len {
            for ch in 0..channels {
                out[ch * len + t] = self.values[ch + channels * t];
            }
        }
        Ok(out)
    }
}

/// Decode a segment payload straight into the store's layout.
pub fn decode_segment(bytes: &[u8]) -> Result<Vec<f32>, PayloadError> {
    DecodedArray::decode(bytes)?.into_channel_major()
}

/// Encode a column-major `f32` array.
pub fn encode_f32(dims: &[usize], values: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity((dims.len() + 3) * 4 + values.len() * 4);
    out.extend_from_slice(&SampleType::Float32.code().to_le_bytes());
    out.extend_from_slice(&(SampleType::Float32.size() as i32).to_le_bytes());
    out.extend_from_slice(&(dims.len() as i32).to_le_bytes());
    for dim in dims {
        out.extend_from_slice(&(*dim as i32).to_le_bytes());
    }
    for value in values {
        out.extend_from_slice(&value.to_le_bytes());
    }
    out
}

/// Encode a channel-major segment payload as a `[channels, len]` array.
pub fn encode_segment(channels: usize, channel_major: &[f32]) -> Vec<u8> {
    let len = if channels == 0 {
        0
    } else {
        channel_major.len() / channels
    };
    let mut column_major = vec![0.0; channels * len];
    for ch in 0..channels {
        for t in 0..len {
            column_major[ch + channels * t] = channel_major[ch * len + t];
        }
    }
    encode_f32(&[channels, len], &column_major)
}

fn read_i32(bytes: &[u8], index: usize) -> Result<i32, PayloadError> {
    let start = index * 4;
    let raw = bytes.get(start..start + 4).ok_or(PayloadError::Truncated {
        needed: start + 4,
        available: bytes.len(),
    })?;
    Ok(i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(code: i32, size: i32, dims: &[i32]) -> Vec<u8> {
        let mut out = Vec::new();
        for v in [code, size, dims.len() as i32].iter().chain(dims) {
            out.extend_from_slice(&v.to_le_bytes());
        }
        out
    }

    #[test]
    fn segment_layout_is_transposed() {
        // two channels, three buckets: ch0 = 1,2,3 and ch1 = 10,20,30
        let bytes = encode_segment(2, &[1.0, 2.0, 3.0, 10.0, 20.0, 30.0]);
        let array = DecodedArray::decode(&bytes).unwrap();
        assert_eq!(array.dims, vec![2, 3]);
        assert_eq!(array.values, vec![1.0, 10.0, 2.0, 20.0, 3.0, 30.0]);
        assert_eq!(
            array.into_channel_major().unwrap(),
            vec![1.0, 2.0, 3.0, 10.0, 20.0, 30.0]
        );
    }

    #[test]
    fn decodes_int16_and_float64() {
        let mut bytes = header(-4, 2, &[1, 2]);
        bytes.extend_from_slice(&(-7i16).to_le_bytes());
        bytes.extend_from_slice(&300i16.to_le_bytes());
        assert_eq!(decode_segment(&bytes).unwrap(), vec![-7.0, 300.0]);

        let mut bytes = header(-7, 8, &[2]);
        bytes.extend_from_slice(&0.25f64.to_le_bytes());
        bytes.extend_from_slice(&(-1.5f64).to_le_bytes());
        let array = DecodedArray::decode(&bytes).unwrap();
        assert_eq!(array.sample_type, SampleType::Float64);
        assert_eq!(array.values, vec![0.25, -1.5]);
    }

    #[test]
    fn rejects_malformed_headers() {
        assert!(matches!(
            DecodedArray::decode(&[0, 0]),
            Err(PayloadError::Truncated { .. })
        ));
        assert_eq!(
            DecodedArray::decode(&header(-2, 4, &[1])),
            Err(PayloadError::UnsupportedType(-2))
        );
        assert_eq!(
            DecodedArray::decode(&header(-3, 8, &[1])),
            Err(PayloadError::EntrySize { expected: 4, actual: 8 })
        );
        assert_eq!(
            DecodedArray::decode(&header(-3, 4, &[1, 1, 1, 1, 1, 1])),
            Err(PayloadError::Dimensions(6))
        );
        assert_eq!(
            DecodedArray::decode(&header(-3, 4, &[2, -1])),
            Err(PayloadError::DimensionLength(-1))
        );
    }

    #[test]
    fn rejects_body_length_mismatch() {
        let mut bytes = header(-3, 4, &[2, 2]);
        bytes.extend_from_slice(&1.0f32.to_le_bytes());
        assert_eq!(
            DecodedArray::decode(&bytes),
            Err(PayloadError::BodyLength { expected: 4, actual: 1 })
        );
    }

    #[test]
    fn rejects_dims_whose_product_overflows() {
        let mut bytes = header(-3, 4, &[i32::MAX; 5]);
        bytes.extend_from_slice(&0.0f32.to_le_bytes());
        assert_eq!(
            DecodedArray::decode(&bytes),
            Err(PayloadError::Oversized(vec![i32::MAX as usize; 5]))
        );
    }

    #[test]
    fn rejects_three_dimensional_segments() {
        let bytes = encode_f32(&[1, 2, 2], &[0.0; 4]);
        assert_eq!(decode_segment(&bytes), Err(PayloadError::Shape(vec![1, 2, 2])));
    }
}
