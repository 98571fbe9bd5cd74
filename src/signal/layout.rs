/// Vertical placement of channel traces.
///
/// A sample `v` of channel `m` is drawn at `(v + offsets[m]) * scale` in the
/// panel's coordinate Y range.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelLayout {
    /// Per-channel additive offset.
    pub offsets: Vec<f32>,
    /// Shared amplitude scale.
    pub scale: f32,
}

impl ChannelLayout {
    /// Zero offsets and unit scale.
    pub fn identity(num_channels: usize) -> Self {
        Self {
            offsets: vec![0.0; num_channels],
            scale: 1.0,
        }
    }

    /// Estimate offsets and scale from an initial block of raw samples.
    ///
    /// Each channel is centered on its mean; the scale maps the 90th
    /// percentile of centered magnitudes (over all channels) to half a panel.
    pub fn estimate<S: AsRef<[f32]>>(channels: &[S]) -> Self {
        let offsets: Vec<f32> = channels
            .iter()
            .map(|samples| {
                let (sum, count) = samples
                    .as_ref()
                    .iter()
                    .filter(|v| v.is_finite())
                    .fold((0.0f64, 0usize), |(sum, n), v| (sum + *v as f64, n + 1));
                if count == 0 {
                    0.0
                } else {
                    -(sum / count as f64) as f32
                }
            })
            .collect();

        let mut magnitudes: Vec<f32> = channels
            .iter()
            .zip(&offsets)
            .flat_map(|(samples, offset)| {
                samples
                    .as_ref()
                    .iter()
                    .filter(|v| v.is_finite())
                    .map(move |v| (v + offset).abs())
            })
            .collect();
        let p90 = percentile(&mut magnitudes, 0.9);
        let scale = match p90 {
            Some(p) if p > 0.0 => 1.0 / (2.0 * p),
            _ => 1.0,
        };
        Self { offsets, scale }
    }

    /// Offset of one channel, zero when unknown.
    pub fn offset(&self, channel: usize) -> f32 {
        self.offsets.get(channel).copied().unwrap_or(0.0)
    }
}

fn percentile(values: &mut [f32], q: f64) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f32::total_cmp);
    let pos = q * (values.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = (pos - lo as f64) as f32;
    Some(values[lo] + (values[hi] - values[lo]) * frac)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centers_channels_and_scales_to_p90() {
        let ch0: Vec<f32> = (0..11).map(|i| 100.0 + i as f32 - 5.0).collect();
        let ch1 = vec![-3.0f32; 11];
        let layout = ChannelLayout::estimate(&[ch0, ch1]);
        assert_eq!(layout.offsets, vec![-100.0, 3.0]);
        // twelve zeros then 1,1,2,2,3,3,4,4,5,5; position 18.9 falls between two 4s
        assert!((layout.scale - 0.125).abs() < 1e-6, "{}", layout.scale);
    }

    #[test]
    fn flat_signal_falls_back_to_unit_scale() {
        let layout = ChannelLayout::estimate(&[vec![2.0f32; 8]]);
        assert_eq!(layout.offsets, vec![-2.0]);
        assert_eq!(layout.scale, 1.0);
        assert_eq!(layout.offset(5), 0.0);
    }
}
