use std::sync::Arc;

/// Floor for the normalization divisor so silence doesn't divide by zero.
const NORMALIZE_EPSILON: f32 = 1e-6;

/// Normalized per-column peak amplitudes, one entry per surface pixel at the
/// time the track was decoded.
///
/// Immutable once built; a new load replaces it wholesale.
#[derive(Clone, Debug, PartialEq)]
pub struct PeakBuffer {
    values: Arc<[f32]>,
}

impl PeakBuffer {
    /// Reduce `samples` to `target_width` peaks in [0, 1].
    ///
    /// Samples are split into `target_width` buckets of
    /// `max(1, samples.len() / target_width)` samples; leftovers from the
    /// integer division are dropped. Each bucket keeps its largest absolute
    /// sample, and the whole buffer is scaled so the loudest bucket is 1.
    pub fn compute(samples: &[f32], target_width: usize) -> Self {
        let samples_per_bucket = (samples.len() / target_width.max(1)).max(1);

        let mut values = Vec::with_capacity(target_width);
        let mut max = NORMALIZE_EPSILON;
        for i in 0..target_width {
            let start = (i * samples_per_bucket).min(samples.len());
            let end = (start + samples_per_bucket).min(samples.len());
            let peak = samples[start..end]
                .iter()
                .map(|s| s.abs())
                .fold(0.0f32, |acc, v| if v > acc { v } else { acc });
            values.push(peak);
            if peak > max {
                max = peak;
            }
        }

        for v in &mut values {
            *v = (*v / max).min(1.0);
        }

        Self {
            values: values.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }
}
