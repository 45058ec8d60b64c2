//! Scale bank construction
//!
//! Scales are expressed in seconds and spaced geometrically with a fixed
//! number of points per octave.

use crate::error::{Result, ScalogramError};
use crate::wavelet::WaveletFamily;

/// Default resolution of the scale bank
pub const DEFAULT_POINTS_PER_OCTAVE: u32 = 12;

/// Octaves covered by the automatic range at most
const AUTO_MAX_OCTAVES: i32 = 10;

/// Strictly increasing, non-empty set of positive scales (seconds)
#[derive(Debug, Clone, PartialEq)]
pub struct ScaleSet {
    scales: Vec<f64>,
}

impl ScaleSet {
    /// Build from explicit scale values
    pub fn from_scales(scales: Vec<f64>) -> Result<Self> {
        if scales.is_empty() {
            return Err(ScalogramError::InvalidScale("Scale set is empty".to_string()));
        }
        if let Some(&bad) = scales.iter().find(|s| !s.is_finite() || **s <= 0.0) {
            return Err(ScalogramError::InvalidScale(format!(
                "Scales must be positive and finite, got {}",
                bad
            )));
        }
        if scales.windows(2).any(|w| w[1] <= w[0]) {
            return Err(ScalogramError::InvalidScale(
                "Scales must be strictly increasing".to_string(),
            ));
        }
        Ok(Self { scales })
    }

    /// Geometric scales `scale_min * 2^(k / points_per_octave)` up to `scale_max`
    pub fn geometric(scale_min: f64, scale_max: f64, points_per_octave: u32) -> Result<Self> {
        if points_per_octave == 0 {
            return Err(ScalogramError::InvalidScale(
                "Points per octave must be at least 1".to_string(),
            ));
        }
        if !scale_min.is_finite() || !scale_max.is_finite() || scale_min <= 0.0 {
            return Err(ScalogramError::InvalidScale(format!(
                "Invalid scale range {} - {}",
                scale_min, scale_max
            )));
        }
        if scale_max < scale_min {
            return Err(ScalogramError::InvalidScale(format!(
                "Maximum scale {} is below minimum scale {}",
                scale_max, scale_min
            )));
        }

        let octaves = (scale_max / scale_min).log2();
        // Tolerance keeps an exact upper bound from being dropped by rounding
        let count = (octaves * points_per_octave as f64 + 1e-9).floor() as usize + 1;

        let scales = (0..count)
            .map(|k| scale_min * 2f64.powf(k as f64 / points_per_octave as f64))
            .collect();

        Self::from_scales(scales)
    }

    /// Scales matching a frequency band of interest (Hz) for the given wavelet
    pub fn from_frequency_range(
        family: WaveletFamily,
        freq_min: f64,
        freq_max: f64,
        points_per_octave: u32,
    ) -> Result<Self> {
        if !freq_min.is_finite() || !freq_max.is_finite() || freq_min <= 0.0 {
            return Err(ScalogramError::InvalidScale(format!(
                "Invalid frequency range {} - {} Hz",
                freq_min, freq_max
            )));
        }
        if freq_max < freq_min {
            return Err(ScalogramError::InvalidScale(format!(
                "Maximum frequency {} Hz is below minimum frequency {} Hz",
                freq_max, freq_min
            )));
        }
        Self::geometric(
            family.frequency_to_scale(freq_max),
            family.frequency_to_scale(freq_min),
            points_per_octave,
        )
    }

    pub fn scales(&self) -> &[f64] {
        &self.scales
    }

    pub fn len(&self) -> usize {
        self.scales.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scales.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        self.scales.get(index).copied()
    }

    /// Equivalent frequency (Hz) of every scale, in scale order (decreasing)
    pub fn frequencies(&self, family: WaveletFamily) -> Vec<f64> {
        self.scales
            .iter()
            .map(|&s| family.scale_to_frequency(s))
            .collect()
    }

    /// Index of the scale whose equivalent frequency is closest to `frequency`
    pub fn nearest_frequency_index(&self, family: WaveletFamily, frequency: f64) -> usize {
        self.frequencies(family)
            .iter()
            .enumerate()
            .min_by(|a, b| {
                (a.1 - frequency)
                    .abs()
                    .total_cmp(&(b.1 - frequency).abs())
            })
            .map(|(i, _)| i)
            .unwrap_or(0)
    }
}

/// How the scale range is chosen
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScaleRange {
    /// Derived from the sample rate and the signal length
    Auto,
    /// Band of interest in Hz
    Frequency { min_hz: f64, max_hz: f64 },
    /// Explicit scale bounds in seconds
    Scale { min: f64, max: f64 },
}

impl Default for ScaleRange {
    fn default() -> Self {
        ScaleRange::Auto
    }
}

/// Scale bank configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleConfig {
    pub range: ScaleRange,
    pub points_per_octave: u32,
}

impl Default for ScaleConfig {
    fn default() -> Self {
        Self {
            range: ScaleRange::Auto,
            points_per_octave: DEFAULT_POINTS_PER_OCTAVE,
        }
    }
}

impl ScaleConfig {
    /// Create a new scale configuration with validation
    pub fn new(range: ScaleRange, points_per_octave: u32) -> Result<Self> {
        if points_per_octave == 0 || points_per_octave > 96 {
            return Err(ScalogramError::InvalidConfig(format!(
                "Points per octave must be between 1 and 96, got {}",
                points_per_octave
            )));
        }
        Ok(Self {
            range,
            points_per_octave,
        })
    }

    /// Build the scale set for one signal
    pub fn resolve(
        &self,
        family: WaveletFamily,
        sample_rate: f64,
        signal_len: usize,
    ) -> Result<ScaleSet> {
        match self.range {
            ScaleRange::Auto => {
                let (min_hz, max_hz) = auto_frequency_range(sample_rate, signal_len);
                ScaleSet::from_frequency_range(family, min_hz, max_hz, self.points_per_octave)
            }
            ScaleRange::Frequency { min_hz, max_hz } => {
                ScaleSet::from_frequency_range(family, min_hz, max_hz, self.points_per_octave)
            }
            ScaleRange::Scale { min, max } => {
                ScaleSet::geometric(min, max, self.points_per_octave)
            }
        }
    }
}

/// Frequency band used when none is configured
///
/// Upper bound at a quarter of the sample rate, lower bound at four cycles
/// over the recording, limited to ten octaves.
pub fn auto_frequency_range(sample_rate: f64, signal_len: usize) -> (f64, f64) {
    let max_hz = sample_rate / 4.0;
    let floor_hz = max_hz / 2f64.powi(AUTO_MAX_OCTAVES);
    let cycles_hz = 4.0 * sample_rate / signal_len.max(1) as f64;
    let min_hz = cycles_hz.max(floor_hz).min(max_hz);
    (min_hz, max_hz)
}
