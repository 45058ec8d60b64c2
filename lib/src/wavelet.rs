//! Mother wavelets and scaled kernel generation
//!
//! Implements the wavelet families available for the transform. Each family
//! is evaluated analytically; kernels are sampled per scale on demand.

use crate::error::{Result, ScalogramError};
use crate::signal::validate_sample_rate;
use num_complex::Complex64;
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

/// Default Morlet carrier frequency (radians per unit time)
pub const DEFAULT_MORLET_OMEGA0: f64 = 6.0;

/// Default derivative-of-Gaussian order (Mexican hat)
pub const DEFAULT_DOG_ORDER: u32 = 2;

/// Highest supported derivative-of-Gaussian order
pub const MAX_DOG_ORDER: u32 = 8;

/// Longest kernel half-width, in samples, that will be generated
///
/// About 22 s of support at 48 kHz, far beyond any useful scale for the
/// recordings this library handles.
pub const MAX_KERNEL_HALF_WIDTH: usize = 1 << 20;

/// Mother wavelet families
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WaveletFamily {
    /// Complex analytic Morlet wavelet with carrier `omega0`
    Morlet { omega0: f64 },
    /// Real m-th derivative of a Gaussian
    DerivativeOfGaussian { order: u32 },
}

impl Default for WaveletFamily {
    fn default() -> Self {
        WaveletFamily::Morlet {
            omega0: DEFAULT_MORLET_OMEGA0,
        }
    }
}

impl fmt::Display for WaveletFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaveletFamily::Morlet { omega0 } => write!(f, "Morlet (omega0={})", omega0),
            WaveletFamily::DerivativeOfGaussian { order } => {
                write!(f, "Derivative of Gaussian (order {})", order)
            }
        }
    }
}

impl FromStr for WaveletFamily {
    type Err = ScalogramError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_name(s)
    }
}

impl WaveletFamily {
    /// Create a Morlet wavelet, validating the carrier frequency
    pub fn morlet(omega0: f64) -> Result<Self> {
        let family = WaveletFamily::Morlet { omega0 };
        family.validate()?;
        Ok(family)
    }

    /// Create a derivative-of-Gaussian wavelet, validating the order
    pub fn derivative_of_gaussian(order: u32) -> Result<Self> {
        let family = WaveletFamily::DerivativeOfGaussian { order };
        family.validate()?;
        Ok(family)
    }

    /// Parse from a wavelet name (e.g. "morlet", "morlet5", "dog", "dog4", "mexh")
    pub fn from_name(name: &str) -> Result<Self> {
        let lower = name.trim().to_ascii_lowercase();

        match lower.as_str() {
            "morlet" | "morl" | "cmor" => return Ok(Self::default()),
            "dog" | "derivative_of_gaussian" | "mexh" | "mexican_hat" | "ricker" => {
                return Ok(WaveletFamily::DerivativeOfGaussian {
                    order: DEFAULT_DOG_ORDER,
                })
            }
            _ => {}
        }

        if let Some(param) = lower.strip_prefix("morlet") {
            let omega0 = param
                .parse::<f64>()
                .map_err(|_| ScalogramError::InvalidWaveletFamily(name.to_string()))?;
            return Self::morlet(omega0);
        }

        if let Some(param) = lower.strip_prefix("dog") {
            let order = param
                .parse::<u32>()
                .map_err(|_| ScalogramError::InvalidWaveletFamily(name.to_string()))?;
            return Self::derivative_of_gaussian(order);
        }

        Err(ScalogramError::InvalidWaveletFamily(name.to_string()))
    }

    /// Short machine-friendly name
    pub fn name(&self) -> &'static str {
        match self {
            WaveletFamily::Morlet { .. } => "morlet",
            WaveletFamily::DerivativeOfGaussian { .. } => "derivative_of_gaussian",
        }
    }

    pub fn validate(&self) -> Result<()> {
        match *self {
            WaveletFamily::Morlet { omega0 } => {
                if !omega0.is_finite() || omega0 <= 0.0 {
                    return Err(ScalogramError::InvalidWaveletFamily(format!(
                        "Morlet omega0 must be positive, got {}",
                        omega0
                    )));
                }
            }
            WaveletFamily::DerivativeOfGaussian { order } => {
                if order == 0 || order > MAX_DOG_ORDER {
                    return Err(ScalogramError::InvalidWaveletFamily(format!(
                        "Derivative of Gaussian order must be between 1 and {}, got {}",
                        MAX_DOG_ORDER, order
                    )));
                }
            }
        }
        Ok(())
    }

    /// Whether the wavelet takes complex values
    pub fn is_complex(&self) -> bool {
        matches!(self, WaveletFamily::Morlet { .. })
    }

    /// Frequency (cycles per unit time) at which the scale-1 wavelet responds most strongly
    ///
    /// Uses the Fourier period relation of Torrence & Compo (1998), so that a
    /// sinusoid of frequency `f` peaks at scale `center_frequency / f` under
    /// `1/sqrt(scale)` normalization.
    pub fn center_frequency(&self) -> f64 {
        match *self {
            WaveletFamily::Morlet { omega0 } => {
                (omega0 + (2.0 + omega0 * omega0).sqrt()) / (4.0 * PI)
            }
            WaveletFamily::DerivativeOfGaussian { order } => {
                (order as f64 + 0.5).sqrt() / (2.0 * PI)
            }
        }
    }

    /// Half-width of the effective support of the scale-1 wavelet
    pub fn support(&self) -> f64 {
        match self {
            WaveletFamily::Morlet { .. } => 4.0,
            WaveletFamily::DerivativeOfGaussian { .. } => 5.0,
        }
    }

    /// Convert a scale (seconds) to its equivalent frequency (Hz)
    pub fn scale_to_frequency(&self, scale: f64) -> f64 {
        self.center_frequency() / scale
    }

    /// Convert a frequency (Hz) to the matching scale (seconds)
    pub fn frequency_to_scale(&self, frequency: f64) -> f64 {
        self.center_frequency() / frequency
    }

    /// Evaluate the unit-norm mother wavelet at `t`
    pub fn evaluate(&self, t: f64) -> Complex64 {
        let gaussian = (-0.5 * t * t).exp();
        match *self {
            WaveletFamily::Morlet { omega0 } => {
                let norm = PI.powf(-0.25);
                Complex64::from_polar(norm * gaussian, omega0 * t)
            }
            WaveletFamily::DerivativeOfGaussian { order } => {
                let value = -hermite(order, t) * gaussian / gamma_half_integer(order).sqrt();
                Complex64::new(value, 0.0)
            }
        }
    }

    /// Key identifying this family in kernel caches
    pub(crate) fn cache_key(&self) -> (u8, u64) {
        match *self {
            WaveletFamily::Morlet { omega0 } => (0, omega0.to_bits()),
            WaveletFamily::DerivativeOfGaussian { order } => (1, order as u64),
        }
    }
}

/// Probabilists' Hermite polynomial He_n(t)
fn hermite(n: u32, t: f64) -> f64 {
    let mut prev = 1.0;
    if n == 0 {
        return prev;
    }
    let mut curr = t;
    for k in 1..n {
        let next = t * curr - k as f64 * prev;
        prev = curr;
        curr = next;
    }
    curr
}

/// Gamma(m + 1/2)
fn gamma_half_integer(m: u32) -> f64 {
    (1..=m).fold(PI.sqrt(), |acc, k| acc * (k as f64 - 0.5))
}

/// Sampled, scale-normalized wavelet for one scale
#[derive(Debug, Clone)]
pub struct WaveletKernel {
    /// Scale in seconds
    pub scale: f64,
    /// Sample rate the kernel was sampled at
    pub sample_rate: f64,
    /// Kernel values, centered at `half_width()`
    pub values: Vec<Complex64>,
    /// Whether the imaginary part carries information
    pub is_complex: bool,
}

impl WaveletKernel {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of samples on each side of the center
    pub fn half_width(&self) -> usize {
        self.values.len() / 2
    }

    /// Discrete approximation of the kernel's L2 norm squared
    pub fn energy(&self) -> f64 {
        self.values.iter().map(|v| v.norm_sqr()).sum::<f64>() * self.sample_rate
    }

    /// Real parts of the kernel, for real wavelets
    pub fn real_values(&self) -> Vec<f64> {
        self.values.iter().map(|v| v.re).collect()
    }
}

/// Samples on each side of the kernel center for `scale` at `sample_rate`
///
/// Fails with `InvalidScale` when the kernel would be wider than
/// [`MAX_KERNEL_HALF_WIDTH`].
pub fn kernel_half_width(family: WaveletFamily, scale: f64, sample_rate: f64) -> Result<usize> {
    let width = (family.support() * scale * sample_rate).ceil();
    if !width.is_finite() || width > MAX_KERNEL_HALF_WIDTH as f64 {
        return Err(ScalogramError::InvalidScale(format!(
            "Scale {} s at {} Hz needs a kernel of {} samples per side, limit is {}",
            scale, sample_rate, width, MAX_KERNEL_HALF_WIDTH
        )));
    }
    Ok((width as usize).max(1))
}

/// Generate the kernel of `family` dilated to `scale` seconds
///
/// `k[n] = (1/fs) * (1/sqrt(scale)) * psi(n / (fs * scale))` for
/// `n in -h..=h`, which keeps `energy()` at the mother wavelet's unit norm
/// for every scale.
pub fn generate_kernel(
    family: WaveletFamily,
    scale: f64,
    sample_rate: f64,
) -> Result<WaveletKernel> {
    family.validate()?;
    validate_sample_rate(sample_rate)?;
    if !scale.is_finite() || scale <= 0.0 {
        return Err(ScalogramError::InvalidScale(format!(
            "Scale must be positive and finite, got {}",
            scale
        )));
    }

    let half_width = kernel_half_width(family, scale, sample_rate)?;
    let dt = 1.0 / sample_rate;
    let weight = dt / scale.sqrt();

    let values = (0..2 * half_width + 1)
        .map(|i| {
            let t = (i as f64 - half_width as f64) * dt / scale;
            family.evaluate(t) * weight
        })
        .collect();

    Ok(WaveletKernel {
        scale,
        sample_rate,
        values,
        is_complex: family.is_complex(),
    })
}
