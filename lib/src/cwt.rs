//! Continuous Wavelet Transform engine
//!
//! Correlates a signal with a bank of scaled wavelet kernels. Every scale is
//! an independent row: rows are computed in parallel and assembled in scale
//! order. Short kernels use direct correlation, long kernels go through FFT
//! convolution (`realfft` for real wavelets, `rustfft` for complex ones).

use crate::error::{Result, ScalogramError};
use crate::padding::{pad_signal, PaddingMode};
use crate::scales::ScaleSet;
use crate::signal::Signal;
use crate::wavelet::{generate_kernel, kernel_half_width, WaveletFamily, WaveletKernel};
use num_complex::Complex64;
use rayon::prelude::*;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};
use rustfft::{Fft, FftPlanner};
use std::collections::{HashMap, HashSet};
use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

/// Kernel length above which FFT convolution is used
pub const DEFAULT_FFT_THRESHOLD: usize = 64;

/// CWT engine configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CwtConfig {
    /// Boundary extension applied before correlating
    pub padding: PaddingMode,
    /// Kernels longer than this many samples use FFT convolution
    pub fft_threshold: usize,
    /// Keep the coefficient phase next to the magnitude
    pub output_phase: bool,
}

impl Default for CwtConfig {
    fn default() -> Self {
        Self {
            padding: PaddingMode::Reflective,
            fft_threshold: DEFAULT_FFT_THRESHOLD,
            output_phase: false,
        }
    }
}

impl CwtConfig {
    /// Create a new CWT configuration with validation
    pub fn new(padding: PaddingMode, fft_threshold: usize, output_phase: bool) -> Result<Self> {
        if fft_threshold == 0 {
            return Err(ScalogramError::InvalidConfig(
                "FFT threshold must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            padding,
            fft_threshold,
            output_phase,
        })
    }

    /// Convolution algorithm for a kernel of `kernel_len` samples
    pub fn method_for(&self, kernel_len: usize) -> ConvolutionMethod {
        if kernel_len > self.fft_threshold {
            ConvolutionMethod::Fft
        } else {
            ConvolutionMethod::Direct
        }
    }
}

/// Convolution algorithm used for one scale
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvolutionMethod {
    /// O(n * kernel_len) sliding correlation
    Direct,
    /// O(n log n) FFT convolution
    Fft,
}

/// Time-scale magnitude surface produced by the transform
#[derive(Debug, Clone, PartialEq)]
pub struct CoefficientMatrix {
    /// Magnitude data (scale x time)
    pub magnitudes: Vec<Vec<f64>>,
    /// Phase data in radians (scale x time), when requested
    pub phases: Option<Vec<Vec<f64>>>,
    /// Number of scales (rows)
    pub num_scales: usize,
    /// Number of time samples (columns)
    pub num_samples: usize,
    /// Boundary extension used for every row
    pub padding: PaddingMode,
    /// Wavelet the rows were computed with
    pub family: WaveletFamily,
    /// Samples at each end of a row influenced by padding (kernel_len / 2)
    pub edge_widths: Vec<usize>,
}

impl CoefficientMatrix {
    /// Wrap precomputed magnitude rows (no phase, no edge information)
    pub fn from_magnitudes(magnitudes: Vec<Vec<f64>>, family: WaveletFamily) -> Self {
        let num_scales = magnitudes.len();
        let num_samples = magnitudes.first().map_or(0, |row| row.len());
        Self {
            magnitudes,
            phases: None,
            num_scales,
            num_samples,
            padding: PaddingMode::default(),
            family,
            edge_widths: vec![0; num_scales],
        }
    }

    /// (rows, columns)
    pub fn dims(&self) -> (usize, usize) {
        (self.num_scales, self.num_samples)
    }

    pub fn is_empty(&self) -> bool {
        self.num_scales == 0 || self.num_samples == 0
    }

    pub fn row(&self, scale_index: usize) -> &[f64] {
        &self.magnitudes[scale_index]
    }

    /// Largest magnitude in the matrix (0 for an empty matrix)
    pub fn max_magnitude(&self) -> f64 {
        self.magnitudes
            .iter()
            .flat_map(|row| row.iter())
            .fold(0.0, |acc: f64, &v| acc.max(v))
    }

    /// Columns of a row that are not influenced by padding
    pub fn interior(&self, scale_index: usize) -> Range<usize> {
        let edge = self.edge_widths[scale_index];
        if 2 * edge >= self.num_samples {
            return 0..0;
        }
        edge..self.num_samples - edge
    }

    /// Peak magnitude of a row, over its interior when it has one
    pub fn row_peak(&self, scale_index: usize) -> f64 {
        let row = self.row(scale_index);
        let interior = self.interior(scale_index);
        let values = if interior.is_empty() {
            row
        } else {
            &row[interior]
        };
        values.iter().fold(0.0, |acc: f64, &v| acc.max(v))
    }
}

/// Compute next power of 2 (for FFT sizes)
pub fn next_fast_len(n: usize) -> usize {
    n.max(1).next_power_of_two()
}

/// Most kernels a [`KernelCache`] holds unless configured otherwise
pub const DEFAULT_KERNEL_CACHE_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct KernelKey {
    family: (u8, u64),
    scale: u64,
    sample_rate: u64,
}

impl KernelKey {
    fn new(family: WaveletFamily, scale: f64, sample_rate: f64) -> Self {
        Self {
            family: family.cache_key(),
            scale: scale.to_bits(),
            sample_rate: sample_rate.to_bits(),
        }
    }
}

/// Frequency response of the time-reversed, conjugated kernel
enum KernelSpectrum {
    /// Half spectrum from a real-to-complex FFT
    Real(Vec<Complex64>),
    /// Full complex spectrum
    Complex(Vec<Complex64>),
}

/// Kernel plus what is needed to apply it to one signal length
///
/// Lives only while its row is computed.
struct PreparedKernel {
    kernel: Arc<WaveletKernel>,
    method: ConvolutionMethod,
    /// FFT length (0 for direct correlation)
    fft_size: usize,
    spectrum: Option<KernelSpectrum>,
}

/// Sampled kernels keyed by (family, scale, sample rate)
///
/// Owned by whoever runs the transforms (one per batch run) so parallel
/// files share kernels without a process-wide table. Entries do not depend
/// on the signal length, so files of any duration reuse them. Once
/// `capacity` kernels are held, new ones are generated but not stored.
#[derive(Debug)]
pub struct KernelCache {
    entries: RwLock<HashMap<KernelKey, Arc<WaveletKernel>>>,
    capacity: usize,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl Default for KernelCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_KERNEL_CACHE_CAPACITY)
    }
}

impl KernelCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            capacity,
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of kernels held
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> usize {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }

    /// Kernel of `family` at `scale`, generated on a miss
    pub fn kernel(
        &self,
        family: WaveletFamily,
        scale: f64,
        sample_rate: f64,
    ) -> Result<Arc<WaveletKernel>> {
        let key = KernelKey::new(family, scale, sample_rate);
        {
            let entries = self
                .entries
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Some(kernel) = entries.get(&key) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(Arc::clone(kernel));
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        // Generated outside the lock; a concurrent insert of the same key wins
        let kernel = Arc::new(generate_kernel(family, scale, sample_rate)?);
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(existing) = entries.get(&key) {
            return Ok(Arc::clone(existing));
        }
        if entries.len() < self.capacity {
            entries.insert(key, Arc::clone(&kernel));
        }
        Ok(kernel)
    }
}

struct RealPlan {
    forward: Arc<dyn RealToComplex<f64>>,
    inverse: Arc<dyn ComplexToReal<f64>>,
}

struct ComplexPlan {
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
}

/// FFT plans for every size one transform needs, built before going parallel
struct FftPlans {
    real: HashMap<usize, RealPlan>,
    complex: HashMap<usize, ComplexPlan>,
}

impl FftPlans {
    fn for_sizes(real_sizes: &HashSet<usize>, complex_sizes: &HashSet<usize>) -> Self {
        let mut real_planner = RealFftPlanner::<f64>::new();
        let real = real_sizes
            .iter()
            .map(|&size| {
                let plan = RealPlan {
                    forward: real_planner.plan_fft_forward(size),
                    inverse: real_planner.plan_fft_inverse(size),
                };
                (size, plan)
            })
            .collect();

        let mut planner = FftPlanner::<f64>::new();
        let complex = complex_sizes
            .iter()
            .map(|&size| {
                let plan = ComplexPlan {
                    forward: planner.plan_fft_forward(size),
                    inverse: planner.plan_fft_inverse(size),
                };
                (size, plan)
            })
            .collect();

        Self { real, complex }
    }

    fn real(&self, size: usize) -> Result<&RealPlan> {
        self.real.get(&size).ok_or_else(|| {
            ScalogramError::TransformFailure(format!("No real FFT plan for size {}", size))
        })
    }

    fn complex(&self, size: usize) -> Result<&ComplexPlan> {
        self.complex.get(&size).ok_or_else(|| {
            ScalogramError::TransformFailure(format!("No complex FFT plan for size {}", size))
        })
    }
}

fn fft_error(e: realfft::FftError) -> ScalogramError {
    ScalogramError::TransformFailure(format!("FFT error: {}", e))
}

/// CWT engine for forward transforms
#[derive(Debug, Clone, Default)]
pub struct CwtEngine {
    config: CwtConfig,
}

impl CwtEngine {
    /// Create a new CWT engine
    pub fn new(config: CwtConfig) -> Self {
        Self { config }
    }

    /// Get the configuration
    pub fn config(&self) -> &CwtConfig {
        &self.config
    }

    /// Transform `signal` over every scale of `scales`
    pub fn transform(
        &self,
        signal: &Signal,
        scales: &ScaleSet,
        family: WaveletFamily,
    ) -> Result<CoefficientMatrix> {
        let cache = KernelCache::new();
        self.transform_with_cache(signal, scales, family, &cache)
    }

    /// Transform reusing prepared kernels from `cache`
    pub fn transform_with_cache(
        &self,
        signal: &Signal,
        scales: &ScaleSet,
        family: WaveletFamily,
        cache: &KernelCache,
    ) -> Result<CoefficientMatrix> {
        family.validate()?;
        signal.validate()?;

        let samples = signal.samples();
        let n = samples.len();
        let sample_rate = signal.sample_rate();

        // Plan every FFT size up front so the per-scale work only reads plans
        let mut real_sizes = HashSet::new();
        let mut complex_sizes = HashSet::new();
        for &scale in scales.scales() {
            let half = kernel_half_width(family, scale, sample_rate)?;
            if self.config.method_for(2 * half + 1) == ConvolutionMethod::Fft {
                let size = next_fast_len(n + 2 * half);
                if family.is_complex() {
                    complex_sizes.insert(size);
                } else {
                    real_sizes.insert(size);
                }
            }
        }
        let plans = FftPlans::for_sizes(&real_sizes, &complex_sizes);

        log::info!(
            "CWT of '{}': {} scales x {} samples, {}, {} padding, {} FFT sizes",
            signal.identifier(),
            scales.len(),
            n,
            family,
            self.config.padding,
            real_sizes.len() + complex_sizes.len()
        );

        let num_scales = scales.len();
        let rows = scales
            .scales()
            .par_iter()
            .enumerate()
            .map(|(i, &scale)| {
                let kernel = cache.kernel(family, scale, sample_rate)?;
                let prepared = prepare_kernel(kernel, n, &self.config, &plans)?;

                log::debug!(
                    "Scale {}/{}: {:.6}s, kernel {} samples, {:?}",
                    i + 1,
                    num_scales,
                    scale,
                    prepared.kernel.len(),
                    prepared.method
                );

                let coefficients = self.correlate_row(samples, &prepared, &plans)?;
                let magnitudes: Vec<f64> = coefficients.iter().map(|c| c.norm()).collect();
                let phases = if self.config.output_phase {
                    Some(coefficients.iter().map(|c| c.arg()).collect::<Vec<f64>>())
                } else {
                    None
                };
                Ok((magnitudes, phases, prepared.kernel.half_width()))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut magnitudes = Vec::with_capacity(num_scales);
        let mut phases = Vec::with_capacity(num_scales);
        let mut edge_widths = Vec::with_capacity(num_scales);
        for (row_mags, row_phases, edge) in rows {
            magnitudes.push(row_mags);
            if let Some(p) = row_phases {
                phases.push(p);
            }
            edge_widths.push(edge);
        }

        Ok(CoefficientMatrix {
            magnitudes,
            phases: if self.config.output_phase {
                Some(phases)
            } else {
                None
            },
            num_scales,
            num_samples: n,
            padding: self.config.padding,
            family,
            edge_widths,
        })
    }

    /// Coefficients `W[b] = sum_j p[b + j] * conj(k[j])` for one scale
    fn correlate_row(
        &self,
        samples: &[f64],
        prepared: &PreparedKernel,
        plans: &FftPlans,
    ) -> Result<Vec<Complex64>> {
        let n = samples.len();
        let half = prepared.kernel.half_width();
        let padded = pad_signal(samples, half, self.config.padding);

        match &prepared.spectrum {
            None => Ok(correlate_direct(&padded, &prepared.kernel, n)),
            Some(KernelSpectrum::Real(spectrum)) => {
                let plan = plans.real(prepared.fft_size)?;
                correlate_fft_real(&padded, spectrum, prepared.fft_size, half, n, plan)
            }
            Some(KernelSpectrum::Complex(spectrum)) => {
                let plan = plans.complex(prepared.fft_size)?;
                Ok(correlate_fft_complex(
                    &padded,
                    spectrum,
                    prepared.fft_size,
                    half,
                    n,
                    plan,
                ))
            }
        }
    }
}

/// Transform with the default engine configuration
pub fn transform(
    signal: &Signal,
    scales: &ScaleSet,
    family: WaveletFamily,
) -> Result<CoefficientMatrix> {
    CwtEngine::default().transform(signal, scales, family)
}

fn prepare_kernel(
    kernel: Arc<WaveletKernel>,
    signal_len: usize,
    config: &CwtConfig,
    plans: &FftPlans,
) -> Result<PreparedKernel> {
    let method = config.method_for(kernel.len());

    if method == ConvolutionMethod::Direct {
        return Ok(PreparedKernel {
            kernel,
            method,
            fft_size: 0,
            spectrum: None,
        });
    }

    let fft_size = next_fast_len(signal_len + 2 * kernel.half_width());

    // Convolving with the reversed conjugate kernel turns convolution into correlation
    let spectrum = if kernel.is_complex {
        let plan = plans.complex(fft_size)?;
        let mut buffer = vec![Complex64::new(0.0, 0.0); fft_size];
        for (slot, value) in buffer.iter_mut().zip(kernel.values.iter().rev()) {
            *slot = value.conj();
        }
        plan.forward.process(&mut buffer);
        KernelSpectrum::Complex(buffer)
    } else {
        let plan = plans.real(fft_size)?;
        let mut input = vec![0.0; fft_size];
        for (slot, value) in input.iter_mut().zip(kernel.values.iter().rev()) {
            *slot = value.re;
        }
        let mut output = plan.forward.make_output_vec();
        plan.forward
            .process(&mut input, &mut output)
            .map_err(fft_error)?;
        KernelSpectrum::Real(output)
    };

    Ok(PreparedKernel {
        kernel,
        method,
        fft_size,
        spectrum: Some(spectrum),
    })
}

fn correlate_direct(padded: &[f64], kernel: &WaveletKernel, n: usize) -> Vec<Complex64> {
    let len = kernel.len();

    if kernel.is_complex {
        let conj: Vec<Complex64> = kernel.values.iter().map(|v| v.conj()).collect();
        (0..n)
            .map(|b| {
                padded[b..b + len]
                    .iter()
                    .zip(conj.iter())
                    .map(|(&x, &k)| k * x)
                    .sum::<Complex64>()
            })
            .collect()
    } else {
        let real = kernel.real_values();
        (0..n)
            .map(|b| {
                let sum: f64 = padded[b..b + len]
                    .iter()
                    .zip(real.iter())
                    .map(|(&x, &k)| x * k)
                    .sum();
                Complex64::new(sum, 0.0)
            })
            .collect()
    }
}

fn correlate_fft_real(
    padded: &[f64],
    spectrum: &[Complex64],
    fft_size: usize,
    half: usize,
    n: usize,
    plan: &RealPlan,
) -> Result<Vec<Complex64>> {
    let mut input = vec![0.0; fft_size];
    input[..padded.len()].copy_from_slice(padded);

    let mut freq = plan.forward.make_output_vec();
    plan.forward
        .process(&mut input, &mut freq)
        .map_err(fft_error)?;

    for (f, &k) in freq.iter_mut().zip(spectrum.iter()) {
        *f *= k;
    }
    // DC and Nyquist bins must be purely real for the inverse
    if let Some(first) = freq.first_mut() {
        first.im = 0.0;
    }
    if let Some(last) = freq.last_mut() {
        last.im = 0.0;
    }

    let mut output = plan.inverse.make_output_vec();
    plan.inverse
        .process(&mut freq, &mut output)
        .map_err(fft_error)?;

    // Full overlap starts once the whole kernel is inside the padded signal
    let start = 2 * half;
    let norm = 1.0 / fft_size as f64;
    Ok(output[start..start + n]
        .iter()
        .map(|&v| Complex64::new(v * norm, 0.0))
        .collect())
}

fn correlate_fft_complex(
    padded: &[f64],
    spectrum: &[Complex64],
    fft_size: usize,
    half: usize,
    n: usize,
    plan: &ComplexPlan,
) -> Vec<Complex64> {
    let mut buffer = vec![Complex64::new(0.0, 0.0); fft_size];
    for (slot, &x) in buffer.iter_mut().zip(padded.iter()) {
        *slot = Complex64::new(x, 0.0);
    }

    plan.forward.process(&mut buffer);
    for (b, &k) in buffer.iter_mut().zip(spectrum.iter()) {
        *b *= k;
    }
    plan.inverse.process(&mut buffer);

    let start = 2 * half;
    let norm = 1.0 / fft_size as f64;
    buffer[start..start + n].iter().map(|&c| c * norm).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    const SAMPLE_RATE: f64 = 1000.0;

    fn sine(frequency: f64, len: usize) -> Signal {
        let samples = (0..len)
            .map(|i| (2.0 * PI * frequency * i as f64 / SAMPLE_RATE).sin())
            .collect();
        Signal::new(format!("sine_{}", frequency), samples, SAMPLE_RATE).unwrap()
    }

    fn chirp(len: usize) -> Signal {
        let samples = (0..len)
            .map(|i| {
                let t = i as f64 / SAMPLE_RATE;
                (2.0 * PI * (15.0 * t + 40.0 * t * t)).sin() + 0.3 * (i as f64 * 0.37).cos()
            })
            .collect();
        Signal::new("chirp", samples, SAMPLE_RATE).unwrap()
    }

    fn families() -> [WaveletFamily; 2] {
        [
            WaveletFamily::default(),
            WaveletFamily::DerivativeOfGaussian { order: 2 },
        ]
    }

    #[test]
    fn test_next_fast_len() {
        assert_eq!(next_fast_len(100), 128);
        assert_eq!(next_fast_len(128), 128);
        assert_eq!(next_fast_len(129), 256);
        assert_eq!(next_fast_len(0), 1);
    }

    #[test]
    fn test_config_validation() {
        assert!(CwtConfig::new(PaddingMode::Zero, 0, false).is_err());
        let config = CwtConfig::new(PaddingMode::Zero, 64, false).unwrap();
        assert_eq!(config.method_for(64), ConvolutionMethod::Direct);
        assert_eq!(config.method_for(65), ConvolutionMethod::Fft);
    }

    #[test]
    fn test_matrix_dimensions() {
        let signal = chirp(777);
        for family in families() {
            let scales = ScaleSet::from_frequency_range(family, 5.0, 200.0, 6).unwrap();
            let matrix = transform(&signal, &scales, family).unwrap();
            assert_eq!(matrix.dims(), (scales.len(), signal.len()));
            assert_eq!(matrix.magnitudes.len(), scales.len());
            assert!(matrix.magnitudes.iter().all(|row| row.len() == 777));
            assert!(matrix
                .magnitudes
                .iter()
                .flatten()
                .all(|v| v.is_finite() && *v >= 0.0));
            assert_eq!(matrix.edge_widths.len(), scales.len());
            assert_eq!(matrix.padding, PaddingMode::Reflective);
            assert!(matrix.phases.is_none());
        }
    }

    #[test]
    fn test_rejects_bad_signals() {
        let scales = ScaleSet::geometric(0.01, 0.02, 4).unwrap();
        let family = WaveletFamily::default();

        let empty = Signal::new("empty", vec![], SAMPLE_RATE).unwrap();
        assert_eq!(
            transform(&empty, &scales, family),
            Err(ScalogramError::EmptySignal)
        );

        let nan = Signal::new("nan", vec![0.0, f64::NAN, 1.0], SAMPLE_RATE).unwrap();
        assert_eq!(
            transform(&nan, &scales, family),
            Err(ScalogramError::NonFiniteInput { index: 1 })
        );

        let bad_family = WaveletFamily::DerivativeOfGaussian { order: 0 };
        assert!(matches!(
            transform(&chirp(64), &scales, bad_family),
            Err(ScalogramError::InvalidWaveletFamily(_))
        ));
    }

    #[test]
    fn test_sinusoid_peaks_at_matching_scale() {
        for family in families() {
            let scales = ScaleSet::from_frequency_range(family, 10.0, 160.0, 8).unwrap();
            for frequency in [20.0, 40.0, 80.0] {
                let signal = sine(frequency, 2000);
                let matrix = transform(&signal, &scales, family).unwrap();

                let peaks: Vec<f64> = (0..matrix.num_scales).map(|i| matrix.row_peak(i)).collect();
                let best = peaks
                    .iter()
                    .enumerate()
                    .max_by(|a, b| a.1.total_cmp(b.1))
                    .map(|(i, _)| i)
                    .unwrap();

                assert_eq!(
                    best,
                    scales.nearest_frequency_index(family, frequency),
                    "{} at {} Hz",
                    family,
                    frequency
                );
            }
        }
    }

    #[test]
    fn test_peak_magnitude_scale_normalization() {
        // With 1/sqrt(scale) kernels a matched sinusoid peaks at A * sqrt(scale) * const,
        // so the scale-rectified peak is the same across octaves (5% tolerance).
        for family in families() {
            let mut rectified = Vec::new();
            for frequency in [20.0, 40.0, 80.0] {
                let scale = family.frequency_to_scale(frequency);
                let scales = ScaleSet::from_scales(vec![scale]).unwrap();
                let matrix = transform(&sine(frequency, 2000), &scales, family).unwrap();
                rectified.push(matrix.row_peak(0) / scale.sqrt());
            }
            for value in &rectified[1..] {
                let ratio = value / rectified[0];
                assert!(
                    (ratio - 1.0).abs() < 0.05,
                    "{}: rectified peaks {:?}",
                    family,
                    rectified
                );
            }
        }
    }

    #[test]
    fn test_direct_and_fft_agree() {
        let signal = chirp(600);
        for family in families() {
            let scales = ScaleSet::from_frequency_range(family, 8.0, 200.0, 4).unwrap();
            let direct_config = CwtConfig::new(PaddingMode::Reflective, usize::MAX, true).unwrap();
            let fft_config = CwtConfig::new(PaddingMode::Reflective, 1, true).unwrap();
            let direct = CwtEngine::new(direct_config)
                .transform(&signal, &scales, family)
                .unwrap();
            let fft = CwtEngine::new(fft_config)
                .transform(&signal, &scales, family)
                .unwrap();

            for (row_a, row_b) in direct.magnitudes.iter().zip(fft.magnitudes.iter()) {
                for (a, b) in row_a.iter().zip(row_b.iter()) {
                    assert!((a - b).abs() < 1e-9, "{}: {} vs {}", family, a, b);
                }
            }
        }
    }

    #[test]
    fn test_padding_only_affects_edges() {
        let signal = chirp(500);
        for family in families() {
            let scales = ScaleSet::from_frequency_range(family, 20.0, 200.0, 4).unwrap();
            let zero = CwtEngine::new(CwtConfig::new(PaddingMode::Zero, 64, false).unwrap())
                .transform(&signal, &scales, family)
                .unwrap();
            let reflective =
                CwtEngine::new(CwtConfig::new(PaddingMode::Reflective, 64, false).unwrap())
                    .transform(&signal, &scales, family)
                    .unwrap();

            assert_eq!(zero.edge_widths, reflective.edge_widths);
            for row in 0..zero.num_scales {
                let interior = zero.interior(row);
                assert!(!interior.is_empty());
                for t in interior {
                    let a = zero.magnitudes[row][t];
                    let b = reflective.magnitudes[row][t];
                    assert!((a - b).abs() < 1e-9 * a.abs().max(1.0));
                }
            }
        }
    }

    #[test]
    fn test_single_sample_signal() {
        let signal = Signal::new("one", vec![0.5], SAMPLE_RATE).unwrap();
        let family = WaveletFamily::default();
        let scales = crate::scales::ScaleConfig::default()
            .resolve(family, SAMPLE_RATE, signal.len())
            .unwrap();
        let matrix = transform(&signal, &scales, family).unwrap();
        assert_eq!(matrix.dims(), (scales.len(), 1));
        assert!(matrix.magnitudes.iter().flatten().all(|v| v.is_finite()));
        assert!(matrix.interior(0).is_empty());
    }

    #[test]
    fn test_transform_is_deterministic() {
        let signal = chirp(1000);
        let family = WaveletFamily::default();
        let scales = ScaleSet::from_frequency_range(family, 5.0, 200.0, 8).unwrap();
        let first = transform(&signal, &scales, family).unwrap();
        let second = transform(&signal, &scales, family).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_phase_output() {
        let signal = sine(40.0, 400);
        let family = WaveletFamily::default();
        let scales = ScaleSet::from_frequency_range(family, 20.0, 80.0, 2).unwrap();
        let engine = CwtEngine::new(CwtConfig::new(PaddingMode::Reflective, 64, true).unwrap());
        let matrix = engine.transform(&signal, &scales, family).unwrap();
        let phases = matrix.phases.as_ref().unwrap();
        assert_eq!(phases.len(), scales.len());
        assert!(phases
            .iter()
            .flatten()
            .all(|p| p.is_finite() && p.abs() <= PI + 1e-12));
    }

    #[test]
    fn test_kernel_cache_reuse() {
        let family = WaveletFamily::default();
        let scales = ScaleSet::from_frequency_range(family, 10.0, 100.0, 4).unwrap();
        let engine = CwtEngine::default();
        let cache = KernelCache::new();

        let first = engine
            .transform_with_cache(&sine(20.0, 800), &scales, family, &cache)
            .unwrap();
        assert_eq!(cache.len(), scales.len());
        assert_eq!(cache.misses(), scales.len());

        let second = engine
            .transform_with_cache(&sine(20.0, 800), &scales, family, &cache)
            .unwrap();
        assert_eq!(cache.hits(), scales.len());
        assert_eq!(first, second);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_kernel_cache_is_shared_across_lengths() {
        let family = WaveletFamily::default();
        let scales = ScaleSet::from_frequency_range(family, 10.0, 100.0, 4).unwrap();
        let engine = CwtEngine::default();
        let cache = KernelCache::new();

        for len in [500, 777, 1024, 1500, 2049] {
            let shared = engine
                .transform_with_cache(&chirp(len), &scales, family, &cache)
                .unwrap();
            assert_eq!(shared, engine.transform(&chirp(len), &scales, family).unwrap());
            assert_eq!(cache.len(), scales.len());
        }
        assert_eq!(cache.misses(), scales.len());
        assert_eq!(cache.hits(), 4 * scales.len());
    }

    #[test]
    fn test_kernel_cache_capacity() {
        let family = WaveletFamily::default();
        let scales = ScaleSet::from_frequency_range(family, 10.0, 100.0, 4).unwrap();
        let cache = KernelCache::with_capacity(3);
        let engine = CwtEngine::default();

        let bounded = engine
            .transform_with_cache(&chirp(600), &scales, family, &cache)
            .unwrap();
        assert_eq!(cache.len(), 3);
        assert_eq!(bounded, engine.transform(&chirp(600), &scales, family).unwrap());

        // A second sample rate does not push past the bound
        let resampled = Signal::new("resampled", vec![0.25; 600], 2000.0).unwrap();
        engine
            .transform_with_cache(&resampled, &scales, family, &cache)
            .unwrap();
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_oversized_scale_is_an_error() {
        let signal = chirp(16);
        let family = WaveletFamily::default();
        for scales in [vec![1e300], vec![0.01, 1e6]] {
            let scales = ScaleSet::from_scales(scales).unwrap();
            assert!(matches!(
                transform(&signal, &scales, family),
                Err(ScalogramError::InvalidScale(_))
            ));
        }
    }
}
