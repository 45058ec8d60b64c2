//! Scalogram rendering
//!
//! Turns a coefficient matrix into a color-mapped raster with axis metadata.
//! The mapping is a fixed chain so the same matrix and options always give
//! the same pixels:
//!
//! 1. time max-pooling down to the target width (never averaging),
//! 2. percentile clipping of the pooled magnitudes,
//! 3. linear or logarithmic (dB) amplitude mapping onto `[0, 1]`,
//! 4. palette lookup.

use crate::colormap::{ColorLut, ColorMap};
use crate::cwt::CoefficientMatrix;
use crate::error::{Result, ScalogramError};
use crate::scales::ScaleSet;
use crate::signal::validate_sample_rate;
use crate::utils::{format_frequency, format_scale, format_time};
use image::RgbImage;
use std::fmt;
use std::str::FromStr;

/// Default percentile used as the saturation level
pub const DEFAULT_CLIP_PERCENTILE: f64 = 99.5;

/// Default dynamic range for logarithmic mapping
pub const DEFAULT_DYNAMIC_RANGE_DB: f64 = 80.0;

/// Default number of ticks per axis
pub const DEFAULT_TICKS: usize = 5;

/// Amplitude mapping applied after clipping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AmplitudeScale {
    /// Proportional to magnitude
    Linear,
    /// Decibels relative to the clip level
    Logarithmic,
}

impl Default for AmplitudeScale {
    fn default() -> Self {
        AmplitudeScale::Linear
    }
}

impl fmt::Display for AmplitudeScale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for AmplitudeScale {
    type Err = ScalogramError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linear" | "lin" => Ok(AmplitudeScale::Linear),
            "logarithmic" | "log" | "db" => Ok(AmplitudeScale::Logarithmic),
            other => Err(ScalogramError::InvalidConfig(format!(
                "Unknown amplitude scale: {}",
                other
            ))),
        }
    }
}

impl AmplitudeScale {
    pub fn all() -> &'static [AmplitudeScale] {
        &[AmplitudeScale::Linear, AmplitudeScale::Logarithmic]
    }

    pub fn name(&self) -> &'static str {
        match self {
            AmplitudeScale::Linear => "linear",
            AmplitudeScale::Logarithmic => "logarithmic",
        }
    }
}

/// Quantity labelled on the vertical axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VerticalAxis {
    /// Wavelet scale in seconds
    Scale,
    /// Equivalent frequency in Hz
    Frequency,
}

impl Default for VerticalAxis {
    fn default() -> Self {
        VerticalAxis::Frequency
    }
}

impl fmt::Display for VerticalAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerticalAxis::Scale => write!(f, "scale"),
            VerticalAxis::Frequency => write!(f, "frequency"),
        }
    }
}

impl FromStr for VerticalAxis {
    type Err = ScalogramError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "scale" => Ok(VerticalAxis::Scale),
            "frequency" | "freq" => Ok(VerticalAxis::Frequency),
            other => Err(ScalogramError::InvalidConfig(format!(
                "Unknown vertical axis: {}",
                other
            ))),
        }
    }
}

/// Options for scalogram image generation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderOptions {
    pub amplitude_scale: AmplitudeScale,
    pub colormap: ColorMap,
    /// Percentile of the pooled magnitudes that saturates the palette, in `(0, 100]`
    pub clip_percentile: f64,
    /// Range below the clip level shown by logarithmic mapping
    pub dynamic_range_db: f64,
    /// Maximum image width in pixels (None keeps one column per sample)
    pub target_width: Option<usize>,
    pub vertical_axis: VerticalAxis,
    /// Ticks per axis
    pub ticks: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            amplitude_scale: AmplitudeScale::Linear,
            colormap: ColorMap::Viridis,
            clip_percentile: DEFAULT_CLIP_PERCENTILE,
            dynamic_range_db: DEFAULT_DYNAMIC_RANGE_DB,
            target_width: None,
            vertical_axis: VerticalAxis::Frequency,
            ticks: DEFAULT_TICKS,
        }
    }
}

impl RenderOptions {
    pub fn validate(&self) -> Result<()> {
        if !self.clip_percentile.is_finite()
            || self.clip_percentile <= 0.0
            || self.clip_percentile > 100.0
        {
            return Err(ScalogramError::InvalidConfig(format!(
                "Clip percentile must be in (0, 100], got {}",
                self.clip_percentile
            )));
        }
        if !self.dynamic_range_db.is_finite() || self.dynamic_range_db <= 0.0 {
            return Err(ScalogramError::InvalidConfig(format!(
                "Dynamic range must be positive, got {} dB",
                self.dynamic_range_db
            )));
        }
        if self.target_width == Some(0) {
            return Err(ScalogramError::InvalidConfig(
                "Target width must be at least 1 pixel".to_string(),
            ));
        }
        Ok(())
    }
}

/// One labelled position on an axis
#[derive(Debug, Clone, PartialEq)]
pub struct AxisTick {
    /// Pixel row (vertical axis) or column (time axis)
    pub position: usize,
    /// Scale in seconds, frequency in Hz or time in seconds
    pub value: f64,
    pub label: String,
}

/// Axis description attached to a rendered image
#[derive(Debug, Clone, PartialEq)]
pub struct AxisMetadata {
    pub vertical_axis: VerticalAxis,
    /// Top to bottom
    pub vertical_ticks: Vec<AxisTick>,
    /// Left to right
    pub time_ticks: Vec<AxisTick>,
    /// Value of the vertical quantity at the top and bottom rows
    pub vertical_range: (f64, f64),
    /// Start time of the first and last columns (seconds)
    pub time_range: (f64, f64),
}

/// Rendered scalogram plus the mapping that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct ScalogramImage {
    pub image: RgbImage,
    pub colormap: ColorMap,
    pub amplitude_scale: AmplitudeScale,
    /// Range below `clip_level` shown by logarithmic mapping
    pub dynamic_range_db: f64,
    /// Magnitude mapped to the top of the palette
    pub clip_level: f64,
    pub axes: AxisMetadata,
    /// First sample index covered by each column
    pub column_starts: Vec<usize>,
}

impl ScalogramImage {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Render a coefficient matrix
pub fn render(
    matrix: &CoefficientMatrix,
    scale_set: &ScaleSet,
    sample_rate: f64,
    options: &RenderOptions,
) -> Result<ScalogramImage> {
    options.validate()?;
    validate_sample_rate(sample_rate)?;

    if matrix.is_empty() || matrix.magnitudes.is_empty() {
        return Err(ScalogramError::EmptyMatrix);
    }
    if matrix.magnitudes.len() != matrix.num_scales
        || matrix
            .magnitudes
            .iter()
            .any(|row| row.len() != matrix.num_samples)
    {
        return Err(ScalogramError::RenderFailure(
            "Coefficient matrix is not rectangular".to_string(),
        ));
    }
    if scale_set.len() != matrix.num_scales {
        return Err(ScalogramError::RenderFailure(format!(
            "Matrix has {} rows but the scale set has {} scales",
            matrix.num_scales,
            scale_set.len()
        )));
    }

    let width = options
        .target_width
        .filter(|&w| w < matrix.num_samples)
        .unwrap_or(matrix.num_samples);
    let height = matrix.num_scales;

    let (pooled, column_starts) = max_pool(&matrix.magnitudes, width);

    let mut all_values: Vec<f64> = pooled.iter().flatten().copied().collect();
    let clip_level = percentile(&mut all_values, options.clip_percentile);

    let raster_width = u32::try_from(width)
        .map_err(|_| ScalogramError::RenderFailure(format!("Image too wide: {}", width)))?;
    let raster_height = u32::try_from(height)
        .map_err(|_| ScalogramError::RenderFailure(format!("Image too tall: {}", height)))?;

    let lut = ColorLut::new(options.colormap);
    let mut image = RgbImage::new(raster_width, raster_height);

    // Row 0 is the smallest scale, drawn at the top
    for (y, row) in pooled.iter().enumerate() {
        for (x, &value) in row.iter().enumerate() {
            let t = amplitude_to_unit(
                value,
                clip_level,
                options.amplitude_scale,
                options.dynamic_range_db,
            );
            image.put_pixel(x as u32, y as u32, lut.lookup(t));
        }
    }

    let axes = build_axes(
        matrix,
        scale_set,
        sample_rate,
        &column_starts,
        options.vertical_axis,
        options.ticks,
    );

    log::debug!(
        "Rendered {}x{} scalogram, clip level {:.6e} ({} percentile), {} / {}",
        width,
        height,
        clip_level,
        options.clip_percentile,
        options.amplitude_scale,
        options.colormap
    );

    Ok(ScalogramImage {
        image,
        colormap: options.colormap,
        amplitude_scale: options.amplitude_scale,
        dynamic_range_db: options.dynamic_range_db,
        clip_level,
        axes,
        column_starts,
    })
}

/// Downsample every row to `width` columns, keeping the maximum of each bucket
///
/// Column `i` covers samples `[floor(i * n / width), floor((i + 1) * n / width))`.
/// Returns the pooled rows and the first sample of each column. Rows are
/// returned unchanged when `width >= n`.
pub fn max_pool(rows: &[Vec<f64>], width: usize) -> (Vec<Vec<f64>>, Vec<usize>) {
    let n = rows.first().map_or(0, |row| row.len());
    if width == 0 || width >= n {
        return (rows.to_vec(), (0..n).collect());
    }

    let starts: Vec<usize> = (0..=width).map(|i| i * n / width).collect();
    let pooled = rows
        .iter()
        .map(|row| {
            starts
                .windows(2)
                .map(|bucket| {
                    row[bucket[0]..bucket[1]]
                        .iter()
                        .fold(f64::NEG_INFINITY, |acc, &v| acc.max(v))
                })
                .collect()
        })
        .collect();

    (pooled, starts[..width].to_vec())
}

/// Percentile `p` (0-100) with linear interpolation between sorted ranks
///
/// Selects the two ranks in linear time and leaves `values` partially
/// reordered. Returns 0 for an empty slice. NaN values rank above every number.
pub fn percentile(values: &mut [f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    let rank = (p.clamp(0.0, 100.0) / 100.0) * (values.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let fraction = rank - lower as f64;

    let (_, &mut low, above) = values.select_nth_unstable_by(lower, |a, b| a.total_cmp(b));
    if fraction == 0.0 {
        return low;
    }
    // The next rank is the smallest value above the selected one
    let high = above
        .iter()
        .copied()
        .min_by(|a, b| a.total_cmp(b))
        .unwrap_or(low);
    low + (high - low) * fraction
}

/// Map a magnitude onto `[0, 1]` given the clip level
pub fn amplitude_to_unit(
    value: f64,
    clip_level: f64,
    scale: AmplitudeScale,
    dynamic_range_db: f64,
) -> f64 {
    if clip_level.is_nan() || clip_level <= 0.0 || !value.is_finite() || value <= 0.0 {
        return 0.0;
    }
    match scale {
        AmplitudeScale::Linear => (value / clip_level).min(1.0),
        AmplitudeScale::Logarithmic => {
            let db = 20.0 * (value / clip_level).log10();
            ((db + dynamic_range_db) / dynamic_range_db).clamp(0.0, 1.0)
        }
    }
}

/// Evenly spread tick positions over `0..len`, both ends included
fn tick_positions(len: usize, ticks: usize) -> Vec<usize> {
    if len == 0 || ticks == 0 {
        return Vec::new();
    }
    if ticks == 1 || len == 1 {
        return vec![0];
    }
    let mut positions: Vec<usize> = (0..ticks)
        .map(|k| ((k * (len - 1)) as f64 / (ticks - 1) as f64).round() as usize)
        .collect();
    positions.dedup();
    positions
}

fn build_axes(
    matrix: &CoefficientMatrix,
    scale_set: &ScaleSet,
    sample_rate: f64,
    column_starts: &[usize],
    vertical_axis: VerticalAxis,
    ticks: usize,
) -> AxisMetadata {
    let vertical_value = |row: usize| {
        let scale = scale_set.scales()[row];
        match vertical_axis {
            VerticalAxis::Scale => scale,
            VerticalAxis::Frequency => matrix.family.scale_to_frequency(scale),
        }
    };
    let vertical_label = |value: f64| match vertical_axis {
        VerticalAxis::Scale => format_scale(value),
        VerticalAxis::Frequency => format_frequency(value),
    };
    let column_time = |column: usize| column_starts[column] as f64 / sample_rate;

    let vertical_ticks = tick_positions(matrix.num_scales, ticks)
        .into_iter()
        .map(|row| {
            let value = vertical_value(row);
            AxisTick {
                position: row,
                value,
                label: vertical_label(value),
            }
        })
        .collect();

    let time_ticks = tick_positions(column_starts.len(), ticks)
        .into_iter()
        .map(|column| {
            let value = column_time(column);
            AxisTick {
                position: column,
                value,
                label: format_time(value),
            }
        })
        .collect();

    let last_column = column_starts.len().saturating_sub(1);
    AxisMetadata {
        vertical_axis,
        vertical_ticks,
        time_ticks,
        vertical_range: (vertical_value(0), vertical_value(matrix.num_scales - 1)),
        time_range: (column_time(0), column_time(last_column)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wavelet::WaveletFamily;
    use image::Rgb;

    fn matrix_from(rows: Vec<Vec<f64>>) -> CoefficientMatrix {
        CoefficientMatrix::from_magnitudes(rows, WaveletFamily::default())
    }

    fn scales_for(count: usize) -> ScaleSet {
        ScaleSet::from_scales((1..=count).map(|k| 0.01 * k as f64).collect()).unwrap()
    }

    #[test]
    fn test_percentile() {
        let values = [5.0, 1.0, 4.0, 2.0, 3.0];
        assert_eq!(percentile(&mut values.clone(), 50.0), 3.0);
        assert_eq!(percentile(&mut values.clone(), 100.0), 5.0);
        assert_eq!(percentile(&mut values.clone(), 0.0), 1.0);
        assert!((percentile(&mut [0.0, 10.0], 25.0) - 2.5).abs() < 1e-12);
        assert_eq!(percentile(&mut [], 50.0), 0.0);

        // Interpolated ranks match a full sort on unordered data
        let unordered: Vec<f64> = (0..101).map(|i| ((i * 37) % 101) as f64).collect();
        assert!((percentile(&mut unordered.clone(), 99.5) - 99.5).abs() < 1e-12);
        assert!((percentile(&mut unordered.clone(), 12.25) - 12.25).abs() < 1e-12);
    }

    #[test]
    fn test_amplitude_mapping() {
        let lin = AmplitudeScale::Linear;
        assert_eq!(amplitude_to_unit(0.5, 1.0, lin, 80.0), 0.5);
        assert_eq!(amplitude_to_unit(3.0, 1.0, lin, 80.0), 1.0);
        assert_eq!(amplitude_to_unit(0.5, 0.0, lin, 80.0), 0.0);

        let log = AmplitudeScale::Logarithmic;
        assert!((amplitude_to_unit(1.0, 1.0, log, 80.0) - 1.0).abs() < 1e-12);
        assert!((amplitude_to_unit(0.01, 1.0, log, 80.0) - 0.5).abs() < 1e-12);
        assert!(amplitude_to_unit(1e-4, 1.0, log, 80.0).abs() < 1e-12);
        assert_eq!(amplitude_to_unit(1e-9, 1.0, log, 80.0), 0.0);
        assert_eq!(amplitude_to_unit(0.0, 1.0, log, 80.0), 0.0);
    }

    #[test]
    fn test_max_pool_keeps_spike() {
        let mut row = vec![0.0; 1000];
        row[537] = 1.0;
        let (pooled, starts) = max_pool(&[row], 100);
        assert_eq!(pooled[0].len(), 100);
        assert_eq!(starts.len(), 100);
        assert_eq!(pooled[0][53], 1.0);
        assert_eq!(pooled[0].iter().filter(|&&v| v == 1.0).count(), 1);
        assert_eq!(starts[53], 530);
    }

    #[test]
    fn test_max_pool_uneven_buckets() {
        let row: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let (pooled, starts) = max_pool(&[row.clone()], 3);
        // Buckets [0, 3), [3, 6), [6, 10)
        assert_eq!(starts, vec![0, 3, 6]);
        assert_eq!(pooled[0], vec![2.0, 5.0, 9.0]);

        let (unchanged, starts) = max_pool(&[row.clone()], 10);
        assert_eq!(unchanged[0], row);
        assert_eq!(starts.len(), 10);
    }

    #[test]
    fn test_render_dimensions_and_orientation() {
        let family = WaveletFamily::default();
        let scales = ScaleSet::from_frequency_range(family, 10.0, 80.0, 4).unwrap();
        let rows = vec![vec![1.0; 400]; scales.len()];
        let matrix = matrix_from(rows);

        let options = RenderOptions {
            target_width: Some(100),
            ..RenderOptions::default()
        };
        let image = render(&matrix, &scales, 200.0, &options).unwrap();
        assert_eq!(image.width(), 100);
        assert_eq!(image.height() as usize, scales.len());

        // Highest frequency at the top
        let ticks = &image.axes.vertical_ticks;
        assert_eq!(ticks.first().unwrap().position, 0);
        assert!((ticks.first().unwrap().value - 80.0).abs() < 1e-9);
        assert!((ticks.last().unwrap().value - 10.0).abs() < 1e-9);
        assert_eq!(ticks.len(), 5);

        // Time labels follow the pooled column starts
        assert_eq!(image.axes.time_ticks[0].value, 0.0);
        let last = image.axes.time_ticks.last().unwrap();
        assert_eq!(last.position, 99);
        assert!((last.value - 396.0 / 200.0).abs() < 1e-12);
    }

    #[test]
    fn test_scale_axis_labels() {
        let scales = scales_for(3);
        let matrix = matrix_from(vec![vec![1.0; 8]; 3]);
        let options = RenderOptions {
            vertical_axis: VerticalAxis::Scale,
            ticks: 3,
            ..RenderOptions::default()
        };
        let image = render(&matrix, &scales, 100.0, &options).unwrap();
        let values: Vec<f64> = image.axes.vertical_ticks.iter().map(|t| t.value).collect();
        assert_eq!(values, scales.scales().to_vec());
        assert_eq!(
            image.axes.vertical_range,
            (scales.scales()[0], scales.scales()[2])
        );
    }

    #[test]
    fn test_outlier_does_not_wash_out_image() {
        let mut rows = vec![vec![1.0; 1000]; 4];
        rows[2][500] = 1e6;
        let matrix = matrix_from(rows);
        let scales = scales_for(4);

        let options = RenderOptions {
            colormap: ColorMap::Grayscale,
            ..RenderOptions::default()
        };
        let clipped = render(&matrix, &scales, 1000.0, &options).unwrap();
        assert_eq!(clipped.clip_level, 1.0);
        let white = clipped
            .image
            .pixels()
            .filter(|p| **p == Rgb([255, 255, 255]))
            .count();
        assert_eq!(white, 4000);

        // Without clipping the spike takes the whole palette
        let unclipped = render(
            &matrix,
            &scales,
            1000.0,
            &RenderOptions {
                clip_percentile: 100.0,
                ..options
            },
        )
        .unwrap();
        let black = unclipped
            .image
            .pixels()
            .filter(|p| **p == Rgb([0, 0, 0]))
            .count();
        assert_eq!(black, 3999);
    }

    #[test]
    fn test_zero_matrix_renders_floor_color() {
        let matrix = matrix_from(vec![vec![0.0; 16]; 2]);
        let options = RenderOptions {
            colormap: ColorMap::Greys,
            amplitude_scale: AmplitudeScale::Logarithmic,
            ..RenderOptions::default()
        };
        let image = render(&matrix, &scales_for(2), 8.0, &options).unwrap();
        assert_eq!(image.clip_level, 0.0);
        assert!(image.image.pixels().all(|p| *p == Rgb([255, 255, 255])));
    }

    #[test]
    fn test_render_is_deterministic() {
        let rows: Vec<Vec<f64>> = (0..6)
            .map(|r| (0..300).map(|c| ((r * 31 + c * 7) % 97) as f64).collect())
            .collect();
        let matrix = matrix_from(rows);
        let options = RenderOptions {
            amplitude_scale: AmplitudeScale::Logarithmic,
            target_width: Some(128),
            ..RenderOptions::default()
        };
        let a = render(&matrix, &scales_for(6), 50.0, &options).unwrap();
        let b = render(&matrix, &scales_for(6), 50.0, &options).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_render_errors() {
        let scales = scales_for(2);
        let options = RenderOptions::default();

        let empty = matrix_from(vec![]);
        assert_eq!(
            render(&empty, &scales, 100.0, &options),
            Err(ScalogramError::EmptyMatrix)
        );
        let no_columns = matrix_from(vec![vec![], vec![]]);
        assert_eq!(
            render(&no_columns, &scales, 100.0, &options),
            Err(ScalogramError::EmptyMatrix)
        );

        let mismatch = matrix_from(vec![vec![1.0; 4]; 3]);
        assert!(matches!(
            render(&mismatch, &scales, 100.0, &options),
            Err(ScalogramError::RenderFailure(_))
        ));

        let ragged = matrix_from(vec![vec![1.0; 4], vec![1.0; 3]]);
        assert!(matches!(
            render(&ragged, &scales, 100.0, &options),
            Err(ScalogramError::RenderFailure(_))
        ));

        let bad_options = RenderOptions {
            clip_percentile: 0.0,
            ..RenderOptions::default()
        };
        let matrix = matrix_from(vec![vec![1.0; 4]; 2]);
        assert!(matches!(
            render(&matrix, &scales, 100.0, &bad_options),
            Err(ScalogramError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_single_column() {
        let matrix = matrix_from(vec![vec![0.3]; 3]);
        let image = render(&matrix, &scales_for(3), 1000.0, &RenderOptions::default()).unwrap();
        assert_eq!((image.width(), image.height()), (1, 3));
        assert_eq!(image.axes.time_ticks.len(), 1);
    }
}
