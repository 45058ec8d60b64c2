//! Color palettes for scalogram rendering
//!
//! Palettes are defined as color stops and sampled once into a lookup table,
//! so per-pixel coloring is a single index operation.

use crate::error::{Result, ScalogramError};
use image::Rgb;
use std::fmt;
use std::str::FromStr;

/// Number of entries in a palette lookup table
pub const LUT_SIZE: usize = 1024;

/// Color map types for scalogram visualization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorMap {
    Viridis,
    Plasma,
    Inferno,
    Magma,
    Turbo,
    /// Black to white
    Grayscale,
    /// White to black, strongest coefficients darkest
    Greys,
    Jet,
}

impl Default for ColorMap {
    fn default() -> Self {
        ColorMap::Viridis
    }
}

impl fmt::Display for ColorMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for ColorMap {
    type Err = ScalogramError;

    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim().to_ascii_lowercase();
        ColorMap::all()
            .iter()
            .copied()
            .find(|cmap| cmap.name() == name)
            .or(match name.as_str() {
                "gray" | "grey" => Some(ColorMap::Grayscale),
                "gray_r" | "grey_r" => Some(ColorMap::Greys),
                _ => None,
            })
            .ok_or_else(|| ScalogramError::InvalidConfig(format!("Unknown color map: {}", s)))
    }
}

// Stops sampled from the matplotlib palettes at 0, 1/8, ..., 1
const VIRIDIS: [[u8; 3]; 9] = [
    [68, 1, 84],
    [71, 44, 122],
    [59, 81, 139],
    [44, 113, 142],
    [33, 144, 141],
    [39, 173, 129],
    [92, 200, 99],
    [170, 220, 50],
    [253, 231, 37],
];

const PLASMA: [[u8; 3]; 9] = [
    [13, 8, 135],
    [76, 2, 161],
    [126, 3, 168],
    [170, 35, 149],
    [204, 71, 120],
    [230, 108, 92],
    [248, 149, 64],
    [253, 196, 39],
    [240, 249, 33],
];

const INFERNO: [[u8; 3]; 9] = [
    [0, 0, 4],
    [31, 12, 72],
    [85, 15, 109],
    [136, 34, 106],
    [186, 54, 85],
    [227, 89, 51],
    [249, 140, 10],
    [249, 201, 50],
    [252, 255, 164],
];

const MAGMA: [[u8; 3]; 9] = [
    [0, 0, 4],
    [28, 16, 68],
    [79, 18, 123],
    [129, 37, 129],
    [181, 54, 122],
    [229, 80, 100],
    [251, 135, 97],
    [254, 194, 135],
    [252, 253, 191],
];

const TURBO: [[u8; 3]; 9] = [
    [48, 18, 59],
    [67, 91, 206],
    [62, 156, 254],
    [24, 214, 203],
    [70, 247, 131],
    [162, 252, 60],
    [244, 199, 58],
    [240, 95, 20],
    [122, 4, 3],
];

impl ColorMap {
    pub fn all() -> &'static [ColorMap] {
        &[
            ColorMap::Viridis,
            ColorMap::Plasma,
            ColorMap::Inferno,
            ColorMap::Magma,
            ColorMap::Turbo,
            ColorMap::Grayscale,
            ColorMap::Greys,
            ColorMap::Jet,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            ColorMap::Viridis => "viridis",
            ColorMap::Plasma => "plasma",
            ColorMap::Inferno => "inferno",
            ColorMap::Magma => "magma",
            ColorMap::Turbo => "turbo",
            ColorMap::Grayscale => "grayscale",
            ColorMap::Greys => "greys",
            ColorMap::Jet => "jet",
        }
    }

    /// Color for a normalized value in `[0, 1]` (clamped)
    pub fn color(&self, value: f64) -> Rgb<u8> {
        let v = if value.is_nan() {
            0.0
        } else {
            value.clamp(0.0, 1.0)
        };

        match self {
            ColorMap::Viridis => interpolate_stops(&VIRIDIS, v),
            ColorMap::Plasma => interpolate_stops(&PLASMA, v),
            ColorMap::Inferno => interpolate_stops(&INFERNO, v),
            ColorMap::Magma => interpolate_stops(&MAGMA, v),
            ColorMap::Turbo => interpolate_stops(&TURBO, v),
            ColorMap::Grayscale => {
                let gray = to_channel(v);
                Rgb([gray, gray, gray])
            }
            ColorMap::Greys => {
                let gray = to_channel(1.0 - v);
                Rgb([gray, gray, gray])
            }
            ColorMap::Jet => jet(v),
        }
    }
}

fn to_channel(v: f64) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Piecewise-linear interpolation through evenly spaced stops
fn interpolate_stops(stops: &[[u8; 3]], v: f64) -> Rgb<u8> {
    let segments = (stops.len() - 1) as f64;
    let position = v * segments;
    let i = (position.floor() as usize).min(stops.len() - 2);
    let t = position - i as f64;
    let (a, b) = (stops[i], stops[i + 1]);
    Rgb([
        (a[0] as f64 + (b[0] as f64 - a[0] as f64) * t).round() as u8,
        (a[1] as f64 + (b[1] as f64 - a[1] as f64) * t).round() as u8,
        (a[2] as f64 + (b[2] as f64 - a[2] as f64) * t).round() as u8,
    ])
}

fn jet(v: f64) -> Rgb<u8> {
    // Each channel is a trapezoid offset by a quarter of the range
    let channel = |center: f64| (1.5 - (4.0 * v - center).abs()).clamp(0.0, 1.0);
    Rgb([to_channel(channel(3.0)), to_channel(channel(2.0)), to_channel(channel(1.0))])
}

/// Precomputed palette
#[derive(Debug, Clone)]
pub struct ColorLut {
    colormap: ColorMap,
    table: Vec<Rgb<u8>>,
}

impl ColorLut {
    pub fn new(colormap: ColorMap) -> Self {
        let table = (0..LUT_SIZE)
            .map(|i| colormap.color(i as f64 / (LUT_SIZE - 1) as f64))
            .collect();
        Self { colormap, table }
    }

    pub fn colormap(&self) -> ColorMap {
        self.colormap
    }

    /// Color for a normalized value; out-of-range and NaN values clamp
    #[inline]
    pub fn lookup(&self, value: f64) -> Rgb<u8> {
        let v = if value.is_nan() {
            0.0
        } else {
            value.clamp(0.0, 1.0)
        };
        let index = (v * (LUT_SIZE - 1) as f64).round() as usize;
        self.table[index.min(LUT_SIZE - 1)]
    }
}
