//! Boundary extension for convolution
//!
//! The engine extends the signal by the kernel half-width on both sides
//! before correlating, so every output sample sees a full kernel.

use crate::error::{Result, ScalogramError};
use std::fmt;
use std::str::FromStr;

/// Boundary extension strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaddingMode {
    /// Extend with zeros
    Zero,
    /// Mirror the signal around its edges, edge sample included (recommended default)
    Reflective,
}

impl Default for PaddingMode {
    fn default() -> Self {
        PaddingMode::Reflective
    }
}

impl fmt::Display for PaddingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for PaddingMode {
    type Err = ScalogramError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "zero" | "zeros" => Ok(PaddingMode::Zero),
            "reflective" | "reflect" | "symmetric" => Ok(PaddingMode::Reflective),
            other => Err(ScalogramError::InvalidConfig(format!(
                "Unknown padding mode: {}",
                other
            ))),
        }
    }
}

impl PaddingMode {
    pub fn all() -> &'static [PaddingMode] {
        &[PaddingMode::Zero, PaddingMode::Reflective]
    }

    pub fn name(&self) -> &'static str {
        match self {
            PaddingMode::Zero => "zero",
            PaddingMode::Reflective => "reflective",
        }
    }
}

/// Map a virtual index outside `0..n` onto the mirrored signal
///
/// Mirror period is `2n`, so padding longer than the signal keeps folding:
/// `[a b c]` extends as `... c b a | a b c | c b a ...`.
pub fn reflect_index(index: isize, n: usize) -> usize {
    let period = 2 * n as isize;
    let m = index.rem_euclid(period) as usize;
    if m < n {
        m
    } else {
        2 * n - 1 - m
    }
}

/// Extend `samples` by `pad` values on each side
pub fn pad_signal(samples: &[f64], pad: usize, mode: PaddingMode) -> Vec<f64> {
    let n = samples.len();
    if pad == 0 || n == 0 {
        return samples.to_vec();
    }

    let mut padded = Vec::with_capacity(n + 2 * pad);
    match mode {
        PaddingMode::Zero => {
            padded.resize(pad, 0.0);
            padded.extend_from_slice(samples);
            padded.resize(n + 2 * pad, 0.0);
        }
        PaddingMode::Reflective => {
            for i in -(pad as isize)..(n + pad) as isize {
                padded.push(samples[reflect_index(i, n)]);
            }
        }
    }
    padded
}
