//! Signal container
//!
//! A uniformly sampled, real-valued recording handed to the CWT engine.

use crate::error::{Result, ScalogramError};

/// Uniformly sampled time series
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    identifier: String,
    samples: Vec<f64>,
    sample_rate: f64,
}

impl Signal {
    /// Create a new signal, validating the sample rate
    ///
    /// Sample values are not inspected here; the engine rejects empty
    /// or non-finite data when it is asked to transform them.
    pub fn new(identifier: impl Into<String>, samples: Vec<f64>, sample_rate: f64) -> Result<Self> {
        validate_sample_rate(sample_rate)?;
        Ok(Self {
            identifier: identifier.into(),
            samples,
            sample_rate,
        })
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Sampling interval in seconds
    pub fn sample_period(&self) -> f64 {
        1.0 / self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds
    pub fn duration_seconds(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate
    }

    /// Check the samples are usable for a transform
    pub fn validate(&self) -> Result<()> {
        if self.samples.is_empty() {
            return Err(ScalogramError::EmptySignal);
        }
        if let Some(index) = self.samples.iter().position(|s| !s.is_finite()) {
            return Err(ScalogramError::NonFiniteInput { index });
        }
        Ok(())
    }
}

pub(crate) fn validate_sample_rate(sample_rate: f64) -> Result<()> {
    if !sample_rate.is_finite() || sample_rate <= 0.0 {
        return Err(ScalogramError::InvalidConfig(format!(
            "Sample rate must be positive and finite, got {}",
            sample_rate
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_properties() {
        let signal = Signal::new("test", vec![0.0; 500], 250.0).unwrap();
        assert_eq!(signal.identifier(), "test");
        assert_eq!(signal.len(), 500);
        assert!((signal.duration_seconds() - 2.0).abs() < 1e-12);
        assert!((signal.sample_period() - 0.004).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_sample_rate() {
        assert!(Signal::new("a", vec![1.0], 0.0).is_err());
        assert!(Signal::new("a", vec![1.0], -10.0).is_err());
        assert!(Signal::new("a", vec![1.0], f64::NAN).is_err());
    }

    #[test]
    fn test_validate() {
        let empty = Signal::new("empty", vec![], 100.0).unwrap();
        assert_eq!(empty.validate(), Err(ScalogramError::EmptySignal));

        let bad = Signal::new("bad", vec![0.0, 1.0, f64::INFINITY], 100.0).unwrap();
        assert_eq!(bad.validate(), Err(ScalogramError::NonFiniteInput { index: 2 }));

        let good = Signal::new("good", vec![0.0, 1.0], 100.0).unwrap();
        assert!(good.validate().is_ok());
    }
}
