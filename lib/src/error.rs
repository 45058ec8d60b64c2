//! Error types for the scalogram pipeline
//!
//! Every stage reports failures through [`ScalogramError`]. The batch
//! orchestrator turns them into per-file failures instead of aborting.

use std::fmt;
use thiserror::Error;

/// Main error type for scalogram generation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScalogramError {
    /// Unknown wavelet name or unsupported family parameters
    #[error("Invalid wavelet family: {0}")]
    InvalidWaveletFamily(String),

    /// Non-positive or non-finite scale, or an unusable scale range
    #[error("Invalid scale: {0}")]
    InvalidScale(String),

    /// Signal has no samples
    #[error("Signal is empty")]
    EmptySignal,

    /// Signal contains NaN or infinite samples
    #[error("Non-finite sample at index {index}")]
    NonFiniteInput { index: usize },

    /// FFT or convolution backend failure
    #[error("Transform failure: {0}")]
    TransformFailure(String),

    /// Coefficient matrix has a zero dimension
    #[error("Coefficient matrix is empty")]
    EmptyMatrix,

    /// Input collaborator could not produce a signal
    #[error("Load failure: {0}")]
    LoadFailure(String),

    /// Rendering could not produce an image
    #[error("Render failure: {0}")]
    RenderFailure(String),

    /// Invalid configuration value (sample rate, percentile, width...)
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Output collaborator could not persist an image
    #[error("Output failure: {0}")]
    OutputFailure(String),

    /// Batch was cancelled before this input started
    #[error("Cancelled before processing started")]
    Cancelled,
}

/// Discriminant of [`ScalogramError`], used for summaries and reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidWaveletFamily,
    InvalidScale,
    EmptySignal,
    NonFiniteInput,
    TransformFailure,
    EmptyMatrix,
    LoadFailure,
    RenderFailure,
    InvalidConfig,
    OutputFailure,
    Cancelled,
}

impl ScalogramError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ScalogramError::InvalidWaveletFamily(_) => ErrorKind::InvalidWaveletFamily,
            ScalogramError::InvalidScale(_) => ErrorKind::InvalidScale,
            ScalogramError::EmptySignal => ErrorKind::EmptySignal,
            ScalogramError::NonFiniteInput { .. } => ErrorKind::NonFiniteInput,
            ScalogramError::TransformFailure(_) => ErrorKind::TransformFailure,
            ScalogramError::EmptyMatrix => ErrorKind::EmptyMatrix,
            ScalogramError::LoadFailure(_) => ErrorKind::LoadFailure,
            ScalogramError::RenderFailure(_) => ErrorKind::RenderFailure,
            ScalogramError::InvalidConfig(_) => ErrorKind::InvalidConfig,
            ScalogramError::OutputFailure(_) => ErrorKind::OutputFailure,
            ScalogramError::Cancelled => ErrorKind::Cancelled,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::InvalidWaveletFamily => "InvalidWaveletFamily",
            ErrorKind::InvalidScale => "InvalidScale",
            ErrorKind::EmptySignal => "EmptySignal",
            ErrorKind::NonFiniteInput => "NonFiniteInput",
            ErrorKind::TransformFailure => "TransformFailure",
            ErrorKind::EmptyMatrix => "EmptyMatrix",
            ErrorKind::LoadFailure => "LoadFailure",
            ErrorKind::RenderFailure => "RenderFailure",
            ErrorKind::InvalidConfig => "InvalidConfig",
            ErrorKind::OutputFailure => "OutputFailure",
            ErrorKind::Cancelled => "Cancelled",
        };
        write!(f, "{}", name)
    }
}

/// Result type for scalogram operations
pub type Result<T> = std::result::Result<T, ScalogramError>;
