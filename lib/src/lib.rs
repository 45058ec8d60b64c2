//! Scalogram Library
//!
//! Continuous wavelet transform of sampled signals and rendering of the
//! resulting time-scale magnitude surface as color-mapped images, plus a
//! batch processor that runs many inputs in parallel and reports failures
//! per input.

pub mod audio_io;
pub mod batch;
pub mod colormap;
pub mod cwt;
pub mod error;
pub mod figure;
pub mod output;
pub mod padding;
pub mod scales;
pub mod scalogram;
pub mod signal;
pub mod sources;
pub mod utils;
pub mod wavelet;

pub use batch::{
    BatchConfig, BatchProcessor, BatchSummary, CancellationToken, ProcessingResult,
    ScalogramConfig, Stage,
};
pub use cwt::{CoefficientMatrix, CwtConfig, CwtEngine, KernelCache};
pub use error::{ErrorKind, Result, ScalogramError};
pub use output::{DirectorySink, ImageSink, OutputLayout};
pub use num_complex::Complex64;
pub use scales::{ScaleConfig, ScaleRange, ScaleSet};
pub use scalogram::{render, RenderOptions, ScalogramImage};
pub use signal::Signal;
pub use sources::SignalSource;
pub use wavelet::WaveletFamily;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the library
///
/// Sets up logging from `RUST_LOG`. Safe to call more than once.
pub fn init() {
    #[cfg(feature = "env_logger")]
    {
        let _ = env_logger::try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init() {
        init();
        init();
        assert!(!VERSION.is_empty());
    }
}
