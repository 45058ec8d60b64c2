//! Batch orchestration
//!
//! Runs load → transform → render (→ emit) for every input on the rayon
//! pool. One input failing never stops the others: its failure is recorded
//! with the stage it happened in and the batch carries on.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;

use crate::cwt::{CwtConfig, CwtEngine, KernelCache};
use crate::error::{ErrorKind, Result, ScalogramError};
use crate::output::ImageSink;
use crate::scales::ScaleConfig;
use crate::scalogram::{render, RenderOptions, ScalogramImage};
use crate::sources::SignalSource;
use crate::wavelet::WaveletFamily;

/// Everything needed to turn one signal into one image
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScalogramConfig {
    pub wavelet: WaveletFamily,
    pub scales: ScaleConfig,
    pub cwt: CwtConfig,
    pub render: RenderOptions,
}

impl ScalogramConfig {
    pub fn validate(&self) -> Result<()> {
        self.wavelet.validate()?;
        ScaleConfig::new(self.scales.range, self.scales.points_per_octave)?;
        CwtConfig::new(self.cwt.padding, self.cwt.fft_threshold, self.cwt.output_phase)?;
        self.render.validate()
    }
}

/// Batch run configuration
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BatchConfig {
    pub scalogram: ScalogramConfig,
    /// Size of a dedicated worker pool (None uses the global rayon pool)
    pub threads: Option<usize>,
}

impl BatchConfig {
    pub fn new(scalogram: ScalogramConfig, threads: Option<usize>) -> Result<Self> {
        scalogram.validate()?;
        if threads == Some(0) {
            return Err(ScalogramError::InvalidConfig(
                "Thread count must be at least 1".to_string(),
            ));
        }
        Ok(Self { scalogram, threads })
    }
}

/// Pipeline stage of one input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Load,
    Transform,
    Render,
    Emit,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Load => "load",
            Stage::Transform => "transform",
            Stage::Render => "render",
            Stage::Emit => "emit",
        };
        write!(f, "{}", name)
    }
}

/// Lifecycle of one input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    Pending,
    Loaded,
    Transformed,
    Rendered,
    Emitted,
    Failed(Stage),
}

impl FileState {
    /// State reached once `stage` completes
    pub fn after(stage: Stage) -> FileState {
        match stage {
            Stage::Load => FileState::Loaded,
            Stage::Transform => FileState::Transformed,
            Stage::Render => FileState::Rendered,
            Stage::Emit => FileState::Emitted,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, FileState::Failed(_))
    }
}

/// Outcome for one input
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessingResult {
    Success {
        identifier: String,
        image: ScalogramImage,
        /// Whether the image went through an output sink
        emitted: bool,
    },
    Failure {
        identifier: String,
        stage: Stage,
        error: ScalogramError,
    },
}

impl ProcessingResult {
    pub fn identifier(&self) -> &str {
        match self {
            ProcessingResult::Success { identifier, .. } => identifier,
            ProcessingResult::Failure { identifier, .. } => identifier,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ProcessingResult::Success { .. })
    }

    pub fn image(&self) -> Option<&ScalogramImage> {
        match self {
            ProcessingResult::Success { image, .. } => Some(image),
            ProcessingResult::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&ScalogramError> {
        match self {
            ProcessingResult::Success { .. } => None,
            ProcessingResult::Failure { error, .. } => Some(error),
        }
    }

    /// Terminal state of the input
    pub fn state(&self) -> FileState {
        match self {
            ProcessingResult::Success { emitted: true, .. } => FileState::Emitted,
            ProcessingResult::Success { emitted: false, .. } => FileState::Rendered,
            ProcessingResult::Failure { stage, .. } => FileState::Failed(*stage),
        }
    }
}

/// Cooperative cancellation flag shared with a running batch
///
/// Inputs that have not started when the flag is raised are reported as
/// cancelled; inputs already in flight run to completion.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Batch processor
pub struct BatchProcessor {
    config: BatchConfig,
    cancellation: CancellationToken,
}

impl BatchProcessor {
    /// Create a new batch processor
    pub fn new(config: BatchConfig) -> Result<Self> {
        let config = BatchConfig::new(config.scalogram, config.threads)?;
        Ok(Self {
            config,
            cancellation: CancellationToken::new(),
        })
    }

    /// Use an externally owned cancellation token
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Token that cancels this processor's runs
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Process every input, results in input order
    pub fn process_all(&self, inputs: &[Box<dyn SignalSource>]) -> Vec<ProcessingResult> {
        self.run(inputs, None)
    }

    /// Process every input and hand each image to `sink`
    pub fn process_all_with_sink(
        &self,
        inputs: &[Box<dyn SignalSource>],
        sink: &dyn ImageSink,
    ) -> Vec<ProcessingResult> {
        self.run(inputs, Some(sink))
    }

    fn run(
        &self,
        inputs: &[Box<dyn SignalSource>],
        sink: Option<&dyn ImageSink>,
    ) -> Vec<ProcessingResult> {
        let start = Instant::now();
        let engine = CwtEngine::new(self.config.scalogram.cwt);
        let cache = KernelCache::new();

        log::info!(
            "Processing {} input(s) with {}",
            inputs.len(),
            self.config.scalogram.wavelet
        );

        let work = || {
            let mut tagged: Vec<(usize, ProcessingResult)> = inputs
                .par_iter()
                .enumerate()
                .map(|(index, source)| {
                    (
                        index,
                        self.process_one(source.as_ref(), &engine, &cache, sink),
                    )
                })
                .collect();
            tagged.sort_by_key(|(index, _)| *index);
            tagged
                .into_iter()
                .map(|(_, result)| result)
                .collect::<Vec<_>>()
        };

        let results = match self.config.threads {
            Some(threads) => match rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
            {
                Ok(pool) => pool.install(work),
                Err(e) => {
                    log::warn!("Falling back to the global thread pool: {}", e);
                    work()
                }
            },
            None => work(),
        };

        log::info!(
            "Batch finished in {:.2?}: {} kernel(s) prepared, {} reused",
            start.elapsed(),
            cache.misses(),
            cache.hits()
        );
        results
    }

    fn process_one(
        &self,
        source: &dyn SignalSource,
        engine: &CwtEngine,
        cache: &KernelCache,
        sink: Option<&dyn ImageSink>,
    ) -> ProcessingResult {
        let identifier = source.identifier().to_string();

        let fail = |stage: Stage, error: ScalogramError| {
            if error != ScalogramError::Cancelled {
                log::warn!("'{}' failed at {} stage: {}", identifier, stage, error);
            }
            ProcessingResult::Failure {
                identifier: identifier.clone(),
                stage,
                error,
            }
        };
        let advance = |state: &mut FileState, stage: Stage| {
            *state = FileState::after(stage);
            log::debug!("'{}' -> {:?}", identifier, state);
        };

        if self.cancellation.is_cancelled() {
            return fail(Stage::Load, ScalogramError::Cancelled);
        }

        let started = Instant::now();
        let mut state = FileState::Pending;
        let config = &self.config.scalogram;

        let signal = match source.load() {
            Ok(signal) => signal,
            Err(e) => return fail(Stage::Load, e),
        };
        advance(&mut state, Stage::Load);

        let transformed = config
            .scales
            .resolve(config.wavelet, signal.sample_rate(), signal.len())
            .and_then(|scales| {
                engine
                    .transform_with_cache(&signal, &scales, config.wavelet, cache)
                    .map(|matrix| (scales, matrix))
            });
        let (scales, matrix) = match transformed {
            Ok(pair) => pair,
            Err(e) => return fail(Stage::Transform, e),
        };
        advance(&mut state, Stage::Transform);

        let image = match render(&matrix, &scales, signal.sample_rate(), &config.render) {
            Ok(image) => image,
            Err(e) => return fail(Stage::Render, e),
        };
        advance(&mut state, Stage::Render);

        let emitted = match sink {
            Some(sink) => {
                if let Err(e) = sink.emit(&identifier, &image) {
                    let error = match e {
                        ScalogramError::OutputFailure(_) => e,
                        other => ScalogramError::OutputFailure(other.to_string()),
                    };
                    return fail(Stage::Emit, error);
                }
                advance(&mut state, Stage::Emit);
                true
            }
            None => false,
        };

        log::info!(
            "'{}': {} samples at {} Hz -> {}x{} scalogram in {:.2?}",
            identifier,
            signal.len(),
            signal.sample_rate(),
            image.width(),
            image.height(),
            started.elapsed()
        );

        ProcessingResult::Success {
            identifier,
            image,
            emitted,
        }
    }
}

/// Counts and failure reasons of a finished batch
#[derive(Debug, Clone, PartialEq)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// (identifier, stage, error) in input order
    pub failures: Vec<(String, Stage, ScalogramError)>,
}

impl BatchSummary {
    pub fn from_results(results: &[ProcessingResult]) -> Self {
        let failures: Vec<(String, Stage, ScalogramError)> = results
            .iter()
            .filter_map(|result| match result {
                ProcessingResult::Failure {
                    identifier,
                    stage,
                    error,
                } => Some((identifier.clone(), *stage, error.clone())),
                ProcessingResult::Success { .. } => None,
            })
            .collect();

        Self {
            total: results.len(),
            succeeded: results.len() - failures.len(),
            failed: failures.len(),
            failures,
        }
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    /// Failure count per error kind
    pub fn failures_by_kind(&self) -> HashMap<ErrorKind, usize> {
        let mut counts = HashMap::new();
        for (_, _, error) in &self.failures {
            *counts.entry(error.kind()).or_insert(0) += 1;
        }
        counts
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Processed {} file(s): {} succeeded, {} failed",
            self.total, self.succeeded, self.failed
        )?;
        for (identifier, stage, error) in &self.failures {
            write!(f, "\n  {} [{}] {}", identifier, stage, error)?;
        }
        Ok(())
    }
}
