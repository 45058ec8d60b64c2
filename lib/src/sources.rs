//! Signal sources
//!
//! A [`SignalSource`] names one input and knows how to produce its
//! [`Signal`]. Loading is deferred so the batch processor can run it on a
//! worker and report failures per input.

use std::fs;
use std::path::{Path, PathBuf};

use crate::audio_io::read_audio_file;
use crate::error::{Result, ScalogramError};
use crate::signal::Signal;

/// Extension of the delimited-text recording format
pub const AAA_EXTENSION: &str = "aaa";

/// Audio extensions picked up by directory discovery
pub const AUDIO_EXTENSIONS: &[&str] = &["wav", "flac", "mp3", "ogg"];

/// Input collaborator
pub trait SignalSource: Send + Sync {
    /// Name used in results and for output files
    fn identifier(&self) -> &str;

    /// Produce the signal
    fn load(&self) -> Result<Signal>;
}

/// Samples already in memory
#[derive(Debug, Clone)]
pub struct MemorySource {
    identifier: String,
    samples: Vec<f64>,
    sample_rate: f64,
}

impl MemorySource {
    pub fn new(identifier: impl Into<String>, samples: Vec<f64>, sample_rate: f64) -> Self {
        Self {
            identifier: identifier.into(),
            samples,
            sample_rate,
        }
    }
}

impl SignalSource for MemorySource {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn load(&self) -> Result<Signal> {
        Signal::new(self.identifier.clone(), self.samples.clone(), self.sample_rate)
    }
}

fn identifier_from_path(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// `.aaa` recording: a comma-separated header ending in `<count>,<dt>`,
/// then one sample per line in the first column
#[derive(Debug, Clone)]
pub struct AaaFileSource {
    path: PathBuf,
    identifier: String,
}

impl AaaFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let identifier = identifier_from_path(&path);
        Self { path, identifier }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SignalSource for AaaFileSource {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn load(&self) -> Result<Signal> {
        let text = fs::read_to_string(&self.path).map_err(|e| {
            ScalogramError::LoadFailure(format!("Cannot read {}: {}", self.path.display(), e))
        })?;
        parse_aaa(&self.identifier, &text)
    }
}

/// Parse the text of an `.aaa` recording
pub fn parse_aaa(identifier: &str, text: &str) -> Result<Signal> {
    let mut lines = text.lines();
    let header = lines
        .next()
        .ok_or_else(|| ScalogramError::LoadFailure("Missing header line".to_string()))?;

    let fields: Vec<&str> = header.split(',').map(str::trim).collect();
    if fields.len() < 2 {
        return Err(ScalogramError::LoadFailure(format!(
            "Header needs an entry count and a sample interval: '{}'",
            header.trim()
        )));
    }
    let dt_field = fields[fields.len() - 1];
    let count_field = fields[fields.len() - 2];

    let dt: f64 = dt_field.parse().map_err(|_| {
        ScalogramError::LoadFailure(format!("Invalid sample interval '{}'", dt_field))
    })?;
    if !dt.is_finite() || dt <= 0.0 {
        return Err(ScalogramError::LoadFailure(format!(
            "Sample interval must be positive, got {}",
            dt
        )));
    }
    let expected: usize = count_field.parse().map_err(|_| {
        ScalogramError::LoadFailure(format!("Invalid entry count '{}'", count_field))
    })?;

    let mut samples = Vec::with_capacity(expected);
    for (offset, line) in lines.enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let field = line.split(',').next().unwrap_or("").trim();
        let value: f64 = field.parse().map_err(|_| {
            ScalogramError::LoadFailure(format!(
                "Invalid sample '{}' on line {}",
                field,
                offset + 2
            ))
        })?;
        samples.push(value);
    }

    if samples.len() != expected {
        return Err(ScalogramError::LoadFailure(format!(
            "Header announces {} entries but {} were found",
            expected,
            samples.len()
        )));
    }

    log::debug!(
        "Parsed '{}': {} samples, dt = {} s",
        identifier,
        samples.len(),
        dt
    );

    Signal::new(identifier, samples, 1.0 / dt)
}

/// Audio file decoded with Symphonia, mixed down to mono
#[derive(Debug, Clone)]
pub struct AudioFileSource {
    path: PathBuf,
    identifier: String,
}

impl AudioFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let identifier = identifier_from_path(&path);
        Self { path, identifier }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SignalSource for AudioFileSource {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn load(&self) -> Result<Signal> {
        let audio = read_audio_file(&self.path)?;
        log::info!(
            "Loaded audio '{}': {} channel(s), {} Hz, {:.2}s",
            self.identifier,
            audio.channels,
            audio.sample_rate,
            audio.duration_seconds()
        );
        Signal::new(
            self.identifier.clone(),
            audio.samples,
            audio.sample_rate as f64,
        )
    }
}

/// Source for a path, chosen by extension (None when unsupported)
pub fn source_for_path(path: &Path) -> Option<Box<dyn SignalSource>> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    if extension == AAA_EXTENSION {
        Some(Box::new(AaaFileSource::new(path)))
    } else if AUDIO_EXTENSIONS.contains(&extension.as_str()) {
        Some(Box::new(AudioFileSource::new(path)))
    } else {
        None
    }
}

/// Every supported file directly inside `dir`, sorted by file name
pub fn discover_sources<P: AsRef<Path>>(dir: P) -> Result<Vec<Box<dyn SignalSource>>> {
    let dir = dir.as_ref();
    let entries = fs::read_dir(dir).map_err(|e| {
        ScalogramError::LoadFailure(format!("Cannot read directory {}: {}", dir.display(), e))
    })?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .collect();
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    let sources: Vec<Box<dyn SignalSource>> = paths
        .iter()
        .filter_map(|path| source_for_path(path))
        .collect();

    log::info!(
        "Found {} input file(s) in {}",
        sources.len(),
        dir.display()
    );
    Ok(sources)
}
