//! Output collaborators

use std::fmt;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use image::RgbImage;

use crate::error::{Result, ScalogramError};
use crate::figure::{compose_figure, text_metadata};
use crate::scalogram::ScalogramImage;

/// Persists rendered scalograms
pub trait ImageSink: Send + Sync {
    fn emit(&self, identifier: &str, image: &ScalogramImage) -> Result<()>;
}

/// What the written PNG shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputLayout {
    /// Raster framed by axes, tick labels, colorbar and title
    #[default]
    Figure,
    /// Raster only, one pixel per matrix cell
    Raster,
}

impl fmt::Display for OutputLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputLayout::Figure => write!(f, "figure"),
            OutputLayout::Raster => write!(f, "raster"),
        }
    }
}

impl FromStr for OutputLayout {
    type Err = ScalogramError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "figure" => Ok(OutputLayout::Figure),
            "raster" | "bare" => Ok(OutputLayout::Raster),
            other => Err(ScalogramError::InvalidConfig(format!(
                "Unknown output layout: {}",
                other
            ))),
        }
    }
}

/// tEXt values must be Latin-1
fn latin1(text: &str) -> String {
    text.chars()
        .map(|c| if u32::from(c) <= 0xFF { c } else { '?' })
        .collect()
}

/// Write `pixels` as an 8-bit RGB PNG with `text` as tEXt chunks
pub fn write_png(path: &Path, pixels: &RgbImage, text: &[(String, String)]) -> Result<()> {
    let output_error = |e: &dyn fmt::Display| {
        ScalogramError::OutputFailure(format!(
            "Failed to save scalogram image {}: {}",
            path.display(),
            e
        ))
    };

    let file = File::create(path).map_err(|e| output_error(&e))?;
    let mut encoder = png::Encoder::new(BufWriter::new(file), pixels.width(), pixels.height());
    encoder.set_color(png::ColorType::Rgb);
    encoder.set_depth(png::BitDepth::Eight);
    for (keyword, value) in text {
        encoder
            .add_text_chunk(latin1(keyword), latin1(value))
            .map_err(|e| output_error(&e))?;
    }

    let mut writer = encoder.write_header().map_err(|e| output_error(&e))?;
    writer
        .write_image_data(pixels.as_raw())
        .map_err(|e| output_error(&e))?;
    writer.finish().map_err(|e| output_error(&e))
}

/// Writes `<dir>/<identifier>.png`
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
    layout: OutputLayout,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            layout: OutputLayout::default(),
        }
    }

    pub fn with_layout(mut self, layout: OutputLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn layout(&self) -> OutputLayout {
        self.layout
    }

    /// Destination of the image for `identifier`
    pub fn path_for(&self, identifier: &str) -> PathBuf {
        self.dir.join(format!("{}.png", identifier))
    }
}

impl ImageSink for DirectorySink {
    fn emit(&self, identifier: &str, image: &ScalogramImage) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|e| {
            ScalogramError::OutputFailure(format!(
                "Cannot create output directory {}: {}",
                self.dir.display(),
                e
            ))
        })?;

        let figure;
        let pixels = match self.layout {
            OutputLayout::Figure => {
                figure = compose_figure(image, identifier)?;
                &figure
            }
            OutputLayout::Raster => &image.image,
        };

        let path = self.path_for(identifier);
        write_png(&path, pixels, &text_metadata(image, identifier))?;

        log::info!(
            "Wrote {} ({}x{} {})",
            path.display(),
            pixels.width(),
            pixels.height(),
            self.layout
        );
        Ok(())
    }
}
