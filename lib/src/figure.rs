//! Annotated scalogram figures
//!
//! Frames a rendered raster with tick marks and labels on both axes, a
//! colorbar with its end values, and the input identifier as title. Labels
//! are drawn with a built-in 3x5 pixel font (upper case only).

use crate::colormap::ColorLut;
use crate::error::{Result, ScalogramError};
use crate::scalogram::{AmplitudeScale, AxisTick, ScalogramImage};
use image::{imageops, Rgb, RgbImage};

const GLYPH_SCALE: u32 = 2;
const GLYPH_WIDTH: u32 = 3 * GLYPH_SCALE;
const GLYPH_HEIGHT: u32 = 5 * GLYPH_SCALE;
const GLYPH_ADVANCE: u32 = GLYPH_WIDTH + GLYPH_SCALE;

const PAD: u32 = 6;
const TICK_LEN: u32 = 4;
const LABEL_GAP: u32 = 3;
const COLORBAR_WIDTH: u32 = 14;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const INK: Rgb<u8> = Rgb([0, 0, 0]);

/// Rows of a glyph, three bits each with the leftmost pixel in bit 2
fn glyph(c: char) -> [u8; 5] {
    match c.to_ascii_uppercase() {
        '0' => [0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => [0b111, 0b001, 0b111, 0b100, 0b111],
        '3' => [0b111, 0b001, 0b111, 0b001, 0b111],
        '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
        '5' => [0b111, 0b100, 0b111, 0b001, 0b111],
        '6' => [0b111, 0b100, 0b111, 0b101, 0b111],
        '7' => [0b111, 0b001, 0b001, 0b001, 0b001],
        '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => [0b111, 0b101, 0b111, 0b001, 0b111],
        'A' => [0b010, 0b101, 0b111, 0b101, 0b101],
        'B' => [0b110, 0b101, 0b110, 0b101, 0b110],
        'C' => [0b011, 0b100, 0b100, 0b100, 0b011],
        'D' => [0b110, 0b101, 0b101, 0b101, 0b110],
        'E' => [0b111, 0b100, 0b110, 0b100, 0b111],
        'F' => [0b111, 0b100, 0b110, 0b100, 0b100],
        'G' => [0b011, 0b100, 0b101, 0b101, 0b011],
        'H' => [0b101, 0b101, 0b111, 0b101, 0b101],
        'I' => [0b111, 0b010, 0b010, 0b010, 0b111],
        'J' => [0b001, 0b001, 0b001, 0b101, 0b010],
        'K' => [0b101, 0b101, 0b110, 0b101, 0b101],
        'L' => [0b100, 0b100, 0b100, 0b100, 0b111],
        'M' => [0b101, 0b111, 0b111, 0b101, 0b101],
        'N' => [0b110, 0b101, 0b101, 0b101, 0b101],
        'O' => [0b010, 0b101, 0b101, 0b101, 0b010],
        'P' => [0b110, 0b101, 0b110, 0b100, 0b100],
        'Q' => [0b010, 0b101, 0b101, 0b110, 0b011],
        'R' => [0b110, 0b101, 0b110, 0b101, 0b101],
        'S' => [0b011, 0b100, 0b010, 0b001, 0b110],
        'T' => [0b111, 0b010, 0b010, 0b010, 0b010],
        'U' => [0b101, 0b101, 0b101, 0b101, 0b111],
        'V' => [0b101, 0b101, 0b101, 0b101, 0b010],
        'W' => [0b101, 0b101, 0b111, 0b111, 0b101],
        'X' => [0b101, 0b101, 0b010, 0b101, 0b101],
        'Y' => [0b101, 0b101, 0b010, 0b010, 0b010],
        'Z' => [0b111, 0b001, 0b010, 0b100, 0b111],
        'µ' => [0b000, 0b101, 0b101, 0b111, 0b100],
        '.' => [0b000, 0b000, 0b000, 0b000, 0b010],
        ',' => [0b000, 0b000, 0b000, 0b010, 0b100],
        '-' => [0b000, 0b000, 0b111, 0b000, 0b000],
        '+' => [0b000, 0b010, 0b111, 0b010, 0b000],
        '_' => [0b000, 0b000, 0b000, 0b000, 0b111],
        ':' => [0b000, 0b010, 0b000, 0b010, 0b000],
        '=' => [0b000, 0b111, 0b000, 0b111, 0b000],
        '/' => [0b001, 0b001, 0b010, 0b100, 0b100],
        '(' => [0b001, 0b010, 0b010, 0b010, 0b001],
        ')' => [0b100, 0b010, 0b010, 0b010, 0b100],
        '%' => [0b101, 0b001, 0b010, 0b100, 0b101],
        ' ' => [0; 5],
        _ => [0b111, 0b001, 0b010, 0b000, 0b010],
    }
}

/// Width in pixels of `text` in the label font
pub fn text_width(text: &str) -> u32 {
    match text.chars().count() as u32 {
        0 => 0,
        n => n * GLYPH_ADVANCE - (GLYPH_ADVANCE - GLYPH_WIDTH),
    }
}

fn put(canvas: &mut RgbImage, x: u32, y: u32, color: Rgb<u8>) {
    if x < canvas.width() && y < canvas.height() {
        canvas.put_pixel(x, y, color);
    }
}

/// Draw `text` with its top-left corner at (x, y); pixels off the canvas are dropped
fn draw_text(canvas: &mut RgbImage, text: &str, x: u32, y: u32) {
    for (i, c) in text.chars().enumerate() {
        let origin = x + i as u32 * GLYPH_ADVANCE;
        for (row, bits) in glyph(c).iter().enumerate() {
            for col in 0..3u32 {
                if bits & (0b100 >> col) == 0 {
                    continue;
                }
                for dy in 0..GLYPH_SCALE {
                    for dx in 0..GLYPH_SCALE {
                        put(
                            canvas,
                            origin + col * GLYPH_SCALE + dx,
                            y + row as u32 * GLYPH_SCALE + dy,
                            INK,
                        );
                    }
                }
            }
        }
    }
}

fn hline(canvas: &mut RgbImage, x0: u32, x1: u32, y: u32) {
    for x in x0..x1 {
        put(canvas, x, y, INK);
    }
}

fn vline(canvas: &mut RgbImage, x: u32, y0: u32, y1: u32) {
    for y in y0..y1 {
        put(canvas, x, y, INK);
    }
}

/// One-pixel outline around the `width` x `height` area starting at (x, y)
fn outline(canvas: &mut RgbImage, x: u32, y: u32, width: u32, height: u32) {
    let (x0, y0) = (x - 1, y - 1);
    let (x1, y1) = (x + width, y + height);
    hline(canvas, x0, x1 + 1, y0);
    hline(canvas, x0, x1 + 1, y1);
    vline(canvas, x0, y0, y1 + 1);
    vline(canvas, x1, y0, y1 + 1);
}

/// Labels at the top and bottom of the colorbar
pub fn colorbar_labels(image: &ScalogramImage) -> (String, String) {
    match image.amplitude_scale {
        AmplitudeScale::Linear => (format!("{:.3e}", image.clip_level), "0".to_string()),
        AmplitudeScale::Logarithmic => {
            ("0 dB".to_string(), format!("-{} dB", image.dynamic_range_db))
        }
    }
}

fn widest(labels: &[AxisTick]) -> u32 {
    labels
        .iter()
        .map(|tick| text_width(&tick.label))
        .max()
        .unwrap_or(0)
}

fn to_u32(value: u64, what: &str) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| ScalogramError::RenderFailure(format!("Figure too large: {} {}", what, value)))
}

/// Pixel offsets of the raster and colorbar inside a figure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FigureLayout {
    /// Top-left corner of the raster
    pub raster_origin: (u32, u32),
    /// Left edge of the colorbar
    pub colorbar_x: u32,
    pub width: u32,
    pub height: u32,
}

impl FigureLayout {
    pub fn for_image(image: &ScalogramImage) -> Result<Self> {
        let raster_width = u64::from(image.width());
        let raster_height = u64::from(image.height());
        let (bar_top, bar_bottom) = colorbar_labels(image);

        let left = PAD + widest(&image.axes.vertical_ticks) + LABEL_GAP + TICK_LEN + 1;
        let top = PAD + GLYPH_HEIGHT + PAD + 1;
        let bottom = 1 + TICK_LEN + LABEL_GAP + GLYPH_HEIGHT + PAD;
        let bar_labels = text_width(&bar_top).max(text_width(&bar_bottom));
        let right = 1 + 2 * PAD + COLORBAR_WIDTH + 1 + TICK_LEN + LABEL_GAP + bar_labels + PAD;

        let width = to_u32(u64::from(left) + raster_width + u64::from(right), "pixels wide")?;
        let height = to_u32(u64::from(top) + raster_height + u64::from(bottom), "pixels tall")?;
        let colorbar_x = to_u32(u64::from(left) + raster_width + 1 + u64::from(2 * PAD), "px")?;

        Ok(Self {
            raster_origin: (left, top),
            colorbar_x,
            width,
            height,
        })
    }
}

/// Compose the annotated figure for `image` with `title` above the plot
pub fn compose_figure(image: &ScalogramImage, title: &str) -> Result<RgbImage> {
    let layout = FigureLayout::for_image(image)?;
    let (left, top) = layout.raster_origin;
    let (raster_width, raster_height) = (image.width(), image.height());

    let mut canvas = RgbImage::from_pixel(layout.width, layout.height, BACKGROUND);
    imageops::replace(&mut canvas, &image.image, i64::from(left), i64::from(top));
    outline(&mut canvas, left, top, raster_width, raster_height);

    draw_text(&mut canvas, title, left, PAD);

    let max_text_y = layout.height.saturating_sub(GLYPH_HEIGHT);
    for tick in &image.axes.vertical_ticks {
        let y = top + tick.position as u32;
        let tick_start = left - 1 - TICK_LEN;
        hline(&mut canvas, tick_start, left - 1, y);
        let x = tick_start.saturating_sub(LABEL_GAP + text_width(&tick.label));
        let text_y = y.saturating_sub(GLYPH_HEIGHT / 2).min(max_text_y);
        draw_text(&mut canvas, &tick.label, x, text_y);
    }

    let axis_y = top + raster_height + 1;
    for tick in &image.axes.time_ticks {
        let x = left + tick.position as u32;
        vline(&mut canvas, x, axis_y, axis_y + TICK_LEN);
        let label_width = text_width(&tick.label);
        let text_x = x
            .saturating_sub(label_width / 2)
            .min(layout.width.saturating_sub(label_width));
        draw_text(&mut canvas, &tick.label, text_x, axis_y + TICK_LEN + LABEL_GAP);
    }

    // Colorbar: top of the palette at the top
    let lut = ColorLut::new(image.colormap);
    for y in 0..raster_height {
        let t = if raster_height > 1 {
            1.0 - f64::from(y) / f64::from(raster_height - 1)
        } else {
            1.0
        };
        let color = lut.lookup(t);
        for x in layout.colorbar_x..layout.colorbar_x + COLORBAR_WIDTH {
            put(&mut canvas, x, top + y, color);
        }
    }
    outline(&mut canvas, layout.colorbar_x, top, COLORBAR_WIDTH, raster_height);

    let (bar_top, bar_bottom) = colorbar_labels(image);
    let bar_tick_x = layout.colorbar_x + COLORBAR_WIDTH + 1;
    let bar_text_x = bar_tick_x + TICK_LEN + LABEL_GAP;
    let bottom_row = top + raster_height - 1;
    hline(&mut canvas, bar_tick_x, bar_tick_x + TICK_LEN, top);
    hline(&mut canvas, bar_tick_x, bar_tick_x + TICK_LEN, bottom_row);
    draw_text(&mut canvas, &bar_top, bar_text_x, top.saturating_sub(GLYPH_HEIGHT / 2));
    draw_text(
        &mut canvas,
        &bar_bottom,
        bar_text_x,
        bottom_row.saturating_sub(GLYPH_HEIGHT / 2).min(max_text_y),
    );

    Ok(canvas)
}

/// Keyword/value pairs describing the axes and amplitude mapping of `image`
pub fn text_metadata(image: &ScalogramImage, title: &str) -> Vec<(String, String)> {
    let ticks = |ticks: &[AxisTick]| {
        ticks
            .iter()
            .map(|tick| format!("{}:{}", tick.position, tick.label))
            .collect::<Vec<_>>()
            .join("; ")
    };
    let axes = &image.axes;

    let mut entries = vec![
        ("Title".to_string(), title.to_string()),
        ("Software".to_string(), format!("scalogram {}", crate::VERSION)),
        ("Vertical axis".to_string(), axes.vertical_axis.to_string()),
        ("Vertical ticks".to_string(), ticks(&axes.vertical_ticks)),
        (
            "Vertical range".to_string(),
            format!("{} to {}", axes.vertical_range.0, axes.vertical_range.1),
        ),
        ("Time ticks".to_string(), ticks(&axes.time_ticks)),
        (
            "Time range".to_string(),
            format!("{} to {} s", axes.time_range.0, axes.time_range.1),
        ),
        ("Amplitude".to_string(), image.amplitude_scale.to_string()),
        ("Colormap".to_string(), image.colormap.to_string()),
        ("Clip level".to_string(), format!("{:e}", image.clip_level)),
    ];
    if image.amplitude_scale == AmplitudeScale::Logarithmic {
        entries.push((
            "Dynamic range".to_string(),
            format!("{} dB", image.dynamic_range_db),
        ));
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cwt::CoefficientMatrix;
    use crate::scales::ScaleSet;
    use crate::scalogram::{render, RenderOptions, VerticalAxis};
    use crate::wavelet::WaveletFamily;

    fn ramp_image(options: &RenderOptions) -> ScalogramImage {
        let rows = (0..12)
            .map(|r| (0..40).map(|c| (r * 40 + c) as f64).collect())
            .collect();
        let matrix = CoefficientMatrix::from_magnitudes(rows, WaveletFamily::default());
        let scales = ScaleSet::geometric(0.01, 0.01 * 2f64.powf(11.0 / 4.0), 4).unwrap();
        render(&matrix, &scales, 100.0, options).unwrap()
    }

    fn has_ink(canvas: &RgbImage, x0: u32, x1: u32, y0: u32, y1: u32) -> bool {
        (y0..y1).any(|y| (x0..x1).any(|x| *canvas.get_pixel(x, y) == INK))
    }

    #[test]
    fn test_text_width() {
        assert_eq!(text_width(""), 0);
        assert_eq!(text_width("1"), GLYPH_WIDTH);
        assert_eq!(text_width("10 HZ"), 5 * GLYPH_ADVANCE - GLYPH_SCALE);
    }

    #[test]
    fn test_figure_contains_raster() {
        let image = ramp_image(&RenderOptions::default());
        let figure = compose_figure(&image, "run1").unwrap();
        let layout = FigureLayout::for_image(&image).unwrap();
        let (left, top) = layout.raster_origin;

        assert_eq!(figure.dimensions(), (layout.width, layout.height));
        assert!(layout.width > image.width() && layout.height > image.height());
        for (x, y, pixel) in image.image.enumerate_pixels() {
            assert_eq!(figure.get_pixel(left + x, top + y), pixel);
        }
        // Frame just outside the raster
        assert_eq!(*figure.get_pixel(left - 1, top - 1), INK);
        assert_eq!(*figure.get_pixel(left + image.width(), top + image.height()), INK);
    }

    #[test]
    fn test_figure_draws_labels_and_colorbar() {
        let image = ramp_image(&RenderOptions::default());
        let figure = compose_figure(&image, "run1").unwrap();
        let layout = FigureLayout::for_image(&image).unwrap();
        let (left, top) = layout.raster_origin;
        let below = top + image.height() + 1;

        // Title, vertical labels, time labels
        assert!(has_ink(&figure, left, layout.width, 0, top - 1));
        assert!(has_ink(&figure, 0, left - 1 - TICK_LEN, top, top + image.height()));
        assert!(has_ink(&figure, 0, layout.width, below + TICK_LEN, layout.height));

        // Colorbar runs from the top of the palette down to the bottom
        let lut = ColorLut::new(image.colormap);
        let x = layout.colorbar_x + COLORBAR_WIDTH / 2;
        assert_eq!(*figure.get_pixel(x, top), lut.lookup(1.0));
        assert_eq!(*figure.get_pixel(x, top + image.height() - 1), lut.lookup(0.0));
    }

    #[test]
    fn test_colorbar_labels_follow_mapping() {
        let linear = ramp_image(&RenderOptions {
            amplitude_scale: AmplitudeScale::Linear,
            ..RenderOptions::default()
        });
        let (top, bottom) = colorbar_labels(&linear);
        assert_eq!(top, format!("{:.3e}", linear.clip_level));
        assert_eq!(bottom, "0");

        let log = ramp_image(&RenderOptions {
            amplitude_scale: AmplitudeScale::Logarithmic,
            dynamic_range_db: 60.0,
            ..RenderOptions::default()
        });
        assert_eq!(
            colorbar_labels(&log),
            ("0 dB".to_string(), "-60 dB".to_string())
        );
    }

    #[test]
    fn test_text_metadata() {
        let image = ramp_image(&RenderOptions {
            vertical_axis: VerticalAxis::Scale,
            ..RenderOptions::default()
        });
        let entries = text_metadata(&image, "run1");
        let get = |key: &str| {
            entries
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
                .unwrap()
        };

        assert_eq!(get("Title"), "run1");
        assert_eq!(get("Vertical axis"), VerticalAxis::Scale.to_string());
        assert!(get("Vertical ticks").starts_with(&format!(
            "0:{}",
            image.axes.vertical_ticks[0].label
        )));
        assert!(get("Time ticks").starts_with("0:0.00s"));
        assert_eq!(get("Clip level"), format!("{:e}", image.clip_level));
        assert!(entries.iter().all(|(k, _)| k != "Dynamic range"));
    }
}
