//! Scalogram batch CLI
//!
//! Renders a scalogram PNG for every recording in an input directory.

use std::fmt::Display;
use std::path::Path;
use std::process;
use std::str::FromStr;

use clap::{Arg, ArgAction, ArgMatches, Command};
use scalogram_lib::{
    colormap::ColorMap,
    output::{DirectorySink, OutputLayout},
    padding::PaddingMode,
    scales::{ScaleConfig, ScaleRange},
    scalogram::{AmplitudeScale, VerticalAxis},
    sources::discover_sources,
    utils::{self, presets},
    BatchConfig, BatchProcessor, BatchSummary, ScalogramConfig, WaveletFamily,
};

fn build_cli() -> Command {
    Command::new("Scalogram")
        .version(scalogram_lib::VERSION)
        .about("Continuous wavelet transform scalograms for every recording in a directory")
        .arg(
            Arg::new("input")
                .help("Directory with .aaa recordings or audio files")
                .value_name("DIR")
                .default_value("in")
                .index(1),
        )
        .arg(
            Arg::new("output")
                .long("output")
                .short('o')
                .help("Directory the PNG images are written to")
                .value_name("DIR")
                .default_value("out"),
        )
        .arg(
            Arg::new("preset")
                .long("preset")
                .help("Start from a named preset (see --list-presets)")
                .value_name("NAME"),
        )
        .arg(
            Arg::new("list-presets")
                .long("list-presets")
                .help("List available presets and exit")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("wavelet")
                .long("wavelet")
                .short('w')
                .help("Mother wavelet (morlet, morlet<omega0>, dog, dog<order>, mexh)")
                .value_name("NAME"),
        )
        .arg(
            Arg::new("freq-min")
                .long("freq-min")
                .help("Lowest analysed frequency in Hz")
                .value_name("HZ"),
        )
        .arg(
            Arg::new("freq-max")
                .long("freq-max")
                .help("Highest analysed frequency in Hz")
                .value_name("HZ"),
        )
        .arg(
            Arg::new("scale-min")
                .long("scale-min")
                .help("Smallest scale in seconds")
                .value_name("SECONDS")
                .conflicts_with_all(["freq-min", "freq-max"]),
        )
        .arg(
            Arg::new("scale-max")
                .long("scale-max")
                .help("Largest scale in seconds")
                .value_name("SECONDS")
                .conflicts_with_all(["freq-min", "freq-max"]),
        )
        .arg(
            Arg::new("points-per-octave")
                .long("points-per-octave")
                .short('p')
                .help("Scales per octave (1-96)")
                .value_name("N"),
        )
        .arg(
            Arg::new("padding")
                .long("padding")
                .help("Boundary extension (zero, reflective)")
                .value_name("MODE"),
        )
        .arg(
            Arg::new("fft-threshold")
                .long("fft-threshold")
                .help("Kernel length above which FFT convolution is used")
                .value_name("TAPS"),
        )
        .arg(
            Arg::new("amplitude")
                .long("amplitude")
                .short('a')
                .help("Amplitude mapping (linear, log)")
                .value_name("SCALE"),
        )
        .arg(
            Arg::new("dynamic-range")
                .long("dynamic-range")
                .help("Range shown by log mapping, in dB")
                .value_name("DB"),
        )
        .arg(
            Arg::new("colormap")
                .long("colormap")
                .short('c')
                .help("Palette (viridis, plasma, inferno, magma, turbo, grayscale, greys, jet)")
                .value_name("NAME"),
        )
        .arg(
            Arg::new("clip-percentile")
                .long("clip-percentile")
                .help("Percentile that saturates the palette, in (0, 100]")
                .value_name("P"),
        )
        .arg(
            Arg::new("width")
                .long("width")
                .help("Maximum image width; columns are max-pooled")
                .value_name("PIXELS"),
        )
        .arg(
            Arg::new("axis")
                .long("axis")
                .help("Vertical axis labels (frequency, scale)")
                .value_name("AXIS"),
        )
        .arg(
            Arg::new("layout")
                .long("layout")
                .help("Written image: annotated figure or bare raster (figure, raster)")
                .value_name("LAYOUT")
                .default_value("figure"),
        )
        .arg(
            Arg::new("threads")
                .long("threads")
                .short('j')
                .help("Worker threads (defaults to one per core)")
                .value_name("N"),
        )
}

/// Parse an optional argument with the type's `FromStr`
fn parse_arg<T>(matches: &ArgMatches, name: &str) -> Result<Option<T>, String>
where
    T: FromStr,
    T::Err: Display,
{
    matches
        .get_one::<String>(name)
        .map(|value| {
            value
                .parse::<T>()
                .map_err(|e| format!("Invalid value '{}' for --{}: {}", value, name, e))
        })
        .transpose()
}

fn scale_range(matches: &ArgMatches) -> Result<Option<ScaleRange>, String> {
    let freq_min = parse_arg::<f64>(matches, "freq-min")?;
    let freq_max = parse_arg::<f64>(matches, "freq-max")?;
    let scale_min = parse_arg::<f64>(matches, "scale-min")?;
    let scale_max = parse_arg::<f64>(matches, "scale-max")?;

    match (freq_min, freq_max, scale_min, scale_max) {
        (None, None, None, None) => Ok(None),
        (Some(min_hz), Some(max_hz), None, None) => {
            Ok(Some(ScaleRange::Frequency { min_hz, max_hz }))
        }
        (None, None, Some(min), Some(max)) => Ok(Some(ScaleRange::Scale { min, max })),
        _ => Err(
            "Give both --freq-min and --freq-max, or both --scale-min and --scale-max".to_string(),
        ),
    }
}

fn build_config(matches: &ArgMatches) -> Result<BatchConfig, String> {
    let mut config: ScalogramConfig = match matches.get_one::<String>("preset") {
        Some(name) => {
            presets::find_preset(name)
                .ok_or_else(|| format!("Unknown preset: {}", name))?
                .config
        }
        None => presets::default(),
    };

    if let Some(wavelet) = parse_arg::<WaveletFamily>(matches, "wavelet")? {
        config.wavelet = wavelet;
    }

    let range = scale_range(matches)?.unwrap_or(config.scales.range);
    let points_per_octave = parse_arg::<u32>(matches, "points-per-octave")?
        .unwrap_or(config.scales.points_per_octave);
    config.scales = ScaleConfig::new(range, points_per_octave).map_err(|e| e.to_string())?;

    if let Some(padding) = parse_arg::<PaddingMode>(matches, "padding")? {
        config.cwt.padding = padding;
    }
    if let Some(threshold) = parse_arg::<usize>(matches, "fft-threshold")? {
        config.cwt.fft_threshold = threshold;
    }

    if let Some(amplitude) = parse_arg::<AmplitudeScale>(matches, "amplitude")? {
        config.render.amplitude_scale = amplitude;
    }
    if let Some(range_db) = parse_arg::<f64>(matches, "dynamic-range")? {
        config.render.dynamic_range_db = range_db;
    }
    if let Some(colormap) = parse_arg::<ColorMap>(matches, "colormap")? {
        config.render.colormap = colormap;
    }
    if let Some(percentile) = parse_arg::<f64>(matches, "clip-percentile")? {
        config.render.clip_percentile = percentile;
    }
    if let Some(width) = parse_arg::<usize>(matches, "width")? {
        config.render.target_width = Some(width);
    }
    if let Some(axis) = parse_arg::<VerticalAxis>(matches, "axis")? {
        config.render.vertical_axis = axis;
    }

    let threads = parse_arg::<usize>(matches, "threads")?;
    BatchConfig::new(config, threads).map_err(|e| e.to_string())
}

fn print_presets() {
    println!("Available presets:");
    for preset in presets::list_presets() {
        println!("  {}: {:<16} - {}", preset.id, preset.name, preset.description);
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let matches = build_cli().get_matches();

    if matches.get_flag("list-presets") {
        print_presets();
        return;
    }

    let config = match build_config(&matches) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(2);
        }
    };

    let input_dir = matches
        .get_one::<String>("input")
        .map(String::as_str)
        .unwrap_or("in");
    let output_dir = matches
        .get_one::<String>("output")
        .map(String::as_str)
        .unwrap_or("out");

    println!("Scalogram v{}", scalogram_lib::VERSION);
    println!("{}", utils::config_summary(&config.scalogram));

    let inputs = match discover_sources(Path::new(input_dir)) {
        Ok(inputs) => inputs,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(2);
        }
    };
    if inputs.is_empty() {
        println!("No .aaa or audio files found in {}", input_dir);
        return;
    }

    let processor = match BatchProcessor::new(config) {
        Ok(processor) => processor,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(2);
        }
    };

    let layout = match parse_arg::<OutputLayout>(&matches, "layout") {
        Ok(layout) => layout.unwrap_or_default(),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(2);
        }
    };

    let sink = DirectorySink::new(output_dir).with_layout(layout);
    let results = processor.process_all_with_sink(&inputs, &sink);
    let summary = BatchSummary::from_results(&results);

    println!("{}", summary);
    if summary.has_failures() {
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scalogram_lib::scalogram::DEFAULT_CLIP_PERCENTILE;

    fn config_from(args: &[&str]) -> Result<BatchConfig, String> {
        let mut argv = vec!["scalogram"];
        argv.extend_from_slice(args);
        let matches = build_cli().try_get_matches_from(argv).map_err(|e| e.to_string())?;
        build_config(&matches)
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.scalogram, ScalogramConfig::default());
        assert_eq!(config.threads, None);
        assert_eq!(config.scalogram.render.clip_percentile, DEFAULT_CLIP_PERCENTILE);
    }

    #[test]
    fn test_flags_override_preset() {
        let config = config_from(&[
            "--preset",
            "classic",
            "--wavelet",
            "mexh",
            "--freq-min",
            "5",
            "--freq-max",
            "50",
            "-p",
            "8",
            "--width",
            "800",
            "-j",
            "2",
        ])
        .unwrap();
        let scalogram = config.scalogram;
        assert_eq!(scalogram.render.colormap, ColorMap::Greys);
        assert_eq!(
            scalogram.wavelet,
            WaveletFamily::DerivativeOfGaussian { order: 2 }
        );
        assert_eq!(
            scalogram.scales.range,
            ScaleRange::Frequency {
                min_hz: 5.0,
                max_hz: 50.0
            }
        );
        assert_eq!(scalogram.scales.points_per_octave, 8);
        assert_eq!(scalogram.render.target_width, Some(800));
        assert_eq!(config.threads, Some(2));
    }

    #[test]
    fn test_output_layout() {
        let layout = |args: &[&str]| {
            let mut argv = vec!["scalogram"];
            argv.extend_from_slice(args);
            let matches = build_cli().try_get_matches_from(argv).unwrap();
            parse_arg::<OutputLayout>(&matches, "layout")
        };
        assert_eq!(layout(&[]), Ok(Some(OutputLayout::Figure)));
        assert_eq!(layout(&["--layout", "raster"]), Ok(Some(OutputLayout::Raster)));
        assert!(layout(&["--layout", "svg"]).is_err());
    }

    #[test]
    fn test_invalid_values() {
        assert!(config_from(&["--colormap", "rainbow"]).is_err());
        assert!(config_from(&["--clip-percentile", "0"]).is_err());
        assert!(config_from(&["--freq-min", "5"]).is_err());
        assert!(config_from(&["--preset", "missing"]).is_err());
        assert!(config_from(&["--threads", "0"]).is_err());
        assert!(
            config_from(&["--freq-min", "5", "--freq-max", "50", "--scale-min", "0.1"]).is_err()
        );
    }
}
