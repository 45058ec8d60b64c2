//! Formatting helpers and configuration presets
//!
//! Used for axis labels and by client applications.

use crate::batch::ScalogramConfig;

/// Format a frequency value for display
pub fn format_frequency(freq_hz: f64) -> String {
    if freq_hz >= 1000.0 {
        format!("{:.2} kHz", freq_hz / 1000.0)
    } else if freq_hz >= 10.0 {
        format!("{:.1} Hz", freq_hz)
    } else {
        format!("{:.3} Hz", freq_hz)
    }
}

/// Format a time value for display
pub fn format_time(time_sec: f64) -> String {
    if time_sec >= 60.0 {
        let minutes = (time_sec / 60.0).floor();
        let seconds = time_sec % 60.0;
        format!("{:.0}m {:.1}s", minutes, seconds)
    } else {
        format!("{:.2}s", time_sec)
    }
}

/// Format a wavelet scale (seconds) for display
pub fn format_scale(scale_sec: f64) -> String {
    if scale_sec < 1e-3 {
        format!("{:.1} µs", scale_sec * 1e6)
    } else if scale_sec < 1.0 {
        format!("{:.2} ms", scale_sec * 1e3)
    } else {
        format!("{:.3} s", scale_sec)
    }
}

/// Format duration in samples to time string
pub fn format_duration(samples: usize, sample_rate: f64) -> String {
    format_time(samples as f64 / sample_rate)
}

/// One-paragraph description of a configuration
pub fn config_summary(config: &ScalogramConfig) -> String {
    let mut summary = String::new();
    summary.push_str(&format!("Wavelet: {}\n", config.wavelet));
    summary.push_str(&format!("Scale range: {:?}\n", config.scales.range));
    summary.push_str(&format!(
        "Points per octave: {}\n",
        config.scales.points_per_octave
    ));
    summary.push_str(&format!(
        "Padding: {}, FFT above {} taps\n",
        config.cwt.padding, config.cwt.fft_threshold
    ));
    summary.push_str(&format!(
        "Amplitude: {}, color map: {}, clip at {} percentile",
        config.render.amplitude_scale, config.render.colormap, config.render.clip_percentile
    ));
    if let Some(width) = config.render.target_width {
        summary.push_str(&format!(", width {} px", width));
    }
    summary
}

/// Commonly used scalogram configurations
pub mod presets {
    use super::*;
    use crate::colormap::ColorMap;
    use crate::scalogram::AmplitudeScale;
    use crate::wavelet::WaveletFamily;

    /// Preset information structure
    pub struct PresetInfo {
        pub id: usize,
        pub name: &'static str,
        pub description: &'static str,
        pub config: ScalogramConfig,
    }

    /// Default
    pub fn default() -> ScalogramConfig {
        ScalogramConfig::default()
    }

    /// Dense scale bank for close-lying components
    pub fn high_resolution() -> ScalogramConfig {
        let mut config = ScalogramConfig::default();
        config.scales.points_per_octave = 32;
        config
    }

    /// Coarse bank and narrow image for quick looks at long recordings
    pub fn fast_preview() -> ScalogramConfig {
        let mut config = ScalogramConfig::default();
        config.scales.points_per_octave = 6;
        config.render.target_width = Some(1024);
        config
    }

    /// Greyscale linear magnitude, strongest coefficients darkest
    pub fn classic() -> ScalogramConfig {
        let mut config = ScalogramConfig::default();
        config.render.colormap = ColorMap::Greys;
        config.render.amplitude_scale = AmplitudeScale::Linear;
        config
    }

    /// Mexican hat with decibel mapping, for transients
    pub fn transients() -> ScalogramConfig {
        let mut config = ScalogramConfig::default();
        config.wavelet = WaveletFamily::DerivativeOfGaussian { order: 2 };
        config.render.amplitude_scale = AmplitudeScale::Logarithmic;
        config.render.colormap = ColorMap::Inferno;
        config
    }

    /// Get all presets with their names
    pub fn all_presets() -> Vec<(&'static str, ScalogramConfig)> {
        list_presets()
            .into_iter()
            .map(|preset| (preset.name, preset.config))
            .collect()
    }

    /// List all presets with detailed info
    pub fn list_presets() -> Vec<PresetInfo> {
        vec![
            PresetInfo {
                id: 0,
                name: "Default",
                description: "Morlet, 12 per octave, viridis, linear",
                config: default(),
            },
            PresetInfo {
                id: 1,
                name: "High Resolution",
                description: "Morlet, 32 per octave",
                config: high_resolution(),
            },
            PresetInfo {
                id: 2,
                name: "Fast Preview",
                description: "Morlet, 6 per octave, 1024 px wide",
                config: fast_preview(),
            },
            PresetInfo {
                id: 3,
                name: "Classic",
                description: "Morlet, greys, linear",
                config: classic(),
            },
            PresetInfo {
                id: 4,
                name: "Transients",
                description: "Mexican hat, inferno, dB",
                config: transients(),
            },
        ]
    }

    /// Get a preset by ID
    pub fn get_preset(id: usize) -> Option<PresetInfo> {
        list_presets().into_iter().find(|p| p.id == id)
    }

    /// Get a preset by name, ignoring case, spaces and dashes
    pub fn find_preset(name: &str) -> Option<PresetInfo> {
        let normalize = |s: &str| {
            s.chars()
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
                .to_ascii_lowercase()
        };
        let wanted = normalize(name);
        list_presets()
            .into_iter()
            .find(|p| normalize(p.name) == wanted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frequency_formatting() {
        assert_eq!(format_frequency(440.0), "440.0 Hz");
        assert_eq!(format_frequency(1000.0), "1.00 kHz");
        assert_eq!(format_frequency(22050.0), "22.05 kHz");
        assert_eq!(format_frequency(2.5), "2.500 Hz");
    }

    #[test]
    fn test_time_formatting() {
        assert_eq!(format_time(0.5), "0.50s");
        assert_eq!(format_time(45.0), "45.00s");
        assert_eq!(format_time(75.5), "1m 15.5s");
        assert_eq!(format_duration(500, 1000.0), "0.50s");
    }

    #[test]
    fn test_scale_formatting() {
        assert_eq!(format_scale(0.0005), "500.0 µs");
        assert_eq!(format_scale(0.0484), "48.40 ms");
        assert_eq!(format_scale(2.0), "2.000 s");
    }

    #[test]
    fn test_presets() {
        let presets = presets::all_presets();
        assert_eq!(presets.len(), 5);

        for (name, config) in presets {
            assert!(config.validate().is_ok(), "preset {} is invalid", name);
        }
        assert_eq!(presets::get_preset(3).unwrap().name, "Classic");
        assert_eq!(presets::find_preset("fast-preview").unwrap().id, 2);
        assert!(presets::find_preset("nope").is_none());
    }

    #[test]
    fn test_config_summary() {
        let summary = config_summary(&presets::fast_preview());
        assert!(summary.contains("Wavelet: Morlet (omega0=6)"));
        assert!(summary.contains("width 1024 px"));
    }
}
