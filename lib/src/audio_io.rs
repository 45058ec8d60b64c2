//! Audio decoding using Symphonia
//!
//! Decodes any container/codec pair Symphonia supports and folds the
//! channels into a single mono track for analysis.

use std::fs::File;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::{Result, ScalogramError};

/// Decoded audio folded to mono
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub sample_rate: u32,
    /// Channel count of the source before mixdown
    pub channels: usize,
    /// Mean of all channels, one value per frame
    pub samples: Vec<f64>,
}

impl DecodedAudio {
    pub fn duration_seconds(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

fn load_error(context: &str, err: impl std::fmt::Display) -> ScalogramError {
    ScalogramError::LoadFailure(format!("{}: {}", context, err))
}

fn decode_stream(source: Box<dyn MediaSource>, extension: Option<&str>) -> Result<DecodedAudio> {
    let mss = MediaSourceStream::new(source, Default::default());
    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| load_error("Unrecognized audio format", e))?;
    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| ScalogramError::LoadFailure("No default audio track".to_string()))?;
    let track_id = track.id;

    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| ScalogramError::LoadFailure("Sample rate not specified".to_string()))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| load_error("Unsupported codec", e))?;

    let mut channels = track
        .codec_params
        .channels
        .map(|c| c.count())
        .unwrap_or(0);
    let mut samples = Vec::new();
    let mut buffer: Option<SampleBuffer<f64>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(err))
                if err.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(err) => return Err(load_error("Failed to read packet", err)),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(err)) => {
                log::warn!("Skipping undecodable packet: {}", err);
                continue;
            }
            Err(SymphoniaError::IoError(err))
                if err.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(err) => return Err(load_error("Failed to decode audio", err)),
        };

        let spec = *decoded.spec();
        channels = spec.channels.count();
        if channels == 0 {
            continue;
        }

        let buf = buffer.get_or_insert_with(|| SampleBuffer::new(decoded.capacity() as u64, spec));
        if buf.capacity() < decoded.capacity() * channels {
            *buf = SampleBuffer::new(decoded.capacity() as u64, spec);
        }
        buf.copy_interleaved_ref(decoded);

        samples.extend(
            buf.samples()
                .chunks_exact(channels)
                .map(|frame| frame.iter().sum::<f64>() / channels as f64),
        );
    }

    log::debug!(
        "Decoded {} frames at {} Hz from {} channel(s)",
        samples.len(),
        sample_rate,
        channels
    );

    Ok(DecodedAudio {
        sample_rate,
        channels,
        samples,
    })
}

/// Decode an audio file, using its extension as a format hint
pub fn read_audio_file<P: AsRef<Path>>(path: P) -> Result<DecodedAudio> {
    let path = path.as_ref();
    let file = File::open(path)
        .map_err(|e| load_error(&format!("Cannot open {}", path.display()), e))?;
    let extension = path.extension().and_then(|e| e.to_str());
    decode_stream(Box::new(file), extension)
}
