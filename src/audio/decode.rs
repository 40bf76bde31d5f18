use anyhow::{Context, Result};
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::AnalysisError;

/// Decoded track, already downmixed to mono.
pub struct AudioData {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioData {
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Select `[start, end)` for analysis. `end` defaults to (and is clamped to)
    /// the end of the track.
    pub fn window(&self, start: f64, end: Option<f64>) -> Result<AudioWindow<'_>, AnalysisError> {
        let end = end.unwrap_or_else(|| self.duration()).min(self.duration());
        AudioWindow::new(&self.samples, self.sample_rate, start, end)
    }
}

/// An immutable, validated slice of mono samples together with its position
/// in the source track.
#[derive(Clone, Copy, Debug)]
pub struct AudioWindow<'a> {
    pub samples: &'a [f32],
    pub sample_rate: u32,
    pub start_time: f64,
    pub end_time: f64,
}

impl<'a> AudioWindow<'a> {
    pub fn new(
        all_samples: &'a [f32],
        sample_rate: u32,
        start_time: f64,
        end_time: f64,
    ) -> Result<Self, AnalysisError> {
        if sample_rate == 0 {
            return Err(AnalysisError::InvalidSampleRate);
        }
        if !start_time.is_finite() || !end_time.is_finite() || start_time < 0.0 || end_time <= start_time {
            return Err(AnalysisError::InvalidWindow {
                start: start_time,
                end: end_time,
            });
        }

        let sr = sample_rate as f64;
        let first = ((start_time * sr).floor() as usize).min(all_samples.len());
        let last = ((end_time * sr).floor() as usize).clamp(first, all_samples.len());
        let samples = &all_samples[first..last];

        if let Some(pos) = samples.iter().position(|s| !s.is_finite()) {
            return Err(AnalysisError::NonFiniteSample { index: first + pos });
        }

        Ok(Self {
            samples,
            sample_rate,
            start_time,
            end_time,
        })
    }

    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }
}

pub fn decode_audio(path: &Path) -> Result<AudioData> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open audio file: {}", path.display()))?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .context("Failed to probe audio format")?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
        .context("No audio tracks found")?;

    let track_id = track.id;
    let channels = track.codec_params.channels.map_or(1, |c| c.count()).max(1);
    let sample_rate = track.codec_params.sample_rate.context("Unknown sample rate")?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .context("Failed to create audio decoder")?;

    let mut mono: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(symphonia::core::errors::Error::DecodeError(err)) => {
                log::debug!("Skipping undecodable packet: {}", err);
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let spec = *decoded.spec();
        let mut sample_buf = SampleBuffer::<f32>::new(decoded.frames() as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);

        downmix_into(&mut mono, sample_buf.samples(), channels);
    }

    log::info!(
        "Decoded audio: {} samples, {}Hz, {:.1}s ({} channel(s) downmixed)",
        mono.len(),
        sample_rate,
        mono.len() as f64 / sample_rate as f64,
        channels
    );

    Ok(AudioData {
        samples: mono,
        sample_rate,
    })
}

fn downmix_into(out: &mut Vec<f32>, interleaved: &[f32], channels: usize) {
    if channels == 1 {
        out.extend_from_slice(interleaved);
        return;
    }
    out.extend(
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_selects_sample_range() {
        let samples: Vec<f32> = (0..100).map(|i| i as f32 / 100.0).collect();
        let window = AudioWindow::new(&samples, 10, 2.0, 5.0).unwrap();
        assert_eq!(window.samples.len(), 30);
        assert_eq!(window.samples[0], 0.2);
        assert!((window.duration() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn rejects_reversed_window() {
        let samples = vec![0.0f32; 100];
        let err = AudioWindow::new(&samples, 10, 5.0, 5.0).unwrap_err();
        assert_eq!(err, AnalysisError::InvalidWindow { start: 5.0, end: 5.0 });
    }

    #[test]
    fn rejects_nan_samples() {
        let mut samples = vec![0.0f32; 100];
        samples[42] = f32::NAN;
        let err = AudioWindow::new(&samples, 10, 0.0, 10.0).unwrap_err();
        assert_eq!(err, AnalysisError::NonFiniteSample { index: 42 });
        // NaN outside the window is not our concern
        assert!(AudioWindow::new(&samples, 10, 5.0, 10.0).is_ok());
    }

    #[test]
    fn rejects_zero_sample_rate() {
        let samples = vec![0.0f32; 10];
        assert_eq!(
            AudioWindow::new(&samples, 0, 0.0, 1.0).unwrap_err(),
            AnalysisError::InvalidSampleRate
        );
    }

    #[test]
    fn window_end_is_clamped_to_track() {
        let audio = AudioData {
            samples: vec![0.1; 50],
            sample_rate: 10,
        };
        let window = audio.window(1.0, Some(60.0)).unwrap();
        assert_eq!(window.end_time, 5.0);
        assert_eq!(window.samples.len(), 40);
    }

    #[test]
    fn downmix_averages_channels() {
        let mut out = Vec::new();
        downmix_into(&mut out, &[1.0, 0.0, 0.5, 0.5], 2);
        assert_eq!(out, vec![0.5, 0.5]);
    }
}
