use super::bands;
use super::decode::AudioWindow;
use super::features::{AudioAnalysis, AudioSection, Beat, BeatStrength, SectionKind};
use super::highlights;

pub const DEFAULT_BPM: f64 = 120.0;
const MIN_BPM: f64 = 60.0;
const MAX_BPM: f64 = 200.0;

const TEMPO_FRAME_SECS: f64 = 0.02;
const PEAK_THRESHOLD: f64 = 0.3;
const SECTION_TARGET_SECS: f64 = 15.0;
const WAVEFORM_POINTS: usize = 200;
/// Peak amplitude below which a window counts as silent
const SILENCE_FLOOR: f32 = 1e-6;
/// A run only counts as rapid when its hits come faster than this share of
/// the beat period; a steady kick on every beat is not a fill.
const RAPID_PULSE_SHARE: f64 = 0.9;

/// Extract tempo, beat grid, sections and highlights from one window.
///
/// Never fails: silent or too-short windows come back with defaults
/// (120 BPM, zero energy, no beats or highlights).
pub fn analyze(window: &AudioWindow) -> AudioAnalysis {
    let samples = window.samples;
    let sr = window.sample_rate;
    let start = window.start_time;
    let duration = window.duration();

    let mut analysis = AudioAnalysis::empty(start, window.end_time, sr);
    analysis.sections = detect_sections(samples, sr, start, window.end_time);
    analysis.waveform_data = waveform(samples, WAVEFORM_POINTS);

    let peak = samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
    if peak < SILENCE_FLOOR {
        log::warn!(
            "Window {:.2}s-{:.2}s is silent; using default tempo",
            start,
            window.end_time
        );
        return analysis;
    }

    log::info!("Estimating tempo...");
    analysis.bpm = estimate_bpm(samples, sr);
    analysis.beats = beat_grid(analysis.bpm, start, duration);
    analysis.energy = energy_score(samples);

    log::info!("Tracking frequency bands...");
    let band_energies = bands::band_energies(samples);
    analysis.frequency_events = bands::detect_band_events(&band_energies, sr, start);

    log::info!("Detecting highlights...");
    analysis.highlights =
        highlights::detect_highlights(samples, sr, start, &analysis.frequency_events);

    let mut onsets: Vec<f64> = analysis
        .beats
        .iter()
        .filter(|b| b.is_strong())
        .map(|b| b.time)
        .chain(
            analysis
                .highlights
                .iter()
                .filter(|h| h.kind.is_accent())
                .map(|h| h.time),
        )
        .collect();
    onsets.sort_by(|a, b| a.total_cmp(b));
    onsets.dedup();
    let beat_period = 60.0 / analysis.bpm;
    analysis.rapid_sequences = highlights::detect_rapid_sequences(&onsets)
        .into_iter()
        .filter(|run| run.interval < beat_period * RAPID_PULSE_SHARE)
        .collect();

    log::info!(
        "Analysis: bpm={:.0}, energy={:.0}, beats={}, sections={}, highlights={}, band events={}, rapid runs={}",
        analysis.bpm,
        analysis.energy,
        analysis.beats.len(),
        analysis.sections.len(),
        analysis.highlights.len(),
        analysis.frequency_events.len(),
        analysis.rapid_sequences.len()
    );

    analysis
}

/// Tempo from the median spacing of short-frame energy peaks.
pub fn estimate_bpm(samples: &[f32], sample_rate: u32) -> f64 {
    let frame = (sample_rate as f64 * TEMPO_FRAME_SECS) as usize;
    let hop = (frame / 2).max(1);
    if frame == 0 || samples.len() <= frame {
        return DEFAULT_BPM;
    }

    let mut energies = Vec::with_capacity((samples.len() - frame) / hop + 1);
    let mut pos = 0;
    while pos < samples.len() - frame {
        let energy: f64 = samples[pos..pos + frame]
            .iter()
            .map(|&s| (s as f64) * (s as f64))
            .sum();
        energies.push(energy);
        pos += hop;
    }

    let max_energy = energies.iter().copied().fold(0.0f64, f64::max);
    if max_energy <= 0.0 {
        return DEFAULT_BPM;
    }
    let threshold = max_energy * PEAK_THRESHOLD;

    // A flat top counts once, at its first frame
    let peaks: Vec<usize> = (1..energies.len().saturating_sub(1))
        .filter(|&i| {
            energies[i] > threshold && energies[i] > energies[i - 1] && energies[i] >= energies[i + 1]
        })
        .collect();

    if peaks.len() < 2 {
        return DEFAULT_BPM;
    }

    let mut intervals: Vec<usize> = peaks.windows(2).map(|w| w[1] - w[0]).collect();
    intervals.sort_unstable();
    let median = intervals[intervals.len() / 2];

    let seconds_per_beat = (median * hop) as f64 / sample_rate as f64;
    let mut bpm = (60.0 / seconds_per_beat).round();
    // Peaks minutes apart round to zero and could never be doubled into range
    if !(bpm.is_finite() && bpm > 0.0) {
        return DEFAULT_BPM;
    }
    while bpm < MIN_BPM {
        bpm *= 2.0;
    }
    while bpm > MAX_BPM {
        bpm = (bpm / 2.0).round();
    }
    bpm
}

/// Fixed-interval beat grid; every fourth beat is strong.
pub fn beat_grid(bpm: f64, start_time: f64, duration: f64) -> Vec<Beat> {
    if !(bpm.is_finite() && bpm > 0.0) || !(duration > 0.0) {
        return Vec::new();
    }
    let step = 60.0 / bpm;
    let max_beats = (duration * MAX_BPM / 60.0).ceil() as usize + 1;

    (0..max_beats)
        .map(|index| (index, index as f64 * step))
        .take_while(|&(_, offset)| offset < duration)
        .map(|(index, offset)| Beat {
            time: start_time + offset,
            strength: if index % 4 == 0 {
                BeatStrength::Strong
            } else {
                BeatStrength::Weak
            },
        })
        .collect()
}

/// RMS scaled to 0-10.
pub fn energy_score(samples: &[f32]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    let rms = (sum / samples.len() as f64).sqrt();
    (rms * 100.0).round().min(10.0)
}

/// Split the window into 3-6 equal sections labelled by position and energy.
pub fn detect_sections(
    samples: &[f32],
    sample_rate: u32,
    start_time: f64,
    end_time: f64,
) -> Vec<AudioSection> {
    let duration = end_time - start_time;
    if !(duration > 0.0) {
        return Vec::new();
    }
    let count = ((duration / SECTION_TARGET_SECS).floor() as usize).clamp(3, 6);
    let section_len = duration / count as f64;
    let sr = sample_rate as f64;

    (0..count)
        .map(|i| {
            let rel_start = i as f64 * section_len;
            let rel_end = if i == count - 1 {
                duration
            } else {
                (i + 1) as f64 * section_len
            };
            let first = ((rel_start * sr) as usize).min(samples.len());
            let last = ((rel_end * sr) as usize).clamp(first, samples.len());
            let energy = energy_score(&samples[first..last]);

            let kind = if i == 0 {
                SectionKind::Intro
            } else if i == count - 1 {
                SectionKind::Outro
            } else if energy >= 7.0 {
                SectionKind::Chorus
            } else if energy >= 4.0 {
                SectionKind::Verse
            } else {
                SectionKind::Bridge
            };

            AudioSection {
                start: start_time + rel_start,
                end: if i == count - 1 {
                    end_time
                } else {
                    start_time + rel_end
                },
                kind,
                energy,
            }
        })
        .collect()
}

/// Mean |x| per bucket, normalized to the loudest bucket.
pub fn waveform(samples: &[f32], points: usize) -> Vec<f32> {
    if samples.is_empty() || points == 0 {
        return vec![0.0; points];
    }

    let buckets: Vec<f32> = (0..points)
        .map(|i| {
            let first = (i * samples.len() / points).min(samples.len() - 1);
            let last = ((i + 1) * samples.len() / points).clamp(first + 1, samples.len());
            let chunk = &samples[first..last];
            chunk.iter().map(|s| s.abs()).sum::<f32>() / chunk.len() as f32
        })
        .collect();

    let max = buckets.iter().copied().fold(0.0f32, f32::max);
    if max <= 0.0 {
        return vec![0.0; points];
    }
    buckets.into_iter().map(|v| v / max).collect()
}
