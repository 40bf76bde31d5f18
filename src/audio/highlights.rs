use super::bands::mean_std;
use super::features::{
    AudioHighlight, Band, BandEventKind, FrequencyBandEvent, HighlightKind, HighlightSource, RapidBeatSequence,
};

const ENERGY_FRAME_SECS: f64 = 0.5;
/// Moving-average width, in envelope frames
const ENERGY_SMOOTHING: usize = 8;
/// Rises are measured against the envelope one full frame earlier
const RISE_LOOKBACK: usize = 4;
const SHORT_FRAME_SECS: f64 = 0.05;

const SPIKE_DEDUP_SECS: f64 = 0.3;
const ACCENT_DEDUP_SECS: f64 = 0.3;
const VARIATION_DEDUP_SECS: f64 = 1.0;
const CLIMAX_DEDUP_SECS: f64 = 2.0;

const RAPID_MIN_INTERVAL: f64 = 0.1;
const RAPID_MAX_INTERVAL: f64 = 0.8;
const RAPID_INTERVAL_TOLERANCE: f64 = 0.15;
const RAPID_MIN_COUNT: usize = 3;

/// Smoothed 500 ms RMS envelope shared by the spike, variation and climax
/// detectors.
pub struct EnergyEnvelope {
    pub smoothed: Vec<f64>,
    pub hop_secs: f64,
}

impl EnergyEnvelope {
    pub fn new(samples: &[f32], sample_rate: u32) -> Self {
        let frame = (sample_rate as f64 * ENERGY_FRAME_SECS) as usize;
        let hop = (frame / 4).max(1);

        let mut energies = Vec::new();
        if frame > 0 && samples.len() > frame {
            let mut pos = 0;
            while pos < samples.len() - frame {
                let sum: f64 = samples[pos..pos + frame]
                    .iter()
                    .map(|&s| (s as f64) * (s as f64))
                    .sum();
                energies.push((sum / frame as f64).sqrt());
                pos += hop;
            }
        }

        Self {
            smoothed: smooth(&energies),
            hop_secs: hop as f64 / sample_rate as f64,
        }
    }

    /// Smoothed energy at a time relative to the window start.
    fn at(&self, rel_time: f64) -> f64 {
        if self.smoothed.is_empty() {
            return 0.0;
        }
        let idx = ((rel_time / self.hop_secs).max(0.0) as usize).min(self.smoothed.len() - 1);
        self.smoothed[idx]
    }
}

/// Mean over `[i - 4, i + 4)`: one second of envelope centered on each frame.
fn smooth(energies: &[f64]) -> Vec<f64> {
    (0..energies.len())
        .map(|i| {
            let lo = i.saturating_sub(ENERGY_SMOOTHING / 2);
            let hi = (i + ENERGY_SMOOTHING / 2).min(energies.len()).max(lo + 1);
            energies[lo..hi].iter().sum::<f64>() / (hi - lo) as f64
        })
        .collect()
}

/// Run every highlight detector and return a time-sorted list.
pub fn detect_highlights(
    samples: &[f32],
    sample_rate: u32,
    start_time: f64,
    band_events: &[FrequencyBandEvent],
) -> Vec<AudioHighlight> {
    let envelope = EnergyEnvelope::new(samples, sample_rate);

    let mut highlights = energy_spikes(&envelope, start_time);
    merge_band_accents(&mut highlights, band_events);
    variation_highlights(&mut highlights, samples, sample_rate, start_time, &envelope);
    add_climax(&mut highlights, &envelope, start_time);

    highlights.sort_by(|a, b| a.time.total_cmp(&b.time));
    highlights
}

fn has_nearby(highlights: &[AudioHighlight], time: f64, window: f64) -> bool {
    highlights.iter().any(|h| (h.time - time).abs() < window)
}

fn energy_spikes(envelope: &EnergyEnvelope, start_time: f64) -> Vec<AudioHighlight> {
    let smoothed = &envelope.smoothed;
    let mut highlights: Vec<AudioHighlight> = Vec::new();

    // Each contiguous stretch of qualifying frames is one rising edge,
    // reported at its steepest frame.
    let mut edge: Option<(usize, f64)> = None;
    for i in RISE_LOOKBACK..smoothed.len() {
        let current = smoothed[i];
        let increase = current - smoothed[i - RISE_LOOKBACK];

        if increase > 0.1 && current > 0.3 {
            edge = match edge {
                Some((_, best)) if best >= increase => edge,
                _ => Some((i, increase)),
            };
            continue;
        }
        if let Some((idx, increase)) = edge.take() {
            push_rise(&mut highlights, start_time + idx as f64 * envelope.hop_secs, increase);
        }
    }
    if let Some((idx, increase)) = edge {
        push_rise(&mut highlights, start_time + idx as f64 * envelope.hop_secs, increase);
    }

    highlights
}

fn push_rise(highlights: &mut Vec<AudioHighlight>, time: f64, increase: f64) {
    if has_nearby(highlights, time, SPIKE_DEDUP_SECS) {
        return;
    }
    highlights.push(AudioHighlight {
        time,
        kind: if increase > 0.2 {
            HighlightKind::Drop
        } else {
            HighlightKind::Transition
        },
        intensity: (increase * 50.0).round().min(10.0),
        source: Some(HighlightSource::All),
    });
}

fn merge_band_accents(highlights: &mut Vec<AudioHighlight>, events: &[FrequencyBandEvent]) {
    for event in events {
        if has_nearby(highlights, event.time, ACCENT_DEDUP_SECS) {
            continue;
        }
        let kind = match (event.kind, event.band) {
            (BandEventKind::PatternChange, _) => HighlightKind::Transition,
            (_, Band::Low) => HighlightKind::DrumAccent,
            (_, Band::Mid) => HighlightKind::BassAccent,
            (_, Band::High) => HighlightKind::HighAccent,
        };
        highlights.push(AudioHighlight {
            time: event.time,
            kind,
            intensity: event.intensity,
            source: Some(event.band.into()),
        });
    }
}

/// Flag seconds whose short-frame energy fluctuates far more than usual:
/// drum fills and build-ups.
fn variation_highlights(
    highlights: &mut Vec<AudioHighlight>,
    samples: &[f32],
    sample_rate: u32,
    start_time: f64,
    envelope: &EnergyEnvelope,
) {
    let rates = variation_rates(samples, sample_rate);
    let values: Vec<f64> = rates.iter().map(|&(_, rate)| rate).collect();
    let (mean, std) = mean_std(&values);
    if std <= f64::EPSILON {
        return;
    }

    for &(second, rate) in &rates {
        if rate <= mean + 1.5 * std {
            continue;
        }
        let time = start_time + second;
        if has_nearby(highlights, time, VARIATION_DEDUP_SECS) {
            continue;
        }
        let current = envelope.at(second);
        let next = envelope.at(second + 1.0);

        highlights.push(AudioHighlight {
            time,
            kind: if next > current * 1.2 {
                HighlightKind::Buildup
            } else {
                HighlightKind::Fillin
            },
            intensity: ((rate - mean) / std * 3.0).round().min(10.0),
            source: Some(HighlightSource::All),
        });
    }
}

/// (relative second, variation rate) per whole second of audio, excluding
/// the final second.
fn variation_rates(samples: &[f32], sample_rate: u32) -> Vec<(f64, f64)> {
    let frame = (sample_rate as f64 * SHORT_FRAME_SECS) as usize;
    let hop = (frame / 2).max(1);
    if frame == 0 || samples.len() <= frame {
        return Vec::new();
    }

    let mut short_energies = Vec::new();
    let mut pos = 0;
    while pos < samples.len() - frame {
        let sum: f64 = samples[pos..pos + frame].iter().map(|&s| s.abs() as f64).sum();
        short_energies.push(sum / frame as f64);
        pos += hop;
    }

    let frames_per_second = sample_rate as usize / hop;
    let whole_seconds = samples.len() / sample_rate as usize;

    (0..whole_seconds.saturating_sub(1))
        .filter_map(|sec| {
            let first = sec * frames_per_second;
            let last = ((sec + 1) * frames_per_second).min(short_energies.len());
            if last <= first {
                return None;
            }
            let variation: f64 = short_energies[first..last]
                .windows(2)
                .map(|w| (w[1] - w[0]).abs())
                .sum();
            Some((sec as f64, variation / (last - first) as f64))
        })
        .collect()
}

fn add_climax(highlights: &mut Vec<AudioHighlight>, envelope: &EnergyEnvelope, start_time: f64) {
    let Some((peak_idx, &peak)) = envelope
        .smoothed
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, &f64)>, (i, v)| match best {
            Some((_, b)) if *b >= *v => best,
            _ => Some((i, v)),
        })
    else {
        return;
    };
    if peak <= 0.0 {
        return;
    }

    let time = start_time + peak_idx as f64 * envelope.hop_secs;
    if !has_nearby(highlights, time, CLIMAX_DEDUP_SECS) {
        highlights.push(AudioHighlight {
            time,
            kind: HighlightKind::Climax,
            intensity: 10.0,
            source: Some(HighlightSource::All),
        });
    }
}

/// Find runs of at least three onsets with short, consistent spacing.
/// `onsets` must be sorted.
pub fn detect_rapid_sequences(onsets: &[f64]) -> Vec<RapidBeatSequence> {
    let mut sequences = Vec::new();
    let Some(&first) = onsets.first() else {
        return sequences;
    };

    let mut run = vec![first];
    let mut last_interval: Option<f64> = None;

    for &time in &onsets[1..] {
        let prev = *run.last().unwrap_or(&first);
        let interval = time - prev;
        let in_range = (RAPID_MIN_INTERVAL..=RAPID_MAX_INTERVAL).contains(&interval);
        let consistent = last_interval.map_or(true, |last| (interval - last).abs() < RAPID_INTERVAL_TOLERANCE);

        if in_range && consistent {
            run.push(time);
            last_interval = Some(interval);
            continue;
        }

        commit_run(&run, &mut sequences);
        if in_range {
            run = vec![prev, time];
            last_interval = Some(interval);
        } else {
            run = vec![time];
            last_interval = None;
        }
    }
    commit_run(&run, &mut sequences);

    sequences
}

fn commit_run(run: &[f64], sequences: &mut Vec<RapidBeatSequence>) {
    if run.len() < RAPID_MIN_COUNT {
        return;
    }
    let start = run[0];
    let end = run[run.len() - 1];
    sequences.push(RapidBeatSequence {
        start,
        end,
        interval: (end - start) / (run.len() - 1) as f64,
        count: run.len(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: u32 = 8000;

    /// Quiet noise-free bed with loud square-ish bursts at the given seconds.
    fn bursts(duration: f64, at: &[(f64, f64)], amplitude: f32) -> Vec<f32> {
        let n = (duration * SR as f64) as usize;
        let mut samples = vec![0.0f32; n];
        for (i, s) in samples.iter_mut().enumerate() {
            let t = i as f64 / SR as f64;
            *s = if i % 2 == 0 { 0.05 } else { -0.05 };
            if at.iter().any(|&(from, to)| t >= from && t < to) {
                *s *= amplitude / 0.05;
            }
        }
        samples
    }

    #[test]
    fn silence_yields_nothing() {
        let samples = vec![0.0f32; SR as usize * 10];
        assert!(detect_highlights(&samples, SR, 0.0, &[]).is_empty());
    }

    #[test]
    fn smoothing_spans_one_second_of_frames() {
        let mut energies = vec![0.0; 30];
        energies[10] = 8.0;
        let smoothed = smooth(&energies);
        let touched: Vec<usize> = (0..30).filter(|&i| smoothed[i] > 0.0).collect();
        assert_eq!(touched, (7..=14).collect::<Vec<_>>());
        assert!(smoothed[7..=14].iter().all(|&v| (v - 1.0).abs() < 1e-12));
    }

    #[test]
    fn loud_section_produces_single_drop_and_climax() {
        let samples = bursts(20.0, &[(10.0, 20.0)], 0.9);
        let highlights = detect_highlights(&samples, SR, 0.0, &[]);

        let rises: Vec<_> = highlights
            .iter()
            .filter(|h| matches!(h.kind, HighlightKind::Drop | HighlightKind::Transition))
            .collect();
        assert!(!rises.is_empty());
        // rising edges within the dedup window collapse to one
        for pair in rises.windows(2) {
            assert!(pair[1].time - pair[0].time >= SPIKE_DEDUP_SECS);
        }
        assert!(rises.iter().all(|h| h.time > 7.0 && h.time < 12.0));
        assert!(highlights.windows(2).all(|w| w[0].time <= w[1].time));
    }

    #[test]
    fn climax_is_always_reported_for_signal() {
        let samples = bursts(8.0, &[], 0.05);
        let highlights = detect_highlights(&samples, SR, 3.0, &[]);
        let climaxes: Vec<_> = highlights
            .iter()
            .filter(|h| h.kind == HighlightKind::Climax)
            .collect();
        assert_eq!(climaxes.len(), 1);
        assert_eq!(climaxes[0].intensity, 10.0);
        assert!(climaxes[0].time >= 3.0);
    }

    #[test]
    fn nearby_band_events_collapse_into_one_accent() {
        let events = vec![
            FrequencyBandEvent {
                time: 4.0,
                band: Band::Low,
                kind: BandEventKind::Accent,
                intensity: 6.0,
            },
            FrequencyBandEvent {
                time: 4.2,
                band: Band::High,
                kind: BandEventKind::Accent,
                intensity: 4.0,
            },
        ];
        let mut highlights = Vec::new();
        merge_band_accents(&mut highlights, &events);
        assert_eq!(highlights.len(), 1);
        assert_eq!(highlights[0].kind, HighlightKind::DrumAccent);
        assert_eq!(highlights[0].source, Some(HighlightSource::Low));
    }

    #[test]
    fn pattern_change_becomes_transition() {
        let events = vec![FrequencyBandEvent {
            time: 6.0,
            band: Band::Mid,
            kind: BandEventKind::PatternChange,
            intensity: 5.0,
        }];
        let mut highlights = Vec::new();
        merge_band_accents(&mut highlights, &events);
        assert_eq!(highlights.len(), 1);
        assert_eq!(highlights[0].kind, HighlightKind::Transition);
        assert!(!highlights[0].kind.is_accent());
        assert_eq!(highlights[0].source, Some(HighlightSource::Mid));
    }

    #[test]
    fn rapid_run_detected() {
        let onsets = [0.0, 2.0, 2.4, 2.8, 3.2, 6.0];
        let runs = detect_rapid_sequences(&onsets);
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].start, 2.0);
        assert_eq!(runs[0].end, 3.2);
        assert_eq!(runs[0].count, 4);
        assert!((runs[0].interval - 0.4).abs() < 1e-9);
    }

    #[test]
    fn irregular_spacing_breaks_run() {
        // 0.2 then 0.6: inconsistent intervals
        let runs = detect_rapid_sequences(&[1.0, 1.2, 1.8, 2.4, 3.0]);
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].start, 1.2);
        assert_eq!(runs[0].count, 4);
    }

    #[test]
    fn two_onsets_are_not_a_run() {
        assert!(detect_rapid_sequences(&[1.0, 1.3]).is_empty());
        assert!(detect_rapid_sequences(&[]).is_empty());
        // spaced wider than the rapid range
        assert!(detect_rapid_sequences(&[0.0, 1.0, 2.0, 3.0]).is_empty());
    }
}
