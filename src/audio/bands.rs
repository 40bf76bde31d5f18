//! Coarse low/mid/high band tracking.
//!
//! Bands are approximated with one-pole filters over overlapping frames
//! rather than an FFT: good enough to spot kick, snare and hi-hat accents,
//! and cheap for long tracks.

use rayon::prelude::*;

use super::features::{Band, BandEventKind, FrequencyBandEvent};

const FRAME_SIZE: usize = 2048;
const HOP_SIZE: usize = 512;
const LOW_PASS_ALPHA: f64 = 0.1;
const HIGH_PASS_ALPHA: f64 = 0.9;
const SMOOTHING_RADIUS: usize = 8;
const MIN_FRAMES: usize = 10;
/// Events from different bands closer than this are the same hit.
const EVENT_DEDUP_SECS: f64 = 0.15;
/// Frames compared on each side of a candidate level shift
const SHIFT_SPAN: usize = 8;
/// Every frame on the loud side must exceed the quiet side by this factor
const SHIFT_RATIO: f64 = 2.0;

#[derive(Clone, Debug, Default)]
pub struct BandEnergies {
    pub low: Vec<f64>,
    pub mid: Vec<f64>,
    pub high: Vec<f64>,
}

impl BandEnergies {
    pub fn len(&self) -> usize {
        self.low.len()
    }
}

pub fn band_energies(samples: &[f32]) -> BandEnergies {
    if samples.len() < FRAME_SIZE {
        return BandEnergies::default();
    }
    let frame_count = (samples.len() - FRAME_SIZE) / HOP_SIZE + 1;

    let per_frame: Vec<(f64, f64, f64)> = (0..frame_count)
        .into_par_iter()
        .map(|frame| {
            let start = frame * HOP_SIZE;
            frame_bands(&samples[start..start + FRAME_SIZE])
        })
        .collect();

    let mut energies = BandEnergies {
        low: Vec::with_capacity(frame_count),
        mid: Vec::with_capacity(frame_count),
        high: Vec::with_capacity(frame_count),
    };
    for (low, mid, high) in per_frame {
        energies.low.push(low);
        energies.mid.push(mid);
        energies.high.push(high);
    }
    energies
}

fn frame_bands(frame: &[f32]) -> (f64, f64, f64) {
    let n = frame.len() as f64;
    let total: f64 = frame.iter().map(|&s| (s as f64) * (s as f64)).sum();
    let rms = (total / n).sqrt();

    let mut low_state = frame[0] as f64;
    let mut low_sum = 0.0;
    let mut high_state = 0.0f64;
    let mut high_sum = 0.0;

    for pair in frame.windows(2) {
        let prev = pair[0] as f64;
        let cur = pair[1] as f64;

        low_state = LOW_PASS_ALPHA * cur + (1.0 - LOW_PASS_ALPHA) * low_state;
        low_sum += low_state * low_state;

        high_state = HIGH_PASS_ALPHA * (high_state + cur - prev);
        high_sum += high_state * high_state;
    }

    let low = (low_sum / n).sqrt();
    let high = (high_sum / n).sqrt();
    let mid = (rms - 0.5 * low - 0.5 * high).max(0.0);
    (low, mid, high)
}

/// Detect sustained level shifts and sudden rises in each band.
/// `start_time` is the absolute time of the first sample.
pub fn detect_band_events(
    energies: &BandEnergies,
    sample_rate: u32,
    start_time: f64,
) -> Vec<FrequencyBandEvent> {
    let mut events = Vec::new();
    let hop_secs = HOP_SIZE as f64 / sample_rate as f64;

    for (series, band, threshold) in [
        (&energies.low, Band::Low, 1.2),
        (&energies.mid, Band::Mid, 1.5),
        (&energies.high, Band::High, 1.3),
    ] {
        detect_level_shifts(series, band, hop_secs, start_time, &mut events);
        detect_spikes(series, band, threshold, hop_secs, start_time, &mut events);
    }

    events.sort_by(|a, b| a.time.total_cmp(&b.time));
    events
}

fn detect_spikes(
    energies: &[f64],
    band: Band,
    threshold: f64,
    hop_secs: f64,
    start_time: f64,
    events: &mut Vec<FrequencyBandEvent>,
) {
    if energies.len() < MIN_FRAMES {
        return;
    }

    let smoothed = centered_average(energies, SMOOTHING_RADIUS);
    let (mean, std) = mean_std(&smoothed);
    if std <= f64::EPSILON {
        return;
    }

    for i in 2..energies.len() - 2 {
        let current = energies[i];
        let increase = current - energies[i - 1].max(energies[i - 2]);

        if increase > std * threshold && current > mean * 1.5 {
            let time = ((start_time + i as f64 * hop_secs) * 100.0).round() / 100.0;
            if events.iter().any(|e| (e.time - time).abs() < EVENT_DEDUP_SECS) {
                continue;
            }
            events.push(FrequencyBandEvent {
                time,
                band,
                kind: if increase > std * 2.0 {
                    BandEventKind::IntensitySpike
                } else {
                    BandEventKind::Accent
                },
                intensity: (increase / std * 3.0).round().min(10.0),
            });
        }
    }
}

/// A band entering or dropping out: every frame after `i` sits clearly above
/// (or below) every frame before it.
fn detect_level_shifts(
    energies: &[f64],
    band: Band,
    hop_secs: f64,
    start_time: f64,
    events: &mut Vec<FrequencyBandEvent>,
) {
    if energies.len() < MIN_FRAMES.max(2 * SHIFT_SPAN) {
        return;
    }
    let (_, std) = mean_std(energies);
    if std <= f64::EPSILON {
        return;
    }

    let fold = |slice: &[f64]| {
        slice.iter().fold((f64::INFINITY, f64::NEG_INFINITY, 0.0), |(lo, hi, sum), &v| {
            (lo.min(v), hi.max(v), sum + v)
        })
    };

    for i in SHIFT_SPAN..=energies.len() - SHIFT_SPAN {
        let (before_min, before_max, before_sum) = fold(&energies[i - SHIFT_SPAN..i]);
        let (after_min, after_max, after_sum) = fold(&energies[i..i + SHIFT_SPAN]);
        let rise = after_min > before_max * SHIFT_RATIO;
        let fall = after_max * SHIFT_RATIO < before_min;
        let change = (after_sum - before_sum).abs() / SHIFT_SPAN as f64;
        if !(rise || fall) || change <= std {
            continue;
        }

        let time = ((start_time + i as f64 * hop_secs) * 100.0).round() / 100.0;
        if events.iter().any(|e| (e.time - time).abs() < EVENT_DEDUP_SECS) {
            continue;
        }
        events.push(FrequencyBandEvent {
            time,
            band,
            kind: BandEventKind::PatternChange,
            intensity: (change / std * 3.0).round().min(10.0),
        });
    }
}

/// Mean over `[i - radius, i + radius]`, truncated at the edges.
fn centered_average(values: &[f64], radius: usize) -> Vec<f64> {
    (0..values.len())
        .map(|i| {
            let lo = i.saturating_sub(radius);
            let hi = (i + radius + 1).min(values.len());
            values[lo..hi].iter().sum::<f64>() / (hi - lo) as f64
        })
        .collect()
}

pub(crate) fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_input_has_no_frames() {
        let energies = band_energies(&vec![0.5; FRAME_SIZE - 1]);
        assert_eq!(energies.len(), 0);
        assert!(detect_band_events(&energies, 44100, 0.0).is_empty());
    }

    #[test]
    fn frame_count_follows_hop() {
        let energies = band_energies(&vec![0.1; FRAME_SIZE + 3 * HOP_SIZE]);
        assert_eq!(energies.len(), 4);
        assert_eq!(energies.mid.len(), 4);
        assert_eq!(energies.high.len(), 4);
    }

    #[test]
    fn dc_signal_lives_in_low_band() {
        let (low, _mid, high) = frame_bands(&vec![0.5; FRAME_SIZE]);
        assert!(low > 0.45);
        assert!(high < 1e-9);
    }

    #[test]
    fn alternating_signal_lives_in_high_band() {
        let frame: Vec<f32> = (0..FRAME_SIZE)
            .map(|i| if i % 2 == 0 { 0.5 } else { -0.5 })
            .collect();
        let (low, _mid, high) = frame_bands(&frame);
        assert!(high > low * 5.0);
    }

    #[test]
    fn isolated_bursts_become_events() {
        // Quiet bed with a loud burst every 40 frames
        let mut low = vec![0.01; 200];
        for i in (20..200).step_by(40) {
            low[i] = 1.0;
        }
        let energies = BandEnergies {
            mid: vec![0.0; 200],
            high: vec![0.0; 200],
            low,
        };
        let events = detect_band_events(&energies, 44100, 0.0);
        assert_eq!(events.len(), 5);
        assert!(events.iter().all(|e| e.band == Band::Low));
        assert!(events.windows(2).all(|w| w[0].time <= w[1].time));
    }

    #[test]
    fn band_entering_is_a_pattern_change() {
        let mut low = vec![0.01; 40];
        low.extend(vec![0.5; 40]);
        let energies = BandEnergies {
            mid: vec![0.0; 80],
            high: vec![0.0; 80],
            low,
        };
        let events = detect_band_events(&energies, 44100, 0.0);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, BandEventKind::PatternChange);
        assert_eq!(events[0].band, Band::Low);
        assert_eq!(events[0].time, 0.46);
    }

    #[test]
    fn band_dropping_out_is_a_pattern_change() {
        let mut high = vec![0.4; 30];
        high.extend(vec![0.02; 30]);
        let energies = BandEnergies {
            low: vec![0.0; 60],
            mid: vec![0.0; 60],
            high,
        };
        let events = detect_band_events(&energies, 44100, 0.0);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, BandEventKind::PatternChange);
        assert_eq!(events[0].band, Band::High);
    }

    #[test]
    fn simultaneous_band_hits_are_deduplicated() {
        let mut series = vec![0.01; 100];
        series[50] = 1.0;
        let energies = BandEnergies {
            low: series.clone(),
            mid: series.clone(),
            high: series,
        };
        let events = detect_band_events(&energies, 44100, 0.0);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].band, Band::Low);
    }
}
