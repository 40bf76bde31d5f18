//! Partition the plan timeline into one clip per image.
//!
//! Each boundary is placed greedily: the image's dynamism gives a duration
//! range, the range is narrowed so the remaining images can still fit, and
//! the best switch candidate inside it wins. With no candidate the clip
//! falls back to its ideal length.

use crate::audio::features::AudioAnalysis;
use crate::error::PlanError;

use super::candidates::{best_in_range, SwitchCandidate};
use super::types::ImageAttributes;

/// Shortest clip allowed anywhere, including high-energy zones.
pub const MIN_CLIP_SECS: f64 = 0.1;
/// A non-final clip never ends closer than this to the end of the timeline.
const END_MARGIN: f64 = 1e-3;
/// Allowed slack on the per-image maximum when snapping to a candidate, and
/// how far from the even pace a candidate may sit when pacing takes over.
const OVERSHOOT_TOLERANCE: f64 = 0.05;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DurationRange {
    pub min: f64,
    pub max: f64,
    pub ideal: f64,
}

/// Target clip lengths for a dynamism of 1-10.
///
/// Two linear segments: calm images (1-6) hold between 0.3-0.2s and 5-4s,
/// energetic ones (7-10) between 0.2-0.1s and 3-2s. The ideal length falls
/// from 4s to 0.5s across the whole scale.
pub fn duration_range(dynamism: f64) -> DurationRange {
    let d = if dynamism.is_finite() {
        dynamism.clamp(1.0, 10.0)
    } else {
        super::types::DEFAULT_DYNAMISM
    };
    let (min, max) = if d < 7.0 {
        let t = (d - 1.0) / 5.0;
        (0.3 - t * 0.1, 5.0 - t * 1.0)
    } else {
        let t = (d - 7.0) / 3.0;
        (0.2 - t * 0.1, 3.0 - t * 1.0)
    };
    let ideal = 4.0 - (d - 1.0) / 9.0 * 3.5;
    DurationRange { min, max, ideal }
}

/// Stretches of the plan timeline where clips may be shorter than usual:
/// rapid beat runs and high-energy sections.
#[derive(Clone, Debug, Default)]
pub struct EnergyZones {
    rapid: Vec<(f64, f64)>,
    intense: Vec<(f64, f64)>,
}

impl EnergyZones {
    pub fn from_analysis(analysis: &AudioAnalysis) -> Self {
        let offset = analysis.start_time;
        Self {
            rapid: analysis
                .rapid_sequences
                .iter()
                .map(|s| (s.start - offset, s.end - offset))
                .collect(),
            intense: analysis
                .sections
                .iter()
                .filter(|s| s.is_high_energy())
                .map(|s| (s.start - offset, s.end - offset))
                .collect(),
        }
    }

    pub fn in_rapid(&self, t: f64) -> bool {
        self.rapid.iter().any(|&(start, end)| t >= start && t < end)
    }

    pub fn is_high_energy(&self, t: f64) -> bool {
        self.in_rapid(t) || self.intense.iter().any(|&(start, end)| t >= start && t < end)
    }
}

/// One placed clip before effects are assigned.
#[derive(Clone, Debug, PartialEq)]
pub struct ScheduledClip {
    pub image_index: usize,
    pub start: f64,
    pub end: f64,
    /// Candidate that produced this clip's start boundary
    pub entry: Option<SwitchCandidate>,
}

impl ScheduledClip {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Place `images.len()` contiguous clips covering `[0, total]`.
///
/// `candidates` must be sorted by time, as returned by
/// [`collect_candidates`](super::candidates::collect_candidates).
pub fn schedule(
    images: &[ImageAttributes],
    candidates: &[SwitchCandidate],
    zones: &EnergyZones,
    total: f64,
) -> Result<Vec<ScheduledClip>, PlanError> {
    if images.is_empty() {
        return Err(PlanError::NoImages);
    }
    if !(total.is_finite() && total > 0.0) {
        return Err(PlanError::InvalidDuration(total));
    }

    let n = images.len();
    let ranges: Vec<DurationRange> = images.iter().map(|img| duration_range(img.dynamism())).collect();
    let mut clips = Vec::with_capacity(n);
    let mut cursor = 0.0;
    let mut entry: Option<SwitchCandidate> = None;

    for i in 0..n {
        let images_left = n - i;
        let remaining = total - cursor;

        if images_left == 1 {
            clips.push(ScheduledClip {
                image_index: i,
                start: cursor,
                end: total,
                entry: entry.take(),
            });
            break;
        }

        if remaining < images_left as f64 * MIN_CLIP_SECS {
            log::debug!(
                "Only {:.3}s left for {} images; splitting evenly",
                remaining,
                images_left
            );
            split_evenly(&mut clips, i..n, cursor, total, entry.take());
            break;
        }

        let range = ranges[i];
        let min = if zones.is_high_energy(cursor) {
            MIN_CLIP_SECS
        } else {
            range.min
        };
        let rest = &ranges[i + 1..];
        let rest_min: f64 = rest.iter().map(|r| r.min).sum();
        let rest_max: f64 = rest.iter().map(|r| r.max).sum();

        let lower = (cursor + min).max(total - rest_max);
        let upper = (cursor + range.max).min(total - rest_min).min(total - END_MARGIN);

        let (end, chosen) = if lower <= upper {
            match best_in_range(candidates, lower, upper) {
                Some(c) => (snap(c.time, cursor, range.max), Some(c.clone())),
                None => ((cursor + range.ideal).clamp(lower, upper), None),
            }
        } else {
            // No length satisfies both this image and the ones after it:
            // pace evenly, taking a candidate only if it sits on the pace
            let even = cursor + remaining / images_left as f64;
            let latest = total - (images_left - 1) as f64 * MIN_CLIP_SECS;
            let chosen = best_in_range(
                candidates,
                even - OVERSHOOT_TOLERANCE,
                even + OVERSHOOT_TOLERANCE,
            )
            .cloned();
            let end = chosen.as_ref().map_or(even, |c| c.time);
            (end.min(latest).max(cursor + MIN_CLIP_SECS), chosen)
        };

        log::debug!(
            "Clip {}: {:.3}s-{:.3}s (window {:.3}-{:.3}, {})",
            i,
            cursor,
            end,
            lower,
            upper,
            chosen.as_ref().map_or("ideal length", |c| c.reason.as_str())
        );

        clips.push(ScheduledClip {
            image_index: i,
            start: cursor,
            end,
            entry: entry.take(),
        });
        cursor = end;
        entry = chosen;
    }

    verify_partition(&clips, n, total)?;
    Ok(clips)
}

/// Keep a candidate boundary within the clip's hard limits.
fn snap(time: f64, start: f64, max: f64) -> f64 {
    if time - start < MIN_CLIP_SECS {
        start + MIN_CLIP_SECS
    } else if time - start > max + OVERSHOOT_TOLERANCE {
        start + max
    } else {
        time
    }
}

fn split_evenly(
    clips: &mut Vec<ScheduledClip>,
    indices: std::ops::Range<usize>,
    from: f64,
    total: f64,
    mut entry: Option<SwitchCandidate>,
) {
    let count = indices.len();
    let share = (total - from) / count as f64;
    for (k, image_index) in indices.enumerate() {
        let start = from + k as f64 * share;
        let end = if k + 1 == count {
            total
        } else {
            from + (k + 1) as f64 * share
        };
        clips.push(ScheduledClip {
            image_index,
            start,
            end,
            entry: entry.take(),
        });
    }
}

fn verify_partition(clips: &[ScheduledClip], n: usize, total: f64) -> Result<(), PlanError> {
    let broken = |index: usize, reason: &str| PlanError::BrokenPartition {
        index,
        reason: reason.to_string(),
    };

    if clips.len() != n {
        return Err(broken(clips.len(), "clip count does not match image count"));
    }
    let mut expected_start = 0.0;
    for (i, clip) in clips.iter().enumerate() {
        if clip.image_index != i {
            return Err(broken(i, "image index out of order"));
        }
        if clip.start != expected_start {
            return Err(broken(i, "gap or overlap with previous clip"));
        }
        if !(clip.end > clip.start) {
            return Err(broken(i, "non-positive duration"));
        }
        expected_start = clip.end;
    }
    if expected_start != total {
        return Err(broken(n - 1, "last clip does not end at the timeline end"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::features::{AudioSection, SectionKind};
    use crate::plan::candidates::CandidateSource;

    const EPS: f64 = 1e-9;

    fn images(dynamism: &[f64]) -> Vec<ImageAttributes> {
        dynamism.iter().map(|&d| ImageAttributes::with_dynamism(d)).collect()
    }

    fn candidate(time: f64, priority: f64) -> SwitchCandidate {
        SwitchCandidate {
            time,
            priority,
            source: CandidateSource::External,
            reason: "test".into(),
            is_rapid: false,
            transition: None,
        }
    }

    fn assert_partition(clips: &[ScheduledClip], n: usize, total: f64) {
        assert_eq!(clips.len(), n);
        assert_eq!(clips[0].start, 0.0);
        assert_eq!(clips[n - 1].end, total);
        for pair in clips.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
        assert!(clips.iter().all(|c| c.duration() > 0.0));
    }

    #[test]
    fn range_endpoints() {
        let calm = duration_range(1.0);
        assert!((calm.min - 0.3).abs() < EPS && (calm.max - 5.0).abs() < EPS);
        assert!((calm.ideal - 4.0).abs() < EPS);

        let wild = duration_range(10.0);
        assert!((wild.min - 0.1).abs() < EPS && (wild.max - 2.0).abs() < EPS);
        assert!((wild.ideal - 0.5).abs() < EPS);

        let seven = duration_range(7.0);
        assert!((seven.min - 0.2).abs() < EPS && (seven.max - 3.0).abs() < EPS);
    }

    #[test]
    fn ranges_shrink_with_dynamism() {
        let mut prev = duration_range(1.0);
        for step in 1..=90 {
            let r = duration_range(1.0 + step as f64 * 0.1);
            assert!(r.min <= prev.min + EPS);
            assert!(r.max <= prev.max + EPS);
            assert!(r.ideal <= prev.ideal + EPS);
            assert!(r.min <= r.ideal && r.ideal <= r.max);
            prev = r;
        }
    }

    #[test]
    fn no_images_is_an_error() {
        let err = schedule(&[], &[], &EnergyZones::default(), 10.0).unwrap_err();
        assert_eq!(err, PlanError::NoImages);
    }

    #[test]
    fn bad_total_is_an_error() {
        let imgs = images(&[5.0]);
        assert!(matches!(
            schedule(&imgs, &[], &EnergyZones::default(), 0.0),
            Err(PlanError::InvalidDuration(_))
        ));
    }

    #[test]
    fn single_image_spans_everything() {
        let clips = schedule(&images(&[3.0]), &[], &EnergyZones::default(), 42.0).unwrap();
        assert_partition(&clips, 1, 42.0);
    }

    #[test]
    fn ten_images_without_candidates_stay_in_range() {
        let imgs = images(&[5.0; 10]);
        let clips = schedule(&imgs, &[], &EnergyZones::default(), 30.0).unwrap();
        assert_partition(&clips, 10, 30.0);
        let range = duration_range(5.0);
        for clip in &clips {
            assert!(clip.duration() >= range.min - EPS, "{:?}", clip);
            assert!(clip.duration() <= range.max + EPS, "{:?}", clip);
        }
    }

    #[test]
    fn evenly_spaced_candidates_are_used_exactly() {
        let imgs = images(&[5.0; 4]);
        let candidates: Vec<_> = [5.0, 10.0, 15.0].iter().map(|&t| candidate(t, 105.0)).collect();
        let clips = schedule(&imgs, &candidates, &EnergyZones::default(), 20.0).unwrap();
        let ends: Vec<f64> = clips.iter().map(|c| c.end).collect();
        assert_eq!(ends, vec![5.0, 10.0, 15.0, 20.0]);
        assert!(clips[0].entry.is_none());
        assert_eq!(clips[1].entry.as_ref().map(|c| c.time), Some(5.0));
    }

    #[test]
    fn higher_priority_wins_inside_window() {
        let imgs = images(&[5.0; 2]);
        let candidates = vec![candidate(2.0, 30.0), candidate(3.5, 90.0)];
        let clips = schedule(&imgs, &candidates, &EnergyZones::default(), 6.0).unwrap();
        assert_eq!(clips[0].end, 3.5);
    }

    #[test]
    fn starved_timeline_splits_evenly() {
        let imgs = images(&[5.0; 5]);
        let clips = schedule(&imgs, &[], &EnergyZones::default(), 0.3).unwrap();
        assert_partition(&clips, 5, 0.3);
        for clip in &clips {
            assert!((clip.duration() - 0.06).abs() < 1e-9);
        }
    }

    #[test]
    fn crowded_timeline_paces_evenly() {
        // 4 calm images want at least 0.3s each but not 5s; 1s is tight
        let imgs = images(&[1.0; 4]);
        let clips = schedule(&imgs, &[], &EnergyZones::default(), 1.0).unwrap();
        assert_partition(&clips, 4, 1.0);
        assert!(clips.iter().all(|c| c.duration() >= MIN_CLIP_SECS - EPS));
    }

    #[test]
    fn overlong_timeline_paces_evenly() {
        let imgs = images(&[10.0; 3]);
        let clips = schedule(&imgs, &[], &EnergyZones::default(), 60.0).unwrap();
        assert_partition(&clips, 3, 60.0);
        for clip in &clips {
            assert!((clip.duration() - 20.0).abs() < EPS);
        }
    }

    #[test]
    fn zones_use_plan_relative_time() {
        let mut analysis = AudioAnalysis::empty(10.0, 20.0, 44100);
        analysis.sections = vec![AudioSection {
            start: 12.0,
            end: 15.0,
            kind: SectionKind::Chorus,
            energy: 5.0,
        }];
        let zones = EnergyZones::from_analysis(&analysis);
        assert!(zones.is_high_energy(2.0));
        assert!(!zones.is_high_energy(5.0));
        assert!(!zones.in_rapid(2.0));
    }
}
