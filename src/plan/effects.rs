use super::schedule::{EnergyZones, ScheduledClip};
use super::types::{ImageAttributes, Motion, MotionKind, Transition, TransitionKind};

/// Clips shorter than this are treated as part of a fast-cut run.
const RAPID_CLIP_SECS: f64 = 0.5;
const MIN_MOTION: f64 = 0.05;
const MOTION_SPAN: f64 = 0.10;

const AMBIENT_MOTIONS: [MotionKind; 4] = [
    MotionKind::ZoomIn,
    MotionKind::ZoomOut,
    MotionKind::PanLeft,
    MotionKind::PanRight,
];

/// Whether the clip belongs to a fast-cut run and gets a hard cut with no
/// motion.
pub fn is_rapid(clip: &ScheduledClip, zones: &EnergyZones) -> bool {
    zones.in_rapid(clip.start)
        || clip.entry.as_ref().is_some_and(|c| c.is_rapid)
        || clip.duration() < RAPID_CLIP_SECS
}

/// Transition into `clip`.
pub fn assign_transition(clip: &ScheduledClip, rapid: bool, mood: &str) -> Transition {
    if rapid {
        return Transition {
            kind: TransitionKind::Cut,
            duration: 0.0,
        };
    }

    let kind = clip
        .entry
        .as_ref()
        .and_then(|c| c.transition)
        .filter(|&kind| kind != TransitionKind::Cut)
        .unwrap_or_else(|| mood_transition(mood));

    Transition {
        kind,
        duration: kind.default_duration().min(clip.duration() / 2.0),
    }
}

fn mood_transition(mood: &str) -> TransitionKind {
    match mood.trim().to_ascii_lowercase().as_str() {
        "calm" | "melancholic" | "romantic" | "peaceful" => TransitionKind::Fade,
        "energetic" | "upbeat" | "intense" => TransitionKind::Cut,
        _ => TransitionKind::Dissolve,
    }
}

/// Ken Burns style motion for one clip.
pub fn assign_motion(clip_index: usize, image: &ImageAttributes, rapid: bool) -> Motion {
    if rapid {
        return Motion {
            kind: MotionKind::Static,
            intensity: 0.0,
        };
    }

    let suggested = image
        .motion_suggestion
        .as_deref()
        .and_then(|s| s.parse::<MotionKind>().ok())
        .filter(|&kind| kind != MotionKind::Static);
    let kind = suggested.unwrap_or_else(|| {
        AMBIENT_MOTIONS[(mix(clip_index as u64) % AMBIENT_MOTIONS.len() as u64) as usize]
    });

    Motion {
        kind,
        intensity: motion_intensity(image.dynamism()),
    }
}

/// 0.05 for the calmest image up to 0.15 for the most dynamic.
pub fn motion_intensity(dynamism: f64) -> f64 {
    let d = if dynamism.is_finite() {
        dynamism.clamp(1.0, 10.0)
    } else {
        super::types::DEFAULT_DYNAMISM
    };
    MIN_MOTION + MOTION_SPAN * (d - 1.0) / 9.0
}

/// splitmix64 finalizer
fn mix(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9e37_79b9_7f4a_7c15);
    x = (x ^ (x >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    x ^ (x >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::features::{AudioAnalysis, RapidBeatSequence};
    use crate::plan::candidates::{CandidateSource, SwitchCandidate};

    fn clip(start: f64, end: f64) -> ScheduledClip {
        ScheduledClip {
            image_index: 0,
            start,
            end,
            entry: None,
        }
    }

    fn entry(transition: Option<TransitionKind>, is_rapid: bool) -> SwitchCandidate {
        SwitchCandidate {
            time: 0.0,
            priority: 100.0,
            source: CandidateSource::External,
            reason: String::new(),
            is_rapid,
            transition,
        }
    }

    #[test]
    fn short_clips_are_rapid() {
        let zones = EnergyZones::default();
        assert!(is_rapid(&clip(1.0, 1.4), &zones));
        assert!(!is_rapid(&clip(1.0, 3.0), &zones));

        let mut flagged = clip(1.0, 3.0);
        flagged.entry = Some(entry(None, true));
        assert!(is_rapid(&flagged, &zones));
    }

    #[test]
    fn clips_starting_in_rapid_run_are_rapid() {
        let mut analysis = AudioAnalysis::empty(0.0, 10.0, 44100);
        analysis.rapid_sequences = vec![RapidBeatSequence {
            start: 2.0,
            end: 3.0,
            interval: 0.25,
            count: 5,
        }];
        let zones = EnergyZones::from_analysis(&analysis);
        assert!(is_rapid(&clip(2.5, 5.0), &zones));
        assert!(!is_rapid(&clip(3.0, 5.0), &zones));
    }

    #[test]
    fn rapid_clip_is_cut_without_motion() {
        let c = clip(0.0, 0.3);
        let t = assign_transition(&c, true, "calm");
        assert_eq!(t.kind, TransitionKind::Cut);
        assert_eq!(t.duration, 0.0);
        let m = assign_motion(0, &ImageAttributes::with_dynamism(9.0), true);
        assert_eq!(m.kind, MotionKind::Static);
        assert_eq!(m.intensity, 0.0);
    }

    #[test]
    fn mood_picks_default_transition() {
        let c = clip(0.0, 4.0);
        assert_eq!(assign_transition(&c, false, "Calm").kind, TransitionKind::Fade);
        assert_eq!(assign_transition(&c, false, "calm").duration, 0.5);
        assert_eq!(assign_transition(&c, false, "upbeat").kind, TransitionKind::Cut);
        let other = assign_transition(&c, false, "mysterious");
        assert_eq!(other.kind, TransitionKind::Dissolve);
        assert_eq!(other.duration, 0.3);
    }

    #[test]
    fn suggested_transition_wins_unless_cut() {
        let mut c = clip(0.0, 4.0);
        c.entry = Some(entry(Some(TransitionKind::Wipe), false));
        let t = assign_transition(&c, false, "calm");
        assert_eq!(t.kind, TransitionKind::Wipe);
        assert_eq!(t.duration, 0.2);

        c.entry = Some(entry(Some(TransitionKind::Cut), false));
        assert_eq!(assign_transition(&c, false, "calm").kind, TransitionKind::Fade);
    }

    #[test]
    fn transition_fits_in_half_the_clip() {
        let c = clip(0.0, 0.6);
        let t = assign_transition(&c, false, "calm");
        assert_eq!(t.kind, TransitionKind::Fade);
        assert!((t.duration - 0.3).abs() < 1e-12);
    }

    #[test]
    fn motion_honors_suggestion() {
        let mut image = ImageAttributes::with_dynamism(1.0);
        image.motion_suggestion = Some("pan-up".into());
        let m = assign_motion(3, &image, false);
        assert_eq!(m.kind, MotionKind::PanUp);
        assert!((m.intensity - 0.05).abs() < 1e-12);
    }

    #[test]
    fn static_suggestion_is_replaced_deterministically() {
        let mut image = ImageAttributes::with_dynamism(10.0);
        image.motion_suggestion = Some("static".into());
        for index in 0..16 {
            let a = assign_motion(index, &image, false);
            let b = assign_motion(index, &image, false);
            assert_eq!(a, b);
            assert!(AMBIENT_MOTIONS.contains(&a.kind));
            assert!((a.intensity - 0.15).abs() < 1e-12);
        }
    }

    #[test]
    fn motion_varies_across_clips() {
        let image = ImageAttributes::default();
        let kinds: std::collections::HashSet<_> =
            (0..32).map(|i| assign_motion(i, &image, false).kind).collect();
        assert!(kinds.len() > 1);
    }

    #[test]
    fn intensity_stays_in_bounds() {
        for d in [-5.0, 1.0, 3.3, 5.0, 7.7, 10.0, 99.0, f64::NAN] {
            let i = motion_intensity(d);
            assert!((0.05..=0.15).contains(&i), "{} -> {}", d, i);
        }
    }
}
