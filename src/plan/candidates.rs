use crate::audio::features::{AudioAnalysis, HighlightKind, SectionKind};

use super::external::ExternalCandidate;
use super::types::TransitionKind;

const EXTERNAL_BASE: f64 = 100.0;
const SECTION_BASE: f64 = 50.0;
const HIGHLIGHT_BASE: f64 = 40.0;
const STRONG_BEAT: f64 = 30.0;
const WEAK_BEAT: f64 = 10.0;
/// Fast-cut opportunity: above plain beats and accents, below structural events
const RAPID_BEAT: f64 = 75.0;
const SYNTHESIZED: f64 = 35.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CandidateSource {
    External,
    Section,
    Highlight,
    Beat,
    Synthesized,
}

/// A proposed clip boundary on the plan timeline (0 = window start).
#[derive(Clone, Debug, PartialEq)]
pub struct SwitchCandidate {
    pub time: f64,
    pub priority: f64,
    pub source: CandidateSource,
    pub reason: String,
    pub is_rapid: bool,
    pub transition: Option<TransitionKind>,
}

impl SwitchCandidate {
    fn new(time: f64, priority: f64, source: CandidateSource, reason: impl Into<String>) -> Self {
        Self {
            time,
            priority,
            source,
            reason: reason.into(),
            is_rapid: false,
            transition: None,
        }
    }
}

/// Merge every boundary source into one time-sorted list.
///
/// Equal times keep insertion order (external, section, highlight, beat,
/// synthesized), which is what breaks priority ties downstream.
pub fn collect_candidates(
    analysis: &AudioAnalysis,
    external: &[ExternalCandidate],
    image_count: usize,
) -> Vec<SwitchCandidate> {
    let duration = analysis.duration;
    let offset = analysis.start_time;
    let in_rapid = |abs_time: f64| analysis.rapid_sequences.iter().any(|s| s.contains(abs_time));

    let mut candidates = Vec::new();

    let usable: Vec<&ExternalCandidate> = external.iter().filter(|c| c.is_usable(duration)).collect();
    for ext in &usable {
        let mut c = SwitchCandidate::new(
            ext.time,
            EXTERNAL_BASE + ext.intensity(),
            CandidateSource::External,
            ext.reason.clone(),
        );
        c.is_rapid = ext.is_rapid;
        c.transition = ext.transition();
        candidates.push(c);
    }

    for section in &analysis.sections {
        let bonus = match section.kind {
            SectionKind::Chorus => 20.0,
            SectionKind::Bridge => 10.0,
            _ => 0.0,
        };
        candidates.push(SwitchCandidate::new(
            section.start - offset,
            SECTION_BASE + bonus + section.energy,
            CandidateSource::Section,
            format!("{:?} section", section.kind).to_lowercase(),
        ));
    }

    for highlight in &analysis.highlights {
        let bonus = match highlight.kind {
            HighlightKind::Drop | HighlightKind::Climax => 45.0,
            HighlightKind::Buildup => 25.0,
            _ => 0.0,
        };
        let mut c = SwitchCandidate::new(
            highlight.time - offset,
            HIGHLIGHT_BASE + bonus + highlight.intensity,
            CandidateSource::Highlight,
            format!("{:?}", highlight.kind).to_lowercase(),
        );
        if highlight.kind.is_accent() && in_rapid(highlight.time) {
            c.priority = c.priority.max(RAPID_BEAT);
            c.is_rapid = true;
        }
        candidates.push(c);
    }

    for beat in &analysis.beats {
        let mut c = if beat.is_strong() {
            SwitchCandidate::new(beat.time - offset, STRONG_BEAT, CandidateSource::Beat, "strong beat")
        } else {
            SwitchCandidate::new(beat.time - offset, WEAK_BEAT, CandidateSource::Beat, "beat")
        };
        if beat.is_strong() && in_rapid(beat.time) {
            c.priority = RAPID_BEAT;
            c.is_rapid = true;
        }
        candidates.push(c);
    }

    let wanted = image_count.saturating_sub(1);
    if usable.len() < wanted {
        candidates.extend(synthesize(analysis, &usable, image_count, wanted - usable.len()));
    }

    candidates.retain(|c| c.time.is_finite() && c.time > 0.0 && c.time <= duration);
    candidates.sort_by(|a, b| a.time.total_cmp(&b.time));
    candidates
}

/// Fill an even grid of `image_count` slots where the external source left
/// gaps, snapping each grid point to the nearest unused strong beat.
fn synthesize(
    analysis: &AudioAnalysis,
    external: &[&ExternalCandidate],
    image_count: usize,
    needed: usize,
) -> Vec<SwitchCandidate> {
    let duration = analysis.duration;
    let step = duration / image_count as f64;
    let mut strong: Vec<(f64, bool)> = analysis
        .beats
        .iter()
        .filter(|b| b.is_strong())
        .map(|b| (b.time - analysis.start_time, false))
        .collect();

    let mut out = Vec::with_capacity(needed);
    for k in 1..image_count {
        if out.len() >= needed {
            break;
        }
        let target = k as f64 * step;
        if external.iter().any(|e| (e.time - target).abs() < step / 2.0) {
            continue;
        }

        let nearest = strong
            .iter_mut()
            .filter(|(t, used)| !*used && (t - target).abs() < step / 2.0)
            .fold(None::<&mut (f64, bool)>, |best, cand| match best {
                Some(b) if (b.0 - target).abs() <= (cand.0 - target).abs() => Some(b),
                _ => Some(cand),
            });

        let time = match nearest {
            Some(beat) => {
                beat.1 = true;
                beat.0
            }
            None => target,
        };
        out.push(SwitchCandidate::new(time, SYNTHESIZED, CandidateSource::Synthesized, "even spacing"));
    }
    out
}

/// Highest priority candidate with `min <= time <= max`; the earliest one
/// wins a tie. `candidates` must be sorted by time.
pub fn best_in_range(candidates: &[SwitchCandidate], min: f64, max: f64) -> Option<&SwitchCandidate> {
    let first = candidates.partition_point(|c| c.time < min);
    candidates[first..]
        .iter()
        .take_while(|c| c.time <= max)
        .fold(None, |best: Option<&SwitchCandidate>, c| match best {
            Some(b) if b.priority >= c.priority => Some(b),
            _ => Some(c),
        })
}
