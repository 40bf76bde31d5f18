pub mod candidates;
pub mod effects;
pub mod external;
pub mod schedule;
pub mod types;

use crate::audio::features::AudioAnalysis;
use crate::error::PlanError;

use external::ExternalCandidate;
use schedule::EnergyZones;
use types::{EditingClip, EditingPlan, ImageAttributes};

pub const DEFAULT_TITLE: &str = "Untitled Slideshow";

#[derive(Clone, Debug)]
pub struct PlanOptions {
    /// Overrides the mood derived from audio energy
    pub overall_mood: Option<String>,
    pub title: String,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            overall_mood: None,
            title: DEFAULT_TITLE.to_string(),
        }
    }
}

/// Mood label for a track with no explicit mood.
pub fn default_mood(energy: f64) -> &'static str {
    if energy > 6.0 {
        "upbeat"
    } else {
        "calm"
    }
}

/// Turn audio features and per-image attributes into a clip schedule.
///
/// Deterministic: the same inputs always produce the same plan.
pub fn build_plan(
    analysis: &AudioAnalysis,
    images: &[ImageAttributes],
    external: &[ExternalCandidate],
    options: &PlanOptions,
) -> Result<EditingPlan, PlanError> {
    if images.is_empty() {
        return Err(PlanError::NoImages);
    }

    let candidates = candidates::collect_candidates(analysis, external, images.len());
    log::info!(
        "Scheduling {} images over {:.2}s with {} switch candidates",
        images.len(),
        analysis.duration,
        candidates.len()
    );

    let zones = EnergyZones::from_analysis(analysis);
    let scheduled = schedule::schedule(images, &candidates, &zones, analysis.duration)?;

    let overall_mood = options
        .overall_mood
        .clone()
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| default_mood(analysis.energy).to_string());

    let clips: Vec<EditingClip> = scheduled
        .iter()
        .map(|clip| {
            let image = &images[clip.image_index];
            let mood = image.mood.as_deref().unwrap_or(&overall_mood);
            let rapid = effects::is_rapid(clip, &zones);
            EditingClip {
                image_index: clip.image_index,
                start_time: clip.start,
                end_time: clip.end,
                transition: effects::assign_transition(clip, rapid, mood),
                motion: effects::assign_motion(clip.image_index, image, rapid),
            }
        })
        .collect();

    let rapid_count = clips
        .iter()
        .filter(|c| c.motion.kind == types::MotionKind::Static && c.motion.intensity == 0.0)
        .count();
    log::info!(
        "Plan ready: {} clips ({} fast cuts), mood '{}'",
        clips.len(),
        rapid_count,
        overall_mood
    );

    Ok(EditingPlan {
        clips,
        overall_mood,
        suggested_title: options.title.clone(),
    })
}
