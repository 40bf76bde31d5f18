use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_DYNAMISM: f64 = 5.0;

/// Per-image input, usually produced by an image-analysis step. Unknown
/// fields are ignored so full analysis records can be passed through.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageAttributes {
    #[serde(default)]
    pub dynamism: Option<f64>,
    #[serde(default)]
    pub motion_suggestion: Option<String>,
    #[serde(default)]
    pub mood: Option<String>,
    /// Source file, needed only for video export
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl ImageAttributes {
    #[cfg(test)]
    pub fn with_dynamism(dynamism: f64) -> Self {
        Self {
            dynamism: Some(dynamism),
            ..Default::default()
        }
    }

    /// Dynamism clamped to 1-10; missing or non-finite values count as 5.
    pub fn dynamism(&self) -> f64 {
        match self.dynamism {
            Some(d) if d.is_finite() => d.clamp(1.0, 10.0),
            _ => DEFAULT_DYNAMISM,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransitionKind {
    Cut,
    Fade,
    Dissolve,
    SlideLeft,
    SlideRight,
    Zoom,
    Wipe,
}

impl TransitionKind {
    /// Default on-screen duration in seconds.
    pub fn default_duration(self) -> f64 {
        match self {
            TransitionKind::Cut => 0.0,
            TransitionKind::Fade => 0.5,
            TransitionKind::Dissolve => 0.3,
            TransitionKind::SlideLeft
            | TransitionKind::SlideRight
            | TransitionKind::Zoom
            | TransitionKind::Wipe => 0.2,
        }
    }
}

impl FromStr for TransitionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cut" => Ok(TransitionKind::Cut),
            "fade" => Ok(TransitionKind::Fade),
            "dissolve" => Ok(TransitionKind::Dissolve),
            "slide-left" => Ok(TransitionKind::SlideLeft),
            "slide-right" => Ok(TransitionKind::SlideRight),
            "zoom" => Ok(TransitionKind::Zoom),
            "wipe" => Ok(TransitionKind::Wipe),
            other => Err(format!("unknown transition '{}'", other)),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MotionKind {
    Static,
    ZoomIn,
    ZoomOut,
    PanLeft,
    PanRight,
    PanUp,
    PanDown,
}

impl FromStr for MotionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "static" => Ok(MotionKind::Static),
            "zoom-in" => Ok(MotionKind::ZoomIn),
            "zoom-out" => Ok(MotionKind::ZoomOut),
            "pan-left" => Ok(MotionKind::PanLeft),
            "pan-right" => Ok(MotionKind::PanRight),
            "pan-up" => Ok(MotionKind::PanUp),
            "pan-down" => Ok(MotionKind::PanDown),
            other => Err(format!("unknown motion '{}'", other)),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Transition {
    #[serde(rename = "type")]
    pub kind: TransitionKind,
    /// Seconds
    pub duration: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Motion {
    #[serde(rename = "type")]
    pub kind: MotionKind,
    /// Fraction of the frame, 0-1
    pub intensity: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditingClip {
    pub image_index: usize,
    pub start_time: f64,
    pub end_time: f64,
    pub transition: Transition,
    pub motion: Motion,
}

impl EditingClip {
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }
}

/// The schedule handed to the renderer.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditingPlan {
    pub clips: Vec<EditingClip>,
    pub overall_mood: String,
    pub suggested_title: String,
}
