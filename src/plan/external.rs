//! Switch-point suggestions from an outside source (typically a language
//! model asked to interpret the audio features).
//!
//! The input is untrusted: anything that does not match the schema is
//! dropped and planning continues with heuristics only.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use super::types::TransitionKind;

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalCandidate {
    /// Seconds from the start of the plan timeline
    pub time: f64,
    #[serde(default)]
    pub reason: String,
    #[serde(default = "default_intensity")]
    pub intensity: f64,
    #[serde(default)]
    pub suggested_transition: Option<String>,
    #[serde(default)]
    pub is_rapid: bool,
}

fn default_intensity() -> f64 {
    5.0
}

impl ExternalCandidate {
    #[cfg(test)]
    pub fn at(time: f64) -> Self {
        Self {
            time,
            reason: String::new(),
            intensity: default_intensity(),
            suggested_transition: None,
            is_rapid: false,
        }
    }

    /// Intensity clamped to 1-10.
    pub fn intensity(&self) -> f64 {
        if self.intensity.is_finite() {
            self.intensity.clamp(1.0, 10.0)
        } else {
            default_intensity()
        }
    }

    pub fn transition(&self) -> Option<TransitionKind> {
        self.suggested_transition.as_deref()?.parse().ok()
    }

    /// Usable as a boundary inside a plan of `duration` seconds.
    pub fn is_usable(&self, duration: f64) -> bool {
        self.time.is_finite() && self.time > 0.0 && self.time < duration
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SuggestionDocument {
    #[serde(default)]
    switch_points: Vec<ExternalCandidate>,
}

/// Parse suggestions from a JSON array, an object with `switchPoints`, or
/// free text wrapping either. Malformed input yields no candidates.
pub fn parse_suggestions(text: &str) -> Vec<ExternalCandidate> {
    if let Some(candidates) = parse_json(text.trim()) {
        return candidates;
    }
    if let Some(candidates) = embedded_json(text).and_then(parse_json) {
        return candidates;
    }
    log::warn!("Ignoring external suggestions: no usable JSON found");
    Vec::new()
}

fn parse_json(text: &str) -> Option<Vec<ExternalCandidate>> {
    if text.starts_with('[') {
        return serde_json::from_str(text).ok();
    }
    if text.starts_with('{') {
        return serde_json::from_str::<SuggestionDocument>(text)
            .ok()
            .map(|doc| doc.switch_points);
    }
    None
}

/// Outermost `{...}` (preferred) or `[...]` span in `text`.
fn embedded_json(text: &str) -> Option<&str> {
    for (open, close) in [('{', '}'), ('[', ']')] {
        if let (Some(first), Some(last)) = (text.find(open), text.rfind(close)) {
            if first < last {
                return Some(&text[first..=last]);
            }
        }
    }
    None
}

/// Read suggestions from a local file or an http(s) URL.
pub fn load_suggestions(source: &str) -> Result<Vec<ExternalCandidate>> {
    let text = if source.starts_with("http://") || source.starts_with("https://") {
        log::info!("Fetching switch-point suggestions from {}", source);
        reqwest::blocking::get(source)
            .and_then(|resp| resp.error_for_status())
            .and_then(|resp| resp.text())
            .with_context(|| format!("Failed to fetch suggestions: {}", source))?
    } else {
        std::fs::read_to_string(Path::new(source))
            .with_context(|| format!("Failed to read suggestions: {}", source))?
    };

    let candidates = parse_suggestions(&text);
    log::info!("Loaded {} external switch point(s)", candidates.len());
    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_array() {
        let parsed = parse_suggestions(
            r#"[{"time": 2.5, "reason": "drop", "intensity": 9, "suggestedTransition": "zoom"}]"#,
        );
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].time, 2.5);
        assert_eq!(parsed[0].transition(), Some(TransitionKind::Zoom));
        assert!(!parsed[0].is_rapid);
    }

    #[test]
    fn parses_switch_points_inside_model_chatter() {
        let text = r#"Sure! Here is the analysis:
{"genre": "pop", "switchPoints": [{"time": 1.0}, {"time": 3.0, "isRapid": true}]}
Let me know if you need more."#;
        let parsed = parse_suggestions(text);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].intensity(), 5.0);
        assert!(parsed[1].is_rapid);
    }

    #[test]
    fn malformed_input_means_no_candidates() {
        assert!(parse_suggestions("not json at all").is_empty());
        assert!(parse_suggestions(r#"{"switchPoints": [{"reason": "no time"}]}"#).is_empty());
        assert!(parse_suggestions("").is_empty());
    }

    #[test]
    fn intensity_is_clamped() {
        let mut c = ExternalCandidate::at(1.0);
        c.intensity = 99.0;
        assert_eq!(c.intensity(), 10.0);
        c.intensity = f64::NAN;
        assert_eq!(c.intensity(), 5.0);
    }

    #[test]
    fn unknown_transition_is_ignored() {
        let mut c = ExternalCandidate::at(1.0);
        c.suggested_transition = Some("spiral".into());
        assert_eq!(c.transition(), None);
    }

    #[test]
    fn usable_range_is_open() {
        assert!(!ExternalCandidate::at(0.0).is_usable(10.0));
        assert!(!ExternalCandidate::at(10.0).is_usable(10.0));
        assert!(!ExternalCandidate::at(f64::INFINITY).is_usable(10.0));
        assert!(ExternalCandidate::at(5.0).is_usable(10.0));
    }
}
