use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BeatStrength {
    Strong,
    Weak,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Beat {
    pub time: f64,
    pub strength: BeatStrength,
}

impl Beat {
    pub fn is_strong(&self) -> bool {
        self.strength == BeatStrength::Strong
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionKind {
    Intro,
    Verse,
    Chorus,
    Bridge,
    Outro,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AudioSection {
    pub start: f64,
    pub end: f64,
    #[serde(rename = "type")]
    pub kind: SectionKind,
    /// RMS energy on the 0-10 scale
    pub energy: f64,
}

impl AudioSection {
    /// Chorus or loud enough to warrant rapid cutting.
    pub fn is_high_energy(&self) -> bool {
        self.kind == SectionKind::Chorus || self.energy >= 7.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HighlightKind {
    Drop,
    Climax,
    Transition,
    Buildup,
    Fillin,
    DrumAccent,
    BassAccent,
    HighAccent,
}

impl HighlightKind {
    pub fn is_accent(self) -> bool {
        matches!(
            self,
            HighlightKind::DrumAccent | HighlightKind::BassAccent | HighlightKind::HighAccent
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Band {
    Low,
    Mid,
    High,
}

/// What a highlight was detected from: one band, or the full signal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HighlightSource {
    Low,
    Mid,
    High,
    All,
}

impl From<Band> for HighlightSource {
    fn from(band: Band) -> Self {
        match band {
            Band::Low => HighlightSource::Low,
            Band::Mid => HighlightSource::Mid,
            Band::High => HighlightSource::High,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AudioHighlight {
    pub time: f64,
    #[serde(rename = "type")]
    pub kind: HighlightKind,
    pub intensity: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<HighlightSource>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BandEventKind {
    Accent,
    PatternChange,
    IntensitySpike,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FrequencyBandEvent {
    pub time: f64,
    pub band: Band,
    #[serde(rename = "type")]
    pub kind: BandEventKind,
    pub intensity: f64,
}

/// A run of closely and regularly spaced onsets.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RapidBeatSequence {
    pub start: f64,
    pub end: f64,
    pub interval: f64,
    pub count: usize,
}

impl RapidBeatSequence {
    pub fn contains(&self, time: f64) -> bool {
        time >= self.start && time <= self.end
    }
}

/// Everything the extractor derives from one audio window. All times are
/// absolute positions in the source track.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioAnalysis {
    pub start_time: f64,
    pub end_time: f64,
    pub duration: f64,
    pub sample_rate: u32,
    pub bpm: f64,
    pub beats: Vec<Beat>,
    /// Whole-window RMS energy, 0-10
    pub energy: f64,
    pub sections: Vec<AudioSection>,
    pub highlights: Vec<AudioHighlight>,
    pub frequency_events: Vec<FrequencyBandEvent>,
    pub rapid_sequences: Vec<RapidBeatSequence>,
    /// Display-only envelope, normalized to 0-1
    pub waveform_data: Vec<f32>,
}

impl AudioAnalysis {
    /// Analysis of a window with no usable signal.
    pub fn empty(start_time: f64, end_time: f64, sample_rate: u32) -> Self {
        Self {
            start_time,
            end_time,
            duration: end_time - start_time,
            sample_rate,
            bpm: super::analysis::DEFAULT_BPM,
            beats: Vec::new(),
            energy: 0.0,
            sections: Vec::new(),
            highlights: Vec::new(),
            frequency_events: Vec::new(),
            rapid_sequences: Vec::new(),
            waveform_data: Vec::new(),
        }
    }
}
