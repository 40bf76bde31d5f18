use thiserror::Error;

/// Input rejected before any analysis runs.
#[derive(Debug, Error, PartialEq)]
pub enum AnalysisError {
    #[error("invalid time window: end {end:.3}s must be after start {start:.3}s")]
    InvalidWindow { start: f64, end: f64 },

    #[error("sample rate must be positive")]
    InvalidSampleRate,

    #[error("non-finite sample at index {index}")]
    NonFiniteSample { index: usize },
}

#[derive(Debug, Error, PartialEq)]
pub enum PlanError {
    #[error("no images to schedule")]
    NoImages,

    #[error("total duration must be positive and finite, got {0}")]
    InvalidDuration(f64),

    #[error("clip partition broken at clip {index}: {reason}")]
    BrokenPartition { index: usize, reason: String },
}
