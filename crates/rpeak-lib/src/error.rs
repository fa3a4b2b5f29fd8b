use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failure kinds raised by detection, scoring and corpus loading.
///
/// Every variant maps to a stable [`Error::kind`] string so callers (and the
/// evaluation summary) can branch on the kind without parsing messages.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("signal contains no samples")]
    EmptySignal,

    #[error("sample {index} is not finite ({value})")]
    NonFiniteSample { index: usize, value: f64 },

    #[error("sampling rate must be a positive finite number, got {fs}")]
    InvalidSamplingRate { fs: f64 },

    #[error("signal has {len} samples but at least {required} are needed")]
    SignalTooShort { len: usize, required: usize },

    #[error("record sampled at {actual} Hz, expected {expected} Hz")]
    SamplingRateMismatch { expected: f64, actual: f64 },

    #[error("peak indices must be strictly increasing (violated at position {index})")]
    UnorderedPeaks { index: usize },

    #[error("heart rate at window {index} is invalid ({value})")]
    InvalidHeartRate { index: usize, value: f64 },

    #[error("malformed annotation: {0}")]
    MalformedAnnotation(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to load {}: {message}", path.display())]
    Load { path: PathBuf, message: String },
}

impl Error {
    pub fn kind(&self) -> &'static str {
        match self {
            Error::EmptySignal => "empty_signal",
            Error::NonFiniteSample { .. } => "non_finite_sample",
            Error::InvalidSamplingRate { .. } => "invalid_sampling_rate",
            Error::SignalTooShort { .. } => "signal_too_short",
            Error::SamplingRateMismatch { .. } => "sampling_rate_mismatch",
            Error::UnorderedPeaks { .. } => "unordered_peaks",
            Error::InvalidHeartRate { .. } => "invalid_heart_rate",
            Error::MalformedAnnotation(_) => "malformed_annotation",
            Error::InvalidConfig(_) => "invalid_config",
            Error::Load { .. } => "load_failure",
        }
    }

    /// Input validation failures, as opposed to configuration or IO problems.
    pub fn is_validation(&self) -> bool {
        !matches!(self, Error::InvalidConfig(_) | Error::Load { .. })
    }
}
