//! Scoring of detector output against reference annotations.
//!
//! [`matcher`] pairs detected and reference peaks of one record within a
//! time tolerance; [`aggregate`] folds per-record outcomes into corpus-level
//! recognition and heart-rate accuracies.

pub mod aggregate;
pub mod matcher;

pub use aggregate::{
    EvaluationSummary, ExcludedRecord, HeartRateScoring, RecordGrade, RecordScore,
    ScoreAccumulator,
};
pub use matcher::{
    compare_heart_rates, match_peaks, match_record, HeartRateComparison, MatchOutcome,
    MatchedPair, RecordBounds,
};

use crate::{
    detectors::{windowed_heart_rate, Detection, HeartRateConfig},
    error::{Error, Result},
    signal::{HeartRateSeries, PeakSet, DEFAULT_SAMPLING_RATE_HZ},
};
use serde::{Deserialize, Serialize};

/// Reference beats and rates of one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub r_peaks: PeakSet,
    pub heart_rate: HeartRateSeries,
}

impl Annotation {
    pub fn new(r_peaks: PeakSet, heart_rate: HeartRateSeries) -> Self {
        Self {
            r_peaks,
            heart_rate,
        }
    }

    /// Annotation whose rates are derived from the reference peaks with the
    /// detector's windowing.
    pub fn from_peaks(
        r_peaks: PeakSet,
        sample_count: usize,
        fs: f64,
        cfg: &HeartRateConfig,
    ) -> Self {
        let heart_rate = windowed_heart_rate(r_peaks.indices(), sample_count, fs, cfg);
        Self {
            r_peaks,
            heart_rate,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Sampling rate every record is expected to use (Hz).
    pub sampling_rate_hz: f64,
    /// Largest offset (seconds) at which a detection still matches a reference beat.
    pub tolerance_s: f64,
    /// Margin (seconds) at each record end excluded from counting; the tolerance when unset.
    pub edge_margin_s: Option<f64>,
    pub heart_rate: HeartRateScoring,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            sampling_rate_hz: DEFAULT_SAMPLING_RATE_HZ,
            tolerance_s: 0.075,
            edge_margin_s: None,
            heart_rate: HeartRateScoring::Tiered,
        }
    }
}

impl ScoringConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.sampling_rate_hz.is_finite() && self.sampling_rate_hz > 0.0) {
            return Err(Error::InvalidSamplingRate {
                fs: self.sampling_rate_hz,
            });
        }
        if !(self.tolerance_s.is_finite() && self.tolerance_s > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "scoring.tolerance_s must be positive, got {}",
                self.tolerance_s
            )));
        }
        if let Some(margin) = self.edge_margin_s {
            if !(margin.is_finite() && margin >= 0.0) {
                return Err(Error::InvalidConfig(format!(
                    "scoring.edge_margin_s must be non-negative, got {}",
                    margin
                )));
            }
        }
        if let HeartRateScoring::Within {
            max_relative_deviation,
        } = self.heart_rate
        {
            if !(max_relative_deviation.is_finite() && max_relative_deviation >= 0.0) {
                return Err(Error::InvalidConfig(format!(
                    "scoring.heart_rate.max_relative_deviation must be non-negative, got {}",
                    max_relative_deviation
                )));
            }
        }
        Ok(())
    }

    /// Tolerance in samples (0.075 s at 500 Hz is 37.5 samples).
    pub fn tolerance_samples(&self) -> f64 {
        self.tolerance_s * self.sampling_rate_hz
    }

    pub fn bounds(&self, sample_count: usize) -> RecordBounds {
        let margin_s = self.edge_margin_s.unwrap_or(self.tolerance_s);
        RecordBounds::new(sample_count, margin_s * self.sampling_rate_hz)
    }
}

/// Match and grade one record.
///
/// Fails with [`Error::MalformedAnnotation`] when the reference and detected
/// heart-rate series cannot be paired.
pub fn score_record(
    id: &str,
    annotation: &Annotation,
    detection: &Detection,
    sample_count: usize,
    cfg: &ScoringConfig,
) -> Result<RecordScore> {
    let outcome = match_record(
        annotation,
        detection,
        cfg.tolerance_samples(),
        &cfg.bounds(sample_count),
        cfg.sampling_rate_hz,
    )?;
    Ok(RecordScore::from_outcome(id, &outcome, &cfg.heart_rate))
}
