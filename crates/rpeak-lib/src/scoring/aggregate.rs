use crate::{
    error::Error,
    numeric::round_to,
    scoring::matcher::{HeartRateComparison, MatchOutcome},
};
use serde::{Deserialize, Serialize};

/// Per-record recognition grade derived from the miss/extra counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordGrade {
    /// No misses, no extras.
    Perfect,
    /// Exactly one extra detection.
    OneExtra,
    /// Exactly one missed beat.
    OneMissed,
    Failed,
}

impl RecordGrade {
    pub fn from_counts(false_negatives: usize, false_positives: usize) -> Self {
        match (false_negatives, false_positives) {
            (0, 0) => RecordGrade::Perfect,
            (0, 1) => RecordGrade::OneExtra,
            (1, 0) => RecordGrade::OneMissed,
            _ => RecordGrade::Failed,
        }
    }

    /// Grade in tenths so corpus sums stay exact.
    pub fn tenths(self) -> u64 {
        match self {
            RecordGrade::Perfect => 10,
            RecordGrade::OneExtra => 7,
            RecordGrade::OneMissed => 3,
            RecordGrade::Failed => 0,
        }
    }

    pub fn score(self) -> f64 {
        self.tenths() as f64 / 10.0
    }
}

/// How a detected window rate earns credit against the reference rate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum HeartRateScoring {
    /// Stepped credit on the deviation between whole-bpm rates: 2 % earns 1,
    /// 5 % earns 0.75, 10 % earns 0.5, 20 % earns 0.25.
    Tiered,
    /// Full credit inside the relative deviation, nothing outside.
    Within { max_relative_deviation: f64 },
}

impl Default for HeartRateScoring {
    fn default() -> Self {
        HeartRateScoring::Tiered
    }
}

impl HeartRateScoring {
    /// Credit for one window in quarters (4 = full credit).
    pub fn credit_quarters(&self, cmp: &HeartRateComparison) -> u64 {
        match *self {
            HeartRateScoring::Tiered => {
                let deviation = (cmp.detected.trunc() - cmp.reference.trunc()).abs();
                let reference = cmp.reference;
                if deviation <= 0.02 * reference {
                    4
                } else if deviation <= 0.05 * reference {
                    3
                } else if deviation <= 0.1 * reference {
                    2
                } else if deviation <= 0.2 * reference {
                    1
                } else {
                    0
                }
            }
            HeartRateScoring::Within {
                max_relative_deviation,
            } => {
                let deviation = (cmp.detected - cmp.reference).abs();
                if deviation <= max_relative_deviation * cmp.reference {
                    4
                } else {
                    0
                }
            }
        }
    }
}

/// Scores of one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordScore {
    pub id: String,
    pub true_positives: usize,
    pub false_negatives: usize,
    pub false_positives: usize,
    pub grade: RecordGrade,
    pub heart_rate_windows: usize,
    /// Heart-rate credit in quarters.
    pub heart_rate_quarters: u64,
}

impl RecordScore {
    pub fn from_outcome(id: impl Into<String>, outcome: &MatchOutcome, hr: &HeartRateScoring) -> Self {
        Self {
            id: id.into(),
            true_positives: outcome.true_positives,
            false_negatives: outcome.false_negatives,
            false_positives: outcome.false_positives,
            grade: RecordGrade::from_counts(outcome.false_negatives, outcome.false_positives),
            heart_rate_windows: outcome.heart_rate.len(),
            heart_rate_quarters: outcome
                .heart_rate
                .iter()
                .map(|cmp| hr.credit_quarters(cmp))
                .sum(),
        }
    }

    pub fn heart_rate_credit(&self) -> f64 {
        self.heart_rate_quarters as f64 / 4.0
    }
}

/// A record left out of the scores, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExcludedRecord {
    pub id: String,
    pub kind: String,
    pub message: String,
}

impl ExcludedRecord {
    pub fn new(id: impl Into<String>, err: &Error) -> Self {
        Self {
            id: id.into(),
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

/// Corpus-level scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationSummary {
    pub record_count: usize,
    pub recognition_accuracy: f64,
    pub heart_rate_accuracy: f64,
    pub true_positives: usize,
    pub false_negatives: usize,
    pub false_positives: usize,
    pub heart_rate_windows: usize,
    pub records: Vec<RecordScore>,
    pub excluded: Vec<ExcludedRecord>,
}

/// Fold state for corpus scoring.
///
/// Grades and credits are held as integers, so `merge` is exactly
/// associative and commutative and records can be scored in any order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreAccumulator {
    grade_tenths: u64,
    heart_rate_quarters: u64,
    heart_rate_windows: usize,
    true_positives: usize,
    false_negatives: usize,
    false_positives: usize,
    records: Vec<RecordScore>,
    excluded: Vec<ExcludedRecord>,
}

impl ScoreAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(mut self, score: RecordScore) -> Self {
        self.grade_tenths += score.grade.tenths();
        self.heart_rate_quarters += score.heart_rate_quarters;
        self.heart_rate_windows += score.heart_rate_windows;
        self.true_positives += score.true_positives;
        self.false_negatives += score.false_negatives;
        self.false_positives += score.false_positives;
        self.records.push(score);
        self
    }

    pub fn exclude(mut self, record: ExcludedRecord) -> Self {
        self.excluded.push(record);
        self
    }

    pub fn merge(mut self, other: Self) -> Self {
        self.grade_tenths += other.grade_tenths;
        self.heart_rate_quarters += other.heart_rate_quarters;
        self.heart_rate_windows += other.heart_rate_windows;
        self.true_positives += other.true_positives;
        self.false_negatives += other.false_negatives;
        self.false_positives += other.false_positives;
        self.records.extend(other.records);
        self.excluded.extend(other.excluded);
        self
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Recognition accuracy is the mean record grade; heart-rate accuracy
    /// the mean window credit. Both are 0.0 when nothing was scored, and
    /// both are rounded to four decimals.
    pub fn finish(mut self) -> EvaluationSummary {
        self.records.sort_by(|a, b| a.id.cmp(&b.id));
        self.excluded.sort_by(|a, b| a.id.cmp(&b.id));
        let record_count = self.records.len();
        let recognition_accuracy = if record_count == 0 {
            0.0
        } else {
            round_to(self.grade_tenths as f64 / (10 * record_count) as f64, 4)
        };
        let heart_rate_accuracy = if self.heart_rate_windows == 0 {
            0.0
        } else {
            round_to(
                self.heart_rate_quarters as f64 / (4 * self.heart_rate_windows) as f64,
                4,
            )
        };
        EvaluationSummary {
            record_count,
            recognition_accuracy,
            heart_rate_accuracy,
            true_positives: self.true_positives,
            false_negatives: self.false_negatives,
            false_positives: self.false_positives,
            heart_rate_windows: self.heart_rate_windows,
            records: self.records,
            excluded: self.excluded,
        }
    }
}
