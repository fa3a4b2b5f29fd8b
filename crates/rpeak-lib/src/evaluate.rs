use crate::{
    config::RpeakConfig,
    detectors::{run_detection, Detection},
    error::{Error, Result},
    scoring::{
        score_record, Annotation, EvaluationSummary, ExcludedRecord, RecordScore,
        ScoreAccumulator, ScoringConfig,
    },
    signal::Signal,
};
use log::{debug, info, warn};
use rayon::prelude::*;

/// A signal paired with its reference annotation.
#[derive(Debug, Clone)]
pub struct EvaluationRecord {
    pub id: String,
    pub signal: Signal,
    pub annotation: Annotation,
}

/// One corpus slot; load failures travel as values so they can be excluded.
#[derive(Debug, Clone)]
pub struct CorpusEntry {
    pub id: String,
    pub record: Result<EvaluationRecord>,
}

impl CorpusEntry {
    pub fn loaded(record: EvaluationRecord) -> Self {
        Self {
            id: record.id.clone(),
            record: Ok(record),
        }
    }

    pub fn failed(id: impl Into<String>, err: Error) -> Self {
        Self {
            id: id.into(),
            record: Err(err),
        }
    }
}

/// A detection produced elsewhere, ready to be scored.
#[derive(Debug, Clone)]
pub struct ScoredRecord {
    pub id: String,
    pub sample_count: usize,
    pub annotation: Annotation,
    pub detection: Detection,
}

/// A stored detection slot; like [`CorpusEntry`], failures travel as values.
#[derive(Debug, Clone)]
pub struct ScoredEntry {
    pub id: String,
    pub record: Result<ScoredRecord>,
}

impl ScoredEntry {
    pub fn loaded(record: ScoredRecord) -> Self {
        Self {
            id: record.id.clone(),
            record: Ok(record),
        }
    }

    pub fn failed(id: impl Into<String>, err: Error) -> Self {
        Self {
            id: id.into(),
            record: Err(err),
        }
    }
}

/// Detect, match and grade every record, then reduce into one summary.
///
/// Records are processed in parallel; a record that fails validation or
/// detection is listed in `excluded` and does not stop the run.
pub fn evaluate_corpus(entries: &[CorpusEntry], cfg: &RpeakConfig) -> Result<EvaluationSummary> {
    cfg.validate()?;
    let summary = entries
        .par_iter()
        .fold(ScoreAccumulator::new, |acc, entry| {
            fold_score(acc, &entry.id, evaluate_entry(entry, cfg))
        })
        .reduce(ScoreAccumulator::new, ScoreAccumulator::merge)
        .finish();
    info!(
        "evaluated {} records ({} excluded): rec_acc={:.4} hr_acc={:.4}",
        summary.record_count,
        summary.excluded.len(),
        summary.recognition_accuracy,
        summary.heart_rate_accuracy
    );
    Ok(summary)
}

fn evaluate_entry(entry: &CorpusEntry, cfg: &RpeakConfig) -> Result<RecordScore> {
    let record = entry.record.as_ref().map_err(Clone::clone)?;
    check_sampling_rate(record.signal.fs(), &cfg.scoring)?;
    let detection = run_detection(&record.signal, &cfg.detector)?;
    let score = score_record(
        &record.id,
        &record.annotation,
        &detection,
        record.signal.len(),
        &cfg.scoring,
    )?;
    debug!(
        "record {}: tp={} fn={} fp={} grade={:?}",
        record.id, score.true_positives, score.false_negatives, score.false_positives, score.grade
    );
    Ok(score)
}

fn check_sampling_rate(actual: f64, cfg: &ScoringConfig) -> Result<()> {
    if (actual - cfg.sampling_rate_hz).abs() > 1e-9 {
        return Err(Error::SamplingRateMismatch {
            expected: cfg.sampling_rate_hz,
            actual,
        });
    }
    Ok(())
}

/// Score detections that were produced elsewhere.
///
/// A record whose rates cannot be paired with its annotation is excluded.
pub fn score_records(records: &[ScoredRecord], cfg: &ScoringConfig) -> Result<EvaluationSummary> {
    cfg.validate()?;
    Ok(records
        .par_iter()
        .fold(ScoreAccumulator::new, |acc, record| {
            fold_score(acc, &record.id, score_stored(record, cfg))
        })
        .reduce(ScoreAccumulator::new, ScoreAccumulator::merge)
        .finish())
}

/// Score loaded detection entries; load failures are excluded with their reason.
pub fn score_entries(entries: &[ScoredEntry], cfg: &ScoringConfig) -> Result<EvaluationSummary> {
    cfg.validate()?;
    let summary = entries
        .par_iter()
        .fold(ScoreAccumulator::new, |acc, entry| {
            let score = entry
                .record
                .as_ref()
                .map_err(Clone::clone)
                .and_then(|record| score_stored(record, cfg));
            fold_score(acc, &entry.id, score)
        })
        .reduce(ScoreAccumulator::new, ScoreAccumulator::merge)
        .finish();
    info!(
        "scored {} records ({} excluded): rec_acc={:.4} hr_acc={:.4}",
        summary.record_count,
        summary.excluded.len(),
        summary.recognition_accuracy,
        summary.heart_rate_accuracy
    );
    Ok(summary)
}

fn score_stored(record: &ScoredRecord, cfg: &ScoringConfig) -> Result<RecordScore> {
    score_record(
        &record.id,
        &record.annotation,
        &record.detection,
        record.sample_count,
        cfg,
    )
}

fn fold_score(acc: ScoreAccumulator, id: &str, score: Result<RecordScore>) -> ScoreAccumulator {
    match score {
        Ok(score) => acc.add(score),
        Err(err) => {
            warn!("excluding record {}: {}", id, err);
            acc.exclude(ExcludedRecord::new(id, &err))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        detectors::{
            ecg::tests::{beat_times, synthetic_ecg},
            HeartRateConfig,
        },
        signal::{HeartRateSeries, PeakSet},
    };

    const FS: f64 = 500.0;

    fn record(id: &str, beats: &[f64]) -> EvaluationRecord {
        let signal = Signal::new(FS, synthetic_ecg(FS, beats, 10.0, |_| 1.2)).unwrap();
        let peaks: Vec<usize> = beats.iter().map(|b| (b * FS).round() as usize).collect();
        let annotation = Annotation::from_peaks(
            PeakSet::new(peaks).unwrap(),
            signal.len(),
            FS,
            &HeartRateConfig::default(),
        );
        EvaluationRecord {
            id: id.into(),
            signal,
            annotation,
        }
    }

    #[test]
    fn clean_corpus_scores_perfectly() {
        let entries = vec![
            CorpusEntry::loaded(record("00001", &beat_times(0.4, 0.8, 12))),
            CorpusEntry::loaded(record("00002", &beat_times(0.6, 0.9, 10))),
            CorpusEntry::loaded(record("00003", &beat_times(0.3, 0.5, 19))),
        ];
        let summary = evaluate_corpus(&entries, &RpeakConfig::default()).unwrap();
        assert_eq!(summary.record_count, 3);
        assert_eq!(summary.recognition_accuracy, 1.0);
        assert_eq!(summary.heart_rate_accuracy, 1.0);
        assert_eq!(summary.false_negatives + summary.false_positives, 0);
        assert!(summary.excluded.is_empty());
    }

    #[test]
    fn failing_records_are_excluded_not_fatal() {
        let mut mismatched = record("00003", &beat_times(0.4, 0.8, 12));
        mismatched.signal = Signal::new(360.0, mismatched.signal.samples().to_vec()).unwrap();
        let short = EvaluationRecord {
            id: "00004".into(),
            signal: Signal::new(FS, vec![0.0; 100]).unwrap(),
            annotation: Annotation::new(PeakSet::empty(), HeartRateSeries::default()),
        };
        let entries = vec![
            CorpusEntry::loaded(record("00001", &beat_times(0.4, 0.8, 12))),
            CorpusEntry::failed("00002", Error::EmptySignal),
            CorpusEntry::loaded(mismatched),
            CorpusEntry::loaded(short),
        ];
        let summary = evaluate_corpus(&entries, &RpeakConfig::default()).unwrap();
        assert_eq!(summary.record_count, 1);
        let kinds: Vec<_> = summary.excluded.iter().map(|e| e.kind.as_str()).collect();
        assert_eq!(
            kinds,
            vec!["empty_signal", "sampling_rate_mismatch", "signal_too_short"]
        );
    }

    #[test]
    fn parallel_and_sequential_runs_agree() {
        let entries: Vec<CorpusEntry> = (0..8)
            .map(|k| {
                let beats = beat_times(0.3 + 0.05 * k as f64, 0.6 + 0.05 * k as f64, 12);
                let beats: Vec<f64> = beats.into_iter().filter(|b| *b < 9.6).collect();
                CorpusEntry::loaded(record(&format!("{:05}", k), &beats))
            })
            .collect();
        let cfg = RpeakConfig::default();
        let parallel = evaluate_corpus(&entries, &cfg).unwrap();
        let sequential = entries
            .iter()
            .map(|e| evaluate_entry(e, &cfg).unwrap())
            .fold(ScoreAccumulator::new(), ScoreAccumulator::add)
            .finish();
        assert_eq!(parallel, sequential);
    }

    #[test]
    fn scoring_external_detections() {
        let annotation = Annotation::new(
            PeakSet::new(vec![100, 600, 1100]).unwrap(),
            HeartRateSeries::new(vec![60.0]).unwrap(),
        );
        let perfect = ScoredRecord {
            id: "a".into(),
            sample_count: 5000,
            annotation: annotation.clone(),
            detection: Detection {
                heart_rate: HeartRateSeries::new(vec![60.0]).unwrap(),
                r_peaks: PeakSet::new(vec![100, 600, 1100]).unwrap(),
            },
        };
        let missed = ScoredRecord {
            id: "b".into(),
            sample_count: 5000,
            annotation,
            detection: Detection {
                heart_rate: HeartRateSeries::new(vec![0.0]).unwrap(),
                r_peaks: PeakSet::empty(),
            },
        };
        let summary = score_records(&[perfect, missed], &ScoringConfig::default()).unwrap();
        assert_eq!(
            (summary.true_positives, summary.false_negatives, summary.false_positives),
            (3, 3, 0)
        );
        assert_eq!(summary.recognition_accuracy, 0.5);
        assert_eq!(summary.heart_rate_accuracy, 0.5);
    }

    fn missed_record(id: &str, peaks: Vec<usize>) -> ScoredRecord {
        let peaks = PeakSet::new(peaks).unwrap();
        ScoredRecord {
            id: id.into(),
            sample_count: 5000,
            annotation: Annotation::from_peaks(peaks, 5000, FS, &HeartRateConfig::default()),
            detection: Detection {
                heart_rate: HeartRateSeries::new(vec![0.0, 0.0]).unwrap(),
                r_peaks: PeakSet::empty(),
            },
        }
    }

    #[test]
    fn failed_entries_are_excluded_from_scores() {
        let ok = missed_record("00001", vec![]);
        let entries = vec![
            ScoredEntry::loaded(ok),
            ScoredEntry::failed(
                "00002",
                Error::Load {
                    path: "det/data_00002.json".into(),
                    message: "No such file or directory".into(),
                },
            ),
        ];
        let summary = score_entries(&entries, &ScoringConfig::default()).unwrap();
        assert_eq!(summary.record_count, 1);
        assert_eq!(summary.recognition_accuracy, 1.0);
        assert_eq!(summary.excluded.len(), 1);
        assert_eq!(summary.excluded[0].id, "00002");
        assert_eq!(summary.excluded[0].kind, "load_failure");
    }

    #[test]
    fn empty_detections_never_raise_accuracy_as_the_corpus_grows() {
        let cfg = ScoringConfig::default();
        let mut corpus = vec![missed_record("00000", vec![])];
        let mut previous = score_records(&corpus, &cfg).unwrap().recognition_accuracy;
        assert_eq!(previous, 1.0);

        // one-beat records grade 0.3, longer ones 0
        let growth: Vec<Vec<usize>> = vec![
            vec![1000],
            vec![2000],
            vec![500, 1500],
            vec![400, 800, 1200],
            (0..12).map(|k| 200 + 400 * k).collect(),
        ];
        for (n, peaks) in growth.into_iter().enumerate() {
            corpus.push(missed_record(&format!("{:05}", n + 1), peaks));
            let summary = score_records(&corpus, &cfg).unwrap();
            assert!(
                summary.recognition_accuracy <= previous,
                "{} records: {} > {}",
                corpus.len(),
                summary.recognition_accuracy,
                previous
            );
            assert_eq!(summary.true_positives, 0);
            previous = summary.recognition_accuracy;
        }
        assert_eq!(previous, 0.2667);

        // adding reference beats to an existing record never helps either
        let mut grown = corpus.clone();
        grown[1] = missed_record("00001", vec![1000, 1400]);
        let summary = score_records(&grown, &cfg).unwrap();
        assert!(summary.recognition_accuracy <= previous);
    }
}
