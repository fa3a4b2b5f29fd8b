pub mod config;
pub mod detectors;
pub mod error;
pub mod evaluate;
pub mod io;
pub mod numeric;
pub mod scoring;
pub mod signal;

pub use config::RpeakConfig;
pub use detectors::*;
pub use error::{Error, Result};
pub use evaluate::*;
pub use scoring::*;
pub use signal::*;

/// Detect R-peaks and the windowed heart rate of raw samples with the
/// default detector settings.
pub fn detect(samples: &[f64], sampling_rate: f64) -> Result<Detection> {
    let signal = Signal::new(sampling_rate, samples.to_vec())?;
    run_detection(&signal, &EcgPipelineConfig::default())
}

/// Score externally produced detections with the default heart-rate policy.
///
/// Returns the corpus summary; `recognition_accuracy` and
/// `heart_rate_accuracy` are the two headline numbers.
pub fn score(
    records: &[ScoredRecord],
    sampling_rate: f64,
    tolerance_s: f64,
) -> Result<EvaluationSummary> {
    let cfg = ScoringConfig {
        sampling_rate_hz: sampling_rate,
        tolerance_s,
        ..ScoringConfig::default()
    };
    score_records(records, &cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_rejects_malformed_samples() {
        assert_eq!(detect(&[], 500.0).unwrap_err(), Error::EmptySignal);
        let mut samples = vec![0.0; 5000];
        samples[42] = f64::NAN;
        assert_eq!(detect(&samples, 500.0).unwrap_err().kind(), "non_finite_sample");
    }

    #[test]
    fn detect_on_silence_is_well_formed() {
        let detection = detect(&vec![0.0; 5000], 500.0).unwrap();
        assert!(detection.r_peaks.is_empty());
        assert_eq!(detection.heart_rate.values(), &[0.0, 0.0]);
    }

    #[test]
    fn score_rejects_bad_tolerance() {
        assert_eq!(score(&[], 500.0, -0.1).unwrap_err().kind(), "invalid_config");
        let empty = score(&[], 500.0, 0.075).unwrap();
        assert_eq!(empty.record_count, 0);
    }
}
