use crate::{
    detectors::Detection,
    error::{Error, Result},
    scoring::Annotation,
    signal::RRSeries,
};
use serde::{Deserialize, Serialize};

/// Extent of a record and the margin at each end excluded from counting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecordBounds {
    pub sample_count: usize,
    /// Margin in samples.
    pub margin: f64,
}

impl RecordBounds {
    pub fn new(sample_count: usize, margin: f64) -> Self {
        Self {
            sample_count,
            margin,
        }
    }

    pub fn is_interior(&self, sample: usize) -> bool {
        let last = self.sample_count.saturating_sub(1) as f64;
        let s = sample as f64;
        s >= self.margin && s <= last - self.margin
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchedPair {
    pub reference: usize,
    pub detected: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeartRateComparison {
    pub reference: f64,
    pub detected: f64,
}

/// Counts for one record after tolerance matching.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchOutcome {
    pub true_positives: usize,
    pub false_negatives: usize,
    pub false_positives: usize,
    pub pairs: Vec<MatchedPair>,
    pub heart_rate: Vec<HeartRateComparison>,
}

/// A reference/detection pair lying within tolerance of each other.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    distance: f64,
    earliest: usize,
    reference: usize,
    detected: usize,
}

/// Greedy nearest-neighbour matching of two sorted peak lists.
///
/// A two-pointer walk collects every pair within `tolerance`; pairs are then
/// committed nearest first, the earlier one first among equally near pairs,
/// skipping peaks already matched. The committed pairs are the same whichever
/// list is called the reference, so the true-positive count is symmetric.
/// Pairs count when either side is interior to `bounds`, misses and extras
/// only when interior.
pub fn match_peaks(
    reference: &[usize],
    detected: &[usize],
    tolerance: f64,
    bounds: &RecordBounds,
) -> MatchOutcome {
    let mut candidates = Vec::new();
    let mut lo = 0;
    for (i, &r) in reference.iter().enumerate() {
        let rf = r as f64;
        while lo < detected.len() && (detected[lo] as f64) < rf - tolerance {
            lo += 1;
        }
        for (k, &d) in detected.iter().enumerate().skip(lo) {
            let distance = (d as f64 - rf).abs();
            if distance > tolerance {
                break;
            }
            candidates.push(Candidate {
                distance,
                earliest: r.min(d),
                reference: i,
                detected: k,
            });
        }
    }
    candidates.sort_by(|a, b| {
        a.distance
            .total_cmp(&b.distance)
            .then(a.earliest.cmp(&b.earliest))
            .then(a.reference.cmp(&b.reference))
    });

    let mut partner: Vec<Option<usize>> = vec![None; reference.len()];
    let mut used = vec![false; detected.len()];
    for c in candidates {
        if partner[c.reference].is_none() && !used[c.detected] {
            partner[c.reference] = Some(c.detected);
            used[c.detected] = true;
        }
    }

    let mut outcome = MatchOutcome::default();
    for (&r, matched) in reference.iter().zip(&partner) {
        match *matched {
            Some(k) => {
                if bounds.is_interior(r) || bounds.is_interior(detected[k]) {
                    outcome.true_positives += 1;
                }
                outcome.pairs.push(MatchedPair {
                    reference: r,
                    detected: detected[k],
                });
            }
            None => {
                if bounds.is_interior(r) {
                    outcome.false_negatives += 1;
                }
            }
        }
    }
    outcome.false_positives = detected
        .iter()
        .zip(&used)
        .filter(|&(&d, &taken)| !taken && bounds.is_interior(d))
        .count();
    outcome
}

/// Pair reference and detected window rates.
///
/// Equal lengths compare window by window. A single reference rate covers
/// the whole record and is compared with the record-level rate of the
/// detected peaks (0.0 with fewer than two). Any other length mismatch is
/// a malformed annotation.
pub fn compare_heart_rates(
    reference: &[f64],
    detected: &[f64],
    detected_peaks: &[usize],
    fs: f64,
) -> Result<Vec<HeartRateComparison>> {
    if reference.len() == detected.len() {
        return Ok(reference
            .iter()
            .zip(detected)
            .map(|(&reference, &detected)| HeartRateComparison {
                reference,
                detected,
            })
            .collect());
    }
    if let [whole_record] = reference {
        let detected = RRSeries::from_peaks(detected_peaks, fs)
            .mean_bpm()
            .unwrap_or(0.0);
        return Ok(vec![HeartRateComparison {
            reference: *whole_record,
            detected,
        }]);
    }
    Err(Error::MalformedAnnotation(format!(
        "{} reference heart-rate windows but {} detected",
        reference.len(),
        detected.len()
    )))
}

/// Match one record's detection against its annotation.
pub fn match_record(
    annotation: &Annotation,
    detection: &Detection,
    tolerance: f64,
    bounds: &RecordBounds,
    fs: f64,
) -> Result<MatchOutcome> {
    let mut outcome = match_peaks(
        annotation.r_peaks.indices(),
        detection.r_peaks.indices(),
        tolerance,
        bounds,
    );
    outcome.heart_rate = compare_heart_rates(
        annotation.heart_rate.values(),
        detection.heart_rate.values(),
        detection.r_peaks.indices(),
        fs,
    )?;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    const TOL: f64 = 37.5;

    fn bounds() -> RecordBounds {
        RecordBounds::new(5000, TOL)
    }

    fn counts(o: &MatchOutcome) -> (usize, usize, usize) {
        (o.true_positives, o.false_negatives, o.false_positives)
    }

    #[test]
    fn matches_within_tolerance() {
        let o = match_peaks(&[100, 600, 1100], &[102, 1105], TOL, &bounds());
        assert_eq!(counts(&o), (2, 1, 0));
        assert_eq!(
            o.pairs,
            vec![
                MatchedPair {
                    reference: 100,
                    detected: 102
                },
                MatchedPair {
                    reference: 1100,
                    detected: 1105
                },
            ]
        );
    }

    #[test]
    fn identical_sets_match_fully() {
        let peaks = [250, 650, 1050, 1450, 1850];
        let o = match_peaks(&peaks, &peaks, TOL, &bounds());
        assert_eq!(counts(&o), (5, 0, 0));
    }

    #[test]
    fn empty_detection_misses_everything() {
        let o = match_peaks(&[250, 650, 1050], &[], TOL, &bounds());
        assert_eq!(counts(&o), (0, 3, 0));
        let o = match_peaks(&[], &[250, 650], TOL, &bounds());
        assert_eq!(counts(&o), (0, 0, 2));
    }

    #[test]
    fn nearest_detection_wins() {
        let o = match_peaks(&[1000], &[970, 995], TOL, &bounds());
        assert_eq!(o.pairs[0].detected, 995);
        assert_eq!(counts(&o), (1, 0, 1));
    }

    #[test]
    fn ties_go_to_earliest_detection() {
        let o = match_peaks(&[1000], &[990, 1010], TOL, &bounds());
        assert_eq!(o.pairs[0].detected, 990);
        assert_eq!(counts(&o), (1, 0, 1));
    }

    #[test]
    fn tolerance_is_inclusive() {
        let o = match_peaks(&[1000], &[1037], TOL, &bounds());
        assert_eq!(counts(&o), (1, 0, 0));
        let o = match_peaks(&[1000], &[1038], TOL, &bounds());
        assert_eq!(counts(&o), (0, 1, 1));
    }

    #[test]
    fn each_detection_matches_once() {
        let o = match_peaks(&[1000, 1020], &[1010], TOL, &bounds());
        assert_eq!(counts(&o), (1, 1, 0));
        assert_eq!(o.pairs.len(), 1);
    }

    #[test]
    fn edges_are_excluded_from_counts() {
        // 10 and 4990 lie inside the 37.5-sample margins of a 5000-sample record
        let o = match_peaks(&[10, 600, 4990], &[600, 4995], TOL, &bounds());
        assert_eq!(counts(&o), (1, 0, 0));
        // a pair straddling the margin still counts once
        let o = match_peaks(&[30], &[45], TOL, &bounds());
        assert_eq!(counts(&o), (1, 0, 0));
    }

    #[test]
    fn true_positives_are_symmetric() {
        let mut rng = StdRng::seed_from_u64(75);
        for _ in 0..200 {
            let reference = spaced_peaks(&mut rng);
            let detected: Vec<usize> = reference
                .iter()
                .filter_map(|&p| {
                    let jitter: i64 = rng.gen_range(-60..=60);
                    rng.gen_bool(0.8)
                        .then(|| (p as i64 + jitter).max(0) as usize)
                })
                .collect();
            let forward = match_peaks(&reference, &detected, TOL, &bounds());
            let backward = match_peaks(&detected, &reference, TOL, &bounds());
            assert_eq!(forward.true_positives, backward.true_positives);
            assert_eq!(forward.false_negatives, backward.false_positives);
            assert_eq!(forward.false_positives, backward.false_negatives);
        }
    }

    fn spaced_peaks(rng: &mut StdRng) -> Vec<usize> {
        let mut out = Vec::new();
        let mut p = rng.gen_range(0..200);
        while p < 5000 {
            out.push(p);
            p += rng.gen_range(200..500);
        }
        out
    }

    #[test]
    fn passed_over_detection_stays_available() {
        // 990 loses 1000 to the exact hit but is still in range of 1020
        let o = match_peaks(&[1000, 1020], &[990, 1000], TOL, &bounds());
        assert_eq!(counts(&o), (2, 0, 0));
        assert_eq!(
            o.pairs,
            vec![
                MatchedPair {
                    reference: 1000,
                    detected: 1000
                },
                MatchedPair {
                    reference: 1020,
                    detected: 990
                },
            ]
        );
        let swapped = match_peaks(&[990, 1000], &[1000, 1020], TOL, &bounds());
        assert_eq!(counts(&swapped), (2, 0, 0));
    }

    #[test]
    fn closer_pair_takes_precedence_over_scan_order() {
        let o = match_peaks(&[15, 50], &[0, 20], TOL, &RecordBounds::new(5000, 0.0));
        let swapped = match_peaks(&[0, 20], &[15, 50], TOL, &RecordBounds::new(5000, 0.0));
        assert_eq!(o.true_positives, swapped.true_positives);
        assert_eq!(o.pairs[0].detected, 20);
    }

    #[test]
    fn true_positives_are_symmetric_for_dense_peaks() {
        let mut rng = StdRng::seed_from_u64(2019);
        for _ in 0..300 {
            let reference = dense_peaks(&mut rng);
            let detected = dense_peaks(&mut rng);
            let forward = match_peaks(&reference, &detected, TOL, &bounds());
            let backward = match_peaks(&detected, &reference, TOL, &bounds());
            assert_eq!(
                forward.true_positives, backward.true_positives,
                "reference {:?} detected {:?}",
                reference, detected
            );
            assert_eq!(forward.false_negatives, backward.false_positives);
            assert_eq!(forward.false_positives, backward.false_negatives);
        }
    }

    fn dense_peaks(rng: &mut StdRng) -> Vec<usize> {
        let mut out = Vec::new();
        let mut p = rng.gen_range(0..50);
        while p < 600 {
            out.push(p);
            p += rng.gen_range(5..80);
        }
        out
    }

    #[test]
    fn equal_length_rates_compare_window_by_window() {
        let cmp = compare_heart_rates(&[60.0, 72.0], &[61.0, 70.0], &[], 500.0).unwrap();
        assert_eq!(
            cmp,
            vec![
                HeartRateComparison {
                    reference: 60.0,
                    detected: 61.0
                },
                HeartRateComparison {
                    reference: 72.0,
                    detected: 70.0
                },
            ]
        );
    }

    #[test]
    fn single_reference_rate_uses_whole_record_rate() {
        // windows at 60 and 90 bpm around a mean interval of 0.8 s
        let peaks = [0, 500, 1000, 1500, 2000, 2500, 2833, 3166, 3500, 3833, 4166, 4500];
        let cmp = compare_heart_rates(&[75.0], &[60.0, 90.0], &peaks, 500.0).unwrap();
        assert_eq!(cmp.len(), 1);
        let expected = 60.0 * 500.0 / (4500.0 / 11.0);
        assert!((cmp[0].detected - expected).abs() < 1e-9);
        assert!((cmp[0].detected - 73.33).abs() < 0.01);

        let none = compare_heart_rates(&[75.0], &[], &[100], 500.0).unwrap();
        assert_eq!(none[0].detected, 0.0);
    }

    #[test]
    fn mismatched_window_counts_are_rejected() {
        let err = compare_heart_rates(&[60.0, 72.0], &[61.0], &[], 500.0).unwrap_err();
        assert_eq!(err.kind(), "malformed_annotation");
    }
}
