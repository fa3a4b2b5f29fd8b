//! Small numeric helpers shared by the detector and the scorer.

use std::ops::Range;

/// Direction of the dominant deflection a peak is refined towards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    Positive,
    Negative,
}

/// Snap `center` to the most extreme sample of `data` within `radius` samples.
///
/// Ties resolve to the earliest index.
pub fn refine_peak(data: &[f64], center: usize, radius: usize, polarity: Polarity) -> usize {
    if data.is_empty() {
        return center;
    }
    let center = center.min(data.len() - 1);
    let lo = center.saturating_sub(radius);
    let hi = (center + radius).min(data.len() - 1);
    let mut best = lo;
    for j in lo..=hi {
        let better = match polarity {
            Polarity::Positive => data[j] > data[best],
            Polarity::Negative => data[j] < data[best],
        };
        if better {
            best = j;
        }
    }
    best
}

/// Index of the largest absolute value in `data[range]`, earliest on ties.
pub fn argmax_abs(data: &[f64], range: Range<usize>) -> Option<usize> {
    let end = range.end.min(data.len());
    let mut best: Option<usize> = None;
    for j in range.start..end {
        match best {
            Some(b) if data[j].abs() <= data[b].abs() => {}
            _ => best = Some(j),
        }
    }
    best
}

/// Split `len` samples into consecutive windows of `window` samples.
///
/// A trailing partial window is kept only when it has at least `min_tail`
/// samples.
pub fn segment_windows(len: usize, window: usize, min_tail: usize) -> Vec<Range<usize>> {
    if window == 0 {
        return Vec::new();
    }
    let mut out: Vec<Range<usize>> = (0..len / window)
        .map(|k| k * window..(k + 1) * window)
        .collect();
    let tail_start = (len / window) * window;
    let tail = len - tail_start;
    if tail > 0 && tail >= min_tail.max(1) {
        out.push(tail_start..len);
    }
    out
}

/// Round half away from zero to `decimals` places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

/// Convert a duration in seconds to a sample count, rounding to nearest.
pub fn seconds_to_samples(seconds: f64, fs: f64) -> usize {
    (seconds * fs).round().max(0.0) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refine_follows_polarity() {
        let data = [0.0, 0.2, 1.0, 0.1, -2.0, 0.0];
        assert_eq!(refine_peak(&data, 3, 2, Polarity::Positive), 2);
        assert_eq!(refine_peak(&data, 3, 2, Polarity::Negative), 4);
        // radius clipped at both ends
        assert_eq!(refine_peak(&data, 0, 10, Polarity::Positive), 2);
    }

    #[test]
    fn argmax_abs_prefers_earliest() {
        let data = [1.0, -3.0, 3.0, 0.5];
        assert_eq!(argmax_abs(&data, 0..4), Some(1));
        assert_eq!(argmax_abs(&data, 2..10), Some(2));
        assert_eq!(argmax_abs(&data, 4..4), None);
    }

    #[test]
    fn windows_drop_short_tail() {
        assert_eq!(segment_windows(5000, 2500, 1000), vec![0..2500, 2500..5000]);
        assert_eq!(
            segment_windows(6200, 2500, 1000),
            vec![0..2500, 2500..5000, 5000..6200]
        );
        assert_eq!(segment_windows(5900, 2500, 1000), vec![0..2500, 2500..5000]);
        assert!(segment_windows(100, 2500, 1000).is_empty());
    }

    #[test]
    fn rounding_matches_four_decimals() {
        assert_eq!(round_to(0.123_45, 4), 0.1235);
        assert_eq!(round_to(2.0 / 3.0, 4), 0.6667);
    }
}
