use crate::{
    error::{Error, Result},
    numeric::{seconds_to_samples, segment_windows},
    signal::{HeartRateSeries, RRSeries},
};
use serde::{Deserialize, Serialize};

/// Windowing parameters for the heart-rate series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeartRateConfig {
    /// Length of each non-overlapping analysis window (seconds).
    pub window_s: f64,
    /// Shortest trailing window still worth an estimate (seconds).
    pub min_window_s: f64,
}

impl Default for HeartRateConfig {
    fn default() -> Self {
        Self {
            window_s: 5.0,
            min_window_s: 2.0,
        }
    }
}

impl HeartRateConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.window_s.is_finite() && self.window_s > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "heart_rate.window_s must be positive, got {}",
                self.window_s
            )));
        }
        if !(self.min_window_s.is_finite()
            && self.min_window_s > 0.0
            && self.min_window_s <= self.window_s)
        {
            return Err(Error::InvalidConfig(format!(
                "heart_rate.min_window_s must be in (0, window_s], got {}",
                self.min_window_s
            )));
        }
        Ok(())
    }

    pub fn window_samples(&self, fs: f64) -> usize {
        seconds_to_samples(self.window_s, fs).max(1)
    }

    pub fn min_window_samples(&self, fs: f64) -> usize {
        seconds_to_samples(self.min_window_s, fs).max(1)
    }
}

/// Estimate one rate per window from the peaks falling inside it.
///
/// Windows holding fewer than two peaks carry the previous window's estimate
/// forward; sparse windows before the first real estimate report `0.0`.
pub fn windowed_heart_rate(
    peaks: &[usize],
    sample_count: usize,
    fs: f64,
    cfg: &HeartRateConfig,
) -> HeartRateSeries {
    let windows = segment_windows(
        sample_count,
        cfg.window_samples(fs),
        cfg.min_window_samples(fs),
    );
    let mut bpm = Vec::with_capacity(windows.len());
    let mut previous = 0.0;
    for window in windows {
        let lo = peaks.partition_point(|&p| p < window.start);
        let hi = peaks.partition_point(|&p| p < window.end);
        let estimate = RRSeries::from_peaks(&peaks[lo..hi], fs).mean_bpm();
        let value = match estimate {
            Some(rate) => rate,
            None => previous,
        };
        bpm.push(value);
        previous = value;
    }
    // Every value is a finite positive rate or a carried 0.0.
    HeartRateSeries::from_valid(bpm)
}
