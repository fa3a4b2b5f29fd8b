use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Sampling rate of the CPSC-2019 recordings this workspace is tuned for.
pub const DEFAULT_SAMPLING_RATE_HZ: f64 = 500.0;

/// One validated single-lead ECG record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Signal {
    /// Uniform sampling frequency in Hz
    fs: f64,
    /// Samples
    data: Vec<f64>,
}

impl Signal {
    pub fn new(fs: f64, data: Vec<f64>) -> Result<Self> {
        if !fs.is_finite() || fs <= 0.0 {
            return Err(Error::InvalidSamplingRate { fs });
        }
        if data.is_empty() {
            return Err(Error::EmptySignal);
        }
        if let Some((index, &value)) = data.iter().enumerate().find(|(_, v)| !v.is_finite()) {
            return Err(Error::NonFiniteSample { index, value });
        }
        Ok(Self { fs, data })
    }

    pub fn fs(&self) -> f64 {
        self.fs
    }
    pub fn samples(&self) -> &[f64] {
        &self.data
    }
    pub fn len(&self) -> usize {
        self.data.len()
    }
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
    pub fn duration(&self) -> f64 {
        self.data.len() as f64 / self.fs
    }
}

/// Strictly increasing sample indices of R-peaks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<usize>", into = "Vec<usize>")]
pub struct PeakSet {
    indices: Vec<usize>,
}

impl PeakSet {
    pub fn new(indices: Vec<usize>) -> Result<Self> {
        if let Some(pos) = indices.windows(2).position(|w| w[1] <= w[0]) {
            return Err(Error::UnorderedPeaks { index: pos + 1 });
        }
        Ok(Self { indices })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Wraps indices the caller already produced in strictly increasing order.
    pub(crate) fn from_sorted(indices: Vec<usize>) -> Self {
        debug_assert!(indices.windows(2).all(|w| w[0] < w[1]));
        Self { indices }
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }
    pub fn len(&self) -> usize {
        self.indices.len()
    }
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

impl TryFrom<Vec<usize>> for PeakSet {
    type Error = Error;

    fn try_from(indices: Vec<usize>) -> Result<Self> {
        PeakSet::new(indices)
    }
}

impl From<PeakSet> for Vec<usize> {
    fn from(peaks: PeakSet) -> Self {
        peaks.indices
    }
}

/// Beats-per-minute estimates, one per analysis window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct HeartRateSeries {
    bpm: Vec<f64>,
}

impl HeartRateSeries {
    pub fn new(bpm: Vec<f64>) -> Result<Self> {
        if let Some((index, &value)) = bpm
            .iter()
            .enumerate()
            .find(|(_, v)| !v.is_finite() || **v < 0.0)
        {
            return Err(Error::InvalidHeartRate { index, value });
        }
        Ok(Self { bpm })
    }

    /// Wraps rates the caller already knows to be finite and non-negative.
    pub(crate) fn from_valid(bpm: Vec<f64>) -> Self {
        debug_assert!(bpm.iter().all(|v| v.is_finite() && *v >= 0.0));
        Self { bpm }
    }

    pub fn values(&self) -> &[f64] {
        &self.bpm
    }
    pub fn len(&self) -> usize {
        self.bpm.len()
    }
    pub fn is_empty(&self) -> bool {
        self.bpm.is_empty()
    }
}

impl TryFrom<Vec<f64>> for HeartRateSeries {
    type Error = Error;

    fn try_from(bpm: Vec<f64>) -> Result<Self> {
        HeartRateSeries::new(bpm)
    }
}

impl From<HeartRateSeries> for Vec<f64> {
    fn from(series: HeartRateSeries) -> Self {
        series.bpm
    }
}

/// RR intervals (seconds)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RRSeries {
    pub rr: Vec<f64>,
}

impl RRSeries {
    pub fn from_peaks(peaks: &[usize], fs: f64) -> Self {
        let rr = peaks
            .windows(2)
            .map(|w| (w[1] - w[0]) as f64 / fs)
            .collect();
        Self { rr }
    }

    pub fn mean(&self) -> Option<f64> {
        if self.rr.is_empty() {
            return None;
        }
        Some(self.rr.iter().sum::<f64>() / self.rr.len() as f64)
    }

    /// Mean rate in beats per minute, `None` with fewer than two beats.
    pub fn mean_bpm(&self) -> Option<f64> {
        self.mean().filter(|m| *m > 0.0).map(|m| 60.0 / m)
    }
}
