use crate::{
    detectors::heart_rate::{windowed_heart_rate, HeartRateConfig},
    error::{Error, Result},
    numeric::{argmax_abs, refine_peak, seconds_to_samples, Polarity},
    signal::{HeartRateSeries, PeakSet, Signal},
};
use log::debug;
use serde::{Deserialize, Serialize};

/// Configurable parameters for the R-peak detector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EcgPipelineConfig {
    /// Lower cutoff for the single-pole high-pass filter (Hz).
    pub lowcut_hz: f64,
    /// Upper cutoff for the single-pole low-pass filter (Hz).
    pub highcut_hz: f64,
    /// Moving window integration length (seconds).
    pub integration_window_s: f64,
    /// Minimum physiological RR distance / refractory period (seconds).
    pub refractory_s: f64,
    /// Fraction of the signal/noise gap added to the noise level to form the threshold.
    pub threshold_scale: f64,
    /// How far before a pulse to search (seconds) for the band-passed extremum.
    pub search_back_s: f64,
    /// Radius (seconds) of the final snap onto the raw signal extremum.
    pub refine_radius_s: f64,
    /// Leading span (seconds) used to seed the signal and noise levels.
    pub learning_window_s: f64,
    /// Time constant (seconds) of the noise level tracker.
    pub noise_time_constant_s: f64,
    /// Silence longer than this many mean RR intervals halves the signal level.
    pub missed_beat_factor: f64,
    pub heart_rate: HeartRateConfig,
}

impl Default for EcgPipelineConfig {
    fn default() -> Self {
        Self {
            lowcut_hz: 5.0,
            highcut_hz: 15.0,
            integration_window_s: 0.150,
            refractory_s: 0.200,
            threshold_scale: 0.25,
            search_back_s: 0.150,
            refine_radius_s: 0.040,
            learning_window_s: 2.0,
            noise_time_constant_s: 1.0,
            missed_beat_factor: 1.66,
            heart_rate: HeartRateConfig::default(),
        }
    }
}

impl EcgPipelineConfig {
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("lowcut_hz", self.lowcut_hz),
            ("highcut_hz", self.highcut_hz),
            ("integration_window_s", self.integration_window_s),
            ("refractory_s", self.refractory_s),
            ("learning_window_s", self.learning_window_s),
            ("noise_time_constant_s", self.noise_time_constant_s),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(Error::InvalidConfig(format!(
                    "detector.{} must be positive, got {}",
                    name, value
                )));
            }
        }
        for (name, value) in [
            ("search_back_s", self.search_back_s),
            ("refine_radius_s", self.refine_radius_s),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(Error::InvalidConfig(format!(
                    "detector.{} must be non-negative, got {}",
                    name, value
                )));
            }
        }
        if self.highcut_hz <= self.lowcut_hz {
            return Err(Error::InvalidConfig(format!(
                "detector.highcut_hz ({}) must exceed lowcut_hz ({})",
                self.highcut_hz, self.lowcut_hz
            )));
        }
        if !(self.threshold_scale > 0.0 && self.threshold_scale <= 1.0) {
            return Err(Error::InvalidConfig(format!(
                "detector.threshold_scale must be in (0, 1], got {}",
                self.threshold_scale
            )));
        }
        if !(self.missed_beat_factor.is_finite() && self.missed_beat_factor > 1.0) {
            return Err(Error::InvalidConfig(format!(
                "detector.missed_beat_factor must exceed 1, got {}",
                self.missed_beat_factor
            )));
        }
        self.heart_rate.validate()
    }
}

/// Detector output for one record: `{heart_rate: [f64], r_peaks: [usize]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub heart_rate: HeartRateSeries,
    pub r_peaks: PeakSet,
}

/// Detect R-peaks and derive the windowed heart-rate series.
pub fn run_detection(signal: &Signal, cfg: &EcgPipelineConfig) -> Result<Detection> {
    let r_peaks = detect_r_peaks(signal, cfg)?;
    let heart_rate =
        windowed_heart_rate(r_peaks.indices(), signal.len(), signal.fs(), &cfg.heart_rate);
    Ok(Detection {
        heart_rate,
        r_peaks,
    })
}

/// Detect R-peaks with the adaptive-threshold envelope scan.
pub fn detect_r_peaks(signal: &Signal, cfg: &EcgPipelineConfig) -> Result<PeakSet> {
    cfg.validate()?;
    let fs = signal.fs();
    let required = cfg.heart_rate.window_samples(fs);
    if signal.len() < required {
        return Err(Error::SignalTooShort {
            len: signal.len(),
            required,
        });
    }

    let conditioned = condition(signal.samples(), fs, cfg);
    let mut tracker = EnvelopeTracker::seed(&conditioned.envelope, fs, cfg);
    let locator = PeakLocator {
        raw: signal.samples(),
        bandpassed: &conditioned.bandpassed,
        search_back: seconds_to_samples(cfg.search_back_s, fs),
        refine_radius: seconds_to_samples(cfg.refine_radius_s, fs),
    };

    for (i, &sample) in conditioned.envelope.iter().enumerate() {
        if let Some(pulse) = tracker.observe(i, sample) {
            tracker.resolve(&pulse, locator.locate(&pulse));
        }
        tracker.settle(i);
    }
    if let Some(pulse) = tracker.finish() {
        tracker.resolve(&pulse, locator.locate(&pulse));
    }

    let peaks = tracker.into_peaks();
    debug!(
        "detected {} R-peaks in {:.1} s at {} Hz",
        peaks.len(),
        signal.duration(),
        fs
    );
    Ok(PeakSet::from_sorted(peaks))
}

struct Conditioned {
    bandpassed: Vec<f64>,
    envelope: Vec<f64>,
}

fn condition(data: &[f64], fs: f64, cfg: &EcgPipelineConfig) -> Conditioned {
    let bandpassed = bandpass(data, fs, cfg.lowcut_hz, cfg.highcut_hz);
    let derivative = derivative(&bandpassed);
    let squared = square(&derivative);
    let win = seconds_to_samples(cfg.integration_window_s, fs).max(1);
    let envelope = moving_average(&squared, win);
    Conditioned {
        bandpassed,
        envelope,
    }
}

fn bandpass(data: &[f64], fs: f64, low: f64, high: f64) -> Vec<f64> {
    let hp = single_pole_highpass(data, fs, low);
    if high >= fs * 0.5 {
        hp
    } else {
        single_pole_lowpass(&hp, fs, high)
    }
}

fn single_pole_highpass(data: &[f64], fs: f64, cutoff: f64) -> Vec<f64> {
    if data.is_empty() {
        return Vec::new();
    }
    let dt = 1.0 / fs;
    let rc = 1.0 / (2.0 * std::f64::consts::PI * cutoff);
    let alpha = rc / (rc + dt);
    let mut out = Vec::with_capacity(data.len());
    // Zero initial output: a DC offset must not look like an onset.
    let mut prev_y = 0.0;
    let mut prev_x = data[0];
    for &x in data {
        let y = alpha * (prev_y + x - prev_x);
        out.push(y);
        prev_y = y;
        prev_x = x;
    }
    out
}

fn single_pole_lowpass(data: &[f64], fs: f64, cutoff: f64) -> Vec<f64> {
    if data.is_empty() {
        return Vec::new();
    }
    let dt = 1.0 / fs;
    let rc = 1.0 / (2.0 * std::f64::consts::PI * cutoff);
    let alpha = dt / (rc + dt);
    let mut out = Vec::with_capacity(data.len());
    let mut prev = data[0];
    for &x in data {
        prev = prev + alpha * (x - prev);
        out.push(prev);
    }
    out
}

fn derivative(data: &[f64]) -> Vec<f64> {
    let mut out = vec![0.0; data.len()];
    for i in 1..data.len() {
        out[i] = data[i] - data[i - 1];
    }
    out
}

fn square(data: &[f64]) -> Vec<f64> {
    data.iter().map(|x| x * x).collect()
}

fn moving_average(data: &[f64], win: usize) -> Vec<f64> {
    let mut out = vec![0.0; data.len()];
    let mut acc = 0.0;
    for (i, &sample) in data.iter().enumerate() {
        acc += sample;
        if i >= win {
            acc -= data[i - win];
        }
        out[i] = acc / win as f64;
    }
    out
}

/// Span of consecutive envelope samples above the threshold.
#[derive(Debug, Clone, Copy)]
struct Pulse {
    start: usize,
    end: usize,
    peak: f64,
}

/// Maps a closed pulse to an R-peak sample index.
struct PeakLocator<'a> {
    raw: &'a [f64],
    bandpassed: &'a [f64],
    search_back: usize,
    refine_radius: usize,
}

impl PeakLocator<'_> {
    fn locate(&self, pulse: &Pulse) -> usize {
        let start = pulse.start.saturating_sub(self.search_back);
        let coarse = argmax_abs(self.bandpassed, start..pulse.end + 1).unwrap_or(pulse.start);
        let polarity = if self.bandpassed[coarse] >= 0.0 {
            Polarity::Positive
        } else {
            Polarity::Negative
        };
        refine_peak(self.raw, coarse, self.refine_radius, polarity)
    }
}

/// Streaming state of the adaptive-threshold scan.
///
/// Signal and noise levels are running estimates of the integrated envelope
/// during beats and between beats; the threshold sits between them.
struct EnvelopeTracker {
    signal_level: f64,
    noise_level: f64,
    threshold: f64,
    threshold_scale: f64,
    noise_alpha: f64,
    refractory: usize,
    missed_beat_factor: f64,
    initial_gap: f64,
    pulse: Option<Pulse>,
    rr_average: Option<f64>,
    last_relaxation: Option<usize>,
    peaks: Vec<usize>,
}

impl EnvelopeTracker {
    fn seed(envelope: &[f64], fs: f64, cfg: &EcgPipelineConfig) -> Self {
        let init = envelope
            .len()
            .min(seconds_to_samples(cfg.learning_window_s, fs).max(1));
        let learning = &envelope[..init];
        let max = learning.iter().copied().fold(0.0, f64::max);
        let mean = if init > 0 {
            learning.iter().sum::<f64>() / init as f64
        } else {
            0.0
        };
        let mut tracker = Self {
            signal_level: 0.5 * max,
            noise_level: mean,
            threshold: 0.0,
            threshold_scale: cfg.threshold_scale,
            noise_alpha: 1.0 / (cfg.noise_time_constant_s * fs).max(1.0),
            refractory: seconds_to_samples(cfg.refractory_s, fs).max(1),
            missed_beat_factor: cfg.missed_beat_factor,
            initial_gap: cfg.learning_window_s * fs,
            pulse: None,
            rr_average: None,
            last_relaxation: None,
            peaks: Vec::new(),
        };
        tracker.update_threshold();
        tracker
    }

    /// Feed one envelope sample; returns the pulse it closed, if any.
    fn observe(&mut self, i: usize, sample: f64) -> Option<Pulse> {
        let above = sample > self.threshold;
        match self.pulse.as_mut() {
            None if above => {
                self.pulse = Some(Pulse {
                    start: i,
                    end: i,
                    peak: sample,
                });
                None
            }
            None => {
                self.track_noise(sample);
                None
            }
            Some(pulse) if above => {
                pulse.end = i;
                pulse.peak = pulse.peak.max(sample);
                None
            }
            Some(_) => {
                self.track_noise(sample);
                self.pulse.take()
            }
        }
    }

    /// Accept or reject a located candidate for a closed pulse.
    fn resolve(&mut self, pulse: &Pulse, candidate: usize) {
        if let Some(&last) = self.peaks.last() {
            if candidate < last + self.refractory {
                self.noise_level = 0.125 * pulse.peak + 0.875 * self.noise_level;
                return;
            }
            let gap = (candidate - last) as f64;
            self.rr_average = Some(match self.rr_average {
                Some(avg) => 0.125 * gap + 0.875 * avg,
                None => gap,
            });
        }
        self.peaks.push(candidate);
        self.last_relaxation = None;
        self.signal_level = 0.125 * pulse.peak + 0.875 * self.signal_level;
    }

    /// End-of-sample bookkeeping: missed-beat relaxation and threshold refresh.
    fn settle(&mut self, i: usize) {
        if self.pulse.is_none() {
            if let Some(&last) = self.peaks.last() {
                let limit = match self.rr_average {
                    Some(avg) => self.missed_beat_factor * avg,
                    None => self.initial_gap,
                };
                let silent = i.saturating_sub(last) as f64;
                let due = match self.last_relaxation {
                    Some(at) => (i - at) as f64 > limit,
                    None => true,
                };
                if silent > limit && due {
                    self.signal_level *= 0.5;
                    self.last_relaxation = Some(i);
                }
            }
        }
        self.update_threshold();
    }

    fn finish(&mut self) -> Option<Pulse> {
        self.pulse.take()
    }

    fn track_noise(&mut self, sample: f64) {
        self.noise_level += self.noise_alpha * (sample - self.noise_level);
    }

    fn update_threshold(&mut self) {
        self.threshold = self.noise_level
            + self.threshold_scale * (self.signal_level - self.noise_level).max(0.0);
    }

    fn into_peaks(self) -> Vec<usize> {
        self.peaks
    }
}
