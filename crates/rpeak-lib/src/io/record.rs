//! JSON record files laid out like the CPSC-2019 corpus.
//!
//! ```text
//! data/data_00001.json   {"ecg": [..], "fs": 500}
//! ref/R_00001.json       {"R_peak": [..], "HR": 72.0}
//! ```
//!
//! `ecg` and `R_peak` may be flat arrays or single-row/single-column
//! matrices, as exported from MATLAB files.

use crate::{
    config::RpeakConfig,
    detectors::{Detection, HeartRateConfig},
    error::{Error, Result},
    evaluate::{CorpusEntry, EvaluationRecord, ScoredEntry, ScoredRecord},
    scoring::Annotation,
    signal::{HeartRateSeries, PeakSet, Signal},
};
use anyhow::Context;
use log::{debug, warn};
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
};

pub const SIGNAL_FILE_PREFIX: &str = "data_";
pub const REFERENCE_FILE_PREFIX: &str = "R_";

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NumericArray {
    Scalar(f64),
    Flat(Vec<f64>),
    Matrix(Vec<Vec<f64>>),
}

impl NumericArray {
    /// Flatten to one dimension; a matrix must be a single row or column.
    fn into_vec(self) -> std::result::Result<Vec<f64>, String> {
        match self {
            NumericArray::Scalar(x) => Ok(vec![x]),
            NumericArray::Flat(v) => Ok(v),
            NumericArray::Matrix(rows) => {
                if rows.len() == 1 {
                    return Ok(rows.into_iter().flatten().collect());
                }
                if rows.iter().all(|r| r.len() == 1) {
                    return Ok(rows.into_iter().flatten().collect());
                }
                let cols = rows.first().map_or(0, Vec::len);
                Err(format!(
                    "expected a single row or column, got a {}x{} matrix",
                    rows.len(),
                    cols
                ))
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct SignalFile {
    ecg: NumericArray,
    #[serde(default)]
    fs: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ReferenceFile {
    #[serde(alias = "R_peak")]
    r_peaks: NumericArray,
    #[serde(default, alias = "HR")]
    heart_rate: Option<NumericArray>,
    #[serde(default)]
    sample_count: Option<usize>,
}

/// Reference annotation as stored; rates may be absent.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceRecord {
    pub r_peaks: PeakSet,
    pub heart_rate: Option<HeartRateSeries>,
    pub sample_count: Option<usize>,
}

impl ReferenceRecord {
    /// Use the stored rates, or derive them from the peaks when absent.
    pub fn into_annotation(self, sample_count: usize, fs: f64, cfg: &HeartRateConfig) -> Annotation {
        match self.heart_rate {
            Some(hr) => Annotation::new(self.r_peaks, hr),
            None => Annotation::from_peaks(self.r_peaks, sample_count, fs, cfg),
        }
    }
}

fn load_error(path: &Path, message: impl ToString) -> Error {
    Error::Load {
        path: path.to_path_buf(),
        message: message.to_string(),
    }
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path).map_err(|e| load_error(path, e))?;
    serde_json::from_str(&text).map_err(|e| load_error(path, e))
}

/// Peak positions stored as numbers must be non-negative integers.
fn to_indices(values: Vec<f64>, path: &Path) -> Result<Vec<usize>> {
    values
        .into_iter()
        .enumerate()
        .map(|(i, v)| {
            if v.is_finite() && v >= 0.0 && v.fract() == 0.0 {
                Ok(v as usize)
            } else {
                Err(load_error(path, format!("peak {} is not a sample index: {}", i, v)))
            }
        })
        .collect()
}

pub fn load_signal(path: &Path, default_fs: f64) -> Result<Signal> {
    let file: SignalFile = read_json(path)?;
    let data = file.ecg.into_vec().map_err(|e| load_error(path, e))?;
    Signal::new(file.fs.unwrap_or(default_fs), data)
}

pub fn load_reference(path: &Path) -> Result<ReferenceRecord> {
    let file: ReferenceFile = read_json(path)?;
    let peaks = file.r_peaks.into_vec().map_err(|e| load_error(path, e))?;
    let r_peaks = PeakSet::new(to_indices(peaks, path)?)?;
    let heart_rate = match file.heart_rate {
        Some(hr) => Some(HeartRateSeries::new(
            hr.into_vec().map_err(|e| load_error(path, e))?,
        )?),
        None => None,
    };
    Ok(ReferenceRecord {
        r_peaks,
        heart_rate,
        sample_count: file.sample_count,
    })
}

pub fn load_detection(path: &Path) -> Result<Detection> {
    read_json(path)
}

/// Record id of a corpus file: `R_00012.json` and `data_00012.json` both give `00012`.
pub fn record_id(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    let (_, id) = stem.split_once('_')?;
    (!id.is_empty()).then(|| id.to_string())
}

fn reference_files(ref_dir: &Path) -> anyhow::Result<Vec<(String, PathBuf)>> {
    let mut out = Vec::new();
    for entry in fs::read_dir(ref_dir)
        .with_context(|| format!("failed to list {}", ref_dir.display()))?
    {
        let path = entry?.path();
        let is_reference = path.extension().map_or(false, |e| e == "json")
            && path
                .file_name()
                .and_then(|n| n.to_str())
                .map_or(false, |n| n.starts_with(REFERENCE_FILE_PREFIX));
        if !is_reference {
            continue;
        }
        match record_id(&path) {
            Some(id) => out.push((id, path)),
            None => warn!("skipping {}: no record id in file name", path.display()),
        }
    }
    out.sort();
    Ok(out)
}

fn load_record(id: &str, ref_path: &Path, data_dir: &Path, cfg: &RpeakConfig) -> Result<EvaluationRecord> {
    let data_path = data_dir.join(format!("{}{}.json", SIGNAL_FILE_PREFIX, id));
    let signal = load_signal(&data_path, cfg.scoring.sampling_rate_hz)?;
    let reference = load_reference(ref_path)?;
    let annotation = reference.into_annotation(signal.len(), signal.fs(), &cfg.detector.heart_rate);
    Ok(EvaluationRecord {
        id: id.to_string(),
        signal,
        annotation,
    })
}

/// Pair every `R_<id>.json` in `ref_dir` with `data_<id>.json` in `data_dir`.
///
/// Only an unreadable reference directory fails the call; a broken record
/// becomes a failed entry so the evaluation can report it.
pub fn load_corpus(data_dir: &Path, ref_dir: &Path, cfg: &RpeakConfig) -> anyhow::Result<Vec<CorpusEntry>> {
    let refs = reference_files(ref_dir)?;
    debug!("found {} reference files in {}", refs.len(), ref_dir.display());
    Ok(refs
        .into_iter()
        .map(|(id, ref_path)| match load_record(&id, &ref_path, data_dir, cfg) {
            Ok(record) => CorpusEntry::loaded(record),
            Err(err) => CorpusEntry::failed(id, err),
        })
        .collect())
}

fn load_stored(
    id: &str,
    ref_path: &Path,
    detection_dir: &Path,
    default_sample_count: usize,
    cfg: &RpeakConfig,
) -> Result<ScoredRecord> {
    let det_path = detection_dir.join(format!("{}{}.json", SIGNAL_FILE_PREFIX, id));
    let detection = load_detection(&det_path)?;
    let reference = load_reference(ref_path)?;
    let sample_count = reference.sample_count.unwrap_or(default_sample_count);
    let annotation = reference.into_annotation(
        sample_count,
        cfg.scoring.sampling_rate_hz,
        &cfg.detector.heart_rate,
    );
    Ok(ScoredRecord {
        id: id.to_string(),
        sample_count,
        annotation,
        detection,
    })
}

/// Pair every reference with a stored detection (`data_<id>.json` in
/// `detection_dir`). The record length comes from the reference's
/// `sample_count`, else `default_sample_count`.
///
/// As with [`load_corpus`], a missing or malformed file becomes a failed
/// entry; only an unreadable reference directory fails the call.
pub fn load_scored_records(
    detection_dir: &Path,
    ref_dir: &Path,
    default_sample_count: usize,
    cfg: &RpeakConfig,
) -> anyhow::Result<Vec<ScoredEntry>> {
    Ok(reference_files(ref_dir)?
        .into_iter()
        .map(|(id, ref_path)| {
            match load_stored(&id, &ref_path, detection_dir, default_sample_count, cfg) {
                Ok(record) => ScoredEntry::loaded(record),
                Err(err) => ScoredEntry::failed(id, err),
            }
        })
        .collect())
}
