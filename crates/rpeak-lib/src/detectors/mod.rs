pub mod ecg;
pub mod heart_rate;

pub use ecg::{detect_r_peaks, run_detection, Detection, EcgPipelineConfig};
pub use heart_rate::{windowed_heart_rate, HeartRateConfig};
