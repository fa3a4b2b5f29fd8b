pub mod record;
pub mod report;
pub mod text;

pub use record::{load_corpus, load_detection, load_reference, load_signal, load_scored_records};
pub use report::{write_report, write_report_file};
pub use text::{parse_samples, read_samples};
