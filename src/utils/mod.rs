//! Small helpers shared by the pipeline stages

pub mod jitter;
pub mod status_code_matcher;

pub use status_code_matcher::is_status_acceptable;
