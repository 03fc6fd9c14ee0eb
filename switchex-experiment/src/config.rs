use std::path::PathBuf;
use std::time::Duration;

/// Fixed experiment parameters.
///
/// These are design constants of the study, not user configuration; the
/// struct exists so tests can redirect the data directory and shrink
/// nothing else.
#[derive(Debug, Clone)]
pub struct ExperimentConfig {
    pub data_dir: PathBuf,
    pub digit_string_len: usize,
    pub tutorial_complexity: u8,
    pub countdown: Duration,
    pub block_duration: Duration,
    pub break_duration: Duration,
    pub switch_banner: Duration,
    /// Substituted for unparsable submissions; outside the valid answer
    /// range, so such trials always score incorrect.
    pub invalid_answer_sentinel: i64,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("session_data"),
            digit_string_len: 10,
            tutorial_complexity: 2,
            countdown: Duration::from_secs(5),
            block_duration: Duration::from_secs(120),
            break_duration: Duration::from_secs(10),
            switch_banner: Duration::from_secs(1),
            invalid_answer_sentinel: -999,
        }
    }
}
