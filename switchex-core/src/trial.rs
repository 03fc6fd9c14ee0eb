use serde::{Deserialize, Serialize};

use crate::stimulus::TaskType;

/// Recorded result per submitted answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialRecord {
    pub trial: u32,
    pub complexity: u8,
    pub interval_secs: u64,
    pub task: TaskType,
    pub actual_count: i64,
    pub user_answer: i64,
    pub correct: bool,
}

impl TrialRecord {
    pub const CSV_HEADER: &'static str =
        "trial,complexity,interval,task_type,actual_count,user_answer,correct";

    pub fn csv_row(&self) -> String {
        format!(
            "{},{},{},{},{},{},{}",
            self.trial,
            self.complexity,
            self.interval_secs,
            self.task.code(),
            self.actual_count,
            self.user_answer,
            self.correct as u8
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_row_matches_header_shape() {
        let record = TrialRecord {
            trial: 3,
            complexity: 2,
            interval_secs: 20,
            task: TaskType::CountNonTargets,
            actual_count: 6,
            user_answer: -999,
            correct: false,
        };
        assert_eq!(record.csv_row(), "3,2,20,2,6,-999,0");
        assert_eq!(
            record.csv_row().split(',').count(),
            TrialRecord::CSV_HEADER.split(',').count()
        );
    }
}
