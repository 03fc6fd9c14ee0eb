use std::time::Duration;

use crate::condition::Condition;
use crate::phase::{Phase, TutorialStep};
use crate::stimulus::{Stimulus, TaskType};

/// Outcome shown after a practice submission
#[derive(Copy, Debug, Clone, PartialEq, Eq)]
pub enum Feedback {
    None,
    Correct,
    Incorrect,
}

impl Default for Feedback {
    fn default() -> Self {
        Feedback::None
    }
}

/// Read-only view of the tutorial sub-state
#[derive(Debug, Clone, PartialEq)]
pub struct TutorialSnapshot {
    pub step: TutorialStep,
    pub task: TaskType,
    pub stimulus: Option<Stimulus>,
    pub input: String,
    pub feedback: Feedback,
}

/// Everything the presentation layer needs to draw one frame.
///
/// Produced on demand by the state machine after every mutation; holds no
/// references back into the run state.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub phase: Phase,
    pub condition_index: usize,
    pub condition_total: usize,
    /// Active condition; `None` once the schedule is exhausted.
    pub condition: Option<Condition>,
    pub task: TaskType,
    pub stimulus: Stimulus,
    pub input: String,
    /// Time left in a countdown or break; zero elsewhere.
    pub phase_remaining: Duration,
    pub block_elapsed: Duration,
    pub block_total: Duration,
    /// True while the transient "task switched" banner should show.
    pub switch_flash: bool,
    pub trials_completed: u32,
    pub tutorial: Option<TutorialSnapshot>,
}
