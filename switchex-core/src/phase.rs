/// Top-level phases of an experiment session
#[derive(Copy, Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Start,
    Tutorial,
    Countdown,
    Running,
    Break,
    Done,
}

impl Default for Phase {
    fn default() -> Self {
        Phase::Start
    }
}

/// Steps of the guided tutorial, in order
#[derive(Copy, Debug, Clone, PartialEq, Eq)]
pub enum TutorialStep {
    ExplainTargets,
    PracticeTargets,
    ExplainNonTargets,
    PracticeNonTargets,
}

impl Default for TutorialStep {
    fn default() -> Self {
        TutorialStep::ExplainTargets
    }
}
