use rand::Rng;
use tracing::debug;

use switchex_core::{Feedback, Stimulus, TaskType, TutorialSnapshot, TutorialStep};

use crate::config::ExperimentConfig;
use crate::generate::generate_stimulus;
use crate::state::{InputEvent, parse_answer};

/// Whether the tutorial is still running after an event
#[derive(Copy, Debug, Clone, PartialEq, Eq)]
pub enum TutorialOutcome {
    InProgress,
    Finished,
}

/// Guided practice flow: explanation and practice for each counting rule.
///
/// Holds its own task type, stimulus, input buffer and feedback, so walking
/// through it can never disturb the main run state, counters, or the
/// session log.
#[derive(Debug, Default)]
pub struct Tutorial {
    step: TutorialStep,
    task: TaskType,
    stimulus: Option<Stimulus>,
    input: String,
    feedback: Feedback,
}

impl Tutorial {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle<R: Rng>(
        &mut self,
        event: InputEvent,
        rng: &mut R,
        config: &ExperimentConfig,
    ) -> TutorialOutcome {
        match self.step {
            TutorialStep::ExplainTargets | TutorialStep::ExplainNonTargets => {
                if event == InputEvent::Continue {
                    self.begin_practice(rng, config);
                }
            }
            TutorialStep::PracticeTargets | TutorialStep::PracticeNonTargets => {
                if self.feedback == Feedback::Correct {
                    // Locked until the participant continues.
                    if event == InputEvent::Continue {
                        if self.step == TutorialStep::PracticeTargets {
                            self.step = TutorialStep::ExplainNonTargets;
                            self.stimulus = None;
                            self.input.clear();
                            self.feedback = Feedback::None;
                        } else {
                            debug!("tutorial finished");
                            return TutorialOutcome::Finished;
                        }
                    }
                } else {
                    match event {
                        InputEvent::Digit(d) if d <= 9 => self.input.push(char::from(b'0' + d)),
                        InputEvent::Backspace => {
                            self.input.pop();
                        }
                        InputEvent::Submit => self.check_answer(config),
                        _ => {}
                    }
                }
            }
        }
        TutorialOutcome::InProgress
    }

    fn begin_practice<R: Rng>(&mut self, rng: &mut R, config: &ExperimentConfig) {
        self.task = match self.step {
            TutorialStep::ExplainTargets => TaskType::CountTargets,
            _ => TaskType::CountNonTargets,
        };
        self.stimulus = Some(generate_stimulus(
            rng,
            config.tutorial_complexity,
            config.digit_string_len,
            self.task,
        ));
        self.input.clear();
        self.feedback = Feedback::None;
        self.step = match self.step {
            TutorialStep::ExplainTargets => TutorialStep::PracticeTargets,
            _ => TutorialStep::PracticeNonTargets,
        };
    }

    /// An incorrect answer clears the input and keeps the participant on the
    /// same practice step for a retry; nothing is ever logged.
    fn check_answer(&mut self, config: &ExperimentConfig) {
        if self.input.is_empty() {
            return;
        }
        let Some(stimulus) = &self.stimulus else {
            return;
        };
        let answer = parse_answer(&self.input, config.invalid_answer_sentinel);
        if answer == stimulus.answer(self.task) {
            self.feedback = Feedback::Correct;
        } else {
            self.feedback = Feedback::Incorrect;
            self.input.clear();
        }
    }

    pub fn snapshot(&self) -> TutorialSnapshot {
        TutorialSnapshot {
            step: self.step,
            task: self.task,
            stimulus: self.stimulus.clone(),
            input: self.input.clone(),
            feedback: self.feedback,
        }
    }
}
