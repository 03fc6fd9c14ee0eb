use std::time::Duration;

use rand::Rng;
use tracing::{debug, info};

use switchex_core::{Condition, Phase, Snapshot, Stimulus, TaskType, TrialRecord};
use switchex_timing::Clock;

use crate::config::ExperimentConfig;
use crate::generate::generate_stimulus;
use crate::logger::{SessionError, SessionLog};
use crate::schedule::build_schedule;
use crate::tutorial::{Tutorial, TutorialOutcome};

/// Discrete events crossing the input boundary
#[derive(Copy, Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    Digit(u8),
    Backspace,
    Submit,
    Continue,
    StartExperiment,
    OpenTutorial,
    Quit,
}

/// Whether the session keeps running after an event
#[derive(Copy, Debug, Clone, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// The experiment state machine.
///
/// Owns the whole run state and mutates it only through [`tick`] (time-based
/// transitions, one clock read per call) and [`handle_input`] (discrete
/// events). The clock and random source are injected so transitions can be
/// driven deterministically in tests.
///
/// [`tick`]: Experiment::tick
/// [`handle_input`]: Experiment::handle_input
pub struct Experiment<C: Clock, R: Rng> {
    config: ExperimentConfig,
    clock: C,
    rng: R,
    phase: Phase,
    schedule: Vec<Condition>,
    condition_index: usize,
    task: TaskType,
    stimulus: Stimulus,
    input: String,
    trials_completed: u32,
    phase_entered_at: u64,
    condition_started_at: u64,
    last_switch_at: u64,
    switch_flash_at: Option<u64>,
    tutorial: Tutorial,
    log: Option<SessionLog>,
}

impl<C: Clock, R: Rng> Experiment<C, R> {
    pub fn new(config: ExperimentConfig, clock: C, mut rng: R) -> Self {
        let schedule = build_schedule(&mut rng);
        let first = schedule[0];
        let task = TaskType::default();
        let stimulus = generate_stimulus(&mut rng, first.complexity, config.digit_string_len, task);
        let now = clock.now();

        Self {
            config,
            clock,
            rng,
            phase: Phase::default(),
            schedule,
            condition_index: 0,
            task,
            stimulus,
            input: String::new(),
            trials_completed: 0,
            phase_entered_at: now,
            condition_started_at: now,
            last_switch_at: now,
            switch_flash_at: None,
            tutorial: Tutorial::new(),
            log: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn schedule(&self) -> &[Condition] {
        &self.schedule
    }

    pub fn trials_completed(&self) -> u32 {
        self.trials_completed
    }

    fn current_condition(&self) -> Option<Condition> {
        self.schedule.get(self.condition_index).copied()
    }

    /// Advance every time-based transition due at this tick.
    ///
    /// All deadlines are one-shot `elapsed >= duration` checks against a
    /// single clock read; nothing here performs I/O.
    pub fn tick(&mut self) {
        let now = self.clock.now();
        match self.phase {
            Phase::Countdown => {
                if elapsed(now, self.phase_entered_at) >= self.config.countdown {
                    self.phase = Phase::Running;
                    self.condition_started_at = now;
                    self.last_switch_at = now;
                    info!(block = self.condition_index + 1, "countdown over, block running");
                }
            }
            Phase::Running => self.tick_running(now),
            Phase::Break => {
                if elapsed(now, self.phase_entered_at) >= self.config.break_duration {
                    self.begin_next_condition(now);
                }
            }
            Phase::Start | Phase::Tutorial | Phase::Done => {}
        }
    }

    fn tick_running(&mut self, now: u64) {
        let Some(condition) = self.current_condition() else {
            return;
        };

        // Task switch first, block end second, mirroring a single pass per
        // tick: at most one switch can fire between two ticks.
        let interval = Duration::from_secs(condition.interval_secs);
        if elapsed(now, self.last_switch_at) >= interval {
            self.task = self.task.toggled();
            self.stimulus = generate_stimulus(
                &mut self.rng,
                condition.complexity,
                self.config.digit_string_len,
                self.task,
            );
            self.input.clear();
            self.last_switch_at = now;
            self.switch_flash_at = Some(now);
            debug!(task = ?self.task, "task switched");
        }

        if elapsed(now, self.condition_started_at) >= self.config.block_duration {
            self.condition_index += 1;
            if self.condition_index >= self.schedule.len() {
                self.phase = Phase::Done;
                info!(trials = self.trials_completed, "experiment complete");
            } else {
                self.phase = Phase::Break;
                self.phase_entered_at = now;
                info!(
                    completed = self.condition_index,
                    total = self.schedule.len(),
                    "block complete, entering break"
                );
            }
        }
    }

    /// Load the condition the break advanced to and resume running.
    fn begin_next_condition(&mut self, now: u64) {
        let Some(condition) = self.current_condition() else {
            return;
        };
        // The active task type carries across blocks; only the interval
        // cadence restarts.
        self.stimulus = generate_stimulus(
            &mut self.rng,
            condition.complexity,
            self.config.digit_string_len,
            self.task,
        );
        self.input.clear();
        self.condition_started_at = now;
        self.last_switch_at = now;
        self.phase = Phase::Running;
        info!(
            block = self.condition_index + 1,
            complexity = condition.complexity,
            interval_secs = condition.interval_secs,
            "break over, next block running"
        );
    }

    /// Apply one discrete input event.
    ///
    /// Quit is honored in every phase with no further side effects. The only
    /// fallible path is trial persistence, which is fatal.
    pub fn handle_input(&mut self, event: InputEvent) -> Result<Flow, SessionError> {
        if event == InputEvent::Quit {
            info!(phase = ?self.phase, "quit requested");
            return Ok(Flow::Exit);
        }

        match self.phase {
            Phase::Start => match event {
                InputEvent::StartExperiment => {
                    self.log = Some(SessionLog::create(&self.config.data_dir, &self.schedule)?);
                    self.phase = Phase::Countdown;
                    self.phase_entered_at = self.clock.now();
                }
                InputEvent::OpenTutorial => {
                    self.tutorial = Tutorial::new();
                    self.phase = Phase::Tutorial;
                }
                _ => {}
            },
            Phase::Tutorial => {
                let outcome = self.tutorial.handle(event, &mut self.rng, &self.config);
                if outcome == TutorialOutcome::Finished {
                    self.task = TaskType::CountTargets;
                    self.phase = Phase::Start;
                }
            }
            Phase::Running => match event {
                InputEvent::Digit(d) if d <= 9 => self.input.push(char::from(b'0' + d)),
                InputEvent::Backspace => {
                    self.input.pop();
                }
                InputEvent::Submit => self.submit()?,
                _ => {}
            },
            Phase::Countdown | Phase::Break | Phase::Done => {}
        }

        Ok(Flow::Continue)
    }

    /// Score the active stimulus, append exactly one record, and rearm the
    /// trial under the same task type. Empty submissions are ignored.
    fn submit(&mut self) -> Result<(), SessionError> {
        if self.input.is_empty() {
            return Ok(());
        }
        let Some(condition) = self.current_condition() else {
            return Ok(());
        };

        let actual = self.stimulus.answer(self.task);
        let answer = parse_answer(&self.input, self.config.invalid_answer_sentinel);
        self.trials_completed += 1;

        let record = TrialRecord {
            trial: self.trials_completed,
            complexity: condition.complexity,
            interval_secs: condition.interval_secs,
            task: self.task,
            actual_count: actual,
            user_answer: answer,
            correct: answer == actual,
        };
        self.log
            .as_mut()
            .ok_or(SessionError::NotOpen)?
            .append(&record)?;

        self.stimulus = generate_stimulus(
            &mut self.rng,
            condition.complexity,
            self.config.digit_string_len,
            self.task,
        );
        self.input.clear();
        Ok(())
    }

    /// Read-only view for the presentation layer.
    pub fn snapshot(&self) -> Snapshot {
        let now = self.clock.now();
        let phase_remaining = match self.phase {
            Phase::Countdown => remaining(self.config.countdown, now, self.phase_entered_at),
            Phase::Break => remaining(self.config.break_duration, now, self.phase_entered_at),
            Phase::Running => remaining(self.config.block_duration, now, self.condition_started_at),
            Phase::Start | Phase::Tutorial | Phase::Done => Duration::ZERO,
        };
        let block_elapsed = if self.phase == Phase::Running {
            elapsed(now, self.condition_started_at).min(self.config.block_duration)
        } else {
            Duration::ZERO
        };

        Snapshot {
            phase: self.phase,
            condition_index: self.condition_index,
            condition_total: self.schedule.len(),
            condition: self.current_condition(),
            task: self.task,
            stimulus: self.stimulus.clone(),
            input: self.input.clone(),
            phase_remaining,
            block_elapsed,
            block_total: self.config.block_duration,
            switch_flash: self
                .switch_flash_at
                .is_some_and(|at| elapsed(now, at) < self.config.switch_banner),
            trials_completed: self.trials_completed,
            tutorial: (self.phase == Phase::Tutorial).then(|| self.tutorial.snapshot()),
        }
    }
}

fn elapsed(now: u64, since: u64) -> Duration {
    Duration::from_nanos(now.saturating_sub(since))
}

fn remaining(total: Duration, now: u64, since: u64) -> Duration {
    total.saturating_sub(elapsed(now, since))
}

/// An unparsable submission (in practice an overflowing digit run) scores as
/// the sentinel, which lies outside the valid answer range and is therefore
/// always wrong. The true answer is still logged in `actual_count`.
pub(crate) fn parse_answer(input: &str, sentinel: i64) -> i64 {
    input.parse::<i64>().unwrap_or(sentinel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::fs;
    use std::time::Duration;
    use switchex_timing::ManualClock;
    use tempfile::TempDir;

    const SECOND: Duration = Duration::from_secs(1);

    fn experiment(dir: &TempDir, seed: u64) -> (Experiment<ManualClock, StdRng>, ManualClock) {
        let config = ExperimentConfig {
            data_dir: dir.path().to_path_buf(),
            ..ExperimentConfig::default()
        };
        let clock = ManualClock::new();
        let exp = Experiment::new(config, clock.clone(), StdRng::seed_from_u64(seed));
        (exp, clock)
    }

    fn start_running(exp: &mut Experiment<ManualClock, StdRng>, clock: &ManualClock) {
        exp.handle_input(InputEvent::StartExperiment).unwrap();
        assert_eq!(exp.phase(), Phase::Countdown);
        clock.advance(5 * SECOND);
        exp.tick();
        assert_eq!(exp.phase(), Phase::Running);
    }

    fn type_number(exp: &mut Experiment<ManualClock, StdRng>, n: i64) {
        for b in n.to_string().bytes() {
            exp.handle_input(InputEvent::Digit(b - b'0')).unwrap();
        }
    }

    fn log_lines(dir: &TempDir) -> Vec<String> {
        let csv = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .find(|p| p.extension().is_some_and(|ext| ext == "csv"))
            .expect("session log exists");
        fs::read_to_string(csv)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn countdown_holds_until_five_seconds() {
        let dir = TempDir::new().unwrap();
        let (mut exp, clock) = experiment(&dir, 1);
        exp.handle_input(InputEvent::StartExperiment).unwrap();

        clock.advance(5 * SECOND - Duration::from_nanos(1));
        exp.tick();
        assert_eq!(exp.phase(), Phase::Countdown);

        clock.advance(Duration::from_nanos(1));
        exp.tick();
        assert_eq!(exp.phase(), Phase::Running);
    }

    #[test]
    fn task_switch_fires_at_threshold_not_before() {
        let dir = TempDir::new().unwrap();
        let (mut exp, clock) = experiment(&dir, 2);
        start_running(&mut exp, &clock);

        let interval = exp.snapshot().condition.unwrap().interval_secs;
        let before = exp.snapshot().task;

        clock.advance(Duration::from_secs(interval) - Duration::from_nanos(1));
        exp.tick();
        assert_eq!(exp.snapshot().task, before);

        clock.advance(Duration::from_nanos(1));
        exp.tick();
        assert_eq!(exp.snapshot().task, before.toggled());
        assert!(exp.snapshot().switch_flash);
    }

    #[test]
    fn task_switch_never_fires_twice_in_one_tick() {
        let dir = TempDir::new().unwrap();
        let (mut exp, clock) = experiment(&dir, 3);
        start_running(&mut exp, &clock);

        let interval = exp.snapshot().condition.unwrap().interval_secs;
        let before = exp.snapshot().task;

        // Two full intervals elapse, but a single tick toggles at most once.
        clock.advance(Duration::from_secs(2 * interval));
        exp.tick();
        assert_eq!(exp.snapshot().task, before.toggled());

        exp.tick();
        assert_eq!(exp.snapshot().task, before.toggled());
    }

    #[test]
    fn task_switch_clears_input_and_regenerates() {
        let dir = TempDir::new().unwrap();
        let (mut exp, clock) = experiment(&dir, 4);
        start_running(&mut exp, &clock);

        type_number(&mut exp, 12);
        assert_eq!(exp.snapshot().input, "12");
        let stimulus_before = exp.snapshot().stimulus;

        let interval = exp.snapshot().condition.unwrap().interval_secs;
        clock.advance(Duration::from_secs(interval));
        exp.tick();

        let snap = exp.snapshot();
        assert!(snap.input.is_empty());
        assert_ne!(snap.stimulus, stimulus_before);
    }

    #[test]
    fn correct_submission_is_logged_and_counted() {
        let dir = TempDir::new().unwrap();
        let (mut exp, clock) = experiment(&dir, 5);
        start_running(&mut exp, &clock);

        let snap = exp.snapshot();
        let answer = snap.stimulus.answer(snap.task);
        type_number(&mut exp, answer);
        exp.handle_input(InputEvent::Submit).unwrap();

        assert_eq!(exp.trials_completed(), 1);
        let lines = log_lines(&dir);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], format!("1,{},{},{},{answer},{answer},1",
            snap.condition.unwrap().complexity,
            snap.condition.unwrap().interval_secs,
            snap.task.code()));

        // A fresh stimulus is armed for the same task type.
        let after = exp.snapshot();
        assert!(after.input.is_empty());
        assert_eq!(after.task, snap.task);
    }

    #[test]
    fn wrong_submission_scores_zero_with_true_answer_logged() {
        let dir = TempDir::new().unwrap();
        let (mut exp, clock) = experiment(&dir, 6);
        start_running(&mut exp, &clock);

        let snap = exp.snapshot();
        let actual = snap.stimulus.answer(snap.task);
        // Valid answers never exceed the string length, so 99 is always wrong.
        type_number(&mut exp, 99);
        exp.handle_input(InputEvent::Submit).unwrap();

        let lines = log_lines(&dir);
        let fields: Vec<&str> = lines[1].split(',').collect();
        assert_eq!(fields[4], actual.to_string());
        assert_eq!(fields[5], "99");
        assert_eq!(fields[6], "0");
    }

    #[test]
    fn unparsable_submission_becomes_the_sentinel() {
        let dir = TempDir::new().unwrap();
        let (mut exp, clock) = experiment(&dir, 7);
        start_running(&mut exp, &clock);

        let snap = exp.snapshot();
        let actual = snap.stimulus.answer(snap.task);
        // 25 nines overflow i64; the parse failure becomes the sentinel.
        for _ in 0..25 {
            exp.handle_input(InputEvent::Digit(9)).unwrap();
        }
        exp.handle_input(InputEvent::Submit).unwrap();

        let lines = log_lines(&dir);
        let fields: Vec<&str> = lines[1].split(',').collect();
        assert_eq!(fields[4], actual.to_string());
        assert_eq!(fields[5], "-999");
        assert_eq!(fields[6], "0");
    }

    #[test]
    fn empty_submission_is_ignored() {
        let dir = TempDir::new().unwrap();
        let (mut exp, clock) = experiment(&dir, 8);
        start_running(&mut exp, &clock);

        exp.handle_input(InputEvent::Submit).unwrap();
        assert_eq!(exp.trials_completed(), 0);
        assert_eq!(log_lines(&dir).len(), 1);
    }

    #[test]
    fn backspace_edits_the_buffer() {
        let dir = TempDir::new().unwrap();
        let (mut exp, clock) = experiment(&dir, 9);
        start_running(&mut exp, &clock);

        type_number(&mut exp, 123);
        exp.handle_input(InputEvent::Backspace).unwrap();
        assert_eq!(exp.snapshot().input, "12");

        // Backspace on an empty buffer is a no-op.
        exp.handle_input(InputEvent::Backspace).unwrap();
        exp.handle_input(InputEvent::Backspace).unwrap();
        exp.handle_input(InputEvent::Backspace).unwrap();
        assert_eq!(exp.snapshot().input, "");
    }

    #[test]
    fn block_end_enters_break_and_advances_condition() {
        let dir = TempDir::new().unwrap();
        let (mut exp, clock) = experiment(&dir, 10);
        start_running(&mut exp, &clock);

        clock.advance(120 * SECOND);
        exp.tick();
        assert_eq!(exp.phase(), Phase::Break);
        assert_eq!(exp.snapshot().condition_index, 1);
    }

    #[test]
    fn break_shorter_than_ten_seconds_changes_nothing() {
        let dir = TempDir::new().unwrap();
        let (mut exp, clock) = experiment(&dir, 11);
        start_running(&mut exp, &clock);
        clock.advance(120 * SECOND);
        exp.tick();

        let before = exp.snapshot();
        clock.advance(10 * SECOND - Duration::from_nanos(1));
        exp.tick();
        let after = exp.snapshot();
        assert_eq!(after.phase, Phase::Break);
        assert_eq!(after.condition_index, before.condition_index);
        assert_eq!(after.stimulus, before.stimulus);
    }

    #[test]
    fn break_resumes_with_fresh_stimulus_and_empty_input() {
        let dir = TempDir::new().unwrap();
        let (mut exp, clock) = experiment(&dir, 12);
        start_running(&mut exp, &clock);
        type_number(&mut exp, 7);
        clock.advance(120 * SECOND);
        exp.tick();
        let during_break = exp.snapshot().stimulus;

        clock.advance(10 * SECOND);
        exp.tick();

        let snap = exp.snapshot();
        assert_eq!(snap.phase, Phase::Running);
        assert!(snap.input.is_empty());
        assert_ne!(snap.stimulus, during_break);
        let condition = snap.condition.unwrap();
        assert_eq!(snap.stimulus.targets.len(), condition.complexity as usize);
    }

    #[test]
    fn ninth_block_ends_in_done() {
        let dir = TempDir::new().unwrap();
        let (mut exp, clock) = experiment(&dir, 13);
        start_running(&mut exp, &clock);

        for block in 0..9 {
            assert_eq!(exp.phase(), Phase::Running, "block {block}");
            clock.advance(120 * SECOND);
            exp.tick();
            if block < 8 {
                assert_eq!(exp.phase(), Phase::Break);
                clock.advance(10 * SECOND);
                exp.tick();
            }
        }
        assert_eq!(exp.phase(), Phase::Done);

        // Further time passing is inert in the terminal state.
        clock.advance(1000 * SECOND);
        exp.tick();
        assert_eq!(exp.phase(), Phase::Done);
    }

    #[test]
    fn quit_exits_from_every_phase() {
        let dir = TempDir::new().unwrap();
        let (mut exp, _clock) = experiment(&dir, 14);
        assert_eq!(exp.handle_input(InputEvent::Quit).unwrap(), Flow::Exit);

        exp.handle_input(InputEvent::OpenTutorial).unwrap();
        assert_eq!(exp.phase(), Phase::Tutorial);
        assert_eq!(exp.handle_input(InputEvent::Quit).unwrap(), Flow::Exit);

        let dir2 = TempDir::new().unwrap();
        let (mut exp2, clock2) = experiment(&dir2, 14);
        start_running(&mut exp2, &clock2);
        assert_eq!(exp2.handle_input(InputEvent::Quit).unwrap(), Flow::Exit);

        clock2.advance(120 * SECOND);
        exp2.tick();
        assert_eq!(exp2.phase(), Phase::Break);
        assert_eq!(exp2.handle_input(InputEvent::Quit).unwrap(), Flow::Exit);
    }

    #[test]
    fn quit_mid_trial_writes_no_partial_record() {
        let dir = TempDir::new().unwrap();
        let (mut exp, clock) = experiment(&dir, 15);
        start_running(&mut exp, &clock);

        type_number(&mut exp, 4);
        assert_eq!(exp.handle_input(InputEvent::Quit).unwrap(), Flow::Exit);
        assert_eq!(log_lines(&dir).len(), 1);
        assert_eq!(exp.trials_completed(), 0);
    }

    #[test]
    fn pointer_activation_is_inert_outside_start() {
        let dir = TempDir::new().unwrap();
        let (mut exp, clock) = experiment(&dir, 16);
        start_running(&mut exp, &clock);

        exp.handle_input(InputEvent::StartExperiment).unwrap();
        exp.handle_input(InputEvent::OpenTutorial).unwrap();
        assert_eq!(exp.phase(), Phase::Running);
    }

    #[test]
    fn tutorial_round_trip_resets_task_type() {
        let dir = TempDir::new().unwrap();
        let (mut exp, _clock) = experiment(&dir, 17);

        exp.handle_input(InputEvent::OpenTutorial).unwrap();
        assert_eq!(exp.phase(), Phase::Tutorial);

        for _ in 0..2 {
            // Explanation -> practice.
            exp.handle_input(InputEvent::Continue).unwrap();
            let tut = exp.snapshot().tutorial.unwrap();
            let stimulus = tut.stimulus.unwrap();
            type_number(&mut exp, stimulus.answer(tut.task));
            exp.handle_input(InputEvent::Submit).unwrap();
            assert_eq!(
                exp.snapshot().tutorial.unwrap().feedback,
                switchex_core::Feedback::Correct
            );
            exp.handle_input(InputEvent::Continue).unwrap();
        }

        assert_eq!(exp.phase(), Phase::Start);
        assert_eq!(exp.snapshot().task, TaskType::CountTargets);
    }

    #[test]
    fn parse_answer_falls_back_to_sentinel() {
        assert_eq!(parse_answer("42", -999), 42);
        assert_eq!(parse_answer("", -999), -999);
        assert_eq!(parse_answer("9999999999999999999999999", -999), -999);
    }
}
