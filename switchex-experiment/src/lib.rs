pub mod config;
pub mod generate;
pub mod logger;
pub mod schedule;
pub mod state;
pub mod tutorial;

pub use config::ExperimentConfig;
pub use generate::generate_stimulus;
pub use logger::{SessionError, SessionLog};
pub use schedule::build_schedule;
pub use state::{Experiment, Flow, InputEvent};
pub use tutorial::{Tutorial, TutorialOutcome};
