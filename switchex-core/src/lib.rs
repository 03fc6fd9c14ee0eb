pub mod condition;
pub mod phase;
pub mod snapshot;
pub mod stimulus;
pub mod trial;

pub use condition::{COMPLEXITIES, Condition, INTERVALS};
pub use phase::{Phase, TutorialStep};
pub use snapshot::{Feedback, Snapshot, TutorialSnapshot};
pub use stimulus::{Stimulus, TaskType};
pub use trial::TrialRecord;
