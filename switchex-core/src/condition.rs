use serde::{Deserialize, Serialize};

/// Complexity levels crossed with switch intervals form the 3x3 design.
pub const COMPLEXITIES: [u8; 3] = [1, 2, 3];
pub const INTERVALS: [u64; 3] = [10, 20, 30];

/// One 120-second block: how many target digits, and how often the rule flips
#[derive(Copy, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub complexity: u8,
    pub interval_secs: u64,
}
