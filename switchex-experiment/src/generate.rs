use rand::Rng;

use switchex_core::{Stimulus, TaskType};

/// Draw a fresh stimulus for one trial.
///
/// Digits are uniform 0-9 with replacement; targets are `complexity`
/// distinct digits drawn without replacement. When counting non-targets, a
/// draw with zero target occurrences would make the answer trivially equal
/// the string length, so the whole draw is rejected and repeated. The loop
/// is uncapped: with 10 digits per string a miss on every position is rare
/// even at complexity 1.
pub fn generate_stimulus<R: Rng>(
    rng: &mut R,
    complexity: u8,
    length: usize,
    task: TaskType,
) -> Stimulus {
    loop {
        let digits: String = (0..length)
            .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
            .collect();
        let targets: Vec<u8> = rand::seq::index::sample(rng, 10, complexity as usize)
            .iter()
            .map(|d| d as u8)
            .collect();
        let stimulus = Stimulus::new(digits, targets);

        if task == TaskType::CountTargets || stimulus.target_count() > 0 {
            return stimulus;
        }
    }
}
