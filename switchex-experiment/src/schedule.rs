use rand::Rng;
use rand::seq::SliceRandom;

use switchex_core::{COMPLEXITIES, Condition, INTERVALS};

/// Block-randomized 3x3 factorial schedule.
///
/// Complexity order is one uniform permutation; within each complexity
/// block the interval order is an independent permutation. Every
/// (complexity, interval) pair appears exactly once, and conditions sharing
/// a complexity are contiguous.
pub fn build_schedule<R: Rng>(rng: &mut R) -> Vec<Condition> {
    let mut complexities = COMPLEXITIES;
    complexities.shuffle(rng);

    let mut schedule = Vec::with_capacity(COMPLEXITIES.len() * INTERVALS.len());
    for &complexity in &complexities {
        let mut intervals = INTERVALS;
        intervals.shuffle(rng);
        for &interval_secs in &intervals {
            schedule.push(Condition {
                complexity,
                interval_secs,
            });
        }
    }
    schedule
}
