use tracing::info;

use ferrite_core::constants::{
    DIFFICULTY_ADJUSTMENT_INTERVAL, INITIAL_DIFFICULTY, MAX_DIFFICULTY, MIN_DIFFICULTY,
    TARGET_BLOCK_TIME_SECS,
};
use ferrite_core::Block;

/// Difficulty retargeting policy.
///
/// Every `adjustment_interval` blocks the actual time spent over the window
/// is compared against the expected time; a window mined in less than half
/// the expected time raises difficulty by one, more than double lowers it by
/// one, clamped to `[min_difficulty, max_difficulty]`.
#[derive(Debug, Clone)]
pub struct DifficultySchedule {
    /// Desired seconds between blocks.
    pub target_block_time: f64,
    /// Blocks per retargeting window.
    pub adjustment_interval: usize,
    pub min_difficulty: u32,
    pub max_difficulty: u32,
}

impl Default for DifficultySchedule {
    fn default() -> Self {
        Self {
            target_block_time: TARGET_BLOCK_TIME_SECS,
            adjustment_interval: DIFFICULTY_ADJUSTMENT_INTERVAL,
            min_difficulty: MIN_DIFFICULTY,
            max_difficulty: MAX_DIFFICULTY,
        }
    }
}

impl DifficultySchedule {
    /// Whether a chain of `chain_len` blocks is due for a retarget before
    /// the next block is built.
    pub fn should_retarget(&self, chain_len: usize) -> bool {
        chain_len % self.adjustment_interval == 0
    }

    /// Compute the difficulty for the next block from the most recent
    /// window. Chains shorter than one window keep the launch difficulty.
    pub fn adjust(&self, chain: &[Block]) -> u32 {
        if chain.len() < self.adjustment_interval {
            return INITIAL_DIFFICULTY;
        }

        let window = &chain[chain.len() - self.adjustment_interval..];
        let time_taken = window[window.len() - 1].timestamp - window[0].timestamp;
        let expected = self.target_block_time * (self.adjustment_interval as f64 - 1.0);
        let current = window[window.len() - 1].difficulty;

        let new = if time_taken < expected / 2.0 {
            (current + 1).min(self.max_difficulty)
        } else if time_taken > expected * 2.0 {
            current.saturating_sub(1).max(self.min_difficulty)
        } else {
            current
        };

        if new != current {
            info!(
                old = current,
                new,
                time_taken,
                expected,
                "difficulty retargeted"
            );
        }
        new
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrite_core::Block;

    /// A chain of empty blocks spaced `gap` seconds apart at `difficulty`.
    fn chain_with_gap(len: usize, gap: f64, difficulty: u32) -> Vec<Block> {
        (0..len)
            .map(|i| {
                Block::at_timestamp(
                    i as u64,
                    vec![],
                    0,
                    if i == 0 { "0".into() } else { format!("h{}", i - 1) },
                    "m".into(),
                    difficulty,
                    1_000_000.0 + gap * i as f64,
                )
            })
            .collect()
    }

    #[test]
    fn short_chain_keeps_launch_difficulty() {
        let schedule = DifficultySchedule::default();
        let chain = chain_with_gap(3, 10.0, 7);
        assert_eq!(schedule.adjust(&chain), INITIAL_DIFFICULTY);
    }

    #[test]
    fn fast_window_raises_difficulty() {
        let schedule = DifficultySchedule::default();
        // 1 s per block against a 10 s target: far under expected / 2.
        let chain = chain_with_gap(5, 1.0, 4);
        assert_eq!(schedule.adjust(&chain), 5);
    }

    #[test]
    fn slow_window_lowers_difficulty() {
        let schedule = DifficultySchedule::default();
        // 120 s per block: far over expected * 2.
        let chain = chain_with_gap(5, 120.0, 4);
        assert_eq!(schedule.adjust(&chain), 3);
    }

    #[test]
    fn on_target_window_is_unchanged() {
        let schedule = DifficultySchedule::default();
        let chain = chain_with_gap(5, 10.0, 4);
        assert_eq!(schedule.adjust(&chain), 4);
    }

    #[test]
    fn clamped_to_bounds() {
        let schedule = DifficultySchedule::default();
        let fast = chain_with_gap(5, 0.1, MAX_DIFFICULTY);
        assert_eq!(schedule.adjust(&fast), MAX_DIFFICULTY);

        let slow = chain_with_gap(5, 500.0, MIN_DIFFICULTY);
        assert_eq!(schedule.adjust(&slow), MIN_DIFFICULTY);
    }

    #[test]
    fn retarget_cadence() {
        let schedule = DifficultySchedule::default();
        assert!(schedule.should_retarget(5));
        assert!(schedule.should_retarget(10));
        assert!(!schedule.should_retarget(7));
    }
}
