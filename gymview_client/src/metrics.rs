//! Bounded rolling buffers for step history and per-episode statistics.

use serde::Serialize;
use std::collections::VecDeque;

use crate::protocol::TrainingUpdate;

/// Default bound on history and metric sequences.
pub const DEFAULT_HISTORY_CAPACITY: usize = 1000;

/// Fixed-capacity FIFO log: pushing beyond capacity evicts the oldest entry.
#[derive(Debug, Clone)]
pub struct RollingBuffer<T> {
    buf: VecDeque<T>,
    capacity: usize,
}

impl<T> RollingBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        // A zero bound would make every push a silent drop.
        let capacity = capacity.max(1);
        Self {
            buf: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, item: T) {
        if self.buf.len() == self.capacity {
            self.buf.pop_front();
        }
        self.buf.push_back(item);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    pub fn front(&self) -> Option<&T> {
        self.buf.front()
    }

    pub fn back(&self) -> Option<&T> {
        self.buf.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.buf.iter()
    }
}

impl<T: Clone> RollingBuffer<T> {
    pub fn to_vec(&self) -> Vec<T> {
        self.buf.iter().cloned().collect()
    }
}

/// Per-episode statistic sequences, evicted in lockstep with the history.
///
/// One update contributes one entry to each sequence, so the three lengths
/// are always equal.
#[derive(Debug, Clone)]
pub struct RollingMetrics {
    episode_rewards: RollingBuffer<f64>,
    cumulative_rewards: RollingBuffer<f64>,
    episode_lengths: RollingBuffer<u32>,
}

impl RollingMetrics {
    pub fn new(capacity: usize) -> Self {
        Self {
            episode_rewards: RollingBuffer::new(capacity),
            cumulative_rewards: RollingBuffer::new(capacity),
            episode_lengths: RollingBuffer::new(capacity),
        }
    }

    /// Fold one update into all three sequences.
    pub fn record(&mut self, update: &TrainingUpdate) {
        self.episode_rewards.push(update.reward);
        self.cumulative_rewards.push(update.cumulative_reward);
        self.episode_lengths.push(update.step);
    }

    pub fn len(&self) -> usize {
        self.episode_rewards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.episode_rewards.is_empty()
    }

    pub fn clear(&mut self) {
        self.episode_rewards.clear();
        self.cumulative_rewards.clear();
        self.episode_lengths.clear();
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            episode_rewards: self.episode_rewards.to_vec(),
            cumulative_rewards: self.cumulative_rewards.to_vec(),
            episode_lengths: self.episode_lengths.to_vec(),
        }
    }
}

/// Owned copy of the metric sequences, handed to consumers.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub episode_rewards: Vec<f64>,
    pub cumulative_rewards: Vec<f64>,
    pub episode_lengths: Vec<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::StateValue;
    use proptest::prelude::*;

    fn update(episode: u32, step: u32, reward: f64) -> TrainingUpdate {
        TrainingUpdate {
            episode,
            step,
            reward,
            cumulative_reward: reward,
            state: StateValue::Index(0),
            action: 0,
            value_function: None,
            policy: None,
        }
    }

    #[test]
    fn push_below_capacity_keeps_everything_in_order() {
        let mut buf = RollingBuffer::new(10);
        for i in 0..7 {
            buf.push(i);
        }
        assert_eq!(buf.len(), 7);
        assert_eq!(buf.to_vec(), (0..7).collect::<Vec<_>>());
    }

    #[test]
    fn push_beyond_capacity_evicts_oldest_first() {
        let mut buf = RollingBuffer::new(3);
        for i in 0..5 {
            buf.push(i);
        }
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.to_vec(), vec![2, 3, 4]);
        assert_eq!(buf.front(), Some(&2));
        assert_eq!(buf.back(), Some(&4));
    }

    #[test]
    fn metric_sequences_stay_in_lockstep() {
        let mut metrics = RollingMetrics::new(4);
        for i in 0..6u32 {
            metrics.record(&update(0, i, f64::from(i)));
        }
        let snap = metrics.snapshot();
        assert_eq!(snap.episode_rewards.len(), 4);
        assert_eq!(snap.cumulative_rewards.len(), 4);
        assert_eq!(snap.episode_lengths.len(), 4);
        assert_eq!(snap.episode_rewards, vec![2.0, 3.0, 4.0, 5.0]);
        assert_eq!(snap.episode_lengths, vec![2, 3, 4, 5]);
    }

    #[test]
    fn clear_empties_all_sequences() {
        let mut metrics = RollingMetrics::new(4);
        metrics.record(&update(0, 1, 1.0));
        metrics.clear();
        assert!(metrics.is_empty());
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
    }

    proptest! {
        #[test]
        fn buffer_always_holds_the_last_min_n_cap_items(
            n in 0usize..400,
            cap in 1usize..50,
        ) {
            let mut buf = RollingBuffer::new(cap);
            for i in 0..n {
                buf.push(i);
            }
            prop_assert_eq!(buf.len(), n.min(cap));
            let expected: Vec<usize> = (n.saturating_sub(cap)..n).collect();
            prop_assert_eq!(buf.to_vec(), expected);
        }
    }
}
