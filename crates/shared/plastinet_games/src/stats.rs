use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

const RECENT_CAPACITY: usize = 200;
const MIN_TRIALS_FOR_MILESTONE: u32 = 20;

/// Agreement between a network's choices and the oracle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameStats {
    pub correct: u32,
    pub incorrect: u32,
    /// Chosen cell was occupied; also counted in `incorrect`.
    pub illegal: u32,
    pub trials: u32,
    pub recent: VecDeque<bool>,
    pub learning_at_trial: Option<u32>,
    pub learned_at_trial: Option<u32>,
    pub mastered_at_trial: Option<u32>,
}

impl GameStats {
    pub fn new() -> Self {
        Self {
            correct: 0,
            incorrect: 0,
            illegal: 0,
            trials: 0,
            recent: VecDeque::with_capacity(RECENT_CAPACITY),
            learning_at_trial: None,
            learned_at_trial: None,
            mastered_at_trial: None,
        }
    }

    fn update_milestones(&mut self) {
        // Tiny samples never count as mastery.
        if self.trials < MIN_TRIALS_FOR_MILESTONE {
            return;
        }

        let r = self.last_100_rate();
        if self.learning_at_trial.is_none() && r >= 0.70 {
            self.learning_at_trial = Some(self.trials);
        }
        if self.learned_at_trial.is_none() && r >= 0.85 {
            self.learned_at_trial = Some(self.trials);
        }
        if self.mastered_at_trial.is_none() && r >= 0.95 {
            self.mastered_at_trial = Some(self.trials);
        }
    }

    pub fn record_trial(&mut self, is_correct: bool) {
        if is_correct {
            self.correct += 1;
        } else {
            self.incorrect += 1;
        }

        self.recent.push_back(is_correct);
        if self.recent.len() > RECENT_CAPACITY {
            self.recent.pop_front();
        }

        self.trials += 1;
        self.update_milestones();
    }

    pub fn record_illegal(&mut self) {
        self.illegal += 1;
        self.record_trial(false);
    }

    pub fn accuracy(&self) -> f32 {
        let total = self.correct + self.incorrect;
        if total == 0 {
            0.0
        } else {
            self.correct as f32 / total as f32
        }
    }

    pub fn recent_rate(&self) -> f32 {
        if self.recent.is_empty() {
            return 0.0;
        }
        let correct_count = self.recent.iter().filter(|&&x| x).count();
        correct_count as f32 / self.recent.len() as f32
    }

    pub fn last_100_rate(&self) -> f32 {
        if self.recent.len() < 10 {
            return self.recent_rate();
        }
        let skip = self.recent.len().saturating_sub(100);
        let window = self.recent.len() - skip;
        let correct_count = self.recent.iter().skip(skip).filter(|&&x| x).count();
        correct_count as f32 / window as f32
    }
}

impl Default for GameStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_stats_read_zero() {
        let s = GameStats::new();
        assert_eq!(s.accuracy(), 0.0);
        assert_eq!(s.recent_rate(), 0.0);
    }

    #[test]
    fn recent_window_is_bounded() {
        let mut s = GameStats::new();
        for i in 0..500 {
            s.record_trial(i % 2 == 0);
        }
        assert_eq!(s.trials, 500);
        assert_eq!(s.recent.len(), RECENT_CAPACITY);
        assert!((s.accuracy() - 0.5).abs() < 1e-6);
        assert!((s.last_100_rate() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn milestones_wait_for_enough_trials() {
        let mut s = GameStats::new();
        for _ in 0..19 {
            s.record_trial(true);
        }
        assert_eq!(s.mastered_at_trial, None);
        s.record_trial(true);
        assert_eq!(s.learning_at_trial, Some(20));
        assert_eq!(s.mastered_at_trial, Some(20));
    }

    #[test]
    fn illegal_moves_count_as_incorrect() {
        let mut s = GameStats::new();
        s.record_illegal();
        s.record_trial(true);
        assert_eq!(s.illegal, 1);
        assert_eq!(s.incorrect, 1);
        assert!((s.accuracy() - 0.5).abs() < 1e-6);
    }
}
