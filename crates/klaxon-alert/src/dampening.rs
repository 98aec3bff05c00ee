//! Dampening state machine: turns a stream of per-cycle "condition set
//! matched" signals into at most one fire per satisfied accumulation, then
//! resets. One instance exists per loaded (trigger, mode).

use chrono::{DateTime, Duration, Utc};
use klaxon_common::condition::ConditionEval;
use klaxon_common::dampening::{Dampening, DampeningType};
use std::collections::VecDeque;
use std::mem;

/// One recorded evaluation cycle within a relaxed window.
struct Cycle {
    at: DateTime<Utc>,
    matched: bool,
    evals: Vec<ConditionEval>,
}

/// Accumulation state for one (trigger, mode).
///
/// - Strict: `eval_true` consecutive matched cycles; any unmatched cycle
///   resets the streak.
/// - RelaxedCount: `eval_true` matched cycles among the most recent
///   `eval_total` cycles.
/// - RelaxedTime: `eval_true` matched cycles within the trailing
///   `window_ms` milliseconds of cycle time.
///
/// [`DampeningState::step`] yields the matched cycles' eval sets exactly
/// once when the policy is satisfied and clears all accumulation.
pub struct DampeningState {
    dampening_type: DampeningType,
    eval_true: u32,
    eval_total: u32,
    window_ms: i64,
    streak: u32,
    satisfying: Vec<Vec<ConditionEval>>,
    history: VecDeque<Cycle>,
}

impl DampeningState {
    pub fn for_policy(policy: &Dampening) -> Self {
        Self {
            dampening_type: policy.dampening_type,
            eval_true: policy.eval_true_setting,
            eval_total: policy.eval_total_setting,
            window_ms: policy.eval_time_setting,
            streak: 0,
            satisfying: Vec::new(),
            history: VecDeque::new(),
        }
    }

    /// The policy used when a (trigger, mode) has no stored dampening:
    /// strict, firing on the first matched cycle.
    pub fn default_strict() -> Self {
        Self {
            dampening_type: DampeningType::Strict,
            eval_true: 1,
            eval_total: 0,
            window_ms: 0,
            streak: 0,
            satisfying: Vec::new(),
            history: VecDeque::new(),
        }
    }

    /// Feeds one evaluation cycle into the machine. Returns the accumulated
    /// satisfying eval sets when this cycle completes the policy, `None`
    /// otherwise.
    pub fn step(
        &mut self,
        matched: bool,
        at: DateTime<Utc>,
        evals: Vec<ConditionEval>,
    ) -> Option<Vec<Vec<ConditionEval>>> {
        match self.dampening_type {
            DampeningType::Strict => {
                if !matched {
                    self.streak = 0;
                    self.satisfying.clear();
                    return None;
                }
                self.streak += 1;
                self.satisfying.push(evals);
                if self.streak >= self.eval_true {
                    self.streak = 0;
                    return Some(mem::take(&mut self.satisfying));
                }
                None
            }
            DampeningType::RelaxedCount => {
                self.history.push_back(Cycle { at, matched, evals });
                while self.history.len() > self.eval_total as usize {
                    self.history.pop_front();
                }
                self.fire_from_history()
            }
            DampeningType::RelaxedTime => {
                let cutoff = at - Duration::milliseconds(self.window_ms);
                self.history.push_back(Cycle { at, matched, evals });
                while self.history.front().is_some_and(|c| c.at < cutoff) {
                    self.history.pop_front();
                }
                self.fire_from_history()
            }
        }
    }

    /// Discards all accumulation, as on a policy change or mode switch.
    pub fn reset(&mut self) {
        self.streak = 0;
        self.satisfying.clear();
        self.history.clear();
    }

    fn fire_from_history(&mut self) -> Option<Vec<Vec<ConditionEval>>> {
        let trues = self.history.iter().filter(|c| c.matched).count();
        if trues < self.eval_true as usize {
            return None;
        }
        let sets = self
            .history
            .drain(..)
            .filter(|c| c.matched)
            .map(|c| c.evals)
            .collect();
        Some(sets)
    }
}
