use crate::domain::types::Decision;
use std::collections::VecDeque;

/// One observation in a symbol's signal-stability ring (spec §3).
#[derive(Debug, Clone, Copy)]
pub struct SignalObservation {
    pub timestamp: i64,
    pub decision: Decision,
    pub confidence: f64,
}

/// Bounded ring of recent signals for one symbol, used for stability and
/// quick-exit checks (spec §3, §4.I steps 4/7/8). Window is time-based (30s
/// per spec) layered over a capacity bound so memory stays flat regardless
/// of tick rate.
#[derive(Debug, Clone)]
pub struct SignalHistory {
    window_millis: i64,
    observations: VecDeque<SignalObservation>,
}

impl SignalHistory {
    pub fn new(window_millis: i64) -> Self {
        Self {
            window_millis,
            observations: VecDeque::new(),
        }
    }

    pub fn push(&mut self, obs: SignalObservation) {
        self.observations.push_back(obs);
        self.evict_stale(obs.timestamp);
    }

    fn evict_stale(&mut self, now: i64) {
        while let Some(front) = self.observations.front() {
            if now - front.timestamp > self.window_millis {
                self.observations.pop_front();
            } else {
                break;
            }
        }
    }

    /// True if the last `n` observations are all `decision` (signal stability, spec §4.F/§4.I).
    pub fn stable_for(&self, decision: Decision, n: usize) -> bool {
        if n == 0 {
            return true;
        }
        if self.observations.len() < n {
            return false;
        }
        self.observations
            .iter()
            .rev()
            .take(n)
            .all(|o| matches!((o.decision, decision), (Decision::Buy, Decision::Buy) | (Decision::Sell, Decision::Sell) | (Decision::Hold, Decision::Hold)))
    }

    /// True if the last `n` observations are all `decision` with confidence >= `min_confidence`
    /// (quick-exit check, spec §4.I step 8).
    pub fn confident_reversal(&self, decision: Decision, n: usize, min_confidence: f64) -> bool {
        if self.observations.len() < n {
            return false;
        }
        self.observations.iter().rev().take(n).all(|o| {
            o.decision == decision && o.confidence >= min_confidence
        })
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}

/// Per-symbol reversal bookkeeping: last reversal time and count within the
/// trailing hour (spec §3, §4.I, property 5).
#[derive(Debug, Clone, Default)]
pub struct ReversalTracker {
    reversal_timestamps_millis: VecDeque<i64>,
}

impl ReversalTracker {
    pub fn new() -> Self {
        Self::default()
    }

    const TRAILING_WINDOW_MILLIS: i64 = 60 * 60 * 1000;

    fn evict_stale(&mut self, now: i64) {
        while let Some(&front) = self.reversal_timestamps_millis.front() {
            if now - front > Self::TRAILING_WINDOW_MILLIS {
                self.reversal_timestamps_millis.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn count_in_trailing_hour(&mut self, now: i64) -> usize {
        self.evict_stale(now);
        self.reversal_timestamps_millis.len()
    }

    /// True if another reversal at `now` would stay within `max_per_hour`.
    pub fn can_reverse(&mut self, now: i64, max_per_hour: usize) -> bool {
        self.count_in_trailing_hour(now) < max_per_hour
    }

    pub fn record_reversal(&mut self, now: i64) {
        self.evict_stale(now);
        self.reversal_timestamps_millis.push_back(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stability_requires_n_consecutive_same_direction() {
        let mut hist = SignalHistory::new(30_000);
        hist.push(SignalObservation { timestamp: 0, decision: Decision::Buy, confidence: 0.8 });
        assert!(!hist.stable_for(Decision::Buy, 3));
        hist.push(SignalObservation { timestamp: 1, decision: Decision::Buy, confidence: 0.8 });
        hist.push(SignalObservation { timestamp: 2, decision: Decision::Buy, confidence: 0.8 });
        assert!(hist.stable_for(Decision::Buy, 3));
    }

    #[test]
    fn stale_observations_fall_outside_the_window() {
        let mut hist = SignalHistory::new(30_000);
        hist.push(SignalObservation { timestamp: 0, decision: Decision::Buy, confidence: 0.8 });
        hist.push(SignalObservation { timestamp: 1, decision: Decision::Buy, confidence: 0.8 });
        // A third observation 40s later evicts the first two.
        hist.push(SignalObservation { timestamp: 40_000, decision: Decision::Buy, confidence: 0.8 });
        assert!(!hist.stable_for(Decision::Buy, 3));
        assert_eq!(hist.len(), 1);
    }

    #[test]
    fn reversal_cap_enforced_within_trailing_hour() {
        let mut tracker = ReversalTracker::new();
        let max = 3;
        for i in 0..max {
            assert!(tracker.can_reverse(i as i64 * 1000, max));
            tracker.record_reversal(i as i64 * 1000);
        }
        assert!(!tracker.can_reverse(3000, max));
        // After the window passes the (N+1)th attempt succeeds.
        let past_window = 3000 + ReversalTracker::TRAILING_WINDOW_MILLIS + 1;
        assert!(tracker.can_reverse(past_window, max));
    }
}
