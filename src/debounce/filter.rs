//! Release-to-press debounce filter

use super::DebouncePolicy;
use crate::keyboard::{KeyCode, KeyEvent, KeyEventType};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Whether an event should reach the rest of the system
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Drop,
}

/// A verdict plus the release-to-press gap it was based on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub verdict: Verdict,
    /// Set only for presses that were measured against a prior release
    pub elapsed: Option<Duration>,
}

impl Decision {
    fn pass() -> Self {
        Self {
            verdict: Verdict::Pass,
            elapsed: None,
        }
    }
}

/// Per-key memory of the last release, consulted on every press.
///
/// Only releases update state. A dropped press never moves the window, so a
/// burst of bounces is measured against the one real release that preceded it.
#[derive(Debug)]
pub struct DebounceFilter {
    policy: DebouncePolicy,
    last_release: HashMap<KeyCode, Instant>,
}

impl DebounceFilter {
    pub fn new(policy: DebouncePolicy) -> Self {
        Self {
            policy,
            last_release: HashMap::new(),
        }
    }

    pub fn policy(&self) -> &DebouncePolicy {
        &self.policy
    }

    /// Decide the fate of one event
    pub fn handle(&mut self, event: &KeyEvent) -> Verdict {
        self.decide(event.key, event.event_type, event.timestamp).verdict
    }

    /// Decide the fate of one event, keeping the measured gap
    pub fn decide(&mut self, key: KeyCode, kind: KeyEventType, timestamp: Instant) -> Decision {
        if !self.policy.is_filtered(key) {
            return Decision::pass();
        }

        match kind {
            KeyEventType::Release => {
                self.last_release.insert(key, timestamp);
                Decision::pass()
            }
            KeyEventType::Press => {
                let Some(released_at) = self.last_release.get(&key) else {
                    return Decision::pass();
                };
                // A press stamped at or before the release counts as zero gap.
                let elapsed = timestamp.saturating_duration_since(*released_at);
                let verdict = if elapsed < self.policy.threshold_for(key) {
                    Verdict::Drop
                } else {
                    Verdict::Pass
                };
                Decision {
                    verdict,
                    elapsed: Some(elapsed),
                }
            }
        }
    }

    /// When `key` was last released, if ever
    pub fn last_release(&self, key: KeyCode) -> Option<Instant> {
        self.last_release.get(&key).copied()
    }

    /// Number of keys with a recorded release
    pub fn tracked_keys(&self) -> usize {
        self.last_release.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debounce::PolicyBuilder;

    const N: KeyCode = KeyCode(49);
    const Q: KeyCode = KeyCode(16);
    const X: KeyCode = KeyCode(45);

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn all_keys_filter(default_ms: u64) -> DebounceFilter {
        DebounceFilter::new(
            PolicyBuilder::new()
                .apply_to_all(true)
                .set_default(ms(default_ms))
                .build(),
        )
    }

    #[test]
    fn first_press_passes() {
        let mut filter = all_keys_filter(40);
        let t0 = Instant::now();
        assert_eq!(filter.handle(&KeyEvent::press(N, t0)), Verdict::Pass);
        assert_eq!(filter.handle(&KeyEvent::press(N, t0 + ms(1))), Verdict::Pass);
        assert_eq!(filter.tracked_keys(), 0);
    }

    #[test]
    fn press_inside_window_is_dropped() {
        let mut filter = all_keys_filter(40);
        let t0 = Instant::now();
        filter.handle(&KeyEvent::release(N, t0));
        let decision = filter.decide(N, KeyEventType::Press, t0 + ms(39));
        assert_eq!(decision.verdict, Verdict::Drop);
        assert_eq!(decision.elapsed, Some(ms(39)));
    }

    #[test]
    fn press_at_threshold_passes() {
        let mut filter = all_keys_filter(40);
        let t0 = Instant::now();
        filter.handle(&KeyEvent::release(N, t0));
        assert_eq!(filter.handle(&KeyEvent::press(N, t0 + ms(40))), Verdict::Pass);
    }

    #[test]
    fn dropped_presses_do_not_extend_window() {
        let mut filter = all_keys_filter(40);
        let t0 = Instant::now();
        filter.handle(&KeyEvent::release(N, t0));
        assert_eq!(filter.handle(&KeyEvent::press(N, t0 + ms(1))), Verdict::Drop);
        assert_eq!(filter.handle(&KeyEvent::press(N, t0 + ms(2))), Verdict::Drop);
        assert_eq!(filter.last_release(N), Some(t0));
        // Still measured against t0, not the last dropped press.
        assert_eq!(filter.handle(&KeyEvent::press(N, t0 + ms(40))), Verdict::Pass);
    }

    #[test]
    fn release_always_passes_and_overwrites() {
        let mut filter = all_keys_filter(40);
        let t0 = Instant::now();
        assert_eq!(filter.handle(&KeyEvent::release(N, t0)), Verdict::Pass);
        assert_eq!(filter.handle(&KeyEvent::release(N, t0 + ms(5))), Verdict::Pass);
        assert_eq!(filter.last_release(N), Some(t0 + ms(5)));
        assert_eq!(filter.handle(&KeyEvent::press(N, t0 + ms(44))), Verdict::Drop);
    }

    #[test]
    fn clock_anomaly_counts_as_zero_gap() {
        let mut filter = all_keys_filter(40);
        let t0 = Instant::now() + ms(100);
        filter.handle(&KeyEvent::release(N, t0));
        let decision = filter.decide(N, KeyEventType::Press, t0 - ms(10));
        assert_eq!(decision.verdict, Verdict::Drop);
        assert_eq!(decision.elapsed, Some(Duration::ZERO));
    }

    #[test]
    fn zero_threshold_never_drops() {
        let mut filter = all_keys_filter(0);
        let t0 = Instant::now();
        filter.handle(&KeyEvent::release(N, t0));
        assert_eq!(filter.handle(&KeyEvent::press(N, t0)), Verdict::Pass);
    }

    #[test]
    fn unlisted_keys_pass_and_leave_no_state() {
        let policy = PolicyBuilder::new().add_key(X, Some(ms(50))).build();
        let mut filter = DebounceFilter::new(policy);
        let t0 = Instant::now();
        assert_eq!(filter.handle(&KeyEvent::press(Q, t0)), Verdict::Pass);
        assert_eq!(filter.handle(&KeyEvent::release(Q, t0 + ms(1))), Verdict::Pass);
        assert_eq!(filter.handle(&KeyEvent::press(Q, t0 + ms(2))), Verdict::Pass);
        assert_eq!(filter.tracked_keys(), 0);
        assert_eq!(filter.last_release(Q), None);
    }

    #[test]
    fn per_key_thresholds_are_independent() {
        let policy = PolicyBuilder::new()
            .add_key(X, Some(ms(50)))
            .add_key(N, Some(ms(10)))
            .build();
        let mut filter = DebounceFilter::new(policy);
        let t0 = Instant::now();
        filter.handle(&KeyEvent::release(X, t0));
        filter.handle(&KeyEvent::release(N, t0));
        assert_eq!(filter.handle(&KeyEvent::press(X, t0 + ms(20))), Verdict::Drop);
        assert_eq!(filter.handle(&KeyEvent::press(N, t0 + ms(20))), Verdict::Pass);
        assert_eq!(filter.tracked_keys(), 2);
    }

    #[test]
    fn release_press_release_press_scenario() {
        let mut filter = all_keys_filter(40);
        let t0 = Instant::now();
        let verdicts = [
            filter.handle(&KeyEvent::release(N, t0)),
            filter.handle(&KeyEvent::press(N, t0 + ms(25))),
            filter.handle(&KeyEvent::release(N, t0 + ms(30))),
            filter.handle(&KeyEvent::press(N, t0 + ms(75))),
        ];
        assert_eq!(
            verdicts,
            [Verdict::Pass, Verdict::Drop, Verdict::Pass, Verdict::Pass]
        );
    }
}
