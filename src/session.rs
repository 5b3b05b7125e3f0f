//! Running session: the filter plus what it has done so far

use crate::debounce::{DebounceFilter, DebouncePolicy, Decision, Verdict};
use crate::keyboard::{KeyCode, KeyEvent, KeyEventType};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Counters for one key
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyStats {
    pub presses: u64,
    pub releases: u64,
    /// Presses suppressed as bounces
    pub dropped: u64,
    /// Shortest release-to-press gap that was dropped
    pub min_drop_gap: Option<Duration>,
    /// Longest release-to-press gap that was dropped
    pub max_drop_gap: Option<Duration>,
}

impl KeyStats {
    fn record_drop(&mut self, gap: Duration) {
        self.dropped += 1;
        self.min_drop_gap = Some(self.min_drop_gap.map_or(gap, |m| m.min(gap)));
        self.max_drop_gap = Some(self.max_drop_gap.map_or(gap, |m| m.max(gap)));
    }
}

/// Text printed for a suppressed press
pub fn format_drop(key: KeyCode, elapsed: Duration) -> String {
    format!(
        "drop {} after {:.1} ms",
        key,
        elapsed.as_micros() as f64 / 1000.0
    )
}

/// Feeds events to the filter and keeps per-key statistics
pub struct Session {
    filter: DebounceFilter,
    stats: BTreeMap<KeyCode, KeyStats>,
    total_events: u64,
    start_time: Instant,
    print_drops: bool,
}

impl Session {
    pub fn new(policy: DebouncePolicy) -> Self {
        Self {
            filter: DebounceFilter::new(policy),
            stats: BTreeMap::new(),
            total_events: 0,
            start_time: Instant::now(),
            print_drops: false,
        }
    }

    /// Print a line to stdout for every dropped press
    pub fn with_drop_output(mut self, enabled: bool) -> Self {
        self.print_drops = enabled;
        self
    }

    /// Handle one event from the input source
    pub fn process_event(&mut self, event: &KeyEvent) -> Verdict {
        let decision = self.filter.decide(event.key, event.event_type, event.timestamp);
        self.record(event, decision);

        if let (Verdict::Drop, Some(elapsed)) = (decision.verdict, decision.elapsed) {
            log::debug!("Dropped {} after {:?}", event.key, elapsed);
            if self.print_drops {
                println!("{}", format_drop(event.key, elapsed));
            }
        }
        decision.verdict
    }

    fn record(&mut self, event: &KeyEvent, decision: Decision) {
        self.total_events += 1;
        let stats = self.stats.entry(event.key).or_default();
        match event.event_type {
            KeyEventType::Press => stats.presses += 1,
            KeyEventType::Release => stats.releases += 1,
        }
        if decision.verdict == Verdict::Drop {
            stats.record_drop(decision.elapsed.unwrap_or_default());
        }
    }

    pub fn policy(&self) -> &DebouncePolicy {
        self.filter.policy()
    }

    pub fn filter(&self) -> &DebounceFilter {
        &self.filter
    }

    pub fn total_events(&self) -> u64 {
        self.total_events
    }

    /// Total presses suppressed across all keys
    pub fn total_dropped(&self) -> u64 {
        self.stats.values().map(|s| s.dropped).sum()
    }

    pub fn key_stats(&self, key: KeyCode) -> Option<&KeyStats> {
        self.stats.get(&key)
    }

    /// Per-key statistics ordered by key code
    pub fn all_stats(&self) -> impl Iterator<Item = (&KeyCode, &KeyStats)> {
        self.stats.iter()
    }

    pub fn start_time(&self) -> Instant {
        self.start_time
    }

    /// Elapsed session time as `HH:MM:SS`
    pub fn elapsed_formatted(&self) -> String {
        let secs = self.start_time.elapsed().as_secs();
        format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
