//! Which keys are debounced, and for how long

use crate::keyboard::KeyCode;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;

/// Default release-to-press window
pub const DEFAULT_DURATION: Duration = Duration::from_millis(40);

/// Immutable debounce settings, built once at startup.
///
/// When `apply_to_all` is false only keys with an override are filtered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebouncePolicy {
    apply_to_all: bool,
    default_duration: Duration,
    per_key: HashMap<KeyCode, Duration>,
}

impl DebouncePolicy {
    /// Whether presses of `key` are subject to filtering
    pub fn is_filtered(&self, key: KeyCode) -> bool {
        self.apply_to_all || self.per_key.contains_key(&key)
    }

    /// Minimum release-to-press gap for `key`
    pub fn threshold_for(&self, key: KeyCode) -> Duration {
        self.per_key
            .get(&key)
            .copied()
            .unwrap_or(self.default_duration)
    }

    pub fn applies_to_all(&self) -> bool {
        self.apply_to_all
    }

    pub fn default_duration(&self) -> Duration {
        self.default_duration
    }

    /// Per-key overrides sorted by key code
    pub fn overrides(&self) -> Vec<(KeyCode, Duration)> {
        let mut entries: Vec<_> = self.per_key.iter().map(|(k, d)| (*k, *d)).collect();
        entries.sort_by_key(|(k, _)| *k);
        entries
    }

    /// True when nothing would ever be filtered
    pub fn is_empty(&self) -> bool {
        !self.apply_to_all && self.per_key.is_empty()
    }

    /// Human-readable lines describing the resolved policy
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines: Vec<String> = self
            .overrides()
            .into_iter()
            .map(|(key, duration)| format!("{}: {} ms", key, duration.as_millis()))
            .collect();
        if self.apply_to_all {
            lines.push(format!(
                "all other keys: {} ms",
                self.default_duration.as_millis()
            ));
        }
        lines
    }

    /// Serializable view for reports
    pub fn snapshot(&self) -> PolicySnapshot {
        PolicySnapshot {
            all_keys: self.apply_to_all,
            default_ms: self.default_duration.as_millis() as u64,
            keys: self
                .overrides()
                .into_iter()
                .map(|(key, duration)| KeySnapshot {
                    key: key.to_string(),
                    code: key.as_u16(),
                    duration_ms: duration.as_millis() as u64,
                })
                .collect(),
        }
    }
}

impl Default for DebouncePolicy {
    fn default() -> Self {
        PolicyBuilder::new().build()
    }
}

/// Serializable form of a policy
#[derive(Debug, Clone, Serialize)]
pub struct PolicySnapshot {
    pub all_keys: bool,
    pub default_ms: u64,
    pub keys: Vec<KeySnapshot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct KeySnapshot {
    pub key: String,
    pub code: u16,
    pub duration_ms: u64,
}

/// Accumulates configuration in order and produces a [`DebouncePolicy`].
///
/// Overrides without an explicit duration take the default that is current
/// when they are added. Changing the default afterwards does not touch them.
#[derive(Debug, Clone)]
pub struct PolicyBuilder {
    apply_to_all: bool,
    default_duration: Duration,
    per_key: HashMap<KeyCode, Duration>,
}

impl PolicyBuilder {
    pub fn new() -> Self {
        Self {
            apply_to_all: false,
            default_duration: DEFAULT_DURATION,
            per_key: HashMap::new(),
        }
    }

    pub fn apply_to_all(&mut self, enabled: bool) -> &mut Self {
        self.apply_to_all = enabled;
        self
    }

    pub fn set_default(&mut self, duration: Duration) -> &mut Self {
        self.default_duration = duration;
        self
    }

    pub fn default_duration(&self) -> Duration {
        self.default_duration
    }

    /// Register an override. `None` or a zero duration resolves to the
    /// current default. Adding the same key again replaces it.
    pub fn add_key(&mut self, key: KeyCode, duration: Option<Duration>) -> &mut Self {
        let resolved = match duration {
            Some(d) if !d.is_zero() => d,
            _ => self.default_duration,
        };
        self.per_key.insert(key, resolved);
        self
    }

    pub fn build(&self) -> DebouncePolicy {
        DebouncePolicy {
            apply_to_all: self.apply_to_all,
            default_duration: self.default_duration,
            per_key: self.per_key.clone(),
        }
    }
}

impl Default for PolicyBuilder {
    fn default() -> Self {
        Self::new()
    }
}
