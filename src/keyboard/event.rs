//! Keyboard event types

use super::KeyCode;
use std::time::Instant;

/// Type of keyboard event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEventType {
    /// Key was pressed down
    Press,
    /// Key was released
    Release,
}

/// A keyboard event with timing information
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    /// The key code
    pub key: KeyCode,
    /// Type of event (press/release)
    pub event_type: KeyEventType,
    /// When the event was received, on the monotonic clock
    pub timestamp: Instant,
}

impl KeyEvent {
    pub fn new(key: KeyCode, event_type: KeyEventType, timestamp: Instant) -> Self {
        Self {
            key,
            event_type,
            timestamp,
        }
    }

    pub fn press(key: KeyCode, timestamp: Instant) -> Self {
        Self::new(key, KeyEventType::Press, timestamp)
    }

    pub fn release(key: KeyCode, timestamp: Instant) -> Self {
        Self::new(key, KeyEventType::Release, timestamp)
    }
}
