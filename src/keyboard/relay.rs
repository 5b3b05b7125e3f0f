//! Forwarding state for grabbed keyboards
//!
//! Filtering only ever sees presses and releases. What happens to the
//! autorepeats in between, and to the lock LEDs the desktop can no longer
//! reach while the keyboards are grabbed, is decided here.

use super::KeyCode;
use crate::debounce::Verdict;
use std::collections::HashSet;

/// Raw `EV_KEY` value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyValue {
    Release,
    Press,
    Repeat,
}

impl KeyValue {
    pub fn from_raw(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::Release),
            1 => Some(Self::Press),
            2 => Some(Self::Repeat),
            _ => None,
        }
    }
}

/// Tracks keys whose latest press was dropped, so their autorepeats are
/// dropped as well
#[derive(Debug, Default)]
pub struct RepeatGate {
    suppressed: HashSet<KeyCode>,
}

impl RepeatGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a key event should reach the output device.
    ///
    /// `verdict` is the filter's answer for presses and releases. Repeats
    /// carry no verdict of their own and follow the last press.
    pub fn forward(&mut self, key: KeyCode, value: KeyValue, verdict: Verdict) -> bool {
        match value {
            KeyValue::Press if verdict == Verdict::Drop => {
                self.suppressed.insert(key);
                false
            }
            KeyValue::Press | KeyValue::Release => {
                self.suppressed.remove(&key);
                true
            }
            KeyValue::Repeat => !self.suppressed.contains(&key),
        }
    }

    pub fn is_suppressed(&self, key: KeyCode) -> bool {
        self.suppressed.contains(&key)
    }
}

const KEY_NUMLOCK: KeyCode = KeyCode(69);
const KEY_CAPSLOCK: KeyCode = KeyCode(58);
const KEY_SCROLLLOCK: KeyCode = KeyCode(70);

/// `EV_LED` codes
pub const LED_NUML: u16 = 0;
pub const LED_CAPSL: u16 = 1;
pub const LED_SCROLLL: u16 = 2;

/// Lock state mirrored onto the physical keyboards' LEDs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LockLeds {
    pub num: bool,
    pub caps: bool,
    pub scroll: bool,
}

impl LockLeds {
    /// Toggle the matching lock for a press that was forwarded.
    ///
    /// Returns the LED code and its new state, or `None` for other keys.
    pub fn on_forwarded_press(&mut self, key: KeyCode) -> Option<(u16, bool)> {
        let (led, state) = match key {
            KEY_NUMLOCK => (LED_NUML, &mut self.num),
            KEY_CAPSLOCK => (LED_CAPSL, &mut self.caps),
            KEY_SCROLLLOCK => (LED_SCROLLL, &mut self.scroll),
            _ => return None,
        };
        *state = !*state;
        Some((led, *state))
    }

    /// All three LEDs as `(code, on)` pairs
    pub fn states(&self) -> [(u16, bool); 3] {
        [
            (LED_NUML, self.num),
            (LED_CAPSL, self.caps),
            (LED_SCROLLL, self.scroll),
        ]
    }
}
