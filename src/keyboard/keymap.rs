//! Key code definitions and the key-name table
//!
//! Key codes are Linux evdev scancodes. Every name in [`KEY_NAMES`] maps to
//! exactly one code and back again; [`ALIASES`] add extra spellings that are
//! accepted when parsing but never produced when printing.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use thiserror::Error;

/// Represents a physical key code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyCode(pub u16);

impl KeyCode {
    pub fn new(code: u16) -> Self {
        Self(code)
    }

    pub fn as_u16(&self) -> u16 {
        self.0
    }

    /// Canonical name for this code, if the table knows it
    pub fn name(&self) -> Option<&'static str> {
        key_name(*self)
    }
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "Unknown({})", self.0),
        }
    }
}

/// A key name that does not resolve to any code
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown key name '{0}'")]
pub struct UnknownKeyName(pub String);

impl FromStr for KeyCode {
    type Err = UnknownKeyName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        lookup_key(s).ok_or_else(|| UnknownKeyName(s.to_string()))
    }
}

/// Canonical key names, one per code
pub static KEY_NAMES: &[(u16, &str)] = &[
    // Function row
    (1, "Escape"),
    (59, "F1"),
    (60, "F2"),
    (61, "F3"),
    (62, "F4"),
    (63, "F5"),
    (64, "F6"),
    (65, "F7"),
    (66, "F8"),
    (67, "F9"),
    (68, "F10"),
    (87, "F11"),
    (88, "F12"),
    (183, "F13"),
    (184, "F14"),
    (185, "F15"),
    (186, "F16"),
    (187, "F17"),
    (188, "F18"),
    (189, "F19"),
    (190, "F20"),
    (191, "F21"),
    (192, "F22"),
    (193, "F23"),
    (194, "F24"),
    // Number row
    (41, "Grave"),
    (2, "1"),
    (3, "2"),
    (4, "3"),
    (5, "4"),
    (6, "5"),
    (7, "6"),
    (8, "7"),
    (9, "8"),
    (10, "9"),
    (11, "0"),
    (12, "Minus"),
    (13, "Equals"),
    (14, "Backspace"),
    // Top letter row
    (15, "Tab"),
    (16, "Q"),
    (17, "W"),
    (18, "E"),
    (19, "R"),
    (20, "T"),
    (21, "Y"),
    (22, "U"),
    (23, "I"),
    (24, "O"),
    (25, "P"),
    (26, "LeftBracket"),
    (27, "RightBracket"),
    (43, "Backslash"),
    // Home row
    (58, "CapsLock"),
    (30, "A"),
    (31, "S"),
    (32, "D"),
    (33, "F"),
    (34, "G"),
    (35, "H"),
    (36, "J"),
    (37, "K"),
    (38, "L"),
    (39, "Semicolon"),
    (40, "Apostrophe"),
    (28, "Enter"),
    // Bottom letter row
    (42, "LeftShift"),
    (86, "Iso102"),
    (44, "Z"),
    (45, "X"),
    (46, "C"),
    (47, "V"),
    (48, "B"),
    (49, "N"),
    (50, "M"),
    (51, "Comma"),
    (52, "Period"),
    (53, "Slash"),
    (54, "RightShift"),
    // Bottom row
    (29, "LeftCtrl"),
    (125, "LeftMeta"),
    (56, "LeftAlt"),
    (57, "Space"),
    (100, "RightAlt"),
    (126, "RightMeta"),
    (127, "Menu"),
    (97, "RightCtrl"),
    // Navigation cluster
    (99, "PrintScreen"),
    (70, "ScrollLock"),
    (119, "Pause"),
    (110, "Insert"),
    (102, "Home"),
    (104, "PageUp"),
    (111, "Delete"),
    (107, "End"),
    (109, "PageDown"),
    (103, "Up"),
    (105, "Left"),
    (108, "Down"),
    (106, "Right"),
    // Keypad
    (69, "NumLock"),
    (98, "KPSlash"),
    (55, "KPAsterisk"),
    (74, "KPMinus"),
    (78, "KPPlus"),
    (96, "KPEnter"),
    (83, "KPDot"),
    (117, "KPEqual"),
    (82, "KP0"),
    (79, "KP1"),
    (80, "KP2"),
    (81, "KP3"),
    (75, "KP4"),
    (76, "KP5"),
    (77, "KP6"),
    (71, "KP7"),
    (72, "KP8"),
    (73, "KP9"),
    // Media
    (113, "Mute"),
    (114, "VolumeDown"),
    (115, "VolumeUp"),
    (116, "Power"),
];

/// Alternative spellings accepted on input
pub static ALIASES: &[(&str, u16)] = &[
    ("RETURN", 28),
    ("ESC", 1),
    ("BKSP", 14),
    ("DEL", 111),
    ("INS", 110),
    ("PGUP", 104),
    ("PGDN", 109),
    ("CTRL", 29),
    ("SHIFT", 42),
    ("ALT", 56),
    ("META", 125),
    ("SUPER", 125),
    ("WIN", 125),
    ("CMD", 125),
    ("OPTION", 56),
    ("CAPS", 58),
    ("`", 41),
    ("-", 12),
    ("=", 13),
    ("[", 26),
    ("]", 27),
    ("\\", 43),
    (";", 39),
    ("'", 40),
    (",", 51),
    (".", 52),
    ("/", 53),
];

static CODE_TO_NAME: LazyLock<HashMap<KeyCode, &'static str>> = LazyLock::new(|| {
    KEY_NAMES
        .iter()
        .map(|&(code, name)| (KeyCode(code), name))
        .collect()
});

// Upper-cased so lookups are case-insensitive.
static NAME_TO_CODE: LazyLock<HashMap<String, KeyCode>> = LazyLock::new(|| {
    let mut map: HashMap<String, KeyCode> = KEY_NAMES
        .iter()
        .map(|&(code, name)| (name.to_ascii_uppercase(), KeyCode(code)))
        .collect();
    for &(alias, code) in ALIASES {
        map.entry(alias.to_string()).or_insert(KeyCode(code));
    }
    map
});

/// Get the canonical name for a key code
pub fn key_name(code: KeyCode) -> Option<&'static str> {
    CODE_TO_NAME.get(&code).copied()
}

/// Resolve a human-readable key name to its code.
///
/// Matching ignores ASCII case. A `#` followed by a decimal number is taken
/// as a raw scancode, for keys the table has no name for.
pub fn lookup_key(name: &str) -> Option<KeyCode> {
    let name = name.trim();
    if let Some(raw) = name.strip_prefix('#') {
        return raw.parse::<u16>().ok().map(KeyCode);
    }
    NAME_TO_CODE.get(&name.to_ascii_uppercase()).copied()
}

/// All named keys, in table order
pub fn all_keys() -> impl Iterator<Item = (KeyCode, &'static str)> {
    KEY_NAMES.iter().map(|&(code, name)| (KeyCode(code), name))
}
