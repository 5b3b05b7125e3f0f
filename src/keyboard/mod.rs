//! Keyboard events, key names and the input source

mod event;
mod intercept;
pub mod keymap;
pub mod relay;

#[cfg(target_os = "linux")]
mod evdev_listener;

pub use event::{KeyEvent, KeyEventType};
pub use intercept::{open_interceptor, InterceptError, KeyInterceptor};
pub use keymap::{all_keys, key_name, lookup_key, KeyCode, UnknownKeyName};

#[cfg(target_os = "linux")]
pub use evdev_listener::{EvdevInterceptor, VIRTUAL_DEVICE_NAME};
