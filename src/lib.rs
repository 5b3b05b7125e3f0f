//! Keyboard Debounce - suppress double-typed key presses
//!
//! Worn key switches sometimes register one press as two. This crate sits
//! between the keyboard and the rest of the system and drops a press that
//! follows the same key's release too closely.

pub mod cli;
pub mod config;
pub mod debounce;
pub mod keyboard;
pub mod report;
pub mod session;

pub use config::Config;
pub use debounce::{DebounceFilter, DebouncePolicy, PolicyBuilder, Verdict};
pub use session::Session;
