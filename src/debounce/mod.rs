//! Debounce policy and filter

mod filter;
mod policy;

pub use filter::{DebounceFilter, Decision, Verdict};
pub use policy::{DebouncePolicy, KeySnapshot, PolicyBuilder, PolicySnapshot, DEFAULT_DURATION};
