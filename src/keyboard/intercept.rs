//! Platform-independent side of the input source

use super::KeyEvent;
use crate::debounce::Verdict;
use std::io;
use std::sync::atomic::AtomicBool;
use thiserror::Error;

/// Error type for input source operations
#[derive(Debug, Error)]
pub enum InterceptError {
    /// No keyboard devices found
    #[error("No keyboard devices found")]
    NoDevices,
    /// Permission denied accessing devices
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    /// Could not create the virtual keyboard used to forward events
    #[error("Failed to create virtual keyboard: {0}")]
    VirtualDevice(io::Error),
    /// Device enumeration failed
    #[error("Device enumeration failed: {0}")]
    EnumerationFailed(String),
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    /// No input source exists for this platform
    #[error("Keyboard interception is not supported on {0}")]
    Unsupported(&'static str),
}

/// A source of key events that can suppress them before delivery.
///
/// `run` calls `handler` synchronously for every press and release, one at a
/// time, and only delivers the event onward when the handler passes it.
pub trait KeyInterceptor {
    /// Block until `running` is cleared or the source fails
    fn run(
        &mut self,
        running: &AtomicBool,
        handler: &mut dyn FnMut(&KeyEvent) -> Verdict,
    ) -> Result<(), InterceptError>;

    /// Short description for the startup banner
    fn describe(&self) -> String;
}

/// Open the interceptor for the current platform
#[cfg(target_os = "linux")]
pub fn open_interceptor() -> Result<Box<dyn KeyInterceptor>, InterceptError> {
    Ok(Box::new(super::EvdevInterceptor::new()?))
}

/// Open the interceptor for the current platform
#[cfg(not(target_os = "linux"))]
pub fn open_interceptor() -> Result<Box<dyn KeyInterceptor>, InterceptError> {
    Err(InterceptError::Unsupported(std::env::consts::OS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_name_the_problem() {
        assert_eq!(
            InterceptError::NoDevices.to_string(),
            "No keyboard devices found"
        );
        let err = InterceptError::PermissionDenied("add user to 'input' group".into());
        assert!(err.to_string().contains("input"));
        assert_eq!(
            InterceptError::Unsupported("plan9").to_string(),
            "Keyboard interception is not supported on plan9"
        );
    }
}
