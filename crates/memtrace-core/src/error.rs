//! Failures surfaced from hook callbacks to the engine.

use thiserror::Error;

use crate::{ListenerError, MemoryError};

/// Error returned by [`crate::MemoryHook`] callbacks.
#[derive(Debug, Error)]
pub enum TraceError {
    /// The hook could not fetch the bytes of a traced read.
    ///
    /// The engine's memory model disagrees with the access it just reported,
    /// so tracing stops instead of printing a partial line.
    #[error("failed to read {size} bytes at 0x{address:x} while tracing")]
    MemoryRead {
        /// Address of the traced read.
        address: u64,
        /// Width of the traced read.
        size: u32,
        /// Engine failure.
        #[source]
        source: MemoryError,
    },
    /// The installed listener failed.
    #[error(transparent)]
    Listener(ListenerError),
}

impl TraceError {
    /// Returns `true` when the failure originated in the engine rather than a listener.
    #[must_use]
    pub const fn is_engine_failure(&self) -> bool {
        matches!(self, Self::MemoryRead { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::TraceError;
    use crate::MemoryError;

    #[test]
    fn memory_read_failure_keeps_engine_source() {
        let err = TraceError::MemoryRead {
            address: 0x1000,
            size: 4,
            source: MemoryError::Unmapped {
                address: 0x1000,
                size: 4,
            },
        };
        assert!(err.is_engine_failure());
        assert_eq!(
            err.to_string(),
            "failed to read 4 bytes at 0x1000 while tracing"
        );
        let source = std::error::Error::source(&err).expect("engine source");
        assert_eq!(source.to_string(), "unmapped memory access at 0x1000 (4 bytes)");
    }

    #[test]
    fn listener_failure_displays_unmodified() {
        let err = TraceError::Listener("listener rejected access".into());
        assert!(!err.is_engine_failure());
        assert_eq!(err.to_string(), "listener rejected access");
    }
}
