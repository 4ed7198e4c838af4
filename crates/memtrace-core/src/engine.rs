//! Contracts the hook consumes from the host emulation engine.

use std::fmt;

use thiserror::Error;

/// Failures reported by an engine's memory model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum MemoryError {
    /// Part of the requested span is not backed by any mapping.
    #[error("unmapped memory access at 0x{address:x} ({size} bytes)")]
    Unmapped {
        /// First address of the requested span.
        address: u64,
        /// Length of the requested span in bytes.
        size: u64,
    },
    /// The span is mapped but lacks the permission the access needs.
    #[error("protection violation at 0x{address:x} ({size} bytes)")]
    ProtectionViolation {
        /// First address of the requested span.
        address: u64,
        /// Length of the requested span in bytes.
        size: u64,
    },
    /// A new mapping intersects an existing one.
    #[error("mapping 0x{base:x}+0x{size:x} overlaps an existing region")]
    Overlap {
        /// Requested region base.
        base: u64,
        /// Requested region length.
        size: u64,
    },
    /// A mapping is empty, wraps the address space, or cannot be allocated.
    #[error("invalid mapping 0x{base:x}+0x{size:x}")]
    InvalidRange {
        /// Requested region base.
        base: u64,
        /// Requested region length.
        size: u64,
    },
}

/// Register snapshot source consulted when a trace line is rendered.
///
/// Pointer rendering belongs to the implementor; hooks print whatever
/// `Display` produces without further interpretation.
pub trait RegisterContext {
    /// Displayable pointer representation.
    type Pointer: fmt::Display;

    /// Returns the program counter of the currently executing instruction.
    fn pc_pointer(&self) -> Self::Pointer;

    /// Returns the link register.
    fn lr_pointer(&self) -> Self::Pointer;
}

/// Emulator handle passed to hooks and listeners on every callback.
pub trait Emulator {
    /// Register context type exposed by this engine.
    type Context: RegisterContext;

    /// Returns the register context at callback time.
    fn context(&self) -> &Self::Context;

    /// Reads `size` bytes of emulated memory starting at `address`.
    ///
    /// # Errors
    ///
    /// Returns a [`MemoryError`] when the span is not readable by the engine.
    fn mem_read(&self, address: u64, size: u32) -> Result<Vec<u8>, MemoryError>;
}
