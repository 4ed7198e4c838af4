//! Memory-access tracing for CPU emulation engines.
//!
//! A [`MemoryTraceHook`] sits on an engine's memory-hook callback path. Each
//! matching access is rendered into a diagnostic line of the form
//!
//! ```text
//! ### Memory READ at 0x<addr>, data size = <size>, data value = <value> pc=<pc> lr=<lr>
//! ```
//!
//! written to a configurable sink, then forwarded to an optional listener.

/// Value rendering for traced reads and writes.
pub mod format;
pub use format::{encode_hex, format_read_value, format_write_value, NUMERIC_READ_WIDTH};

/// Engine and register-context collaborator contracts.
pub mod engine;
pub use engine::{Emulator, MemoryError, RegisterContext};

/// Listener capabilities notified after an access is traced.
pub mod listener;
pub use listener::{ListenerError, ReadListener, TraceListener, WriteListener};

/// Hook callback failures.
pub mod error;
pub use error::TraceError;

/// Per-access records and diagnostic-line rendering.
pub mod event;
pub use event::{AccessDirection, AccessPayload, MemoryAccessEvent};

/// The trace hook and the engine-facing hook trait.
pub mod hook;
pub use hook::{MemoryHook, MemoryTraceHook};

/// Reference engine with range-filtered hook dispatch.
pub mod machine;
pub use machine::{
    HookHandle, Machine, MachineError, MachineState, MemoryMap, Permissions, Pointer, Registers,
    TraceRange, MAX_WRITE_WIDTH,
};

/// Declarative trace installation.
pub mod config;
pub use config::TraceConfig;

#[cfg(test)]
use proptest as _;
