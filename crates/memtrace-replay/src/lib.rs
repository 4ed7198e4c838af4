//! Scripted guest-access replay on top of `memtrace-core`.

/// Access script parsing.
pub mod script;
/// Replay driver and shared trace sink.
pub mod replay;

pub use replay::{
    mapping_size, run_replay, ReplayError, ReplayOptions, ReplaySummary, SharedWriter,
    DEFAULT_BASE, PAGE_SIZE,
};
pub use script::{parse_number, parse_range, parse_script, Directive, ScriptError, ScriptLine};

#[cfg(test)]
use tempfile as _;
use tracing_subscriber as _;
