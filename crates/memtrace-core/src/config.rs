//! Declarative selection of traced directions and windows.

use std::io::Write;

use crate::{AccessDirection, HookHandle, Machine, MemoryTraceHook, TraceRange};

/// Which directions to trace, and over which windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct TraceConfig {
    /// Window for read tracing; `None` disables it.
    pub read: Option<TraceRange>,
    /// Window for write tracing; `None` disables it.
    pub write: Option<TraceRange>,
}

impl TraceConfig {
    /// Traces both directions over the whole address space.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            read: Some(TraceRange::ALL),
            write: Some(TraceRange::ALL),
        }
    }

    /// Returns `true` when neither direction is traced.
    #[must_use]
    pub const fn is_disabled(&self) -> bool {
        self.read.is_none() && self.write.is_none()
    }

    /// Registers one trace hook per enabled direction on `machine`.
    ///
    /// `make_sink` is called once per installed hook, read first.
    pub fn install<W, F>(&self, machine: &mut Machine, mut make_sink: F) -> Vec<HookHandle>
    where
        W: Write + 'static,
        F: FnMut(AccessDirection) -> W,
    {
        let mut handles = Vec::with_capacity(2);
        if let Some(range) = self.read {
            let sink = make_sink(AccessDirection::Read);
            handles.push(machine.hook_read(
                range,
                MemoryTraceHook::with_sink(AccessDirection::Read, sink),
            ));
        }
        if let Some(range) = self.write {
            let sink = make_sink(AccessDirection::Write);
            handles.push(machine.hook_write(
                range,
                MemoryTraceHook::with_sink(AccessDirection::Write, sink),
            ));
        }
        handles
    }
}
