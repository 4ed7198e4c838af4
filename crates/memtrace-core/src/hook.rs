//! Memory-access trace hook.
//!
//! A [`MemoryTraceHook`] is registered with an engine for one direction. On a
//! matching callback it renders the access, writes one diagnostic line to its
//! sink, then notifies the installed listener. Callbacks for the other
//! direction are ignored.

use std::io::{self, Write};

use tracing::{error, trace, warn};

use crate::{
    AccessDirection, Emulator, MemoryAccessEvent, ReadListener, TraceError, TraceListener,
    WriteListener,
};

/// Callback surface an engine drives for memory hooks.
pub trait MemoryHook<E: ?Sized> {
    /// Called when emulated code reads `size` bytes at `address`.
    ///
    /// # Errors
    ///
    /// Returns [`TraceError`] when the callback must abort the access.
    fn on_read(&mut self, emulator: &E, address: u64, size: u32) -> Result<(), TraceError>;

    /// Called when emulated code writes `value` (`size` bytes wide) at `address`.
    ///
    /// # Errors
    ///
    /// Returns [`TraceError`] when the callback must abort the access.
    fn on_write(
        &mut self,
        emulator: &E,
        address: u64,
        size: u32,
        value: u64,
    ) -> Result<(), TraceError>;
}

/// Trace hook for a single access direction.
pub struct MemoryTraceHook<E: ?Sized, W = io::Stdout> {
    direction: AccessDirection,
    sink: W,
    listener: Option<TraceListener<E>>,
}

impl<E: ?Sized> MemoryTraceHook<E> {
    /// Creates a hook that writes to standard output.
    #[must_use]
    pub fn new(direction: AccessDirection) -> Self {
        Self::with_sink(direction, io::stdout())
    }
}

impl<E: ?Sized, W: Write> MemoryTraceHook<E, W> {
    /// Creates a hook that writes to `sink`.
    #[must_use]
    pub const fn with_sink(direction: AccessDirection, sink: W) -> Self {
        Self {
            direction,
            sink,
            listener: None,
        }
    }

    /// Moves the hook onto a different sink type, keeping its listener.
    #[must_use]
    pub fn redirect<W2: Write>(self, sink: W2) -> MemoryTraceHook<E, W2> {
        MemoryTraceHook {
            direction: self.direction,
            sink,
            listener: self.listener,
        }
    }

    /// Replaces the sink, returning the previous one.
    pub fn set_sink(&mut self, sink: W) -> W {
        std::mem::replace(&mut self.sink, sink)
    }

    /// Direction fixed at construction.
    #[must_use]
    pub const fn direction(&self) -> AccessDirection {
        self.direction
    }

    /// Borrows the sink.
    #[must_use]
    pub const fn sink(&self) -> &W {
        &self.sink
    }

    /// Mutably borrows the sink.
    pub fn sink_mut(&mut self) -> &mut W {
        &mut self.sink
    }

    /// Consumes the hook and returns its sink.
    pub fn into_sink(self) -> W {
        self.sink
    }

    /// Installs a read listener, replacing any listener already present.
    pub fn set_read_listener<L>(&mut self, listener: L)
    where
        L: ReadListener<E> + Send + 'static,
    {
        self.listener = Some(TraceListener::Read(Box::new(listener)));
    }

    /// Installs a write listener, replacing any listener already present.
    pub fn set_write_listener<L>(&mut self, listener: L)
    where
        L: WriteListener<E> + Send + 'static,
    {
        self.listener = Some(TraceListener::Write(Box::new(listener)));
    }

    /// Removes and returns the installed listener.
    pub fn take_listener(&mut self) -> Option<TraceListener<E>> {
        self.listener.take()
    }

    /// Returns `true` when a listener is installed.
    #[must_use]
    pub const fn has_listener(&self) -> bool {
        self.listener.is_some()
    }

    fn emit(&mut self, event: &MemoryAccessEvent<'_>) {
        let written = writeln!(self.sink, "{event}").and_then(|()| self.sink.flush());
        if let Err(err) = written {
            warn!(
                address = event.address,
                direction = %event.direction(),
                error = %err,
                "dropped memory trace line"
            );
        }
    }
}

impl<E, W> MemoryHook<E> for MemoryTraceHook<E, W>
where
    E: Emulator + ?Sized,
    W: Write,
{
    fn on_read(&mut self, emulator: &E, address: u64, size: u32) -> Result<(), TraceError> {
        if self.direction != AccessDirection::Read {
            trace!(address, size, "read callback on write hook ignored");
            return Ok(());
        }

        let data = emulator.mem_read(address, size).map_err(|source| {
            error!(address, size, error = %source, "traced read failed in engine");
            TraceError::MemoryRead {
                address,
                size,
                source,
            }
        })?;

        let event = MemoryAccessEvent::read(emulator.context(), address, size, &data);
        self.emit(&event);

        if let Some(TraceListener::Read(listener)) = self.listener.as_mut() {
            listener
                .on_read(emulator, address, &data, &event.formatted_value)
                .map_err(TraceError::Listener)?;
        }
        Ok(())
    }

    fn on_write(
        &mut self,
        emulator: &E,
        address: u64,
        size: u32,
        value: u64,
    ) -> Result<(), TraceError> {
        if self.direction != AccessDirection::Write {
            trace!(address, size, "write callback on read hook ignored");
            return Ok(());
        }

        let event = MemoryAccessEvent::write(emulator.context(), address, size, value);
        self.emit(&event);

        if let Some(TraceListener::Write(listener)) = self.listener.as_mut() {
            listener
                .on_write(emulator, address, size, value)
                .map_err(TraceError::Listener)?;
        }
        Ok(())
    }
}

impl<E: ?Sized, W> std::fmt::Debug for MemoryTraceHook<E, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTraceHook")
            .field("direction", &self.direction)
            .field("listener", &self.listener)
            .finish_non_exhaustive()
    }
}
