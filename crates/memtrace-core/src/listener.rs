//! Application-supplied callbacks notified after a hook logs an access.

use std::error::Error;

/// Error type listeners may raise. Hooks hand it back to the engine untouched.
pub type ListenerError = Box<dyn Error + Send + Sync>;

/// Receives traced reads.
pub trait ReadListener<E: ?Sized> {
    /// Called once per traced read with the fetched bytes and their rendering.
    ///
    /// # Errors
    ///
    /// Any error is propagated to the engine callback boundary as-is.
    fn on_read(
        &mut self,
        emulator: &E,
        address: u64,
        data: &[u8],
        value: &str,
    ) -> Result<(), ListenerError>;
}

/// Receives traced writes.
pub trait WriteListener<E: ?Sized> {
    /// Called once per traced write with the engine-supplied value.
    ///
    /// # Errors
    ///
    /// Any error is propagated to the engine callback boundary as-is.
    fn on_write(
        &mut self,
        emulator: &E,
        address: u64,
        size: u32,
        value: u64,
    ) -> Result<(), ListenerError>;
}

impl<E, F> ReadListener<E> for F
where
    E: ?Sized,
    F: FnMut(&E, u64, &[u8], &str) -> Result<(), ListenerError>,
{
    fn on_read(
        &mut self,
        emulator: &E,
        address: u64,
        data: &[u8],
        value: &str,
    ) -> Result<(), ListenerError> {
        self(emulator, address, data, value)
    }
}

impl<E, F> WriteListener<E> for F
where
    E: ?Sized,
    F: FnMut(&E, u64, u32, u64) -> Result<(), ListenerError>,
{
    fn on_write(
        &mut self,
        emulator: &E,
        address: u64,
        size: u32,
        value: u64,
    ) -> Result<(), ListenerError> {
        self(emulator, address, size, value)
    }
}

/// The single listener slot of a hook.
pub enum TraceListener<E: ?Sized> {
    /// Listener for read hooks.
    Read(Box<dyn ReadListener<E> + Send>),
    /// Listener for write hooks.
    Write(Box<dyn WriteListener<E> + Send>),
}

impl<E: ?Sized> std::fmt::Debug for TraceListener<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read(_) => f.write_str("TraceListener::Read(..)"),
            Self::Write(_) => f.write_str("TraceListener::Write(..)"),
        }
    }
}
