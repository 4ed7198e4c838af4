//! Minimal reference engine: mapped memory, `PC`/`LR`, and range-filtered
//! memory hooks.
//!
//! This does not decode instructions. Hosts (and tests) drive guest accesses
//! directly through [`Machine::guest_read`] and [`Machine::guest_write`], and
//! the machine dispatches them to registered hooks the way a hooking CPU
//! engine would.

/// Sparse mapped address space.
pub mod memory;
/// `PC`/`LR` snapshot and pointer rendering.
pub mod registers;

pub use memory::{MemoryMap, Permissions};
pub use registers::{Pointer, Registers};

use thiserror::Error;
use tracing::debug;

use crate::{Emulator, MemoryError, MemoryHook, TraceError};

/// Largest store width carried by a `u64` write value.
pub const MAX_WRITE_WIDTH: u32 = 8;

/// Inclusive address window a hook is registered for.
///
/// A window whose `begin` is greater than `end` matches every address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct TraceRange {
    /// First traced address.
    pub begin: u64,
    /// Last traced address.
    pub end: u64,
}

impl TraceRange {
    /// Window covering the whole address space.
    pub const ALL: Self = Self { begin: 1, end: 0 };

    /// Creates an inclusive window.
    #[must_use]
    pub const fn new(begin: u64, end: u64) -> Self {
        Self { begin, end }
    }

    /// Returns `true` when an access at `address` fires hooks in this window.
    #[must_use]
    pub const fn contains(&self, address: u64) -> bool {
        self.begin > self.end || (self.begin <= address && address <= self.end)
    }
}

impl Default for TraceRange {
    fn default() -> Self {
        Self::ALL
    }
}

/// Identifier returned by hook registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookHandle(u64);

/// Errors from guest accesses on a [`Machine`].
#[derive(Debug, Error)]
pub enum MachineError {
    /// The guest access itself was illegal.
    #[error(transparent)]
    Memory(#[from] MemoryError),
    /// A hook aborted the access.
    #[error(transparent)]
    Trace(#[from] TraceError),
    /// Access width is zero, or too wide for the value it carries.
    #[error("invalid access size {size}")]
    InvalidAccessSize {
        /// Rejected width in bytes.
        size: u32,
    },
}

/// Emulator handle seen by hooks registered on a [`Machine`].
#[derive(Debug, Clone, Default)]
pub struct MachineState {
    /// Mapped address space.
    pub memory: MemoryMap,
    /// Register snapshot.
    pub registers: Registers,
}

impl Emulator for MachineState {
    type Context = Registers;

    fn context(&self) -> &Registers {
        &self.registers
    }

    fn mem_read(&self, address: u64, size: u32) -> Result<Vec<u8>, MemoryError> {
        self.memory.read(address, u64::from(size))
    }
}

struct RegisteredHook {
    handle: HookHandle,
    range: TraceRange,
    hook: Box<dyn MemoryHook<MachineState>>,
}

/// Reference engine owning state and registered memory hooks.
#[derive(Default)]
pub struct Machine {
    state: MachineState,
    read_hooks: Vec<RegisteredHook>,
    write_hooks: Vec<RegisteredHook>,
    next_handle: u64,
}

impl Machine {
    /// Creates a machine with no mappings and no hooks.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Borrows the emulator state.
    #[must_use]
    pub const fn state(&self) -> &MachineState {
        &self.state
    }

    /// Maps zeroed memory.
    ///
    /// # Errors
    ///
    /// See [`MemoryMap::map`].
    pub fn map(&mut self, base: u64, size: u64, perms: Permissions) -> Result<(), MemoryError> {
        self.state.memory.map(base, size, perms)?;
        debug!(base, size, perms = perms.bits(), "mapped region");
        Ok(())
    }

    /// Copies `data` into mapped memory, bypassing permissions and hooks.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::Unmapped`] when the span is not fully mapped.
    pub fn load(&mut self, address: u64, data: &[u8]) -> Result<(), MemoryError> {
        self.state.memory.write(address, data)
    }

    /// Sets the program counter reported to hooks.
    pub const fn set_pc(&mut self, value: u64) {
        self.state.registers.set_pc(value);
    }

    /// Sets the link register reported to hooks.
    pub const fn set_lr(&mut self, value: u64) {
        self.state.registers.set_lr(value);
    }

    /// Registers `hook` for guest reads inside `range`.
    pub fn hook_read<H>(&mut self, range: TraceRange, hook: H) -> HookHandle
    where
        H: MemoryHook<MachineState> + 'static,
    {
        let handle = self.allocate_handle();
        debug!(handle = handle.0, begin = range.begin, end = range.end, "registered read hook");
        self.read_hooks.push(RegisteredHook {
            handle,
            range,
            hook: Box::new(hook),
        });
        handle
    }

    /// Registers `hook` for guest writes inside `range`.
    pub fn hook_write<H>(&mut self, range: TraceRange, hook: H) -> HookHandle
    where
        H: MemoryHook<MachineState> + 'static,
    {
        let handle = self.allocate_handle();
        debug!(handle = handle.0, begin = range.begin, end = range.end, "registered write hook");
        self.write_hooks.push(RegisteredHook {
            handle,
            range,
            hook: Box::new(hook),
        });
        handle
    }

    /// Removes a registered hook. Returns `false` for unknown handles.
    pub fn unhook(&mut self, handle: HookHandle) -> bool {
        let before = self.hook_count();
        self.read_hooks.retain(|entry| entry.handle != handle);
        self.write_hooks.retain(|entry| entry.handle != handle);
        let removed = self.hook_count() != before;
        if removed {
            debug!(handle = handle.0, "removed hook");
        }
        removed
    }

    /// Number of registered hooks across both directions.
    #[must_use]
    pub fn hook_count(&self) -> usize {
        self.read_hooks.len() + self.write_hooks.len()
    }

    /// Performs a guest load of `size` bytes.
    ///
    /// Read hooks whose window contains `address` run in registration order
    /// before the bytes are returned.
    ///
    /// # Errors
    ///
    /// Returns [`MachineError::InvalidAccessSize`] for zero-width reads,
    /// [`MachineError::Memory`] for unmapped or non-readable spans, and
    /// [`MachineError::Trace`] when a hook fails.
    pub fn guest_read(&mut self, address: u64, size: u32) -> Result<Vec<u8>, MachineError> {
        if size == 0 {
            return Err(MachineError::InvalidAccessSize { size });
        }
        self.state
            .memory
            .check_access(address, u64::from(size), Permissions::READ)?;

        for entry in self
            .read_hooks
            .iter_mut()
            .filter(|entry| entry.range.contains(address))
        {
            entry.hook.on_read(&self.state, address, size)?;
        }

        Ok(self.state.memory.read(address, u64::from(size))?)
    }

    /// Performs a guest store of the low `size` bytes of `value`, little-endian.
    ///
    /// Write hooks whose window contains `address` observe the store before
    /// memory is updated, with `value` already truncated to `size` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`MachineError::InvalidAccessSize`] unless `1 <= size <= 8`,
    /// [`MachineError::Memory`] for unmapped or non-writable spans, and
    /// [`MachineError::Trace`] when a hook fails.
    pub fn guest_write(&mut self, address: u64, size: u32, value: u64) -> Result<(), MachineError> {
        if !(1..=MAX_WRITE_WIDTH).contains(&size) {
            return Err(MachineError::InvalidAccessSize { size });
        }
        let width = usize::try_from(size).map_err(|_| MachineError::InvalidAccessSize { size })?;
        let value = truncate_to_width(value, size);
        self.state
            .memory
            .check_access(address, u64::from(size), Permissions::WRITE)?;

        for entry in self
            .write_hooks
            .iter_mut()
            .filter(|entry| entry.range.contains(address))
        {
            entry.hook.on_write(&self.state, address, size, value)?;
        }

        self.state.memory.write(address, &value.to_le_bytes()[..width])?;
        Ok(())
    }

    fn allocate_handle(&mut self) -> HookHandle {
        let handle = HookHandle(self.next_handle);
        self.next_handle += 1;
        handle
    }
}

/// Keeps the low `size` bytes of `value`; `size` must be `1..=8`.
const fn truncate_to_width(value: u64, size: u32) -> u64 {
    if size >= MAX_WRITE_WIDTH {
        value
    } else {
        value & ((1 << (size * 8)) - 1)
    }
}

impl std::fmt::Debug for Machine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Machine")
            .field("state", &self.state)
            .field("read_hooks", &self.read_hooks.len())
            .field("write_hooks", &self.write_hooks.len())
            .finish()
    }
}
