//! Drives a script through a reference [`Machine`] with trace hooks installed.

use std::cell::{Ref, RefCell};
use std::io::{self, Write};
use std::rc::Rc;

use thiserror::Error;
use tracing::{debug, info};

use memtrace_core::{
    AccessDirection, Machine, MachineError, MemoryError, Permissions, TraceConfig,
};

use crate::script::{Directive, ScriptLine};

/// Default image load address.
pub const DEFAULT_BASE: u64 = 0x4000_0000;

/// Mapping granularity for loaded images.
pub const PAGE_SIZE: u64 = 0x1000;

/// Writer handle shared by every hook of one replay, preserving line order.
#[derive(Debug)]
pub struct SharedWriter<W>(Rc<RefCell<W>>);

impl<W> SharedWriter<W> {
    /// Wraps `inner`.
    pub fn new(inner: W) -> Self {
        Self(Rc::new(RefCell::new(inner)))
    }

    /// Borrows the wrapped writer.
    #[must_use]
    pub fn borrow(&self) -> Ref<'_, W> {
        self.0.borrow()
    }
}

impl<W> Clone for SharedWriter<W> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<W: Write> Write for SharedWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.borrow_mut().flush()
    }
}

/// Replay settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayOptions {
    /// Load address of the image.
    pub base: u64,
    /// Directions and windows to trace.
    pub trace: TraceConfig,
}

impl Default for ReplayOptions {
    fn default() -> Self {
        Self {
            base: DEFAULT_BASE,
            trace: TraceConfig::all(),
        }
    }
}

/// Counts of replayed guest accesses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReplaySummary {
    /// Guest loads performed.
    pub reads: usize,
    /// Guest stores performed.
    pub writes: usize,
}

/// Replay failures.
#[derive(Debug, Error)]
pub enum ReplayError {
    /// The image could not be mapped at the requested base.
    #[error("cannot map {len} byte image at 0x{base:x}: {source}")]
    Load {
        /// Requested base.
        base: u64,
        /// Image length.
        len: usize,
        /// Mapping failure.
        #[source]
        source: MemoryError,
    },
    /// A scripted access failed.
    #[error("line {line}: {source}")]
    Access {
        /// Script line of the access.
        line: usize,
        /// Engine or hook failure.
        #[source]
        source: MachineError,
    },
}

/// Size of the read/write mapping that holds an image of `len` bytes.
#[must_use]
pub const fn mapping_size(len: usize) -> u64 {
    let len = len as u64;
    if len == 0 {
        PAGE_SIZE
    } else {
        len.div_ceil(PAGE_SIZE) * PAGE_SIZE
    }
}

/// Maps `image` at `options.base`, installs trace hooks and runs `script`.
///
/// `make_sink` supplies the sink for each installed hook.
///
/// # Errors
///
/// Returns [`ReplayError::Load`] when the image cannot be mapped and
/// [`ReplayError::Access`] for the first failing scripted access.
pub fn run_replay<W, F>(
    image: &[u8],
    script: &[ScriptLine],
    options: &ReplayOptions,
    make_sink: F,
) -> Result<ReplaySummary, ReplayError>
where
    W: Write + 'static,
    F: FnMut(AccessDirection) -> W,
{
    let load_error = |source| ReplayError::Load {
        base: options.base,
        len: image.len(),
        source,
    };
    let mut machine = Machine::new();
    machine
        .map(
            options.base,
            mapping_size(image.len()),
            Permissions::READ | Permissions::WRITE,
        )
        .map_err(load_error)?;
    machine.load(options.base, image).map_err(load_error)?;

    let handles = options.trace.install(&mut machine, make_sink);
    debug!(hooks = handles.len(), base = options.base, "replay machine ready");

    let mut summary = ReplaySummary::default();
    for step in script {
        let access = |source| ReplayError::Access {
            line: step.line,
            source,
        };
        match step.directive {
            Directive::SetPc(value) => machine.set_pc(value),
            Directive::SetLr(value) => machine.set_lr(value),
            Directive::Read { address, size } => {
                machine.guest_read(address, size).map_err(access)?;
                summary.reads += 1;
            }
            Directive::Write {
                address,
                size,
                value,
            } => {
                machine
                    .guest_write(address, size, value)
                    .map_err(access)?;
                summary.writes += 1;
            }
        }
    }

    info!(
        reads = summary.reads,
        writes = summary.writes,
        "replay finished"
    );
    Ok(summary)
}
