//! Register snapshot exposed to hooks by the reference engine.

use std::fmt;

use crate::RegisterContext;

/// Emulated pointer as printed in trace lines.
///
/// Zero renders as `null`, anything else as `0x`-prefixed lowercase hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Pointer(pub u64);

impl fmt::Display for Pointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == 0 {
            f.write_str("null")
        } else {
            write!(f, "0x{:x}", self.0)
        }
    }
}

/// Program counter and link register of the reference engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Registers {
    pc: u64,
    lr: u64,
}

impl Registers {
    /// Reads `PC`.
    #[must_use]
    pub const fn pc(&self) -> u64 {
        self.pc
    }

    /// Writes `PC`.
    pub const fn set_pc(&mut self, value: u64) {
        self.pc = value;
    }

    /// Reads `LR`.
    #[must_use]
    pub const fn lr(&self) -> u64 {
        self.lr
    }

    /// Writes `LR`.
    pub const fn set_lr(&mut self, value: u64) {
        self.lr = value;
    }
}

impl RegisterContext for Registers {
    type Pointer = Pointer;

    fn pc_pointer(&self) -> Pointer {
        Pointer(self.pc)
    }

    fn lr_pointer(&self) -> Pointer {
        Pointer(self.lr)
    }
}
