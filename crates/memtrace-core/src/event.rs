//! Per-callback access records and their diagnostic-line rendering.

use std::fmt;

use crate::{format_read_value, format_write_value, RegisterContext};

/// Direction a hook instance observes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum AccessDirection {
    /// Memory loads.
    Read,
    /// Memory stores.
    Write,
}

impl AccessDirection {
    /// Upper-case label used in diagnostic lines.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Read => "READ",
            Self::Write => "WRITE",
        }
    }
}

impl fmt::Display for AccessDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Raw observation carried by an access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessPayload<'a> {
    /// Bytes fetched from emulated memory for a read.
    Read {
        /// Exactly `size` bytes starting at the access address.
        data: &'a [u8],
    },
    /// Value handed over by the engine for a write.
    Write {
        /// Value being stored, at the engine's width.
        value: u64,
    },
}

/// One traced access, built per callback and discarded afterwards.
///
/// `Display` renders the stable diagnostic line:
///
/// `### Memory READ at 0x<addr>, data size = <size>, data value = <value> pc=<pc> lr=<lr>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryAccessEvent<'a> {
    /// Virtual address of the access.
    pub address: u64,
    /// Access width as reported by the engine.
    pub size: u32,
    /// Observed bytes or value.
    pub payload: AccessPayload<'a>,
    /// Rendered value.
    pub formatted_value: String,
    /// Program counter rendering at callback time.
    pub pc: String,
    /// Link register rendering at callback time.
    pub lr: String,
}

impl<'a> MemoryAccessEvent<'a> {
    /// Builds a read event from fetched bytes.
    #[must_use]
    pub fn read<C>(context: &C, address: u64, size: u32, data: &'a [u8]) -> Self
    where
        C: RegisterContext + ?Sized,
    {
        Self {
            address,
            size,
            payload: AccessPayload::Read { data },
            formatted_value: format_read_value(data),
            pc: context.pc_pointer().to_string(),
            lr: context.lr_pointer().to_string(),
        }
    }

    /// Builds a write event from the engine-supplied value.
    #[must_use]
    pub fn write<C>(context: &C, address: u64, size: u32, value: u64) -> Self
    where
        C: RegisterContext + ?Sized,
    {
        Self {
            address,
            size,
            payload: AccessPayload::Write { value },
            formatted_value: format_write_value(value),
            pc: context.pc_pointer().to_string(),
            lr: context.lr_pointer().to_string(),
        }
    }

    /// Direction implied by the payload.
    #[must_use]
    pub const fn direction(&self) -> AccessDirection {
        match self.payload {
            AccessPayload::Read { .. } => AccessDirection::Read,
            AccessPayload::Write { .. } => AccessDirection::Write,
        }
    }
}

impl fmt::Display for MemoryAccessEvent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "### Memory {} at 0x{:x}, data size = {}, data value = {} pc={} lr={}",
            self.direction(),
            self.address,
            self.size,
            self.formatted_value,
            self.pc,
            self.lr
        )
    }
}

#[cfg(test)]
mod tests {
    use super::{AccessDirection, AccessPayload, MemoryAccessEvent};
    use crate::RegisterContext;

    struct FixedContext;

    impl RegisterContext for FixedContext {
        type Pointer = &'static str;

        fn pc_pointer(&self) -> Self::Pointer {
            "RX@0x40001234[libdemo.so]0x1234"
        }

        fn lr_pointer(&self) -> Self::Pointer {
            "null"
        }
    }

    #[test]
    fn read_line_matches_trace_format() {
        let data = [0x2A, 0x00, 0x00, 0x00];
        let event = MemoryAccessEvent::read(&FixedContext, 0xBFFF_F000, 4, &data);

        assert_eq!(event.direction(), AccessDirection::Read);
        assert_eq!(event.payload, AccessPayload::Read { data: &data });
        assert_eq!(
            event.to_string(),
            "### Memory READ at 0xbffff000, data size = 4, data value = 0x2a \
             pc=RX@0x40001234[libdemo.so]0x1234 lr=null"
        );
    }

    #[test]
    fn write_line_ignores_size_when_rendering_value() {
        let event = MemoryAccessEvent::write(&FixedContext, 0x10, 1, 0x1FF);

        assert_eq!(event.direction(), AccessDirection::Write);
        assert_eq!(
            event.to_string(),
            "### Memory WRITE at 0x10, data size = 1, data value = 0x1ff \
             pc=RX@0x40001234[libdemo.so]0x1234 lr=null"
        );
    }

    #[test]
    fn direction_labels_are_upper_case() {
        assert_eq!(AccessDirection::Read.to_string(), "READ");
        assert_eq!(AccessDirection::Write.to_string(), "WRITE");
    }
}
