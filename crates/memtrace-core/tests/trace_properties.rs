//! Property coverage for value rendering and hook dispatch invariants.

#![allow(clippy::pedantic, clippy::nursery)]

use std::sync::{Arc, Mutex};

use memtrace_core::{
    format_read_value, format_write_value, AccessDirection, Emulator, ListenerError, MemoryError,
    MemoryHook, MemoryTraceHook, RegisterContext, TraceError,
};
use proptest::prelude::*;
use rstest as _;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;
use tracing as _;

struct Regs;

impl RegisterContext for Regs {
    type Pointer = &'static str;

    fn pc_pointer(&self) -> Self::Pointer {
        "0x40000100"
    }

    fn lr_pointer(&self) -> Self::Pointer {
        "0x40000080"
    }
}

/// Engine whose memory repeats a fixed pattern, or fails every fetch.
struct PatternEngine {
    pattern: Vec<u8>,
    fail_reads: bool,
    fetches: Mutex<u32>,
}

impl PatternEngine {
    fn new(pattern: Vec<u8>) -> Self {
        Self {
            pattern,
            fail_reads: false,
            fetches: Mutex::new(0),
        }
    }

    fn failing() -> Self {
        Self {
            fail_reads: true,
            ..Self::new(Vec::new())
        }
    }

    fn fetch_count(&self) -> u32 {
        *self.fetches.lock().unwrap()
    }
}

impl Emulator for PatternEngine {
    type Context = Regs;

    fn context(&self) -> &Regs {
        &Regs
    }

    fn mem_read(&self, address: u64, size: u32) -> Result<Vec<u8>, MemoryError> {
        *self.fetches.lock().unwrap() += 1;
        if self.fail_reads {
            return Err(MemoryError::Unmapped {
                address,
                size: u64::from(size),
            });
        }
        Ok(self
            .pattern
            .iter()
            .copied()
            .cycle()
            .take(size as usize)
            .collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Seen {
    Read {
        address: u64,
        data: Vec<u8>,
        value: String,
    },
    Write {
        address: u64,
        size: u32,
        value: u64,
    },
}

type Log = Arc<Mutex<Vec<Seen>>>;

fn hook_with_listeners(
    direction: AccessDirection,
    log: &Log,
) -> MemoryTraceHook<PatternEngine, Vec<u8>> {
    let mut hook = MemoryTraceHook::with_sink(direction, Vec::new());
    let log = Arc::clone(log);
    match direction {
        AccessDirection::Read => hook.set_read_listener(
            move |_: &PatternEngine,
                  address: u64,
                  data: &[u8],
                  value: &str|
                  -> Result<(), ListenerError> {
                log.lock().unwrap().push(Seen::Read {
                    address,
                    data: data.to_vec(),
                    value: value.to_string(),
                });
                Ok(())
            },
        ),
        AccessDirection::Write => hook.set_write_listener(
            move |_: &PatternEngine,
                  address: u64,
                  size: u32,
                  value: u64|
                  -> Result<(), ListenerError> {
                log.lock().unwrap().push(Seen::Write {
                    address,
                    size,
                    value,
                });
                Ok(())
            },
        ),
    }
    hook
}

#[test]
fn documented_examples_render_exactly() {
    assert_eq!(format_read_value(&[0x01, 0x00, 0x00, 0x00]), "0x1");
    assert_eq!(format_read_value(&[0xAB, 0xCD]), "abcd");
    assert_eq!(format_write_value(42), "0x2a");
}

#[test]
fn fatal_read_failure_emits_nothing() {
    let log = Log::default();
    let mut hook = hook_with_listeners(AccessDirection::Read, &log);
    let engine = PatternEngine::failing();

    let err = hook.on_read(&engine, 0x8000, 4).unwrap_err();

    assert!(err.is_engine_failure());
    assert!(matches!(
        err,
        TraceError::MemoryRead {
            source: MemoryError::Unmapped { address: 0x8000, size: 4 },
            ..
        }
    ));
    assert!(hook.sink().is_empty());
    assert!(log.lock().unwrap().is_empty());
}

#[test]
fn write_hook_never_fetches_memory_on_read_callback() {
    let log = Log::default();
    let mut hook = hook_with_listeners(AccessDirection::Write, &log);
    let engine = PatternEngine::failing();

    hook.on_read(&engine, 0x8000, 4).expect("ignored read");

    assert_eq!(engine.fetch_count(), 0);
    assert!(hook.sink().is_empty());
}

proptest! {
    #[test]
    fn four_byte_reads_are_little_endian_words(bytes in any::<[u8; 4]>()) {
        let expected = format!("0x{:x}", u32::from_le_bytes(bytes));
        prop_assert_eq!(format_read_value(&bytes), expected);
    }

    #[test]
    fn other_reads_are_unprefixed_hex_dumps(
        bytes in proptest::collection::vec(any::<u8>(), 0..32)
            .prop_filter("not a word", |b| b.len() != 4)
    ) {
        let rendered = format_read_value(&bytes);
        prop_assert_eq!(rendered.len(), bytes.len() * 2);
        for (index, byte) in bytes.iter().enumerate() {
            let digits = &rendered[index * 2..index * 2 + 2];
            prop_assert_eq!(u8::from_str_radix(digits, 16).unwrap(), *byte);
            prop_assert_eq!(digits, digits.to_lowercase());
        }
    }

    #[test]
    fn writes_are_prefixed_hex_regardless_of_size(value in any::<u64>(), size in 1u32..=8) {
        let log = Log::default();
        let mut hook = hook_with_listeners(AccessDirection::Write, &log);
        hook.on_write(&PatternEngine::new(Vec::new()), 0x1000, size, value).unwrap();

        let line = String::from_utf8(hook.into_sink()).unwrap();
        let expected_value = format!("data value = 0x{value:x} ");
        let expected_size = format!("data size = {size},");
        prop_assert!(line.contains(&expected_value));
        prop_assert!(line.contains(&expected_size));
        prop_assert_eq!(format_write_value(value), format!("0x{value:x}"));
    }

    #[test]
    fn read_hook_ignores_write_callbacks(
        address in any::<u64>(),
        size in any::<u32>(),
        value in any::<u64>(),
    ) {
        let log = Log::default();
        let mut hook = hook_with_listeners(AccessDirection::Read, &log);
        hook.on_write(&PatternEngine::new(vec![1, 2, 3]), address, size, value).unwrap();

        prop_assert!(hook.sink().is_empty());
        prop_assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn write_hook_ignores_read_callbacks(address in any::<u64>(), size in 0u32..64) {
        let log = Log::default();
        let mut hook = hook_with_listeners(AccessDirection::Write, &log);
        hook.on_read(&PatternEngine::new(vec![9]), address, size).unwrap();

        prop_assert!(hook.sink().is_empty());
        prop_assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn read_listener_sees_exactly_what_was_logged(
        address in any::<u64>(),
        pattern in proptest::collection::vec(any::<u8>(), 1..8),
        size in 1u32..16,
    ) {
        let log = Log::default();
        let mut hook = hook_with_listeners(AccessDirection::Read, &log);
        let engine = PatternEngine::new(pattern);

        hook.on_read(&engine, address, size).unwrap();

        let seen = log.lock().unwrap().clone();
        prop_assert_eq!(seen.len(), 1);
        let Seen::Read { address: seen_address, data, value } = &seen[0] else {
            return Err(TestCaseError::fail("read listener not invoked"));
        };
        prop_assert_eq!(*seen_address, address);
        prop_assert_eq!(data.len(), size as usize);
        prop_assert_eq!(value, &format_read_value(data));

        let line = String::from_utf8(hook.into_sink()).unwrap();
        prop_assert_eq!(
            line,
            format!(
                "### Memory READ at 0x{address:x}, data size = {size}, data value = {value} \
                 pc=0x40000100 lr=0x40000080\n"
            )
        );
    }

    #[test]
    fn write_listener_sees_exactly_what_was_logged(
        address in any::<u64>(),
        size in 1u32..=8,
        value in any::<u64>(),
    ) {
        let log = Log::default();
        let mut hook = hook_with_listeners(AccessDirection::Write, &log);

        hook.on_write(&PatternEngine::new(Vec::new()), address, size, value).unwrap();

        let seen = log.lock().unwrap();
        prop_assert_eq!(
            seen.as_slice(),
            &[Seen::Write { address, size, value }]
        );
        prop_assert_eq!(hook.sink().iter().filter(|b| **b == b'\n').count(), 1);
    }
}
