#![no_main]

use libfuzzer_sys::fuzz_target;
use memtrace_core::{
    format_read_value, AccessDirection, Machine, MemoryHook, MemoryTraceHook, Permissions,
    TraceRange,
};

const BASE: u64 = 0x1000;

fuzz_target!(|data: &[u8]| {
    if data.len() < 13 {
        return;
    }

    let _ = format_read_value(&data[13..]);

    let offset = u64::from(u16::from_le_bytes([data[0], data[1]]));
    let size = u32::from(data[2]);
    let value = u64::from_le_bytes([
        data[3], data[4], data[5], data[6], data[7], data[8], data[9], data[10],
    ]);
    let write_first = data[11] & 1 == 1;

    let mut machine = Machine::new();
    if machine.map(BASE, 0x1_0000, Permissions::ALL).is_err() {
        return;
    }
    let _ = machine.load(BASE, &data[12..]);
    machine.set_pc(u64::from(data[12]));
    machine.hook_read(
        TraceRange::ALL,
        MemoryTraceHook::with_sink(AccessDirection::Read, std::io::sink()),
    );
    machine.hook_write(
        TraceRange::ALL,
        MemoryTraceHook::with_sink(AccessDirection::Write, std::io::sink()),
    );

    let address = BASE.wrapping_add(offset);
    if write_first {
        let _ = machine.guest_write(address, size, value);
    }
    let _ = machine.guest_read(address, size);

    // Direct callbacks against a sparse state must never panic, even unmapped.
    let mut hook = MemoryTraceHook::with_sink(AccessDirection::Read, std::io::sink());
    let _ = hook.on_read(machine.state(), address.wrapping_mul(3), size);
    let _ = hook.on_write(machine.state(), address, size, value);
});
