//! Instruction sampling.
//!
//! Records one tick per executed instruction, keyed by (method id, opcode
//! byte), and dumps them as `*MPROF* <method_id>:<opcode>` lines for the
//! offline histogram tooling.

use std::io::{self, Write};

use fnv::FnvHashMap;

use crate::meta::MethodId;

/// A per-thread tick histogram.
#[derive(Debug, Default)]
pub struct Profile {
    ticks: FnvHashMap<(MethodId, u8), u64>,
}

impl Profile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one executed instruction.
    pub fn record(&mut self, method: MethodId, opcode: u8) {
        *self.ticks.entry((method, opcode)).or_insert(0) += 1;
    }

    /// Ticks recorded for one (method, opcode) pair.
    pub fn ticks(&self, method: MethodId, opcode: u8) -> u64 {
        self.ticks.get(&(method, opcode)).copied().unwrap_or(0)
    }

    /// Total ticks recorded.
    pub fn total(&self) -> u64 {
        self.ticks.values().sum()
    }

    /// Write one trace line per recorded tick, in a stable order.
    pub fn dump<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let mut keys: Vec<_> = self.ticks.iter().collect();
        keys.sort();
        for (&(method, opcode), &count) in keys {
            for _ in 0..count {
                writeln!(out, "*MPROF* {method}:{opcode}")?;
            }
        }
        Ok(())
    }
}
