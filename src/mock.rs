/*
   Copyright 2018 Ilya Epifanov

   Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
   http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
   http://opensource.org/licenses/MIT>, at your option. This file may not be
   copied, modified, or distributed except according to those terms.
*/
//! Test doubles for the register banks and the delay provider.

use crate::hal::blocking::delay::DelayUs;
use crate::regs::RegisterBank;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

/// Write order across several banks, as `(bank, offset)`.
pub type Trace = Rc<RefCell<Vec<(&'static str, u32)>>>;

/// A register bank backed by a map. Unwritten registers read as zero.
#[derive(Default)]
pub struct MockBank {
    regs: RefCell<BTreeMap<u32, u32>>,
    sticky: RefCell<BTreeMap<u32, u32>>,
    writes: RefCell<Vec<(u32, u32)>>,
    trace: Option<(&'static str, Trace)>,
}

impl MockBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// A bank that also appends its writes to `trace` under `bank`.
    pub fn traced(bank: &'static str, trace: &Trace) -> Self {
        MockBank {
            trace: Some((bank, Rc::clone(trace))),
            ..Self::default()
        }
    }

    /// Sets a register without logging a write.
    pub fn preset(&self, offset: u32, value: u32) {
        self.regs.borrow_mut().insert(offset, value);
    }

    /// Bits that always read back as set, like a status bit driven by
    /// hardware.
    pub fn stick(&self, offset: u32, bits: u32) {
        *self.sticky.borrow_mut().entry(offset).or_insert(0) |= bits;
    }

    pub fn peek(&self, offset: u32) -> u32 {
        self.read(offset)
    }

    pub fn writes(&self) -> Vec<(u32, u32)> {
        self.writes.borrow().clone()
    }

    pub fn written_offsets(&self) -> Vec<u32> {
        self.writes.borrow().iter().map(|&(offset, _)| offset).collect()
    }

    pub fn clear_log(&self) {
        self.writes.borrow_mut().clear();
    }
}

impl RegisterBank for MockBank {
    fn read(&self, offset: u32) -> u32 {
        let value = self.regs.borrow().get(&offset).copied().unwrap_or(0);
        value | self.sticky.borrow().get(&offset).copied().unwrap_or(0)
    }

    fn write(&self, offset: u32, value: u32) {
        self.regs.borrow_mut().insert(offset, value);
        self.writes.borrow_mut().push((offset, value));
        if let Some((bank, trace)) = &self.trace {
            trace.borrow_mut().push((bank, offset));
        }
    }
}

/// Records requested delays instead of waiting.
#[derive(Default)]
pub struct NoDelay {
    pub calls: u32,
    pub total_us: u64,
}

impl DelayUs<u32> for NoDelay {
    fn delay_us(&mut self, us: u32) {
        self.calls += 1;
        self.total_us += u64::from(us);
    }
}
