/*
   Copyright 2018 Ilya Epifanov

   Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
   http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
   http://opensource.org/licenses/MIT>, at your option. This file may not be
   copied, modified, or distributed except according to those terms.
*/

use crate::regs::RegisterBank;
use spin::Mutex;

/// Access to APMU registers shared by every PLL: the PLL gate register and
/// the global clock control register.
///
/// Each PLL instance only serializes its own registers. Anything another
/// instance may touch at the same time goes through this handle, which
/// holds the SoC-wide lock for the duration of one read-modify-write.
pub struct GlobalCtrl<'a, B> {
    bank: &'a B,
    lock: &'a Mutex<()>,
}

impl<'a, B> Clone for GlobalCtrl<'a, B> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, B> Copy for GlobalCtrl<'a, B> {}

impl<'a, B: RegisterBank> GlobalCtrl<'a, B> {
    pub fn new(bank: &'a B, lock: &'a Mutex<()>) -> Self {
        GlobalCtrl { bank, lock }
    }

    pub fn modify(&self, offset: u32, clear: u32, set: u32) {
        let _guard = self.lock.lock();
        self.bank.modify(offset, clear, set);
    }

    pub fn set_bits(&self, offset: u32, bits: u32) {
        self.modify(offset, 0, bits);
    }

    pub fn clear_bits(&self, offset: u32, bits: u32) {
        self.modify(offset, bits, 0);
    }

    pub fn read(&self, offset: u32) -> u32 {
        self.bank.read(offset)
    }
}
