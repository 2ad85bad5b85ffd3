/*
   Copyright 2018 Ilya Epifanov

   Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
   http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
   http://opensource.org/licenses/MIT>, at your option. This file may not be
   copied, modified, or distributed except according to those terms.
*/
//! Post-dividers behind a VCO.

use crate::hal::blocking::delay::DelayUs;
use crate::regs::{field_get, field_mask, PllFlags, RegisterBank};
use crate::table::{lookup, OutFreq, DIV_3};
use crate::{mhz, ClockStage, Error};
use log::{debug, warn};
use spin::Mutex;

/// Fixed description of one output divider.
///
/// `reg_pll_out_div` is in the MPMU bank, or in the APMU bank for dividers
/// flagged [`PllFlags::USE_SYNC_DDR`]. `reg_pll_out_misc` is always in the
/// APMU bank. The `*_bit` fields are masks within it.
#[derive(Debug, Copy, Clone)]
pub struct OutParams {
    pub input_rate_min: u64,
    pub reg_pll_out_div: u32,
    pub div_width: u32,
    pub div_shift: u32,
    pub reg_pll_out_misc: u32,
    pub not_div3_bit: u32,
    pub sync_ddr_bit: u32,
    pub enable_bit: u32,
}

pub struct PllOut<'a, B> {
    name: &'static str,
    parent: &'static str,
    flags: PllFlags,
    lock: &'a Mutex<()>,
    div_bank: &'a B,
    misc_bank: &'a B,
    params: OutParams,
    table: &'static [OutFreq],
}

fn scaled(rate: u64, shift: u32) -> u64 {
    rate.checked_mul(1u64 << shift).unwrap_or(u64::MAX)
}

impl<'a, B: RegisterBank> PllOut<'a, B> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: &'static str,
        parent: &'static str,
        flags: PllFlags,
        lock: &'a Mutex<()>,
        mpmu: &'a B,
        apmu: &'a B,
        params: OutParams,
        table: &'static [OutFreq],
    ) -> Self {
        let div_bank = if flags.contains(PllFlags::USE_SYNC_DDR) {
            apmu
        } else {
            mpmu
        };
        PllOut {
            name,
            parent,
            flags,
            lock,
            div_bank,
            misc_bank: apmu,
            params,
            table,
        }
    }

    pub fn params(&self) -> &OutParams {
        &self.params
    }

    pub fn table(&self) -> &'static [OutFreq] {
        self.table
    }

    /// Largest shift the divider field can hold. The divide-by-three
    /// sentinel stays out of reach.
    pub fn max_shift(&self) -> u32 {
        let field = ((1u64 << self.params.div_width) - 1) as u32;
        field.min(u32::from(DIV_3) - 1)
    }

    pub fn get_table_rate(&self, input_rate: u64, output_rate: u64) -> Result<OutFreq, Error> {
        lookup(self.table, input_rate, output_rate)
    }

    /// Finds a divider producing `rate` from `prate`.
    ///
    /// When no divider fits the current parent rate, the result asks for
    /// the parent to run at `rate << shift`, the smallest such rate not
    /// below `input_rate_min`. That request is in the returned
    /// `input_rate`.
    pub fn calc_rate(&self, rate: u64, prate: u64) -> Result<OutFreq, Error> {
        if rate == 0 {
            return Err(Error::InvalidRate);
        }
        let max_shift = self.max_shift();

        let mut found = None;
        if self.flags.contains(PllFlags::USE_DIV_3) && mhz(rate.saturating_mul(3)) == mhz(prate) {
            found = Some(DIV_3);
        } else {
            for shift in 0..=max_shift {
                if mhz(scaled(rate, shift)) == mhz(prate) {
                    found = Some(shift as u8);
                    break;
                }
            }
        }

        let (mut div_sel, mut input_rate) = match found {
            Some(div_sel) => (div_sel, prate),
            None => {
                let mut shift = 0;
                while scaled(rate, shift) < self.params.input_rate_min {
                    shift += 1;
                    if shift > max_shift {
                        warn!("{}: no divider reaches {} Hz", self.name, rate);
                        return Err(Error::InvalidRate);
                    }
                }
                (shift as u8, scaled(rate, shift))
            }
        };

        // The divider misbehaves at shift 0.
        if div_sel == 0 {
            div_sel = 1;
            input_rate = scaled(rate, 1);
        }

        let mut freq = OutFreq::new(input_rate, 0, div_sel);
        freq.output_rate = freq.divided(input_rate);
        Ok(freq)
    }

    fn misc(&self) -> u32 {
        self.misc_bank.read(self.params.reg_pll_out_misc)
    }

    fn check_setting(&self, freq: &OutFreq) -> Result<(), Error> {
        let usable = if freq.is_div_3() {
            self.flags.contains(PllFlags::USE_DIV_3)
        } else {
            u32::from(freq.div_sel) <= self.max_shift()
        };
        if usable {
            Ok(())
        } else {
            warn!("{}: unusable divider {}", self.name, freq.div_sel);
            Err(Error::InvalidRate)
        }
    }
}

impl<'a, B: RegisterBank> ClockStage for PllOut<'a, B> {
    type Setting = OutFreq;

    fn name(&self) -> &'static str {
        self.name
    }

    fn parent_name(&self) -> &'static str {
        self.parent
    }

    fn is_enabled(&self) -> bool {
        if !self.flags.contains(PllFlags::USE_ENABLE_BIT) {
            return true;
        }
        self.misc() & self.params.enable_bit != 0
    }

    fn enable<D: DelayUs<u32>>(&mut self, _delay: &mut D) -> Result<(), Error> {
        if self.flags.contains(PllFlags::USE_ENABLE_BIT) {
            let _guard = self.lock.lock();
            self.misc_bank
                .modify(self.params.reg_pll_out_misc, 0, self.params.enable_bit);
        }
        Ok(())
    }

    fn disable(&mut self) {
        if self.flags.contains(PllFlags::USE_ENABLE_BIT) {
            let _guard = self.lock.lock();
            self.misc_bank
                .modify(self.params.reg_pll_out_misc, self.params.enable_bit, 0);
        }
    }

    fn recalc_rate(&self, parent_rate: u64) -> u64 {
        let p = &self.params;
        if self.flags.contains(PllFlags::USE_DIV_3) && self.misc() & p.not_div3_bit == 0 {
            return parent_rate / 3;
        }
        let shift = field_get(self.div_bank.read(p.reg_pll_out_div), p.div_width, p.div_shift);
        parent_rate >> shift
    }

    fn round_rate(&self, rate: u64, parent_rate: &mut u64) -> Result<OutFreq, Error> {
        let freq = match self.get_table_rate(*parent_rate, rate) {
            Ok(freq) => freq,
            Err(_) => self.calc_rate(rate, *parent_rate)?,
        };
        *parent_rate = freq.input_rate;
        Ok(freq)
    }

    fn set_rate<D: DelayUs<u32>>(
        &mut self,
        freq: &OutFreq,
        parent_rate: u64,
        _delay: &mut D,
    ) -> Result<(), Error> {
        self.check_setting(freq)?;
        if mhz(freq.divided(parent_rate)) == mhz(self.recalc_rate(parent_rate)) {
            return Ok(());
        }

        let p = self.params;
        {
            let _guard = self.lock.lock();
            if !freq.is_div_3() {
                self.div_bank.modify(
                    p.reg_pll_out_div,
                    field_mask(p.div_width, p.div_shift),
                    u32::from(freq.div_sel) << p.div_shift,
                );
            }
            if self.flags.contains(PllFlags::USE_DIV_3) {
                if freq.is_div_3() {
                    self.misc_bank.modify(p.reg_pll_out_misc, p.not_div3_bit, 0);
                } else {
                    self.misc_bank.modify(p.reg_pll_out_misc, 0, p.not_div3_bit);
                }
            }
            if self.flags.contains(PllFlags::USE_SYNC_DDR) {
                self.misc_bank.modify(p.reg_pll_out_misc, 0, p.sync_ddr_bit);
            }
        }
        debug!(
            "{}: div_sel {} -> {} Hz",
            self.name,
            freq.div_sel,
            freq.divided(parent_rate)
        );

        Ok(())
    }
}
