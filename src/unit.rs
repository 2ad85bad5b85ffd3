/*
   Copyright 2018 Ilya Epifanov

   Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
   http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
   http://opensource.org/licenses/MIT>, at your option. This file may not be
   copied, modified, or distributed except according to those terms.
*/
//! PLL instances and the SoC-wide PLL set.

use crate::global::GlobalCtrl;
use crate::hal::blocking::delay::DelayUs;
use crate::out::PllOut;
use crate::regs::RegisterBank;
use crate::soc::{PllDesc, PLLS};
use crate::vco::PllVco;
use crate::{mhz, ClockStage, Error};
use core::array;
use log::info;
use spin::Mutex;

pub const PLL_COUNT: usize = 6;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PllId {
    Pll2,
    Pll3,
    Pll4,
    Pll5,
    Pll6,
    Pll7,
}

impl PllId {
    pub const ALL: [PllId; PLL_COUNT] = [
        PllId::Pll2,
        PllId::Pll3,
        PllId::Pll4,
        PllId::Pll5,
        PllId::Pll6,
        PllId::Pll7,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Output {
    Out,
    Outp,
}

impl Output {
    fn bit(self) -> u8 {
        1 << self as u8
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Stage {
    Vco,
    Output(Output),
}

/// The two register regions and the locks guarding them.
///
/// Lives as long as every PLL built from it; typically a `static`.
pub struct ClockBanks<B> {
    mpmu: B,
    apmu: B,
    pll_locks: [Mutex<()>; PLL_COUNT],
    glb_lock: Mutex<()>,
}

impl<B> ClockBanks<B> {
    pub const fn new(mpmu: B, apmu: B) -> Self {
        ClockBanks {
            mpmu,
            apmu,
            pll_locks: [
                Mutex::new(()),
                Mutex::new(()),
                Mutex::new(()),
                Mutex::new(()),
                Mutex::new(()),
                Mutex::new(()),
            ],
            glb_lock: Mutex::new(()),
        }
    }

    pub fn mpmu(&self) -> &B {
        &self.mpmu
    }

    pub fn apmu(&self) -> &B {
        &self.apmu
    }
}

/// One PLL: its VCO and the two dividers behind it.
pub struct PllUnit<'a, B> {
    id: PllId,
    ref_rate: u64,
    vco: PllVco<'a, B>,
    out: PllOut<'a, B>,
    outp: PllOut<'a, B>,
    users: u8,
}

impl<'a, B: RegisterBank> PllUnit<'a, B> {
    pub fn new(desc: &PllDesc, banks: &'a ClockBanks<B>, ref_rate: u64) -> Self {
        let lock = &banks.pll_locks[desc.id.index()];
        let global = GlobalCtrl::new(&banks.apmu, &banks.glb_lock);

        PllUnit {
            id: desc.id,
            ref_rate,
            vco: PllVco::new(
                desc.vco_name,
                desc.parent,
                desc.vco_flags,
                lock,
                &banks.mpmu,
                global,
                desc.vco,
                desc.vco_table,
            ),
            out: PllOut::new(
                desc.out_name,
                desc.vco_name,
                desc.out_flags,
                lock,
                &banks.mpmu,
                &banks.apmu,
                desc.out,
                desc.out_table,
            ),
            outp: PllOut::new(
                desc.outp_name,
                desc.vco_name,
                desc.outp_flags,
                lock,
                &banks.mpmu,
                &banks.apmu,
                desc.outp,
                desc.outp_table,
            ),
            users: 0,
        }
    }

    pub fn id(&self) -> PllId {
        self.id
    }

    pub fn vco(&self) -> &PllVco<'a, B> {
        &self.vco
    }

    pub fn vco_mut(&mut self) -> &mut PllVco<'a, B> {
        &mut self.vco
    }

    pub fn output(&self, output: Output) -> &PllOut<'a, B> {
        match output {
            Output::Out => &self.out,
            Output::Outp => &self.outp,
        }
    }

    pub fn output_mut(&mut self, output: Output) -> &mut PllOut<'a, B> {
        match output {
            Output::Out => &mut self.out,
            Output::Outp => &mut self.outp,
        }
    }

    pub fn stage_named(&self, name: &str) -> Option<Stage> {
        if self.vco.name() == name {
            Some(Stage::Vco)
        } else if self.out.name() == name {
            Some(Stage::Output(Output::Out))
        } else if self.outp.name() == name {
            Some(Stage::Output(Output::Outp))
        } else {
            None
        }
    }

    pub fn vco_rate(&self) -> u64 {
        self.vco.recalc_rate(self.ref_rate)
    }

    pub fn output_rate(&self, output: Output) -> u64 {
        self.output(output).recalc_rate(self.vco_rate())
    }

    pub fn set_vco_rate<D: DelayUs<u32>>(&mut self, rate: u64, delay: &mut D) -> Result<(), Error> {
        let mut prate = self.ref_rate;
        let freq = self.vco.round_rate(rate, &mut prate)?;
        self.vco.set_rate(&freq, prate, delay)
    }

    /// Sets one output, moving the VCO first if the divider needs it
    /// elsewhere. Moving the VCO requires it to be disabled.
    pub fn set_output_rate<D: DelayUs<u32>>(
        &mut self,
        output: Output,
        rate: u64,
        delay: &mut D,
    ) -> Result<(), Error> {
        let current = self.vco_rate();
        let mut prate = current;
        let freq = self.output(output).round_rate(rate, &mut prate)?;

        if mhz(prate) != mhz(current) {
            self.set_vco_rate(prate, delay)?;
        }

        let vco_rate = self.vco_rate();
        self.output_mut(output).set_rate(&freq, vco_rate, delay)
    }

    /// Enables an output. The VCO comes up with the first output.
    pub fn enable_output<D: DelayUs<u32>>(
        &mut self,
        output: Output,
        delay: &mut D,
    ) -> Result<(), Error> {
        if self.users == 0 {
            self.vco.enable(delay)?;
        }
        self.output_mut(output).enable(delay)?;
        self.users |= output.bit();
        Ok(())
    }

    /// Disables an output. The VCO goes down with the last one.
    pub fn disable_output(&mut self, output: Output) {
        if self.users & output.bit() == 0 {
            return;
        }
        self.output_mut(output).disable();
        self.users &= !output.bit();
        if self.users == 0 {
            self.vco.disable();
        }
    }

    pub fn is_output_enabled(&self, output: Output) -> bool {
        self.users & output.bit() != 0
    }

    /// Programs the first table entry of every stage.
    ///
    /// A VCO already running under firmware keeps its rate.
    pub fn init<D: DelayUs<u32>>(&mut self, delay: &mut D) -> Result<(), Error> {
        let ref_rate = self.ref_rate;
        if let Some(freq) = self.vco.table().first().copied() {
            match self.vco.set_rate(&freq, ref_rate, delay) {
                Ok(()) => {}
                Err(Error::PermissionDenied) => {
                    info!("{}: left running by firmware", self.vco.name())
                }
                Err(err) => return Err(err),
            }
        }

        let vco_rate = self.vco_rate();
        for &output in [Output::Out, Output::Outp].iter() {
            if let Some(freq) = self.output(output).table().first().copied() {
                self.output_mut(output).set_rate(&freq, vco_rate, delay)?;
            }
        }

        info!(
            "{}: {} Hz, out {} Hz, outp {} Hz",
            self.vco.name(),
            vco_rate,
            self.output_rate(Output::Out),
            self.output_rate(Output::Outp)
        );
        Ok(())
    }
}

/// PLL2 to PLL7.
pub struct Pxa1928Plls<'a, B> {
    units: [PllUnit<'a, B>; PLL_COUNT],
}

impl<'a, B: RegisterBank> Pxa1928Plls<'a, B> {
    pub fn new(banks: &'a ClockBanks<B>, ref_rate: u64) -> Self {
        Pxa1928Plls {
            units: array::from_fn(|index| PllUnit::new(&PLLS[index], banks, ref_rate)),
        }
    }

    /// Programs every PLL to its boot operating point.
    pub fn init<D: DelayUs<u32>>(&mut self, delay: &mut D) -> Result<(), Error> {
        for unit in self.units.iter_mut() {
            unit.init(delay)?;
        }
        Ok(())
    }

    pub fn unit(&self, id: PllId) -> &PllUnit<'a, B> {
        &self.units[id.index()]
    }

    pub fn unit_mut(&mut self, id: PllId) -> &mut PllUnit<'a, B> {
        &mut self.units[id.index()]
    }

    pub fn units(&self) -> &[PllUnit<'a, B>] {
        &self.units
    }

    /// Looks a stage up by its clock name, e.g. `"pll5_outp"`.
    pub fn find(&self, name: &str) -> Option<(PllId, Stage)> {
        self.units
            .iter()
            .find_map(|unit| unit.stage_named(name).map(|stage| (unit.id, stage)))
    }
}
