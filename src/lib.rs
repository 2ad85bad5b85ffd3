/*
   Copyright 2018 Ilya Epifanov

   Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
   http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
   http://opensource.org/licenses/MIT>, at your option. This file may not be
   copied, modified, or distributed except according to those terms.
*/
/*!
A platform agnostic Rust driver for the PLLs of the Marvell [PXA1928] clock
tree, based on the [`embedded-hal`] traits.

## The Device

The PXA1928 application processor derives its fast clocks from six PLLs
(PLL2 to PLL7). Each PLL is a VCO locked to the 26 MHz reference, followed
by two independent post-dividers, `out` and `outp`.

Control registers live in two MMIO regions: the MPMU holds the PLL-internal
control words and the APMU holds gating and output-stage control.

## Usage

Provide the two register banks and a delay provider (differs between
`embedded_hal` implementations):

```ignore
use pxa1928_pll::{ClockBanks, Mmio, Pxa1928Plls, PllId, Output};

let banks = ClockBanks::new(
    unsafe { Mmio::new(MPMU_BASE) },
    unsafe { Mmio::new(APMU_BASE) },
);
let mut plls = Pxa1928Plls::new(&banks, 26_000_000);
plls.init(&mut delay)?;
```

Then request a rate on one of the outputs:

```ignore
let pll2 = plls.unit_mut(PllId::Pll2);
pll2.set_output_rate(Output::Out, 797_333_333, &mut delay)?;
pll2.enable_output(Output::Out, &mut delay)?;
```

Every stage also implements [`ClockStage`] directly, for callers that drive
the VCO and its dividers themselves. Rate selection is explicit: the
setting returned by `round_rate` is the one handed to `set_rate`.

[PXA1928]: https://www.marvell.com
[`embedded-hal`]: https://github.com/japaric/embedded-hal
*/
#![cfg_attr(not(test), no_std)]
#![deny(warnings)]

#[macro_use]
extern crate bitflags;
use embedded_hal as hal;

use crate::hal::blocking::delay::DelayUs;
use core::fmt;

mod global;
#[cfg(test)]
mod mock;
mod out;
mod regs;
pub mod soc;
mod table;
mod unit;
mod vco;

pub use crate::global::GlobalCtrl;
pub use crate::out::{OutParams, PllOut};
pub use crate::regs::{Mmio, PllFlags, RegisterBank};
pub use crate::table::{OutFreq, VcoFreq, DIV_3};
pub use crate::unit::{ClockBanks, Output, PllId, PllUnit, Pxa1928Plls, Stage, PLL_COUNT};
pub use crate::vco::{kvco_for_rate, PllVco, SscMode, SscParams, VcoParams};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Error {
    /// No table entry for the requested pair. Callers fall back to calculation.
    NotFound,
    /// The rate is outside the stage's range or no divider setting reaches it.
    InvalidRate,
    /// The VCO must be disabled before its dividers are reprogrammed.
    PermissionDenied,
    /// The clock hardware is unusable. Continuing is unsafe.
    Fatal(Fatal),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Fatal {
    LockTimeout { pll: &'static str },
}

impl Error {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Fatal(_))
    }
}

impl fmt::Display for Fatal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fatal::LockTimeout { pll } => write!(f, "{} failed to lock", pll),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NotFound => f.write_str("no table entry for rate"),
            Error::InvalidRate => f.write_str("rate not achievable"),
            Error::PermissionDenied => f.write_str("rate change while enabled"),
            Error::Fatal(fatal) => write!(f, "fatal: {}", fatal),
        }
    }
}

/// Rates are compared in buckets of 2^20 Hz, not 10^6 Hz. The frequency
/// tables were tuned against this comparison, so it is kept as is.
#[inline]
pub(crate) fn mhz(rate: u64) -> u64 {
    rate >> 20
}

/// The clock-provider contract shared by the VCO and its output dividers.
///
/// `round_rate` performs the divider search and returns the chosen
/// [`Setting`](ClockStage::Setting); `set_rate` programs exactly that
/// setting. A stage may rewrite `parent_rate` in `round_rate` when it needs
/// its parent at a different rate.
pub trait ClockStage {
    type Setting;

    fn name(&self) -> &'static str;
    fn parent_name(&self) -> &'static str;

    fn is_enabled(&self) -> bool;
    fn enable<D: DelayUs<u32>>(&mut self, delay: &mut D) -> Result<(), Error>;
    fn disable(&mut self);

    fn recalc_rate(&self, parent_rate: u64) -> u64;
    fn round_rate(&self, rate: u64, parent_rate: &mut u64) -> Result<Self::Setting, Error>;
    fn set_rate<D: DelayUs<u32>>(
        &mut self,
        setting: &Self::Setting,
        parent_rate: u64,
        delay: &mut D,
    ) -> Result<(), Error>;
}
