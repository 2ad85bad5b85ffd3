/*
   Copyright 2018 Ilya Epifanov

   Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
   http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
   http://opensource.org/licenses/MIT>, at your option. This file may not be
   copied, modified, or distributed except according to those terms.
*/
//! Register access and PLL control-word layouts.

use core::ptr;

/// 32-bit register access at byte offsets within one MMIO region.
///
/// Accesses are relaxed: no barrier is implied between two calls.
pub trait RegisterBank {
    fn read(&self, offset: u32) -> u32;
    fn write(&self, offset: u32, value: u32);

    /// Clears `clear`, then sets `set`, in a single read-modify-write.
    fn modify(&self, offset: u32, clear: u32, set: u32) {
        let value = self.read(offset);
        self.write(offset, (value & !clear) | set);
    }
}

/// A memory-mapped register region.
#[derive(Debug)]
pub struct Mmio {
    base: usize,
}

impl Mmio {
    /// # Safety
    ///
    /// `base` must be the mapped address of a register region that stays
    /// valid for the lifetime of the returned value, and every offset later
    /// passed to it must be a 4-byte aligned register inside that region.
    pub const unsafe fn new(base: usize) -> Self {
        Mmio { base }
    }
}

impl RegisterBank for Mmio {
    fn read(&self, offset: u32) -> u32 {
        unsafe { ptr::read_volatile((self.base + offset as usize) as *const u32) }
    }

    fn write(&self, offset: u32, value: u32) {
        unsafe { ptr::write_volatile((self.base + offset as usize) as *mut u32, value) }
    }
}

bitflags! {
    /// Per-stage behaviour flags.
    pub struct PllFlags: u32 {
        /// Assert the stage's byte in the global clock control register
        /// after lock.
        const POST_ENABLE = 1 << 0;
        /// The divider can divide by three.
        const USE_DIV_3 = 1 << 1;
        /// The divider field lives in the APMU DDR-sync bank and every
        /// write is followed by a sync request.
        const USE_SYNC_DDR = 1 << 2;
        /// The output has a software enable bit. Outputs without one are
        /// always on.
        const USE_ENABLE_BIT = 1 << 3;
    }
}

// PLLx_CR
pub(crate) const CR_FBDIV_SHIFT: u32 = 0;
pub(crate) const CR_REFDIV_SHIFT: u32 = 9;
pub(crate) const CR_DIV_MASK: u32 = 0x1ff;

bitflags! {
    pub(crate) struct PllCr: u32 {
        const SW_EN = 1 << 18;
        /// Software override. When clear the PMU owns the PLL.
        const CTRL = 1 << 19;
    }
}

// PLLx_CTRL1
pub(crate) const CTRL1_ICP_SHIFT: u32 = 3;
pub(crate) const CTRL1_KVCO_SHIFT: u32 = 7;
pub(crate) const CTRL1_NIBBLE_MASK: u32 = 0xf;

bitflags! {
    pub(crate) struct PllCtrl1: u32 {
        /// Active low: set releases the PLL from reset.
        const PLL_RST = 1 << 0;
        const BYPASS_EN = 1 << 1;
        const BW_SEL = 1 << 2;
    }
}

// PLLx_CTRL2
pub(crate) const CTRL2_INTPI_MASK: u32 = 0xf;

bitflags! {
    pub(crate) struct PllCtrl2: u32 {
        const PI_EN = 1 << 4;
        const CLK_DET_EN = 1 << 5;
        const FREQ_OFFSET_EN = 1 << 6;
        const SSC_CLK_EN = 1 << 7;
    }
}

// PLLx_CTRL3, spread spectrum
pub(crate) const CTRL3_SSC_FREQ_DIV_MASK: u32 = 0xffff;
pub(crate) const CTRL3_SSC_RNGE_SHIFT: u32 = 16;
pub(crate) const CTRL3_SSC_RNGE_MASK: u32 = 0x7ff;

bitflags! {
    pub(crate) struct PllCtrl3: u32 {
        /// Down spread. Clear for center spread.
        const SSC_MODE_DOWN = 1 << 27;
    }
}

// PLLx_CTRL4, frequency offset
pub(crate) const CTRL4_OFFSET_MASK: u32 = 0xffff;

bitflags! {
    pub(crate) struct PllCtrl4: u32 {
        /// The programmed rate is below the clean VCO rate.
        const OFFSET_NEG = 1 << 16;
        const OFFSET_VALID = 1 << 17;
    }
}

/// Mask of a `width`-bit field at `shift`.
#[inline]
pub(crate) fn field_mask(width: u32, shift: u32) -> u32 {
    (((1u64 << width) - 1) as u32) << shift
}

#[inline]
pub(crate) fn field_get(value: u32, width: u32, shift: u32) -> u32 {
    (value & field_mask(width, shift)) >> shift
}
