/*
   Copyright 2018 Ilya Epifanov

   Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
   http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
   http://opensource.org/licenses/MIT>, at your option. This file may not be
   copied, modified, or distributed except according to those terms.
*/
//! Frequency table entries and lookup.

use crate::{mhz, Error};

/// `div_sel` value selecting divide-by-three instead of a shift.
pub const DIV_3: u8 = 8;

/// One VCO operating point.
///
/// `output_rate` is the rate the dividers produce exactly,
/// `prate * 4 * fbdiv / refdiv`. `output_rate_offseted` is the rate
/// actually asked for; it differs only when the frequency offset is used.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct VcoFreq {
    pub input_rate: u64,
    pub output_rate: u64,
    pub output_rate_offseted: u64,
    pub refdiv: u16,
    pub fbdiv: u16,
    pub icp: u8,
    pub kvco: u8,
    pub ssc_en: bool,
    pub offset_en: bool,
}

impl VcoFreq {
    /// Operating point without offset or spread spectrum.
    pub const fn new(
        input_rate: u64,
        output_rate: u64,
        refdiv: u16,
        fbdiv: u16,
        icp: u8,
        kvco: u8,
    ) -> Self {
        VcoFreq {
            input_rate,
            output_rate,
            output_rate_offseted: output_rate,
            refdiv,
            fbdiv,
            icp,
            kvco,
            ssc_en: false,
            offset_en: false,
        }
    }

    pub const fn with_offset(mut self, output_rate_offseted: u64) -> Self {
        self.output_rate_offseted = output_rate_offseted;
        self.offset_en = true;
        self
    }

    pub const fn with_ssc(mut self) -> Self {
        self.ssc_en = true;
        self
    }

    /// The rate the VCO runs at once programmed. Only an applied offset
    /// moves it away from the clean divider rate.
    pub fn rate(&self) -> u64 {
        if self.offset_en {
            self.output_rate_offseted
        } else {
            self.output_rate
        }
    }

    /// Rate the divider pair itself produces.
    pub fn forward_rate(&self) -> u64 {
        if self.refdiv == 0 {
            return 0;
        }
        self.input_rate * 4 * u64::from(self.fbdiv) / u64::from(self.refdiv)
    }
}

/// One output-divider operating point.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct OutFreq {
    pub input_rate: u64,
    pub output_rate: u64,
    pub div_sel: u8,
}

impl OutFreq {
    pub const fn new(input_rate: u64, output_rate: u64, div_sel: u8) -> Self {
        OutFreq {
            input_rate,
            output_rate,
            div_sel,
        }
    }

    pub fn rate(&self) -> u64 {
        self.output_rate
    }

    pub fn is_div_3(&self) -> bool {
        self.div_sel == DIV_3
    }

    /// `input_rate` pushed through the selected divider.
    pub fn divided(&self, input_rate: u64) -> u64 {
        if self.is_div_3() {
            input_rate / 3
        } else {
            input_rate >> self.div_sel
        }
    }
}

pub(crate) trait TableEntry: Copy {
    fn input_rate(&self) -> u64;
    fn requested_rate(&self) -> u64;
}

impl TableEntry for VcoFreq {
    fn input_rate(&self) -> u64 {
        self.input_rate
    }

    fn requested_rate(&self) -> u64 {
        self.output_rate_offseted
    }
}

impl TableEntry for OutFreq {
    fn input_rate(&self) -> u64 {
        self.input_rate
    }

    fn requested_rate(&self) -> u64 {
        self.output_rate
    }
}

/// First entry whose input and requested rates match at MHz granularity.
pub(crate) fn lookup<T: TableEntry>(
    table: &[T],
    input_rate: u64,
    output_rate: u64,
) -> Result<T, Error> {
    table
        .iter()
        .find(|entry| {
            mhz(entry.input_rate()) == mhz(input_rate)
                && mhz(entry.requested_rate()) == mhz(output_rate)
        })
        .copied()
        .ok_or(Error::NotFound)
}
