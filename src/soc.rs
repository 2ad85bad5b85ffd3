/*
   Copyright 2018 Ilya Epifanov

   Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
   http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
   http://opensource.org/licenses/MIT>, at your option. This file may not be
   copied, modified, or distributed except according to those terms.
*/
//! PXA1928 PLL description: register map, flags and operating points.
//!
//! The first entry of each table is the rate programmed at init.

use crate::out::OutParams;
use crate::regs::PllFlags;
use crate::table::{OutFreq, VcoFreq, DIV_3};
use crate::unit::{PllId, PLL_COUNT};
use crate::vco::{SscMode, SscParams, VcoParams};

/// Reference clock feeding every VCO.
pub const REF_CLK: &str = "vctcxo";
pub const REF_RATE: u64 = 26_000_000;

const VCO_MIN: u64 = 1_200_000_000;
const VCO_MAX: u64 = 3_200_000_000;

// MPMU
const MPMU_POSR: u32 = 0x0010;
const MPMU_POSR2: u32 = 0x0014;

// APMU
const APMU_GLB_CLK_CTRL: u32 = 0x00dc;
const APMU_GLB_CLK_CTRL2: u32 = 0x00e0;
const APMU_PLL_GATE: u32 = 0x0150;
const APMU_DDR_PLL_SEL: u32 = 0x0160;
const APMU_PLL_OUT_MISC: u32 = 0x0170;

const GATE_WIDTH: u32 = 2;
const DIV_WIDTH: u32 = 3;

const SSC_CENTER: SscParams = SscParams {
    mode: SscMode::Center,
    modulation_hz: 30_000,
    amplitude_ppm: 2_500,
};

const SSC_DOWN: SscParams = SscParams {
    mode: SscMode::Down,
    modulation_hz: 30_000,
    amplitude_ppm: 5_000,
};

/// Everything needed to build one PLL instance.
#[derive(Debug)]
pub struct PllDesc {
    pub id: PllId,
    pub vco_name: &'static str,
    pub out_name: &'static str,
    pub outp_name: &'static str,
    pub parent: &'static str,
    pub vco_flags: PllFlags,
    pub out_flags: PllFlags,
    pub outp_flags: PllFlags,
    pub vco: VcoParams,
    pub out: OutParams,
    pub outp: OutParams,
    pub vco_table: &'static [VcoFreq],
    pub out_table: &'static [OutFreq],
    pub outp_table: &'static [OutFreq],
}

#[allow(clippy::too_many_arguments)]
const fn vco(
    base: [u32; 5],
    reg_pll_lock: u32,
    lock_enable_bit: u32,
    gate_shift: u32,
    reg_glb_clk_ctrl: u32,
    glb_post_en_shift: u32,
    ssc: SscParams,
) -> VcoParams {
    VcoParams {
        reg_pll_cr: base[0],
        reg_pll_ctrl1: base[1],
        reg_pll_ctrl2: base[2],
        reg_pll_ctrl3: base[3],
        reg_pll_ctrl4: base[4],
        reg_pll_lock,
        lock_enable_bit,
        reg_pll_gate: APMU_PLL_GATE,
        gate_width: GATE_WIDTH,
        gate_shift,
        reg_glb_clk_ctrl,
        glb_post_en_shift,
        vco_min: VCO_MIN,
        vco_max: VCO_MAX,
        ssc,
    }
}

/// Primary output: low nibble of the divider and misc registers.
const fn out(reg_pll_out_div: u32, index: u32) -> OutParams {
    OutParams {
        input_rate_min: VCO_MIN,
        reg_pll_out_div,
        div_width: DIV_WIDTH,
        div_shift: 0,
        reg_pll_out_misc: APMU_PLL_OUT_MISC + 4 * index,
        not_div3_bit: 1 << 0,
        sync_ddr_bit: 1 << 1,
        enable_bit: 1 << 2,
    }
}

/// Secondary output: second nibble.
const fn outp(reg_pll_out_div: u32, index: u32) -> OutParams {
    OutParams {
        input_rate_min: VCO_MIN,
        reg_pll_out_div,
        div_width: DIV_WIDTH,
        div_shift: 4,
        reg_pll_out_misc: APMU_PLL_OUT_MISC + 4 * index,
        not_div3_bit: 1 << 4,
        sync_ddr_bit: 1 << 5,
        enable_bit: 1 << 6,
    }
}

const fn flags(bits: u32) -> PllFlags {
    PllFlags::from_bits_truncate(bits)
}

const NONE: PllFlags = PllFlags::empty();
const POST_ENABLE: PllFlags = PllFlags::POST_ENABLE;
const DIV3: PllFlags = PllFlags::USE_DIV_3;

const fn at(rate: u64, fbdiv: u16, kvco: u8) -> VcoFreq {
    VcoFreq::new(REF_RATE, rate, 3, fbdiv, 3, kvco)
}

const PLL2_VCO: [VcoFreq; 3] = [
    at(1_594_666_666, 46, 0xa),
    at(2_114_666_666, 61, 0xc),
    at(1_768_000_000, 51, 0xb),
];
const PLL2_OUT: [OutFreq; 3] = [
    OutFreq::new(1_594_666_666, 797_333_333, 1),
    OutFreq::new(2_114_666_666, 1_057_333_333, 1),
    OutFreq::new(1_768_000_000, 884_000_000, 1),
];
const PLL2_OUTP: [OutFreq; 3] = [
    OutFreq::new(1_594_666_666, 531_555_555, DIV_3),
    OutFreq::new(2_114_666_666, 704_888_888, DIV_3),
    OutFreq::new(1_768_000_000, 589_333_333, DIV_3),
];

const PLL3_VCO: [VcoFreq; 2] = [at(2_080_000_000, 60, 0xc), at(1_560_000_000, 45, 0xa)];
const PLL3_OUT: [OutFreq; 2] = [
    OutFreq::new(2_080_000_000, 1_040_000_000, 1),
    OutFreq::new(1_560_000_000, 780_000_000, 1),
];
const PLL3_OUTP: [OutFreq; 2] = [
    OutFreq::new(2_080_000_000, 520_000_000, 2),
    OutFreq::new(1_560_000_000, 520_000_000, DIV_3),
];

const PLL4_VCO: [VcoFreq; 2] = [at(2_392_000_000, 69, 0xd).with_ssc(), at(1_872_000_000, 54, 0xb)];
const PLL4_OUT: [OutFreq; 2] = [
    OutFreq::new(2_392_000_000, 1_196_000_000, 1),
    OutFreq::new(1_872_000_000, 936_000_000, 1),
];
const PLL4_OUTP: [OutFreq; 2] = [
    OutFreq::new(2_392_000_000, 797_333_333, DIV_3),
    OutFreq::new(1_872_000_000, 624_000_000, DIV_3),
];

const PLL5_VCO: [VcoFreq; 2] = [
    at(1_768_000_000, 51, 0xb).with_offset(1_767_000_000),
    at(2_600_000_000, 75, 0xf),
];
const PLL5_OUT: [OutFreq; 2] = [
    OutFreq::new(1_767_000_000, 883_500_000, 1),
    OutFreq::new(2_600_000_000, 1_300_000_000, 1),
];
const PLL5_OUTP: [OutFreq; 2] = [
    OutFreq::new(1_767_000_000, 441_750_000, 2),
    OutFreq::new(2_600_000_000, 866_666_666, DIV_3),
];

const PLL6_VCO: [VcoFreq; 2] = [at(2_808_000_000, 81, 0xf), at(2_496_000_000, 72, 0xe)];
const PLL6_OUT: [OutFreq; 2] = [
    OutFreq::new(2_808_000_000, 1_404_000_000, 1),
    OutFreq::new(2_496_000_000, 1_248_000_000, 1),
];
const PLL6_OUTP: [OutFreq; 2] = [
    OutFreq::new(2_808_000_000, 936_000_000, DIV_3),
    OutFreq::new(2_496_000_000, 832_000_000, DIV_3),
];

const PLL7_VCO: [VcoFreq; 2] = [at(3_154_666_666, 91, 0xf), at(1_317_333_333, 38, 0x8)];
const PLL7_OUT: [OutFreq; 2] = [
    OutFreq::new(3_154_666_666, 1_577_333_333, 1),
    OutFreq::new(1_317_333_333, 658_666_666, 1),
];
const PLL7_OUTP: [OutFreq; 2] = [
    OutFreq::new(3_154_666_666, 788_666_666, 2),
    OutFreq::new(1_317_333_333, 439_111_111, DIV_3),
];

pub static PLLS: [PllDesc; PLL_COUNT] = [
    PllDesc {
        id: PllId::Pll2,
        vco_name: "pll2",
        out_name: "pll2_out",
        outp_name: "pll2_outp",
        parent: REF_CLK,
        vco_flags: NONE,
        out_flags: NONE,
        outp_flags: DIV3,
        vco: vco(
            [0x0034, 0x0414, 0x0418, 0x041c, 0x0420],
            MPMU_POSR,
            1 << 28,
            0,
            APMU_GLB_CLK_CTRL,
            0,
            SSC_CENTER,
        ),
        out: out(0x0424, 0),
        outp: outp(0x0424, 0),
        vco_table: &PLL2_VCO,
        out_table: &PLL2_OUT,
        outp_table: &PLL2_OUTP,
    },
    PllDesc {
        id: PllId::Pll3,
        vco_name: "pll3",
        out_name: "pll3_out",
        outp_name: "pll3_outp",
        parent: REF_CLK,
        vco_flags: NONE,
        out_flags: NONE,
        outp_flags: DIV3,
        vco: vco(
            [0x001c, 0x0058, 0x0060, 0x0064, 0x0068],
            MPMU_POSR,
            1 << 29,
            2,
            APMU_GLB_CLK_CTRL,
            8,
            SSC_CENTER,
        ),
        out: out(0x006c, 1),
        outp: outp(0x006c, 1),
        vco_table: &PLL3_VCO,
        out_table: &PLL3_OUT,
        outp_table: &PLL3_OUTP,
    },
    PllDesc {
        id: PllId::Pll4,
        vco_name: "pll4",
        out_name: "pll4_out",
        outp_name: "pll4_outp",
        parent: REF_CLK,
        vco_flags: POST_ENABLE,
        out_flags: NONE,
        outp_flags: DIV3,
        vco: vco(
            [0x0050, 0x1100, 0x1104, 0x1108, 0x110c],
            MPMU_POSR,
            1 << 30,
            4,
            APMU_GLB_CLK_CTRL,
            16,
            SSC_DOWN,
        ),
        out: out(0x1110, 2),
        outp: outp(0x1110, 2),
        vco_table: &PLL4_VCO,
        out_table: &PLL4_OUT,
        outp_table: &PLL4_OUTP,
    },
    PllDesc {
        id: PllId::Pll5,
        vco_name: "pll5",
        out_name: "pll5_out",
        outp_name: "pll5_outp",
        parent: REF_CLK,
        vco_flags: NONE,
        out_flags: NONE,
        outp_flags: DIV3,
        vco: vco(
            [0x004c, 0x1114, 0x1118, 0x111c, 0x1120],
            MPMU_POSR,
            1 << 31,
            6,
            APMU_GLB_CLK_CTRL,
            24,
            SSC_CENTER,
        ),
        out: out(0x1124, 3),
        outp: outp(0x1124, 3),
        vco_table: &PLL5_VCO,
        out_table: &PLL5_OUT,
        outp_table: &PLL5_OUTP,
    },
    PllDesc {
        id: PllId::Pll6,
        vco_name: "pll6",
        out_name: "pll6_out",
        outp_name: "pll6_outp",
        parent: REF_CLK,
        vco_flags: NONE,
        out_flags: PllFlags::USE_SYNC_DDR,
        outp_flags: DIV3,
        vco: vco(
            [0x1140, 0x1144, 0x1148, 0x114c, 0x1150],
            MPMU_POSR2,
            1 << 0,
            8,
            APMU_GLB_CLK_CTRL2,
            0,
            SSC_CENTER,
        ),
        out: out(APMU_DDR_PLL_SEL, 4),
        outp: outp(0x1154, 4),
        vco_table: &PLL6_VCO,
        out_table: &PLL6_OUT,
        outp_table: &PLL6_OUTP,
    },
    PllDesc {
        id: PllId::Pll7,
        vco_name: "pll7",
        out_name: "pll7_out",
        outp_name: "pll7_outp",
        parent: REF_CLK,
        vco_flags: POST_ENABLE,
        out_flags: PllFlags::USE_ENABLE_BIT,
        outp_flags: flags(PllFlags::USE_DIV_3.bits() | PllFlags::USE_ENABLE_BIT.bits()),
        vco: vco(
            [0x1160, 0x1164, 0x1168, 0x116c, 0x1170],
            MPMU_POSR2,
            1 << 1,
            10,
            APMU_GLB_CLK_CTRL2,
            8,
            SSC_CENTER,
        ),
        out: out(0x1174, 5),
        outp: outp(0x1174, 5),
        vco_table: &PLL7_VCO,
        out_table: &PLL7_OUT,
        outp_table: &PLL7_OUTP,
    },
];
