/*
   Copyright 2018 Ilya Epifanov

   Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
   http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
   http://opensource.org/licenses/MIT>, at your option. This file may not be
   copied, modified, or distributed except according to those terms.
*/
//! The VCO stage: divider search, programming and the lock sequence.

use crate::global::GlobalCtrl;
use crate::hal::blocking::delay::DelayUs;
use crate::regs::{
    field_mask, PllCr, PllCtrl1, PllCtrl2, PllCtrl3, PllCtrl4, PllFlags, RegisterBank, CR_DIV_MASK,
    CR_FBDIV_SHIFT, CR_REFDIV_SHIFT, CTRL1_ICP_SHIFT, CTRL1_KVCO_SHIFT, CTRL1_NIBBLE_MASK,
    CTRL2_INTPI_MASK, CTRL3_SSC_FREQ_DIV_MASK, CTRL3_SSC_RNGE_MASK, CTRL3_SSC_RNGE_SHIFT,
    CTRL4_OFFSET_MASK,
};
use crate::table::{lookup, VcoFreq};
use crate::{mhz, ClockStage, Error, Fatal};
use log::{debug, error, info, warn};
use spin::Mutex;

const LOCK_RETRIES: u32 = 1000;
const LOCK_POLL_US: u32 = 30;

const CALC_REFDIV: u16 = 3;
const CALC_ICP: u8 = 3;

const POST_ENABLE_MASK: u32 = 0xff;

const PI_SETTLE_US: u32 = 5;
const CLK_DET_SETTLE_US: u32 = 10;
const OFFSET_SETTLE_US: u32 = 5;
const SSC_SETTLE_US: u32 = 5;

/// Upper band limits, exclusive, in Hz.
const KVCO_BANDS: [(u64, u8); 7] = [
    (1_350_000_000, 0x8),
    (1_500_000_000, 0x9),
    (1_750_000_000, 0xa),
    (2_000_000_000, 0xb),
    (2_200_000_000, 0xc),
    (2_400_000_000, 0xd),
    (2_600_000_000, 0xe),
];

/// VCO gain curve for an output rate.
pub fn kvco_for_rate(rate: u64) -> u8 {
    KVCO_BANDS
        .iter()
        .find(|&&(limit, _)| rate < limit)
        .map(|&(_, kvco)| kvco)
        .unwrap_or(0xf)
}

fn intpi_for_rate(rate: u64) -> u32 {
    match rate {
        r if r < 1_600_000_000 => 6,
        r if r < 2_400_000_000 => 5,
        _ => 4,
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SscMode {
    Center,
    Down,
}

/// Spread spectrum shape used by table entries with `ssc_en`.
#[derive(Debug, Copy, Clone)]
pub struct SscParams {
    pub mode: SscMode,
    pub modulation_hz: u32,
    pub amplitude_ppm: u32,
}

/// Fixed description of one VCO.
///
/// `reg_pll_*` offsets are in the MPMU bank. `reg_pll_gate` and
/// `reg_glb_clk_ctrl` are in the APMU bank and shared with other PLLs.
#[derive(Debug, Copy, Clone)]
pub struct VcoParams {
    pub reg_pll_cr: u32,
    pub reg_pll_ctrl1: u32,
    pub reg_pll_ctrl2: u32,
    pub reg_pll_ctrl3: u32,
    pub reg_pll_ctrl4: u32,
    pub reg_pll_lock: u32,
    pub lock_enable_bit: u32,
    pub reg_pll_gate: u32,
    pub gate_width: u32,
    pub gate_shift: u32,
    pub reg_glb_clk_ctrl: u32,
    pub glb_post_en_shift: u32,
    pub vco_min: u64,
    pub vco_max: u64,
    pub ssc: SscParams,
}

/// The VCO of one PLL.
pub struct PllVco<'a, B> {
    name: &'static str,
    parent: &'static str,
    flags: PllFlags,
    lock: &'a Mutex<()>,
    mpmu: &'a B,
    global: GlobalCtrl<'a, B>,
    params: VcoParams,
    table: &'static [VcoFreq],
}

impl<'a, B: RegisterBank> PllVco<'a, B> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: &'static str,
        parent: &'static str,
        flags: PllFlags,
        lock: &'a Mutex<()>,
        mpmu: &'a B,
        global: GlobalCtrl<'a, B>,
        params: VcoParams,
        table: &'static [VcoFreq],
    ) -> Self {
        PllVco {
            name,
            parent,
            flags,
            lock,
            mpmu,
            global,
            params,
            table,
        }
    }

    pub fn params(&self) -> &VcoParams {
        &self.params
    }

    pub fn table(&self) -> &'static [VcoFreq] {
        self.table
    }

    pub fn get_table_rate(&self, input_rate: u64, output_rate: u64) -> Result<VcoFreq, Error> {
        lookup(self.table, input_rate, output_rate)
    }

    /// Computes a divider set for `rate` from a `prate` reference.
    ///
    /// The feedback divider is rounded to the nearest step, so the result's
    /// `output_rate` is the achievable rate and `output_rate_offseted` keeps
    /// the request.
    pub fn calc_rate(&self, rate: u64, prate: u64) -> Result<VcoFreq, Error> {
        if rate < self.params.vco_min || rate > self.params.vco_max {
            warn!(
                "{}: {} Hz outside VCO range {}..={}",
                self.name, rate, self.params.vco_min, self.params.vco_max
            );
            return Err(Error::InvalidRate);
        }
        if prate == 0 {
            warn!("{}: no reference rate", self.name);
            return Err(Error::InvalidRate);
        }

        let refdiv = u64::from(CALC_REFDIV);
        let step = prate * 4;
        let fbdiv = (rate * refdiv + step / 2) / step;
        if fbdiv == 0 || fbdiv > u64::from(CR_DIV_MASK) {
            warn!("{}: no feedback divider for {} Hz", self.name, rate);
            return Err(Error::InvalidRate);
        }
        let output_rate = step * fbdiv / refdiv;

        Ok(VcoFreq {
            input_rate: prate,
            output_rate,
            output_rate_offseted: rate,
            refdiv: CALC_REFDIV,
            fbdiv: fbdiv as u16,
            icp: CALC_ICP,
            kvco: kvco_for_rate(output_rate),
            ssc_en: false,
            offset_en: false,
        })
    }

    fn update(&self, offset: u32, clear: u32, set: u32) {
        let _guard = self.lock.lock();
        self.mpmu.modify(offset, clear, set);
    }

    fn post_enable_mask(&self) -> u32 {
        POST_ENABLE_MASK << self.params.glb_post_en_shift
    }

    fn gate_mask(&self) -> u32 {
        field_mask(self.params.gate_width, self.params.gate_shift)
    }

    fn wait_lock<D: DelayUs<u32>>(&self, delay: &mut D) -> bool {
        for _ in 0..LOCK_RETRIES {
            delay.delay_us(LOCK_POLL_US);
            if self.mpmu.read(self.params.reg_pll_lock) & self.params.lock_enable_bit != 0 {
                return true;
            }
        }
        false
    }

    fn check_setting(&self, freq: &VcoFreq) -> Result<(), Error> {
        let nibble = CTRL1_NIBBLE_MASK as u8;
        let fits = |div: u16| div != 0 && u32::from(div) <= CR_DIV_MASK;
        if fits(freq.refdiv) && fits(freq.fbdiv) && freq.icp <= nibble && freq.kvco <= nibble {
            Ok(())
        } else {
            warn!("{}: unusable divider set {:?}", self.name, freq);
            Err(Error::InvalidRate)
        }
    }

    /// Spread and offset enables in ctrl2 agree with `freq`.
    fn modulation_matches(&self, freq: &VcoFreq) -> bool {
        let ctrl2 = PllCtrl2::from_bits_truncate(self.mpmu.read(self.params.reg_pll_ctrl2));
        ctrl2.contains(PllCtrl2::SSC_CLK_EN) == freq.ssc_en
            && ctrl2.contains(PllCtrl2::FREQ_OFFSET_EN) == freq.offset_en
    }

    fn set_pi<D: DelayUs<u32>>(&self, rate: u64, delay: &mut D) {
        let p = &self.params;
        self.update(
            p.reg_pll_ctrl2,
            CTRL2_INTPI_MASK,
            intpi_for_rate(rate) | PllCtrl2::PI_EN.bits(),
        );
        delay.delay_us(PI_SETTLE_US);
        self.update(p.reg_pll_ctrl2, 0, PllCtrl2::CLK_DET_EN.bits());
        delay.delay_us(CLK_DET_SETTLE_US);
    }

    fn set_offset<D: DelayUs<u32>>(&self, freq: &VcoFreq, delay: &mut D) {
        let p = &self.params;
        let (diff, below) = if freq.output_rate_offseted < freq.output_rate {
            (freq.output_rate - freq.output_rate_offseted, true)
        } else {
            (freq.output_rate_offseted - freq.output_rate, false)
        };

        let mut offset = (diff << 20) / freq.output_rate;
        if offset > u64::from(CTRL4_OFFSET_MASK) {
            warn!("{}: offset {} Hz too large, clamped", self.name, diff);
            offset = u64::from(CTRL4_OFFSET_MASK);
        }

        let mut word = offset as u32 | PllCtrl4::OFFSET_VALID.bits();
        if below {
            word |= PllCtrl4::OFFSET_NEG.bits();
        }
        self.update(
            p.reg_pll_ctrl4,
            CTRL4_OFFSET_MASK | (PllCtrl4::OFFSET_NEG | PllCtrl4::OFFSET_VALID).bits(),
            word,
        );
        self.update(p.reg_pll_ctrl2, 0, PllCtrl2::FREQ_OFFSET_EN.bits());
        delay.delay_us(OFFSET_SETTLE_US);
    }

    fn set_ssc<D: DelayUs<u32>>(&self, rate: u64, delay: &mut D) {
        let p = &self.params;
        let ssc = p.ssc;
        if ssc.modulation_hz == 0 {
            warn!("{}: SSC requested without a modulation rate", self.name);
            return;
        }

        let freq_div = (rate / (4 * u64::from(ssc.modulation_hz)))
            .clamp(1, u64::from(CTRL3_SSC_FREQ_DIV_MASK));
        let range = ((u64::from(ssc.amplitude_ppm) << 26) / (freq_div * 1_000_000))
            .min(u64::from(CTRL3_SSC_RNGE_MASK));

        let mut word = freq_div as u32 | (range as u32) << CTRL3_SSC_RNGE_SHIFT;
        if ssc.mode == SscMode::Down {
            word |= PllCtrl3::SSC_MODE_DOWN.bits();
        }
        self.update(
            p.reg_pll_ctrl3,
            CTRL3_SSC_FREQ_DIV_MASK
                | CTRL3_SSC_RNGE_MASK << CTRL3_SSC_RNGE_SHIFT
                | PllCtrl3::SSC_MODE_DOWN.bits(),
            word,
        );
        self.update(p.reg_pll_ctrl2, 0, PllCtrl2::SSC_CLK_EN.bits());
        delay.delay_us(SSC_SETTLE_US);
    }
}

impl<'a, B: RegisterBank> ClockStage for PllVco<'a, B> {
    type Setting = VcoFreq;

    fn name(&self) -> &'static str {
        self.name
    }

    fn parent_name(&self) -> &'static str {
        self.parent
    }

    /// Disabled only while software has taken over (`ctrl`) and switched the
    /// PLL off (`sw_en` clear). A PLL still owned by the PMU is running.
    fn is_enabled(&self) -> bool {
        let cr = PllCr::from_bits_truncate(self.mpmu.read(self.params.reg_pll_cr));
        !(cr.contains(PllCr::CTRL) && !cr.contains(PllCr::SW_EN))
    }

    fn enable<D: DelayUs<u32>>(&mut self, delay: &mut D) -> Result<(), Error> {
        let p = self.params;

        if self.is_enabled() {
            self.update(p.reg_pll_cr, PllCr::CTRL.bits(), 0);
            info!("{}: already running, released to hardware control", self.name);
            return Ok(());
        }

        self.update(p.reg_pll_cr, 0, (PllCr::CTRL | PllCr::SW_EN).bits());
        self.update(p.reg_pll_ctrl1, 0, PllCtrl1::PLL_RST.bits());

        if !self.wait_lock(delay) {
            error!("{}: no lock after {} polls", self.name, LOCK_RETRIES);
            return Err(Error::Fatal(Fatal::LockTimeout { pll: self.name }));
        }

        self.global.set_bits(p.reg_pll_gate, self.gate_mask());
        self.update(p.reg_pll_cr, PllCr::CTRL.bits(), 0);

        if self.flags.contains(PllFlags::POST_ENABLE) {
            self.global.set_bits(p.reg_glb_clk_ctrl, self.post_enable_mask());
        }

        Ok(())
    }

    fn disable(&mut self) {
        let p = self.params;

        if self.flags.contains(PllFlags::POST_ENABLE) {
            self.global.clear_bits(p.reg_glb_clk_ctrl, self.post_enable_mask());
        }
        self.global.clear_bits(p.reg_pll_gate, self.gate_mask());
        self.update(p.reg_pll_ctrl1, PllCtrl1::PLL_RST.bits(), 0);
        self.update(p.reg_pll_cr, PllCr::SW_EN.bits(), PllCr::CTRL.bits());
    }

    fn recalc_rate(&self, parent_rate: u64) -> u64 {
        let p = &self.params;
        let cr = self.mpmu.read(p.reg_pll_cr);
        let fbdiv = u64::from((cr >> CR_FBDIV_SHIFT) & CR_DIV_MASK);
        let refdiv = u64::from((cr >> CR_REFDIV_SHIFT) & CR_DIV_MASK);
        if refdiv == 0 {
            return 0;
        }
        let rate = parent_rate * 4 * fbdiv / refdiv;

        let ctrl2 = PllCtrl2::from_bits_truncate(self.mpmu.read(p.reg_pll_ctrl2));
        if !ctrl2.contains(PllCtrl2::FREQ_OFFSET_EN) {
            return rate;
        }

        let ctrl4 = self.mpmu.read(p.reg_pll_ctrl4);
        let delta = (rate * u64::from(ctrl4 & CTRL4_OFFSET_MASK)) >> 20;
        if PllCtrl4::from_bits_truncate(ctrl4).contains(PllCtrl4::OFFSET_NEG) {
            rate - delta
        } else {
            rate + delta
        }
    }

    fn round_rate(&self, rate: u64, parent_rate: &mut u64) -> Result<VcoFreq, Error> {
        self.get_table_rate(*parent_rate, rate)
            .or_else(|_| self.calc_rate(rate, *parent_rate))
    }

    fn set_rate<D: DelayUs<u32>>(
        &mut self,
        freq: &VcoFreq,
        parent_rate: u64,
        delay: &mut D,
    ) -> Result<(), Error> {
        if self.is_enabled() {
            info!("{}: rate change refused while running", self.name);
            return Err(Error::PermissionDenied);
        }
        self.check_setting(freq)?;

        if self.modulation_matches(freq) && mhz(freq.rate()) == mhz(self.recalc_rate(parent_rate)) {
            return Ok(());
        }

        let p = self.params;
        {
            let _guard = self.lock.lock();
            self.mpmu.modify(
                p.reg_pll_cr,
                CR_DIV_MASK << CR_FBDIV_SHIFT | CR_DIV_MASK << CR_REFDIV_SHIFT,
                u32::from(freq.fbdiv) << CR_FBDIV_SHIFT | u32::from(freq.refdiv) << CR_REFDIV_SHIFT,
            );
            self.mpmu.modify(
                p.reg_pll_ctrl1,
                (PllCtrl1::BYPASS_EN | PllCtrl1::BW_SEL).bits()
                    | CTRL1_NIBBLE_MASK << CTRL1_ICP_SHIFT
                    | CTRL1_NIBBLE_MASK << CTRL1_KVCO_SHIFT,
                u32::from(freq.icp) << CTRL1_ICP_SHIFT | u32::from(freq.kvco) << CTRL1_KVCO_SHIFT,
            );
            self.mpmu.modify(
                p.reg_pll_ctrl2,
                (PllCtrl2::SSC_CLK_EN | PllCtrl2::FREQ_OFFSET_EN).bits(),
                0,
            );
        }
        debug!(
            "{}: refdiv {} fbdiv {} icp {} kvco {:#x} -> {} Hz",
            self.name, freq.refdiv, freq.fbdiv, freq.icp, freq.kvco, freq.rate()
        );

        if freq.offset_en || freq.ssc_en {
            self.set_pi(freq.output_rate, delay);
        }
        if freq.offset_en {
            self.set_offset(freq, delay);
        }
        if freq.ssc_en {
            self.set_ssc(freq.output_rate, delay);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockBank, NoDelay, Trace};
    use crate::soc::PLLS;
    use crate::unit::PllId;

    const REF: u64 = 26_000_000;

    struct Rig {
        trace: Trace,
        mpmu: MockBank,
        apmu: MockBank,
        lock: Mutex<()>,
        glb: Mutex<()>,
    }

    impl Rig {
        fn new() -> Self {
            let trace = Trace::default();
            Rig {
                mpmu: MockBank::traced("mpmu", &trace),
                apmu: MockBank::traced("apmu", &trace),
                trace,
                lock: Mutex::new(()),
                glb: Mutex::new(()),
            }
        }

        fn vco(&self, id: PllId) -> PllVco<'_, MockBank> {
            let desc = &PLLS[id.index()];
            let vco = PllVco::new(
                desc.vco_name,
                desc.parent,
                desc.vco_flags,
                &self.lock,
                &self.mpmu,
                GlobalCtrl::new(&self.apmu, &self.glb),
                desc.vco,
                desc.vco_table,
            );
            // Software-owned and off.
            self.mpmu.preset(desc.vco.reg_pll_cr, PllCr::CTRL.bits());
            vco
        }

        fn lock_detect(&self, id: PllId) {
            let p = &PLLS[id.index()].vco;
            self.mpmu.stick(p.reg_pll_lock, p.lock_enable_bit);
        }
    }

    #[test]
    fn kvco_band_edges() {
        assert_eq!(kvco_for_rate(1_349_999_999), 0x8);
        assert_eq!(kvco_for_rate(1_350_000_000), 0x9);
        assert_eq!(kvco_for_rate(1_499_999_999), 0x9);
        assert_eq!(kvco_for_rate(1_500_000_000), 0xa);
        assert_eq!(kvco_for_rate(1_750_000_000), 0xb);
        assert_eq!(kvco_for_rate(2_000_000_000), 0xc);
        assert_eq!(kvco_for_rate(2_200_000_000), 0xd);
        assert_eq!(kvco_for_rate(2_399_999_999), 0xd);
        assert_eq!(kvco_for_rate(2_400_000_000), 0xe);
        assert_eq!(kvco_for_rate(2_600_000_000), 0xf);
        assert_eq!(kvco_for_rate(3_200_000_000), 0xf);
    }

    #[test]
    fn kvco_is_monotonic() {
        let mut last = 0;
        let mut rate = 1_000_000_000u64;
        while rate <= 3_000_000_000 {
            let kvco = kvco_for_rate(rate);
            assert!(kvco >= last, "kvco dropped at {}", rate);
            last = kvco;
            rate += 10_000_000;
        }
        assert_eq!(last, 0xf);
    }

    #[test]
    fn pll2_table_hit() {
        let rig = Rig::new();
        let vco = rig.vco(PllId::Pll2);
        let mut prate = REF;
        let freq = vco.round_rate(1_594_666_666, &mut prate).unwrap();
        assert_eq!((freq.refdiv, freq.fbdiv, freq.icp, freq.kvco), (3, 46, 3, 0xa));
        assert_eq!(prate, REF);
    }

    #[test]
    fn calc_agrees_with_every_table_entry() {
        let rig = Rig::new();
        for desc in PLLS.iter() {
            let vco = rig.vco(desc.id);
            for entry in desc.vco_table {
                let calc = vco.calc_rate(entry.output_rate, entry.input_rate).unwrap();
                assert_eq!(mhz(calc.forward_rate()), mhz(entry.output_rate), "{:?}", entry);
                assert_eq!(calc.kvco, entry.kvco, "{:?}", entry);
                assert_eq!(calc.kvco, kvco_for_rate(calc.output_rate));
            }
        }
    }

    #[test]
    fn calc_quantizes_to_feedback_step() {
        let rig = Rig::new();
        let vco = rig.vco(PllId::Pll2);
        let freq = vco.calc_rate(2_000_000_000, REF).unwrap();
        assert_eq!((freq.refdiv, freq.fbdiv, freq.icp), (3, 58, 3));
        assert_eq!(freq.output_rate, 2_010_666_666);
        assert_eq!(freq.output_rate_offseted, 2_000_000_000);
        assert_eq!(freq.kvco, 0xc);
        assert!(!freq.ssc_en && !freq.offset_en);
        assert_eq!(freq.rate(), 2_010_666_666);
    }

    #[test]
    fn calc_rejects_out_of_range() {
        let rig = Rig::new();
        let vco = rig.vco(PllId::Pll3);
        rig.mpmu.clear_log();
        let p = *vco.params();
        assert_eq!(vco.calc_rate(p.vco_min - 1, REF), Err(Error::InvalidRate));
        assert_eq!(vco.calc_rate(p.vco_max + 1, REF), Err(Error::InvalidRate));
        let mut prate = REF;
        assert_eq!(vco.round_rate(100_000_000, &mut prate), Err(Error::InvalidRate));
        assert!(rig.mpmu.writes().is_empty());
        assert!(rig.apmu.writes().is_empty());
    }

    #[test]
    fn set_rate_refused_while_running() {
        let rig = Rig::new();
        let mut vco = rig.vco(PllId::Pll2);
        let freq = vco.table()[0];
        let cr = vco.params().reg_pll_cr;
        let mut delay = NoDelay::default();

        for running in [(PllCr::CTRL | PllCr::SW_EN).bits(), 0].iter() {
            rig.mpmu.preset(cr, *running);
            rig.mpmu.clear_log();
            assert!(vco.is_enabled());
            assert_eq!(vco.set_rate(&freq, REF, &mut delay), Err(Error::PermissionDenied));
            assert!(rig.mpmu.writes().is_empty());
        }
    }

    #[test]
    fn set_rate_programs_dividers() {
        let rig = Rig::new();
        let mut vco = rig.vco(PllId::Pll2);
        let p = *vco.params();
        rig.mpmu.preset(p.reg_pll_ctrl1, PllCtrl1::BYPASS_EN.bits());
        rig.mpmu.preset(p.reg_pll_ctrl2, PllCtrl2::SSC_CLK_EN.bits());
        let mut delay = NoDelay::default();

        let freq = vco.table()[0];
        vco.set_rate(&freq, REF, &mut delay).unwrap();

        let cr = rig.mpmu.peek(p.reg_pll_cr);
        assert_eq!(cr & CR_DIV_MASK, 46);
        assert_eq!((cr >> CR_REFDIV_SHIFT) & CR_DIV_MASK, 3);
        assert!(cr & PllCr::CTRL.bits() != 0);
        let ctrl1 = rig.mpmu.peek(p.reg_pll_ctrl1);
        assert_eq!(ctrl1 & PllCtrl1::BYPASS_EN.bits(), 0);
        assert_eq!((ctrl1 >> CTRL1_ICP_SHIFT) & 0xf, 3);
        assert_eq!((ctrl1 >> CTRL1_KVCO_SHIFT) & 0xf, 0xa);
        assert_eq!(rig.mpmu.peek(p.reg_pll_ctrl2), 0);
        assert_eq!(vco.recalc_rate(REF), 1_594_666_666);
        assert_eq!(delay.calls, 0);
        assert!(!vco.is_enabled());
    }

    #[test]
    fn set_rate_twice_is_a_no_op() {
        let rig = Rig::new();
        let mut vco = rig.vco(PllId::Pll2);
        let mut delay = NoDelay::default();
        let mut prate = REF;

        let freq = vco.round_rate(1_594_666_666, &mut prate).unwrap();
        vco.set_rate(&freq, prate, &mut delay).unwrap();
        assert!(!rig.mpmu.writes().is_empty());

        rig.mpmu.clear_log();
        vco.set_rate(&freq, prate, &mut delay).unwrap();
        assert!(rig.mpmu.writes().is_empty());

        // The calculated path converges as well.
        let calc = vco.round_rate(2_000_000_000, &mut prate).unwrap();
        vco.set_rate(&calc, prate, &mut delay).unwrap();
        rig.mpmu.clear_log();
        vco.set_rate(&calc, prate, &mut delay).unwrap();
        assert!(rig.mpmu.writes().is_empty());
    }

    #[test]
    fn set_rate_rejects_unusable_setting() {
        let rig = Rig::new();
        let mut vco = rig.vco(PllId::Pll2);
        rig.mpmu.clear_log();
        let mut freq = vco.table()[0];
        freq.refdiv = 0;
        let mut delay = NoDelay::default();
        assert_eq!(vco.set_rate(&freq, REF, &mut delay), Err(Error::InvalidRate));
        assert!(rig.mpmu.writes().is_empty());
    }

    #[test]
    fn offset_entry_goes_pi_then_offset() {
        let rig = Rig::new();
        let mut vco = rig.vco(PllId::Pll5);
        let p = *vco.params();
        let mut delay = NoDelay::default();
        let mut prate = REF;

        let freq = vco.round_rate(1_767_000_000, &mut prate).unwrap();
        assert!(freq.offset_en && !freq.ssc_en);
        assert_eq!(freq.fbdiv, 51);

        rig.mpmu.clear_log();
        vco.set_rate(&freq, prate, &mut delay).unwrap();

        let ctrl2 = PllCtrl2::from_bits_truncate(rig.mpmu.peek(p.reg_pll_ctrl2));
        assert!(ctrl2.contains(PllCtrl2::PI_EN | PllCtrl2::CLK_DET_EN | PllCtrl2::FREQ_OFFSET_EN));
        assert!(!ctrl2.contains(PllCtrl2::SSC_CLK_EN));
        assert_eq!(rig.mpmu.peek(p.reg_pll_ctrl2) & CTRL2_INTPI_MASK, 5);

        let ctrl4 = rig.mpmu.peek(p.reg_pll_ctrl4);
        let ctrl4_flags = PllCtrl4::from_bits_truncate(ctrl4);
        assert!(ctrl4_flags.contains(PllCtrl4::OFFSET_VALID | PllCtrl4::OFFSET_NEG));
        assert_eq!(ctrl4 & CTRL4_OFFSET_MASK, 593);

        let offsets = rig.mpmu.written_offsets();
        let first_ctrl2 = offsets.iter().position(|&o| o == p.reg_pll_ctrl2).unwrap();
        let offset_word = offsets.iter().position(|&o| o == p.reg_pll_ctrl4).unwrap();
        let offset_en = offsets.iter().rposition(|&o| o == p.reg_pll_ctrl2).unwrap();
        assert!(first_ctrl2 < offset_word && offset_word < offset_en);
        // Two ctrl2 writes for the PI go between the reset and the offset word.
        assert_eq!(offsets[offset_word - 2..offset_word], [p.reg_pll_ctrl2, p.reg_pll_ctrl2]);

        assert_eq!(delay.total_us, u64::from(PI_SETTLE_US + CLK_DET_SETTLE_US + OFFSET_SETTLE_US));
        assert_eq!(mhz(vco.recalc_rate(REF)), mhz(1_767_000_000));

        rig.mpmu.clear_log();
        vco.set_rate(&freq, prate, &mut delay).unwrap();
        assert!(rig.mpmu.writes().is_empty());
    }

    #[test]
    fn ssc_entry_programs_spread() {
        let rig = Rig::new();
        let mut vco = rig.vco(PllId::Pll4);
        let p = *vco.params();
        let mut delay = NoDelay::default();

        let freq = vco.table()[0];
        assert!(freq.ssc_en);
        vco.set_rate(&freq, REF, &mut delay).unwrap();

        let ctrl2 = PllCtrl2::from_bits_truncate(rig.mpmu.peek(p.reg_pll_ctrl2));
        assert!(ctrl2.contains(PllCtrl2::PI_EN | PllCtrl2::SSC_CLK_EN));
        assert!(!ctrl2.contains(PllCtrl2::FREQ_OFFSET_EN));

        let ctrl3 = rig.mpmu.peek(p.reg_pll_ctrl3);
        let expected_div = freq.output_rate / (4 * u64::from(p.ssc.modulation_hz));
        assert_eq!(u64::from(ctrl3 & CTRL3_SSC_FREQ_DIV_MASK), expected_div);
        assert_eq!(
            ctrl3 & PllCtrl3::SSC_MODE_DOWN.bits() != 0,
            p.ssc.mode == SscMode::Down
        );
        assert_eq!(delay.total_us, u64::from(PI_SETTLE_US + CLK_DET_SETTLE_US + SSC_SETTLE_US));
        assert_eq!(vco.recalc_rate(REF), 2_392_000_000);
    }

    #[test]
    fn enable_sequence() {
        let rig = Rig::new();
        let mut vco = rig.vco(PllId::Pll2);
        let p = *vco.params();
        rig.lock_detect(PllId::Pll2);
        let mut delay = NoDelay::default();

        assert!(!vco.is_enabled());
        vco.enable(&mut delay).unwrap();

        assert_eq!(
            rig.mpmu.written_offsets(),
            vec![p.reg_pll_cr, p.reg_pll_ctrl1, p.reg_pll_cr]
        );
        let cr = PllCr::from_bits_truncate(rig.mpmu.peek(p.reg_pll_cr));
        assert_eq!(cr, PllCr::SW_EN);
        assert!(rig.mpmu.peek(p.reg_pll_ctrl1) & PllCtrl1::PLL_RST.bits() != 0);
        assert_eq!(
            rig.apmu.peek(p.reg_pll_gate),
            field_mask(p.gate_width, p.gate_shift)
        );
        // No post-enable on PLL2.
        assert_eq!(rig.apmu.written_offsets(), vec![p.reg_pll_gate]);
        assert_eq!(delay.calls, 1);
        assert!(vco.is_enabled());
    }

    #[test]
    fn enable_and_disable_order_across_banks() {
        let rig = Rig::new();
        let mut vco = rig.vco(PllId::Pll4);
        let p = *vco.params();
        rig.lock_detect(PllId::Pll4);
        let mut delay = NoDelay::default();

        vco.enable(&mut delay).unwrap();
        assert_eq!(
            rig.trace.borrow().as_slice(),
            [
                ("mpmu", p.reg_pll_cr),
                ("mpmu", p.reg_pll_ctrl1),
                ("apmu", p.reg_pll_gate),
                ("mpmu", p.reg_pll_cr),
                ("apmu", p.reg_glb_clk_ctrl),
            ]
        );

        rig.trace.borrow_mut().clear();
        vco.disable();
        assert_eq!(
            rig.trace.borrow().as_slice(),
            [
                ("apmu", p.reg_glb_clk_ctrl),
                ("apmu", p.reg_pll_gate),
                ("mpmu", p.reg_pll_ctrl1),
                ("mpmu", p.reg_pll_cr),
            ]
        );
    }

    #[test]
    fn set_rate_restores_spread_on_matching_dividers() {
        let rig = Rig::new();
        let mut vco = rig.vco(PllId::Pll4);
        let p = *vco.params();
        let mut delay = NoDelay::default();
        let freq = vco.table()[0];
        assert!(freq.ssc_en);

        // Dividers already at the entry's rate, modulation off.
        rig.mpmu.preset(
            p.reg_pll_cr,
            PllCr::CTRL.bits()
                | u32::from(freq.fbdiv) << CR_FBDIV_SHIFT
                | u32::from(freq.refdiv) << CR_REFDIV_SHIFT,
        );
        assert_eq!(mhz(vco.recalc_rate(REF)), mhz(freq.rate()));

        vco.set_rate(&freq, REF, &mut delay).unwrap();
        let ctrl2 = PllCtrl2::from_bits_truncate(rig.mpmu.peek(p.reg_pll_ctrl2));
        assert!(ctrl2.contains(PllCtrl2::PI_EN | PllCtrl2::SSC_CLK_EN));

        rig.mpmu.clear_log();
        vco.set_rate(&freq, REF, &mut delay).unwrap();
        assert!(rig.mpmu.writes().is_empty());
    }

    #[test]
    fn enable_hands_over_firmware_pll() {
        let rig = Rig::new();
        let mut vco = rig.vco(PllId::Pll3);
        let p = *vco.params();
        rig.mpmu.preset(p.reg_pll_cr, (PllCr::CTRL | PllCr::SW_EN).bits());
        let mut delay = NoDelay::default();

        vco.enable(&mut delay).unwrap();

        assert_eq!(rig.mpmu.written_offsets(), vec![p.reg_pll_cr]);
        assert_eq!(rig.mpmu.peek(p.reg_pll_cr), PllCr::SW_EN.bits());
        assert!(rig.apmu.writes().is_empty());
        assert_eq!(delay.calls, 0);
    }

    #[test]
    fn enable_without_lock_is_fatal() {
        let rig = Rig::new();
        let mut vco = rig.vco(PllId::Pll2);
        let p = *vco.params();
        let mut delay = NoDelay::default();

        let err = vco.enable(&mut delay).unwrap_err();
        assert_eq!(err, Error::Fatal(Fatal::LockTimeout { pll: "pll2" }));
        assert!(err.is_fatal());
        assert_eq!(delay.calls, LOCK_RETRIES);
        assert_eq!(delay.total_us, u64::from(LOCK_RETRIES * LOCK_POLL_US));
        assert_eq!(rig.apmu.peek(p.reg_pll_gate), 0);
    }

    #[test]
    fn post_enable_wraps_the_gate() {
        let rig = Rig::new();
        let mut vco = rig.vco(PllId::Pll4);
        let p = *vco.params();
        rig.lock_detect(PllId::Pll4);
        let mut delay = NoDelay::default();
        let post = 0xff << p.glb_post_en_shift;

        vco.enable(&mut delay).unwrap();
        assert_eq!(rig.apmu.written_offsets(), vec![p.reg_pll_gate, p.reg_glb_clk_ctrl]);
        assert_eq!(rig.apmu.peek(p.reg_glb_clk_ctrl), post);

        rig.apmu.clear_log();
        rig.mpmu.clear_log();
        vco.disable();
        assert_eq!(rig.apmu.written_offsets(), vec![p.reg_glb_clk_ctrl, p.reg_pll_gate]);
        assert_eq!(rig.apmu.peek(p.reg_glb_clk_ctrl), 0);
        assert_eq!(rig.apmu.peek(p.reg_pll_gate), 0);
        assert_eq!(rig.mpmu.written_offsets(), vec![p.reg_pll_ctrl1, p.reg_pll_cr]);
    }

    #[test]
    fn disable_returns_to_software_off() {
        let rig = Rig::new();
        let mut vco = rig.vco(PllId::Pll6);
        let p = *vco.params();
        rig.lock_detect(PllId::Pll6);
        let mut delay = NoDelay::default();

        vco.enable(&mut delay).unwrap();
        vco.disable();

        assert!(!vco.is_enabled());
        assert_eq!(rig.mpmu.peek(p.reg_pll_cr) & PllCr::SW_EN.bits(), 0);
        assert_eq!(rig.mpmu.peek(p.reg_pll_ctrl1) & PllCtrl1::PLL_RST.bits(), 0);

        // Disabled again, so rate changes are accepted.
        let freq = vco.table()[1];
        assert!(vco.set_rate(&freq, REF, &mut delay).is_ok());
    }
}
