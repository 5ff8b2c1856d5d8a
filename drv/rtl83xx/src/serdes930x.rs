// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! RTL930x SerDes mode engine
//!
//! The RTL930x has twelve SerDes lanes, reached through the indirect
//! protocol.  Lanes come in pairs that share an LC PLL and a ring PLL, whose
//! controls live on the even lane of the pair.

use crate::config::{SerdesMode, SerdesPort};
use crate::{Dispatcher, Rtl83xxRw, Trace};
use ringbuf::ringbuf_entry_root as ringbuf_entry;
use rtl82xx::{poll_until, Delay, Poll};
use rtl_err::{Argument, RtlError};

/// SerDes mode select register for each lane, and the LSB of its 5-bit field
const SDS_MODE_SEL: [(u32, u8); 12] = [
    (0x194, 0),
    (0x194, 6),
    (0x194, 12),
    (0x194, 18),
    (0x2a0, 0),
    (0x2a0, 6),
    (0x2a0, 12),
    (0x2a0, 18),
    (0x2a4, 0),
    (0x2a4, 6),
    (0x198, 0),
    (0x198, 6),
];

/// Mode code that turns a lane off
const SDS_MODE_OFF: u8 = 0x1f;

const MAC_FORCE_MODE_CTRL: u32 = 0xca1c;

/// Number of attempts to bring the PLLs up in `force_sds_mode`
const MODE_RETRIES: u8 = 20;

/// Debug register that exposes the PLL status on page 0x1f reg 20
const DEBUG_PLL_STATUS: u16 = 53;

/// Lane whose clock `clock_wait` watches
const CLOCK_LANE: u8 = 2;

/// Outcome of [force_sds_mode].  Running out of retries is not an error:
/// the lane is left in its last state and the caller is expected to watch
/// link status.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[must_use]
pub enum ModeStatus {
    Disabled,
    Active,
    RetriesExhausted,
    /// The mode has no TX or forced-mode parameters.  Only the SoC mode
    /// select was programmed and the lane stays forced off.
    NotForced,
}

/// Mode code and LC PLL settings for [force_sds_mode]
struct ForceParams {
    code: u8,
    /// Use the LC PLL (otherwise the ring PLL)
    lc_on: bool,
    pll_value: u16,
}

impl ForceParams {
    fn new(mode: SerdesMode) -> Result<Self, RtlError> {
        let (code, lc_on, pll_value) = match mode {
            SerdesMode::Sgmii => (0x02, false, 1),
            SerdesMode::Hsgmii => (0x12, false, 3),
            SerdesMode::Base1000X => (0x04, false, 1),
            SerdesMode::Base2500X => (0x16, false, 3),
            SerdesMode::Base10GR => (0x1a, true, 5),
            _ => return Err(RtlError::UnsupportedMode),
        };
        Ok(Self {
            code,
            lc_on,
            pll_value,
        })
    }
}

/// Mode code written to `SDS_MODE_SEL` by [serdes_setup]
fn setup_code(mode: SerdesMode) -> Result<u8, RtlError> {
    match mode {
        SerdesMode::Hsgmii => Ok(0x12),
        SerdesMode::Base1000X => Ok(0x04),
        SerdesMode::Xgmii => Ok(0x10),
        SerdesMode::Base10GR => Ok(0x1a),
        SerdesMode::Usxgmii => Ok(0x0d),
        _ => Err(RtlError::UnsupportedMode),
    }
}

/// Modes that [tx_config] and [force_sds_mode] both know how to drive
fn is_forceable(mode: SerdesMode) -> bool {
    matches!(
        mode,
        SerdesMode::Base1000X
            | SerdesMode::Hsgmii
            | SerdesMode::Base2500X
            | SerdesMode::Base10GR
    )
}

fn check_lane(lane: u8) -> Result<(), RtlError> {
    if usize::from(lane) >= SDS_MODE_SEL.len() {
        return Err(Argument::Lane(lane).into());
    }
    Ok(())
}

/// Cycles a lane through "off" and into `mode` in the SoC's mode select
/// register
pub fn sds_rst<R: Rtl83xxRw>(
    d: &Dispatcher<'_, R>,
    lane: u8,
    mode: u8,
) -> Result<(), RtlError> {
    check_lane(lane)?;
    let (addr, lsb) = SDS_MODE_SEL[usize::from(lane)];
    ringbuf_entry!(Trace::SdsReset { lane, mode });

    let rw = d.rw();
    rw.mask(addr, 0x1f << lsb, u32::from(SDS_MODE_OFF) << lsb)?;
    rw.sleep_for(10);
    rw.mask(addr, 0x1f << lsb, u32::from(mode & 0x1f) << lsb)?;
    rw.sleep_for(10);
    Ok(())
}

/// Forces a lane into `mode`, bringing up the PLL of its pair.  `Off` powers
/// the lane down and stops there.
pub fn force_sds_mode<R: Rtl83xxRw>(
    d: &Dispatcher<'_, R>,
    lane: u8,
    mode: SerdesMode,
) -> Result<ModeStatus, RtlError> {
    check_lane(lane)?;
    let params = match mode {
        SerdesMode::Off => None,
        m => Some(ForceParams::new(m)?),
    };
    let lane_0 = lane & !1;
    let even = lane == lane_0;
    // PLL select field of the pair, and the PLL-ready status bit
    let (sel_end, sel_start) = if even { (5, 4) } else { (7, 6) };
    let ready_bit = if even { 4 } else { 5 };

    // Power down, force mode enable, lane off
    d.sds_field_write(lane, 0x00, 0, 7, 6, 0x3)?;
    d.sds_field_write(lane, 0x1f, 9, 6, 6, 0x1)?;
    d.sds_field_write(lane, 0x1f, 9, 11, 7, SDS_MODE_OFF.into())?;

    let Some(params) = params else {
        return Ok(ModeStatus::Disabled);
    };
    let ten_gig = mode == SerdesMode::Base10GR;

    // Enable LC and ring
    d.sds_field_write(lane_0, 0x20, 18, 3, 0, 0xf)?;
    d.sds_field_write(lane_0, 0x20, 18, sel_end, sel_start, 0x1)?;
    d.sds_field_write(lane, 0x20, 0, 5, 4, 0x3)?;
    if params.lc_on {
        d.sds_field_write(lane_0, 0x20, 18, 11, 8, params.pll_value)?;
    } else {
        d.sds_field_write(lane_0, 0x20, 18, 15, 12, params.pll_value)?;
    }

    // Force analog LC and ring on
    d.sds_field_write(lane_0, 0x21, 11, 3, 0, 0xf)?;
    let pll = if params.lc_on { 0x3 } else { 0x1 };
    d.sds_field_write(lane_0, 0x20, 18, sel_end, sel_start, pll)?;

    d.sds_field_write(lane, 0x1f, 9, 6, 6, 1)?;
    d.sds_field_write(lane, 0x1f, 9, 11, 7, params.code.into())?;

    let mut status = ModeStatus::RetriesExhausted;
    for tries in 1..=MODE_RETRIES {
        d.sleep_for(200);

        d.write_sds(lane_0, 0x1f, 2, DEBUG_PLL_STATUS)?;
        let mut ready = true;
        for i in 0..3 {
            if i > 0 {
                d.sleep_for(10);
            }
            // Every read happens, even once one of them has come back 0
            let r = d.sds_field_read(lane_0, 0x1f, 20, ready_bit, ready_bit)?;
            ready &= r != 0;
        }

        if ready && (!ten_gig || check_10g_latch(d, lane)?) {
            ringbuf_entry!(Trace::ModeActive { lane, tries });
            status = ModeStatus::Active;
            break;
        }

        // Toggle the LC or ring PLL
        let (end, start) = if ten_gig { (3, 2) } else { (1, 0) };
        d.sds_field_write(lane_0, 0x21, 11, end, start, 0x2)?;
        d.sleep_for(10);
        d.sds_field_write(lane_0, 0x21, 11, end, start, 0x3)?;
    }
    if status == ModeStatus::RetriesExhausted {
        ringbuf_entry!(Trace::ModeRetriesExhausted { lane });
    }

    // Power back up, then reset the receiver
    d.sds_field_write(lane, 0x20, 0, 7, 6, 0)?;
    d.sds_field_write(lane, 0x2e, 0x15, 4, 4, 0x1)?;
    d.sleep_for(5);
    d.sds_field_write(lane, 0x2e, 0x15, 4, 4, 0x0)?;

    Ok(status)
}

/// Pulses the 10G FSM reset with the status latch enabled, and returns the
/// latched link bit.  The latch enable is put back the way it was.
fn check_10g_latch<R: Rtl83xxRw>(
    d: &Dispatcher<'_, R>,
    lane: u8,
) -> Result<bool, RtlError> {
    let latch = d.sds_field_read(lane, 0x6, 0x1, 2, 2)?;
    d.sds_field_write(lane, 0x6, 0x1, 2, 2, 0x1)?;
    reset_fsm(d, lane)?;

    // Latched, so the first read clears it
    d.sds_field_read(lane, 0x5, 0, 12, 12)?;
    let v = d.sds_field_read(lane, 0x5, 0, 12, 12)?;

    d.sds_field_write(lane, 0x6, 0x1, 2, 2, latch)?;
    reset_fsm(d, lane)?;
    Ok(v == 1)
}

fn reset_fsm<R: Rtl83xxRw>(
    d: &Dispatcher<'_, R>,
    lane: u8,
) -> Result<(), RtlError> {
    d.sds_field_write(lane, 0x6, 0x2, 12, 12, 0x1)?;
    d.sleep_for(10);
    d.sds_field_write(lane, 0x6, 0x2, 12, 12, 0x0)?;
    d.sleep_for(10);
    Ok(())
}

/// Programs TX amplitude and emphasis for `mode`
pub fn tx_config<R: Rtl83xxRw>(
    d: &Dispatcher<'_, R>,
    lane: u8,
    mode: SerdesMode,
) -> Result<(), RtlError> {
    const IMPEDANCE: u16 = 0x8;
    const PRE_AMP: u16 = 0x2;
    const MAIN_AMP: u16 = 0x9;
    const POST_AMP: u16 = 0x2;
    const PRE_EN: u16 = 0x1;
    const POST_EN: u16 = 0x1;

    let page = match mode {
        SerdesMode::Base1000X => 0x25,
        SerdesMode::Hsgmii | SerdesMode::Base2500X => 0x29,
        SerdesMode::Base10GR => 0x2f,
        _ => return Err(RtlError::UnsupportedMode),
    };
    d.sds_field_write(lane, page, 0x01, 15, 11, PRE_AMP)?;
    d.sds_field_write(lane, page, 0x07, 0, 0, PRE_EN)?;
    d.sds_field_write(lane, page, 0x07, 8, 4, MAIN_AMP)?;
    d.sds_field_write(lane, page, 0x06, 4, 0, POST_AMP)?;
    d.sds_field_write(lane, page, 0x07, 3, 3, POST_EN)?;
    d.sds_field_write(lane, page, 0x18, 15, 12, IMPEDANCE)
}

/// Waits up to `timeout_ms` for the clock of lane 2 to come up.  This
/// assumes the lane is in XGMII mode.
pub fn clock_wait<R: Rtl83xxRw>(
    d: &Dispatcher<'_, R>,
    timeout_ms: u32,
) -> Result<(), RtlError> {
    match poll_until(d, timeout_ms as usize, 1, || {
        d.sds_field_write(CLOCK_LANE, 0x1f, 0x2, 15, 0, DEBUG_PLL_STATUS)?;
        Ok(d.sds_field_read(CLOCK_LANE, 0x1f, 20, 5, 4)? == 3)
    })? {
        Poll::Done => Ok(()),
        Poll::TimedOut => Err(RtlError::PhyInitTimeout { port: CLOCK_LANE }),
    }
}

/// Sets the 1G and 10G sides of the lane's MAC link to normal or inverted
/// polarity
pub fn mac_link_config<R: Rtl83xxRw>(
    d: &Dispatcher<'_, R>,
    lane: u8,
    tx_normal: bool,
    rx_normal: bool,
) -> Result<(), RtlError> {
    let mut v10 = d.read_sds(lane, 6, 2)?;
    let mut v1 = d.read_sds(lane, 0, 0)?;
    ringbuf_entry!(Trace::MacLinkBefore { lane, v10, v1 });

    v10 &= !((1 << 13) | (1 << 14));
    v1 &= !((1 << 8) | (1 << 9));
    if !rx_normal {
        v10 |= 1 << 13;
        v1 |= 1 << 9;
    }
    if !tx_normal {
        v10 |= 1 << 14;
        v1 |= 1 << 8;
    }
    d.write_sds(lane, 6, 2, v10)?;
    d.write_sds(lane, 0, 0, v1)?;

    let v10 = d.read_sds(lane, 6, 2)?;
    let v1 = d.read_sds(lane, 0, 0)?;
    ringbuf_entry!(Trace::MacLinkAfter { lane, v10, v1 });
    Ok(())
}

/// Power-on and mode sequence shared by [serdes_setup] and
/// [configure_serdes], starting from the first reset.  Modes without TX or
/// force parameters skip those steps but still get the closing reset.
fn bring_up<R: Rtl83xxRw>(
    d: &Dispatcher<'_, R>,
    lane: u8,
    mode: SerdesMode,
    code: u8,
) -> Result<ModeStatus, RtlError> {
    sds_rst(d, lane, code)?;
    mac_link_config(d, lane, true, true)?;

    // Power on the 1G and 10G PCS
    for page in [2, 4] {
        let v = d.read_sds(lane, page, 0)?;
        d.write_sds(lane, page, 0, v & !(1 << 11))?;
    }

    let _ = force_sds_mode(d, lane, SerdesMode::Off)?;
    let status = if is_forceable(mode) {
        tx_config(d, lane, mode)?;
        force_sds_mode(d, lane, mode)?
    } else {
        ringbuf_entry!(Trace::ModeNotForced { lane, code });
        ModeStatus::NotForced
    };

    sds_rst(d, lane, code)?;
    Ok(status)
}

/// Brings a lane up in `mode`, with fiber as its medium
pub fn serdes_setup<R: Rtl83xxRw>(
    d: &Dispatcher<'_, R>,
    lane: u8,
    mode: SerdesMode,
) -> Result<ModeStatus, RtlError> {
    let code = setup_code(mode)?;
    check_lane(lane)?;

    let v = d.read_sds(lane, 0x1f, 11)?;
    d.write_sds(lane, 0x1f, 11, v | (1 << 1))?;

    bring_up(d, lane, mode, code)
}

/// Configures the SerDes behind a port.  The port's MAC is forced link-down
/// at the lane speed while the lane is brought up.
pub fn configure_serdes<R: Rtl83xxRw>(
    d: &Dispatcher<'_, R>,
    cfg: SerdesPort,
) -> Result<ModeStatus, RtlError> {
    let (code, speed) = match cfg.mode {
        SerdesMode::Base10GR => (0x1a, 4),
        SerdesMode::Base1000X => (0x04, 2),
        _ => return Err(RtlError::UnsupportedMode),
    };
    check_lane(cfg.lane)?;

    // Make sure the lane answers before touching the MAC
    d.read_sds(cfg.lane, 0x1f, 11)?;

    let rw = d.rw();
    rw.modify(MAC_FORCE_MODE_CTRL + 4 * u32::from(cfg.port), |v| {
        *v |= 1 << 0;
        *v &= !(7 << 3);
        *v |= speed << 3;
        *v &= !(1 << 1);
    })?;
    rw.sleep_for(20);

    bring_up(d, cfg.lane, cfg.mode, code)
}
