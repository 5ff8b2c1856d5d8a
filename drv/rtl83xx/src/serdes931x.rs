// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! RTL931x SerDes helpers
//!
//! The RTL931x numbers its SerDes two ways.  Digital SerDes (the ones MAC
//! ports attach to) are numbered 0-13; the analog front ends behind them
//! skip a pair after every two lanes, see [analog_sds].  Mode control words
//! in the SoC register space pack four SerDes into one 32-bit register.

use crate::config::SerdesMode;
use crate::{Dispatcher, Rtl83xxRw, Trace};
use ringbuf::ringbuf_entry_root as ringbuf_entry;
use rtl82xx::Delay;
use rtl_err::RtlError;

const PS_SERDES_OFF_MODE_CTRL: u32 = 0x13f4;
const SERDES_MODE_CTRL: u32 = 0x13cc;

/// Mode control byte that parks a SerDes: force enable plus mode "off"
const MODE_CTRL_OFF: u32 = (1 << 7) | 0x1f;
const MODE_CTRL_FORCE: u32 = 1 << 7;

const ANALOG_SDS: [u8; 14] = [0, 1, 2, 3, 6, 7, 10, 11, 14, 15, 18, 19, 22, 23];

/// Maps a digital SerDes to the analog SerDes behind it
pub fn analog_sds(sds: u8) -> u8 {
    ANALOG_SDS.get(usize::from(sds)).copied().unwrap_or(sds)
}

/// First of the pair of XSGMII SerDes behind a digital SerDes
fn xsg_sds(sds: u8) -> u8 {
    if sds < 2 {
        sds
    } else {
        (sds - 1).saturating_mul(2)
    }
}

fn mode_ctrl(sds: u8) -> u32 {
    SERDES_MODE_CTRL + 4 * u32::from(sds >> 2)
}

/// Resets a SerDes by parking it with power save off, then putting the mode
/// control word and power save register back as they were
pub fn sds_rst<R: Rtl83xxRw>(
    d: &Dispatcher<'_, R>,
    sds: u8,
) -> Result<(), RtlError> {
    let rw = d.rw();
    let shift = u32::from(sds & 0x3) << 3;

    let off = rw.read(PS_SERDES_OFF_MODE_CTRL)?;
    rw.write(PS_SERDES_OFF_MODE_CTRL, off | (1 << (sds & 0x1f)))?;

    let addr = mode_ctrl(sds);
    let mode = rw.read(addr)?;
    rw.mask(addr, 0xff << shift, MODE_CTRL_OFF << shift)?;
    rw.write(addr, mode)?;

    rw.write(PS_SERDES_OFF_MODE_CTRL, off)
}

/// Clears the symbol error counters of both XSGMII SerDes behind `sds`.
/// Only XGMII has them; for any other mode this does nothing.
pub fn symerr_clear<R: Rtl83xxRw>(
    d: &Dispatcher<'_, R>,
    sds: u8,
    mode: SerdesMode,
) -> Result<(), RtlError> {
    if mode != SerdesMode::Xgmii {
        return Ok(());
    }
    let xsg0 = xsg_sds(sds);
    let xsg1 = xsg0.saturating_add(1);

    for x in [xsg0, xsg1] {
        for i in 0..4 {
            d.sds_field_write(x, 0x1, 24, 2, 0, i)?;
            d.sds_field_write(x, 0x1, 3, 15, 8, 0x0)?;
            d.sds_field_write(x, 0x1, 2, 15, 0, 0x0)?;
        }
    }
    for x in [xsg0, xsg1] {
        d.sds_field_write(x, 0x1, 0, 15, 0, 0x0)?;
        d.sds_field_write(x, 0x1, 1, 15, 8, 0x0)?;
    }
    Ok(())
}

pub fn fiber_disable<R: Rtl83xxRw>(
    d: &Dispatcher<'_, R>,
    sds: u8,
) -> Result<(), RtlError> {
    d.sds_field_write(analog_sds(sds), 0x1f, 0x9, 11, 6, 0x3f)
}

/// Puts a SerDes into one of its fiber modes.  The digital side is parked
/// first; modes without a fiber encoding fall back to the default 0x25.
pub fn fiber_mode_set<R: Rtl83xxRw>(
    d: &Dispatcher<'_, R>,
    sds: u8,
    mode: SerdesMode,
) -> Result<(), RtlError> {
    let asds = analog_sds(sds);
    symerr_clear(d, sds, mode)?;

    // The whole word, as the hardware expects
    d.rw().write(mode_ctrl(sds), MODE_CTRL_OFF)?;

    let value = match mode {
        SerdesMode::Sgmii => 0x5,
        SerdesMode::Base1000X => 0x9,
        SerdesMode::Base10GR => 0x35,
        SerdesMode::Usxgmii => 0x1b,
        _ => 0x25,
    };
    ringbuf_entry!(Trace::AnalogMode { lane: asds, value });
    d.sds_field_write(asds, 0x1f, 0x9, 11, 6, value)
}

/// Page holding the clock management unit settings for `mode`
pub fn cmu_page(mode: SerdesMode) -> Result<u8, RtlError> {
    match mode {
        SerdesMode::Sgmii | SerdesMode::Base1000X => Ok(0x24),
        SerdesMode::Hsgmii | SerdesMode::Base2500X => Ok(0x28),
        SerdesMode::Qsgmii => Ok(0x2a),
        SerdesMode::Xgmii | SerdesMode::Base10GR => Ok(0x2e),
        _ => Err(RtlError::UnsupportedMode),
    }
}

/// Selects the ring-based CMU for the 1G and 2.5G modes.  10G modes keep
/// the LC CMU and need nothing here.  `chip_type` is bit 4 of the model
/// name register.
pub fn cmu_type_set<R: Rtl83xxRw>(
    d: &Dispatcher<'_, R>,
    asds: u8,
    mode: SerdesMode,
    chip_type: bool,
) -> Result<(), RtlError> {
    let speed = match mode {
        SerdesMode::Off
        | SerdesMode::Xgmii
        | SerdesMode::Base10GR
        | SerdesMode::Usxgmii => return Ok(()),
        SerdesMode::Qsgmii | SerdesMode::Base1000X | SerdesMode::Sgmii => 0,
        SerdesMode::Hsgmii | SerdesMode::Base2500X => 1,
    };
    let page = cmu_page(mode)?;
    let lane = asds % 2;
    let (force_bit, value_bit) = if lane == 0 { (4, 5) } else { (6, 7) };
    let even = asds - lane;

    d.sds_field_write(asds, page, 0x7, 15, 15, 0)?;
    if chip_type {
        d.sds_field_write(asds, page, 0xd, 14, 14, 0)?;
    }

    d.sds_field_write(even, 0x20, 0x12, 3, 2, 0x3)?;
    d.sds_field_write(even, 0x20, 0x12, force_bit, force_bit, 1)?;
    d.sds_field_write(even, 0x20, 0x12, value_bit, value_bit, 0)?;
    d.sds_field_write(even, 0x20, 0x12, 12, 12, 1)?;
    d.sds_field_write(even, 0x20, 0x12, 15, 13, speed)
}

/// Reads the CMU band of the pair that `sds` belongs to
pub fn cmu_band_get<R: Rtl83xxRw>(
    d: &Dispatcher<'_, R>,
    sds: u8,
    mode: SerdesMode,
) -> Result<u16, RtlError> {
    let page = cmu_page(mode)? + 1;
    let asds = analog_sds(sds & !1);

    d.write_sds(asds, 0x1f, 0x02, 73)?;
    d.sds_field_write(asds, page, 0x5, 15, 15, 1)?;
    let band = d.sds_field_read(asds, 0x1f, 0x15, 8, 3)?;
    ringbuf_entry!(Trace::CmuBand { lane: asds, band });
    Ok(band)
}

/// Forces the CMU band of the pair that `sds` belongs to, then resets it
pub fn cmu_band_set<R: Rtl83xxRw>(
    d: &Dispatcher<'_, R>,
    sds: u8,
    band: u16,
    mode: SerdesMode,
) -> Result<(), RtlError> {
    let page = cmu_page(mode)? + 1;
    let sds = sds & !1;
    let asds = analog_sds(sds);

    d.sds_field_write(asds, page, 0x7, 13, 13, 0)?;
    d.sds_field_write(asds, page, 0x7, 11, 11, 0)?;
    d.sds_field_write(asds, page, 0x7, 4, 0, band)?;

    sds_rst(d, sds)
}

/// Resets the receiver of a SerDes.  SerDes 0 and 1 have no such sequence.
pub fn rx_rst<R: Rtl83xxRw>(
    d: &Dispatcher<'_, R>,
    sds: u8,
) -> Result<(), RtlError> {
    const SEQUENCE: [(u8, u8, u16); 8] = [
        (0x2e, 0x12, 0x2740),
        (0x2f, 0x00, 0x0000),
        (0x2f, 0x02, 0x2010),
        (0x20, 0x00, 0x0c10),
        (0x2e, 0x12, 0x27c0),
        (0x2f, 0x00, 0xc000),
        (0x2f, 0x02, 0x6010),
        (0x20, 0x00, 0x0c30),
    ];
    if sds < 2 {
        return Ok(());
    }
    let asds = analog_sds(sds);
    for (page, reg, value) in SEQUENCE {
        d.write_sds(asds, page, reg, value)?;
    }
    d.sleep_for(50);
    Ok(())
}

/// Parks a SerDes.  This writes the whole mode control word.
pub fn sds_disable<R: Rtl83xxRw>(
    d: &Dispatcher<'_, R>,
    sds: u8,
) -> Result<(), RtlError> {
    d.rw().write(mode_ctrl(sds), MODE_CTRL_OFF)
}

/// Sets the MAC-side (MII) mode of a SerDes.  Modes without an MII encoding
/// are left alone.
pub fn mii_mode_set<R: Rtl83xxRw>(
    d: &Dispatcher<'_, R>,
    sds: u8,
    mode: SerdesMode,
) -> Result<(), RtlError> {
    let value = match mode {
        SerdesMode::Qsgmii => 0x6,
        SerdesMode::Xgmii => 0x10,
        SerdesMode::Usxgmii | SerdesMode::Base2500X => 0xd,
        SerdesMode::Hsgmii => 0x12,
        SerdesMode::Sgmii => 0x2,
        _ => return Ok(()),
    };
    d.rw().write(mode_ctrl(sds), value | MODE_CTRL_FORCE)
}

/// Returns the link bit of the digital side of `sds`.  The analog status
/// and latches are only traced.
pub fn link_status<R: Rtl83xxRw>(
    d: &Dispatcher<'_, R>,
    sds: u8,
) -> Result<bool, RtlError> {
    let asds = analog_sds(sds);
    let status = d.sds_field_read(asds, 0x5, 0, 12, 12)?;
    let latched = d.sds_field_read(asds, 0x4, 1, 2, 2)?;

    let dsds = xsg_sds(sds);
    let link = d.sds_field_read(dsds, 0x2, 1, 2, 2)?;
    ringbuf_entry!(Trace::SdsLink {
        lane: sds,
        status,
        latched
    });
    Ok(link != 0)
}
