// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! SerDes blocks built into the RTL8380 and RTL839x SoCs
//!
//! The RTL8380's SerDes need a vendor patch, which unlike the PHY patches is
//! a list of (SoC register, value) pairs.  The RTL839x SerDes 12/13 only need
//! two register tweaks.

use crate::rtl839x::{sds_offset, SDS12_13_XSG0};
use crate::{Dispatcher, Rtl83xxRw, Trace};
use ringbuf::ringbuf_entry_root as ringbuf_entry;
use rtl82xx::firmware::{FirmwareImage, TARGET_RTL8380};
use rtl82xx::{Duplex, LinkStatus, Speed};
use rtl_err::RtlError;

const RTL838X_SDS_MODE_SEL: u32 = 0x0028;
const RTL838X_SDS_CFG_REG: u32 = 0x0034;
const RTL838X_INT_RW_CTRL: u32 = 0x0058;
const RTL838X_INT_MODE_CTRL: u32 = 0x005c;
const RTL838X_PLL_CML_CTRL: u32 = 0x0ff8;

/// Firmware regions, in the order they are replayed
const TAKE_RESET: usize = 0;
const COMMON: usize = 1;
const SDS01_QSGMII: usize = 2;
const SDS_RELEASE_RESET: usize = 7;

/// SerDes 0-3 in QSGMII, 4/5 in 1000BASE-X
const SDS_MODES: u32 =
    6 << 25 | 6 << 20 | 6 << 15 | 6 << 10 | 4 << 5 | 4;

/// Patches the SerDes of an RTL8380.  The image is validated before the
/// first register write; `SDS_CFG_REG` is put back once the lists are done.
pub fn rtl8380_patch<R: Rtl83xxRw>(
    d: &Dispatcher<'_, R>,
    fw: &[u8],
) -> Result<(), RtlError> {
    let fw = FirmwareImage::parse_for(fw, TARGET_RTL8380)?;
    let rw = d.rw();

    let sds_conf = rw.read(RTL838X_SDS_CFG_REG)?;
    ringbuf_entry!(Trace::SdsConfBackup(sds_conf));

    for region in [TAKE_RESET, COMMON] {
        for [addr, value] in fw.pairs(region)? {
            rw.write(addr, value)?;
            rw.sleep_for(1);
        }
    }

    // Indirect access, then fiber on SerDes 4 and 5
    rw.write(RTL838X_INT_RW_CTRL, 0x3)?;
    rw.mask(RTL838X_INT_MODE_CTRL, 0x3f, 1 | (1 << 3))?;
    rw.write(RTL838X_SDS_MODE_SEL, SDS_MODES)?;
    rw.mask(RTL838X_PLL_CML_CTRL, 0xffff_fff0, 0xaaaa_aaaf & 0xf)?;

    for region in SDS01_QSGMII..=SDS_RELEASE_RESET {
        for [addr, value] in fw.pairs(region)? {
            rw.write(addr, value)?;
        }
    }

    rw.write(RTL838X_SDS_CFG_REG, sds_conf)?;
    ringbuf_entry!(Trace::SerdesPatched);
    Ok(())
}

pub fn rtl8390_configure<R: Rtl83xxRw>(
    d: &Dispatcher<'_, R>,
) -> Result<(), RtlError> {
    let rw = d.rw();
    rw.mask(SDS12_13_XSG0 + 0x0a, 0, 1 << 18)?;
    rw.mask(SDS12_13_XSG0 + 0xe0, 0x1f << 10, 0)
}

/// Reads the (latched) link bit of a SerDes control block twice
pub(crate) fn sds_link<R: Rtl83xxRw>(
    d: &Dispatcher<'_, R>,
    lane: u8,
) -> Result<bool, RtlError> {
    d.read_sds(lane, 0, 1)?;
    Ok(d.read_sds(lane, 0, 1)? & (1 << 2) != 0)
}

/// RTL8380 SerDes only run at 1000 / full
pub fn rtl8380_status<R: Rtl83xxRw>(
    d: &Dispatcher<'_, R>,
    lane: u8,
) -> Result<LinkStatus, RtlError> {
    if !sds_link(d, lane)? {
        return Ok(LinkStatus::DOWN);
    }
    Ok(LinkStatus {
        link: true,
        speed: Some(Speed::Speed1G),
        duplex: Duplex::Full,
    })
}

/// RTL8393 SerDes 12/13: speed comes from the control word in the shadow
/// register (bit 6 set, bit 13 clear is 1000; anything else is 100)
pub fn rtl8393_status<R: Rtl83xxRw>(
    d: &Dispatcher<'_, R>,
    lane: u8,
) -> Result<LinkStatus, RtlError> {
    if !sds_link(d, lane)? {
        return Ok(LinkStatus::DOWN);
    }
    let v = d.rw().read(SDS12_13_XSG0 + sds_offset(lane) + 0x80)?;
    let speed = if v & (1 << 13) == 0 && v & (1 << 6) != 0 {
        Speed::Speed1G
    } else {
        Speed::Speed100M
    };
    Ok(LinkStatus {
        link: true,
        speed: Some(speed),
        duplex: Duplex::Full,
    })
}
