// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The RTL8226 is a 2.5G PHY that is only addressed through clause 45.

use crate::{Duplex, LinkStatus, Phy, PhyRw, Speed, Trace, MMD_AN, MMD_VEND2};
use ringbuf::ringbuf_entry_root as ringbuf_entry;
use rtl_err::RtlError;

pub const PHY_ID_RTL8226: u32 = 0x001c_c838;

/// Vendor MMD registers
const VEND2_ANCTRL: u16 = 0xa400;
const VEND2_STATUS: u16 = 0xa402;
const VEND2_GBCR: u16 = 0xa412;
const VEND2_PHYSR: u16 = 0xa434;

pub struct Rtl8226Phy<'a, P> {
    pub phy: Phy<'a, P>,
}

impl<'a, P: PhyRw> Rtl8226Phy<'a, P> {
    pub fn new(port: u8, rw: &'a P) -> Self {
        Self {
            phy: Phy::new(port, rw),
        }
    }

    pub fn read_status(&self) -> Result<LinkStatus, RtlError> {
        let phy = &self.phy;

        // Link status is latched and must be read twice
        phy.read_mmd(MMD_VEND2, VEND2_STATUS)?;
        let v = phy.read_mmd(MMD_VEND2, VEND2_STATUS)?;
        if v & (1 << 2) == 0 {
            return Ok(LinkStatus::DOWN);
        }

        let physr = phy.read_mmd(MMD_VEND2, VEND2_PHYSR)?;
        Ok(LinkStatus {
            link: true,
            speed: Speed::from_realtek(physr),
            duplex: if physr & (1 << 3) != 0 {
                Duplex::Full
            } else {
                Duplex::Half
            },
        })
    }

    /// Advertises 10/100 half and full, 1000 full, and 2500 full
    fn advertise(&self) -> Result<(), RtlError> {
        let phy = &self.phy;
        phy.modify_mmd(MMD_AN, 16, |v| {
            *v |= (1 << 5) | (1 << 6) | (1 << 7) | (1 << 8)
        })?;
        phy.modify_mmd(MMD_VEND2, VEND2_GBCR, |v| *v |= 1 << 9)?;
        phy.modify_mmd(MMD_AN, 32, |v| *v |= 1 << 7)
    }

    /// Turns on and restarts auto-negotiation with the full advertisement
    pub fn config_aneg(&self) -> Result<(), RtlError> {
        self.advertise()?;
        self.phy.modify_mmd(MMD_AN, 0, |v| *v |= 1 << 12)?;
        self.restart_aneg()
    }

    fn restart_aneg(&self) -> Result<(), RtlError> {
        self.phy.modify_mmd(MMD_VEND2, VEND2_ANCTRL, |v| *v |= 1 << 9)
    }

    pub fn get_eee(&self) -> Result<bool, RtlError> {
        let phy = &self.phy;
        if phy.read_mmd(MMD_AN, 60)? & (1 << 1) != 0 {
            return Ok(true);
        }
        Ok(phy.read_mmd(MMD_AN, 62)? & (1 << 0) != 0)
    }

    /// Sets EEE advertisement for 100M / 1000M (MMD 7.60) and 2.5G
    /// (MMD 7.62), then restarts auto-negotiation
    pub fn set_eee(&self, enable: bool) -> Result<(), RtlError> {
        ringbuf_entry!(Trace::EeeSet {
            port: self.phy.port,
            enable
        });
        let phy = &self.phy;

        phy.modify_mmd(MMD_AN, 60, |v| {
            if enable {
                *v |= 0x6
            } else {
                *v &= !0x6
            }
        })?;
        phy.modify_mmd(MMD_AN, 62, |v| {
            if enable {
                *v |= 0x1
            } else {
                *v &= !0x1
            }
        })?;

        self.restart_aneg()
    }
}
