// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::{LinkStatus, Phy, PhyRw, Trace, MMD_AN};
use ringbuf::ringbuf_entry_root as ringbuf_entry;
use rtl_err::RtlError;

pub const PHY_ID_RTL8218D: u32 = 0x001c_c983;

pub struct Rtl8218dPhy<'a, P> {
    pub phy: Phy<'a, P>,
}

impl<'a, P: PhyRw> Rtl8218dPhy<'a, P> {
    pub fn new(port: u8, rw: &'a P) -> Self {
        Self {
            phy: Phy::new(port, rw),
        }
    }

    pub fn read_status(&self) -> Result<LinkStatus, RtlError> {
        self.phy.read_gphy_status()
    }

    /// Enables or disables 100M / 1000M / 500M EEE advertisement
    pub fn set_eee(&self, enable: bool) -> Result<(), RtlError> {
        ringbuf_entry!(Trace::EeeSet {
            port: self.phy.port,
            enable
        });
        let phy = &self.phy;

        // GPHY page to copper
        phy.write(0xa42, 30, 0x0001)?;
        let an_enabled = phy.read(0, 0)? & (1 << 12) != 0;

        phy.write_mmd(MMD_AN, 60, if enable { 0x6 } else { 0 })?;
        phy.modify(0xa42, 20, |r| {
            if enable {
                *r |= 1 << 7
            } else {
                *r &= !(1 << 7)
            }
        })?;

        if an_enabled {
            phy.modify(0, 0, |r| *r |= 1 << 9)?;
        }

        // GPHY page back to auto
        phy.write(0xa42, 30, 0)
    }

    pub fn get_eee(&self) -> Result<bool, RtlError> {
        let phy = &self.phy;
        phy.write(0xa42, 30, 0x0001)?;
        let v = phy.read_mmd(MMD_AN, 60)?;
        phy.write(0xa42, 30, 0x0000)?;
        Ok(v & 0x6 != 0)
    }
}
