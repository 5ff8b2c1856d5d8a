// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::firmware::{FirmwareImage, TARGET_RTL8218B, TARGET_RTL8380};
use crate::{LinkStatus, Phy, PhyRw, Trace, PACKAGE_PORTS, PAGE_RAW};
use ringbuf::ringbuf_entry_root as ringbuf_entry;
use rtl_err::RtlError;

/// IEEE id of the RTL8218B embedded in the RTL838x SoCs
pub const PHY_ID_RTL8218B_I: u32 = 0x001c_ca40;
/// IEEE id shared by the external RTL8218B and the RTL8214FC
pub const PHY_ID_RTL8218B_E: u32 = 0x001c_c981;

/// Internal ids, read with [Phy::read_internal_id]
pub const RTL8218B_INT_ID: u16 = 0x6275;
pub const RTL8218B_EXT_ID: u16 = 0x6276;

/// Firmware regions used by the internal PHY: two per-port lists
const INT_PERPORT: usize = 8;
const INT_HW_ESD_PERPORT: usize = 9;

/// Firmware regions used by the external PHY
const EXT_PERCHIP: usize = 0;
const EXT_PERPORT: usize = 1;

/// Represents an RTL8218B, which is an octal GPHY.  `base_port` is the PHY
/// address of the chip's port 0.
#[derive(Copy, Clone, Debug)]
pub struct Rtl8218b {
    base_port: u8,
}

impl Rtl8218b {
    /// Patches the RTL8218B embedded in an RTL8380.  The firmware is
    /// checked before any register is touched.
    pub fn init_internal<P: PhyRw>(
        base_port: u8,
        rw: &P,
        fw: &[u8],
    ) -> Result<Self, RtlError> {
        let phy = Phy::new(base_port, rw);
        phy.check_base_port()?;
        let fw = FirmwareImage::parse_for(fw, TARGET_RTL8380)?;

        ringbuf_entry!(Trace::Rtl8218bIntInit(base_port));
        phy.read_id()?;
        check_internal_id(&phy, RTL8218B_INT_ID)?;

        phy.power_on_or_reset()?;
        phy.sleep_for(100);

        phy.request_patch(PACKAGE_PORTS)?;
        phy.sleep_for(500);
        phy.wait_patch_ready(PACKAGE_PORTS)?;

        for i in 0..PACKAGE_PORTS {
            let p = phy.at(i)?;
            p.apply_pairs(fw.pairs(INT_PERPORT)?)?;
            p.apply_pairs(fw.pairs(INT_HW_ESD_PERPORT)?)?;
        }

        Ok(Self { base_port })
    }

    /// Patches an external RTL8218B, using broadcast writes for the
    /// per-port list.
    pub fn init_external<P: PhyRw>(
        base_port: u8,
        rw: &P,
        fw: &[u8],
    ) -> Result<Self, RtlError> {
        let phy = Phy::new(base_port, rw);
        phy.check_base_port()?;
        let fw = FirmwareImage::parse_for(fw, TARGET_RTL8218B)?;

        ringbuf_entry!(Trace::Rtl8218bExtInit(base_port));
        phy.read_id()?;
        check_internal_id(&phy, RTL8218B_EXT_ID)?;

        phy.power_on_or_reset()?;
        phy.sleep_for(100);

        phy.write(PAGE_RAW, 0x1f, 0x0000)?;
        phy.read_revision()?;

        phy.apply_triples(fw.triples(EXT_PERCHIP)?)?;

        phy.enable_ports(PACKAGE_PORTS)?;
        phy.sleep_for(100);

        phy.request_patch(PACKAGE_PORTS)?;
        phy.sleep_for(300);
        phy.wait_patch_ready(PACKAGE_PORTS)?;

        phy.broadcast(|p| {
            let ipd = read_ipd(p)?;
            ringbuf_entry!(Trace::Ipd(ipd));
            p.apply_pairs(fw.pairs(EXT_PERPORT)?)
        })?;

        Ok(Self { base_port })
    }

    /// Returns a handle to address the specified port, which must be in the
    /// range 0-7
    pub fn phy<'a, P: PhyRw>(
        &self,
        port: u8,
        rw: &'a P,
    ) -> Result<Rtl8218bPhy<'a, P>, RtlError> {
        if port >= PACKAGE_PORTS {
            return Err(rtl_err::Argument::Port(port).into());
        }
        Ok(Rtl8218bPhy {
            phy: Phy::new(self.base_port + port, rw),
        })
    }
}

pub(crate) fn check_internal_id<P: PhyRw>(
    phy: &Phy<P>,
    expected: u16,
) -> Result<(), RtlError> {
    let found = phy.read_internal_id()?;
    if found != expected {
        return Err(RtlError::UnexpectedChipId {
            port: phy.port,
            expected: expected.into(),
            found: found.into(),
        });
    }
    Ok(())
}

/// Reads the IPD field from the package's debug registers
fn read_ipd<P: PhyRw>(phy: &Phy<P>) -> Result<u8, RtlError> {
    phy.write(PAGE_RAW, 30, 8)?;
    phy.write(0x26e, 17, 0xb)?;
    phy.write(0x26e, 16, 0x2)?;
    phy.sleep_for(1);
    let ipd = phy.read(0x26e, 19)?;
    phy.write(0, 30, 0)?;
    Ok(((ipd >> 4) & 0xf) as u8)
}

////////////////////////////////////////////////////////////////////////////////

pub struct Rtl8218bPhy<'a, P> {
    pub phy: Phy<'a, P>,
}

impl<P: PhyRw> Rtl8218bPhy<'_, P> {
    pub fn read_status(&self) -> Result<LinkStatus, RtlError> {
        self.phy.read_gphy_status()
    }

    /// Enables or disables 100M / 1000M EEE advertisement, restarting
    /// auto-negotiation if it is on.  Callers are expected to hold off the
    /// SoC's PHY polling around this.
    pub fn set_eee(&self, enable: bool) -> Result<(), RtlError> {
        ringbuf_entry!(Trace::EeeSet {
            port: self.phy.port,
            enable
        });
        let phy = &self.phy;

        // GPHY page to copper
        phy.write(0, 30, 0x0001)?;
        let an_enabled = phy.read(0, 0)? & (1 << 12) != 0;

        // MMD 7.60 through the clause 22 indirect registers
        phy.write(0, 13, 0x0007)?;
        phy.write(0, 14, 0x003c)?;
        if enable {
            phy.write(0, 13, 0x4007)?;
            phy.write(0, 14, 0x0006)?;
            phy.modify(0x0a43, 25, |r| *r |= 1 << 4)?;
        } else {
            phy.write(0, 13, 0x0007)?;
            phy.write(0, 14, 0x0000)?;
            phy.modify(0x0a43, 25, |r| *r &= !(1 << 4))?;
        }

        if an_enabled {
            phy.modify(0, 0, |r| *r |= 1 << 9)?;
        }

        // GPHY page back to auto
        phy.write(0xa42, 30, 0)
    }

    pub fn get_eee(&self) -> Result<bool, RtlError> {
        get_eee(&self.phy)
    }
}

/// Reads EEE state from the 100M/1000M advertisement, falling back to the
/// MAC-based EEE enable bit
pub(crate) fn get_eee<P: PhyRw>(phy: &Phy<P>) -> Result<bool, RtlError> {
    phy.write(0xa42, 29, 0x0001)?;
    let mut enabled = phy.read_mmd(crate::MMD_AN, 60)? & 0x6 != 0;
    if !enabled {
        enabled = phy.read(0x0a43, 25)? & (1 << 4) != 0;
    }
    phy.write(0xa42, 29, 0x0000)?;
    Ok(enabled)
}
