// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The RTL8214FC is a quad combo PHY: each port has a copper GPHY and a
//! fiber (1000BASE-X) side, selected through a media register on page 0x266.

use crate::firmware::{FirmwareImage, Triples, TARGET_RTL8214FC};
use crate::patch::{list_offset, list_reg};
use crate::rtl8218b::{check_internal_id, get_eee, RTL8218B_EXT_ID};
use crate::{LinkStatus, Medium, Phy, PhyRw, Trace, MMD_AN, PAGE_RAW};
use ringbuf::ringbuf_entry_root as ringbuf_entry;
use rtl_err::RtlError;

pub const PHY_ID_RTL8214FC: u32 = crate::rtl8218b::PHY_ID_RTL8218B_E;

pub const RTL8214FC_PORTS: u8 = 4;

const PERCHIP: usize = 0;
const PERPORT: usize = 1;

/// Per-port media registers on page 0x266, indexed by port within the chip
const MEDIA_REGS: [u8; 4] = [16, 19, 20, 21];

#[derive(Copy, Clone, Debug)]
pub struct Rtl8214fc {
    base_port: u8,
}

impl Rtl8214fc {
    pub fn init<P: PhyRw>(
        base_port: u8,
        rw: &P,
        fw: &[u8],
    ) -> Result<Self, RtlError> {
        let phy = Phy::new(base_port, rw);
        phy.check_base_port()?;
        let fw = FirmwareImage::parse_for(fw, TARGET_RTL8214FC)?;

        ringbuf_entry!(Trace::Rtl8214fcInit(base_port));
        phy.read_id()?;
        phy.write(0, 30, 0x0001)?;
        phy.write(0, 31, 0x0a42)?;
        check_internal_id(&phy, RTL8218B_EXT_ID)?;

        phy.read_revision()?;

        if phy.read(0, 16)? & (1 << 11) != 0 {
            set_power(&phy, true)?;
        } else {
            phy.software_reset()?;
        }
        phy.sleep_for(100);
        phy.write(0, 30, 0x0001)?;

        apply_perchip(&phy, fw.triples(PERCHIP)?)?;

        // Force copper medium
        for i in 0..RTL8214FC_PORTS {
            let p = phy.at(i)?;
            p.write(PAGE_RAW, 0x1f, 0x0000)?;
            p.write(PAGE_RAW, 0x1e, 0x0001)?;
        }

        phy.enable_ports(RTL8214FC_PORTS)?;
        phy.sleep_for(100);

        // Wait for autosensing to settle on copper
        for i in 0..RTL8214FC_PORTS {
            phy.at(i)?.wait_timeout(0x0a42, 0x10, |v| v & 0x7 >= 3)?;
        }

        phy.request_patch(RTL8214FC_PORTS)?;
        phy.sleep_for(300);
        phy.wait_patch_ready(RTL8214FC_PORTS)?;

        phy.broadcast(|p| p.apply_pairs(fw.pairs(PERPORT)?))?;

        // Auto medium selection
        for i in 0..RTL8214FC_PORTS {
            let p = phy.at(i)?;
            p.write(PAGE_RAW, 0x1f, 0x0000)?;
            p.write(PAGE_RAW, 0x1e, 0x0000)?;
        }

        Ok(Self { base_port })
    }

    pub fn phy<'a, P: PhyRw>(
        &self,
        port: u8,
        rw: &'a P,
    ) -> Result<Rtl8214fcPhy<'a, P>, RtlError> {
        if port >= RTL8214FC_PORTS {
            return Err(rtl_err::Argument::Port(port).into());
        }
        Ok(Rtl8214fcPhy {
            phy: Phy::new(self.base_port + port, rw),
        })
    }
}

/// Replays the per-chip list.  Writes to register 0x13 while page 0x260 is
/// selected keep bits 12:8 of the live register.
fn apply_perchip<P: PhyRw>(
    phy: &Phy<P>,
    list: Triples,
) -> Result<(), RtlError> {
    let mut page = 0;
    let mut n = 0u16;
    for [offset, reg, value] in list {
        let p = phy.at(list_offset(offset)?)?;
        let reg = list_reg(reg)?;
        let mut value = value as u16;

        if reg == 0x1f {
            page = value;
        }
        if reg == 0x13 && page == 0x260 {
            let live = p.read(0x260, 13)?;
            value = (live & 0x1f00) | (value & 0xe0ff);
        }
        p.write(PAGE_RAW, reg, value)?;
        n += 1;
    }
    ringbuf_entry!(Trace::ListApplied {
        port: phy.port,
        writes: n
    });
    Ok(())
}

/// Powers both sides of a combo port up or down
fn set_power<P: PhyRw>(phy: &Phy<P>, on: bool) -> Result<(), RtlError> {
    let apply = |r: u16| {
        if on {
            r & !(1 << 11)
        } else {
            r | (1 << 11)
        }
    };

    // Fiber
    phy.write(PAGE_RAW, 30, 3)?;
    let r = phy.read(0, 16)?;
    phy.write(0, 16, apply(r))?;

    // Copper
    phy.write(PAGE_RAW, 30, 1)?;
    let r = phy.read(0, 16)?;
    phy.write(0xa40, 16, apply(r))
}

////////////////////////////////////////////////////////////////////////////////

pub struct Rtl8214fcPhy<'a, P> {
    pub phy: Phy<'a, P>,
}

impl<'a, P: PhyRw> Rtl8214fcPhy<'a, P> {
    pub fn new(port: u8, rw: &'a P) -> Self {
        Self {
            phy: Phy::new(port, rw),
        }
    }

    /// Handle on port 0 of the package, which owns the media registers
    fn base(&self) -> Phy<'a, P> {
        Phy::new(self.phy.port - self.phy.port % 4, self.phy.rw)
    }

    fn media_reg(&self) -> u8 {
        MEDIA_REGS[usize::from(self.phy.port % 4)]
    }

    pub fn power(&self, on: bool) -> Result<(), RtlError> {
        set_power(&self.phy, on)
    }

    pub fn read_status(&self) -> Result<LinkStatus, RtlError> {
        self.phy.read_gphy_status()
    }

    pub fn get_medium(&self) -> Result<Medium, RtlError> {
        let base = self.base();
        base.write(PAGE_RAW, 29, 8)?;
        let v = base.read(0x266, self.media_reg())?;
        base.write(PAGE_RAW, 29, 0)?;
        Ok(if v & (1 << 11) != 0 {
            Medium::Copper
        } else {
            Medium::Fiber
        })
    }

    /// Switches the port to `medium`, powering off the side that was active
    /// and powering up the new one
    pub fn set_medium(&self, medium: Medium) -> Result<(), RtlError> {
        let fiber = medium == Medium::Fiber;
        ringbuf_entry!(Trace::MediumSet {
            port: self.phy.port,
            fiber
        });
        let base = self.base();
        let reg = self.media_reg();

        base.write(PAGE_RAW, 29, 8)?;
        let mut v = base.read(0x266, reg)?;

        // Power off whatever is currently selected
        let current = if (v >> 10) & 0x2 != 0 { 1 } else { 3 };
        base.write(PAGE_RAW, 29, current)?;
        let power = base.read(0xa40, 16)?;
        if power & (1 << 11) == 0 {
            base.write(0xa40, 16, power | (1 << 11))?;
        }

        v |= 1 << 10;
        if fiber {
            v &= !(1 << 11);
        } else {
            v |= 1 << 11;
        }
        base.write(PAGE_RAW, 29, 8)?;
        base.write(0x266, reg, v)?;
        base.write(PAGE_RAW, 29, 0)?;

        // Power on the new side
        base.write(PAGE_RAW, 29, if fiber { 3 } else { 1 })?;
        let power = base.read(0xa40, 16)?;
        if power & (1 << 11) != 0 {
            base.write(0xa40, 16, power & !(1 << 11))?;
        }

        base.write(PAGE_RAW, 29, 0)
    }

    fn ensure_copper(&self) -> Result<(), RtlError> {
        match self.get_medium()? {
            Medium::Copper => Ok(()),
            Medium::Fiber => Err(RtlError::UnsupportedMedium {
                port: self.phy.port,
            }),
        }
    }

    /// Sets 100M / 1000M / 500M EEE advertisement on the copper side, using
    /// MAC-based EEE.  Fails on a port that is in fiber mode.
    pub fn set_eee(&self, enable: bool) -> Result<(), RtlError> {
        self.ensure_copper()?;
        ringbuf_entry!(Trace::EeeSet {
            port: self.phy.port,
            enable
        });
        let phy = &self.phy;

        // GPHY page to copper
        phy.write(0xa42, 29, 0x0001)?;
        let an_enabled = phy.read(0, 0)? & (1 << 12) != 0;

        phy.modify(0x0a43, 25, |r| *r &= !(1 << 5))?;
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
        phy.write(0xa42, 29, 0)
    }

    pub fn get_eee(&self) -> Result<bool, RtlError> {
        self.ensure_copper()?;
        get_eee(&self.phy)
    }
}
