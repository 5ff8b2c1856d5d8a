// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! This crate provides functions for working with the Realtek PHYs that hang
//! off RTL83xx / RTL93xx switch SoCs (in particular, the RTL8218B, RTL8214FC,
//! RTL8214C, RTL8218D, and RTL8226).
//!
//! It relies heavily on the trait [PhyRw], which callers must implement.  This
//! trait is an abstraction over reading and writing raw PHY registers through
//! whatever SMI engine the SoC provides.
#![cfg_attr(not(test), no_std)]

mod patch;
mod util;

pub mod firmware;

// User-facing handles to various PHY types
pub mod rtl8214c;
pub mod rtl8214fc;
pub mod rtl8218b;
pub mod rtl8218d;
pub mod rtl8226;

#[cfg(test)]
mod fake;

use ringbuf::*;
pub use rtl_err::{Argument, FirmwareError, RtlError};
pub use util::{poll_until, Poll};

/// Page value that addresses the register directly, without the SMI engine
/// touching the page-select register first
pub const PAGE_RAW: u16 = 0xfff;

/// Page-select register of Realtek GPHYs
pub const REG_PAGE_SELECT: u8 = 0x1f;

/// MMD device numbers
pub const MMD_AN: u8 = 7;
pub const MMD_VEND2: u8 = 31;

/// Number of ports in an octal PHY package; patches are only applied from
/// the first port of a package.
pub const PACKAGE_PORTS: u8 = 8;

/// How many times `Phy::wait_timeout` polls before giving up
const PHY_POLL_COUNT: usize = 100;

////////////////////////////////////////////////////////////////////////////////

/// Millisecond sleep, provided by the environment
pub trait Delay {
    fn sleep_for(&self, ms: u32);
}

/// Trait implementing communication with an ethernet PHY.
pub trait PhyRw: Delay {
    /// Reads a register of the given page.  The page is applied by the SMI
    /// engine as part of the same transaction; [PAGE_RAW] skips paging.
    fn read_raw(&self, port: u8, page: u16, reg: u8) -> Result<u16, RtlError>;

    fn write_raw(
        &self,
        port: u8,
        page: u16,
        reg: u8,
        value: u16,
    ) -> Result<(), RtlError>;

    /// Reads a clause 45 (MMD) register
    fn read_mmd_raw(
        &self,
        port: u8,
        devnum: u8,
        regnum: u16,
    ) -> Result<u16, RtlError>;

    fn write_mmd_raw(
        &self,
        port: u8,
        devnum: u8,
        regnum: u16,
        value: u16,
    ) -> Result<(), RtlError>;
}

/// Handle for interacting with a particular PHY port.
///
/// Unlike PHYs behind a plain MDIO bus, the SoC's SMI engine carries the
/// page along with every access, so the handle does not need to track the
/// currently selected page.
pub struct Phy<'a, P> {
    pub port: u8,
    pub rw: &'a P,
}

impl<P> Clone for Phy<'_, P> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<P> Copy for Phy<'_, P> {}

impl<'a, P: PhyRw> Phy<'a, P> {
    pub fn new(port: u8, rw: &'a P) -> Self {
        Self { port, rw }
    }

    /// Returns a handle to the port `offset` ports above this one, which is
    /// how per-chip lists and multi-port loops address a package.
    pub fn at(&self, offset: u8) -> Result<Phy<'a, P>, RtlError> {
        let port = self
            .port
            .checked_add(offset)
            .ok_or(Argument::Port(self.port))?;
        Ok(Phy::new(port, self.rw))
    }

    #[inline(always)]
    pub fn read(&self, page: u16, reg: u8) -> Result<u16, RtlError> {
        self.rw.read_raw(self.port, page, reg)
    }

    #[inline(always)]
    pub fn write(
        &self,
        page: u16,
        reg: u8,
        value: u16,
    ) -> Result<(), RtlError> {
        self.rw.write_raw(self.port, page, reg, value)
    }

    /// Performs a write where the value is calculated by calling `f(0)`
    #[inline(always)]
    pub fn write_with<F>(
        &self,
        page: u16,
        reg: u8,
        f: F,
    ) -> Result<(), RtlError>
    where
        F: Fn(&mut u16),
    {
        let mut data = 0;
        f(&mut data);
        self.write(page, reg, data)
    }

    /// Performs a read-modify-write operation on a PHY register
    #[inline(always)]
    pub fn modify<F>(&self, page: u16, reg: u8, f: F) -> Result<(), RtlError>
    where
        F: Fn(&mut u16),
    {
        let mut data = self.read(page, reg)?;
        f(&mut data);
        self.write(page, reg, data)
    }

    pub fn read_mmd(&self, devnum: u8, regnum: u16) -> Result<u16, RtlError> {
        self.rw.read_mmd_raw(self.port, devnum, regnum)
    }

    pub fn write_mmd(
        &self,
        devnum: u8,
        regnum: u16,
        value: u16,
    ) -> Result<(), RtlError> {
        self.rw.write_mmd_raw(self.port, devnum, regnum, value)
    }

    pub fn modify_mmd<F>(
        &self,
        devnum: u8,
        regnum: u16,
        f: F,
    ) -> Result<(), RtlError>
    where
        F: Fn(&mut u16),
    {
        let mut data = self.read_mmd(devnum, regnum)?;
        f(&mut data);
        self.write_mmd(devnum, regnum, data)
    }

    pub fn sleep_for(&self, ms: u32) {
        self.rw.sleep_for(ms)
    }

    /// Polls a register until `f` returns true, sleeping 1 ms between reads
    pub fn wait_timeout<F>(
        &self,
        page: u16,
        reg: u8,
        f: F,
    ) -> Result<(), RtlError>
    where
        F: Fn(u16) -> bool,
    {
        match poll_until(self.rw, PHY_POLL_COUNT, 1, || {
            self.read(page, reg).map(&f)
        })? {
            Poll::Done => Ok(()),
            Poll::TimedOut => Err(RtlError::PhyInitTimeout { port: self.port }),
        }
    }

    /// Reads link, speed, and duplex from a Realtek GPHY: the latched link
    /// bit in BMSR is read twice, then the PHY-specific status register on
    /// page 0xa43 provides the resolved speed and duplex.
    pub fn read_gphy_status(&self) -> Result<LinkStatus, RtlError> {
        self.read(0, 1)?;
        let bmsr = self.read(0, 1)?;
        if bmsr & (1 << 2) == 0 {
            return Ok(LinkStatus::DOWN);
        }
        let physr = self.read(0xa43, 0x12)?;
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
}

////////////////////////////////////////////////////////////////////////////////

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Speed {
    Speed10M,
    Speed100M,
    Speed1G,
    Speed2G5,
    Speed5G,
    Speed10G,
}

impl Speed {
    /// Decodes the speed field shared by the GPHY status register and the
    /// RTL8226's vendor MMD status register (mask 0x0630)
    pub fn from_realtek(v: u16) -> Option<Self> {
        match v & 0x0630 {
            0x0000 => Some(Speed::Speed10M),
            0x0010 => Some(Speed::Speed100M),
            0x0020 => Some(Speed::Speed1G),
            0x0200 => Some(Speed::Speed10G),
            0x0210 => Some(Speed::Speed2G5),
            0x0220 => Some(Speed::Speed5G),
            _ => None,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Duplex {
    Half,
    Full,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LinkStatus {
    pub link: bool,
    /// `None` if the link is down or the PHY reported a reserved encoding
    pub speed: Option<Speed>,
    pub duplex: Duplex,
}

impl LinkStatus {
    pub const DOWN: Self = Self {
        link: false,
        speed: None,
        duplex: Duplex::Half,
    };
}

/// Media of a combo (copper / fiber) port
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Medium {
    Copper,
    Fiber,
}

////////////////////////////////////////////////////////////////////////////////

#[derive(Copy, Clone, Debug, PartialEq)]
enum Trace {
    None,
    Rtl8218bIntInit(u8),
    Rtl8218bExtInit(u8),
    Rtl8214fcInit(u8),
    Rtl8214cInit(u8),
    PhyId { port: u8, id: u32 },
    ChipRevision { port: u8, rev: u16 },
    FirmwareAccepted { target: u32, version: u32 },
    PatchReady(u8),
    ListApplied { port: u8, writes: u16 },
    BroadcastEnable(u8),
    BroadcastDisable(u8),
    Ipd(u8),
    MediumSet { port: u8, fiber: bool },
    EeeSet { port: u8, enable: bool },
}
ringbuf!(Trace, 32, Trace::None);
