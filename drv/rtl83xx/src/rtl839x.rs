// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! RTL839x SMI engine and SerDes access

use crate::dispatch::Transport;
use crate::smi::{wait_exec, wait_write, Limits, CMD_EXEC};
use crate::Rtl83xxRw;
use rtl_err::{Argument, RtlError};

const PHYREG_ACCESS_CTRL: u32 = 0x03dc;
const PHYREG_CTRL: u32 = 0x03e0;
const PHYREG_PORT_CTRL: u32 = 0x03e4;
const PHYREG_DATA_CTRL: u32 = 0x03f0;
const PHYREG_MMD_CTRL: u32 = 0x03f4;

const CMD_MMD: u32 = 1 << 2;
const CMD_WRITE: u32 = 1 << 3;

/// Page that makes the SMI engine skip its own paging
const PAGE_PARKED: u16 = 0x1fff;

/// Base of the 2048-bit shadow of the SerDes 12/13 PHY registers
pub(crate) const SDS12_13_XSG0: u32 = 0xb800;

/// SoC id on which the SerDes shadow carries no PHY id of its own
pub(crate) const RTL8393_ID: u16 = 0x8393;

/// PHY addresses of SerDes 12/13 on an RTL8393
pub(crate) const SDS_PORTS: core::ops::RangeInclusive<u8> = 48..=49;

const LIMITS: Limits = Limits {
    max_port: 51,
    max_page: 8191,
};

/// Offset of the second SerDes within the shadow register
pub(crate) fn sds_offset(lane: u8) -> u32 {
    if lane == 49 {
        0x100
    } else {
        0
    }
}

pub struct Rtl839x<'a, R> {
    rw: &'a R,
    soc_id: u16,
    lock: spin::Mutex<()>,
}

impl<'a, R: Rtl83xxRw> Rtl839x<'a, R> {
    pub fn new(rw: &'a R, soc_id: u16) -> Self {
        Self {
            rw,
            soc_id,
            lock: spin::Mutex::new(()),
        }
    }

    fn command(page: u16, reg: u8) -> u32 {
        let parked = if page == PAGE_PARKED { 0x1f << 23 } else { 0 };
        u32::from(reg) << 5 | u32::from(page) << 10 | parked
    }

    /// Selects exactly one port for a write
    fn select_port(&self, port: u8) -> Result<(), RtlError> {
        self.rw.write_port_mask(PHYREG_PORT_CTRL, 1u64 << port)
    }

    fn sds_addr(lane: u8, page: u8, reg: u8) -> Result<u32, RtlError> {
        if !SDS_PORTS.contains(&lane) {
            return Err(Argument::Lane(lane).into());
        }
        if page != 0 {
            return Err(Argument::Page(page.into()).into());
        }
        if reg > 31 {
            return Err(Argument::Register(reg.into()).into());
        }
        // Two 16-bit registers per 32-bit word
        let word = (u32::from(reg) << 1) & 0xfc;
        Ok(SDS12_13_XSG0 + sds_offset(lane) + 0x80 + word)
    }
}

impl<R: Rtl83xxRw> Transport for Rtl839x<'_, R> {
    fn read_phy(&self, port: u8, page: u16, reg: u8) -> Result<u16, RtlError> {
        LIMITS.check(port, page, reg)?;
        let _guard = self.lock.lock();
        let rw = self.rw;

        wait_exec(rw, PHYREG_ACCESS_CTRL)?;
        rw.mask(PHYREG_DATA_CTRL, 0xffff_0000, u32::from(port) << 16)?;
        let cmd = Self::command(page, reg);
        rw.write(PHYREG_ACCESS_CTRL, cmd)?;
        rw.write(PHYREG_CTRL, 0x1ff)?;
        rw.write(PHYREG_ACCESS_CTRL, cmd | CMD_EXEC)?;
        wait_exec(rw, PHYREG_ACCESS_CTRL)?;
        Ok((rw.read(PHYREG_DATA_CTRL)? & 0xffff) as u16)
    }

    fn write_phy(
        &self,
        port: u8,
        page: u16,
        reg: u8,
        value: u16,
    ) -> Result<(), RtlError> {
        LIMITS.check(port, page, reg)?;
        let _guard = self.lock.lock();
        let rw = self.rw;

        wait_exec(rw, PHYREG_ACCESS_CTRL)?;
        rw.mask(PHYREG_DATA_CTRL, 0xffff_0000, u32::from(value) << 16)?;
        self.select_port(port)?;
        rw.write(PHYREG_CTRL, 0x1ff)?;
        let cmd = Self::command(page, reg) | CMD_WRITE;
        rw.write(PHYREG_ACCESS_CTRL, cmd)?;
        rw.write(PHYREG_ACCESS_CTRL, cmd | CMD_EXEC)?;
        wait_write(rw, PHYREG_ACCESS_CTRL, port)
    }

    fn read_mmd(
        &self,
        port: u8,
        devnum: u8,
        regnum: u16,
    ) -> Result<u16, RtlError> {
        LIMITS.check_mmd(port, devnum)?;
        let _guard = self.lock.lock();
        let rw = self.rw;

        wait_exec(rw, PHYREG_ACCESS_CTRL)?;
        rw.mask(PHYREG_DATA_CTRL, 0xffff_0000, u32::from(port) << 16)?;
        rw.write(PHYREG_MMD_CTRL, u32::from(devnum) << 16 | u32::from(regnum))?;
        rw.write(PHYREG_ACCESS_CTRL, CMD_MMD | CMD_EXEC)?;
        wait_exec(rw, PHYREG_ACCESS_CTRL)?;
        Ok((rw.read(PHYREG_DATA_CTRL)? & 0xffff) as u16)
    }

    fn write_mmd(
        &self,
        port: u8,
        devnum: u8,
        regnum: u16,
        value: u16,
    ) -> Result<(), RtlError> {
        LIMITS.check_mmd(port, devnum)?;
        let _guard = self.lock.lock();
        let rw = self.rw;

        wait_exec(rw, PHYREG_ACCESS_CTRL)?;
        self.select_port(port)?;
        rw.mask(PHYREG_DATA_CTRL, 0xffff_0000, u32::from(value) << 16)?;
        rw.write(PHYREG_MMD_CTRL, u32::from(devnum) << 16 | u32::from(regnum))?;
        rw.write(PHYREG_ACCESS_CTRL, CMD_WRITE | CMD_MMD | CMD_EXEC)?;
        wait_exec(rw, PHYREG_ACCESS_CTRL)
    }

    fn read_sds(&self, lane: u8, page: u8, reg: u8) -> Result<u16, RtlError> {
        let addr = Self::sds_addr(lane, page, reg)?;

        // The RTL8393 shadow reads 0 where a PHY id would be
        if self.soc_id == RTL8393_ID {
            match reg {
                2 => return Ok(0x001c),
                3 => return Ok(0x8393),
                _ => (),
            }
        }

        let v = self.rw.read(addr)?;
        Ok(if reg & 1 != 0 {
            (v >> 16) as u16
        } else {
            (v & 0xffff) as u16
        })
    }

    fn write_sds(
        &self,
        lane: u8,
        page: u8,
        reg: u8,
        value: u16,
    ) -> Result<(), RtlError> {
        let addr = Self::sds_addr(lane, page, reg)?;
        if reg & 1 != 0 {
            self.rw.mask(addr, 0xffff_0000, u32::from(value) << 16)
        } else {
            self.rw.mask(addr, 0xffff, value.into())
        }
    }
}
