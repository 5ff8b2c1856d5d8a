// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! RTL838x SMI engine and SerDes access

use crate::dispatch::Transport;
use crate::smi::{wait_exec, wait_write, Limits, CMD_EXEC};
use crate::Rtl83xxRw;
use rtl_err::{Argument, RtlError};

const SMI_ACCESS_PHY_CTRL_0: u32 = 0xa1b8;
const SMI_ACCESS_PHY_CTRL_1: u32 = 0xa1bc;
const SMI_ACCESS_PHY_CTRL_2: u32 = 0xa1c0;
const SMI_ACCESS_PHY_CTRL_3: u32 = 0xa1c4;

/// Park-page bits of CTRL_1, which must survive every command
const PARK_PAGE: u32 = 0x1f << 15;

const CMD_MMD: u32 = 1 << 1;
const CMD_WRITE: u32 = 1 << 2;

/// The internal SerDes appear as a page-0 PHY register file, one 16-bit
/// register per 32-bit word
pub(crate) const SDS4_FIB_REG0: u32 = 0xf800;

const LIMITS: Limits = Limits {
    max_port: 28,
    max_page: 4095,
};

/// Only this RTL838x variant puts its own SerDes at PHY addresses 24-27
pub(crate) const RTL8380M_ID: u16 = 0x8380;

/// SerDes addresses served by [SDS4_FIB_REG0]
pub(crate) const SDS_PORTS: core::ops::RangeInclusive<u8> = 24..=27;

pub struct Rtl838x<'a, R> {
    rw: &'a R,
    lock: spin::Mutex<()>,
}

impl<'a, R: Rtl83xxRw> Rtl838x<'a, R> {
    pub fn new(rw: &'a R) -> Self {
        Self {
            rw,
            lock: spin::Mutex::new(()),
        }
    }

    /// Writes the command with the execute bit clear, then sets it
    fn issue(&self, cmd: u32) -> Result<(), RtlError> {
        let park = self.rw.read(SMI_ACCESS_PHY_CTRL_1)? & PARK_PAGE;
        self.rw.write(SMI_ACCESS_PHY_CTRL_1, cmd | park)?;
        self.rw.mask(SMI_ACCESS_PHY_CTRL_1, 0, CMD_EXEC)
    }

    fn sds_addr(lane: u8, reg: u8) -> Result<u32, RtlError> {
        if !SDS_PORTS.contains(&lane) {
            return Err(Argument::Lane(lane).into());
        }
        if reg > 31 {
            return Err(Argument::Register(reg.into()).into());
        }
        let offset = if lane == 26 { 0x100 } else { 0 };
        Ok(SDS4_FIB_REG0 + offset + (u32::from(reg) << 2))
    }
}

impl<R: Rtl83xxRw> Transport for Rtl838x<'_, R> {
    fn read_phy(&self, port: u8, page: u16, reg: u8) -> Result<u16, RtlError> {
        LIMITS.check(port, page, reg)?;
        let _guard = self.lock.lock();
        let rw = self.rw;

        wait_exec(rw, SMI_ACCESS_PHY_CTRL_1)?;
        rw.mask(SMI_ACCESS_PHY_CTRL_2, 0xffff_0000, u32::from(port) << 16)?;
        self.issue(u32::from(reg) << 20 | u32::from(page) << 3)?;
        wait_exec(rw, SMI_ACCESS_PHY_CTRL_1)?;
        Ok((rw.read(SMI_ACCESS_PHY_CTRL_2)? & 0xffff) as u16)
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

        wait_exec(rw, SMI_ACCESS_PHY_CTRL_1)?;
        rw.write(SMI_ACCESS_PHY_CTRL_0, 1 << port)?;
        rw.mask(SMI_ACCESS_PHY_CTRL_2, 0xffff_0000, u32::from(value) << 16)?;
        self.issue(u32::from(reg) << 20 | u32::from(page) << 3 | CMD_WRITE)?;
        wait_write(rw, SMI_ACCESS_PHY_CTRL_1, port)
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

        wait_exec(rw, SMI_ACCESS_PHY_CTRL_1)?;
        rw.mask(SMI_ACCESS_PHY_CTRL_2, 0xffff_0000, u32::from(port) << 16)?;
        rw.write(
            SMI_ACCESS_PHY_CTRL_3,
            u32::from(devnum) << 16 | u32::from(regnum),
        )?;
        rw.write(SMI_ACCESS_PHY_CTRL_1, CMD_MMD | CMD_EXEC)?;
        wait_exec(rw, SMI_ACCESS_PHY_CTRL_1)?;
        Ok((rw.read(SMI_ACCESS_PHY_CTRL_2)? & 0xffff) as u16)
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

        wait_exec(rw, SMI_ACCESS_PHY_CTRL_1)?;
        rw.write(SMI_ACCESS_PHY_CTRL_0, 1 << port)?;
        rw.mask(SMI_ACCESS_PHY_CTRL_2, 0xffff_0000, u32::from(value) << 16)?;
        rw.write(
            SMI_ACCESS_PHY_CTRL_3,
            u32::from(devnum) << 16 | u32::from(regnum),
        )?;
        rw.write(SMI_ACCESS_PHY_CTRL_1, CMD_WRITE | CMD_MMD | CMD_EXEC)?;
        wait_exec(rw, SMI_ACCESS_PHY_CTRL_1)
    }

    fn read_sds(&self, lane: u8, page: u8, reg: u8) -> Result<u16, RtlError> {
        if page != 0 {
            return Err(Argument::Page(page.into()).into());
        }
        let addr = Self::sds_addr(lane, reg)?;
        Ok((self.rw.read(addr)? & 0xffff) as u16)
    }

    fn write_sds(
        &self,
        lane: u8,
        page: u8,
        reg: u8,
        value: u16,
    ) -> Result<(), RtlError> {
        if page != 0 {
            return Err(Argument::Page(page.into()).into());
        }
        let addr = Self::sds_addr(lane, reg)?;
        self.rw.mask(addr, 0xffff, value.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{FakeSoc, SocOp};
    use crate::Family;

    #[test]
    fn phy_round_trip() {
        let soc = FakeSoc::new(Family::Rtl838x);
        let smi = Rtl838x::new(&soc);
        smi.write_phy(5, 0xa42, 20, 0x1234).unwrap();
        assert_eq!(soc.get_phy(5, 0xa42, 20), 0x1234);
        assert_eq!(smi.read_phy(5, 0xa42, 20).unwrap(), 0x1234);

        smi.write_mmd(5, 7, 60, 0x6).unwrap();
        assert_eq!(smi.read_mmd(5, 7, 60).unwrap(), 0x6);
    }

    #[test]
    fn park_page_is_preserved() {
        let soc = FakeSoc::new(Family::Rtl838x);
        soc.set(SMI_ACCESS_PHY_CTRL_1, 0x1f << 15);
        let smi = Rtl838x::new(&soc);
        smi.read_phy(1, 0, 2).unwrap();
        let cmd = 2 << 20 | 0x1f << 15;
        assert!(soc
            .writes()
            .contains(&SocOp::Write(SMI_ACCESS_PHY_CTRL_1, cmd)));
    }

    #[test]
    fn failed_write_is_reported() {
        let soc = FakeSoc::new(Family::Rtl838x);
        soc.completion
            .borrow_mut()
            .insert(SMI_ACCESS_PHY_CTRL_1, crate::smi::CMD_FAIL);
        let smi = Rtl838x::new(&soc);
        assert_eq!(
            smi.write_phy(3, 0, 0, 0),
            Err(RtlError::SmiWriteFailed { port: 3 })
        );
    }

    #[test]
    fn out_of_range_is_rejected_without_access() {
        let soc = FakeSoc::new(Family::Rtl838x);
        let smi = Rtl838x::new(&soc);
        assert_eq!(
            smi.read_phy(29, 0, 0),
            Err(RtlError::InvalidArgument(Argument::Port(29)))
        );
        assert_eq!(
            smi.write_phy(0, 4096, 0, 0),
            Err(RtlError::InvalidArgument(Argument::Page(4096)))
        );
        assert_eq!(
            smi.read_phy(0, 0, 32),
            Err(RtlError::InvalidArgument(Argument::Register(32)))
        );
        assert!(soc.ops.borrow().is_empty());
    }

    #[test]
    fn serdes_is_memory_mapped() {
        let soc = FakeSoc::new(Family::Rtl838x);
        soc.set(SDS4_FIB_REG0 + 0x100 + 4, 0xdead_0140);
        let smi = Rtl838x::new(&soc);
        assert_eq!(smi.read_sds(26, 0, 1).unwrap(), 0x0140);

        smi.write_sds(24, 0, 0, 0x1140).unwrap();
        smi.write_sds(26, 0, 1, 0xffff).unwrap();
        assert_eq!(soc.get(SDS4_FIB_REG0), 0x1140);
        assert_eq!(soc.get(SDS4_FIB_REG0 + 0x104), 0xdead_ffff);
    }
}
