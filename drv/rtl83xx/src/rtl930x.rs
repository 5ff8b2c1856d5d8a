// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! RTL930x SMI engine and SerDes access

use crate::dispatch::Transport;
use crate::indirect::IndirectSds;
use crate::smi::{wait_exec, wait_write, Limits, CMD_EXEC};
use crate::Rtl83xxRw;
use rtl_err::RtlError;

const SMI_ACCESS_PHY_CTRL_0: u32 = 0xcb70;
const SMI_ACCESS_PHY_CTRL_1: u32 = 0xcb74;
const SMI_ACCESS_PHY_CTRL_2: u32 = 0xcb78;
const SMI_ACCESS_PHY_CTRL_3: u32 = 0xcb7c;

const CMD_MMD: u32 = 1 << 1;
const CMD_WRITE: u32 = 1 << 2;

/// Park page, always all ones
const PARK_PAGE: u32 = 0x1f << 15;

const LIMITS: Limits = Limits {
    max_port: 27,
    max_page: 4095,
};

pub struct Rtl930x<'a, R> {
    rw: &'a R,
    sds: IndirectSds,
    lock: spin::Mutex<()>,
}

impl<'a, R: Rtl83xxRw> Rtl930x<'a, R> {
    pub fn new(rw: &'a R) -> Self {
        Self {
            rw,
            sds: IndirectSds::rtl930x(),
            lock: spin::Mutex::new(()),
        }
    }

    fn command(page: u16, reg: u8) -> u32 {
        u32::from(reg) << 20 | u32::from(page) << 3 | PARK_PAGE
    }
}

impl<R: Rtl83xxRw> Transport for Rtl930x<'_, R> {
    fn read_phy(&self, port: u8, page: u16, reg: u8) -> Result<u16, RtlError> {
        LIMITS.check(port, page, reg)?;
        let _guard = self.lock.lock();
        let rw = self.rw;

        rw.mask(SMI_ACCESS_PHY_CTRL_2, 0xffff_0000, u32::from(port) << 16)?;
        rw.write(SMI_ACCESS_PHY_CTRL_1, Self::command(page, reg) | CMD_EXEC)?;
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

        rw.write(SMI_ACCESS_PHY_CTRL_0, 1 << port)?;
        rw.mask(SMI_ACCESS_PHY_CTRL_2, 0xffff_0000, u32::from(value) << 16)?;
        rw.write(
            SMI_ACCESS_PHY_CTRL_1,
            Self::command(page, reg) | CMD_WRITE | CMD_EXEC,
        )?;
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
        self.sds.read(self.rw, lane, page, reg)
    }

    fn write_sds(
        &self,
        lane: u8,
        page: u8,
        reg: u8,
        value: u16,
    ) -> Result<(), RtlError> {
        self.sds.write(self.rw, lane, page, reg, value)
    }
}
