// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! RTL931x SMI engine and SerDes access

use crate::dispatch::Transport;
use crate::indirect::IndirectSds;
use crate::smi::{wait_exec, wait_write, Limits, CMD_EXEC};
use crate::Rtl83xxRw;
use rtl_err::RtlError;

const SMI_INDRT_ACCESS_CTRL_0: u32 = 0x0c00;
const SMI_INDRT_ACCESS_CTRL_1: u32 = 0x0c04;
const SMI_INDRT_ACCESS_CTRL_2: u32 = 0x0c08;
const SMI_INDRT_ACCESS_CTRL_3: u32 = 0x0c10;
const SMI_INDRT_ACCESS_BC_PHYID_CTRL: u32 = 0x0c14;
const SMI_INDRT_ACCESS_MMD_CTRL: u32 = 0x0c18;

const CMD_MMD: u32 = 1 << 1;
const CMD_WRITE: u32 = 1 << 4;

const LIMITS: Limits = Limits {
    max_port: 55,
    max_page: 8191,
};

pub struct Rtl931x<'a, R> {
    rw: &'a R,
    sds: IndirectSds,
    lock: spin::Mutex<()>,
}

impl<'a, R: Rtl83xxRw> Rtl931x<'a, R> {
    pub fn new(rw: &'a R) -> Self {
        Self {
            rw,
            sds: IndirectSds::rtl931x(),
            lock: spin::Mutex::new(()),
        }
    }

    fn command(page: u16, reg: u8) -> u32 {
        u32::from(reg) << 6 | u32::from(page) << 11
    }

    /// Reads address the port by number; writes use a port mask
    fn select_read(&self, port: u8) -> Result<(), RtlError> {
        self.rw
            .write(SMI_INDRT_ACCESS_BC_PHYID_CTRL, u32::from(port) << 5)
    }

    fn select_write(&self, port: u8, value: u16) -> Result<(), RtlError> {
        self.rw.write_port_mask(SMI_INDRT_ACCESS_CTRL_2, 1u64 << port)?;
        self.rw
            .mask(SMI_INDRT_ACCESS_CTRL_3, 0xffff, u32::from(value))
    }

    fn read_data(&self) -> Result<u16, RtlError> {
        Ok((self.rw.read(SMI_INDRT_ACCESS_CTRL_3)? >> 16) as u16)
    }
}

impl<R: Rtl83xxRw> Transport for Rtl931x<'_, R> {
    fn read_phy(&self, port: u8, page: u16, reg: u8) -> Result<u16, RtlError> {
        LIMITS.check(port, page, reg)?;
        let _guard = self.lock.lock();

        self.select_read(port)?;
        self.rw.write(
            SMI_INDRT_ACCESS_CTRL_0,
            Self::command(page, reg) | CMD_EXEC,
        )?;
        wait_exec(self.rw, SMI_INDRT_ACCESS_CTRL_0)?;
        self.read_data()
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

        self.select_write(port, value)?;
        let cmd = Self::command(page, reg);
        rw.write(SMI_INDRT_ACCESS_CTRL_0, cmd)?;
        rw.write(SMI_INDRT_ACCESS_CTRL_1, 0x1ff)?;
        rw.write(SMI_INDRT_ACCESS_CTRL_0, cmd | CMD_WRITE | CMD_EXEC)?;
        wait_write(rw, SMI_INDRT_ACCESS_CTRL_0, port)
    }

    fn read_mmd(
        &self,
        port: u8,
        devnum: u8,
        regnum: u16,
    ) -> Result<u16, RtlError> {
        LIMITS.check_mmd(port, devnum)?;
        let _guard = self.lock.lock();

        self.select_read(port)?;
        self.rw.write(
            SMI_INDRT_ACCESS_MMD_CTRL,
            u32::from(devnum) << 16 | u32::from(regnum),
        )?;
        self.rw.write(SMI_INDRT_ACCESS_CTRL_0, CMD_MMD | CMD_EXEC)?;
        wait_exec(self.rw, SMI_INDRT_ACCESS_CTRL_0)?;
        self.read_data()
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

        self.select_write(port, value)?;
        rw.write(
            SMI_INDRT_ACCESS_MMD_CTRL,
            u32::from(devnum) << 16 | u32::from(regnum),
        )?;
        rw.write(SMI_INDRT_ACCESS_CTRL_0, CMD_WRITE | CMD_MMD | CMD_EXEC)?;
        wait_exec(rw, SMI_INDRT_ACCESS_CTRL_0)
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
