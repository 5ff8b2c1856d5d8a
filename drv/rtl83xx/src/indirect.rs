// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Indirect SerDes access on the RTL930x and RTL931x
//!
//! SerDes lanes on these SoCs are not memory-mapped.  Instead, a command
//! register simulates an internal MDIO bus: software packs the lane, page,
//! and register into a command word, sets the execute bit, and waits for the
//! hardware to clear it.  Read results (and write data) pass through a
//! separate data register.

use crate::smi::{wait_exec, CMD_EXEC};
use crate::{Rtl83xxRw, Trace};
use ringbuf::ringbuf_entry_root as ringbuf_entry;
use rtl_err::{Argument, RtlError};

/// Marks a command as a write
const CMD_WRITE: u32 = 1 << 1;

/// SerDes pages are six bits wide in the command word
const MAX_PAGE: u8 = 0x3f;
const MAX_REG: u8 = 31;

/// The two variants differ in how a write is issued
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum WriteOrder {
    /// Load the data register, then issue the command
    DataFirst,
    /// Issue the command without the execute bit, load the data register,
    /// then re-read the command and set execute and write
    CommandFirst,
}

pub(crate) struct IndirectSds {
    cmd: u32,
    data: u32,
    max_lane: u8,
    order: WriteOrder,
    /// The command / data register pair is a single shared resource
    lock: spin::Mutex<()>,
}

impl IndirectSds {
    pub const fn rtl930x() -> Self {
        Self {
            cmd: 0x03b0,
            data: 0x03b4,
            max_lane: 11,
            order: WriteOrder::DataFirst,
            lock: spin::Mutex::new(()),
        }
    }

    pub const fn rtl931x() -> Self {
        Self {
            cmd: 0x5638,
            data: 0x563c,
            max_lane: 31,
            order: WriteOrder::CommandFirst,
            lock: spin::Mutex::new(()),
        }
    }

    /// Builds a command word without the execute bit
    fn command(&self, lane: u8, page: u8, reg: u8) -> Result<u32, RtlError> {
        if lane > self.max_lane {
            return Err(Argument::Lane(lane).into());
        }
        if page > MAX_PAGE {
            return Err(Argument::Page(page.into()).into());
        }
        if reg > MAX_REG {
            return Err(Argument::Register(reg.into()).into());
        }
        Ok(u32::from(lane) << 2 | u32::from(page) << 7 | u32::from(reg) << 13)
    }

    pub fn read<R: Rtl83xxRw>(
        &self,
        rw: &R,
        lane: u8,
        page: u8,
        reg: u8,
    ) -> Result<u16, RtlError> {
        let cmd = self.command(lane, page, reg)?;
        let _guard = self.lock.lock();

        rw.write(self.cmd, cmd | CMD_EXEC)?;
        self.wait(rw, lane, page, reg)?;
        Ok((rw.read(self.data)? & 0xffff) as u16)
    }

    pub fn write<R: Rtl83xxRw>(
        &self,
        rw: &R,
        lane: u8,
        page: u8,
        reg: u8,
        value: u16,
    ) -> Result<(), RtlError> {
        let cmd = self.command(lane, page, reg)?;
        let _guard = self.lock.lock();

        match self.order {
            WriteOrder::DataFirst => {
                rw.write(self.data, value.into())?;
                rw.write(self.cmd, cmd | CMD_WRITE | CMD_EXEC)?;
            }
            WriteOrder::CommandFirst => {
                rw.write(self.cmd, cmd)?;
                rw.write(self.data, value.into())?;
                let cmd = rw.read(self.cmd)?;
                rw.write(self.cmd, cmd | CMD_WRITE | CMD_EXEC)?;
            }
        }
        self.wait(rw, lane, page, reg)
    }

    fn wait<R: Rtl83xxRw>(
        &self,
        rw: &R,
        lane: u8,
        page: u8,
        reg: u8,
    ) -> Result<(), RtlError> {
        wait_exec(rw, self.cmd).map_err(|e| {
            ringbuf_entry!(Trace::SdsTimeout { lane, page, reg });
            e
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{FakeSoc, SocOp};

    #[test]
    fn read_930x() {
        let soc = FakeSoc::default();
        soc.sds.borrow_mut().insert((3, 0x1f, 11), 0xabcd);
        let sds = IndirectSds::rtl930x();
        assert_eq!(sds.read(&soc, 3, 0x1f, 11).unwrap(), 0xabcd);
        assert_eq!(
            soc.ops.borrow()[0],
            SocOp::Write(0x03b0, 3 << 2 | 0x1f << 7 | 11 << 13 | 1)
        );
    }

    #[test]
    fn write_931x_issues_command_twice() {
        let soc = FakeSoc::rtl931x();
        let sds = IndirectSds::rtl931x();
        sds.write(&soc, 20, 0x2e, 0x12, 0x2740).unwrap();
        assert_eq!(soc.sds.borrow().get(&(20, 0x2e, 0x12)), Some(&0x2740));

        let cmd = 20 << 2 | 0x2e << 7 | 0x12 << 13;
        let writes = soc.writes();
        assert_eq!(
            &writes[..3],
            &[
                SocOp::Write(0x5638, cmd),
                SocOp::Write(0x563c, 0x2740),
                SocOp::Write(0x5638, cmd | 0x3),
            ]
        );
    }

    #[test]
    fn timeout_stops_accessing_the_bus() {
        let soc = FakeSoc::default();
        soc.stuck.borrow_mut().insert(0x03b0);
        let sds = IndirectSds::rtl930x();

        assert_eq!(
            sds.read(&soc, 0, 0, 0),
            Err(RtlError::BusTimeout { addr: 0x03b0 })
        );
        let ops = soc.ops.borrow();
        // One command write, then exactly the bounded number of polls
        assert_eq!(ops.len(), 1 + crate::SMI_POLL_COUNT);
        assert!(ops[1..].iter().all(|op| *op == SocOp::Read(0x03b0)));
        assert_eq!(soc.slept.get(), crate::SMI_POLL_COUNT as u32);
    }

    #[test]
    fn lane_checked_before_bus_access() {
        let soc = FakeSoc::default();
        let sds = IndirectSds::rtl930x();
        assert_eq!(
            sds.write(&soc, 12, 0, 0, 0),
            Err(RtlError::InvalidArgument(Argument::Lane(12)))
        );
        assert_eq!(
            sds.read(&soc, 0, 0x40, 0),
            Err(RtlError::InvalidArgument(Argument::Page(0x40)))
        );
        assert!(soc.ops.borrow().is_empty());
    }
}
