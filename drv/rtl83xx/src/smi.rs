// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Pieces shared by the per-family SMI engines

use crate::{Rtl83xxRw, Trace, SMI_POLL_COUNT};
use ringbuf::ringbuf_entry_root as ringbuf_entry;
use rtl82xx::{poll_until, Poll};
use rtl_err::{Argument, RtlError};

/// Execute bit of every SMI and indirect SerDes command register; the
/// hardware clears it when the access completes.
pub(crate) const CMD_EXEC: u32 = 1 << 0;

/// Set by the SMI engine after a failed (non-MMD) write
pub(crate) const CMD_FAIL: u32 = 1 << 1;

/// Highest register number on a clause 22 page
const MAX_REG: u8 = 31;

/// Highest clause 45 device number
const MAX_DEVNUM: u8 = 31;

/// Limits of one family's SMI engine
#[derive(Copy, Clone, Debug)]
pub(crate) struct Limits {
    pub max_port: u8,
    pub max_page: u16,
}

impl Limits {
    pub fn check(&self, port: u8, page: u16, reg: u8) -> Result<(), RtlError> {
        self.check_port(port)?;
        if page > self.max_page {
            return Err(Argument::Page(page).into());
        }
        if reg > MAX_REG {
            return Err(Argument::Register(reg.into()).into());
        }
        Ok(())
    }

    pub fn check_mmd(&self, port: u8, devnum: u8) -> Result<(), RtlError> {
        self.check_port(port)?;
        if devnum > MAX_DEVNUM {
            return Err(Argument::Register(devnum.into()).into());
        }
        Ok(())
    }

    fn check_port(&self, port: u8) -> Result<(), RtlError> {
        if port > self.max_port {
            return Err(Argument::Port(port).into());
        }
        Ok(())
    }
}

/// Waits for the execute bit of the command register at `addr` to clear,
/// polling every millisecond up to [SMI_POLL_COUNT] times.
pub(crate) fn wait_exec<R: Rtl83xxRw>(
    rw: &R,
    addr: u32,
) -> Result<(), RtlError> {
    match poll_until(rw, SMI_POLL_COUNT, 1, || {
        Ok(rw.read(addr)? & CMD_EXEC == 0)
    })? {
        Poll::Done => Ok(()),
        Poll::TimedOut => {
            ringbuf_entry!(Trace::SmiTimeout { addr });
            Err(RtlError::BusTimeout { addr })
        }
    }
}

/// Waits for a write command to complete, then checks the fail bit
pub(crate) fn wait_write<R: Rtl83xxRw>(
    rw: &R,
    addr: u32,
    port: u8,
) -> Result<(), RtlError> {
    wait_exec(rw, addr)?;
    if rw.read(addr)? & CMD_FAIL != 0 {
        return Err(RtlError::SmiWriteFailed { port });
    }
    Ok(())
}
