// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::firmware::{Pairs, Triples};
use crate::{poll_until, Phy, PhyRw, Poll, Trace, PACKAGE_PORTS, PAGE_RAW};

use ringbuf::ringbuf_entry_root as ringbuf_entry;
use rtl_err::{Argument, RtlError};

/// Bound on the patch-ready poll, per port.  Reads are 1 ms apart, so a
/// port gets 100 ms before [RtlError::PatchNotReady].
const PATCH_POLL_COUNT: usize = 100;

/// Value of the broadcast ID register that makes a port accept writes for
/// its whole package
const BROADCAST_ID: u16 = 0xff00;

impl<'a, P: PhyRw> Phy<'a, P> {
    /// Reads the 32-bit IEEE PHY identifier from registers 2 and 3
    pub fn read_id(&self) -> Result<u32, RtlError> {
        let id1 = self.read(0, 2)?;
        let id2 = self.read(0, 3)?;
        let id = (u32::from(id1) << 16) | u32::from(id2);
        ringbuf_entry!(Trace::PhyId {
            port: self.port,
            id
        });
        Ok(id)
    }

    /// Reads the Realtek-internal chip id (0x6275 / 0x6276 for the RTL8218B
    /// family), which sits behind an indirect register on page 31
    pub fn read_internal_id(&self) -> Result<u16, RtlError> {
        self.write(31, 27, 0x0002)?;
        self.read(31, 28)
    }

    /// Reads the chip revision through the raw indirect register pair
    pub(crate) fn read_revision(&self) -> Result<u16, RtlError> {
        self.write(PAGE_RAW, 0x1b, 0x0004)?;
        let rev = self.read(PAGE_RAW, 0x1c)?;
        ringbuf_entry!(Trace::ChipRevision {
            port: self.port,
            rev
        });
        Ok(rev)
    }

    /// Checks that this is the first port of an octal PHY package, returning
    /// an error if that's not the case.
    pub fn check_base_port(&self) -> Result<(), RtlError> {
        if self.port % PACKAGE_PORTS != 0 {
            return Err(Argument::BaseAddress(self.port).into());
        }
        Ok(())
    }

    /// Clears (on) or sets (off) the power-down bit of the control register
    pub fn set_power(&self, on: bool) -> Result<(), RtlError> {
        self.modify(0, 0, |r| {
            if on {
                *r &= !(1 << 11)
            } else {
                *r |= 1 << 11
            }
        })
    }

    pub fn software_reset(&self) -> Result<(), RtlError> {
        self.modify(0, 0, |r| *r |= 1 << 15)
    }

    /// Powers the port up if it is powered down, otherwise resets it
    pub(crate) fn power_on_or_reset(&self) -> Result<(), RtlError> {
        if self.read(0, 0)? & (1 << 11) != 0 {
            self.set_power(true)
        } else {
            self.software_reset()
        }
    }

    /// Selects page 0 and enables auto-negotiation at 1000/full on the
    /// first `count` ports starting at this one
    pub(crate) fn enable_ports(&self, count: u8) -> Result<(), RtlError> {
        for i in 0..count {
            let p = self.at(i)?;
            p.write(PAGE_RAW, 0x1f, 0x0000)?;
            p.write(PAGE_RAW, 0x00, 0x1140)?;
        }
        Ok(())
    }

    /// Asks the first `count` ports starting at this one to enter the
    /// patch-request state
    pub(crate) fn request_patch(&self, count: u8) -> Result<(), RtlError> {
        for i in 0..count {
            let p = self.at(i)?;
            p.write(PAGE_RAW, 0x1f, 0x0b82)?;
            p.write(PAGE_RAW, 0x10, 0x0010)?;
        }
        Ok(())
    }

    /// Waits for every one of `count` ports to report patch-ready, failing
    /// on the first port that doesn't.  Each port is polled up to
    /// [PATCH_POLL_COUNT] times with a 1 ms sleep between reads.
    pub(crate) fn wait_patch_ready(&self, count: u8) -> Result<(), RtlError> {
        for i in 0..count {
            let p = self.at(i)?;
            match poll_until(p.rw, PATCH_POLL_COUNT, 1, || {
                Ok(p.read(0x0b80, 0x10)? & 0x40 != 0)
            })? {
                Poll::Done => ringbuf_entry!(Trace::PatchReady(p.port)),
                Poll::TimedOut => {
                    return Err(RtlError::PatchNotReady { port: p.port })
                }
            }
        }
        Ok(())
    }

    /// Replays a `(register, value)` list on this port, in order, with raw
    /// page addressing.  Returns the number of writes issued.
    pub(crate) fn apply_pairs(&self, list: Pairs) -> Result<u16, RtlError> {
        let mut n = 0;
        for [reg, value] in list {
            self.write(PAGE_RAW, list_reg(reg)?, value as u16)?;
            n += 1;
        }
        ringbuf_entry!(Trace::ListApplied {
            port: self.port,
            writes: n
        });
        Ok(n)
    }

    /// Replays a `(port offset, register, value)` list relative to this port
    pub(crate) fn apply_triples(&self, list: Triples) -> Result<u16, RtlError> {
        let mut n = 0;
        for [offset, reg, value] in list {
            self.at(list_offset(offset)?)?.write(
                PAGE_RAW,
                list_reg(reg)?,
                value as u16,
            )?;
            n += 1;
        }
        ringbuf_entry!(Trace::ListApplied {
            port: self.port,
            writes: n
        });
        Ok(n)
    }

    /// Points the package's broadcast ID register at `id`
    fn set_broadcast_id(&self, id: u16) -> Result<(), RtlError> {
        self.write(PAGE_RAW, 0x1f, 0x0000)?;
        self.write(PAGE_RAW, 0x1d, 0x0008)?;
        self.write(PAGE_RAW, 0x1f, 0x0266)?;
        self.write(PAGE_RAW, 0x16, id)?;
        self.write(PAGE_RAW, 0x1f, 0x0000)?;
        self.write(PAGE_RAW, 0x1d, 0x0000)?;
        self.sleep_for(1);
        Ok(())
    }

    /// Calls a function with broadcast writes enabled, so that every write
    /// through this port reaches the whole package, then restores per-port
    /// addressing
    pub(crate) fn broadcast<T, F>(&self, f: F) -> Result<T, RtlError>
    where
        F: FnOnce(&Phy<'a, P>) -> Result<T, RtlError>,
    {
        let port = u16::from(self.port);

        ringbuf_entry!(Trace::BroadcastEnable(self.port));
        self.set_broadcast_id(BROADCAST_ID + port)?;
        let result = f(self);

        // Undo the broadcast ID even if the function failed for some reason
        ringbuf_entry!(Trace::BroadcastDisable(self.port));
        self.set_broadcast_id(port)?;
        result
    }
}

pub(crate) fn list_reg(reg: u32) -> Result<u8, RtlError> {
    u8::try_from(reg).map_err(|_| Argument::Register(reg as u16).into())
}

pub(crate) fn list_offset(offset: u32) -> Result<u8, RtlError> {
    u8::try_from(offset).map_err(|_| Argument::Port(offset as u8).into())
}
