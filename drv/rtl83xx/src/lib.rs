// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Driver for the PHY and SerDes plumbing of Realtek RTL838x, RTL839x,
//! RTL930x and RTL931x switch SoCs.
//!
//! Everything here is built on [Rtl83xxRw], a raw 32-bit register interface
//! to the SoC, which callers must implement.  On top of that, each family
//! provides an SMI transport (to reach external PHYs) and a SerDes access
//! method; the [Dispatcher] picks the right one once, at construction time,
//! and implements [rtl82xx::PhyRw] so that the PHY-chip routines in
//! `rtl82xx` can run on any of the four families.
#![cfg_attr(not(test), no_std)]

pub mod config;
pub mod dispatch;
pub mod driver;
pub mod polling;
pub mod serdes930x;
pub mod serdes931x;
pub mod soc_serdes;

mod indirect;
mod rtl838x;
mod rtl839x;
mod rtl930x;
mod rtl931x;
mod smi;

#[cfg(test)]
mod fake;

use ringbuf::*;
use serde::{Deserialize, Serialize};

pub use dispatch::Dispatcher;
pub use driver::Driver;
pub use polling::{PollingDomain, SavedState};
pub use rtl82xx::Delay;
pub use rtl_err::{Argument, RtlError};

/// How many times an SMI or indirect SerDes command register is polled
/// before giving up.  Polls are 1 ms apart.
pub const SMI_POLL_COUNT: usize = 100;

/// This trait abstracts over the SoC's register space.  Addresses are byte
/// offsets from the base of the switch register block.
pub trait Rtl83xxRw: Delay {
    fn read(&self, addr: u32) -> Result<u32, RtlError>;

    fn write(&self, addr: u32, value: u32) -> Result<(), RtlError>;

    /// Performs a write operation on the given register, where the value is
    /// calculated by calling f(0).
    fn write_with<F>(&self, addr: u32, f: F) -> Result<(), RtlError>
    where
        F: Fn(&mut u32),
    {
        let mut data = 0;
        f(&mut data);
        self.write(addr, data)
    }

    /// Performs a read-modify-write operation on a SoC register
    fn modify<F>(&self, addr: u32, f: F) -> Result<(), RtlError>
    where
        F: Fn(&mut u32),
    {
        let mut data = self.read(addr)?;
        f(&mut data);
        self.write(addr, data)
    }

    /// Clears the bits in `clear`, then sets the bits in `set`
    fn mask(&self, addr: u32, clear: u32, set: u32) -> Result<(), RtlError> {
        self.modify(addr, |v| *v = (*v & !clear) | set)
    }

    /// Writes a 64-port mask, which is assumed to be a pair of adjacent
    /// registers with the low ports in the first one.
    fn write_port_mask(&self, addr: u32, value: u64) -> Result<(), RtlError> {
        self.write(addr, value as u32)?;
        self.write(addr + 4, (value >> 32) as u32)
    }
}

////////////////////////////////////////////////////////////////////////////////

/// Supported SoC families
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Family {
    Rtl838x,
    Rtl839x,
    Rtl930x,
    Rtl931x,
}

impl Family {
    pub const fn family_id(self) -> u32 {
        match self {
            Family::Rtl838x => 0x8380,
            Family::Rtl839x => 0x8390,
            Family::Rtl930x => 0x9300,
            Family::Rtl931x => 0x9310,
        }
    }

    pub fn from_family_id(id: u32) -> Result<Self, RtlError> {
        match id {
            0x8380 => Ok(Family::Rtl838x),
            0x8390 => Ok(Family::Rtl839x),
            0x9300 => Ok(Family::Rtl930x),
            0x9310 => Ok(Family::Rtl931x),
            _ => Err(RtlError::UnsupportedFamily(id)),
        }
    }
}

/// What the platform detected about the SoC at boot.  `family_id` selects
/// the family; `id` is the exact chip (e.g. 0x8380 vs 0x8382 within the
/// RTL838x family), which matters for a handful of SerDes quirks.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocInfo {
    pub family_id: u32,
    pub id: u16,
}

impl SocInfo {
    pub fn family(&self) -> Result<Family, RtlError> {
        Family::from_family_id(self.family_id)
    }
}

////////////////////////////////////////////////////////////////////////////////

#[derive(Copy, Clone, Debug, PartialEq)]
enum Trace {
    None,
    Dispatcher(Family),
    SmiTimeout { addr: u32 },
    SdsTimeout { lane: u8, page: u8, reg: u8 },
    PollingDisabled { port: u8, saved: u64 },
    PollingResumed(u64),
    PollingUnsupported(Family),
    Probe { addr: u8, id: u32 },
    SdsReset { lane: u8, mode: u8 },
    ModeRetriesExhausted { lane: u8 },
    ModeActive { lane: u8, tries: u8 },
    ModeNotForced { lane: u8, code: u8 },
    MacLinkBefore { lane: u8, v10: u16, v1: u16 },
    MacLinkAfter { lane: u8, v10: u16, v1: u16 },
    SdsConfBackup(u32),
    SerdesPatched,
    AnalogMode { lane: u8, value: u16 },
    CmuBand { lane: u8, band: u16 },
    SdsLink { lane: u8, status: u16, latched: u16 },
}
ringbuf!(Trace, 32, Trace::None);
