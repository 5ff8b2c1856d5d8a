// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Suspend / resume of the SoC's autonomous PHY polling
//!
//! The switch polls every PHY on its own to track link state.  Any sequence
//! that reads-modifies-writes several dependent PHY registers has to take
//! the port out of that polling first, then put the saved mask back once
//! the whole sequence is done.

use crate::{Family, Rtl83xxRw, Trace};
use ringbuf::ringbuf_entry_root as ringbuf_entry;
use rtl_err::{Argument, RtlError};

const RTL838X_SMI_POLL_CTRL: u32 = 0xa17c;
/// Two words, ports 0-31 then 32-51
const RTL839X_SMI_PORT_POLLING_CTRL: u32 = 0x03fc;
const RTL930X_SMI_POLL_CTRL: u32 = 0xca90;

/// Polling mask as it was before [PollingDomain::disable]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[must_use]
pub struct SavedState {
    family: Family,
    mask: u64,
}

impl SavedState {
    pub fn mask(&self) -> u64 {
        self.mask
    }
}

/// Owner of the polling-enable registers.  There should be exactly one per
/// SoC; every disable / resume pair goes through its lock.
///
/// The lock is not reentrant: a caller must not disable polling again while
/// it still holds an unresumed [SavedState].
pub struct PollingDomain {
    lock: spin::Mutex<()>,
}

impl Default for PollingDomain {
    fn default() -> Self {
        Self::new()
    }
}

impl PollingDomain {
    pub const fn new() -> Self {
        Self {
            lock: spin::Mutex::new(()),
        }
    }

    /// Stops the SoC from polling `port`, returning the mask that was in
    /// place beforehand.  On the RTL931x this does nothing.
    pub fn disable<R: Rtl83xxRw>(
        &self,
        rw: &R,
        family: Family,
        port: u8,
    ) -> Result<SavedState, RtlError> {
        let _guard = self.lock.lock();
        let mask = match family {
            Family::Rtl838x | Family::Rtl930x => {
                if port >= 32 {
                    return Err(Argument::Port(port).into());
                }
                let addr = single_reg(family);
                let v = rw.read(addr)?;
                rw.write(addr, v & !(1 << port))?;
                u64::from(v)
            }
            Family::Rtl839x => {
                if port >= 52 {
                    return Err(Argument::Port(port).into());
                }
                let lo = rw.read(RTL839X_SMI_PORT_POLLING_CTRL)?;
                let hi = rw.read(RTL839X_SMI_PORT_POLLING_CTRL + 4)?;
                let addr =
                    RTL839X_SMI_PORT_POLLING_CTRL + (u32::from(port >> 5) << 2);
                rw.mask(addr, 1 << (port % 32), 0)?;
                u64::from(hi) << 32 | u64::from(lo)
            }
            Family::Rtl931x => {
                ringbuf_entry!(Trace::PollingUnsupported(family));
                0
            }
        };
        ringbuf_entry!(Trace::PollingDisabled { port, saved: mask });
        Ok(SavedState { family, mask })
    }

    /// Writes back the mask captured by [Self::disable], verbatim
    pub fn resume<R: Rtl83xxRw>(
        &self,
        rw: &R,
        saved: SavedState,
    ) -> Result<(), RtlError> {
        let _guard = self.lock.lock();
        let SavedState { family, mask } = saved;
        match family {
            Family::Rtl838x | Family::Rtl930x => {
                rw.write(single_reg(family), mask as u32)?;
            }
            Family::Rtl839x => {
                let hi = (mask >> 32) as u32;
                rw.write(RTL839X_SMI_PORT_POLLING_CTRL + 4, hi)?;
                rw.write(RTL839X_SMI_PORT_POLLING_CTRL, mask as u32)?;
            }
            Family::Rtl931x => return Ok(()),
        }
        ringbuf_entry!(Trace::PollingResumed(mask));
        Ok(())
    }
}

fn single_reg(family: Family) -> u32 {
    match family {
        Family::Rtl930x => RTL930X_SMI_POLL_CTRL,
        _ => RTL838X_SMI_POLL_CTRL,
    }
}
