// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::{Phy, PhyRw, Trace};
use ringbuf::ringbuf_entry_root as ringbuf_entry;
use rtl_err::RtlError;

pub const PHY_ID_RTL8214C: u32 = 0x001c_c942;

/// The RTL8214C needs no patching; configuring it only hands the GPHY page
/// selection back to the hardware.
pub fn init<P: PhyRw>(port: u8, rw: &P) -> Result<(), RtlError> {
    ringbuf_entry!(Trace::Rtl8214cInit(port));
    let phy = Phy::new(port, rw);
    phy.read_id()?;
    phy.write(0xa42, 29, 0)
}
