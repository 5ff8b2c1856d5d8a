// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Recording SoC register file for unit tests
//!
//! Besides plain registers, the fake models just enough hardware to run
//! whole sequences: command registers clear their execute bit (unless marked
//! stuck), the indirect SerDes engine moves data between its data register
//! and a per-lane register file, and the RTL838x, RTL839x and RTL930x SMI
//! engines move data to and from a PHY register file.

use crate::{Delay, Family, Rtl83xxRw, RtlError};
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SocOp {
    Read(u32),
    Write(u32, u32),
}

/// SMI register block layout and command word packing.  Every modelled
/// engine takes the port (reads) or the write data in the upper half of its
/// data register and returns read data in the lower half.
#[derive(Copy, Clone)]
struct SmiModel {
    port_mask: u32,
    /// Upper word of a 64-bit port mask
    port_mask_hi: Option<u32>,
    cmd: u32,
    data: u32,
    mmd: u32,
    write_bit: u32,
    mmd_bit: u32,
    page_shift: u32,
    page_mask: u32,
    reg_shift: u32,
}

impl SmiModel {
    const fn rtl838x() -> Self {
        Self {
            port_mask: 0xa1b8,
            port_mask_hi: None,
            cmd: 0xa1bc,
            data: 0xa1c0,
            mmd: 0xa1c4,
            write_bit: 1 << 2,
            mmd_bit: 1 << 1,
            page_shift: 3,
            page_mask: 0xfff,
            reg_shift: 20,
        }
    }

    const fn rtl839x() -> Self {
        Self {
            port_mask: 0x03e4,
            port_mask_hi: Some(0x03e8),
            cmd: 0x03dc,
            data: 0x03f0,
            mmd: 0x03f4,
            write_bit: 1 << 3,
            mmd_bit: 1 << 2,
            page_shift: 10,
            page_mask: 0x1fff,
            reg_shift: 5,
        }
    }

    const fn rtl930x() -> Self {
        Self {
            port_mask: 0xcb70,
            cmd: 0xcb74,
            data: 0xcb78,
            mmd: 0xcb7c,
            ..Self::rtl838x()
        }
    }
}

pub struct FakeSoc {
    pub regs: RefCell<BTreeMap<u32, u32>>,
    pub ops: RefCell<Vec<SocOp>>,
    pub slept: Cell<u32>,
    /// Command registers whose execute bit never clears
    pub stuck: RefCell<BTreeSet<u32>>,
    /// Status bits a command register reports once its command completes
    pub completion: RefCell<BTreeMap<u32, u32>>,
    /// SerDes registers behind the indirect engine, by (lane, page, reg)
    pub sds: RefCell<BTreeMap<(u8, u8, u8), u16>>,
    /// PHY registers behind the SMI engine, by (port, page, reg)
    pub phy: RefCell<BTreeMap<(u8, u16, u8), u16>>,
    pub phy_mmd: RefCell<BTreeMap<(u8, u8, u16), u16>>,
    sds_regs: (u32, u32),
    smi: Option<SmiModel>,
    commands: &'static [u32],
}

impl Default for FakeSoc {
    fn default() -> Self {
        Self::new(Family::Rtl930x)
    }
}

impl FakeSoc {
    pub fn new(family: Family) -> Self {
        let (sds_regs, smi, commands): (_, _, &'static [u32]) = match family {
            Family::Rtl838x => {
                ((0, 0), Some(SmiModel::rtl838x()), &[0xa1bc])
            }
            Family::Rtl839x => {
                ((0, 0), Some(SmiModel::rtl839x()), &[0x03dc])
            }
            Family::Rtl930x => (
                (0x03b0, 0x03b4),
                Some(SmiModel::rtl930x()),
                &[0xcb74, 0x03b0],
            ),
            Family::Rtl931x => ((0x5638, 0x563c), None, &[0x0c00, 0x5638]),
        };
        Self {
            regs: RefCell::default(),
            ops: RefCell::default(),
            slept: Cell::new(0),
            stuck: RefCell::default(),
            completion: RefCell::default(),
            sds: RefCell::default(),
            phy: RefCell::default(),
            phy_mmd: RefCell::default(),
            sds_regs,
            smi,
            commands,
        }
    }

    pub fn rtl931x() -> Self {
        Self::new(Family::Rtl931x)
    }

    pub fn set(&self, addr: u32, value: u32) {
        self.regs.borrow_mut().insert(addr, value);
    }

    pub fn get(&self, addr: u32) -> u32 {
        self.regs.borrow().get(&addr).copied().unwrap_or(0)
    }

    pub fn set_sds(&self, lane: u8, page: u8, reg: u8, value: u16) {
        self.sds.borrow_mut().insert((lane, page, reg), value);
    }

    pub fn get_sds(&self, lane: u8, page: u8, reg: u8) -> u16 {
        self.sds
            .borrow()
            .get(&(lane, page, reg))
            .copied()
            .unwrap_or(0)
    }

    pub fn set_phy(&self, port: u8, page: u16, reg: u8, value: u16) {
        self.phy.borrow_mut().insert((port, page, reg), value);
    }

    pub fn get_phy(&self, port: u8, page: u16, reg: u8) -> u16 {
        self.phy
            .borrow()
            .get(&(port, page, reg))
            .copied()
            .unwrap_or(0)
    }

    pub fn writes(&self) -> Vec<SocOp> {
        self.ops
            .borrow()
            .iter()
            .filter(|op| matches!(op, SocOp::Write(..)))
            .copied()
            .collect()
    }

    /// Runs the side effects of a command once its execute bit is set
    fn execute(&self, addr: u32, cmd: u32) {
        if addr == self.sds_regs.0 {
            let key = (
                ((cmd >> 2) & 0x1f) as u8,
                ((cmd >> 7) & 0x3f) as u8,
                ((cmd >> 13) & 0x1f) as u8,
            );
            if cmd & 0x2 != 0 {
                let v = self.get(self.sds_regs.1) as u16;
                self.sds.borrow_mut().insert(key, v);
            } else {
                let v = self.get_sds(key.0, key.1, key.2);
                self.set(self.sds_regs.1, v.into());
            }
            return;
        }
        let Some(smi) = self.smi.filter(|s| s.cmd == addr) else {
            return;
        };
        let write = cmd & smi.write_bit != 0;
        let mmd = cmd & smi.mmd_bit != 0;
        let data = self.get(smi.data);
        let port = if write {
            let lo = u64::from(self.get(smi.port_mask));
            let hi = smi.port_mask_hi.map_or(0, |a| u64::from(self.get(a)));
            (lo | hi << 32).trailing_zeros() as u8
        } else {
            (data >> 16) as u8
        };
        let value = (data >> 16) as u16;
        if mmd {
            let sel = self.get(smi.mmd);
            let key = (port, ((sel >> 16) & 0x1f) as u8, sel as u16);
            if write {
                self.phy_mmd.borrow_mut().insert(key, value);
            } else {
                let v = self.phy_mmd.borrow().get(&key).copied().unwrap_or(0);
                self.set(smi.data, (data & 0xffff_0000) | u32::from(v));
            }
        } else {
            let page = ((cmd >> smi.page_shift) & smi.page_mask) as u16;
            let reg = ((cmd >> smi.reg_shift) & 0x1f) as u8;
            if write {
                self.set_phy(port, page, reg, value);
            } else {
                let v = self.get_phy(port, page, reg);
                self.set(smi.data, (data & 0xffff_0000) | u32::from(v));
            }
        }
    }
}

impl Delay for FakeSoc {
    fn sleep_for(&self, ms: u32) {
        self.slept.set(self.slept.get() + ms);
    }
}

impl Rtl83xxRw for FakeSoc {
    fn read(&self, addr: u32) -> Result<u32, RtlError> {
        self.ops.borrow_mut().push(SocOp::Read(addr));
        Ok(self.get(addr))
    }

    fn write(&self, addr: u32, value: u32) -> Result<(), RtlError> {
        self.ops.borrow_mut().push(SocOp::Write(addr, value));
        let mut stored = value;
        if self.commands.contains(&addr) && value & 1 != 0 {
            if self.stuck.borrow().contains(&addr) {
                self.set(addr, value);
                return Ok(());
            }
            self.execute(addr, value);
            stored &= !1;
            stored |= self.completion.borrow().get(&addr).copied().unwrap_or(0);
        }
        self.set(addr, stored);
        Ok(())
    }
}

/// Builds a valid patch image for `target` with one region per slice of
/// words.  Regions sharing a start offset run into each other, so empty
/// lists should still carry their sentinel.
pub fn firmware_image(target: u32, regions: &[&[u32]]) -> Vec<u8> {
    use rtl82xx::firmware::{checksum, FIRMWARE_MAGIC, REGION_COUNT};

    let mut body = vec![];
    let mut starts = vec![];
    for r in regions {
        starts.push(body.len() as u16);
        for w in r.iter() {
            body.extend_from_slice(&w.to_be_bytes());
        }
    }
    starts.resize(REGION_COUNT, body.len() as u16);

    let mut out = vec![];
    out.extend_from_slice(&FIRMWARE_MAGIC.to_be_bytes());
    out.extend_from_slice(&target.to_be_bytes());
    out.extend_from_slice(&[0; 4]);
    out.extend_from_slice(&1u32.to_be_bytes());
    for s in starts {
        out.extend_from_slice(&s.to_be_bytes());
        out.extend_from_slice(&[4, 0]);
    }
    out.extend_from_slice(&body);

    let sum = checksum(&out);
    out[8..12].copy_from_slice(&sum.to_be_bytes());
    out
}
