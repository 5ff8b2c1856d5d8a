// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Recording PHY bus for unit tests

use crate::{Delay, PhyRw, RtlError};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Op {
    Read { port: u8, page: u16, reg: u8 },
    Write { port: u8, page: u16, reg: u8, value: u16 },
    ReadMmd { port: u8, dev: u8, reg: u16 },
    WriteMmd { port: u8, dev: u8, reg: u16, value: u16 },
    Sleep(u32),
}

/// Register file keyed by `(port, page, reg)`.  Unset registers read as 0;
/// writes land in the file so later reads observe them.
#[derive(Default)]
pub struct FakePhy {
    regs: RefCell<BTreeMap<(u8, u16, u8), u16>>,
    mmd: RefCell<BTreeMap<(u8, u8, u16), u16>>,
    pub ops: RefCell<Vec<Op>>,
    pub slept: Cell<u32>,
}

impl FakePhy {
    pub fn set(&self, port: u8, page: u16, reg: u8, value: u16) {
        self.regs.borrow_mut().insert((port, page, reg), value);
    }

    pub fn get(&self, port: u8, page: u16, reg: u8) -> u16 {
        self.regs
            .borrow()
            .get(&(port, page, reg))
            .copied()
            .unwrap_or(0)
    }

    pub fn set_mmd(&self, port: u8, dev: u8, reg: u16, value: u16) {
        self.mmd.borrow_mut().insert((port, dev, reg), value);
    }

    pub fn get_mmd(&self, port: u8, dev: u8, reg: u16) -> u16 {
        self.mmd.borrow().get(&(port, dev, reg)).copied().unwrap_or(0)
    }

    /// Marks ports `base..base + n` as having finished their patch request
    /// and reporting a sensible internal id
    pub fn ready(&self, base: u8, n: u8, internal_id: u16) {
        for p in base..base + n {
            self.set(p, 0x0b80, 0x10, 0x40);
            self.set(p, 31, 28, internal_id);
        }
    }

    pub fn writes(&self) -> Vec<Op> {
        self.ops
            .borrow()
            .iter()
            .filter(|op| matches!(op, Op::Write { .. } | Op::WriteMmd { .. }))
            .copied()
            .collect()
    }
}

impl Delay for FakePhy {
    fn sleep_for(&self, ms: u32) {
        self.slept.set(self.slept.get() + ms);
        self.ops.borrow_mut().push(Op::Sleep(ms));
    }
}

impl PhyRw for FakePhy {
    fn read_raw(&self, port: u8, page: u16, reg: u8) -> Result<u16, RtlError> {
        self.ops.borrow_mut().push(Op::Read { port, page, reg });
        Ok(self.get(port, page, reg))
    }

    fn write_raw(
        &self,
        port: u8,
        page: u16,
        reg: u8,
        value: u16,
    ) -> Result<(), RtlError> {
        self.ops.borrow_mut().push(Op::Write {
            port,
            page,
            reg,
            value,
        });
        self.set(port, page, reg, value);
        Ok(())
    }

    fn read_mmd_raw(
        &self,
        port: u8,
        dev: u8,
        reg: u16,
    ) -> Result<u16, RtlError> {
        self.ops.borrow_mut().push(Op::ReadMmd { port, dev, reg });
        Ok(self.get_mmd(port, dev, reg))
    }

    fn write_mmd_raw(
        &self,
        port: u8,
        dev: u8,
        reg: u16,
        value: u16,
    ) -> Result<(), RtlError> {
        self.ops.borrow_mut().push(Op::WriteMmd {
            port,
            dev,
            reg,
            value,
        });
        self.set_mmd(port, dev, reg, value);
        Ok(())
    }
}
