// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end patching through the public API, against a PHY bus that
//! records every access

use rtl82xx::firmware::{
    checksum, FirmwareImage, FIRMWARE_MAGIC, REGION_COUNT, TARGET_RTL8214FC,
    TARGET_RTL8218B,
};
use rtl82xx::rtl8214fc::Rtl8214fc;
use rtl82xx::rtl8218b::{Rtl8218b, RTL8218B_EXT_ID};
use rtl82xx::{Delay, FirmwareError, PhyRw, RtlError, PAGE_RAW};

use std::cell::RefCell;
use std::collections::BTreeMap;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Access {
    Read(u8, u16, u8),
    Write(u8, u16, u8, u16),
}

#[derive(Default)]
struct Bus {
    regs: RefCell<BTreeMap<(u8, u16, u8), u16>>,
    log: RefCell<Vec<Access>>,
    /// Port whose patch-ready bit never comes up
    stuck: Option<u8>,
}

impl Bus {
    fn with_package(base: u8, n: u8) -> Self {
        let bus = Self::default();
        for p in base..base + n {
            bus.regs.borrow_mut().insert((p, 0x0b80, 0x10), 0x40);
            bus.regs.borrow_mut().insert((p, 31, 28), RTL8218B_EXT_ID);
            bus.regs.borrow_mut().insert((p, 0x0a42, 0x10), 0x3);
        }
        bus
    }

    fn writes(&self) -> Vec<Access> {
        self.log
            .borrow()
            .iter()
            .filter(|a| matches!(a, Access::Write(..)))
            .copied()
            .collect()
    }
}

impl Delay for Bus {
    fn sleep_for(&self, _ms: u32) {}
}

impl PhyRw for Bus {
    fn read_raw(&self, port: u8, page: u16, reg: u8) -> Result<u16, RtlError> {
        self.log.borrow_mut().push(Access::Read(port, page, reg));
        if self.stuck == Some(port) && (page, reg) == (0x0b80, 0x10) {
            return Ok(0);
        }
        Ok(self
            .regs
            .borrow()
            .get(&(port, page, reg))
            .copied()
            .unwrap_or(0))
    }

    fn write_raw(
        &self,
        port: u8,
        page: u16,
        reg: u8,
        value: u16,
    ) -> Result<(), RtlError> {
        self.log
            .borrow_mut()
            .push(Access::Write(port, page, reg, value));
        self.regs.borrow_mut().insert((port, page, reg), value);
        Ok(())
    }

    fn read_mmd_raw(&self, _: u8, _: u8, _: u16) -> Result<u16, RtlError> {
        Ok(0)
    }

    fn write_mmd_raw(
        &self,
        _: u8,
        _: u8,
        _: u16,
        _: u16,
    ) -> Result<(), RtlError> {
        Ok(())
    }
}

fn image(target: u32, regions: &[&[u32]]) -> Vec<u8> {
    let mut body = vec![];
    let mut starts = vec![];
    for r in regions {
        starts.push(body.len() as u16);
        body.extend(r.iter().flat_map(|w| w.to_be_bytes()));
    }
    starts.resize(REGION_COUNT, body.len() as u16);

    let mut out = vec![];
    out.extend_from_slice(&FIRMWARE_MAGIC.to_be_bytes());
    out.extend_from_slice(&target.to_be_bytes());
    out.extend_from_slice(&[0; 8]);
    for s in starts {
        out.extend_from_slice(&s.to_be_bytes());
        out.extend_from_slice(&[4, 0]);
    }
    out.extend_from_slice(&body);
    let sum = checksum(&out);
    out[8..12].copy_from_slice(&sum.to_be_bytes());
    out
}

#[test]
fn wrong_target_fails_before_any_write() {
    let bus = Bus::with_package(0, 8);
    let fw = image(TARGET_RTL8214FC, &[&[0, 0, 0], &[0, 0]]);
    assert!(FirmwareImage::parse(&fw).is_ok());

    let err = Rtl8218b::init_external(0, &bus, &fw).unwrap_err();
    assert_eq!(
        err,
        RtlError::FirmwareInvalid(FirmwareError::TargetMismatch {
            expected: TARGET_RTL8218B,
            found: TARGET_RTL8214FC,
        })
    );
    assert!(bus.log.borrow().is_empty());
}

#[test]
fn stuck_port_aborts_before_lists() {
    let mut bus = Bus::with_package(8, 8);
    bus.stuck = Some(13);
    let fw = image(TARGET_RTL8218B, &[&[0, 0, 0], &[0x10, 0xbeef, 0, 0]]);

    assert_eq!(
        Rtl8218b::init_external(8, &bus, &fw).unwrap_err(),
        RtlError::PatchNotReady { port: 13 }
    );
    // Neither the broadcast bracket nor the per-port list was started
    assert!(!bus
        .writes()
        .iter()
        .any(|w| matches!(w, Access::Write(_, PAGE_RAW, 0x16, _))));
    assert!(!bus
        .writes()
        .iter()
        .any(|w| matches!(w, Access::Write(_, _, _, 0xbeef))));
}

#[test]
fn combo_patch_lists_in_order() {
    let bus = Bus::with_package(24, 4);
    let fw = image(
        TARGET_RTL8214FC,
        &[
            &[2, 0x1b, 0x1111, 3, 0x1c, 0x2222, 0, 0, 0],
            &[0x11, 0x3333, 0x12, 0x4444, 0, 0, 0x13, 0x5555],
        ],
    );
    Rtl8214fc::init(24, &bus, &fw).unwrap();

    let w = bus.writes();
    let at = |a: Access| w.iter().position(|x| *x == a).unwrap();
    let perchip_a = at(Access::Write(26, PAGE_RAW, 0x1b, 0x1111));
    let perchip_b = at(Access::Write(27, PAGE_RAW, 0x1c, 0x2222));
    let bc_on = at(Access::Write(24, PAGE_RAW, 0x16, 0xff18));
    let port_a = at(Access::Write(24, PAGE_RAW, 0x11, 0x3333));
    let port_b = at(Access::Write(24, PAGE_RAW, 0x12, 0x4444));
    let bc_off = at(Access::Write(24, PAGE_RAW, 0x16, 0x0018));
    assert!(perchip_a < perchip_b);
    assert!(perchip_b < bc_on);
    assert!(bc_on < port_a && port_a < port_b && port_b < bc_off);

    // Past the sentinel
    assert!(!w.contains(&Access::Write(24, PAGE_RAW, 0x13, 0x5555)));
}
