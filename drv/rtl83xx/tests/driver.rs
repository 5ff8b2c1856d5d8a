// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Whole-driver scenarios against a register-level model of an RTL838x SMI
//! engine and an RTL930x indirect SerDes engine

use rtl82xx::firmware::{
    checksum, FirmwareLoader, FIRMWARE_MAGIC, REGION_COUNT, TARGET_RTL8214FC,
    TARGET_RTL8218B,
};
use rtl82xx::rtl8218b::{PHY_ID_RTL8218B_E, RTL8218B_EXT_ID};
use rtl82xx::{LinkStatus, PAGE_RAW};
use rtl83xx::config::{SerdesMode, SerdesPort};
use rtl83xx::driver::{Chip, ChipHandle};
use rtl83xx::{Delay, Driver, PollingDomain, Rtl83xxRw, RtlError};
use rtl83xx::{Family, SocInfo};

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

const SMI_PORT_MASK: u32 = 0xa1b8;
const SMI_CMD: u32 = 0xa1bc;
const SMI_DATA: u32 = 0xa1c0;
const SMI_MMD: u32 = 0xa1c4;
const SMI_POLL_CTRL: u32 = 0xa17c;

const SDS_CMD: u32 = 0x03b0;
const SDS_DATA: u32 = 0x03b4;

const RTL8380: SocInfo = SocInfo {
    family_id: 0x8380,
    id: 0x8380,
};
const RTL9301: SocInfo = SocInfo {
    family_id: 0x9300,
    id: 0x9301,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Access {
    Soc(u32, u32),
    Phy { port: u8, page: u16, reg: u8, value: u16 },
}

/// Register file plus just enough of the SMI and SerDes engines to run whole
/// patch sequences
#[derive(Default)]
struct Soc {
    regs: RefCell<BTreeMap<u32, u32>>,
    phy: RefCell<BTreeMap<(u8, u16, u8), u16>>,
    mmd: RefCell<BTreeMap<(u8, u8, u16), u16>>,
    sds: RefCell<BTreeMap<(u8, u8, u8), u16>>,
    /// Every SoC write, and every PHY write the SMI engine carried out
    log: RefCell<Vec<Access>>,
    reads: Cell<usize>,
    /// Command register whose execute bit never clears
    stuck: Option<u32>,
}

impl Soc {
    fn get(&self, addr: u32) -> u32 {
        self.regs.borrow().get(&addr).copied().unwrap_or(0)
    }

    fn set(&self, addr: u32, value: u32) {
        self.regs.borrow_mut().insert(addr, value);
    }

    fn set_phy(&self, port: u8, page: u16, reg: u8, value: u16) {
        self.phy.borrow_mut().insert((port, page, reg), value);
    }

    fn get_phy(&self, port: u8, page: u16, reg: u8) -> u16 {
        self.phy
            .borrow()
            .get(&(port, page, reg))
            .copied()
            .unwrap_or(0)
    }

    /// An external RTL8218B package at 0-7 that comes out of patch-request
    /// immediately
    fn with_rtl8218b() -> Self {
        let soc = Self::default();
        soc.set_phy(0, 0, 2, (PHY_ID_RTL8218B_E >> 16) as u16);
        soc.set_phy(0, 0, 3, PHY_ID_RTL8218B_E as u16);
        soc.set_phy(0, 31, 28, RTL8218B_EXT_ID);
        for p in 0..8 {
            soc.set_phy(p, 0x0b80, 0x10, 0x40);
        }
        soc
    }

    fn phy_writes(&self) -> Vec<(u8, u16, u8, u16)> {
        self.log
            .borrow()
            .iter()
            .filter_map(|a| match *a {
                Access::Phy {
                    port,
                    page,
                    reg,
                    value,
                } => Some((port, page, reg, value)),
                _ => None,
            })
            .collect()
    }

    fn smi(&self, cmd: u32) {
        let data = self.get(SMI_DATA);
        let write = cmd & (1 << 2) != 0;
        let mmd = cmd & (1 << 1) != 0;
        let port = if write {
            self.get(SMI_PORT_MASK).trailing_zeros() as u8
        } else {
            (data >> 16) as u8
        };
        let value = (data >> 16) as u16;
        let result = if mmd {
            let sel = self.get(SMI_MMD);
            let key = (port, ((sel >> 16) & 0x1f) as u8, sel as u16);
            if write {
                self.mmd.borrow_mut().insert(key, value);
                None
            } else {
                Some(self.mmd.borrow().get(&key).copied().unwrap_or(0))
            }
        } else {
            let page = ((cmd >> 3) & 0xfff) as u16;
            let reg = ((cmd >> 20) & 0x1f) as u8;
            if write {
                self.set_phy(port, page, reg, value);
                self.log.borrow_mut().push(Access::Phy {
                    port,
                    page,
                    reg,
                    value,
                });
                None
            } else {
                Some(self.get_phy(port, page, reg))
            }
        };
        if let Some(v) = result {
            self.set(SMI_DATA, (data & 0xffff_0000) | u32::from(v));
        }
    }

    fn sds(&self, cmd: u32) {
        let key = (
            ((cmd >> 2) & 0x1f) as u8,
            ((cmd >> 7) & 0x3f) as u8,
            ((cmd >> 13) & 0x1f) as u8,
        );
        if cmd & (1 << 1) != 0 {
            let v = self.get(SDS_DATA) as u16;
            self.sds.borrow_mut().insert(key, v);
        } else {
            let v = self.sds.borrow().get(&key).copied().unwrap_or(0);
            self.set(SDS_DATA, v.into());
        }
    }
}

impl Delay for Soc {
    fn sleep_for(&self, _ms: u32) {}
}

impl Rtl83xxRw for Soc {
    fn read(&self, addr: u32) -> Result<u32, RtlError> {
        self.reads.set(self.reads.get() + 1);
        Ok(self.get(addr))
    }

    fn write(&self, addr: u32, value: u32) -> Result<(), RtlError> {
        self.log.borrow_mut().push(Access::Soc(addr, value));
        let executes = (addr == SMI_CMD || addr == SDS_CMD) && value & 1 != 0;
        if !executes || self.stuck == Some(addr) {
            self.set(addr, value);
            return Ok(());
        }
        if addr == SMI_CMD {
            self.smi(value);
        } else {
            self.sds(value);
        }
        self.set(addr, value & !1);
        Ok(())
    }
}

struct Images(BTreeMap<&'static str, Vec<u8>>);

impl FirmwareLoader for Images {
    fn fetch(&self, name: &str) -> Result<&[u8], RtlError> {
        self.0
            .get(name)
            .map(|v| v.as_slice())
            .ok_or(RtlError::FirmwareNotFound)
    }
}

fn image(target: u32, regions: &[&[u32]]) -> Vec<u8> {
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

fn rtl8218b_images() -> Images {
    let fw = image(
        TARGET_RTL8218B,
        &[
            // Per-chip (port offset, register, value)
            &[1, 0x1b, 0x0123, 0, 0, 0],
            // Per-port (register, value), broadcast to the package
            &[0x14, 0xaaaa, 0x15, 0x5555, 0, 0],
        ],
    );
    Images([(rtl82xx::firmware::FIRMWARE_RTL8218B, fw)].into())
}

#[test]
fn probe_and_patch_external_rtl8218b() {
    let soc = Soc::with_rtl8218b();
    let polling = PollingDomain::new();
    let fw = rtl8218b_images();
    let drv = Driver::new(&soc, RTL8380, &polling, &fw, &[]).unwrap();

    let h = drv.probe(0).unwrap();
    assert_eq!(h.chip, Chip::Rtl8218bExternal);
    drv.configure(h).unwrap();

    let writes = soc.phy_writes();
    let enable = (0, PAGE_RAW, 0x16, 0xff00);
    let disable = (0, PAGE_RAW, 0x16, 0x0000);
    let start = writes.iter().position(|w| *w == enable).unwrap();
    let end = writes.iter().position(|w| *w == disable).unwrap();
    assert!(start < end);

    // The per-port list lands inside the broadcast bracket, in order, and
    // its sentinel is never written
    let list: Vec<_> = writes[start..end]
        .iter()
        .filter(|w| w.1 == PAGE_RAW && (w.2 == 0x14 || w.2 == 0x15))
        .copied()
        .collect();
    assert_eq!(
        list,
        vec![(0, PAGE_RAW, 0x14, 0xaaaa), (0, PAGE_RAW, 0x15, 0x5555)]
    );
    assert!(!writes.contains(&(0, PAGE_RAW, 0, 0)));

    // The per-chip list went to port 1, before patch-request
    let perchip = writes
        .iter()
        .position(|w| *w == (1, PAGE_RAW, 0x1b, 0x0123))
        .unwrap();
    assert!(perchip < start);
}

#[test]
fn wrong_target_touches_nothing() {
    let soc = Soc::with_rtl8218b();
    let polling = PollingDomain::new();
    let fw = Images(
        [(
            rtl82xx::firmware::FIRMWARE_RTL8218B,
            image(TARGET_RTL8214FC, &[&[0, 0, 0], &[0, 0]]),
        )]
        .into(),
    );
    let drv = Driver::new(&soc, RTL8380, &polling, &fw, &[]).unwrap();
    let h = drv.probe(0).unwrap();

    let reads = soc.reads.get();
    let logged = soc.log.borrow().len();
    assert!(matches!(
        drv.configure(h),
        Err(RtlError::FirmwareInvalid(_))
    ));
    assert_eq!(soc.reads.get(), reads);
    assert_eq!(soc.log.borrow().len(), logged);
}

#[test]
fn stuck_patch_request_aborts() {
    let soc = Soc::with_rtl8218b();
    soc.set_phy(5, 0x0b80, 0x10, 0);
    let polling = PollingDomain::new();
    let fw = rtl8218b_images();
    let drv = Driver::new(&soc, RTL8380, &polling, &fw, &[]).unwrap();

    let h = drv.probe(0).unwrap();
    assert_eq!(drv.configure(h), Err(RtlError::PatchNotReady { port: 5 }));
    assert!(!soc
        .phy_writes()
        .contains(&(0, PAGE_RAW, 0x16, 0xff00)));
}

#[test]
fn eee_restores_polling() {
    let soc = Soc::with_rtl8218b();
    soc.set(SMI_POLL_CTRL, 0x0f0f_0f0f);
    let polling = PollingDomain::new();
    let fw = rtl8218b_images();
    let drv = Driver::new(&soc, RTL8380, &polling, &fw, &[]).unwrap();

    let h = ChipHandle {
        addr: 3,
        chip: Chip::Rtl8218bExternal,
    };
    drv.set_eee(h, false).unwrap();
    assert_eq!(soc.get(SMI_POLL_CTRL), 0x0f0f_0f0f);

    let soc_writes: Vec<_> = soc
        .log
        .borrow()
        .iter()
        .filter(|a| matches!(a, Access::Soc(SMI_POLL_CTRL, _)))
        .copied()
        .collect();
    assert_eq!(
        soc_writes,
        vec![
            Access::Soc(SMI_POLL_CTRL, 0x0f0f_0f07),
            Access::Soc(SMI_POLL_CTRL, 0x0f0f_0f0f),
        ]
    );
}

#[test]
fn serdes_timeout_reads_as_link_down() {
    let soc = Soc {
        stuck: Some(SDS_CMD),
        ..Default::default()
    };
    let polling = PollingDomain::new();
    let fw = Images(BTreeMap::new());
    let ports = [SerdesPort {
        port: 24,
        lane: 2,
        mode: SerdesMode::Base1000X,
    }];
    let drv = Driver::new(&soc, RTL9301, &polling, &fw, &ports).unwrap();
    assert_eq!(drv.dispatcher().family(), Family::Rtl930x);

    assert_eq!(
        drv.dispatcher().read_sds(2, 0, 1),
        Err(RtlError::BusTimeout { addr: SDS_CMD })
    );
    let h = ChipHandle {
        addr: 24,
        chip: Chip::Rtl9300Serdes,
    };
    assert_eq!(drv.read_status(h), Ok(LinkStatus::DOWN));
}

#[test]
fn unknown_family() {
    let soc = Soc::default();
    let polling = PollingDomain::new();
    let fw = Images(BTreeMap::new());
    let r = Driver::new(
        &soc,
        SocInfo {
            family_id: 0x9320,
            id: 0x9320,
        },
        &polling,
        &fw,
        &[],
    );
    assert!(matches!(r, Err(RtlError::UnsupportedFamily(0x9320))));
}
