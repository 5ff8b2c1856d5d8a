// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Entry points for a PHY framework: probe, configure, and the per-chip
//! status / EEE / medium operations.

use crate::config::{SerdesMode, SerdesPort};
use crate::rtl838x::RTL8380M_ID;
use crate::rtl839x::RTL8393_ID;
use crate::{
    serdes930x, soc_serdes, Dispatcher, Family, PollingDomain, Rtl83xxRw,
    SocInfo, Trace,
};
use ringbuf::ringbuf_entry_root as ringbuf_entry;
use rtl82xx::firmware::{
    FirmwareLoader, FIRMWARE_RTL8214FC, FIRMWARE_RTL8218B, FIRMWARE_RTL8380,
};
use rtl82xx::rtl8214c::{self, PHY_ID_RTL8214C};
use rtl82xx::rtl8214fc::{Rtl8214fc, Rtl8214fcPhy};
use rtl82xx::rtl8218b::{
    Rtl8218b, Rtl8218bPhy, PHY_ID_RTL8218B_E, PHY_ID_RTL8218B_I,
};
use rtl82xx::rtl8218d::{Rtl8218dPhy, PHY_ID_RTL8218D};
use rtl82xx::rtl8226::{Rtl8226Phy, PHY_ID_RTL8226};
use rtl82xx::{Duplex, LinkStatus, Medium, Phy, Speed, PACKAGE_PORTS};
use rtl_err::RtlError;
use serde::{Deserialize, Serialize};

/// PHY id reported by the SerDes 12/13 shadow of an RTL8393
pub const PHY_ID_RTL8393_I: u32 = 0x001c_8393;
pub const PHY_ID_RTL8390_GENERIC: u32 = 0x001c_cab0;

/// RTL9300 SerDes ids differ in bits 27:24 between revisions
const PHY_ID_RTL9300_I: u32 = 0x70d0_3106;
const PHY_ID_RTL9300_MASK: u32 = 0xf0ff_ffff;

const RTL8380_SDS_PATCH_ADDR: u8 = 24;

/// SerDes and combo PHYs sit above the copper ports
const SDS_FIRST_ADDR: u8 = 24;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Chip {
    Rtl8214c,
    Rtl8214fc,
    Rtl8218bInternal,
    Rtl8218bExternal,
    Rtl8218d,
    Rtl8226,
    Rtl8380Serdes,
    Rtl8393Serdes,
    Rtl8390Generic,
    Rtl9300Serdes,
}

/// Result of a successful [Driver::probe]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChipHandle {
    pub addr: u8,
    pub chip: Chip,
}

impl ChipHandle {
    /// Patches are applied once per package, from its first port
    pub fn is_package_base(&self) -> bool {
        self.addr % PACKAGE_PORTS == 0
    }
}

/// Top-level state for one switch SoC.
///
/// `serdes` lists the RTL930x SerDes lanes that sit behind PHY addresses;
/// an RTL9300 SerDes address with no entry is left alone by
/// [Driver::configure].
pub struct Driver<'a, R, L> {
    dispatch: Dispatcher<'a, R>,
    polling: &'a PollingDomain,
    loader: &'a L,
    serdes: &'a [SerdesPort],
}

impl<'a, R: Rtl83xxRw, L: FirmwareLoader> Driver<'a, R, L> {
    pub fn new(
        rw: &'a R,
        soc: SocInfo,
        polling: &'a PollingDomain,
        loader: &'a L,
        serdes: &'a [SerdesPort],
    ) -> Result<Self, RtlError> {
        Ok(Self {
            dispatch: Dispatcher::new(rw, soc)?.with_serdes(serdes),
            polling,
            loader,
            serdes,
        })
    }

    pub fn dispatcher(&self) -> &Dispatcher<'a, R> {
        &self.dispatch
    }

    fn family(&self) -> Family {
        self.dispatch.family()
    }

    /// Reads the PHY id at `addr` and works out which chip it is.  Some ids
    /// are shared between chips, so the SoC family and the address also
    /// matter.  Addresses backed by a SoC SerDes report the SerDes id.
    pub fn probe(&self, addr: u8) -> Result<ChipHandle, RtlError> {
        let id = Phy::new(addr, &self.dispatch).read_id()?;
        ringbuf_entry!(Trace::Probe { addr, id });

        let family = self.family();
        let upper = addr >= SDS_FIRST_ADDR;
        let chip = match id {
            PHY_ID_RTL8214C => Some(Chip::Rtl8214c),
            PHY_ID_RTL8218B_E => {
                if upper && self.dispatch.soc().id != RTL8393_ID {
                    Some(Chip::Rtl8214fc)
                } else if family != Family::Rtl838x || addr < PACKAGE_PORTS
                {
                    Some(Chip::Rtl8218bExternal)
                } else {
                    None
                }
            }
            PHY_ID_RTL8218D => Some(Chip::Rtl8218d),
            PHY_ID_RTL8226 => Some(Chip::Rtl8226),
            PHY_ID_RTL8218B_I if family == Family::Rtl838x => Some(if upper {
                Chip::Rtl8380Serdes
            } else {
                Chip::Rtl8218bInternal
            }),
            PHY_ID_RTL8393_I if family == Family::Rtl839x && upper => {
                Some(Chip::Rtl8393Serdes)
            }
            PHY_ID_RTL8390_GENERIC if family == Family::Rtl839x && upper => {
                Some(Chip::Rtl8390Generic)
            }
            id if id & PHY_ID_RTL9300_MASK == PHY_ID_RTL9300_I
                && family == Family::Rtl930x
                && upper =>
            {
                Some(Chip::Rtl9300Serdes)
            }
            _ => None,
        };

        // Nothing was expected for an unknown id, so that field is zero
        chip.map(|chip| ChipHandle { addr, chip }).ok_or(
            RtlError::UnexpectedChipId {
                port: addr,
                expected: 0,
                found: id,
            },
        )
    }

    /// Brings a probed chip up.  Firmware images are fetched and checked
    /// before the chip is touched; ports that are not the first of their
    /// package succeed without any bus access.
    pub fn configure(&self, h: ChipHandle) -> Result<(), RtlError> {
        let d = &self.dispatch;
        match h.chip {
            Chip::Rtl8218bInternal if h.is_package_base() => {
                let fw = self.loader.fetch(FIRMWARE_RTL8380)?;
                Rtl8218b::init_internal(h.addr, d, fw)?;
            }
            Chip::Rtl8218bExternal
                if h.is_package_base() && self.family() == Family::Rtl838x =>
            {
                let fw = self.loader.fetch(FIRMWARE_RTL8218B)?;
                Rtl8218b::init_external(h.addr, d, fw)?;
            }
            Chip::Rtl8214fc if h.is_package_base() => {
                let fw = self.loader.fetch(FIRMWARE_RTL8214FC)?;
                Rtl8214fc::init(h.addr, d, fw)?;
            }
            Chip::Rtl8214c if h.is_package_base() => {
                rtl8214c::init(h.addr, d)?;
            }
            Chip::Rtl8380Serdes
                if h.addr == RTL8380_SDS_PATCH_ADDR
                    && d.soc().id == RTL8380M_ID =>
            {
                let fw = self.loader.fetch(FIRMWARE_RTL8380)?;
                soc_serdes::rtl8380_patch(d, fw)?;
            }
            Chip::Rtl8393Serdes => soc_serdes::rtl8390_configure(d)?,
            Chip::Rtl8390Generic => {
                Phy::new(h.addr, d).read_id()?;
            }
            Chip::Rtl9300Serdes => {
                if let Some(port) = self.serdes_port(h.addr) {
                    // Exhausted retries are traced; link state tells the rest
                    let _status = serdes930x::configure_serdes(d, port)?;
                }
            }
            _ => (),
        }
        Ok(())
    }

    fn serdes_port(&self, addr: u8) -> Option<SerdesPort> {
        self.serdes.iter().find(|p| p.port == addr).copied()
    }

    /// Reads link state.  A bus timeout is reported as link down, since
    /// callers poll this.
    pub fn read_status(&self, h: ChipHandle) -> Result<LinkStatus, RtlError> {
        match self.read_status_inner(h) {
            Err(RtlError::BusTimeout { .. }) => Ok(LinkStatus::DOWN),
            r => r,
        }
    }

    fn read_status_inner(&self, h: ChipHandle) -> Result<LinkStatus, RtlError> {
        let d = &self.dispatch;
        let phy = Phy::new(h.addr, d);
        match h.chip {
            Chip::Rtl8218bInternal | Chip::Rtl8218bExternal => {
                Rtl8218bPhy { phy }.read_status()
            }
            Chip::Rtl8214fc => Rtl8214fcPhy::new(h.addr, d).read_status(),
            Chip::Rtl8218d => Rtl8218dPhy::new(h.addr, d).read_status(),
            Chip::Rtl8226 => Rtl8226Phy::new(h.addr, d).read_status(),
            Chip::Rtl8380Serdes => soc_serdes::rtl8380_status(d, h.addr),
            Chip::Rtl8393Serdes => soc_serdes::rtl8393_status(d, h.addr),
            Chip::Rtl9300Serdes => self.rtl9300_status(h.addr),
            Chip::Rtl8214c | Chip::Rtl8390Generic => phy.read_gphy_status(),
        }
    }

    /// RTL930x lanes keep an MII-style status register on page 0; the speed
    /// is whatever the lane was configured for.
    fn rtl9300_status(&self, addr: u8) -> Result<LinkStatus, RtlError> {
        let Some(port) = self.serdes_port(addr) else {
            return Ok(LinkStatus::DOWN);
        };
        if !soc_serdes::sds_link(&self.dispatch, port.lane)? {
            return Ok(LinkStatus::DOWN);
        }
        let speed = match port.mode {
            m if m.is_10g() => Some(Speed::Speed10G),
            SerdesMode::Hsgmii | SerdesMode::Base2500X => Some(Speed::Speed2G5),
            SerdesMode::Off => None,
            _ => Some(Speed::Speed1G),
        };
        Ok(LinkStatus {
            link: true,
            speed,
            duplex: Duplex::Full,
        })
    }

    /// Runs `f` with the SoC's polling of `port` suspended.  Polling is
    /// resumed even if `f` fails; `f`'s error wins over a resume error.
    fn with_polling_disabled<T, F>(&self, port: u8, f: F) -> Result<T, RtlError>
    where
        F: FnOnce() -> Result<T, RtlError>,
    {
        let rw = self.dispatch.rw();
        let saved = self.polling.disable(rw, self.family(), port)?;
        let out = f();
        let resumed = self.polling.resume(rw, saved);
        let v = out?;
        resumed?;
        Ok(v)
    }

    pub fn get_eee(&self, h: ChipHandle) -> Result<bool, RtlError> {
        let d = &self.dispatch;
        self.with_polling_disabled(h.addr, || match h.chip {
            Chip::Rtl8218bInternal | Chip::Rtl8218bExternal => Rtl8218bPhy {
                phy: Phy::new(h.addr, d),
            }
            .get_eee(),
            Chip::Rtl8214fc => Rtl8214fcPhy::new(h.addr, d).get_eee(),
            Chip::Rtl8218d => Rtl8218dPhy::new(h.addr, d).get_eee(),
            Chip::Rtl8226 => Rtl8226Phy::new(h.addr, d).get_eee(),
            _ => Err(RtlError::UnsupportedMode),
        })
    }

    /// Enables or disables EEE advertisement.  On an RTL8214FC the port has
    /// to be on its copper side.
    pub fn set_eee(&self, h: ChipHandle, enable: bool) -> Result<(), RtlError> {
        let d = &self.dispatch;
        self.with_polling_disabled(h.addr, || match h.chip {
            Chip::Rtl8218bInternal | Chip::Rtl8218bExternal => Rtl8218bPhy {
                phy: Phy::new(h.addr, d),
            }
            .set_eee(enable),
            Chip::Rtl8214fc => Rtl8214fcPhy::new(h.addr, d).set_eee(enable),
            Chip::Rtl8218d => Rtl8218dPhy::new(h.addr, d).set_eee(enable),
            Chip::Rtl8226 => Rtl8226Phy::new(h.addr, d).set_eee(enable),
            _ => Err(RtlError::UnsupportedMode),
        })
    }

    /// Only combo ports have a choice; everything else is copper except the
    /// SoC SerDes.
    pub fn get_medium(&self, h: ChipHandle) -> Result<Medium, RtlError> {
        match h.chip {
            Chip::Rtl8214fc => {
                Rtl8214fcPhy::new(h.addr, &self.dispatch).get_medium()
            }
            Chip::Rtl8380Serdes
            | Chip::Rtl8393Serdes
            | Chip::Rtl8390Generic
            | Chip::Rtl9300Serdes => Ok(Medium::Fiber),
            _ => Ok(Medium::Copper),
        }
    }

    pub fn set_medium(
        &self,
        h: ChipHandle,
        medium: Medium,
    ) -> Result<(), RtlError> {
        if h.chip != Chip::Rtl8214fc {
            return if self.get_medium(h)? == medium {
                Ok(())
            } else {
                Err(RtlError::UnsupportedMedium { port: h.addr })
            };
        }
        let d = &self.dispatch;
        self.with_polling_disabled(h.addr, || {
            Rtl8214fcPhy::new(h.addr, d).set_medium(medium)
        })
    }
}
