// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::config::SerdesPort;
use crate::rtl838x::{self, Rtl838x};
use crate::rtl839x::{self, Rtl839x};
use crate::rtl930x::Rtl930x;
use crate::rtl931x::Rtl931x;
use crate::{Delay, Family, Rtl83xxRw, SocInfo, Trace};
use ringbuf::ringbuf_entry_root as ringbuf_entry;
use rtl82xx::PhyRw;
use rtl_err::{Argument, RtlError};

/// Register access that every family provides: clause 22 and clause 45 PHY
/// registers through the SMI engine, and SerDes registers by lane.
pub trait Transport {
    fn read_phy(&self, port: u8, page: u16, reg: u8) -> Result<u16, RtlError>;

    fn write_phy(
        &self,
        port: u8,
        page: u16,
        reg: u8,
        value: u16,
    ) -> Result<(), RtlError>;

    fn read_mmd(
        &self,
        port: u8,
        devnum: u8,
        regnum: u16,
    ) -> Result<u16, RtlError>;

    fn write_mmd(
        &self,
        port: u8,
        devnum: u8,
        regnum: u16,
        value: u16,
    ) -> Result<(), RtlError>;

    /// Reads a SerDes register.  Families without SerDes paging only accept
    /// page 0.
    fn read_sds(&self, lane: u8, page: u8, reg: u8) -> Result<u16, RtlError>;

    fn write_sds(
        &self,
        lane: u8,
        page: u8,
        reg: u8,
        value: u16,
    ) -> Result<(), RtlError>;
}

enum Backend<'a, R> {
    Rtl838x(Rtl838x<'a, R>),
    Rtl839x(Rtl839x<'a, R>),
    Rtl930x(Rtl930x<'a, R>),
    Rtl931x(Rtl931x<'a, R>),
}

/// Routes register accesses to the back end of the detected SoC family.
///
/// The back end is chosen once, in [Dispatcher::new]; an unknown family is
/// rejected there, so a constructed dispatcher always has somewhere to send
/// a request.
///
/// Some PHY addresses are answered by a SoC SerDes rather than by a PHY on
/// the SMI bus.  Clause 22 accesses to those addresses go to the SerDes
/// register file instead (see [Dispatcher::sds_lane]).
pub struct Dispatcher<'a, R> {
    rw: &'a R,
    soc: SocInfo,
    family: Family,
    backend: Backend<'a, R>,
    serdes: &'a [SerdesPort],
}

impl<'a, R: Rtl83xxRw> Dispatcher<'a, R> {
    pub fn new(rw: &'a R, soc: SocInfo) -> Result<Self, RtlError> {
        let family = soc.family()?;
        ringbuf_entry!(Trace::Dispatcher(family));
        let backend = match family {
            Family::Rtl838x => Backend::Rtl838x(Rtl838x::new(rw)),
            Family::Rtl839x => Backend::Rtl839x(Rtl839x::new(rw, soc.id)),
            Family::Rtl930x => Backend::Rtl930x(Rtl930x::new(rw)),
            Family::Rtl931x => Backend::Rtl931x(Rtl931x::new(rw)),
        };
        Ok(Self {
            rw,
            soc,
            family,
            backend,
            serdes: &[],
        })
    }

    /// Attaches the board's table of SerDes lanes that sit behind PHY
    /// addresses.  Only the RTL930x and RTL931x need one; the other
    /// families have their SerDes at fixed addresses.
    pub fn with_serdes(self, serdes: &'a [SerdesPort]) -> Self {
        Self { serdes, ..self }
    }

    /// Returns the SerDes lane that answers for PHY address `port`, if that
    /// address is not a PHY on the SMI bus
    pub fn sds_lane(&self, port: u8) -> Option<u8> {
        match self.family {
            Family::Rtl838x
                if self.soc.id == rtl838x::RTL8380M_ID
                    && rtl838x::SDS_PORTS.contains(&port) =>
            {
                Some(port)
            }
            Family::Rtl839x
                if self.soc.id == rtl839x::RTL8393_ID
                    && rtl839x::SDS_PORTS.contains(&port) =>
            {
                Some(port)
            }
            Family::Rtl930x | Family::Rtl931x => self
                .serdes
                .iter()
                .find(|p| p.port == port)
                .map(|p| p.lane),
            _ => None,
        }
    }

    pub fn family(&self) -> Family {
        self.family
    }

    pub fn soc(&self) -> SocInfo {
        self.soc
    }

    /// The raw SoC register interface underneath
    pub fn rw(&self) -> &'a R {
        self.rw
    }

    fn transport(&self) -> &dyn Transport {
        match &self.backend {
            Backend::Rtl838x(t) => t,
            Backend::Rtl839x(t) => t,
            Backend::Rtl930x(t) => t,
            Backend::Rtl931x(t) => t,
        }
    }

    pub fn read_sds(
        &self,
        lane: u8,
        page: u8,
        reg: u8,
    ) -> Result<u16, RtlError> {
        self.transport().read_sds(lane, page, reg)
    }

    pub fn write_sds(
        &self,
        lane: u8,
        page: u8,
        reg: u8,
        value: u16,
    ) -> Result<(), RtlError> {
        self.transport().write_sds(lane, page, reg, value)
    }

    /// Reads bits `end..=start` of a SerDes register, shifted down.  A field
    /// covering the whole register is a plain read.
    pub fn sds_field_read(
        &self,
        lane: u8,
        page: u8,
        reg: u8,
        end: u8,
        start: u8,
    ) -> Result<u16, RtlError> {
        let mask = field_mask(end, start)?;
        let v = self.read_sds(lane, page, reg)?;
        Ok(match mask {
            Some(mask) => (v >> start) & mask,
            None => v,
        })
    }

    /// Replaces bits `end..=start` of a SerDes register with `value`,
    /// leaving the other bits alone.  A field covering the whole register is
    /// written without reading it first.
    pub fn sds_field_write(
        &self,
        lane: u8,
        page: u8,
        reg: u8,
        end: u8,
        start: u8,
        value: u16,
    ) -> Result<(), RtlError> {
        let data = match field_mask(end, start)? {
            Some(mask) => {
                let v = self.read_sds(lane, page, reg)?;
                (v & !(mask << start)) | ((value & mask) << start)
            }
            None => value,
        };
        self.write_sds(lane, page, reg, data)
    }
}

/// Returns the unshifted mask of an inclusive bit field, or `None` if the
/// field spans the whole 16-bit register.
fn field_mask(end: u8, start: u8) -> Result<Option<u16>, RtlError> {
    if end < start || end > 15 {
        return Err(Argument::Field(end, start).into());
    }
    let width = end - start + 1;
    if width >= 16 {
        Ok(None)
    } else {
        Ok(Some((1 << width) - 1))
    }
}

impl<R: Rtl83xxRw> Delay for Dispatcher<'_, R> {
    fn sleep_for(&self, ms: u32) {
        self.rw.sleep_for(ms)
    }
}

/// SerDes pages are 8 bits wide
fn sds_page(page: u16) -> Result<u8, RtlError> {
    u8::try_from(page).map_err(|_| Argument::Page(page).into())
}

impl<R: Rtl83xxRw> PhyRw for Dispatcher<'_, R> {
    fn read_raw(&self, port: u8, page: u16, reg: u8) -> Result<u16, RtlError> {
        match self.sds_lane(port) {
            Some(lane) => self.read_sds(lane, sds_page(page)?, reg),
            None => self.transport().read_phy(port, page, reg),
        }
    }

    fn write_raw(
        &self,
        port: u8,
        page: u16,
        reg: u8,
        value: u16,
    ) -> Result<(), RtlError> {
        match self.sds_lane(port) {
            Some(lane) => self.write_sds(lane, sds_page(page)?, reg, value),
            None => self.transport().write_phy(port, page, reg, value),
        }
    }

    fn read_mmd_raw(
        &self,
        port: u8,
        devnum: u8,
        regnum: u16,
    ) -> Result<u16, RtlError> {
        self.transport().read_mmd(port, devnum, regnum)
    }

    fn write_mmd_raw(
        &self,
        port: u8,
        devnum: u8,
        regnum: u16,
        value: u16,
    ) -> Result<(), RtlError> {
        self.transport().write_mmd(port, devnum, regnum, value)
    }
}
