// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! This crate provides an error type that is used by the Realtek PHY and
//! switch SoC drivers.  It is factored into its own crate so that it can be
//! used by both `drv/rtl82xx` and `drv/rtl83xx` without either one pulling in
//! the other's dependencies.

#![no_std]

/// Reasons a firmware image can be rejected
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FirmwareError {
    /// The image is shorter than its own header
    TooSmall,
    /// The header magic is not `0x83808380`; carries what was found
    MagicMismatch(u32),
    ChecksumMismatch {
        stored: u32,
        computed: u32,
    },
    /// The image was built for a different chip
    TargetMismatch {
        expected: u32,
        found: u32,
    },
    /// A region descriptor points past the end of the image
    RegionOutOfBounds(u8),
}

/// Argument that failed a range or alignment check before any bus access
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Argument {
    Port(u8),
    Lane(u8),
    Page(u16),
    Register(u16),
    /// Bit field `(end, start)` that is reversed or past bit 15
    Field(u8, u8),
    /// Patches must be applied from the first port of a PHY package
    BaseAddress(u8),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RtlError {
    /// The start bit of a command register at `addr` never cleared
    BusTimeout {
        addr: u32,
    },
    /// The SMI engine flagged a failed write
    SmiWriteFailed {
        port: u8,
    },
    UnsupportedFamily(u32),

    FirmwareInvalid(FirmwareError),
    FirmwareNotFound,

    UnexpectedChipId {
        port: u8,
        expected: u32,
        found: u32,
    },
    /// A port never reported patch-ready: 100 polls of the ready bit, 1 ms
    /// apart, so roughly a 100 ms budget per port
    PatchNotReady {
        port: u8,
    },
    /// A PHY or SerDes did not come up within its wait budget
    PhyInitTimeout {
        port: u8,
    },

    InvalidArgument(Argument),

    /// EEE is only available on the copper side of a combo port
    UnsupportedMedium {
        port: u8,
    },
    UnsupportedMode,
}

impl From<FirmwareError> for RtlError {
    fn from(e: FirmwareError) -> Self {
        Self::FirmwareInvalid(e)
    }
}

impl From<Argument> for RtlError {
    fn from(a: Argument) -> Self {
        Self::InvalidArgument(a)
    }
}
