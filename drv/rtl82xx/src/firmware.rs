// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Patch firmware container
//!
//! Realtek distributes PHY patches as a single binary per chip: a 56-byte
//! header followed by up to ten regions, each of which is a list of 32-bit
//! words.  All multi-byte fields are big-endian (the SoCs are MIPS BE).
//!
//! ```text
//!  0: magic (0x83808380)
//!  4: target chip tag
//!  8: checksum, ~CRC32 over the image with this field zeroed
//! 12: version
//! 16: region table, 10 x { start: u16, word_size: u8, words: u8 }
//! 56: body
//! ```
//!
//! A region's `start` is relative to the body; its length is implied by the
//! next larger start, or the end of the image.

use crate::Trace;
use ringbuf::ringbuf_entry_root;
use rtl_err::{Argument, FirmwareError, RtlError};
use static_assertions::const_assert_eq;
use zerocopy::byteorder::big_endian::{U16, U32};
use zerocopy::FromBytes;

pub const FIRMWARE_MAGIC: u32 = 0x8380_8380;

/// Target tags carried in the header's `phy` field
pub const TARGET_RTL8380: u32 = 0x8380_0000;
pub const TARGET_RTL8218B: u32 = 0x8218_b000;
pub const TARGET_RTL8214FC: u32 = 0x8214_fc00;

/// Image names, as handed to a [FirmwareLoader]
pub const FIRMWARE_RTL8380: &str = "rtl838x_phy/rtl838x_8380.fw";
pub const FIRMWARE_RTL8218B: &str = "rtl838x_phy/rtl838x_8218b.fw";
pub const FIRMWARE_RTL8214FC: &str = "rtl838x_phy/rtl838x_8214fc.fw";

pub const REGION_COUNT: usize = 10;
const CHECKSUM_OFFSET: usize = 8;

static CRC: crc::Crc<u32> = crc::Crc::<u32>::new(&crc::CRC_32_ISO_HDLC);

#[derive(
    Copy,
    Clone,
    Debug,
    zerocopy_derive::FromBytes,
    zerocopy_derive::KnownLayout,
    zerocopy_derive::Immutable,
    zerocopy_derive::Unaligned,
)]
#[repr(C)]
pub struct RegionDescriptor {
    pub start: U16,
    pub word_size: u8,
    pub words: u8,
}

#[derive(
    Copy,
    Clone,
    Debug,
    zerocopy_derive::FromBytes,
    zerocopy_derive::KnownLayout,
    zerocopy_derive::Immutable,
    zerocopy_derive::Unaligned,
)]
#[repr(C)]
pub struct FirmwareHeader {
    pub magic: U32,
    pub phy: U32,
    pub checksum: U32,
    pub version: U32,
    pub parts: [RegionDescriptor; REGION_COUNT],
}

pub const HEADER_SIZE: usize = core::mem::size_of::<FirmwareHeader>();
const_assert_eq!(HEADER_SIZE, 56);

/// Computes the checksum that belongs in the header of `image`, treating the
/// checksum field itself as zero.  The image is not modified.
pub fn checksum(image: &[u8]) -> u32 {
    let split = CHECKSUM_OFFSET.min(image.len());
    let rest = image.get(CHECKSUM_OFFSET + 4..).unwrap_or(&[]);

    let mut c = CRC.digest();
    c.update(&image[..split]);
    c.update(&[0; 4]);
    c.update(rest);
    c.finalize()
}

/// Source of firmware bytes, provided by the environment.  Images are
/// borrowed for the duration of one configure call.
pub trait FirmwareLoader {
    fn fetch(&self, name: &str) -> Result<&[u8], RtlError>;
}

/// A validated view over a firmware blob
#[derive(Copy, Clone, Debug)]
pub struct FirmwareImage<'a> {
    header: &'a FirmwareHeader,
    body: &'a [u8],
}

impl<'a> FirmwareImage<'a> {
    /// Checks length, magic and checksum, and that every region starts
    /// inside the image
    pub fn parse(bytes: &'a [u8]) -> Result<Self, RtlError> {
        let (header, body) = FirmwareHeader::ref_from_prefix(bytes)
            .map_err(|_| FirmwareError::TooSmall)?;

        let magic = header.magic.get();
        if magic != FIRMWARE_MAGIC {
            return Err(FirmwareError::MagicMismatch(magic).into());
        }

        let stored = header.checksum.get();
        let computed = checksum(bytes);
        if stored != computed {
            return Err(
                FirmwareError::ChecksumMismatch { stored, computed }.into()
            );
        }

        for (i, part) in header.parts.iter().enumerate() {
            if usize::from(part.start.get()) > body.len() {
                return Err(FirmwareError::RegionOutOfBounds(i as u8).into());
            }
        }

        Ok(Self { header, body })
    }

    /// Parses the image and checks that it was built for `target`
    pub fn parse_for(bytes: &'a [u8], target: u32) -> Result<Self, RtlError> {
        let image = Self::parse(bytes)?;
        image.check_target(target)?;
        ringbuf_entry_root!(Trace::FirmwareAccepted {
            target,
            version: image.version()
        });
        Ok(image)
    }

    pub fn check_target(&self, expected: u32) -> Result<(), RtlError> {
        let found = self.target();
        if found != expected {
            return Err(
                FirmwareError::TargetMismatch { expected, found }.into()
            );
        }
        Ok(())
    }

    pub fn target(&self) -> u32 {
        self.header.phy.get()
    }

    pub fn version(&self) -> u32 {
        self.header.version.get()
    }

    /// Returns the bytes of region `index`, borrowed from the image
    pub fn region(&self, index: usize) -> Result<&'a [u8], RtlError> {
        let part = self
            .header
            .parts
            .get(index)
            .ok_or(Argument::Register(index as u16))?;
        let start = usize::from(part.start.get());
        let end = self
            .header
            .parts
            .iter()
            .map(|p| usize::from(p.start.get()))
            .filter(|&s| s > start)
            .min()
            .unwrap_or(self.body.len());

        // Both ends were checked against the body in `parse`
        Ok(&self.body[start..end])
    }

    /// Region `index` read as `(register, value)` pairs
    pub fn pairs(&self, index: usize) -> Result<Pairs<'a>, RtlError> {
        Ok(Entries::new(self.region(index)?))
    }

    /// Region `index` read as `(port offset, register, value)` triples
    pub fn triples(&self, index: usize) -> Result<Triples<'a>, RtlError> {
        Ok(Entries::new(self.region(index)?))
    }
}

/// Iterator over fixed-size entries of a write list.
///
/// Iteration ends at the first entry whose address words (every word but
/// the last) are all zero, or when the region runs out.  The sentinel itself
/// is never yielded.
///
/// The value word plays no part: a triple `(0, 0, v)` ends the list for any
/// `v`, while `(0, reg, v)` with a non-zero register is a write to the base
/// port of the package.
#[derive(Clone, Debug)]
pub struct Entries<'a, const N: usize> {
    words: &'a [U32],
}

pub type Pairs<'a> = Entries<'a, 2>;
pub type Triples<'a> = Entries<'a, 3>;

impl<'a, const N: usize> Entries<'a, N> {
    pub fn new(region: &'a [u8]) -> Self {
        let whole = region.len() - region.len() % 4;
        let words = <[U32]>::ref_from_bytes(&region[..whole]).unwrap_or(&[]);
        Self { words }
    }
}

impl<const N: usize> Iterator for Entries<'_, N> {
    type Item = [u32; N];

    fn next(&mut self) -> Option<[u32; N]> {
        if N == 0 || self.words.len() < N {
            return None;
        }
        let (head, rest) = self.words.split_at(N);

        let mut entry = [0; N];
        for (e, w) in entry.iter_mut().zip(head) {
            *e = w.get();
        }
        if entry[..N - 1].iter().all(|&w| w == 0) {
            self.words = &[];
            return None;
        }

        self.words = rest;
        Some(entry)
    }
}
