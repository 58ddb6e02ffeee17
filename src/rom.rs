//! ROM drives.
//!
//! A ROM drive is a read-only image baked into the onboard flash of the emulator. The region
//! starts with a one-sector header describing the image, followed by the image data itself.
//!
//! # Header layout
//!
//! All integers are little-endian.
//!
//! | offset | size | field           |
//! |--------|------|-----------------|
//! | 0      | 8    | magic number    |
//! | 8      | 8    | image size      |
//! | 16     | 4    | SCSI ID         |
//! | 20     | 4    | SCSI block size |
//! | 24     | 4    | drive type      |

use byteorder::{ByteOrder, LittleEndian};

use crate::disk::SECTOR_SIZE;

/// The magic number opening every ROM drive header.
pub const MAGIC_NUMBER: &[u8; 8] = b"ROMDRIVE";
/// The size of the header, which the image data follows.
pub const HEADER_SIZE: usize = SECTOR_SIZE;
/// The number of header bytes carrying information.
const HEADER_USED: usize = 28;

quick_error! {
    /// A ROM drive error.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Error {
        /// The region does not start with the magic number.
        BadMagic {
            display("Missing ROM drive magic number.")
            description("Missing ROM drive magic number.")
        }
        /// The region is too short for the header or the image it announces.
        Truncated {
            display("ROM drive region truncated.")
            description("ROM drive region truncated.")
        }
        /// The read exceeded the image.
        OutOfBounds {
            offset: u64,
            len: usize,
        } {
            display("Reading {} bytes at {} exceeds the ROM image.", len, offset)
            description("Read past end of ROM image.")
        }
    }
}

/// The ROM drive header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RomHeader {
    /// The size of the image in bytes.
    pub image_size: u64,
    /// The SCSI ID the image is meant to appear at.
    pub scsi_id: u32,
    /// The SCSI block size of the image.
    pub block_size: u32,
    /// The emulated device type.
    pub drive_type: u32,
}

impl RomHeader {
    /// Parse a header from the start of a ROM region.
    pub fn decode(buf: &[u8]) -> Result<RomHeader, Error> {
        if buf.len() < HEADER_USED {
            return Err(Error::Truncated);
        }
        if &buf[..8] != MAGIC_NUMBER {
            return Err(Error::BadMagic);
        }

        Ok(RomHeader {
            image_size: LittleEndian::read_u64(&buf[8..16]),
            scsi_id: LittleEndian::read_u32(&buf[16..20]),
            block_size: LittleEndian::read_u32(&buf[20..24]),
            drive_type: LittleEndian::read_u32(&buf[24..28]),
        })
    }

    /// Encode the header into its on-flash form.
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        // Unused bytes stay zero.
        let mut buf = [0; HEADER_SIZE];

        buf[..8].copy_from_slice(MAGIC_NUMBER);
        LittleEndian::write_u64(&mut buf[8..16], self.image_size);
        LittleEndian::write_u32(&mut buf[16..20], self.scsi_id);
        LittleEndian::write_u32(&mut buf[20..24], self.block_size);
        LittleEndian::write_u32(&mut buf[24..28], self.drive_type);

        buf
    }
}

/// A ROM drive driver.
pub trait RomDrive {
    /// Check for a ROM image, returning its header if one is present.
    fn header(&self) -> Option<RomHeader>;
    /// Read image data starting at byte `offset` of the image into `buf`.
    fn read(&self, offset: u64, buf: &mut [u8]) -> Result<(), Error>;
}

impl<'a, R: RomDrive + ?Sized> RomDrive for &'a R {
    fn header(&self) -> Option<RomHeader> {
        (**self).header()
    }

    fn read(&self, offset: u64, buf: &mut [u8]) -> Result<(), Error> {
        (**self).read(offset, buf)
    }
}

/// A platform without a ROM drive.
#[derive(Debug, Clone, Copy, Default)]
pub struct Absent;

impl RomDrive for Absent {
    fn header(&self) -> Option<RomHeader> {
        None
    }

    fn read(&self, offset: u64, buf: &mut [u8]) -> Result<(), Error> {
        Err(Error::OutOfBounds {
            offset: offset,
            len: buf.len(),
        })
    }
}

/// A ROM drive in memory-mapped flash.
#[derive(Debug, Clone, Copy)]
pub struct Flash<'a> {
    /// The flash region, header included.
    region: &'a [u8],
}

impl<'a> Flash<'a> {
    /// Use `region` as the ROM drive.
    pub fn new(region: &'a [u8]) -> Flash<'a> {
        Flash {
            region: region,
        }
    }

    /// Build the flash contents for an image.
    pub fn build(header: RomHeader, image: &[u8]) -> Vec<u8> {
        let mut region = header.encode().to_vec();
        region.extend_from_slice(image);
        region
    }

    /// Decode and validate the header against the region size.
    fn load_header(&self) -> Result<RomHeader, Error> {
        let header = RomHeader::decode(self.region)?;
        if (self.region.len() - HEADER_SIZE.min(self.region.len())) as u64 >= header.image_size {
            Ok(header)
        } else {
            Err(Error::Truncated)
        }
    }
}

impl<'a> RomDrive for Flash<'a> {
    fn header(&self) -> Option<RomHeader> {
        self.load_header().ok().filter(|header| header.image_size > 0)
    }

    fn read(&self, offset: u64, buf: &mut [u8]) -> Result<(), Error> {
        let header = self.load_header()?;

        let out_of_bounds = Error::OutOfBounds {
            offset: offset,
            len: buf.len(),
        };
        match offset.checked_add(buf.len() as u64) {
            Some(end) if end <= header.image_size => {
                let start = HEADER_SIZE + offset as usize;
                buf.copy_from_slice(&self.region[start..start + buf.len()]);
                Ok(())
            },
            _ => Err(out_of_bounds),
        }
    }
}
