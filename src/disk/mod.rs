//! Disk I/O
//!
//! This module provides the block device primitives the backing store is built upon.
//!
//! We fix the sector size to 512, since it is what every SD card exposes.

mod memory;

pub use self::memory::Memory;

use std::cell::RefCell;

/// The physical sector size.
pub const SECTOR_SIZE: usize = 512;

/// A disk sector number.
pub type Sector = u32;

/// Check if a byte offset or length falls on a sector boundary.
#[inline]
pub fn is_aligned(bytes: u64) -> bool {
    bytes % SECTOR_SIZE as u64 == 0
}

quick_error! {
    /// A disk I/O error.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Error {
        /// The read or write exceeded the address space of the disk.
        ///
        /// This is triggered when the sector read or written to does not exist.
        OutOfBounds {
            sector: Sector,
        } {
            display("Disk sector {} past end of disk.", sector)
            description("Disk sector past end of disk.")
        }
        /// The device reported a failure.
        ///
        /// The card did not acknowledge the transfer, timed out, or returned a bad CRC. The data
        /// in the buffer must not be trusted.
        Hardware {
            sector: Sector,
        } {
            display("Device failure at sector {}.", sector)
            description("Device failure.")
        }
    }
}

/// A closed range of sectors.
///
/// Both ends are inclusive, so the range `0..=0` addresses exactly one sector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectorRange {
    /// The first sector of the range.
    pub begin: Sector,
    /// The last sector of the range.
    pub end: Sector,
}

impl SectorRange {
    /// Create a range spanning `begin` to `end`, both inclusive.
    pub fn new(begin: Sector, end: Sector) -> SectorRange {
        SectorRange {
            begin: begin,
            end: end,
        }
    }

    /// The number of sectors in the range.
    ///
    /// An inverted range holds no sectors.
    pub fn sectors(&self) -> u64 {
        if self.end < self.begin {
            0
        } else {
            u64::from(self.end - self.begin) + 1
        }
    }

    /// The number of bytes addressed by the range.
    pub fn bytes(&self) -> u64 {
        self.sectors() * SECTOR_SIZE as u64
    }
}

/// A storage device.
///
/// This trait acts similarly to `std::io::{Read, Write}`, but is designed specifically for block
/// devices. Transfers are always a whole number of sectors; the sector count is given by the
/// length of the buffer.
pub trait Disk {
    /// The number of sectors on this disk.
    fn number_of_sectors(&self) -> Sector;
    /// Read data from the disk.
    ///
    /// This reads `buf.len() / SECTOR_SIZE` sectors starting at `sector` into `buf`.
    fn read(&mut self, sector: Sector, buf: &mut [u8]) -> Result<(), Error>;
    /// Write data to the disk.
    ///
    /// This writes `buf` into the sectors starting at `sector`.
    fn write(&mut self, sector: Sector, buf: &[u8]) -> Result<(), Error>;
}

impl<'a, D: Disk + ?Sized> Disk for &'a mut D {
    fn number_of_sectors(&self) -> Sector {
        (**self).number_of_sectors()
    }

    fn read(&mut self, sector: Sector, buf: &mut [u8]) -> Result<(), Error> {
        (**self).read(sector, buf)
    }

    fn write(&mut self, sector: Sector, buf: &[u8]) -> Result<(), Error> {
        (**self).write(sector, buf)
    }
}

/// A shared card.
///
/// Several images usually live on the same card. Accesses are sequential, so a `RefCell` is
/// enough to hand the card to each of them.
impl<'a, D: Disk> Disk for &'a RefCell<D> {
    fn number_of_sectors(&self) -> Sector {
        self.borrow().number_of_sectors()
    }

    fn read(&mut self, sector: Sector, buf: &mut [u8]) -> Result<(), Error> {
        self.borrow_mut().read(sector, buf)
    }

    fn write(&mut self, sector: Sector, buf: &[u8]) -> Result<(), Error> {
        self.borrow_mut().write(sector, buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alignment() {
        assert!(is_aligned(0));
        assert!(is_aligned(1024));
        assert!(!is_aligned(511));
        assert!(!is_aligned(513));
    }

    #[test]
    fn range_size() {
        let range = SectorRange::new(10, 999);
        assert_eq!(range.sectors(), 990);
        assert_eq!(range.bytes(), 506368);

        assert_eq!(SectorRange::new(4, 4).sectors(), 1);
        assert_eq!(SectorRange::new(5, 4).sectors(), 0);
        assert_eq!(SectorRange::new(0, Sector::max_value()).sectors(), 1 << 32);
    }

    #[test]
    fn shared_card() {
        let card = RefCell::new(Memory::new(4));
        let mut a = &card;
        let mut b = &card;

        a.write(2, &[0xAB; SECTOR_SIZE]).unwrap();

        let mut buf = [0; SECTOR_SIZE];
        b.read(2, &mut buf).unwrap();
        assert!(buf.iter().all(|&x| x == 0xAB));
        assert_eq!(b.number_of_sectors(), 4);
    }
}
