//! In-memory disks.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::{Disk, Error, Sector, SECTOR_SIZE};

/// An in-memory card.
///
/// Clones share the same storage, so a filesystem and a raw mapping can address one card the way
/// they do on real hardware. Device failures can be injected with `set_failing`.
#[derive(Clone, Debug)]
pub struct Memory {
    /// The card contents.
    data: Rc<RefCell<Vec<u8>>>,
    /// Fail every transfer while set.
    failing: Rc<Cell<bool>>,
}

impl Memory {
    /// Create a zeroed card of `sectors` sectors.
    pub fn new(sectors: Sector) -> Memory {
        Memory {
            data: Rc::new(RefCell::new(vec![0; sectors as usize * SECTOR_SIZE])),
            failing: Rc::new(Cell::new(false)),
        }
    }

    /// Make every following transfer fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.set(failing);
    }

    /// Read bytes at byte offset `at`, ignoring sector boundaries.
    pub fn read_bytes(&self, at: u64, buf: &mut [u8]) -> Result<(), Error> {
        let start = self.check(at, buf.len())?;
        buf.copy_from_slice(&self.data.borrow()[start..start + buf.len()]);

        Ok(())
    }

    /// Write bytes at byte offset `at`, ignoring sector boundaries.
    pub fn write_bytes(&self, at: u64, buf: &[u8]) -> Result<(), Error> {
        let start = self.check(at, buf.len())?;
        self.data.borrow_mut()[start..start + buf.len()].copy_from_slice(buf);

        Ok(())
    }

    /// Validate a transfer and get its start index.
    fn check(&self, at: u64, len: usize) -> Result<usize, Error> {
        let sector = (at / SECTOR_SIZE as u64) as Sector;

        if self.failing.get() {
            return Err(Error::Hardware {
                sector: sector,
            });
        }

        if at + len as u64 > self.data.borrow().len() as u64 {
            Err(Error::OutOfBounds {
                sector: sector,
            })
        } else {
            Ok(at as usize)
        }
    }
}

impl Disk for Memory {
    fn number_of_sectors(&self) -> Sector {
        (self.data.borrow().len() / SECTOR_SIZE) as Sector
    }

    fn read(&mut self, sector: Sector, buf: &mut [u8]) -> Result<(), Error> {
        debug_assert_eq!(buf.len() % SECTOR_SIZE, 0, "Partial sector read.");

        self.read_bytes(u64::from(sector) * SECTOR_SIZE as u64, buf)
    }

    fn write(&mut self, sector: Sector, buf: &[u8]) -> Result<(), Error> {
        debug_assert_eq!(buf.len() % SECTOR_SIZE, 0, "Partial sector write.");

        self.write_bytes(u64::from(sector) * SECTOR_SIZE as u64, buf)
    }
}
