//! Raw sector mappings.

use super::Error;
use crate::disk::{Disk, Sector, SectorRange, SECTOR_SIZE};

/// A range of card sectors accessed directly, bypassing the filesystem.
///
/// All transfers are whole sectors. Callers check alignment before handing requests over.
#[derive(Debug)]
pub struct Raw<D> {
    /// The card.
    disk: D,
    /// The mapped sectors.
    range: SectorRange,
    /// The card sector the next transfer starts at.
    ///
    /// This lies within the range, or one past its end after a transfer reached the end. One past
    /// the end may not fit a `Sector`.
    cursor: u64,
}

impl<D: Disk> Raw<D> {
    /// Map `range` of `disk`, with the cursor at the start of the range.
    pub fn new(disk: D, range: SectorRange) -> Raw<D> {
        Raw {
            disk: disk,
            range: range,
            cursor: u64::from(range.begin),
        }
    }

    /// The mapped sectors.
    pub fn range(&self) -> SectorRange {
        self.range
    }

    /// The byte offset of the cursor within the mapping.
    pub fn offset(&self) -> u64 {
        (self.cursor - u64::from(self.range.begin)) * SECTOR_SIZE as u64
    }

    /// Move the cursor to sector `sector` of the mapping.
    ///
    /// The cursor is left untouched if the sector lies outside the mapping.
    pub fn seek(&mut self, sector: u64) -> Result<(), Error> {
        let target = u64::from(self.range.begin) + sector;
        if sector >= self.range.sectors() {
            return Err(Error::OutOfRange {
                offset: sector * SECTOR_SIZE as u64,
            });
        }

        self.cursor = target;
        Ok(())
    }

    /// Read whole sectors at the cursor, advancing it on success.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        let sectors = self.span(buf.len())?;
        if sectors > 0 {
            self.disk.read(self.cursor as Sector, buf)?;
            self.cursor += sectors;
        }

        Ok(buf.len())
    }

    /// Write whole sectors at the cursor, advancing it on success.
    pub fn write(&mut self, buf: &[u8]) -> Result<usize, Error> {
        let sectors = self.span(buf.len())?;
        if sectors > 0 {
            self.disk.write(self.cursor as Sector, buf)?;
            self.cursor += sectors;
        }

        Ok(buf.len())
    }

    /// Count the sectors of a transfer, making sure it stays within the mapping.
    fn span(&self, len: usize) -> Result<u64, Error> {
        debug_assert_eq!(len % SECTOR_SIZE, 0, "Partial sector raw transfer.");

        let sectors = (len / SECTOR_SIZE) as u64;
        if self.cursor + sectors > u64::from(self.range.end) + 1 {
            Err(Error::OutOfRange {
                offset: self.offset() + len as u64,
            })
        } else {
            Ok(sectors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::{self, Memory};

    fn mapping() -> (Memory, Raw<Memory>) {
        let card = Memory::new(32);
        let raw = Raw::new(card.clone(), SectorRange::new(4, 7));
        (card, raw)
    }

    #[test]
    fn seek_bounds() {
        let (_, mut raw) = mapping();

        raw.seek(3).unwrap();
        assert_eq!(raw.offset(), 3 * SECTOR_SIZE as u64);

        assert!(raw.seek(4).is_err());
        // A failed seek has no effect.
        assert_eq!(raw.offset(), 3 * SECTOR_SIZE as u64);
    }

    #[test]
    fn transfers_advance_cursor() {
        let (card, mut raw) = mapping();
        let data = [0x5A; 2 * SECTOR_SIZE];

        raw.seek(1).unwrap();
        assert_eq!(raw.write(&data).unwrap(), data.len());
        assert_eq!(raw.offset(), 3 * SECTOR_SIZE as u64);

        // The data landed at card sectors 5 and 6.
        let mut buf = [0; SECTOR_SIZE];
        card.read_bytes(6 * SECTOR_SIZE as u64, &mut buf).unwrap();
        assert!(buf.iter().all(|&x| x == 0x5A));

        raw.seek(1).unwrap();
        let mut buf = [0; 2 * SECTOR_SIZE];
        assert_eq!(raw.read(&mut buf).unwrap(), buf.len());
        assert_eq!(&buf[..], &data[..]);
    }

    #[test]
    fn transfers_stay_in_range() {
        let (_, mut raw) = mapping();
        let mut buf = [0; 2 * SECTOR_SIZE];

        raw.seek(3).unwrap();
        assert!(raw.read(&mut buf).is_err());
        assert!(raw.write(&buf).is_err());
        assert_eq!(raw.offset(), 3 * SECTOR_SIZE as u64);

        // Reading the last sector leaves the cursor one past the end.
        raw.read(&mut buf[..SECTOR_SIZE]).unwrap();
        assert_eq!(raw.offset(), 4 * SECTOR_SIZE as u64);
        assert_eq!(raw.read(&mut buf[..0]).unwrap(), 0);
        assert!(raw.read(&mut buf[..SECTOR_SIZE]).is_err());
    }

    /// A card as large as sector numbers go, discarding writes.
    struct Huge;

    impl Disk for Huge {
        fn number_of_sectors(&self) -> Sector {
            Sector::max_value()
        }

        fn read(&mut self, _: Sector, buf: &mut [u8]) -> Result<(), disk::Error> {
            for x in buf.iter_mut() {
                *x = 0;
            }
            Ok(())
        }

        fn write(&mut self, _: Sector, _: &[u8]) -> Result<(), disk::Error> {
            Ok(())
        }
    }

    #[test]
    fn last_sector_number() {
        let end = Sector::max_value();
        let mut raw = Raw::new(Huge, SectorRange::new(end - 1, end));
        let mut buf = [0; SECTOR_SIZE];

        raw.seek(1).unwrap();
        raw.write(&buf).unwrap();
        assert_eq!(raw.offset(), 2 * SECTOR_SIZE as u64);
        assert!(raw.read(&mut buf).is_err());

        raw.seek(0).unwrap();
        raw.read(&mut [0; 2 * SECTOR_SIZE]).unwrap();
        assert_eq!(raw.offset(), 2 * SECTOR_SIZE as u64);
    }

    #[test]
    fn failure_keeps_cursor() {
        let (card, mut raw) = mapping();
        let mut buf = [0; SECTOR_SIZE];

        raw.seek(2).unwrap();
        card.set_failing(true);
        match raw.read(&mut buf) {
            Err(Error::Disk(disk::Error::Hardware { sector: 6 })) => (),
            x => panic!("unexpected result {:?}", x),
        }
        assert!(raw.write(&buf).is_err());
        assert_eq!(raw.offset(), 2 * SECTOR_SIZE as u64);

        // Retrying at the same position is well-defined.
        card.set_failing(false);
        raw.read(&mut buf).unwrap();
        assert_eq!(raw.offset(), 3 * SECTOR_SIZE as u64);
    }
}
