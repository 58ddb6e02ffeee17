//! Image backing stores.
//!
//! A backing store is the medium behind an emulated SCSI drive. It hides whether the image is a
//! raw range of card sectors, a file on the card's filesystem, or the ROM drive, and always picks
//! the fastest access path that can serve a request correctly.
//!
//! # The raw fast path
//!
//! Going through the filesystem driver costs cluster chain walks and buffer copies. When an image
//! file turns out to be stored contiguously, it is promoted to raw access: reads and writes go
//! straight to the card sectors of the file. This only works for sector-aligned requests, so the
//! first request with an unaligned offset or length demotes the store to filesystem access for
//! the rest of its lifetime. The file handle stays open from the start, so demotion needs no
//! setup and cannot fail halfway.

mod name;
mod raw;

use std::{io, mem};

use slog::Logger;

use self::name::Name;
use self::raw::Raw;
use crate::config::Options;
use crate::disk::{self, Disk, Sector, SectorRange, SECTOR_SIZE};
use crate::fs::{File, FileSystem, OpenMode};
use crate::rom::{self, RomDrive};

quick_error! {
    /// A backing store error.
    #[derive(Debug)]
    pub enum Error {
        /// The image name starts with `RAW:` but is not of the form `RAW:<begin>:<end>`.
        InvalidName {
            name: String,
        } {
            display("Invalid raw image name '{}'.", name)
            description("Invalid raw image name.")
        }
        /// The SCSI block size is not a whole number of sectors.
        ///
        /// Raw access cannot represent blocks finer than a card sector.
        UnsupportedBlockSize {
            block_size: u32,
        } {
            display("SCSI block size {} is not supported for raw access (must be a multiple of {} bytes).",
                    block_size, SECTOR_SIZE)
            description("Unsupported block size.")
        }
        /// The raw range starts past its end.
        InvertedRange {
            begin: Sector,
            end: Sector,
        } {
            display("Raw sector range {}-{} is empty.", begin, end)
            description("Empty raw sector range.")
        }
        /// The card reports no sectors.
        EmptyDevice {
            display("The card has no sectors.")
            description("The card has no sectors.")
        }
        /// No ROM drive image is present.
        RomNotPresent {
            display("No ROM drive image present.")
            description("No ROM drive image present.")
        }
        /// The access falls outside the image.
        OutOfRange {
            offset: u64,
        } {
            display("Byte offset {} is outside the image.", offset)
            description("Access outside the image.")
        }
        /// The image may not be written.
        WriteProtected {
            display("The image is write-protected.")
            description("The image is write-protected.")
        }
        /// The store is not open.
        Closed {
            display("The image is not open.")
            description("The image is not open.")
        }
        /// A card error.
        Disk(err: disk::Error) {
            from()
            cause(err)
            description("Card I/O error.")
            display("Card I/O error: {}", err)
        }
        /// A ROM drive error.
        Rom(err: rom::Error) {
            from()
            cause(err)
            description("ROM drive error.")
            display("ROM drive error: {}", err)
        }
        /// A filesystem error.
        File(err: io::Error) {
            from()
            cause(err)
            description("Filesystem error.")
            display("Filesystem error: {}", err)
        }
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> io::Error {
        let kind = match err {
            // Pass filesystem errors through as they are.
            Error::File(err) => return err,
            Error::WriteProtected => io::ErrorKind::PermissionDenied,
            Error::OutOfRange { .. } => io::ErrorKind::InvalidInput,
            Error::Closed => io::ErrorKind::NotConnected,
            _ => io::ErrorKind::Other,
        };

        io::Error::new(kind, err)
    }
}

/// The collaborators an image can be backed by.
///
/// Only the ones the image name selects are kept; the rest are dropped when the store opens.
pub struct Media<D, FS, R> {
    /// The card.
    pub disk: D,
    /// The card's filesystem.
    pub fs: FS,
    /// The ROM drive.
    pub rom: R,
}

/// The active backing of a store.
enum Backing<D, F, R> {
    /// A raw range of card sectors.
    Raw(Raw<D>),
    /// The ROM drive.
    Rom {
        /// The ROM drive driver.
        rom: R,
        /// The image size in bytes.
        image_size: u64,
        /// The sector the next read starts at.
        cursor: u64,
    },
    /// A file on the card's filesystem.
    File {
        /// The open handle.
        ///
        /// This is kept open even while the fast path is active, as the fallback target.
        file: F,
        /// The read-only attribute was set.
        read_only: bool,
        /// The raw mapping of the file's sectors.
        ///
        /// This goes from `Some` to `None` at most once and never back.
        fast_path: Option<Raw<D>>,
    },
    /// Not opened, or closed.
    Closed,
}

/// A sector-addressable image backing store.
///
/// Stores are used by one owner at a time; every operation blocks until the card, filesystem or
/// ROM driver returns.
pub struct BackingStore<D, F, R> {
    /// The active backing.
    backing: Backing<D, F, R>,
    /// The logger, tagged with the image name.
    log: Logger,
}

/// Can blocks of this size be accessed raw?
fn supports_block_size(block_size: u32) -> bool {
    block_size != 0 && block_size as usize % SECTOR_SIZE == 0
}

impl<D: Disk, F: File, R: RomDrive> BackingStore<D, F, R> {
    /// Open the image `name`, accessed in SCSI blocks of `block_size` bytes.
    ///
    /// If the image cannot be opened, the reason is logged and the returned store is closed
    /// (`is_open()` is `false`).
    pub fn open<FS>(name: &str, block_size: u32, options: &Options, media: Media<D, FS, R>, log: &Logger)
        -> BackingStore<D, F, R>
    where FS: FileSystem<File = F> {
        match Self::try_open(name, block_size, options, media, log) {
            Ok(store) => store,
            Err(err) => {
                warn!(log, "unable to open image"; "image" => name, "error" => %err);

                BackingStore {
                    backing: Backing::Closed,
                    log: log.new(o!("image" => name.to_owned())),
                }
            },
        }
    }

    /// Open the image `name`, returning why it could not be opened on failure.
    ///
    /// The name is classified as described in the module documentation. Files stored
    /// contiguously are promoted to raw access if `block_size` allows it.
    pub fn try_open<FS>(name: &str, block_size: u32, options: &Options, media: Media<D, FS, R>, log: &Logger)
        -> Result<BackingStore<D, F, R>, Error>
    where FS: FileSystem<File = F> {
        let log = log.new(o!("image" => name.to_owned()));
        let Media { disk, mut fs, rom } = media;

        let backing = match name::classify(name)? {
            Name::Raw { begin, end } => open_raw(disk, SectorRange::new(begin, end), block_size, &log)?,
            Name::Rom => open_rom(rom, &log)?,
            Name::File(path) => open_file(disk, &mut fs, path, block_size, options, &log)?,
        };

        Ok(BackingStore {
            backing: backing,
            log: log,
        })
    }

    /// Is the store open?
    pub fn is_open(&self) -> bool {
        match self.backing {
            Backing::Closed => false,
            _ => true,
        }
    }

    /// Does the store accept writes?
    pub fn is_writable(&self) -> bool {
        match self.backing {
            Backing::Raw(_) => true,
            Backing::File { read_only, .. } => !read_only,
            Backing::Rom { .. } | Backing::Closed => false,
        }
    }

    /// Is the store backed by the ROM drive?
    pub fn is_rom(&self) -> bool {
        match self.backing {
            Backing::Rom { .. } => true,
            _ => false,
        }
    }

    /// Are requests served by raw sector access?
    ///
    /// This holds for raw images, and for promoted files until they get demoted.
    pub fn raw_active(&self) -> bool {
        match self.backing {
            Backing::Raw(_) | Backing::File { fast_path: Some(_), .. } => true,
            _ => false,
        }
    }

    /// The size of the image in bytes.
    pub fn size(&self) -> u64 {
        match self.backing {
            Backing::Raw(ref raw) | Backing::File { fast_path: Some(ref raw), .. } => raw.range().bytes(),
            Backing::Rom { image_size, .. } => image_size,
            Backing::File { ref file, .. } => file.size(),
            Backing::Closed => 0,
        }
    }

    /// The card sectors holding the image, if they are contiguous.
    ///
    /// ROM drives report the degenerate range `0..=0`, as they have no card sectors. Demoted
    /// files ask the filesystem afresh.
    pub fn contiguous_range(&self) -> Option<SectorRange> {
        match self.backing {
            Backing::Raw(ref raw) | Backing::File { fast_path: Some(ref raw), .. } => Some(raw.range()),
            Backing::Rom { .. } => Some(SectorRange::new(0, 0)),
            Backing::File { ref file, .. } => file.contiguous_range(),
            Backing::Closed => None,
        }
    }

    /// The byte position of filesystem access.
    ///
    /// Raw and ROM access report `0`; the position is only meaningful once requests go through
    /// the filesystem.
    pub fn position(&self) -> u64 {
        match self.backing {
            Backing::File { ref file, fast_path: None, .. } => file.position(),
            _ => 0,
        }
    }

    /// Move to byte `pos` of the image.
    ///
    /// An unaligned position demotes a promoted file to filesystem access. On failure the
    /// position is left untouched.
    ///
    /// # Panics
    ///
    /// Raw images and ROM drives panic on unaligned positions.
    pub fn seek(&mut self, pos: u64) -> Result<(), Error> {
        if !disk::is_aligned(pos) {
            // The filesystem seek below replaces the position anyway.
            self.demote("offset", pos, false)?;
        }

        match self.backing {
            Backing::Raw(ref mut raw) => {
                assert!(disk::is_aligned(pos), "Unaligned seek in a raw image.");
                raw.seek(pos / SECTOR_SIZE as u64)
            },
            Backing::File { fast_path: Some(ref mut raw), .. } => raw.seek(pos / SECTOR_SIZE as u64),
            Backing::Rom { image_size, ref mut cursor, .. } => {
                assert!(disk::is_aligned(pos), "Unaligned seek in a ROM drive.");
                if pos < image_size {
                    *cursor = pos / SECTOR_SIZE as u64;
                    Ok(())
                } else {
                    Err(Error::OutOfRange {
                        offset: pos,
                    })
                }
            },
            Backing::File { ref mut file, .. } => Ok(file.seek(pos)?),
            Backing::Closed => Err(Error::Closed),
        }
    }

    /// Read `buf.len()` bytes at the current position.
    ///
    /// An unaligned length demotes a promoted file to filesystem access. Failed reads leave the
    /// position untouched, so they can be retried.
    ///
    /// # Panics
    ///
    /// Raw images and ROM drives panic on unaligned lengths.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        if !disk::is_aligned(buf.len() as u64) {
            self.demote("length", buf.len() as u64, true)?;
        }

        let res = match self.backing {
            Backing::Raw(ref mut raw) => {
                assert!(disk::is_aligned(buf.len() as u64), "Partial sector read from a raw image.");
                raw.read(buf)
            },
            Backing::File { fast_path: Some(ref mut raw), .. } => raw.read(buf),
            Backing::Rom { ref rom, ref mut cursor, .. } => {
                assert!(disk::is_aligned(buf.len() as u64), "Partial sector read from a ROM drive.");
                rom.read(*cursor * SECTOR_SIZE as u64, buf).map(|()| {
                    *cursor += (buf.len() / SECTOR_SIZE) as u64;
                    buf.len()
                }).map_err(Error::from)
            },
            Backing::File { ref mut file, .. } => file.read(buf).map_err(Error::from),
            Backing::Closed => Err(Error::Closed),
        };

        self.report(res)
    }

    /// Write `buf` at the current position.
    ///
    /// An unaligned length demotes a promoted file to filesystem access. Failed writes leave the
    /// position untouched, so they can be retried.
    ///
    /// # Panics
    ///
    /// Raw images panic on unaligned lengths.
    pub fn write(&mut self, buf: &[u8]) -> Result<usize, Error> {
        if !disk::is_aligned(buf.len() as u64) {
            self.demote("length", buf.len() as u64, true)?;
        }

        let res = match self.backing {
            Backing::Raw(ref mut raw) => {
                assert!(disk::is_aligned(buf.len() as u64), "Partial sector write to a raw image.");
                raw.write(buf)
            },
            Backing::Rom { .. } => {
                error!(self.log, "attempted to write to ROM drive");
                Err(Error::WriteProtected)
            },
            // The attribute is checked before the fast path, which would bypass it.
            Backing::File { read_only: true, .. } => {
                error!(self.log, "attempted to write to a read-only image");
                Err(Error::WriteProtected)
            },
            Backing::File { fast_path: Some(ref mut raw), .. } => raw.write(buf),
            Backing::File { ref mut file, .. } => file.write(buf).map_err(Error::from),
            Backing::Closed => Err(Error::Closed),
        };

        self.report(res)
    }

    /// Write back buffered filesystem data.
    ///
    /// Raw and ROM access buffer nothing, so this does nothing for them.
    pub fn flush(&mut self) -> Result<(), Error> {
        match self.backing {
            Backing::File { ref mut file, read_only: false, fast_path: None } => Ok(file.flush()?),
            Backing::Closed => Err(Error::Closed),
            _ => Ok(()),
        }
    }

    /// Close the store.
    ///
    /// This releases the file handle, if any, and reports whether the filesystem closed it
    /// cleanly. Closing a closed store does nothing.
    pub fn close(&mut self) -> Result<(), Error> {
        match mem::replace(&mut self.backing, Backing::Closed) {
            Backing::File { file, .. } => {
                debug!(self.log, "closing image file");
                Ok(file.close()?)
            },
            Backing::Closed => Ok(()),
            _ => {
                debug!(self.log, "releasing image");
                Ok(())
            },
        }
    }

    /// Leave the raw fast path for good.
    ///
    /// If `resync` is set, the file position is moved to where the raw cursor was, so the
    /// request continues where raw access left off. Nothing happens unless the fast path is
    /// active.
    fn demote(&mut self, cause: &'static str, value: u64, resync: bool) -> Result<(), Error> {
        if let Backing::File { ref mut file, ref mut fast_path, .. } = self.backing {
            if let Some(raw) = fast_path.take() {
                info!(self.log, "unaligned access to image, falling back to filesystem access mode";
                       "cause" => cause, "value" => value);

                if resync {
                    file.seek(raw.offset())?;
                }
            }
        }

        Ok(())
    }

    /// Log I/O failures.
    fn report(&self, res: Result<usize, Error>) -> Result<usize, Error> {
        if let Err(ref err) = res {
            match *err {
                Error::Disk(_) | Error::Rom(_) | Error::File(_) | Error::OutOfRange { .. } => {
                    warn!(self.log, "image I/O failed"; "error" => %err);
                },
                _ => (),
            }
        }

        res
    }
}

/// Map a raw range of the card.
fn open_raw<D, F, R>(disk: D, range: SectorRange, block_size: u32, log: &Logger)
    -> Result<Backing<D, F, R>, Error>
where D: Disk {
    if !supports_block_size(block_size) {
        return Err(Error::UnsupportedBlockSize {
            block_size: block_size,
        });
    }

    let sector_count = disk.number_of_sectors();
    if sector_count == 0 {
        return Err(Error::EmptyDevice);
    }

    let mut range = range;
    if range.end >= sector_count {
        warn!(log, "limiting raw image mapping to card sector count";
              "requested end" => range.end, "sector count" => sector_count);
        range.end = sector_count - 1;
    }
    // Rejected after clamping, as the clamp can invert a range starting past the card.
    if range.begin > range.end {
        return Err(Error::InvertedRange {
            begin: range.begin,
            end: range.end,
        });
    }

    debug!(log, "mapping raw sectors"; "begin" => range.begin, "end" => range.end);
    Ok(Backing::Raw(Raw::new(disk, range)))
}

/// Use the ROM drive.
fn open_rom<D, F, R>(rom: R, log: &Logger) -> Result<Backing<D, F, R>, Error>
where R: RomDrive {
    match rom.header() {
        Some(header) => {
            info!(log, "using ROM drive"; "image size" => header.image_size, "SCSI ID" => header.scsi_id);

            Ok(Backing::Rom {
                rom: rom,
                image_size: header.image_size,
                cursor: 0,
            })
        },
        None => Err(Error::RomNotPresent),
    }
}

/// Open an image file, promoting it to raw access if possible.
fn open_file<D, FS, R>(disk: D, fs: &mut FS, path: &str, block_size: u32, options: &Options, log: &Logger)
    -> Result<Backing<D, FS::File, R>, Error>
where D: Disk, FS: FileSystem {
    let read_only = fs.attributes(path)?.is_read_only();
    let mode = if read_only {
        info!(log, "image file is read-only, writes disabled");
        OpenMode::ReadOnly
    } else {
        OpenMode::ReadWrite
    };

    let mut file = fs.open(path, mode)?;
    let fast_path = promote(disk, &mut file, block_size, options, log);

    Ok(Backing::File {
        file: file,
        read_only: read_only,
        fast_path: fast_path,
    })
}

/// Try to map a file's sectors for raw access.
///
/// This succeeds if the file is stored contiguously, its extent covers its size in sectors, and
/// blocks are whole sectors.
fn promote<D: Disk, F: File>(disk: D, file: &mut F, block_size: u32, options: &Options, log: &Logger)
    -> Option<Raw<D>> {
    let nominal = file.size() / SECTOR_SIZE as u64;
    let extent = file.contiguous_range()?;

    if nominal == 0 || extent.sectors() < nominal || !supports_block_size(block_size) {
        trace!(log, "image file not eligible for raw access";
               "sectors" => nominal, "allocated" => extent.sectors());
        return None;
    }

    let mut sectors = nominal;
    if extent.sectors() > nominal && options.use_fat_alloc_size {
        info!(log, "reporting FAT allocation size for compatibility with firmware 1.0.8 and 1.0.9";
              "sectors" => nominal, "allocated" => extent.sectors());
        sectors = extent.sectors();
    }

    // Make sure the card holds everything the filesystem has buffered.
    if let Err(err) = file.flush() {
        warn!(log, "unable to flush image file, staying with filesystem access"; "error" => %err);
        return None;
    }

    // `sectors` is at most the extent size, so this stays within the extent.
    let range = SectorRange::new(extent.begin, extent.begin + (sectors - 1) as Sector);
    debug!(log, "image file is contiguous, using raw access"; "begin" => range.begin, "end" => range.end);

    Some(Raw::new(disk, range))
}

/// Reject transfers a raw image or ROM drive cannot serve.
///
/// Generic `io` code may use any buffer size, so these get an error instead of the assertion the
/// inherent methods make.
fn check_whole_sectors<D, F, R>(store: &BackingStore<D, F, R>, len: usize) -> io::Result<()> {
    match store.backing {
        Backing::Raw(_) | Backing::Rom { .. } if !disk::is_aligned(len as u64) => {
            Err(io::Error::new(io::ErrorKind::InvalidInput, "partial sector transfer"))
        },
        _ => Ok(()),
    }
}

impl<D: Disk, F: File, R: RomDrive> io::Read for BackingStore<D, F, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        check_whole_sectors(self, buf.len())?;
        Ok(BackingStore::read(self, buf)?)
    }
}

impl<D: Disk, F: File, R: RomDrive> io::Write for BackingStore<D, F, R> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        check_whole_sectors(self, buf.len())?;
        Ok(BackingStore::write(self, buf)?)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(BackingStore::flush(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::{self, Attributes};
    use std::io::{Read, Write};

    type FileStore = BackingStore<disk::Memory, fs::Handle, rom::Absent>;

    fn log() -> Logger {
        Logger::root(slog::Discard, o!())
    }

    /// A card with `hd0.img` (3 sectors in a 4-sector extent) and a fragmented `frag.img`.
    fn setup() -> (disk::Memory, fs::Memory) {
        let card = disk::Memory::new(64);
        let mut fs = fs::Memory::new(card.clone(), 16);

        let contents: Vec<u8> = (0..3 * SECTOR_SIZE).map(|x| (x / SECTOR_SIZE) as u8 + 1).collect();
        fs.create("hd0.img", &contents, 4).unwrap();
        fs.create("frag.img", &contents, 3).unwrap();
        fs.fragment("frag.img").unwrap();

        (card, fs)
    }

    fn open(name: &str, block_size: u32, options: &Options, card: &disk::Memory, fs: &mut fs::Memory) -> FileStore {
        BackingStore::open(name, block_size, options, Media {
            disk: card.clone(),
            fs: fs,
            rom: rom::Absent,
        }, &log())
    }

    #[test]
    fn promotion() {
        let (card, mut fs) = setup();
        let store = open("hd0.img", 512, &Options::default(), &card, &mut fs);

        assert!(store.is_open());
        assert!(store.raw_active());
        assert!(store.is_writable());
        assert!(!store.is_rom());
        assert_eq!(store.contiguous_range(), Some(SectorRange::new(16, 18)));
        assert_eq!(store.size(), 3 * SECTOR_SIZE as u64);
        // The handle was flushed before the card got accessed behind its back.
        assert_eq!(fs.flushes("hd0.img").unwrap(), 1);
    }

    #[test]
    fn promotion_requirements() {
        let (card, mut fs) = setup();

        let store = open("frag.img", 512, &Options::default(), &card, &mut fs);
        assert!(store.is_open());
        assert!(!store.raw_active());
        assert_eq!(store.contiguous_range(), None);

        // 256-byte blocks cannot be expressed in sectors.
        let store = open("hd0.img", 256, &Options::default(), &card, &mut fs);
        assert!(store.is_open());
        assert!(!store.raw_active());

        // Files smaller than a sector are never mapped.
        fs.create("tiny.img", b"tiny", 1).unwrap();
        let store = open("tiny.img", 512, &Options::default(), &card, &mut fs);
        assert!(!store.raw_active());
        assert_eq!(store.size(), 4);
    }

    #[test]
    fn legacy_allocation_size() {
        let (card, mut fs) = setup();

        let store = open("hd0.img", 512, &Options::legacy(), &card, &mut fs);
        assert_eq!(store.size(), 4 * SECTOR_SIZE as u64);
        assert_eq!(store.contiguous_range(), Some(SectorRange::new(16, 19)));
    }

    #[test]
    fn demotion_resyncs_position() {
        let (card, mut fs) = setup();
        let mut store = open("hd0.img", 512, &Options::default(), &card, &mut fs);

        // Move the raw cursor to the second sector, then read with an unaligned length.
        store.seek(512).unwrap();
        assert_eq!(store.position(), 0);
        let mut buf = [0; 100];
        assert_eq!(store.read(&mut buf).unwrap(), 100);

        assert!(!store.raw_active());
        assert!(buf.iter().all(|&x| x == 2));
        assert_eq!(store.position(), 612);
        // The filesystem is authoritative now, and reports the whole allocation.
        assert_eq!(store.contiguous_range(), Some(SectorRange::new(16, 19)));
    }

    #[test]
    fn demotion_is_permanent() {
        let (card, mut fs) = setup();
        let mut store = open("hd0.img", 512, &Options::default(), &card, &mut fs);

        store.seek(1).unwrap();
        assert!(!store.raw_active());
        assert_eq!(store.position(), 1);

        // Aligned requests stay on the filesystem path.
        store.seek(1024).unwrap();
        let mut buf = [0; 512];
        store.read(&mut buf).unwrap();
        assert!(!store.raw_active());
        assert_eq!(store.position(), 1536);
    }

    #[test]
    fn unaligned_write_goes_through_filesystem() {
        let (card, mut fs) = setup();
        let mut store = open("hd0.img", 512, &Options::default(), &card, &mut fs);

        store.seek(1024).unwrap();
        assert_eq!(store.write(b"abc").unwrap(), 3);
        assert!(!store.raw_active());

        let mut buf = [0; 3];
        card.read_bytes(18 * SECTOR_SIZE as u64, &mut buf).unwrap();
        assert_eq!(&buf, b"abc");
    }

    #[test]
    fn flush_only_on_filesystem_path() {
        let (card, mut fs) = setup();
        let mut store = open("hd0.img", 512, &Options::default(), &card, &mut fs);

        store.flush().unwrap();
        assert_eq!(fs.flushes("hd0.img").unwrap(), 1);

        store.seek(3).unwrap();
        store.flush().unwrap();
        assert_eq!(fs.flushes("hd0.img").unwrap(), 2);

        fs.set_attributes("frag.img", Attributes::from_bits(Attributes::READ_ONLY)).unwrap();
        let mut store = open("frag.img", 512, &Options::default(), &card, &mut fs);
        store.flush().unwrap();
        assert_eq!(fs.flushes("frag.img").unwrap(), 0);
    }

    #[test]
    fn read_only_fast_path_rejects_writes() {
        let (card, mut fs) = setup();
        fs.set_attributes("hd0.img", Attributes::from_bits(Attributes::READ_ONLY)).unwrap();
        let mut store = open("hd0.img", 512, &Options::default(), &card, &mut fs);

        assert!(store.raw_active());
        assert!(!store.is_writable());
        match store.write(&[0; 512]) {
            Err(Error::WriteProtected) => (),
            x => panic!("unexpected result {:?}", x),
        }

        let mut buf = [0; 512];
        store.seek(0).unwrap();
        store.read(&mut buf).unwrap();
        assert!(buf.iter().all(|&x| x == 1));
    }

    #[test]
    fn missing_file() {
        let (card, mut fs) = setup();
        let store = open("nope.img", 512, &Options::default(), &card, &mut fs);

        assert!(!store.is_open());
        assert!(!store.is_writable());
        assert_eq!(store.size(), 0);
        assert_eq!(store.contiguous_range(), None);
    }

    #[test]
    fn try_open_reports_reason() {
        let (card, mut fs) = setup();
        let res: Result<FileStore, Error> = BackingStore::try_open("RAW:1:2", 1000, &Options::default(), Media {
            disk: card.clone(),
            fs: &mut fs,
            rom: rom::Absent,
        }, &log());

        match res {
            Err(Error::UnsupportedBlockSize { block_size: 1000 }) => (),
            Err(err) => panic!("unexpected error {}", err),
            Ok(_) => panic!("opened with a bad block size"),
        }
    }

    #[test]
    fn close() {
        let (card, mut fs) = setup();
        let mut store = open("hd0.img", 512, &Options::default(), &card, &mut fs);

        store.close().unwrap();
        assert!(!store.is_open());
        assert!(!store.raw_active());
        store.close().unwrap();

        let mut buf = [0; 512];
        match store.read(&mut buf) {
            Err(Error::Closed) => (),
            x => panic!("unexpected result {:?}", x),
        }
        assert!(store.seek(0).is_err());
        assert!(store.flush().is_err());
    }

    #[test]
    fn io_traits() {
        let (card, mut fs) = setup();
        let mut store = open("frag.img", 512, &Options::default(), &card, &mut fs);

        store.write_all(b"hello").unwrap();
        Write::flush(&mut store).unwrap();
        store.seek(0).unwrap();

        let mut buf = [0; 5];
        store.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");

        store.close().unwrap();
        let err = Read::read(&mut store, &mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);
    }

    #[test]
    fn error_kinds() {
        let err: io::Error = Error::WriteProtected.into();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);

        let err: io::Error = Error::OutOfRange { offset: 3 }.into();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);

        let err: io::Error = Error::File(io::Error::new(io::ErrorKind::NotFound, "gone")).into();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);

        let err: io::Error = Error::Disk(disk::Error::Hardware { sector: 1 }).into();
        assert_eq!(err.kind(), io::ErrorKind::Other);
    }
}
