//! Filesystem collaborators.
//!
//! Images which are not raw partitions or ROM drives live as regular files on the card's FAT
//! filesystem. These traits describe what the backing store needs from the filesystem driver.

mod memory;

pub use self::memory::{Handle, Memory};

use std::io;

use crate::disk::SectorRange;

/// The mode to open a file in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Reads only.
    ReadOnly,
    /// Reads and writes.
    ReadWrite,
}

/// FAT directory entry attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Attributes(u8);

impl Attributes {
    /// The file may not be written.
    pub const READ_ONLY: u8 = 0x01;
    /// The file is hidden from listings.
    pub const HIDDEN: u8 = 0x02;
    /// The file belongs to the system.
    pub const SYSTEM: u8 = 0x04;
    /// The entry is a directory.
    pub const DIRECTORY: u8 = 0x10;
    /// The file was modified since the last backup.
    pub const ARCHIVE: u8 = 0x20;

    /// Wrap the raw attribute byte of a directory entry.
    pub fn from_bits(bits: u8) -> Attributes {
        Attributes(bits)
    }

    /// The raw attribute byte.
    pub fn bits(self) -> u8 {
        self.0
    }

    /// Is the read-only bit set?
    pub fn is_read_only(self) -> bool {
        self.0 & Attributes::READ_ONLY != 0
    }
}

/// A filesystem driver.
pub trait FileSystem {
    /// The file handle type.
    type File: File;

    /// Look up the attributes of the entry at `path`.
    fn attributes(&mut self, path: &str) -> io::Result<Attributes>;
    /// Open the file at `path`.
    fn open(&mut self, path: &str, mode: OpenMode) -> io::Result<Self::File>;
}

impl<'a, T: FileSystem + ?Sized> FileSystem for &'a mut T {
    type File = T::File;

    fn attributes(&mut self, path: &str) -> io::Result<Attributes> {
        (**self).attributes(path)
    }

    fn open(&mut self, path: &str, mode: OpenMode) -> io::Result<T::File> {
        (**self).open(path, mode)
    }
}

/// An open file.
///
/// Unlike `Disk`, files are byte-granular: offsets and lengths need not fall on sector
/// boundaries.
pub trait File {
    /// The size of the file in bytes.
    fn size(&self) -> u64;
    /// The sectors the file occupies, if they form a single contiguous run on the card.
    ///
    /// The range covers the whole allocation, which may exceed the file size rounded to sectors.
    fn contiguous_range(&self) -> Option<SectorRange>;
    /// Move the file position to byte `pos`.
    fn seek(&mut self, pos: u64) -> io::Result<()>;
    /// Read from the file position into `buf`, returning the number of bytes read.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
    /// Write `buf` at the file position, returning the number of bytes written.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;
    /// Write back any buffered data and directory entry changes.
    fn flush(&mut self) -> io::Result<()>;
    /// Close the file.
    fn close(self) -> io::Result<()>
    where Self: Sized;
    /// The current byte position.
    fn position(&self) -> u64;
}
