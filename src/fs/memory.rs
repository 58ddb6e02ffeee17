//! An in-memory FAT-like filesystem.
//!
//! Files are allocated in whole sectors on a shared `disk::Memory`, so a raw mapping of a file's
//! extent sees exactly the bytes the filesystem reads and writes.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io;
use std::rc::Rc;

use super::{Attributes, File, FileSystem, OpenMode};
use crate::disk::{self, Disk, Sector, SectorRange, SECTOR_SIZE};

/// A directory entry.
#[derive(Debug)]
struct Node {
    /// The allocated sectors.
    extent: SectorRange,
    /// The file size in bytes.
    size: u64,
    /// The attribute byte.
    attributes: Attributes,
    /// Pretend the clusters are scattered, so no contiguous range is reported.
    fragmented: bool,
    /// The number of flushes issued through handles.
    flushes: usize,
}

/// An in-memory filesystem on top of a card.
#[derive(Debug)]
pub struct Memory {
    /// The card the files are allocated on.
    card: disk::Memory,
    /// The directory, keyed by lowercased path.
    files: HashMap<String, Rc<RefCell<Node>>>,
    /// The next unallocated sector.
    next_free: Sector,
}

impl Memory {
    /// Create an empty filesystem allocating from sector `first_data_sector` of `card` onwards.
    pub fn new(card: disk::Memory, first_data_sector: Sector) -> Memory {
        Memory {
            card: card,
            files: HashMap::new(),
            next_free: first_data_sector,
        }
    }

    /// Create a file holding `contents` in a fresh run of `allocated` sectors.
    pub fn create(&mut self, path: &str, contents: &[u8], allocated: Sector) -> io::Result<()> {
        if contents.len() as u64 > u64::from(allocated) * SECTOR_SIZE as u64 {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "contents exceed allocation"));
        }
        if allocated == 0 || u64::from(self.next_free) + u64::from(allocated) > u64::from(self.card.number_of_sectors()) {
            return Err(io::Error::new(io::ErrorKind::Other, "no free clusters"));
        }

        let extent = SectorRange::new(self.next_free, self.next_free + allocated - 1);
        self.card.write_bytes(u64::from(extent.begin) * SECTOR_SIZE as u64, contents).map_err(to_io)?;
        self.next_free += allocated;

        self.files.insert(path.to_lowercase(), Rc::new(RefCell::new(Node {
            extent: extent,
            size: contents.len() as u64,
            attributes: Attributes::from_bits(Attributes::ARCHIVE),
            fragmented: false,
            flushes: 0,
        })));

        Ok(())
    }

    /// Replace the attribute byte of a file.
    pub fn set_attributes(&mut self, path: &str, attributes: Attributes) -> io::Result<()> {
        self.node(path)?.borrow_mut().attributes = attributes;
        Ok(())
    }

    /// Mark a file as scattered over several cluster runs.
    pub fn fragment(&mut self, path: &str) -> io::Result<()> {
        self.node(path)?.borrow_mut().fragmented = true;
        Ok(())
    }

    /// The allocated sectors of a file, regardless of fragmentation.
    pub fn extent(&self, path: &str) -> io::Result<SectorRange> {
        Ok(self.node(path)?.borrow().extent)
    }

    /// The number of flushes issued on a file so far.
    pub fn flushes(&self, path: &str) -> io::Result<usize> {
        Ok(self.node(path)?.borrow().flushes)
    }

    fn node(&self, path: &str) -> io::Result<&Rc<RefCell<Node>>> {
        self.files.get(&path.to_lowercase())
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such file"))
    }
}

impl FileSystem for Memory {
    type File = Handle;

    fn attributes(&mut self, path: &str) -> io::Result<Attributes> {
        Ok(self.node(path)?.borrow().attributes)
    }

    fn open(&mut self, path: &str, mode: OpenMode) -> io::Result<Handle> {
        Ok(Handle {
            card: self.card.clone(),
            node: self.node(path)?.clone(),
            mode: mode,
            position: 0,
        })
    }
}

/// An open file of a `Memory` filesystem.
#[derive(Debug)]
pub struct Handle {
    /// The card holding the data.
    card: disk::Memory,
    /// The directory entry.
    node: Rc<RefCell<Node>>,
    /// The mode the file was opened in.
    mode: OpenMode,
    /// The byte position.
    position: u64,
}

impl Handle {
    /// The card byte address of the file position.
    fn address(&self) -> u64 {
        u64::from(self.node.borrow().extent.begin) * SECTOR_SIZE as u64 + self.position
    }
}

impl File for Handle {
    fn size(&self) -> u64 {
        self.node.borrow().size
    }

    fn contiguous_range(&self) -> Option<SectorRange> {
        let node = self.node.borrow();
        if node.fragmented {
            None
        } else {
            Some(node.extent)
        }
    }

    fn seek(&mut self, pos: u64) -> io::Result<()> {
        if pos > self.size() {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "seek past end of file"));
        }

        self.position = pos;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let len = buf.len().min((self.size() - self.position) as usize);
        self.card.read_bytes(self.address(), &mut buf[..len]).map_err(to_io)?;
        self.position += len as u64;

        Ok(len)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.mode == OpenMode::ReadOnly {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "file opened read-only"));
        }

        // Files never grow past their allocation.
        let capacity = self.node.borrow().extent.bytes();
        let len = buf.len().min((capacity - self.position) as usize);
        self.card.write_bytes(self.address(), &buf[..len]).map_err(to_io)?;
        self.position += len as u64;

        let mut node = self.node.borrow_mut();
        node.size = node.size.max(self.position);

        Ok(len)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.node.borrow_mut().flushes += 1;
        Ok(())
    }

    fn close(self) -> io::Result<()> {
        Ok(())
    }

    fn position(&self) -> u64 {
        self.position
    }
}

fn to_io(err: disk::Error) -> io::Error {
    io::Error::new(io::ErrorKind::Other, err)
}
