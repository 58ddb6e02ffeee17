//! Image backing stores for SCSI disk emulation.
//!
//! An emulated SCSI drive is backed by an image which may live in one of three places: a raw
//! range of sectors on the SD card, a file on the card's FAT filesystem, or a ROM drive in
//! onboard flash. `BackingStore` presents all of them through one sector-addressable interface,
//! and transparently uses direct sector access for files which are stored contiguously.
//!
//! The card, filesystem and ROM drivers are collaborators described by the traits in `disk`,
//! `fs` and `rom`. In-memory implementations are provided for hosted use and testing.

#[macro_use]
extern crate slog;
#[macro_use]
extern crate quick_error;
extern crate byteorder;

pub mod config;
pub mod disk;
pub mod fs;
pub mod rom;
mod store;

pub use config::Options;
pub use store::{BackingStore, Error, Media};
