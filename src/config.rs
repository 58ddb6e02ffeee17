//! Configuration.
//!
//! The backing store reads exactly one setting, `[SCSI] UseFATAllocSize`, and it does so once
//! when an image is opened. The lookup is kept out of the store: callers resolve `Options` from
//! whatever `ConfigSource` they have and hand it to `BackingStore::open`.

use std::collections::HashMap;

/// The section holding SCSI settings.
const SCSI_SECTION: &str = "SCSI";
/// The key selecting the legacy size reporting.
const FAT_ALLOC_SIZE_KEY: &str = "UseFATAllocSize";

/// A source of configuration values.
pub trait ConfigSource {
    /// Look up a boolean value.
    ///
    /// This returns `None` if the key is absent or its value is not a boolean.
    fn get_bool(&self, section: &str, key: &str) -> Option<bool>;
}

/// Options for opening images.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub struct Options {
    /// Report the FAT allocation size rather than the file size for contiguous images.
    ///
    /// Firmware 1.0.8 and 1.0.9 reported the size of the cluster allocation to the SCSI
    /// initiator. Drives formatted by those versions may have a partition table covering the
    /// slack past the end of the file, which newer firmware would cut off. Setting this restores
    /// the old behavior for such images.
    pub use_fat_alloc_size: bool,
}

impl Options {
    /// Resolve the options from a configuration source.
    pub fn from_config<C: ConfigSource + ?Sized>(config: &C) -> Options {
        Options {
            use_fat_alloc_size: config.get_bool(SCSI_SECTION, FAT_ALLOC_SIZE_KEY).unwrap_or(false),
        }
    }

    /// Preset reproducing the size reporting of firmware 1.0.8 and 1.0.9.
    pub fn legacy() -> Options {
        Options {
            use_fat_alloc_size: true,
        }
    }
}

/// A parsed INI file.
///
/// Section and key names are case-insensitive. Lines starting with `;` or `#` are comments, and
/// keys before the first section header belong to the unnamed section `""`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Ini {
    /// The values, keyed by lowercased section, then lowercased key.
    sections: HashMap<String, HashMap<String, String>>,
}

impl Ini {
    /// Parse INI text.
    ///
    /// Malformed lines are skipped.
    pub fn parse(text: &str) -> Ini {
        let mut ini = Ini::default();
        let mut section = String::new();

        for line in text.lines().map(str::trim) {
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }

            if line.starts_with('[') {
                if let Some(end) = line.find(']') {
                    section = line[1..end].trim().to_lowercase();
                }
            } else if let Some(eq) = line.find('=') {
                let key = line[..eq].trim().to_lowercase();
                // Strip trailing comments from the value.
                let value = line[eq + 1..].split(|c: char| c == ';' || c == '#').next().unwrap_or("").trim();

                ini.sections.entry(section.clone()).or_insert_with(HashMap::new)
                    .insert(key, value.to_owned());
            }
        }

        ini
    }

    /// Look up a raw value.
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections.get(&section.to_lowercase())
            .and_then(|keys| keys.get(&key.to_lowercase()))
            .map(|value| value.as_str())
    }
}

impl ConfigSource for Ini {
    fn get_bool(&self, section: &str, key: &str) -> Option<bool> {
        self.get(section, key).and_then(parse_bool)
    }
}

/// Interpret a value as a boolean, going by its first character.
fn parse_bool(value: &str) -> Option<bool> {
    match value.chars().next().map(|c| c.to_ascii_uppercase()) {
        Some('1') | Some('T') | Some('Y') => Some(true),
        Some('0') | Some('F') | Some('N') => Some(false),
        _ => None,
    }
}
