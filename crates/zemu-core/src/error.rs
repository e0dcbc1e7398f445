use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while turning a machine description into live devices.
///
/// Every variant is produced before the first instruction executes; a
/// machine that fails validation is never constructed.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The TOML machine description could not be parsed.
    #[error("invalid machine description: {0}")]
    Parse(#[from] toml::de::Error),
    /// A file referenced by the description could not be read.
    #[error("failed to access {path}: {source}")]
    Io {
        /// File that could not be accessed.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// A device was declared with an empty name.
    #[error("device names must not be empty")]
    EmptyName,
    /// Two devices share the same name.
    #[error("duplicate device name `{0}`")]
    DuplicateName(String),
    /// A memory region was declared with zero size.
    #[error("memory region `{name}` has zero size")]
    ZeroSize {
        /// Offending device name.
        name: String,
    },
    /// A memory region extends past the 64 KiB address space.
    #[error("memory region `{name}` at {base:#06X} with size {size:#X} exceeds the address space")]
    RegionOutOfRange {
        /// Offending device name.
        name: String,
        /// Declared base address.
        base: u16,
        /// Declared size in bytes.
        size: u32,
    },
    /// Initial contents are larger than the region holding them.
    #[error("memory region `{name}` image is {image_len} bytes but region holds {size}")]
    ImageTooLarge {
        /// Offending device name.
        name: String,
        /// Length of the supplied image.
        image_len: usize,
        /// Declared region size.
        size: u32,
    },
    /// Both an image file and inline contents were supplied.
    #[error("memory region `{name}` declares both an image file and inline contents")]
    ConflictingImage {
        /// Offending device name.
        name: String,
    },
    /// A serial port was declared with zero buffer capacity.
    #[error("serial port `{name}` needs a non-zero buffer capacity")]
    ZeroCapacity {
        /// Offending device name.
        name: String,
    },
    /// A block drive was declared with zero, oversized, or overflowing geometry.
    #[error("block drive `{name}` has invalid geometry")]
    InvalidGeometry {
        /// Offending device name.
        name: String,
    },
    /// A block drive's register window does not fit the 8-bit port space.
    #[error("block drive `{name}` register window at {base_port:#04X} exceeds the port space")]
    PortOverflow {
        /// Offending device name.
        name: String,
        /// Declared first register port.
        base_port: u8,
    },
    /// A block drive's backing file does not match its declared geometry.
    #[error("block drive `{name}` backing file is {actual} bytes, expected {expected}")]
    BackingFileSize {
        /// Offending device name.
        name: String,
        /// `sector_size * num_sectors`.
        expected: u64,
        /// Size found on disk.
        actual: u64,
    },
}

/// Errors returned by host-side block drive inspection.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The requested sector or offset lies outside the drive geometry.
    #[error("sector {sector} offset {offset} is outside the drive")]
    OutOfRange {
        /// Requested sector.
        sector: u32,
        /// Requested byte offset within the sector.
        offset: usize,
    },
    /// The backing file could not be read.
    #[error("backing storage access failed: {0}")]
    Io(#[from] io::Error),
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, StorageError};

    #[test]
    fn config_error_messages_name_the_device() {
        let err = ConfigError::BackingFileSize {
            name: "drive".to_string(),
            expected: 1024,
            actual: 1000,
        };
        assert_eq!(
            err.to_string(),
            "block drive `drive` backing file is 1000 bytes, expected 1024"
        );

        let err = ConfigError::RegionOutOfRange {
            name: "ram".to_string(),
            base: 0xF000,
            size: 0x2000,
        };
        assert!(err.to_string().contains("0xF000"));
    }

    #[test]
    fn storage_error_wraps_io_failures() {
        let err: StorageError = std::io::Error::other("gone").into();
        assert!(matches!(err, StorageError::Io(_)));
        assert!(err.to_string().contains("gone"));
    }
}
