//! Declarative machine descriptions.
//!
//! A [`MachineConfig`] is an ordered list of device records. Order matters:
//! the bus resolves overlapping memory regions by declaration order, so the
//! list is kept exactly as written. Records can be built in code with the
//! `with_*` helpers or parsed from TOML with [`MachineConfig::from_toml_str`].

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default per-direction serial buffer capacity.
pub const DEFAULT_SERIAL_CAPACITY: usize = 256;

/// Size of the 16-bit memory address space.
pub const ADDRESS_SPACE_BYTES: u32 = 0x1_0000;

/// Largest accepted block drive sector, in bytes.
pub const MAX_SECTOR_SIZE: usize = 0x1_0000;

/// Ordered set of device records describing one machine.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct MachineConfig {
    /// Devices in bus priority order.
    #[serde(rename = "device", default)]
    pub devices: Vec<DeviceConfig>,
}

/// Configuration record for one device.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeviceConfig {
    /// Read-only memory region.
    Rom(MemoryConfig),
    /// Read/write memory region.
    Ram(MemoryConfig),
    /// Buffered serial port.
    Serial(SerialConfig),
    /// Interval timer raising NMI.
    Timer(TimerConfig),
    /// IDE-style block storage device.
    BlockDrive(BlockDriveConfig),
}

/// Memory region parameters shared by ROM and RAM.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MemoryConfig {
    /// Unique device name.
    pub name: String,
    /// First mapped address.
    pub base: u16,
    /// Region length in bytes.
    pub size: u32,
    /// Binary image file loaded at `base`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<PathBuf>,
    /// Inline initial contents loaded at `base`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contents: Vec<u8>,
}

impl MemoryConfig {
    /// Creates a zero-filled region description.
    #[must_use]
    pub fn new(name: impl Into<String>, base: u16, size: u32) -> Self {
        Self {
            name: name.into(),
            base,
            size,
            image: None,
            contents: Vec::new(),
        }
    }

    /// Sets inline initial contents.
    #[must_use]
    pub fn with_contents(mut self, contents: impl Into<Vec<u8>>) -> Self {
        self.contents = contents.into();
        self
    }

    /// Sets an image file to load at construction.
    #[must_use]
    pub fn with_image(mut self, path: impl Into<PathBuf>) -> Self {
        self.image = Some(path.into());
        self
    }

    /// Validates geometry and returns the initial contents, zero-padded to `size`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when the region is empty, overruns the
    /// address space, declares two content sources, or its image does not fit.
    pub fn load_contents(&self) -> Result<Vec<u8>, ConfigError> {
        if self.size == 0 {
            return Err(ConfigError::ZeroSize {
                name: self.name.clone(),
            });
        }
        if self.size > ADDRESS_SPACE_BYTES - u32::from(self.base) {
            return Err(ConfigError::RegionOutOfRange {
                name: self.name.clone(),
                base: self.base,
                size: self.size,
            });
        }

        let image = match &self.image {
            Some(_) if !self.contents.is_empty() => {
                return Err(ConfigError::ConflictingImage {
                    name: self.name.clone(),
                });
            }
            Some(path) => fs::read(path).map_err(|source| ConfigError::Io {
                path: path.clone(),
                source,
            })?,
            None => self.contents.clone(),
        };

        let size = self.size as usize;
        if image.len() > size {
            return Err(ConfigError::ImageTooLarge {
                name: self.name.clone(),
                image_len: image.len(),
                size: self.size,
            });
        }

        let mut contents = image;
        contents.resize(size, 0);
        Ok(contents)
    }
}

/// Serial port parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SerialConfig {
    /// Unique device name.
    pub name: String,
    /// Port the CPU reads to receive host input.
    pub in_port: u8,
    /// Port the CPU writes to send output to the host.
    pub out_port: u8,
    /// Port reporting whether host input is pending.
    pub ready_port: u8,
    /// Per-direction buffer capacity.
    #[serde(default = "default_serial_capacity")]
    pub capacity: usize,
}

const fn default_serial_capacity() -> usize {
    DEFAULT_SERIAL_CAPACITY
}

impl SerialConfig {
    /// Creates a serial port description with the default capacity.
    #[must_use]
    pub fn new(name: impl Into<String>, in_port: u8, out_port: u8, ready_port: u8) -> Self {
        Self {
            name: name.into(),
            in_port,
            out_port,
            ready_port,
            capacity: DEFAULT_SERIAL_CAPACITY,
        }
    }

    /// Overrides the per-direction buffer capacity.
    #[must_use]
    pub const fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Checks that the buffers can hold at least one byte.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroCapacity`] for a zero capacity.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::ZeroCapacity {
                name: self.name.clone(),
            });
        }
        Ok(())
    }
}

/// Interval timer parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TimerConfig {
    /// Unique device name.
    pub name: String,
    /// Port holding the 8-bit count register.
    pub count_port: u8,
    /// Port starting (non-zero) or stopping (zero) the timer.
    pub control_port: u8,
}

impl TimerConfig {
    /// Creates a timer description.
    #[must_use]
    pub fn new(name: impl Into<String>, count_port: u8, control_port: u8) -> Self {
        Self {
            name: name.into(),
            count_port,
            control_port,
        }
    }
}

/// Block drive parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BlockDriveConfig {
    /// Unique device name.
    pub name: String,
    /// First of the eight register ports.
    pub base_port: u8,
    /// Bytes per sector.
    pub sector_size: usize,
    /// Number of addressable sectors.
    pub num_sectors: u32,
    /// Flat sector-major image; absent means an all-zero, non-persistent drive.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backing_file: Option<PathBuf>,
}

impl BlockDriveConfig {
    /// Creates a block drive description without backing storage.
    #[must_use]
    pub fn new(name: impl Into<String>, base_port: u8, sector_size: usize, num_sectors: u32) -> Self {
        Self {
            name: name.into(),
            base_port,
            sector_size,
            num_sectors,
            backing_file: None,
        }
    }

    /// Attaches a backing image file.
    #[must_use]
    pub fn with_backing_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.backing_file = Some(path.into());
        self
    }

    /// Total capacity in bytes, or `None` when the geometry overflows `u64`.
    #[must_use]
    pub fn capacity_bytes(&self) -> Option<u64> {
        u64::try_from(self.sector_size)
            .ok()?
            .checked_mul(u64::from(self.num_sectors))
    }

    /// Checks geometry, port window, and backing file size.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for zero or oversized geometry, a register window past
    /// port `0xFF`, an unreadable backing file, or a size mismatch.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let expected = match self.capacity_bytes() {
            Some(bytes)
                if self.sector_size != 0
                    && self.sector_size <= MAX_SECTOR_SIZE
                    && self.num_sectors != 0 =>
            {
                bytes
            }
            _ => {
                return Err(ConfigError::InvalidGeometry {
                    name: self.name.clone(),
                });
            }
        };
        if self.base_port.checked_add(7).is_none() {
            return Err(ConfigError::PortOverflow {
                name: self.name.clone(),
                base_port: self.base_port,
            });
        }
        if let Some(path) = &self.backing_file {
            let actual = fs::metadata(path)
                .map_err(|source| ConfigError::Io {
                    path: path.clone(),
                    source,
                })?
                .len();
            if actual != expected {
                return Err(ConfigError::BackingFileSize {
                    name: self.name.clone(),
                    expected,
                    actual,
                });
            }
        }
        Ok(())
    }
}

impl DeviceConfig {
    /// Returns the configured device name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Rom(config) | Self::Ram(config) => &config.name,
            Self::Serial(config) => &config.name,
            Self::Timer(config) => &config.name,
            Self::BlockDrive(config) => &config.name,
        }
    }

    fn resolve_paths(&mut self, base_dir: &Path) {
        let path = match self {
            Self::Rom(config) | Self::Ram(config) => config.image.as_mut(),
            Self::BlockDrive(config) => config.backing_file.as_mut(),
            Self::Serial(_) | Self::Timer(_) => None,
        };
        if let Some(path) = path {
            if path.is_relative() {
                *path = base_dir.join(&*path);
            }
        }
    }
}

impl MachineConfig {
    /// Creates an empty machine description.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            devices: Vec::new(),
        }
    }

    /// Appends a device with lower bus priority than every device before it.
    #[must_use]
    pub fn with_device(mut self, device: DeviceConfig) -> Self {
        self.devices.push(device);
        self
    }

    /// Parses a TOML machine description.
    ///
    /// Relative file paths are left as written.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML or missing fields.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    /// Reads a TOML machine description, resolving relative image and
    /// backing-file paths against the description's directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the file cannot be read and
    /// [`ConfigError::Parse`] when it is malformed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&source)?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
        for device in &mut config.devices {
            device.resolve_paths(base_dir);
        }
        Ok(config)
    }

    /// Checks machine-wide constraints that no single device can see.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyName`] or [`ConfigError::DuplicateName`].
    pub fn validate_names(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for device in &self.devices {
            let name = device.name();
            if name.is_empty() {
                return Err(ConfigError::EmptyName);
            }
            if !seen.insert(name) {
                return Err(ConfigError::DuplicateName(name.to_string()));
            }
        }
        Ok(())
    }
}
