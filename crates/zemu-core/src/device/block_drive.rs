//! Minimal IDE-style block storage device.
//!
//! Eight registers starting at `base_port`:
//!
//! | offset | read               | write               |
//! |--------|--------------------|---------------------|
//! | 0      | data               | data                |
//! | 1      | error (always 0)   | ignored             |
//! | 2      | sector count (0)   | ignored             |
//! | 3..=6  | LBA byte 0..3      | LBA byte 0..3       |
//! | 7      | status             | command             |
//!
//! LBA bytes are least-significant first; byte 3 keeps its low five bits.
//! The backing file is opened for each sector transfer and closed again.

use std::fs::OpenOptions;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use log::{debug, error, warn};

use super::Device;
use crate::config::BlockDriveConfig;
use crate::error::{ConfigError, StorageError};

/// Status bit: drive ready to accept a command.
pub const STATUS_COMMAND_READY: u8 = 0x40;
/// Status bit: data register holds or expects sector data.
pub const STATUS_DATA_READY: u8 = 0x08;
/// Command register value starting a sector read.
pub const COMMAND_READ_SECTOR: u8 = 0x20;
/// Command register value starting a sector write.
pub const COMMAND_WRITE_SECTOR: u8 = 0x30;

const REG_DATA: u8 = 0;
const REG_ERROR: u8 = 1;
const REG_SECTOR_COUNT: u8 = 2;
const REG_LBA0: u8 = 3;
const REG_LBA3: u8 = 6;
const REG_STATUS_COMMAND: u8 = 7;
const LBA_HIGH_MASK: u8 = 0x1F;

/// Direction of the sector transfer in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransferMode {
    /// No command has been issued since power-on or reset.
    #[default]
    Uninitialized,
    /// Data register reads stream the loaded sector.
    Read,
    /// Data register writes fill the sector buffer.
    Write,
}

/// Block drive device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockDrive {
    name: String,
    base_port: u8,
    sector_size: usize,
    num_sectors: u32,
    backing_file: Option<PathBuf>,
    lba: [u8; 4],
    mode: TransferMode,
    status: u8,
    sector_buffer: Vec<u8>,
    buffer_offset: usize,
}

impl BlockDrive {
    /// Creates a drive from a configuration record.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for invalid geometry, a register window past
    /// port `0xFF`, or a backing file whose size does not match the geometry.
    pub fn from_config(config: &BlockDriveConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            name: config.name.clone(),
            base_port: config.base_port,
            sector_size: config.sector_size,
            num_sectors: config.num_sectors,
            backing_file: config.backing_file.clone(),
            lba: [0; 4],
            mode: TransferMode::Uninitialized,
            status: STATUS_COMMAND_READY,
            sector_buffer: vec![0; config.sector_size],
            buffer_offset: 0,
        })
    }

    /// Bytes per sector.
    #[must_use]
    pub const fn sector_size(&self) -> usize {
        self.sector_size
    }

    /// Number of addressable sectors.
    #[must_use]
    pub const fn num_sectors(&self) -> u32 {
        self.num_sectors
    }

    /// Backing image path, if any.
    #[must_use]
    pub fn backing_file(&self) -> Option<&Path> {
        self.backing_file.as_deref()
    }

    /// Logical block address assembled from the four LBA registers.
    #[must_use]
    pub const fn lba(&self) -> u32 {
        u32::from_le_bytes(self.lba)
    }

    /// Current status register.
    #[must_use]
    pub const fn status(&self) -> u8 {
        self.status
    }

    /// Current transfer mode.
    #[must_use]
    pub const fn mode(&self) -> TransferMode {
        self.mode
    }

    /// Reads one byte straight from backing storage, bypassing the registers.
    ///
    /// A drive without a backing file reads as all zeros.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::OutOfRange`] outside the drive geometry and
    /// [`StorageError::Io`] when the backing file cannot be read.
    pub fn read_byte(&self, sector: u32, offset: usize) -> Result<u8, StorageError> {
        if sector >= self.num_sectors || offset >= self.sector_size {
            return Err(StorageError::OutOfRange { sector, offset });
        }
        let Some(path) = &self.backing_file else {
            return Ok(0);
        };
        let mut file = OpenOptions::new().read(true).open(path)?;
        file.seek(SeekFrom::Start(self.byte_offset(sector) + offset as u64))?;
        let mut byte = [0u8; 1];
        file.read_exact(&mut byte)?;
        Ok(byte[0])
    }

    fn byte_offset(&self, sector: u32) -> u64 {
        u64::from(sector) * self.sector_size as u64
    }

    fn load_sector(&self, sector: u32, buffer: &mut [u8]) -> io::Result<()> {
        buffer.fill(0);
        let Some(path) = &self.backing_file else {
            return Ok(());
        };
        let mut file = OpenOptions::new().read(true).open(path)?;
        file.seek(SeekFrom::Start(self.byte_offset(sector)))?;
        file.read_exact(buffer)
    }

    fn store_sector(&self, sector: u32, buffer: &[u8]) -> io::Result<()> {
        let Some(path) = &self.backing_file else {
            return Ok(());
        };
        let mut file = OpenOptions::new().write(true).open(path)?;
        file.seek(SeekFrom::Start(self.byte_offset(sector)))?;
        file.write_all(buffer)?;
        file.flush()
    }

    fn command_write(&mut self, command: u8) {
        match command {
            COMMAND_READ_SECTOR => {
                let lba = self.lba();
                debug!("{}: read sector {lba}", self.name);
                let mut buffer = std::mem::take(&mut self.sector_buffer);
                if lba < self.num_sectors {
                    if let Err(err) = self.load_sector(lba, &mut buffer) {
                        error!("{}: failed to read sector {lba}: {err}", self.name);
                    }
                } else {
                    warn!("{}: read of sector {lba} past end of drive", self.name);
                    buffer.fill(0);
                }
                self.sector_buffer = buffer;
                self.begin_transfer(TransferMode::Read);
            }
            COMMAND_WRITE_SECTOR => {
                debug!("{}: write sector {}", self.name, self.lba());
                self.sector_buffer.fill(0);
                self.begin_transfer(TransferMode::Write);
            }
            _ => {
                warn!("{}: unsupported command {command:#04X}", self.name);
            }
        }
    }

    const fn begin_transfer(&mut self, mode: TransferMode) {
        self.buffer_offset = 0;
        self.mode = mode;
        self.status = STATUS_DATA_READY;
    }

    fn data_read(&mut self) -> u8 {
        if self.mode != TransferMode::Read || self.buffer_offset >= self.sector_size {
            // Out of sequence: stale buffer contents, no state change.
            let stale = self.buffer_offset.min(self.sector_size - 1);
            return self.sector_buffer[stale];
        }
        let value = self.sector_buffer[self.buffer_offset];
        self.buffer_offset += 1;
        if self.buffer_offset == self.sector_size {
            self.status = STATUS_COMMAND_READY;
        }
        value
    }

    fn data_write(&mut self, value: u8) {
        if self.mode != TransferMode::Write || self.buffer_offset >= self.sector_size {
            warn!("{}: data write {value:#04X} outside a write command", self.name);
            return;
        }
        self.sector_buffer[self.buffer_offset] = value;
        self.buffer_offset += 1;
        if self.buffer_offset < self.sector_size {
            return;
        }

        let lba = self.lba();
        if lba < self.num_sectors {
            if let Err(err) = self.store_sector(lba, &self.sector_buffer) {
                error!("{}: failed to write sector {lba}: {err}", self.name);
            }
        } else {
            warn!("{}: write of sector {lba} past end of drive", self.name);
        }
        self.status = STATUS_COMMAND_READY;
    }

    fn register(&self, port: u8) -> Option<u8> {
        port.checked_sub(self.base_port)
            .filter(|offset| *offset <= REG_STATUS_COMMAND)
    }
}

impl Device for BlockDrive {
    fn name(&self) -> &str {
        &self.name
    }

    fn io_read(&mut self, port: u8) -> Option<u8> {
        let value = match self.register(port)? {
            REG_DATA => self.data_read(),
            REG_ERROR | REG_SECTOR_COUNT => 0,
            reg @ REG_LBA0..=REG_LBA3 => self.lba[usize::from(reg - REG_LBA0)],
            _ => self.status,
        };
        Some(value)
    }

    fn io_write(&mut self, port: u8, value: u8) -> bool {
        let Some(reg) = self.register(port) else {
            return false;
        };
        match reg {
            REG_DATA => self.data_write(value),
            REG_ERROR | REG_SECTOR_COUNT => {}
            REG_LBA3 => self.lba[3] = value & LBA_HIGH_MASK,
            REG_LBA0..=REG_LBA3 => self.lba[usize::from(reg - REG_LBA0)] = value,
            _ => self.command_write(value),
        }
        true
    }

    fn reset(&mut self) {
        self.lba = [0; 4];
        self.mode = TransferMode::Uninitialized;
        self.status = STATUS_COMMAND_READY;
        self.sector_buffer.fill(0);
        self.buffer_offset = 0;
    }
}
