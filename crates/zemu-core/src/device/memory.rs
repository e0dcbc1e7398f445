//! Fixed-size ROM and RAM regions mapped into the 16-bit address space.

use super::Device;
use crate::config::MemoryConfig;
use crate::error::ConfigError;

/// Byte array mapped at `[base, base + size)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryRegion {
    name: String,
    base: u16,
    readonly: bool,
    contents: Box<[u8]>,
}

impl MemoryRegion {
    /// Creates a region from a configuration record.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when the geometry or initial image is invalid.
    pub fn from_config(config: &MemoryConfig, readonly: bool) -> Result<Self, ConfigError> {
        let contents = config.load_contents()?;
        Ok(Self {
            name: config.name.clone(),
            base: config.base,
            readonly,
            contents: contents.into_boxed_slice(),
        })
    }

    /// First mapped address.
    #[must_use]
    pub const fn base(&self) -> u16 {
        self.base
    }

    /// Region length in bytes.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn size(&self) -> usize {
        self.contents.len()
    }

    /// Whether CPU writes are ignored.
    #[must_use]
    pub const fn is_readonly(&self) -> bool {
        self.readonly
    }

    /// Raw region contents, indexed from `base`.
    #[must_use]
    pub fn contents(&self) -> &[u8] {
        &self.contents
    }

    /// Returns `true` when `addr` falls inside the region.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn contains(&self, addr: u16) -> bool {
        self.offset(addr).is_some()
    }

    #[allow(clippy::missing_const_for_fn)]
    fn offset(&self, addr: u16) -> Option<usize> {
        if addr < self.base {
            return None;
        }
        let offset = usize::from(addr - self.base);
        if offset < self.contents.len() {
            Some(offset)
        } else {
            None
        }
    }
}

impl Device for MemoryRegion {
    fn name(&self) -> &str {
        &self.name
    }

    fn memory_read(&self, addr: u16) -> Option<u8> {
        self.offset(addr).map(|offset| self.contents[offset])
    }

    fn memory_write(&mut self, addr: u16, value: u8) -> bool {
        let Some(offset) = self.offset(addr) else {
            return false;
        };
        if !self.readonly {
            self.contents[offset] = value;
        }
        true
    }

    fn memory_poke(&mut self, addr: u16, value: u8) -> bool {
        let Some(offset) = self.offset(addr) else {
            return false;
        };
        self.contents[offset] = value;
        true
    }
}
