//! Bus-attached devices.
//!
//! Every device implements the [`Device`] capability set. Capabilities a
//! device lacks fall back to the default methods, which decline the access
//! (`None` / `false`) so the bus can offer it to the next device.

use enum_dispatch::enum_dispatch;

/// IDE-style block storage device.
pub mod block_drive;
/// ROM and RAM regions.
pub mod memory;
/// Buffered serial port.
pub mod serial;
/// Interval timer raising NMI.
pub mod timer;

pub use block_drive::{
    BlockDrive, TransferMode, COMMAND_READ_SECTOR, COMMAND_WRITE_SECTOR, STATUS_COMMAND_READY,
    STATUS_DATA_READY,
};
pub use memory::MemoryRegion;
pub use serial::SerialPort;
pub use timer::Timer;

use crate::config::DeviceConfig;
use crate::error::ConfigError;

/// Capability set shared by all bus devices.
#[enum_dispatch]
pub trait Device {
    /// Unique name used by host code to address the device.
    fn name(&self) -> &str;

    /// Reads `addr` if this device claims it in memory space.
    fn memory_read(&self, _addr: u16) -> Option<u8> {
        None
    }

    /// Writes `addr` if this device claims it; returns whether it was claimed.
    ///
    /// A claiming device may still ignore the value (read-only memory).
    fn memory_write(&mut self, _addr: u16, _value: u8) -> bool {
        false
    }

    /// Writes `addr` bypassing write protection; returns whether it was claimed.
    fn memory_poke(&mut self, addr: u16, value: u8) -> bool {
        self.memory_write(addr, value)
    }

    /// Reads an I/O port, or `None` when the port is not one of this device's.
    fn io_read(&mut self, _port: u8) -> Option<u8> {
        None
    }

    /// Writes an I/O port; returns whether the port belongs to this device.
    fn io_write(&mut self, _port: u8, _value: u8) -> bool {
        false
    }

    /// Advances the device by one CPU cycle.
    fn clock(&mut self) {}

    /// Whether the device requested a non-maskable interrupt on the last cycle.
    fn nmi(&self) -> bool {
        false
    }

    /// Whether the device is holding the maskable interrupt line.
    fn interrupt(&self) -> bool {
        false
    }

    /// Returns volatile device state to power-on values.
    fn reset(&mut self) {}
}

/// Closed set of device variants attached to a bus.
#[allow(clippy::large_enum_variant)]
#[enum_dispatch(Device)]
#[derive(Debug)]
pub enum DeviceKind {
    /// ROM or RAM region.
    MemoryRegion(MemoryRegion),
    /// Serial port.
    SerialPort(SerialPort),
    /// Interval timer.
    Timer(Timer),
    /// Block storage device.
    BlockDrive(BlockDrive),
}

impl DeviceKind {
    /// Builds a live device from a validated configuration record.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when the record fails device-level validation.
    pub fn from_config(config: &DeviceConfig) -> Result<Self, ConfigError> {
        Ok(match config {
            DeviceConfig::Rom(memory) => MemoryRegion::from_config(memory, true)?.into(),
            DeviceConfig::Ram(memory) => MemoryRegion::from_config(memory, false)?.into(),
            DeviceConfig::Serial(serial) => SerialPort::from_config(serial)?.into(),
            DeviceConfig::Timer(timer) => Timer::from_config(timer).into(),
            DeviceConfig::BlockDrive(drive) => BlockDrive::from_config(drive)?.into(),
        })
    }

    /// Returns the memory region variant, if this is one.
    #[must_use]
    pub const fn as_memory_region(&self) -> Option<&MemoryRegion> {
        match self {
            Self::MemoryRegion(region) => Some(region),
            _ => None,
        }
    }

    /// Returns the serial port variant, if this is one.
    #[must_use]
    pub const fn as_serial_port(&self) -> Option<&SerialPort> {
        match self {
            Self::SerialPort(port) => Some(port),
            _ => None,
        }
    }

    /// Returns the serial port variant mutably, if this is one.
    #[must_use]
    pub const fn as_serial_port_mut(&mut self) -> Option<&mut SerialPort> {
        match self {
            Self::SerialPort(port) => Some(port),
            _ => None,
        }
    }

    /// Returns the timer variant, if this is one.
    #[must_use]
    pub const fn as_timer(&self) -> Option<&Timer> {
        match self {
            Self::Timer(timer) => Some(timer),
            _ => None,
        }
    }

    /// Returns the block drive variant, if this is one.
    #[must_use]
    pub const fn as_block_drive(&self) -> Option<&BlockDrive> {
        match self {
            Self::BlockDrive(drive) => Some(drive),
            _ => None,
        }
    }

    /// Returns the block drive variant mutably, if this is one.
    #[must_use]
    pub const fn as_block_drive_mut(&mut self) -> Option<&mut BlockDrive> {
        match self {
            Self::BlockDrive(drive) => Some(drive),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Device, DeviceKind};
    use crate::config::{DeviceConfig, MemoryConfig, SerialConfig, TimerConfig};

    #[test]
    fn from_config_builds_the_matching_variant() {
        let rom = DeviceKind::from_config(&DeviceConfig::Rom(MemoryConfig::new("rom", 0, 4)))
            .expect("valid rom");
        assert!(rom.as_memory_region().is_some_and(|region| region.is_readonly()));
        assert_eq!(rom.name(), "rom");

        let serial =
            DeviceKind::from_config(&DeviceConfig::Serial(SerialConfig::new("tty", 0, 1, 2)))
                .expect("valid serial");
        assert!(serial.as_serial_port().is_some());
        assert!(serial.as_timer().is_none());
    }

    #[test]
    fn non_memory_devices_decline_memory_access() {
        let mut timer =
            DeviceKind::from_config(&DeviceConfig::Timer(TimerConfig::new("timer", 0x10, 0x11)))
                .expect("valid timer");
        assert_eq!(timer.memory_read(0), None);
        assert!(!timer.memory_write(0, 1));
        assert!(!timer.memory_poke(0, 1));
    }

    #[test]
    fn memory_regions_decline_io_access() {
        let mut ram = DeviceKind::from_config(&DeviceConfig::Ram(MemoryConfig::new("ram", 0, 4)))
            .expect("valid ram");
        assert_eq!(ram.io_read(0), None);
        assert!(!ram.io_write(0, 1));
        assert!(!ram.nmi());
        assert!(!ram.interrupt());
    }
}
