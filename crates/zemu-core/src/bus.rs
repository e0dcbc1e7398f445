//! Bus dispatcher routing CPU accesses to the ordered device list.

use log::trace;

use crate::config::MachineConfig;
use crate::device::{BlockDrive, Device, DeviceKind, SerialPort, Timer};
use crate::error::ConfigError;

/// Memory and I/O access contract consumed by CPU engines.
pub trait SystemBus {
    /// Reads a byte from memory space.
    fn memory_read(&mut self, addr: u16) -> u8;

    /// Writes a byte to memory space.
    fn memory_write(&mut self, addr: u16, value: u8);

    /// Reads a byte from an I/O port.
    fn io_read(&mut self, port: u8) -> u8;

    /// Writes a byte to an I/O port.
    fn io_write(&mut self, port: u8, value: u8);
}

/// Interrupt lines aggregated over one clock batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BusState(u8);

impl BusState {
    /// Bit set when any device requested a non-maskable interrupt.
    pub const NMI: u8 = 0x01;
    /// Bit set when any device holds the maskable interrupt line.
    pub const INTERRUPT: u8 = 0x02;

    /// Builds a state from raw bits; bits above the two lines are dropped.
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & (Self::NMI | Self::INTERRUPT))
    }

    /// Raw two-bit value.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Whether NMI is requested.
    #[must_use]
    pub const fn nmi(self) -> bool {
        self.0 & Self::NMI != 0
    }

    /// Whether the maskable interrupt line is active.
    #[must_use]
    pub const fn interrupt(self) -> bool {
        self.0 & Self::INTERRUPT != 0
    }
}

/// Ordered collection of devices sharing one address and port space.
///
/// Memory accesses go to the first device claiming the address. I/O reads
/// return the first device that answers; I/O writes reach every device
/// listening on the port.
#[derive(Debug, Default)]
pub struct Bus {
    devices: Vec<DeviceKind>,
}

impl Bus {
    /// Creates an empty bus.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            devices: Vec::new(),
        }
    }

    /// Builds every device in a machine description, in declaration order.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found; no bus is produced.
    pub fn from_config(config: &MachineConfig) -> Result<Self, ConfigError> {
        config.validate_names()?;
        let devices = config
            .devices
            .iter()
            .map(DeviceKind::from_config)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { devices })
    }

    /// Appends a device with lower priority than every existing device.
    #[must_use]
    pub fn with_device(mut self, device: impl Into<DeviceKind>) -> Self {
        self.devices.push(device.into());
        self
    }

    /// Devices in priority order.
    #[must_use]
    pub fn devices(&self) -> &[DeviceKind] {
        &self.devices
    }

    /// Looks up a device by name.
    #[must_use]
    pub fn device(&self, name: &str) -> Option<&DeviceKind> {
        self.devices.iter().find(|device| device.name() == name)
    }

    /// Looks up a device by name for mutation.
    #[must_use]
    pub fn device_mut(&mut self, name: &str) -> Option<&mut DeviceKind> {
        self.devices.iter_mut().find(|device| device.name() == name)
    }

    /// Looks up a serial port by name.
    #[must_use]
    pub fn serial_port(&mut self, name: &str) -> Option<&mut SerialPort> {
        self.device_mut(name).and_then(DeviceKind::as_serial_port_mut)
    }

    /// Looks up a timer by name.
    #[must_use]
    pub fn timer(&self, name: &str) -> Option<&Timer> {
        self.device(name).and_then(DeviceKind::as_timer)
    }

    /// Looks up a block drive by name.
    #[must_use]
    pub fn block_drive(&mut self, name: &str) -> Option<&mut BlockDrive> {
        self.device_mut(name).and_then(DeviceKind::as_block_drive_mut)
    }

    /// Reads memory the way a debugger would; identical to a CPU read.
    #[must_use]
    pub fn peek(&self, addr: u16) -> u8 {
        self.devices
            .iter()
            .find_map(|device| device.memory_read(addr))
            .unwrap_or(0)
    }

    /// Writes memory ignoring write protection. Unclaimed addresses are dropped.
    pub fn poke(&mut self, addr: u16, value: u8) {
        if !self
            .devices
            .iter_mut()
            .any(|device| device.memory_poke(addr, value))
        {
            trace!("poke {addr:#06X} <- {value:#04X} unclaimed");
        }
    }

    /// Advances every device by `cycles` cycles and reports the interrupt lines.
    pub fn clock(&mut self, cycles: u32) -> BusState {
        for _ in 0..cycles {
            for device in &mut self.devices {
                device.clock();
            }
        }

        let mut bits = 0;
        for device in &self.devices {
            if device.nmi() {
                bits |= BusState::NMI;
            }
            if device.interrupt() {
                bits |= BusState::INTERRUPT;
            }
        }
        BusState::from_bits(bits)
    }

    /// Returns every device to its power-on state; memory contents are kept.
    pub fn reset(&mut self) {
        for device in &mut self.devices {
            device.reset();
        }
    }
}

impl SystemBus for Bus {
    fn memory_read(&mut self, addr: u16) -> u8 {
        self.peek(addr)
    }

    fn memory_write(&mut self, addr: u16, value: u8) {
        if !self
            .devices
            .iter_mut()
            .any(|device| device.memory_write(addr, value))
        {
            trace!("write {addr:#06X} <- {value:#04X} unclaimed");
        }
    }

    fn io_read(&mut self, port: u8) -> u8 {
        self.devices
            .iter_mut()
            .find_map(|device| device.io_read(port))
            .unwrap_or(0)
    }

    fn io_write(&mut self, port: u8, value: u8) {
        let mut claimed = false;
        for device in &mut self.devices {
            claimed |= device.io_write(port, value);
        }
        if !claimed {
            trace!("out {port:#04X} <- {value:#04X} unclaimed");
        }
    }
}
