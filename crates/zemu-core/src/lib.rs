//! Bus, device and debug-control core for configurable 8-bit system emulation.
//!
//! A machine is a list of devices (ROM, RAM, serial port, interval timer,
//! block drive) sharing a 16-bit memory space and an 8-bit port space, driven
//! by a [`CpuEngine`] under the control of a [`Debugger`]. [`Instance`] ties
//! the three together.

/// Machine descriptions, buildable in code or parsed from TOML.
pub mod config;
pub use config::{
    BlockDriveConfig, DeviceConfig, MachineConfig, MemoryConfig, SerialConfig, TimerConfig,
    ADDRESS_SPACE_BYTES, DEFAULT_SERIAL_CAPACITY, MAX_SECTOR_SIZE,
};

/// Configuration and storage error types.
pub mod error;
pub use error::{ConfigError, StorageError};

/// Bus-attached devices.
pub mod device;
pub use device::{
    BlockDrive, Device, DeviceKind, MemoryRegion, SerialPort, Timer, TransferMode,
    COMMAND_READ_SECTOR, COMMAND_WRITE_SECTOR, STATUS_COMMAND_READY, STATUS_DATA_READY,
};

/// Address and port dispatch across devices.
pub mod bus;
pub use bus::{Bus, BusState, SystemBus};

/// CPU engine contract and the reference Z80-subset engine.
pub mod cpu;
pub use cpu::{CpuEngine, CycleCostKind, Registers, Z80Core, NMI_VECTOR, RESTART_VECTOR};

/// Run-state primitives.
pub mod state;
pub use state::RunState;

/// Breakpoints, tracepoints and the continue/step loop.
pub mod debug;
pub use debug::{Debugger, TraceContext, Tracepoint};

/// Host-facing machine instance.
pub mod instance;
pub use instance::Instance;
