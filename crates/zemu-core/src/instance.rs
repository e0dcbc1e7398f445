//! Host-facing machine instance tying a CPU engine, bus and debugger together.

use std::path::Path;

use log::info;

use crate::bus::{Bus, SystemBus};
use crate::config::MachineConfig;
use crate::cpu::CpuEngine;
use crate::debug::{Debugger, TraceContext};
use crate::device::{BlockDrive, DeviceKind, SerialPort, Timer};
use crate::error::ConfigError;
use crate::state::RunState;

/// A runnable machine.
#[derive(Debug)]
pub struct Instance {
    cpu: Box<dyn CpuEngine>,
    bus: Bus,
    debugger: Debugger,
}

impl Instance {
    /// Builds every configured device and attaches `cpu`.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found; nothing is constructed on error.
    pub fn new(config: &MachineConfig, cpu: Box<dyn CpuEngine>) -> Result<Self, ConfigError> {
        let bus = Bus::from_config(config)?;
        info!("machine built with {} devices", bus.devices().len());
        Ok(Self::with_bus(bus, cpu))
    }

    /// Loads a TOML machine description and builds it.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when the file cannot be read or parsed, or
    /// when any device fails validation.
    pub fn from_file(path: impl AsRef<Path>, cpu: Box<dyn CpuEngine>) -> Result<Self, ConfigError> {
        let config = MachineConfig::from_file(path)?;
        Self::new(&config, cpu)
    }

    /// Attaches `cpu` to an already assembled bus.
    #[must_use]
    pub fn with_bus(bus: Bus, cpu: Box<dyn CpuEngine>) -> Self {
        Self {
            cpu,
            bus,
            debugger: Debugger::new(),
        }
    }

    /// Runs until halt, breakpoint, or `max_cycles` is reached; returns cycles executed.
    pub fn continue_execution(&mut self, max_cycles: Option<u64>) -> u64 {
        self.debugger
            .continue_execution(self.cpu.as_mut(), &mut self.bus, max_cycles)
    }

    /// Executes one instruction; returns its cycles.
    pub fn step(&mut self) -> u64 {
        self.debugger.step(self.cpu.as_mut(), &mut self.bus)
    }

    /// Adds a breakpoint.
    pub fn set_breakpoint(&mut self, addr: u16) -> bool {
        self.debugger.set_breakpoint(addr)
    }

    /// Removes a breakpoint.
    pub fn remove_breakpoint(&mut self, addr: u16) -> bool {
        self.debugger.remove_breakpoint(addr)
    }

    /// Removes every breakpoint.
    pub fn clear_breakpoints(&mut self) {
        self.debugger.clear_breakpoints();
    }

    /// Breakpoint addresses in ascending order.
    pub fn breakpoints(&self) -> impl Iterator<Item = u16> + '_ {
        self.debugger.breakpoints()
    }

    /// Binds a tracepoint callback to `addr`.
    pub fn register_tracepoint<F>(&mut self, addr: u16, callback: F)
    where
        F: FnMut(&mut TraceContext<'_>) + 'static,
    {
        self.debugger.register_tracepoint(addr, callback);
    }

    /// Drops every tracepoint at `addr`.
    pub fn remove_tracepoints(&mut self, addr: u16) -> usize {
        self.debugger.remove_tracepoints(addr)
    }

    /// Whether execution stopped on a halt.
    #[must_use]
    pub fn is_halted(&self) -> bool {
        self.debugger.is_halted()
    }

    /// Whether execution stopped on a breakpoint.
    #[must_use]
    pub fn is_break(&self) -> bool {
        self.debugger.is_break()
    }

    /// Current run state.
    #[must_use]
    pub const fn run_state(&self) -> RunState {
        self.debugger.state()
    }

    /// Cumulative cycles executed.
    #[must_use]
    pub const fn cycles(&self) -> u64 {
        self.debugger.cycles()
    }

    /// Reads memory as the CPU would.
    pub fn read_memory(&mut self, addr: u16) -> u8 {
        self.bus.memory_read(addr)
    }

    /// Writes memory as the CPU would; read-only regions keep their contents.
    pub fn write_memory(&mut self, addr: u16, value: u8) {
        self.bus.memory_write(addr, value);
    }

    /// Reads memory without side effects.
    #[must_use]
    pub fn peek(&self, addr: u16) -> u8 {
        self.bus.peek(addr)
    }

    /// Writes memory ignoring write protection.
    pub fn poke(&mut self, addr: u16, value: u8) {
        self.bus.poke(addr, value);
    }

    /// Address of the next instruction.
    #[must_use]
    pub fn program_counter(&self) -> u16 {
        self.cpu.program_counter()
    }

    /// Moves execution to `pc`.
    pub fn set_program_counter(&mut self, pc: u16) {
        self.cpu.set_program_counter(pc);
    }

    /// Reads a CPU register by name.
    #[must_use]
    pub fn register(&self, name: &str) -> Option<u16> {
        self.cpu.register(name)
    }

    /// Writes a CPU register by name.
    pub fn set_register(&mut self, name: &str, value: u16) -> bool {
        self.cpu.set_register(name, value)
    }

    /// Looks up a device by name.
    #[must_use]
    pub fn device(&self, name: &str) -> Option<&DeviceKind> {
        self.bus.device(name)
    }

    /// Looks up a serial port by name.
    #[must_use]
    pub fn serial_port(&mut self, name: &str) -> Option<&mut SerialPort> {
        self.bus.serial_port(name)
    }

    /// Looks up a timer by name.
    #[must_use]
    pub fn timer(&self, name: &str) -> Option<&Timer> {
        self.bus.timer(name)
    }

    /// Looks up a block drive by name.
    #[must_use]
    pub fn block_drive(&mut self, name: &str) -> Option<&mut BlockDrive> {
        self.bus.block_drive(name)
    }

    /// The device bus.
    #[must_use]
    pub const fn bus(&self) -> &Bus {
        &self.bus
    }

    /// The device bus, mutably.
    pub const fn bus_mut(&mut self) -> &mut Bus {
        &mut self.bus
    }

    /// The attached CPU engine.
    #[must_use]
    pub fn cpu(&self) -> &dyn CpuEngine {
        self.cpu.as_ref()
    }

    /// The attached CPU engine, mutably.
    pub fn cpu_mut(&mut self) -> &mut dyn CpuEngine {
        self.cpu.as_mut()
    }

    /// Resets the CPU, every device and the debugger. Memory contents,
    /// breakpoints and tracepoints survive.
    pub fn reset(&mut self) {
        self.cpu.reset();
        self.bus.reset();
        self.debugger.reset();
    }
}
