//! Instruction engine contract and the bundled reference engine.

use std::fmt;

use crate::bus::SystemBus;

/// Instruction-class cycle costs.
pub mod timing;
/// Z80-subset reference engine.
pub mod z80;

pub use timing::CycleCostKind;
pub use z80::{Registers, Z80Core, NMI_VECTOR, RESTART_VECTOR};

/// Instruction engine driven by the debugger.
///
/// The engine owns registers and interrupt latches only; every memory and
/// port access goes through the [`SystemBus`] handed to [`CpuEngine::step`].
pub trait CpuEngine: fmt::Debug {
    /// Executes one instruction (or accepts one interrupt) and returns the
    /// cycles it consumed.
    fn step(&mut self, bus: &mut dyn SystemBus) -> u32;

    /// Whether the engine has executed a halt instruction.
    fn halted(&self) -> bool;

    /// Address of the next instruction.
    fn program_counter(&self) -> u16;

    /// Moves execution to `pc`.
    fn set_program_counter(&mut self, pc: u16);

    /// Reads a register by name, or `None` when the engine has no such register.
    fn register(&self, name: &str) -> Option<u16>;

    /// Writes a register by name; returns `false` when the name is unknown.
    fn set_register(&mut self, name: &str, value: u16) -> bool;

    /// Latches a non-maskable interrupt for the next step.
    fn raise_nmi(&mut self);

    /// Sets the level of the maskable interrupt line.
    fn set_interrupt(&mut self, active: bool);

    /// Returns the engine to its power-on state.
    fn reset(&mut self);
}
