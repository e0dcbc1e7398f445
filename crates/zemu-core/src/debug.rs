//! Debug controller: run state, cycle accounting, breakpoints and tracepoints.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use log::debug;

use crate::bus::{Bus, SystemBus};
use crate::cpu::CpuEngine;
use crate::state::RunState;

/// Callback fired when execution arrives at its address.
pub type Tracepoint = Box<dyn FnMut(&mut TraceContext<'_>)>;

/// Live machine state handed to a tracepoint.
#[derive(Debug)]
pub struct TraceContext<'a> {
    cpu: &'a mut dyn CpuEngine,
    bus: &'a mut Bus,
    cycles: u64,
}

impl TraceContext<'_> {
    /// Address the instruction that just completed moved execution to.
    #[must_use]
    pub fn program_counter(&self) -> u16 {
        self.cpu.program_counter()
    }

    /// Redirects execution.
    pub fn set_program_counter(&mut self, pc: u16) {
        self.cpu.set_program_counter(pc);
    }

    /// Reads a CPU register by name.
    #[must_use]
    pub fn register(&self, name: &str) -> Option<u16> {
        self.cpu.register(name)
    }

    /// Writes a CPU register by name; returns `false` for unknown names.
    pub fn set_register(&mut self, name: &str, value: u16) -> bool {
        self.cpu.set_register(name, value)
    }

    /// Reads memory through the bus.
    pub fn read_memory(&mut self, addr: u16) -> u8 {
        self.bus.memory_read(addr)
    }

    /// Writes memory through the bus, honouring read-only regions.
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

    /// Cumulative cycles executed, including the instruction that just completed.
    #[must_use]
    pub const fn cycles(&self) -> u64 {
        self.cycles
    }

    /// The bus, for device inspection.
    pub const fn bus(&mut self) -> &mut Bus {
        self.bus
    }
}

/// Drives a [`CpuEngine`] one instruction at a time against a [`Bus`].
///
/// After every instruction the bus is clocked for the cycles it consumed,
/// interrupt lines are forwarded to the engine, tracepoints at the new PC
/// fire, and the halt, breakpoint and budget conditions are checked in that
/// order.
#[derive(Default)]
pub struct Debugger {
    state: RunState,
    cycles: u64,
    breakpoints: BTreeSet<u16>,
    tracepoints: BTreeMap<u16, Vec<Tracepoint>>,
}

impl Debugger {
    /// Creates a controller in the `Undefined` state with no breakpoints.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current run state.
    #[must_use]
    pub const fn state(&self) -> RunState {
        self.state
    }

    /// Cumulative cycles since construction or the last reset.
    #[must_use]
    pub const fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Whether the engine reported a halt.
    #[must_use]
    pub fn is_halted(&self) -> bool {
        self.state == RunState::Halted
    }

    /// Whether execution stopped on a breakpoint.
    #[must_use]
    pub fn is_break(&self) -> bool {
        self.state == RunState::Break
    }

    /// Adds a breakpoint; returns `false` if one was already set at `addr`.
    pub fn set_breakpoint(&mut self, addr: u16) -> bool {
        self.breakpoints.insert(addr)
    }

    /// Removes a breakpoint; returns `false` if none was set at `addr`.
    pub fn remove_breakpoint(&mut self, addr: u16) -> bool {
        self.breakpoints.remove(&addr)
    }

    /// Removes every breakpoint.
    pub fn clear_breakpoints(&mut self) {
        self.breakpoints.clear();
    }

    /// Breakpoint addresses in ascending order.
    pub fn breakpoints(&self) -> impl Iterator<Item = u16> + '_ {
        self.breakpoints.iter().copied()
    }

    /// Binds `callback` to `addr`. Callbacks sharing an address fire in
    /// registration order.
    pub fn register_tracepoint<F>(&mut self, addr: u16, callback: F)
    where
        F: FnMut(&mut TraceContext<'_>) + 'static,
    {
        self.tracepoints
            .entry(addr)
            .or_default()
            .push(Box::new(callback));
    }

    /// Drops every tracepoint at `addr`; returns how many were removed.
    pub fn remove_tracepoints(&mut self, addr: u16) -> usize {
        self.tracepoints.remove(&addr).map_or(0, |callbacks| callbacks.len())
    }

    /// Number of tracepoints bound to `addr`.
    #[must_use]
    pub fn tracepoint_count(&self, addr: u16) -> usize {
        self.tracepoints.get(&addr).map_or(0, Vec::len)
    }

    /// Runs until halt, breakpoint, or until at least `max_cycles` cycles have
    /// executed. Returns the cycles executed by this call.
    ///
    /// Returns 0 without executing while halted, and for a budget of 0.
    pub fn continue_execution(
        &mut self,
        cpu: &mut dyn CpuEngine,
        bus: &mut Bus,
        max_cycles: Option<u64>,
    ) -> u64 {
        if !self.state.can_resume() || max_cycles == Some(0) {
            return 0;
        }
        self.state = RunState::Running;

        let mut executed = 0;
        loop {
            executed += u64::from(self.execute_one(cpu, bus));
            if self.state != RunState::Running {
                break;
            }
            if max_cycles.is_some_and(|budget| executed >= budget) {
                debug!("cycle budget reached after {executed} cycles");
                break;
            }
        }
        executed
    }

    /// Executes exactly one instruction; returns its cycles, or 0 while halted.
    pub fn step(&mut self, cpu: &mut dyn CpuEngine, bus: &mut Bus) -> u64 {
        if !self.state.can_resume() {
            return 0;
        }
        self.state = RunState::Running;
        u64::from(self.execute_one(cpu, bus))
    }

    /// Returns to `Undefined` with a zero cycle count. Breakpoints and
    /// tracepoints are kept.
    pub fn reset(&mut self) {
        self.state = RunState::Undefined;
        self.cycles = 0;
    }

    fn execute_one(&mut self, cpu: &mut dyn CpuEngine, bus: &mut Bus) -> u32 {
        let cycles = cpu.step(bus);
        self.cycles += u64::from(cycles);

        let lines = bus.clock(cycles);
        if lines.nmi() {
            cpu.raise_nmi();
        }
        cpu.set_interrupt(lines.interrupt());

        self.fire_tracepoints(cpu, bus);

        let pc = cpu.program_counter();
        if cpu.halted() {
            debug!("halted at {pc:#06X} after {} cycles", self.cycles);
            self.state = RunState::Halted;
        } else if self.breakpoints.contains(&pc) {
            debug!("breakpoint hit at {pc:#06X}");
            self.state = RunState::Break;
        }
        cycles
    }

    fn fire_tracepoints(&mut self, cpu: &mut dyn CpuEngine, bus: &mut Bus) {
        let Some(callbacks) = self.tracepoints.get_mut(&cpu.program_counter()) else {
            return;
        };
        let mut context = TraceContext {
            cpu,
            bus,
            cycles: self.cycles,
        };
        for callback in callbacks.iter_mut() {
            callback(&mut context);
        }
    }
}

impl fmt::Debug for Debugger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Debugger")
            .field("state", &self.state)
            .field("cycles", &self.cycles)
            .field("breakpoints", &self.breakpoints)
            .field(
                "tracepoints",
                &self
                    .tracepoints
                    .iter()
                    .map(|(addr, callbacks)| (*addr, callbacks.len()))
                    .collect::<BTreeMap<_, _>>(),
            )
            .finish()
    }
}
