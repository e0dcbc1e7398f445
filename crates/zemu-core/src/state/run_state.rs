/// Execution state of a machine as seen by the debug controller.
///
/// `Halted` and `Break` stop automatic progress. Resuming from `Break`
/// re-enters `Running`; resuming from `Halted` does nothing until reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RunState {
    /// No instruction has been executed since construction or reset.
    #[default]
    Undefined,
    /// Instructions are being (or may be) executed.
    Running,
    /// The CPU executed a halt and execution will not resume on its own.
    Halted,
    /// Execution stopped because the program counter reached a breakpoint.
    Break,
}

impl RunState {
    /// Returns `true` when a `continue` request may execute instructions.
    #[must_use]
    pub const fn can_resume(self) -> bool {
        !matches!(self, Self::Halted)
    }

    /// Returns `true` for states that end a `continue` call.
    #[must_use]
    pub const fn is_stopped(self) -> bool {
        matches!(self, Self::Halted | Self::Break)
    }
}
