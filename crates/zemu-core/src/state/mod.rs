//! Execution-state primitives shared by the debugger and instance layers.

/// Run-state machine for continue/step control.
pub mod run_state;

pub use run_state::RunState;
