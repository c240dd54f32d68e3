//! pwm_guard_sitl - Host simulation harness for pwm_guard
//!
//! Drives a [`PwmController`](pwm_guard_core::PwmController) one clock tick
//! at a time, dispatches its interrupts to bound handlers, replays
//! application stimuli and records the output pins.

pub mod clock;
pub mod dispatcher;
pub mod error;
pub mod scenario;
pub mod simulation;
pub mod stimulus;
pub mod time;
pub mod trace;

pub use clock::SimClock;
pub use dispatcher::{DispatchStats, Handler, InterruptDispatcher};
pub use error::SimulationError;
pub use scenario::Scenario;
pub use simulation::Simulation;
pub use stimulus::{Action, AmplitudeSweep, FaultToggle, PatternSequence, Schedule, Stimulus};
pub use time::TimeMode;
pub use trace::{Edge, TraceRecorder, TraceSummary};
