//! Simulation loop.
//!
//! One [`Simulation::step`] is one peripheral clock tick:
//!
//! 1. the controller is ticked and the clock advances,
//! 2. pending interrupts are dispatched,
//! 3. due stimuli run their actions,
//! 4. interrupts raised by those actions are dispatched,
//! 5. the resulting pin levels are traced.

use pwm_guard_core::PwmController;

use crate::clock::SimClock;
use crate::dispatcher::InterruptDispatcher;
use crate::error::SimulationError;
use crate::stimulus::{Action, Stimulus};
use crate::time::TimeMode;
use crate::trace::{TraceRecorder, TraceSummary};

/// Ticks simulated between two sleeps in paced mode.
pub const PACING_CHUNK_TICKS: u64 = 1000;

/// Controller, clock, interrupt handlers, stimuli and trace.
pub struct Simulation {
    pwm: PwmController,
    clock: SimClock,
    dispatcher: InterruptDispatcher,
    stimuli: Vec<Box<dyn Stimulus>>,
    trace: TraceRecorder,
    time_mode: TimeMode,
    actions: Vec<Action>,
}

impl Simulation {
    /// Assemble a simulation around a configured controller.
    ///
    /// The trace follows the controller's current output mode.
    pub fn new(pwm: PwmController, clock: SimClock, dispatcher: InterruptDispatcher) -> Self {
        let trace = TraceRecorder::new(pwm.output_mode());
        Self {
            pwm,
            clock,
            dispatcher,
            stimuli: Vec::new(),
            trace,
            time_mode: TimeMode::default(),
            actions: Vec::new(),
        }
    }

    /// Add a stimulus polled every tick.
    pub fn add_stimulus(&mut self, stimulus: Box<dyn Stimulus>) {
        self.stimuli.push(stimulus);
    }

    /// Names of the attached stimuli.
    pub fn stimuli(&self) -> Vec<&'static str> {
        self.stimuli.iter().map(|stimulus| stimulus.name()).collect()
    }

    pub fn set_time_mode(&mut self, mode: TimeMode) {
        self.time_mode = mode;
    }

    pub fn time_mode(&self) -> TimeMode {
        self.time_mode
    }

    /// Start the controller.
    pub fn start(&mut self) -> Result<(), SimulationError> {
        self.pwm.start()?;
        self.dispatcher.dispatch(&mut self.pwm)?;
        Ok(())
    }

    /// Simulate one clock tick.
    pub fn step(&mut self) -> Result<(), SimulationError> {
        let mut report = self.pwm.tick();
        self.clock.advance(1);
        let now = self.clock.now_ticks();

        self.dispatcher.dispatch(&mut self.pwm)?;

        for stimulus in &mut self.stimuli {
            stimulus.poll(now, &mut self.actions);
        }
        if !self.actions.is_empty() {
            for action in self.actions.drain(..) {
                action.apply(&mut self.pwm)?;
            }
            self.dispatcher.dispatch(&mut self.pwm)?;
        }

        // Faults and pattern writes change the pins between ticks.
        report.pins = self.pwm.outputs();
        self.trace.record(now, &report, self.pwm.fault_forcing());
        Ok(())
    }

    /// Simulate a number of clock ticks.
    pub fn run_ticks(&mut self, ticks: u64) -> Result<(), SimulationError> {
        for _ in 0..ticks {
            self.step()?;
        }
        Ok(())
    }

    /// Simulate until `periods` more carrier periods have completed.
    pub fn run_periods(&mut self, periods: u64) -> Result<(), SimulationError> {
        let target = self.pwm.periods() + periods;
        while self.pwm.is_running() && self.pwm.periods() < target {
            self.step()?;
        }
        Ok(())
    }

    /// Simulate a span of time.
    pub fn run_for_us(&mut self, us: u64) -> Result<(), SimulationError> {
        let ticks = self.clock.us_to_ticks(us);
        self.run_ticks(ticks)
    }

    /// Simulate a number of ticks, pacing against wall-clock time.
    ///
    /// Ticks are simulated in chunks; after each chunk the task sleeps for
    /// the chunk's simulated duration divided by the scale factor. In
    /// free-running mode this yields between chunks without sleeping.
    pub async fn run_paced(&mut self, ticks: u64) -> Result<(), SimulationError> {
        let mut remaining = ticks;
        while remaining > 0 {
            let chunk = remaining.min(PACING_CHUNK_TICKS);
            self.run_ticks(chunk)?;
            remaining -= chunk;

            match self.time_mode.wall_time(self.clock.duration(chunk)) {
                Some(wall) => tokio::time::sleep(wall).await,
                None => tokio::task::yield_now().await,
            }
        }
        Ok(())
    }

    pub fn pwm(&self) -> &PwmController {
        &self.pwm
    }

    pub fn pwm_mut(&mut self) -> &mut PwmController {
        &mut self.pwm
    }

    pub fn clock(&self) -> &SimClock {
        &self.clock
    }

    pub fn dispatcher(&self) -> &InterruptDispatcher {
        &self.dispatcher
    }

    pub fn trace(&self) -> &TraceRecorder {
        &self.trace
    }

    pub fn summary(&self) -> &TraceSummary {
        self.trace.summary()
    }
}
