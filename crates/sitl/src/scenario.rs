//! Preset scenarios.
//!
//! Each builder returns a configured, stopped simulation without stimuli;
//! [`Scenario::build`] adds the application loop of the preset on top.

use std::fmt;
use std::str::FromStr;

use pwm_guard_core::interrupt::Interrupt;
use pwm_guard_core::parameters::PwmParams;
use pwm_guard_core::pins::Pins;
use pwm_guard_core::timer::{
    AmplitudeScaler, CarrierConfig, ChannelConfig, ChannelId, CountDirection, WaveformMode,
    COMPARE_CHANNELS,
};
use pwm_guard_core::wex::{OutputMode, PatternConfig};
use pwm_guard_core::PwmController;

use crate::clock::SimClock;
use crate::dispatcher::{duty_ramp_handler, fault_ack_handler, InterruptDispatcher};
use crate::error::SimulationError;
use crate::simulation::Simulation;
use crate::stimulus::{AmplitudeSweep, FaultToggle, PatternSequence};

/// Timer clock of the complementary ramp preset (Hz).
pub const COMPLEMENTARY_CLOCK_HZ: u32 = 20_000_000;
/// Timer clock of the scaled four-channel preset (Hz).
pub const SCALED_CLOCK_HZ: u32 = 80_000_000;
/// Timer clock of the pattern bench preset (Hz).
pub const PATTERN_CLOCK_HZ: u32 = 3_333_333;

/// Dual-slope TOP of the scaled preset: 100 µs period at 80 MHz.
pub const SCALED_PERIOD: u16 = 4000;
/// Q15 duty fractions of the four scaled channels.
pub const SCALED_FRACTIONS: [u16; COMPARE_CHANNELS] = [0x1999, 0x3333, 0x4CCC, 0x660C];
/// Amplitude sequence of the scaled preset.
pub const AMPLITUDE_SEQUENCE: [u16; 4] = [0x4000, 0x6000, 0x8000, 0xC000];
/// Interval between amplitude changes (µs).
pub const AMPLITUDE_INTERVAL_US: u64 = 10_000;

/// Fault hold and release time of the complementary preset (µs).
pub const FAULT_TOGGLE_US: u64 = 250;

/// Named preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    /// Four ramping complementary pairs with a periodic fault strobe
    ComplementaryRamp,
    /// Four direct channels with amplitude-scaled duty values
    ScaledFourChannel,
    /// Pattern generator driving all eight pins
    PatternBench,
}

impl Scenario {
    pub const ALL: [Scenario; 3] = [
        Scenario::ComplementaryRamp,
        Scenario::ScaledFourChannel,
        Scenario::PatternBench,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Scenario::ComplementaryRamp => "complementary",
            Scenario::ScaledFourChannel => "scaled",
            Scenario::PatternBench => "pattern",
        }
    }

    /// Build the preset together with its application loop.
    pub fn build(&self) -> Result<Simulation, SimulationError> {
        match self {
            Scenario::ComplementaryRamp => {
                let mut sim = complementary_ramp(&PwmParams::default())?;
                let toggle =
                    FaultToggle::from_us(sim.clock(), 0, FAULT_TOGGLE_US, FAULT_TOGGLE_US);
                sim.add_stimulus(Box::new(toggle));
                Ok(sim)
            }
            Scenario::ScaledFourChannel => {
                let mut sim = scaled_four_channel()?;
                let interval = sim.clock().us_to_ticks(AMPLITUDE_INTERVAL_US);
                sim.add_stimulus(Box::new(AmplitudeSweep::new(
                    AMPLITUDE_SEQUENCE.to_vec(),
                    interval,
                )));
                Ok(sim)
            }
            Scenario::PatternBench => {
                let mut sim = pattern_bench()?;
                let sequence = PatternSequence::bench(sim.clock());
                sim.add_stimulus(Box::new(sequence));
                Ok(sim)
            }
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Scenario {
    type Err = SimulationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Scenario::ALL
            .into_iter()
            .find(|scenario| scenario.name() == s)
            .ok_or_else(|| SimulationError::UnknownScenario(s.to_string()))
    }
}

/// Complementary ramp preset configured from `params`.
///
/// Every ramping channel gets the duty-ramp handler; the fault interrupt
/// gets the acknowledge handler.
pub fn complementary_ramp(params: &PwmParams) -> Result<Simulation, SimulationError> {
    let mut pwm = PwmController::new();
    params.apply(&mut pwm)?;

    let mut dispatcher = InterruptDispatcher::new();
    for id in 0..COMPARE_CHANNELS as ChannelId {
        if params.channel_config(id).ramp_step.is_some() {
            dispatcher.bind(Interrupt::CompareMatch(id), duty_ramp_handler())?;
        }
    }
    if params.fault_interrupt {
        dispatcher.bind(Interrupt::Fault, fault_ack_handler())?;
    }

    let clock = SimClock::new(COMPLEMENTARY_CLOCK_HZ)?;
    Ok(Simulation::new(pwm, clock, dispatcher))
}

/// Scaled four-channel preset at full amplitude.
pub fn scaled_four_channel() -> Result<Simulation, SimulationError> {
    let mut pwm = PwmController::new();
    pwm.configure_carrier(CarrierConfig {
        period: SCALED_PERIOD,
        waveform: WaveformMode::DualSlope,
        ..Default::default()
    })?;
    pwm.set_output_mode(OutputMode::Direct)?;
    pwm.configure_scaling(AmplitudeScaler::default())?;
    for (id, fraction) in SCALED_FRACTIONS.iter().enumerate() {
        let id = id as ChannelId;
        pwm.configure_channel(
            id,
            ChannelConfig {
                max_duty: SCALED_PERIOD - 1,
                ..Default::default()
            },
        )?;
        pwm.write_scaled_duty(id, *fraction)?;
    }
    pwm.enable_outputs(Pins::P0 | Pins::P1 | Pins::P2 | Pins::P3);

    let clock = SimClock::new(SCALED_CLOCK_HZ)?;
    Ok(Simulation::new(pwm, clock, InterruptDispatcher::new()))
}

/// Pattern bench preset with all pins overridden and low.
pub fn pattern_bench() -> Result<Simulation, SimulationError> {
    let mut pwm = PwmController::new();
    pwm.configure_carrier(CarrierConfig {
        period: u16::MAX,
        direction: CountDirection::Up,
        ..Default::default()
    })?;
    pwm.set_output_mode(OutputMode::Direct)?;
    pwm.enable_outputs(Pins::all());
    pwm.enable_pattern(PatternConfig::all_pins(0x00));

    let clock = SimClock::new(PATTERN_CLOCK_HZ)?;
    Ok(Simulation::new(pwm, clock, InterruptDispatcher::new()))
}
