//! PWM Parameter Definitions
//!
//! Defines the parameters that describe a complete complementary PWM setup.
//! Defaults reproduce the reference configuration: 20 MHz clock, single
//! slope down counting with TOP 999 (50 µs), duty capped at 990, dead time
//! 3/5 ticks and a latched drive-low fault on event channel 0.
//!
//! # Parameters
//!
//! - `PWM_PERIOD` - Carrier TOP value (ticks)
//! - `PWM_CLK_DIV` - Clock prescaler (1, 2, 4, 8, 16, 64, 256, 1024)
//! - `PWM_WAVEFORM` - 0 = single slope, 1 = dual slope
//! - `PWM_DIR` - 0 = up, 1 = down (single slope only)
//! - `PWM_OUT_MODE` - 0 = direct, 1 = complementary
//! - `PWM_MAX_DUTY` - Maximum compare value (ticks)
//! - `PWM_CH0_STEP`..`PWM_CH3_STEP` - Ramp increment per compare match, 0 = fixed duty
//! - `PWM_RAMP_WRAP` - 0 = modulo, 1 = reset to zero
//! - `DT_LS` / `DT_HS` - Low-side / high-side dead time (ticks)
//! - `FLT_MODE` - 0 = cycle-by-cycle, 1 = latched
//! - `FLT_ACTION` - 0 = drive low, 1 = drive high
//! - `FLT_INPUTS` - Fault input mask (bit 0 = A, 1 = B, 2 = C)
//! - `FLT_EV_CH` - Event channel carrying the software fault strobe
//! - `FLT_INT_EN` - Fault interrupt enable

use super::error::ParameterError;
use super::storage::{ParamFlags, ParamValue, ParameterStore};
use crate::error::ConfigError;
use crate::event::{EventChannelId, EventSource};
use crate::interrupt::InterruptFlags;
use crate::log_warn;
use crate::pins::Pins;
use crate::pwm::PwmController;
use crate::timer::{
    CarrierConfig, ChannelConfig, ChannelId, ClockDivisor, CountDirection, RampWrap,
    WaveformMode, COMPARE_CHANNELS,
};
use crate::wex::{
    DeadTimeConfig, FaultConfig, FaultInputs, OutputMode, RestartMode, SafeLevel, OUTPUT_PAIRS,
};

const STEP_NAMES: [&str; COMPARE_CHANNELS] =
    ["PWM_CH0_STEP", "PWM_CH1_STEP", "PWM_CH2_STEP", "PWM_CH3_STEP"];

const DEFAULT_STEPS: [u16; COMPARE_CHANNELS] = [5, 15, 25, 35];

/// PWM parameters loaded from parameter store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PwmParams {
    /// Carrier TOP value (ticks)
    pub period: u16,
    pub divisor: ClockDivisor,
    pub waveform: WaveformMode,
    pub direction: CountDirection,
    pub output_mode: OutputMode,
    /// Maximum compare value of every channel (ticks)
    pub max_duty: u16,
    /// Ramp increment per channel, 0 for a fixed duty
    pub ramp_steps: [u16; COMPARE_CHANNELS],
    pub ramp_wrap: RampWrap,
    /// Low-side dead time (ticks)
    pub dead_time_low: u16,
    /// High-side dead time (ticks)
    pub dead_time_high: u16,
    pub fault_mode: RestartMode,
    pub fault_action: SafeLevel,
    pub fault_inputs: FaultInputs,
    pub fault_event_channel: EventChannelId,
    pub fault_interrupt: bool,
}

impl Default for PwmParams {
    fn default() -> Self {
        Self {
            period: 999,
            divisor: ClockDivisor::Div1,
            waveform: WaveformMode::SingleSlope,
            direction: CountDirection::Down,
            output_mode: OutputMode::Complementary,
            max_duty: 990,
            ramp_steps: DEFAULT_STEPS,
            ramp_wrap: RampWrap::ResetToZero,
            dead_time_low: 3,
            dead_time_high: 5,
            fault_mode: RestartMode::Latched,
            fault_action: SafeLevel::DriveLow,
            fault_inputs: FaultInputs::A,
            fault_event_channel: 0,
            fault_interrupt: true,
        }
    }
}

/// Integer parameter narrowed to `T`; missing parameters yield `default`
fn read_int<T: TryFrom<i32>>(
    store: &ParameterStore,
    name: &str,
    default: T,
) -> Result<T, ParameterError> {
    match store.get(name) {
        None => Ok(default),
        Some(ParamValue::Int(v)) => T::try_from(*v).map_err(|_| {
            log_warn!("Parameter {} out of range: {}", name, *v);
            ParameterError::InvalidConfig
        }),
        Some(_) => Err(ParameterError::TypeMismatch),
    }
}

/// Enumerated parameter decoded through `decode`
fn read_enum<T>(
    store: &ParameterStore,
    name: &str,
    default: T,
    decode: impl FnOnce(u8) -> Option<T>,
) -> Result<T, ParameterError> {
    match store.get(name) {
        None => Ok(default),
        Some(ParamValue::Int(v)) => u8::try_from(*v).ok().and_then(decode).ok_or_else(|| {
            log_warn!("Parameter {} has no meaning for {}", name, *v);
            ParameterError::InvalidConfig
        }),
        Some(_) => Err(ParameterError::TypeMismatch),
    }
}

impl PwmParams {
    /// Register PWM parameters with default values
    ///
    /// # Arguments
    ///
    /// * `store` - Parameter store to register parameters in
    pub fn register_defaults(store: &mut ParameterStore) -> Result<(), ParameterError> {
        let defaults = Self::default();
        let restart = ParamFlags::REQUIRES_RESTART;

        store.register("PWM_PERIOD", ParamValue::Int(defaults.period as i32), restart)?;
        store.register(
            "PWM_CLK_DIV",
            ParamValue::Int(defaults.divisor.ratio() as i32),
            restart,
        )?;
        store.register("PWM_WAVEFORM", ParamValue::Int(0), restart)?;
        // Down counting, as in the reference design
        store.register("PWM_DIR", ParamValue::Int(1), restart)?;
        store.register("PWM_OUT_MODE", ParamValue::Int(1), restart)?;
        store.register(
            "PWM_MAX_DUTY",
            ParamValue::Int(defaults.max_duty as i32),
            restart,
        )?;
        for (name, step) in STEP_NAMES.iter().zip(defaults.ramp_steps) {
            store.register(name, ParamValue::Int(step as i32), restart)?;
        }
        store.register("PWM_RAMP_WRAP", ParamValue::Int(1), restart)?;

        store.register(
            "DT_LS",
            ParamValue::Int(defaults.dead_time_low as i32),
            restart,
        )?;
        store.register(
            "DT_HS",
            ParamValue::Int(defaults.dead_time_high as i32),
            restart,
        )?;

        store.register("FLT_MODE", ParamValue::Int(1), restart)?;
        store.register("FLT_ACTION", ParamValue::Int(0), restart)?;
        store.register(
            "FLT_INPUTS",
            ParamValue::Int(defaults.fault_inputs.bits() as i32),
            restart,
        )?;
        store.register(
            "FLT_EV_CH",
            ParamValue::Int(defaults.fault_event_channel as i32),
            restart,
        )?;
        store.register("FLT_INT_EN", ParamValue::Bool(true), restart)?;

        Ok(())
    }

    /// Load PWM parameters from parameter store
    ///
    /// Missing parameters take their default value.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` for a value the hardware cannot represent (unsupported
    /// prescaler, negative or oversized tick count, unknown mode),
    /// `TypeMismatch` for a boolean where a number is expected.
    pub fn from_store(store: &ParameterStore) -> Result<Self, ParameterError> {
        let defaults = Self::default();

        let ratio = read_int(store, "PWM_CLK_DIV", defaults.divisor.ratio())?;
        let divisor = ClockDivisor::from_ratio(ratio).ok_or_else(|| {
            log_warn!("Unsupported clock divisor {}", ratio);
            ParameterError::InvalidConfig
        })?;

        let waveform = read_enum(store, "PWM_WAVEFORM", defaults.waveform, |v| match v {
            0 => Some(WaveformMode::SingleSlope),
            1 => Some(WaveformMode::DualSlope),
            _ => None,
        })?;

        let direction = read_enum(store, "PWM_DIR", defaults.direction, |v| match v {
            0 => Some(CountDirection::Up),
            1 => Some(CountDirection::Down),
            _ => None,
        })?;

        let mut ramp_steps = defaults.ramp_steps;
        for (step, name) in ramp_steps.iter_mut().zip(STEP_NAMES) {
            *step = read_int(store, name, *step)?;
        }

        let fault_inputs = read_enum(store, "FLT_INPUTS", defaults.fault_inputs, |v| {
            FaultInputs::from_bits(v)
        })?;

        let fault_interrupt = match store.get("FLT_INT_EN") {
            Some(ParamValue::Bool(v)) => *v,
            Some(ParamValue::Int(v)) => *v != 0,
            None => defaults.fault_interrupt,
        };

        Ok(Self {
            period: read_int(store, "PWM_PERIOD", defaults.period)?,
            divisor,
            waveform,
            direction,
            output_mode: read_enum(
                store,
                "PWM_OUT_MODE",
                defaults.output_mode,
                OutputMode::from_u8,
            )?,
            max_duty: read_int(store, "PWM_MAX_DUTY", defaults.max_duty)?,
            ramp_steps,
            ramp_wrap: read_enum(store, "PWM_RAMP_WRAP", defaults.ramp_wrap, RampWrap::from_u8)?,
            dead_time_low: read_int(store, "DT_LS", defaults.dead_time_low)?,
            dead_time_high: read_int(store, "DT_HS", defaults.dead_time_high)?,
            fault_mode: read_enum(store, "FLT_MODE", defaults.fault_mode, RestartMode::from_u8)?,
            fault_action: read_enum(
                store,
                "FLT_ACTION",
                defaults.fault_action,
                SafeLevel::from_u8,
            )?,
            fault_inputs,
            fault_event_channel: read_int(
                store,
                "FLT_EV_CH",
                defaults.fault_event_channel,
            )?,
            fault_interrupt,
        })
    }

    pub fn carrier_config(&self) -> CarrierConfig {
        CarrierConfig {
            period: self.period,
            direction: self.direction,
            divisor: self.divisor,
            waveform: self.waveform,
        }
    }

    /// Channel `id` drives pair `id` in complementary mode
    pub fn channel_config(&self, id: ChannelId) -> ChannelConfig {
        let step = self.ramp_steps.get(id as usize).copied().unwrap_or(0);
        ChannelConfig {
            initial_duty: 0,
            max_duty: self.max_duty,
            ramp_step: (step != 0).then_some(step),
            wrap: self.ramp_wrap,
            output_pair: (self.output_mode == OutputMode::Complementary).then_some(id),
        }
    }

    pub fn deadtime_config(&self) -> DeadTimeConfig {
        DeadTimeConfig {
            low_side_ticks: self.dead_time_low,
            high_side_ticks: self.dead_time_high,
        }
    }

    pub fn fault_config(&self) -> FaultConfig {
        FaultConfig {
            restart_mode: self.fault_mode,
            safe_level: self.fault_action,
            inputs: self.fault_inputs,
            interrupt: self.fault_interrupt,
        }
    }

    /// Configure a stopped controller from these parameters
    ///
    /// Enables every output pin and the compare interrupt of each ramping
    /// channel. The controller is left stopped.
    ///
    /// # Errors
    ///
    /// Returns the first configuration error; the controller may then be
    /// partially configured.
    pub fn apply(&self, pwm: &mut PwmController) -> Result<(), ConfigError> {
        pwm.configure_carrier(self.carrier_config())?;
        pwm.set_output_mode(self.output_mode)?;

        if self.output_mode == OutputMode::Complementary {
            for pair in 0..OUTPUT_PAIRS as u8 {
                pwm.configure_deadtime(pair, self.deadtime_config())?;
            }
        }

        let mut interrupts = InterruptFlags::empty();
        for id in 0..COMPARE_CHANNELS as ChannelId {
            let config = self.channel_config(id);
            if config.ramp_step.is_some() {
                interrupts |= InterruptFlags::compare(id);
            }
            pwm.configure_channel(id, config)?;
        }

        pwm.route_event(
            self.fault_event_channel,
            EventSource::Software,
            self.fault_inputs,
        )?;
        pwm.enable_interrupts(interrupts);
        // Sets or clears the fault interrupt on top of the compare mask.
        pwm.configure_fault(self.fault_config())?;
        pwm.enable_outputs(Pins::all());
        Ok(())
    }
}
