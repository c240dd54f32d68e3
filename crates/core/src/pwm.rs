//! PWM controller
//!
//! [`PwmController`] assembles the carrier counter, compare channels, output
//! stage, event routing and interrupt flags into one peripheral model. It
//! is advanced one clock tick at a time by [`PwmController::tick`]; interrupt
//! handlers are run by the caller between ticks (see the simulation crate's
//! dispatcher) and reach back into the controller through
//! [`PwmController::on_compare_match`], [`PwmController::write_duty`] and
//! friends.
//!
//! One clock tick performs, in order:
//!
//! 1. prescaler / counter step
//! 2. on a period boundary: pending compare values promoted, fault monitor
//!    boundary processing, overflow flag raised
//! 3. compare matching against the new counter value
//! 4. raw waveforms → dead time → pattern → fault forcing → pins
//!
//! Configuration follows the hardware rule that static settings are changed
//! only while the counter is stopped. Every configure call validates the
//! resulting channel/pair layout as a whole; a rejected call changes
//! nothing.

use crate::error::ConfigError;
use crate::event::{EventChannelId, EventGenerator, EventSource, EventSystem};
use crate::interrupt::{Interrupt, InterruptController, InterruptFlags};
use crate::pins::Pins;
use crate::timer::{
    AmplitudeScaler, CarrierConfig, CarrierCounter, ChannelConfig, ChannelId, Channels,
    CompareChannel, CounterStep, DutyRamp, PairId, COMPARE_CHANNELS,
};
use crate::wex::{
    DeadTimeConfig, FaultConfig, FaultInputs, FaultState, GatedPair, OutputMode, OutputStage,
    PatternConfig, OUTPUT_PAIRS,
};
use crate::{log_debug, log_info, log_warn};

/// Outcome of one clock tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickReport {
    /// Counter step, `None` when the prescaler swallowed the tick
    pub step: Option<CounterStep>,
    /// Channels whose compare value matched the counter on this tick
    pub matches: Channels,
    /// Channels whose pending value became active on this tick
    pub promoted: Channels,
    /// Fault forcing ended on this tick
    pub fault_released: bool,
    /// Pin levels after this tick
    pub pins: Pins,
}

impl TickReport {
    /// This tick started a new carrier period
    pub fn boundary(&self) -> bool {
        self.step.is_some_and(|step| step.boundary)
    }
}

/// Channel/pair layout checked as a whole by every configure call
#[derive(Debug, Clone, Copy)]
struct Layout {
    period: u16,
    /// `(max_duty, output_pair)` of configured channels
    channels: [Option<(u16, Option<PairId>)>; COMPARE_CHANNELS],
    deadtime: [DeadTimeConfig; OUTPUT_PAIRS],
}

impl Layout {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.period == 0 {
            return Err(ConfigError::ZeroPeriod);
        }

        for (pair, deadtime) in self.deadtime.iter().enumerate() {
            if deadtime.total() >= self.period as u32 {
                return Err(ConfigError::DeadTimeExceedsPeriod {
                    pair: pair as u8,
                    dead_time: deadtime.total(),
                    period: self.period,
                });
            }
        }

        let mut drivers: [Option<ChannelId>; OUTPUT_PAIRS] = [None; OUTPUT_PAIRS];
        for (channel, entry) in self.channels.iter().enumerate() {
            let Some((max_duty, output_pair)) = *entry else {
                continue;
            };
            let channel = channel as ChannelId;

            if max_duty >= self.period {
                return Err(ConfigError::MaxDutyNotBelowPeriod {
                    channel,
                    max_duty,
                    period: self.period,
                });
            }

            let Some(pair) = output_pair else {
                continue;
            };
            let driver = drivers
                .get_mut(pair as usize)
                .ok_or(ConfigError::InvalidPair(pair))?;
            if let Some(other) = *driver {
                return Err(ConfigError::PairAlreadyDriven {
                    pair,
                    channel: other,
                });
            }
            *driver = Some(channel);

            let margin = self.period - max_duty;
            let dead_time = self.deadtime[pair as usize].total();
            if (margin as u32) < dead_time {
                return Err(ConfigError::InsufficientDutyMargin {
                    channel,
                    margin,
                    dead_time,
                });
            }
        }
        Ok(())
    }
}

/// Timer/output-protection subsystem
#[derive(Debug)]
pub struct PwmController {
    counter: CarrierCounter,
    channels: [Option<CompareChannel>; COMPARE_CHANNELS],
    ramps: [Option<DutyRamp>; COMPARE_CHANNELS],
    /// Q15 source value of channels last written through the scaler
    scaled: [Option<u16>; COMPARE_CHANNELS],
    scaler: Option<AmplitudeScaler>,
    stage: OutputStage,
    events: EventSystem,
    interrupts: InterruptController,
}

impl PwmController {
    /// Unconfigured, stopped controller with all outputs disabled
    pub fn new() -> Self {
        Self {
            counter: CarrierCounter::new(),
            channels: [None; COMPARE_CHANNELS],
            ramps: [None; COMPARE_CHANNELS],
            scaled: [None; COMPARE_CHANNELS],
            scaler: None,
            stage: OutputStage::default(),
            events: EventSystem::new(),
            interrupts: InterruptController::new(),
        }
    }

    fn layout(&self) -> Layout {
        let mut channels = [None; COMPARE_CHANNELS];
        for (slot, channel) in channels.iter_mut().zip(self.channels.iter()) {
            *slot = channel
                .as_ref()
                .map(|ch| (ch.max_duty(), ch.output_pair()));
        }
        let mut deadtime = [DeadTimeConfig::default(); OUTPUT_PAIRS];
        for (pair, slot) in deadtime.iter_mut().enumerate() {
            *slot = self.stage.deadtime(pair as PairId).unwrap_or_default();
        }
        Layout {
            period: self.period().unwrap_or(0),
            channels,
            deadtime,
        }
    }

    fn ensure_stopped(&self) -> Result<(), ConfigError> {
        if self.counter.is_running() {
            return Err(ConfigError::CounterRunning);
        }
        Ok(())
    }

    fn carrier_period(&self) -> Result<u16, ConfigError> {
        self.period().ok_or(ConfigError::CarrierNotConfigured)
    }

    fn channel(&self, id: ChannelId) -> Result<&CompareChannel, ConfigError> {
        self.channels
            .get(id as usize)
            .ok_or(ConfigError::InvalidChannel(id))?
            .as_ref()
            .ok_or(ConfigError::ChannelNotConfigured(id))
    }

    fn channel_mut(&mut self, id: ChannelId) -> Result<&mut CompareChannel, ConfigError> {
        self.channels
            .get_mut(id as usize)
            .ok_or(ConfigError::InvalidChannel(id))?
            .as_mut()
            .ok_or(ConfigError::ChannelNotConfigured(id))
    }

    // --- configuration -------------------------------------------------

    /// Configure the carrier counter
    ///
    /// # Errors
    ///
    /// Fails when the counter runs, the period is zero, or the new period
    /// breaks a configured channel or dead-time setting.
    pub fn configure_carrier(&mut self, config: CarrierConfig) -> Result<(), ConfigError> {
        self.ensure_stopped()?;
        config.validate()?;
        let mut layout = self.layout();
        layout.period = config.period;
        layout.validate()?;

        self.counter.configure(config)?;
        log_debug!(
            "Carrier configured: period {}, divisor {}",
            config.period,
            config.divisor.ratio()
        );
        Ok(())
    }

    /// Carrier configuration
    pub fn carrier(&self) -> Option<&CarrierConfig> {
        self.counter.config()
    }

    /// Carrier period (TOP), `None` before `configure_carrier`
    pub fn period(&self) -> Option<u16> {
        self.counter.config().map(|config| config.period)
    }

    /// Configure a compare channel and its duty ramp
    ///
    /// The initial duty becomes active immediately. Any pending or scaled
    /// value of the channel is dropped.
    pub fn configure_channel(
        &mut self,
        id: ChannelId,
        config: ChannelConfig,
    ) -> Result<(), ConfigError> {
        self.ensure_stopped()?;
        let period = self.carrier_period()?;
        if id as usize >= COMPARE_CHANNELS {
            return Err(ConfigError::InvalidChannel(id));
        }
        config.validate(id, period)?;

        let mut layout = self.layout();
        layout.channels[id as usize] = Some((config.max_duty, config.output_pair));
        layout.validate()?;

        let ramp = config
            .ramp_step
            .map(|step| DutyRamp::new(id, step, config.max_duty, config.wrap))
            .transpose()?;

        self.channels[id as usize] = Some(CompareChannel::new(id, &config));
        self.ramps[id as usize] = ramp;
        self.scaled[id as usize] = None;
        log_debug!(
            "Channel {} configured: duty {}, max {}",
            id,
            config.initial_duty,
            config.max_duty
        );
        Ok(())
    }

    /// Configure the dead time of a complementary pair
    pub fn configure_deadtime(
        &mut self,
        pair: PairId,
        config: DeadTimeConfig,
    ) -> Result<(), ConfigError> {
        self.ensure_stopped()?;
        self.carrier_period()?;
        if pair as usize >= OUTPUT_PAIRS {
            return Err(ConfigError::InvalidPair(pair));
        }

        let mut layout = self.layout();
        layout.deadtime[pair as usize] = config;
        layout.validate()?;

        self.stage.configure_deadtime(pair, config)?;
        log_debug!(
            "Pair {} dead time: low {} / high {} ticks",
            pair,
            config.low_side_ticks,
            config.high_side_ticks
        );
        Ok(())
    }

    /// Configure the fault monitor
    ///
    /// Re-arms the monitor. The fault interrupt is enabled or disabled
    /// according to `config.interrupt`.
    pub fn configure_fault(&mut self, config: FaultConfig) -> Result<(), ConfigError> {
        self.ensure_stopped()?;
        self.stage.fault().configure(config);
        let mut mask = self.interrupts.enabled();
        mask.set(InterruptFlags::FAULT, config.interrupt);
        self.interrupts.enable(mask);
        self.stage.refresh();
        Ok(())
    }

    /// Enable amplitude/offset scaling for `write_scaled_duty`
    pub fn configure_scaling(&mut self, scaler: AmplitudeScaler) -> Result<(), ConfigError> {
        self.ensure_stopped()?;
        self.scaler = Some(scaler);
        Ok(())
    }

    /// Select direct or complementary outputs
    pub fn set_output_mode(&mut self, mode: OutputMode) -> Result<(), ConfigError> {
        self.ensure_stopped()?;
        self.stage.set_mode(mode);
        Ok(())
    }

    /// Output mode
    pub fn output_mode(&self) -> OutputMode {
        self.stage.mode()
    }

    /// Set the output-enable mask; disabled pins read low
    pub fn enable_outputs(&mut self, pins: Pins) {
        self.stage.enable(pins);
    }

    /// Set the interrupt enable mask
    pub fn enable_interrupts(&mut self, flags: InterruptFlags) {
        self.interrupts.enable(flags);
    }

    /// Connect an event channel to a source and fault inputs
    pub fn route_event(
        &mut self,
        channel: EventChannelId,
        source: EventSource,
        users: FaultInputs,
    ) -> Result<(), ConfigError> {
        self.events.connect(channel, source, users)
    }

    /// Take over pins with the pattern generator
    pub fn enable_pattern(&mut self, config: PatternConfig) {
        self.stage.pattern_mut().enable(config);
        self.stage.refresh();
    }

    /// Write the pattern value; pins follow at once
    pub fn set_pattern(&mut self, pattern: u8) {
        self.stage.pattern_mut().set_pattern(pattern);
        self.stage.refresh();
    }

    /// Current pattern value
    pub fn pattern(&self) -> u8 {
        self.stage.pattern().pattern()
    }

    /// Return overridden pins to the dead-time gated waveform
    pub fn disable_pattern(&mut self) {
        self.stage.pattern_mut().disable();
        self.stage.refresh();
    }

    // --- run control ---------------------------------------------------

    /// Start the counter
    ///
    /// Starting begins a new carrier period: buffered compare values are
    /// promoted and the initial counter value is compared.
    pub fn start(&mut self) -> Result<(), ConfigError> {
        self.counter.start()?;
        self.stage.reset();

        let count = self.counter.count();
        let mut matched = InterruptFlags::empty();
        for channel in self.channels.iter_mut().flatten() {
            channel.on_period_boundary();
            if channel.check_match(count) {
                matched |= InterruptFlags::compare(channel.id());
            }
        }
        self.interrupts.raise(matched);

        log_info!(
            "PWM started: period {} ticks, {} channel(s)",
            self.period().unwrap_or(0),
            self.channels.iter().flatten().count()
        );
        Ok(())
    }

    /// Stop the counter and drive outputs low (fault forcing still applies)
    pub fn stop(&mut self) {
        if !self.counter.is_running() {
            return;
        }
        self.counter.stop();
        self.stage.reset();
        log_info!("PWM stopped after {} periods", self.counter.periods());
    }

    /// Counter is running
    pub fn is_running(&self) -> bool {
        self.counter.is_running()
    }

    /// Current counter value
    pub fn count(&self) -> u16 {
        self.counter.count()
    }

    /// Completed carrier periods since `start`
    pub fn periods(&self) -> u64 {
        self.counter.periods()
    }

    /// Advance the hardware by one clock tick
    pub fn tick(&mut self) -> TickReport {
        let mut report = TickReport {
            pins: self.stage.pins(),
            ..Default::default()
        };
        if !self.counter.is_running() {
            return report;
        }

        let step = self.counter.clock();
        if let Some(step) = step {
            let mut raised = InterruptFlags::empty();
            if step.boundary {
                for channel in self.channels.iter_mut().flatten() {
                    if channel.on_period_boundary() {
                        report.promoted |= Channels::channel(channel.id());
                    }
                }
                if self.stage.fault().on_period_boundary() {
                    report.fault_released = true;
                    log_info!("Fault forcing released, outputs resume switching");
                }
                raised |= InterruptFlags::OVF;
            }
            for channel in self.channels.iter_mut().flatten() {
                if channel.check_match(step.count) {
                    report.matches |= Channels::channel(channel.id());
                    raised |= InterruptFlags::compare(channel.id());
                }
            }
            self.interrupts.raise(raised);
        }
        report.step = step;

        let count = self.counter.count();
        let (channels, pairs) = self.raw_levels(count);
        report.pins = self.stage.update(channels, pairs);
        report
    }

    fn raw_levels(
        &self,
        count: u16,
    ) -> ([Option<bool>; COMPARE_CHANNELS], [Option<bool>; OUTPUT_PAIRS]) {
        let mut channels = [None; COMPARE_CHANNELS];
        let mut pairs = [None; OUTPUT_PAIRS];
        for (slot, channel) in channels.iter_mut().zip(self.channels.iter()) {
            let Some(channel) = channel else {
                continue;
            };
            let level = channel.raw_output(count);
            *slot = Some(level);
            if let Some(pair) = channel.output_pair() {
                if let Some(entry) = pairs.get_mut(pair as usize) {
                    *entry = Some(level);
                }
            }
        }
        (channels, pairs)
    }

    /// Pin levels
    pub fn outputs(&self) -> Pins {
        self.stage.pins()
    }

    /// Advance one pair's dead-time unit directly
    ///
    /// Bypasses the compare channels; the next `tick` overwrites the pins.
    pub fn apply_deadtime(
        &mut self,
        pair: PairId,
        raw_high: bool,
        raw_low: bool,
    ) -> Result<GatedPair, ConfigError> {
        self.stage.apply(pair, raw_high, raw_low)
    }

    // --- duty cycle ----------------------------------------------------

    /// Active compare value of a channel
    pub fn active_duty(&self, id: ChannelId) -> Option<u16> {
        self.channel(id).ok().map(CompareChannel::active)
    }

    /// Pending compare value of a channel
    pub fn pending_duty(&self, id: ChannelId) -> Option<u16> {
        self.channel(id).ok().and_then(CompareChannel::pending)
    }

    /// Write a channel's pending buffer (ticks)
    ///
    /// # Errors
    ///
    /// Unknown or unconfigured channel, or `duty` above the channel's max.
    pub fn write_duty(&mut self, id: ChannelId, duty: u16) -> Result<(), ConfigError> {
        self.channel_mut(id)?.write(duty)?;
        self.scaled[id as usize] = None;
        Ok(())
    }

    /// Write a channel's pending buffer as a Q15 fraction of the period
    ///
    /// The fraction goes through the amplitude scaler and is clamped to the
    /// channel's max duty.
    pub fn write_scaled_duty(&mut self, id: ChannelId, fraction: u16) -> Result<(), ConfigError> {
        let scaler = self.scaler.ok_or(ConfigError::ScalingNotConfigured)?;
        let period = self.carrier_period()?;
        let channel = self.channel_mut(id)?;
        let ticks = scaler.to_ticks(fraction, period, channel.max_duty());
        channel.write(ticks)?;
        self.scaled[id as usize] = Some(fraction);
        Ok(())
    }

    /// Change the amplitude register
    ///
    /// Every channel last written through `write_scaled_duty` gets its
    /// pending buffer rewritten with the new gain.
    pub fn set_amplitude(&mut self, amplitude: u16) -> Result<(), ConfigError> {
        let scaler = self
            .scaler
            .as_mut()
            .ok_or(ConfigError::ScalingNotConfigured)?;
        scaler.amplitude = amplitude;

        for id in 0..COMPARE_CHANNELS as ChannelId {
            if let Some(fraction) = self.scaled[id as usize] {
                self.write_scaled_duty(id, fraction)?;
            }
        }
        log_debug!("Amplitude set to {:#x}", amplitude);
        Ok(())
    }

    /// Amplitude scaler registers
    pub fn scaler(&self) -> Option<AmplitudeScaler> {
        self.scaler
    }

    /// Duty-cycle update task for a channel
    ///
    /// Derives the next pending value from the active one through the
    /// channel's ramp. Returns the value written, or `None` for channels
    /// without a ramp.
    pub fn on_compare_match(&mut self, id: ChannelId) -> Result<Option<u16>, ConfigError> {
        let active = self.channel(id)?.active();
        let Some(ramp) = self.ramps[id as usize] else {
            return Ok(None);
        };
        let next = ramp.next(active);
        self.write_duty(id, next)?;
        Ok(Some(next))
    }

    // --- faults --------------------------------------------------------

    /// Software strobe on an event channel
    ///
    /// Returns `true` when the strobe tripped the fault monitor. Outputs are
    /// forced before this call returns.
    pub fn fire_fault_event(&mut self, channel: EventChannelId) -> Result<bool, ConfigError> {
        let inputs = self.events.fire(channel)?;
        Ok(self.deliver_fault(inputs))
    }

    /// Hardware generator activity
    pub fn signal_event_generator(&mut self, generator: EventGenerator) -> bool {
        let inputs = self.events.signal(generator);
        self.deliver_fault(inputs)
    }

    fn deliver_fault(&mut self, inputs: FaultInputs) -> bool {
        if inputs.is_empty() {
            return false;
        }
        let tripped = self.stage.fault().notify(inputs);
        if tripped {
            self.interrupts.raise(InterruptFlags::FAULT);
            self.stage.refresh();
        }
        tripped
    }

    /// Leave the faulted state (no-op when armed)
    ///
    /// Outputs resume at the next period boundary.
    pub fn clear_fault(&mut self) -> bool {
        let cleared = self.stage.fault().clear();
        if cleared && !self.counter.is_running() {
            log_warn!("Fault cleared while stopped, outputs held until next period");
        }
        cleared
    }

    /// Fault monitor state
    pub fn fault_status(&self) -> FaultState {
        self.stage.fault().status()
    }

    /// Outputs currently forced to the safe level
    pub fn fault_forcing(&self) -> bool {
        self.stage.fault().is_forcing()
    }

    /// Total fault detections
    pub fn fault_detections(&self) -> u32 {
        self.stage.fault().detections()
    }

    // --- interrupts ----------------------------------------------------

    /// Highest-priority requested interrupt
    pub fn next_pending_interrupt(&self) -> Option<Interrupt> {
        self.interrupts.next_pending()
    }

    /// Clear an interrupt flag
    pub fn acknowledge(&mut self, irq: Interrupt) {
        self.interrupts.acknowledge(irq);
    }

    /// Raised interrupt flags, enabled or not
    pub fn interrupt_flags(&self) -> InterruptFlags {
        self.interrupts.raised()
    }
}

impl Default for PwmController {
    fn default() -> Self {
        Self::new()
    }
}
