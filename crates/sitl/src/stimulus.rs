//! Application-side stimuli.
//!
//! Stimuli stand in for the application main loop: instead of busy-waiting
//! they are polled once per simulated tick and emit [`Action`]s when due.
//! All schedules are expressed in clock ticks; the constructors taking
//! microseconds convert through a [`SimClock`].

use pwm_guard_core::event::{EventChannelId, EventGenerator};
use pwm_guard_core::timer::ChannelId;
use pwm_guard_core::{ConfigError, PwmController};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::clock::SimClock;

/// One application call into the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    FireFault(EventChannelId),
    ClearFault,
    SignalGenerator(u8),
    WriteDuty { channel: ChannelId, duty: u16 },
    WriteScaledDuty { channel: ChannelId, fraction: u16 },
    SetAmplitude(u16),
    SetPattern(u8),
}

impl Action {
    /// Perform the call.
    pub fn apply(&self, pwm: &mut PwmController) -> Result<(), ConfigError> {
        match *self {
            Action::FireFault(channel) => {
                pwm.fire_fault_event(channel)?;
            }
            Action::ClearFault => {
                pwm.clear_fault();
            }
            Action::SignalGenerator(generator) => {
                pwm.signal_event_generator(EventGenerator(generator));
            }
            Action::WriteDuty { channel, duty } => pwm.write_duty(channel, duty)?,
            Action::WriteScaledDuty { channel, fraction } => {
                pwm.write_scaled_duty(channel, fraction)?
            }
            Action::SetAmplitude(amplitude) => pwm.set_amplitude(amplitude)?,
            Action::SetPattern(pattern) => pwm.set_pattern(pattern),
        }
        Ok(())
    }
}

/// Source of timed application actions.
pub trait Stimulus {
    /// Short name for logs and summaries.
    fn name(&self) -> &'static str;

    /// Push the actions due at tick `now`.
    fn poll(&mut self, now: u64, actions: &mut Vec<Action>);
}

/// Fixed list of actions at absolute ticks.
#[derive(Debug, Clone, Default)]
pub struct Schedule {
    entries: Vec<(u64, Action)>,
    next: usize,
}

impl Schedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an action at tick `at`; entries are kept sorted (stable).
    pub fn at(mut self, at: u64, action: Action) -> Self {
        let index = self.entries.partition_point(|(tick, _)| *tick <= at);
        self.entries.insert(index, (at, action));
        self
    }

    /// Entries not yet emitted.
    pub fn remaining(&self) -> usize {
        self.entries.len() - self.next
    }
}

impl Stimulus for Schedule {
    fn name(&self) -> &'static str {
        "schedule"
    }

    fn poll(&mut self, now: u64, actions: &mut Vec<Action>) {
        while let Some((tick, action)) = self.entries.get(self.next) {
            if *tick > now {
                break;
            }
            actions.push(*action);
            self.next += 1;
        }
    }
}

/// Repeating fire/clear cycle on an event channel.
///
/// Fires at the start, clears `hold` ticks later, fires again `release`
/// ticks after that. An optional seeded jitter delays every edge by up to
/// `max_jitter` ticks.
#[derive(Debug, Clone)]
pub struct FaultToggle {
    channel: EventChannelId,
    hold: u64,
    release: u64,
    next: u64,
    faulted: bool,
    jitter: Option<(StdRng, u64)>,
}

impl FaultToggle {
    pub fn new(channel: EventChannelId, hold: u64, release: u64) -> Self {
        Self {
            channel,
            hold,
            release,
            next: 0,
            faulted: false,
            jitter: None,
        }
    }

    /// Hold and release times in microseconds.
    pub fn from_us(clock: &SimClock, channel: EventChannelId, hold_us: u64, release_us: u64) -> Self {
        Self::new(channel, clock.us_to_ticks(hold_us), clock.us_to_ticks(release_us))
    }

    /// First fire at tick `at` instead of tick 0.
    pub fn starting_at(mut self, at: u64) -> Self {
        self.next = at;
        self
    }

    /// Add up to `max_jitter` ticks of random delay to every edge.
    pub fn with_jitter(mut self, seed: u64, max_jitter: u64) -> Self {
        self.jitter = Some((StdRng::seed_from_u64(seed), max_jitter));
        self
    }

    fn delay(&mut self, base: u64) -> u64 {
        match &mut self.jitter {
            Some((rng, max)) if *max > 0 => base + rng.gen_range(0..=*max),
            _ => base,
        }
    }
}

impl Stimulus for FaultToggle {
    fn name(&self) -> &'static str {
        "fault-toggle"
    }

    fn poll(&mut self, now: u64, actions: &mut Vec<Action>) {
        if now < self.next {
            return;
        }
        if self.faulted {
            actions.push(Action::ClearFault);
            self.next = now + self.delay(self.release).max(1);
        } else {
            actions.push(Action::FireFault(self.channel));
            self.next = now + self.delay(self.hold).max(1);
        }
        self.faulted = !self.faulted;
    }
}

/// Cycles the amplitude register through a list of values.
#[derive(Debug, Clone)]
pub struct AmplitudeSweep {
    amplitudes: Vec<u16>,
    interval: u64,
    next: u64,
    index: usize,
}

impl AmplitudeSweep {
    pub fn new(amplitudes: Vec<u16>, interval: u64) -> Self {
        Self {
            amplitudes,
            interval: interval.max(1),
            next: 0,
            index: 0,
        }
    }

    /// Amplitude that the next step writes.
    pub fn upcoming(&self) -> Option<u16> {
        self.amplitudes.get(self.index).copied()
    }
}

impl Stimulus for AmplitudeSweep {
    fn name(&self) -> &'static str {
        "amplitude-sweep"
    }

    fn poll(&mut self, now: u64, actions: &mut Vec<Action>) {
        if now < self.next || self.amplitudes.is_empty() {
            return;
        }
        actions.push(Action::SetAmplitude(self.amplitudes[self.index]));
        self.index = (self.index + 1) % self.amplitudes.len();
        self.next = now + self.interval;
    }
}

/// One pattern write, `delay` ticks after the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternStep {
    pub delay: u64,
    pub pattern: u8,
}

/// Timed sequence of pattern writes, optionally repeating.
#[derive(Debug, Clone)]
pub struct PatternSequence {
    steps: Vec<PatternStep>,
    /// Delay before the first step of each repetition, `None` to run once
    repeat_gap: Option<u64>,
    next: u64,
    index: usize,
}

impl PatternSequence {
    pub fn new(steps: Vec<PatternStep>) -> Self {
        let next = steps.first().map_or(0, |step| step.delay);
        Self {
            steps,
            repeat_gap: None,
            next,
            index: 0,
        }
    }

    /// Restart after `gap` ticks once the last step was written.
    ///
    /// A repetition takes at least one tick.
    pub fn repeating(mut self, gap: u64) -> Self {
        self.repeat_gap = Some(gap);
        self
    }

    /// `0x55`, inverted nine times every `step`, then all pins low.
    pub fn complementary(step: u64) -> Vec<PatternStep> {
        let mut steps = vec![PatternStep {
            delay: 0,
            pattern: 0x55,
        }];
        let mut pattern = 0x55u8;
        for _ in 0..9 {
            pattern = !pattern;
            steps.push(PatternStep {
                delay: step,
                pattern,
            });
        }
        steps.push(PatternStep {
            delay: step,
            pattern: 0x00,
        });
        steps
    }

    /// A single high bit walking down from pin 7, then up from pin 1.
    ///
    /// Both walks shift eight times, so each ends with the bit shifted out.
    pub fn stairs(step: u64) -> Vec<PatternStep> {
        let mut steps = Vec::new();
        for (start, down) in [(0x80u8, true), (0x02u8, false)] {
            steps.push(PatternStep {
                delay: 0,
                pattern: start,
            });
            let mut pattern = start;
            for _ in 0..8 {
                pattern = if down {
                    pattern >> 1
                } else {
                    pattern.wrapping_shl(1)
                };
                steps.push(PatternStep {
                    delay: step,
                    pattern,
                });
            }
        }
        steps.push(PatternStep {
            delay: 0,
            pattern: 0x00,
        });
        steps
    }

    /// Complementary then stairs sequence separated by `gap`.
    pub fn bench(clock: &SimClock) -> Self {
        let gap = clock.us_to_ticks(250);
        let mut steps = Self::complementary(clock.us_to_ticks(25));
        let mut stairs = Self::stairs(clock.us_to_ticks(5));
        if let Some(first) = stairs.first_mut() {
            first.delay = gap;
        }
        steps.extend(stairs);
        Self::new(steps).repeating(gap)
    }

    /// Steps in one repetition.
    pub fn steps(&self) -> &[PatternStep] {
        &self.steps
    }
}

impl Stimulus for PatternSequence {
    fn name(&self) -> &'static str {
        "pattern-sequence"
    }

    fn poll(&mut self, now: u64, actions: &mut Vec<Action>) {
        // Zero-delay steps are written on the same tick.
        while now >= self.next {
            let Some(step) = self.steps.get(self.index) else {
                return;
            };
            actions.push(Action::SetPattern(step.pattern));
            self.index += 1;

            let delay = match self.steps.get(self.index) {
                Some(following) => following.delay,
                None => match self.repeat_gap {
                    Some(gap) => {
                        self.index = 0;
                        gap.max(1)
                    }
                    None => return,
                },
            };
            self.next += delay;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(stimulus: &mut dyn Stimulus, ticks: u64) -> Vec<(u64, Action)> {
        let mut out = Vec::new();
        let mut actions = Vec::new();
        for now in 0..ticks {
            stimulus.poll(now, &mut actions);
            out.extend(actions.drain(..).map(|action| (now, action)));
        }
        out
    }

    #[test]
    fn test_schedule_orders_entries() {
        let mut schedule = Schedule::new()
            .at(10, Action::ClearFault)
            .at(5, Action::FireFault(0))
            .at(10, Action::SetPattern(1));
        let emitted = drain(&mut schedule, 20);
        assert_eq!(
            emitted,
            vec![
                (5, Action::FireFault(0)),
                (10, Action::ClearFault),
                (10, Action::SetPattern(1)),
            ]
        );
        assert_eq!(schedule.remaining(), 0);
    }

    #[test]
    fn test_fault_toggle_alternates() {
        let mut toggle = FaultToggle::new(0, 3, 5);
        let emitted = drain(&mut toggle, 12);
        assert_eq!(
            emitted,
            vec![
                (0, Action::FireFault(0)),
                (3, Action::ClearFault),
                (8, Action::FireFault(0)),
                (11, Action::ClearFault),
            ]
        );
    }

    #[test]
    fn test_fault_toggle_jitter_is_reproducible() {
        let run = |seed| {
            let mut toggle = FaultToggle::new(0, 100, 100).with_jitter(seed, 10);
            drain(&mut toggle, 2000)
        };
        assert_eq!(run(7), run(7));
        for pair in run(7).windows(2) {
            let gap = pair[1].0 - pair[0].0;
            assert!((100..=110).contains(&gap));
        }
    }

    #[test]
    fn test_fault_toggle_delayed_start() {
        let mut toggle = FaultToggle::new(2, 4, 4).starting_at(6);
        let emitted = drain(&mut toggle, 12);
        assert_eq!(
            emitted,
            vec![(6, Action::FireFault(2)), (10, Action::ClearFault)]
        );
    }

    #[test]
    fn test_amplitude_sweep_cycles() {
        let mut sweep = AmplitudeSweep::new(vec![0x4000, 0x8000], 10);
        assert_eq!(sweep.upcoming(), Some(0x4000));
        let emitted = drain(&mut sweep, 25);
        assert_eq!(
            emitted,
            vec![
                (0, Action::SetAmplitude(0x4000)),
                (10, Action::SetAmplitude(0x8000)),
                (20, Action::SetAmplitude(0x4000)),
            ]
        );
        assert_eq!(sweep.upcoming(), Some(0x8000));
        assert_eq!(AmplitudeSweep::new(Vec::new(), 10).upcoming(), None);
    }

    #[test]
    fn test_complementary_pattern_steps() {
        let steps = PatternSequence::complementary(25);
        let patterns: Vec<u8> = steps.iter().map(|s| s.pattern).collect();
        assert_eq!(
            patterns,
            vec![0x55, 0xAA, 0x55, 0xAA, 0x55, 0xAA, 0x55, 0xAA, 0x55, 0xAA, 0x00]
        );
    }

    #[test]
    fn test_stairs_pattern_steps() {
        let patterns: Vec<u8> = PatternSequence::stairs(5)
            .iter()
            .map(|s| s.pattern)
            .collect();
        assert_eq!(
            patterns,
            vec![
                0x80, 0x40, 0x20, 0x10, 0x08, 0x04, 0x02, 0x01, 0x00, // walk down
                0x02, 0x04, 0x08, 0x10, 0x20, 0x40, 0x80, 0x00, 0x00, // walk up
                0x00,
            ]
        );
    }

    #[test]
    fn test_sequence_runs_once_without_repeat() {
        let mut sequence = PatternSequence::new(vec![
            PatternStep {
                delay: 2,
                pattern: 1,
            },
            PatternStep {
                delay: 0,
                pattern: 2,
            },
            PatternStep {
                delay: 3,
                pattern: 3,
            },
        ]);
        let emitted = drain(&mut sequence, 20);
        assert_eq!(
            emitted,
            vec![
                (2, Action::SetPattern(1)),
                (2, Action::SetPattern(2)),
                (5, Action::SetPattern(3)),
            ]
        );
    }

    #[test]
    fn test_sequence_repeats_after_gap() {
        let mut sequence = PatternSequence::new(vec![
            PatternStep {
                delay: 0,
                pattern: 1,
            },
            PatternStep {
                delay: 2,
                pattern: 0,
            },
        ])
        .repeating(4);
        let emitted = drain(&mut sequence, 10);
        assert_eq!(
            emitted,
            vec![
                (0, Action::SetPattern(1)),
                (2, Action::SetPattern(0)),
                (6, Action::SetPattern(1)),
                (8, Action::SetPattern(0)),
            ]
        );
    }

    #[test]
    fn test_zero_gap_repetition_advances() {
        let mut sequence = PatternSequence::new(vec![
            PatternStep {
                delay: 0,
                pattern: 1,
            },
            PatternStep {
                delay: 0,
                pattern: 2,
            },
        ])
        .repeating(0);
        let emitted = drain(&mut sequence, 3);
        assert_eq!(
            emitted,
            vec![
                (0, Action::SetPattern(1)),
                (0, Action::SetPattern(2)),
                (1, Action::SetPattern(1)),
                (1, Action::SetPattern(2)),
                (2, Action::SetPattern(1)),
                (2, Action::SetPattern(2)),
            ]
        );
    }

    #[test]
    fn test_bench_on_slow_clock_returns() {
        // Every delay rounds to zero ticks at 1 kHz.
        let clock = SimClock::new(1_000).unwrap();
        let mut sequence = PatternSequence::bench(&clock);
        let steps = sequence.steps().len();

        let mut actions = Vec::new();
        sequence.poll(0, &mut actions);
        assert_eq!(actions.len(), steps);
        actions.clear();
        sequence.poll(0, &mut actions);
        assert!(actions.is_empty());
        sequence.poll(1, &mut actions);
        assert_eq!(actions.len(), steps);
    }
}
