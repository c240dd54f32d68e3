//! Output trace recording.
//!
//! Records pin edges and accumulates the statistics the scenario tests check:
//! shoot-through ticks and the narrowest hand-over band per complementary
//! pair, per-pin high time and time spent under fault forcing.

use pwm_guard_core::pins::{Pins, OUTPUT_PINS};
use pwm_guard_core::wex::{OutputMode, OUTPUT_PAIRS};
use pwm_guard_core::TickReport;
use serde::{Deserialize, Serialize};

/// Edges kept before the log is truncated.
pub const DEFAULT_EDGE_CAPACITY: usize = 4096;

/// Pin levels after a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub tick: u64,
    pub pins: u8,
}

#[derive(Debug, Clone, Copy, Default)]
struct PairTracker {
    high: bool,
    low: bool,
    /// Tick at which one side dropped with the other side still off
    released_at: Option<(bool, u64)>,
}

impl PairTracker {
    /// Feed the levels of one tick; returns a completed hand-over band.
    fn update(&mut self, now: u64, high: bool, low: bool) -> Option<u64> {
        let mut band = None;
        if self.high && !high && !low {
            self.released_at = Some((true, now));
        } else if self.low && !low && !high {
            self.released_at = Some((false, now));
        }

        let rose_high = high && !self.high;
        let rose_low = low && !self.low;
        if rose_high || rose_low {
            if let Some((was_high, at)) = self.released_at.take() {
                // Only a switch to the opposite side is a hand-over.
                if was_high == rose_low {
                    band = Some(now - at);
                }
            }
        }

        self.high = high;
        self.low = low;
        band
    }
}

/// Aggregated trace statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceSummary {
    pub ticks: u64,
    pub periods: u64,
    pub edges: usize,
    pub truncated: bool,
    /// Ticks with both sides of a pair high outside fault forcing
    pub overlap_ticks: [u64; OUTPUT_PAIRS],
    /// Narrowest idle band between one side dropping and the other rising
    pub min_dead_band: [Option<u64>; OUTPUT_PAIRS],
    pub hand_overs: [u64; OUTPUT_PAIRS],
    pub high_ticks: [u64; OUTPUT_PINS],
    pub forced_ticks: u64,
}

impl TraceSummary {
    /// No pair ever had both sides high outside fault forcing.
    pub fn shoot_through_free(&self) -> bool {
        self.overlap_ticks.iter().all(|&ticks| ticks == 0)
    }

    /// Fraction of recorded ticks a pin spent high.
    pub fn duty_fraction(&self, pin: usize) -> f64 {
        match (self.high_ticks.get(pin), self.ticks) {
            (Some(&high), ticks) if ticks > 0 => high as f64 / ticks as f64,
            _ => 0.0,
        }
    }
}

/// Records pin levels tick by tick.
#[derive(Debug, Clone)]
pub struct TraceRecorder {
    pairs_tracked: bool,
    capacity: usize,
    edges: Vec<Edge>,
    last: Option<Pins>,
    pairs: [PairTracker; OUTPUT_PAIRS],
    summary: TraceSummary,
}

impl TraceRecorder {
    /// Create a recorder; pair statistics are kept in complementary mode.
    pub fn new(mode: OutputMode) -> Self {
        Self::with_capacity(mode, DEFAULT_EDGE_CAPACITY)
    }

    pub fn with_capacity(mode: OutputMode, capacity: usize) -> Self {
        Self {
            pairs_tracked: mode == OutputMode::Complementary,
            capacity,
            edges: Vec::new(),
            last: None,
            pairs: [PairTracker::default(); OUTPUT_PAIRS],
            summary: TraceSummary::default(),
        }
    }

    /// Record the outcome of the tick ending at `now`.
    pub fn record(&mut self, now: u64, report: &TickReport, forcing: bool) {
        let pins = report.pins;
        self.summary.ticks += 1;
        if report.boundary() {
            self.summary.periods += 1;
        }

        if self.last != Some(pins) {
            self.summary.edges += 1;
            if self.edges.len() < self.capacity {
                self.edges.push(Edge {
                    tick: now,
                    pins: pins.bits(),
                });
            } else {
                self.summary.truncated = true;
            }
            self.last = Some(pins);
        }

        for (pin, high_ticks) in self.summary.high_ticks.iter_mut().enumerate() {
            if pins.is_high(pin) {
                *high_ticks += 1;
            }
        }

        if forcing {
            self.summary.forced_ticks += 1;
        }
        if !self.pairs_tracked {
            return;
        }

        for (pair, tracker) in self.pairs.iter_mut().enumerate() {
            let pair_id = pair as u8;
            let high = pins.contains(Pins::high_side(pair_id));
            let low = pins.contains(Pins::low_side(pair_id));
            if forcing {
                *tracker = PairTracker {
                    high,
                    low,
                    released_at: None,
                };
                continue;
            }
            if high && low {
                self.summary.overlap_ticks[pair] += 1;
            }
            if let Some(band) = tracker.update(now, high, low) {
                self.summary.hand_overs[pair] += 1;
                let min = &mut self.summary.min_dead_band[pair];
                *min = Some(min.map_or(band, |current| current.min(band)));
            }
        }
    }

    /// Recorded edges, oldest first.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn summary(&self) -> &TraceSummary {
        &self.summary
    }

    /// Serialize the summary as JSON.
    pub fn summary_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.summary)
    }
}
