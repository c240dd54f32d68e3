//! pwm_guard_core - Complementary PWM generation with fault protection
//!
//! This crate models a timer/counter peripheral paired with a waveform
//! extension: a periodic carrier with double-buffered compare channels,
//! complementary outputs with per-pair dead-time insertion, and a fault
//! latch that forces outputs to a safe level until explicitly cleared.
//!
//! All logic is plain `no_std` code driven one clock tick at a time, so the
//! same types run on a target (ticked from an interrupt) and on the host
//! (ticked by the simulation crate).
//!
//! # Modules
//!
//! - [`timer`]: Carrier counter, compare channels, duty ramps and amplitude scaling
//! - [`wex`]: Output stage (dead-time units, pattern generator, fault monitor)
//! - [`event`]: Event channels routing fault stimuli to fault inputs
//! - [`interrupt`]: Interrupt flags and priority ordering
//! - [`pins`]: Output pin map
//! - [`pwm`]: [`PwmController`](pwm::PwmController), the assembled subsystem
//! - [`parameters`]: Named configuration values and the PWM parameter set
//! - [`error`]: Configuration error type

#![cfg_attr(not(test), no_std)]

pub mod logging;

pub mod error;
pub mod event;
pub mod interrupt;
pub mod parameters;
pub mod pins;
pub mod pwm;
pub mod timer;
pub mod wex;

pub use error::ConfigError;
pub use pwm::{PwmController, TickReport};
