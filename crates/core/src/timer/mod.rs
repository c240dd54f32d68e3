//! Timer/counter
//!
//! Carrier counter, double-buffered compare channels and the per-channel
//! update logic (duty ramps and amplitude scaling).

pub mod carrier;
pub mod compare;
pub mod ramp;
pub mod scaling;

pub use carrier::{
    CarrierConfig, CarrierCounter, ClockDivisor, CountDirection, CounterStep, WaveformMode,
};
pub use compare::{
    ChannelConfig, ChannelId, Channels, CompareChannel, PairId, COMPARE_CHANNELS,
};
pub use ramp::{DutyRamp, RampWrap};
pub use scaling::{AmplitudeScaler, Q15_ONE};
