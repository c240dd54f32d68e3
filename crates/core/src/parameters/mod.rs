//! Parameter management types and utilities
//!
//! This module provides the parameter store and the PWM parameter set
//! used to configure a [`PwmController`](crate::pwm::PwmController) from
//! named values.

pub mod error;
pub mod pwm;
pub mod storage;

pub use error::ParameterError;
pub use pwm::PwmParams;
pub use storage::{ParamFlags, ParamMetadata, ParamValue, ParameterStore};
pub use storage::{MAX_PARAMS, PARAM_NAME_LEN};
