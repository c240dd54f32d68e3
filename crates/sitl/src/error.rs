use pwm_guard_core::interrupt::Interrupt;
use pwm_guard_core::parameters::ParameterError;
use pwm_guard_core::ConfigError;

/// Errors that can occur while building or running a simulation.
#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    #[error("Configuration rejected: {0}")]
    Config(ConfigError),

    #[error("Parameter error: {0}")]
    Parameter(ParameterError),

    #[error("Handler already bound: {0:?}")]
    HandlerAlreadyBound(Interrupt),

    #[error("Interrupt storm: {0} requests in one tick")]
    InterruptStorm(usize),

    #[error("Unknown scenario: {0}")]
    UnknownScenario(String),

    #[error("Clock frequency must be positive")]
    ZeroClock,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

// The core error types are no_std and do not implement `std::error::Error`,
// so they are wrapped without a `#[source]`.
impl From<ConfigError> for SimulationError {
    fn from(error: ConfigError) -> Self {
        Self::Config(error)
    }
}

impl From<ParameterError> for SimulationError {
    fn from(error: ParameterError) -> Self {
        Self::Parameter(error)
    }
}
