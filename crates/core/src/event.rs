//! Event channels
//!
//! An event channel connects a source (software strobe or a hardware event
//! generator) to a set of fault inputs. Channels carry no state: firing one
//! simply reports which fault inputs it reaches, and the caller notifies the
//! fault monitor in the same step.

use crate::error::ConfigError;
use crate::wex::FaultInputs;

/// Number of event channels
pub const EVENT_CHANNELS: usize = 8;

/// Event channel index (0..EVENT_CHANNELS)
pub type EventChannelId = u8;

/// Hardware event generator (pin, comparator, other peripheral)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EventGenerator(pub u8);

/// What drives an event channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EventSource {
    /// Channel is disconnected
    #[default]
    Off,
    /// Software strobe only
    Software,
    /// Hardware generator; software strobes are also accepted
    Generator(EventGenerator),
}

/// One channel's routing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EventRoute {
    pub source: EventSource,
    /// Fault inputs subscribed to this channel
    pub users: FaultInputs,
}

/// Event routing matrix
#[derive(Debug, Clone, Default)]
pub struct EventSystem {
    routes: [EventRoute; EVENT_CHANNELS],
}

impl EventSystem {
    pub fn new() -> Self {
        Self::default()
    }

    fn route_mut(&mut self, channel: EventChannelId) -> Result<&mut EventRoute, ConfigError> {
        self.routes
            .get_mut(channel as usize)
            .ok_or(ConfigError::InvalidEventChannel(channel))
    }

    /// Connect a channel to a source and a set of fault inputs
    pub fn connect(
        &mut self,
        channel: EventChannelId,
        source: EventSource,
        users: FaultInputs,
    ) -> Result<(), ConfigError> {
        *self.route_mut(channel)? = EventRoute { source, users };
        Ok(())
    }

    /// Disconnect a channel
    pub fn disconnect(&mut self, channel: EventChannelId) -> Result<(), ConfigError> {
        *self.route_mut(channel)? = EventRoute::default();
        Ok(())
    }

    /// Routing of a channel
    pub fn route(&self, channel: EventChannelId) -> Option<EventRoute> {
        self.routes.get(channel as usize).copied()
    }

    /// Software strobe on a channel
    ///
    /// Returns the fault inputs reached; empty when the channel is off.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEventChannel` for an unknown channel.
    pub fn fire(&self, channel: EventChannelId) -> Result<FaultInputs, ConfigError> {
        let route = self
            .route(channel)
            .ok_or(ConfigError::InvalidEventChannel(channel))?;
        Ok(match route.source {
            EventSource::Off => FaultInputs::empty(),
            EventSource::Software | EventSource::Generator(_) => route.users,
        })
    }

    /// Hardware generator activity
    ///
    /// Returns the union of fault inputs on every channel driven by the
    /// generator.
    pub fn signal(&self, generator: EventGenerator) -> FaultInputs {
        self.routes
            .iter()
            .filter(|route| route.source == EventSource::Generator(generator))
            .fold(FaultInputs::empty(), |acc, route| acc | route.users)
    }
}
