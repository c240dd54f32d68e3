//! Interrupt dispatcher.
//!
//! Plays the role of the interrupt controller's vector table: handlers are
//! bound per interrupt source and run in priority order (fault first) until
//! no enabled request is left. The dispatcher acknowledges each flag before
//! calling its handler, so a handler may re-raise it.

use std::collections::HashMap;

use pwm_guard_core::interrupt::Interrupt;
use pwm_guard_core::timer::COMPARE_CHANNELS;
use pwm_guard_core::{ConfigError, PwmController};
use serde::{Deserialize, Serialize};

use crate::error::SimulationError;

/// Upper bound on handler invocations per dispatch.
pub const MAX_DISPATCH_PER_TICK: usize = 32;

/// Interrupt handler bound to one source.
pub type Handler = Box<dyn FnMut(&mut PwmController, Interrupt) -> Result<(), ConfigError>>;

/// Handler invocation counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchStats {
    pub fault: u64,
    pub compare: [u64; COMPARE_CHANNELS],
    pub overflow: u64,
    /// Requests acknowledged without a bound handler
    pub unhandled: u64,
}

impl DispatchStats {
    fn record(&mut self, irq: Interrupt) {
        match irq {
            Interrupt::Fault => self.fault += 1,
            Interrupt::CompareMatch(ch) => {
                if let Some(count) = self.compare.get_mut(ch as usize) {
                    *count += 1;
                }
            }
            Interrupt::Overflow => self.overflow += 1,
        }
    }

    /// Total handler invocations.
    pub fn total(&self) -> u64 {
        self.fault + self.compare.iter().sum::<u64>() + self.overflow
    }
}

/// Priority dispatcher for controller interrupts.
#[derive(Default)]
pub struct InterruptDispatcher {
    handlers: HashMap<Interrupt, Handler>,
    stats: DispatchStats,
}

impl InterruptDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a handler. Returns error if the source already has one.
    pub fn bind(&mut self, irq: Interrupt, handler: Handler) -> Result<(), SimulationError> {
        if self.handlers.contains_key(&irq) {
            return Err(SimulationError::HandlerAlreadyBound(irq));
        }
        self.handlers.insert(irq, handler);
        Ok(())
    }

    /// Remove a handler. Returns `true` if one was bound.
    pub fn unbind(&mut self, irq: Interrupt) -> bool {
        self.handlers.remove(&irq).is_some()
    }

    /// Whether a source has a handler.
    pub fn is_bound(&self, irq: Interrupt) -> bool {
        self.handlers.contains_key(&irq)
    }

    /// Serve every enabled request, highest priority first.
    ///
    /// Returns the number of requests served.
    pub fn dispatch(&mut self, pwm: &mut PwmController) -> Result<usize, SimulationError> {
        let mut served = 0;
        while let Some(irq) = pwm.next_pending_interrupt() {
            if served == MAX_DISPATCH_PER_TICK {
                return Err(SimulationError::InterruptStorm(served));
            }
            pwm.acknowledge(irq);
            match self.handlers.get_mut(&irq) {
                Some(handler) => {
                    handler(&mut *pwm, irq)?;
                    self.stats.record(irq);
                }
                None => self.stats.unhandled += 1,
            }
            served += 1;
        }
        Ok(served)
    }

    pub fn stats(&self) -> &DispatchStats {
        &self.stats
    }
}

/// Handler running the duty-cycle update task of the matched channel.
pub fn duty_ramp_handler() -> Handler {
    Box::new(|pwm, irq| {
        if let Interrupt::CompareMatch(channel) = irq {
            pwm.on_compare_match(channel)?;
        }
        Ok(())
    })
}

/// Handler acknowledging fault detections.
///
/// Outputs are already forced when it runs; the handler has nothing left
/// to do but clear the flag.
pub fn fault_ack_handler() -> Handler {
    Box::new(|_, _| Ok(()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pwm_guard_core::event::EventSource;
    use pwm_guard_core::interrupt::InterruptFlags;
    use pwm_guard_core::timer::{CarrierConfig, ChannelConfig};
    use pwm_guard_core::wex::{FaultConfig, FaultInputs};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn controller() -> PwmController {
        let mut pwm = PwmController::new();
        pwm.configure_carrier(CarrierConfig {
            period: 9,
            ..Default::default()
        })
        .unwrap();
        pwm.configure_channel(
            0,
            ChannelConfig {
                max_duty: 8,
                ramp_step: Some(1),
                ..Default::default()
            },
        )
        .unwrap();
        pwm.configure_fault(FaultConfig::latched()).unwrap();
        pwm.route_event(0, EventSource::Software, FaultInputs::A)
            .unwrap();
        pwm.enable_interrupts(InterruptFlags::all());
        pwm
    }

    #[test]
    fn test_bind_twice_rejected() {
        let mut dispatcher = InterruptDispatcher::new();
        dispatcher
            .bind(Interrupt::Fault, fault_ack_handler())
            .unwrap();
        assert!(matches!(
            dispatcher.bind(Interrupt::Fault, fault_ack_handler()),
            Err(SimulationError::HandlerAlreadyBound(Interrupt::Fault))
        ));
        assert!(dispatcher.unbind(Interrupt::Fault));
        assert!(!dispatcher.is_bound(Interrupt::Fault));
    }

    #[test]
    fn test_fault_served_before_compare() {
        let mut pwm = controller();
        let order = Rc::new(RefCell::new(Vec::new()));
        let mut dispatcher = InterruptDispatcher::new();
        for irq in [Interrupt::CompareMatch(0), Interrupt::Fault] {
            let order = Rc::clone(&order);
            dispatcher
                .bind(
                    irq,
                    Box::new(move |_, irq| {
                        order.borrow_mut().push(irq);
                        Ok(())
                    }),
                )
                .unwrap();
        }

        pwm.start().unwrap();
        // Run until channel 0 (duty 0) matches, then trip the fault.
        while !pwm.tick().matches.contains(pwm_guard_core::timer::Channels::CH0) {}
        pwm.fire_fault_event(0).unwrap();

        let served = dispatcher.dispatch(&mut pwm).unwrap();
        assert!(served >= 2);
        let order = order.borrow();
        assert_eq!(order[0], Interrupt::Fault);
        assert_eq!(order[1], Interrupt::CompareMatch(0));
        assert_eq!(pwm.next_pending_interrupt(), None);
    }

    #[test]
    fn test_unhandled_requests_are_counted() {
        let mut pwm = controller();
        pwm.start().unwrap();
        pwm.fire_fault_event(0).unwrap();

        let mut dispatcher = InterruptDispatcher::new();
        dispatcher.dispatch(&mut pwm).unwrap();
        assert_eq!(dispatcher.stats().unhandled, 1);
        assert_eq!(dispatcher.stats().total(), 0);
    }

    #[test]
    fn test_ramp_handler_writes_pending() {
        let mut pwm = controller();
        let mut dispatcher = InterruptDispatcher::new();
        dispatcher
            .bind(Interrupt::CompareMatch(0), duty_ramp_handler())
            .unwrap();
        pwm.start().unwrap();

        while !pwm.tick().matches.contains(pwm_guard_core::timer::Channels::CH0) {}
        dispatcher.dispatch(&mut pwm).unwrap();
        assert_eq!(pwm.pending_duty(0), Some(1));
        assert_eq!(dispatcher.stats().compare[0], 1);
    }
}
