use std::time::Duration;

/// Pacing of the simulation relative to wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimeMode {
    /// Simulation runs as fast as possible, no synchronization.
    FreeRunning,
    /// Simulation runs at a scaled rate relative to wall-clock time
    /// (`factor` 1.0 = real time, 0.001 = a thousand times slower).
    Scaled { factor: f32 },
}

impl TimeMode {
    /// Wall-clock time to wait for a span of simulated time.
    ///
    /// `None` when no pacing applies (free running, or a non-positive factor).
    pub fn wall_time(&self, simulated: Duration) -> Option<Duration> {
        match *self {
            TimeMode::Scaled { factor } if factor > 0.0 => Some(Duration::from_secs_f64(
                simulated.as_secs_f64() / factor as f64,
            )),
            _ => None,
        }
    }
}

impl Default for TimeMode {
    fn default() -> Self {
        Self::FreeRunning
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_free_running_never_waits() {
        assert_eq!(TimeMode::default().wall_time(Duration::from_millis(5)), None);
    }

    #[test]
    fn test_scaled_wall_time() {
        let slow = TimeMode::Scaled { factor: 0.5 };
        assert_eq!(
            slow.wall_time(Duration::from_millis(5)),
            Some(Duration::from_millis(10))
        );
        let invalid = TimeMode::Scaled { factor: 0.0 };
        assert_eq!(invalid.wall_time(Duration::from_millis(5)), None);
    }
}
