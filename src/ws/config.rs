#![expect(
    clippy::module_name_repetitions,
    reason = "Configuration types intentionally mirror the module name for clarity"
)]

use std::time::Duration;

use backoff::backoff::Backoff as _;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};

use super::traits::ReconnectPolicy;

const DEFAULT_HEARTBEAT_INTERVAL_DURATION: Duration = Duration::from_secs(30);
const DEFAULT_RECONNECT_DELAY_DURATION: Duration = Duration::from_secs(5);
const DEFAULT_MAX_BACKOFF_DURATION: Duration = Duration::from_secs(60);
const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

/// Configuration for connection behavior.
#[non_exhaustive]
#[derive(Debug, Clone)]
pub struct Config {
    /// Interval between `heartbeat` frames while connected
    pub heartbeat_interval: Duration,
    /// Upper bound on how long [`crate::channel::Client::start`] waits for the first open.
    /// `None` waits indefinitely.
    pub connect_timeout: Option<Duration>,
    /// Reconnection strategy configuration
    pub reconnect: ReconnectConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL_DURATION,
            connect_timeout: None,
            reconnect: ReconnectConfig::default(),
        }
    }
}

/// Configuration for automatic reconnection behavior.
#[non_exhaustive]
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Maximum number of consecutive reconnection attempts before giving up.
    /// `None` means infinite retries.
    pub max_attempts: Option<u32>,
    /// How the delay between attempts evolves
    pub delay: Delay,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: None, // Infinite reconnection by default
            delay: Delay::Fixed(DEFAULT_RECONNECT_DELAY_DURATION),
        }
    }
}

impl ReconnectConfig {
    /// Build the policy described by this configuration.
    #[must_use]
    pub fn policy(&self) -> Box<dyn ReconnectPolicy> {
        match self.delay {
            Delay::Fixed(delay) => Box::new(FixedDelay {
                delay,
                max_attempts: self.max_attempts,
            }),
            Delay::Exponential {
                initial,
                max,
                multiplier,
            } => Box::new(ExponentialPolicy {
                backoff: ExponentialBackoffBuilder::default()
                    .with_initial_interval(initial)
                    .with_max_interval(max)
                    .with_multiplier(multiplier)
                    .with_max_elapsed_time(None) // We handle max attempts separately
                    .build(),
                max_attempts: self.max_attempts,
            }),
        }
    }
}

/// Delay strategy between reconnection attempts.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Delay {
    /// Same delay before every attempt
    Fixed(Duration),
    /// Exponentially growing delay with jitter, capped at `max`
    Exponential {
        initial: Duration,
        max: Duration,
        multiplier: f64,
    },
}

impl Delay {
    /// Exponential backoff starting at `initial` with the default cap and multiplier.
    #[must_use]
    pub fn exponential(initial: Duration) -> Self {
        Self::Exponential {
            initial,
            max: DEFAULT_MAX_BACKOFF_DURATION,
            multiplier: DEFAULT_BACKOFF_MULTIPLIER,
        }
    }
}

/// Waits the same amount of time before every attempt.
#[non_exhaustive]
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay {
    pub delay: Duration,
    pub max_attempts: Option<u32>,
}

impl FixedDelay {
    /// Retry forever with `delay` between attempts.
    #[must_use]
    pub const fn new(delay: Duration) -> Self {
        Self {
            delay,
            max_attempts: None,
        }
    }
}

impl Default for FixedDelay {
    fn default() -> Self {
        Self::new(DEFAULT_RECONNECT_DELAY_DURATION)
    }
}

impl ReconnectPolicy for FixedDelay {
    fn next_delay(&mut self, attempt: u32) -> Option<Duration> {
        match self.max_attempts {
            Some(max) if attempt > max => None,
            _ => Some(self.delay),
        }
    }
}

/// Exponential backoff with jitter.
#[derive(Debug, Clone)]
pub struct ExponentialPolicy {
    backoff: ExponentialBackoff,
    max_attempts: Option<u32>,
}

impl ReconnectPolicy for ExponentialPolicy {
    fn next_delay(&mut self, attempt: u32) -> Option<Duration> {
        if let Some(max) = self.max_attempts
            && attempt > max
        {
            return None;
        }
        self.backoff.next_backoff()
    }

    fn reset(&mut self) {
        self.backoff.reset();
    }
}
