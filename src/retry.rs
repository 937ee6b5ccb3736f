//! Retry and polling for firewall API calls.
//!
//! Two loops share one policy type:
//! - [`RetryPolicy::retry_if`] re-issues a call while it fails with an error
//!   the caller considers transient (throttling, internal errors)
//! - [`RetryPolicy::poll_until`] re-issues a read until its result satisfies
//!   a condition, such as a deleted rule group finally describing as gone
//!
//! # Example
//!
//! ```rust,ignore
//! use netfw::retry::{Backoff, Jitter, RetryPolicy};
//! use std::time::Duration;
//!
//! let policy = RetryPolicy::builder()
//!     .max_retries(5)
//!     .initial_delay(Duration::from_millis(200))
//!     .backoff(Backoff::Exponential { multiplier: 2.0 })
//!     .jitter(Jitter::Full)
//!     .max_delay(Duration::from_secs(20))
//!     .build();
//!
//! let page = policy
//!     .retry_if(|| api.list_rule_groups(None, 100), Error::is_transient)
//!     .await?;
//! ```

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

/// How the delay grows between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum Backoff {
    Constant,
    /// `initial_delay * multiplier^attempt`
    Exponential { multiplier: f64 },
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Exponential { multiplier: 2.0 }
    }
}

impl Backoff {
    /// Delay before retry number `attempt` (0-indexed), before capping.
    pub fn delay(&self, attempt: u32, initial: Duration) -> Duration {
        match self {
            Self::Constant => initial,
            Self::Exponential { multiplier } => {
                let factor = multiplier.powi(attempt.min(i32::MAX as u32) as i32);
                Duration::try_from_secs_f64(initial.as_secs_f64() * factor)
                    .unwrap_or(Duration::MAX)
            }
        }
    }
}

/// Randomization applied to each delay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Jitter {
    None,
    /// Uniform in `[0, delay)`
    #[default]
    Full,
}

impl Jitter {
    pub fn apply(&self, delay: Duration) -> Duration {
        match self {
            Self::None => delay,
            Self::Full if delay.is_zero() => delay,
            Self::Full => {
                let millis = delay.as_millis().min(u64::MAX as u128) as u64;
                Duration::from_millis(rand::thread_rng().gen_range(0..millis.max(1)))
            }
        }
    }
}

/// Bounds and pacing for repeated calls.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub initial_delay: Duration,
    /// Cap on any single delay
    pub max_delay: Duration,
    /// Overall limit across every attempt and delay
    pub deadline: Option<Duration>,
    pub backoff: Backoff,
    pub jitter: Jitter,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(20),
            deadline: None,
            backoff: Backoff::default(),
            jitter: Jitter::default(),
        }
    }
}

impl RetryPolicy {
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder::default()
    }

    /// Fixed `delay` between attempts, no jitter.
    pub fn constant(max_retries: u32, delay: Duration) -> Self {
        Self {
            max_retries,
            initial_delay: delay,
            max_delay: delay,
            deadline: None,
            backoff: Backoff::Constant,
            jitter: Jitter::None,
        }
    }

    /// Polls every `interval` until `timeout` has passed.
    pub fn polling(interval: Duration, timeout: Duration) -> Self {
        Self {
            max_retries: u32::MAX,
            deadline: Some(timeout),
            ..Self::constant(0, interval)
        }
    }

    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.jitter
            .apply(self.backoff.delay(attempt, self.initial_delay).min(self.max_delay))
    }

    /// Delay before the next attempt, or `None` when attempts or time are
    /// used up.
    fn next_delay(&self, attempt: u32, started: Instant) -> Option<Duration> {
        if attempt >= self.max_retries {
            return None;
        }
        let delay = self.delay_for_attempt(attempt);
        match self.deadline {
            Some(deadline) if delay > deadline.saturating_sub(started.elapsed()) => None,
            _ => Some(delay),
        }
    }

    /// Runs `operation`, retrying the errors `transient` accepts.
    ///
    /// Any other error is returned at once as [`RetryError::Permanent`].
    pub async fn retry_if<F, Fut, T, E, P>(
        &self,
        mut operation: F,
        transient: P,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
        P: Fn(&E) -> bool,
    {
        let started = Instant::now();
        let mut attempt = 0;

        loop {
            let err = match operation().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(retries = attempt, "Call succeeded after retrying");
                    }
                    return Ok(value);
                }
                Err(e) if !transient(&e) => return Err(RetryError::Permanent(e)),
                Err(e) => e,
            };

            let Some(delay) = self.next_delay(attempt, started) else {
                return Err(RetryError::Exhausted {
                    attempts: attempt + 1,
                    last_error: err,
                });
            };

            warn!(
                attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Transient error, retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// Runs `operation` until `done` accepts its result.
    ///
    /// Errors end the poll immediately; only unmet conditions are retried.
    pub async fn poll_until<F, Fut, T, E, C>(
        &self,
        mut operation: F,
        done: C,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: Fn(&T) -> bool,
    {
        let started = Instant::now();
        let mut attempt = 0;

        loop {
            let value = operation().await.map_err(RetryError::Permanent)?;
            if done(&value) {
                return Ok(value);
            }

            let Some(delay) = self.next_delay(attempt, started) else {
                return Err(RetryError::ConditionNotMet {
                    attempts: attempt + 1,
                    elapsed: started.elapsed(),
                });
            };
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RetryPolicyBuilder {
    policy: RetryPolicy,
}

impl RetryPolicyBuilder {
    pub fn max_retries(mut self, n: u32) -> Self {
        self.policy.max_retries = n;
        self
    }

    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.policy.initial_delay = delay;
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.policy.max_delay = delay;
        self
    }

    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.policy.deadline = Some(deadline);
        self
    }

    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.policy.backoff = backoff;
        self
    }

    pub fn jitter(mut self, jitter: Jitter) -> Self {
        self.policy.jitter = jitter;
        self
    }

    pub fn build(self) -> RetryPolicy {
        self.policy
    }
}

/// Why a retried or polled call finally gave up.
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// Failed with an error that isn't worth retrying
    #[error("{0}")]
    Permanent(E),

    #[error("gave up after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: E },

    #[error("condition not met after {attempts} attempts ({elapsed:?})")]
    ConditionNotMet { attempts: u32, elapsed: Duration },
}

impl<E> RetryError<E> {
    /// The error from the last attempt, if it failed with one.
    pub fn into_last_error(self) -> Option<E> {
        match self {
            RetryError::Permanent(e) | RetryError::Exhausted { last_error: e, .. } => Some(e),
            RetryError::ConditionNotMet { .. } => None,
        }
    }
}
