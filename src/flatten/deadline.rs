//! Cooperative time bound for flattening.

use std::fmt;
use std::time::{Duration, Instant};

/// A point in time after which flattening should stop.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    limit: Option<Duration>,
}

/// Returned by [`Deadline::check`] once the limit has passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeadlineExceeded {
    /// The limit that was exceeded.
    pub limit: Duration,
}

impl fmt::Display for DeadlineExceeded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "deadline of {:?} exceeded", self.limit)
    }
}

impl std::error::Error for DeadlineExceeded {}

impl Deadline {
    /// A deadline that never expires.
    pub fn none() -> Self {
        Self {
            started: Instant::now(),
            limit: None,
        }
    }

    /// Expire `limit` from now.
    pub fn after(limit: Duration) -> Self {
        Self {
            started: Instant::now(),
            limit: Some(limit),
        }
    }

    /// The configured limit, if any.
    pub fn limit(&self) -> Option<Duration> {
        self.limit
    }

    /// True once the limit has elapsed.
    pub fn expired(&self) -> bool {
        match self.limit {
            Some(limit) => self.started.elapsed() >= limit,
            None => false,
        }
    }

    /// `Err` once the limit has elapsed.
    pub fn check(&self) -> Result<(), DeadlineExceeded> {
        match self.limit {
            Some(limit) if self.expired() => Err(DeadlineExceeded { limit }),
            _ => Ok(()),
        }
    }
}
