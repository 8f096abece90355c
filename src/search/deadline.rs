use std::time::{Duration, Instant};

use crate::errors::{Result, SearchError};

/// Per-query deadline. Workers check it between accumulation batches and
/// between shards during fan-out; on expiry the whole query fails with a
/// timeout and partial results are discarded.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    expires_at: Option<Instant>,
}

impl Deadline {
    /// A deadline that never expires.
    pub fn none() -> Self {
        Deadline {
            started: Instant::now(),
            expires_at: None,
        }
    }

    pub fn within(timeout: Duration) -> Self {
        let now = Instant::now();
        Deadline {
            started: now,
            expires_at: Some(now + timeout),
        }
    }

    pub fn expired(&self) -> bool {
        match self.expires_at {
            Some(at) => Instant::now() >= at,
            None => false,
        }
    }

    pub fn check(&self) -> Result<()> {
        if self.expired() {
            Err(SearchError::Timeout(self.started.elapsed().as_millis()))
        } else {
            Ok(())
        }
    }
}
