// src/job/timing.rs

//! Wall-clock accounting around a single resume.

use std::time::{Duration, Instant, TryFromFloatSecsError};

use serde::{Deserialize, Serialize};

/// Ceiling on a job's cumulative running time.
///
/// `Unlimited` never trips. `Limited(Duration::ZERO)` is a real ceiling: any
/// measurable step exceeds it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeBudget {
    #[default]
    Unlimited,
    Limited(Duration),
}

impl TimeBudget {
    /// Seconds as written in configs; `None` means unlimited.
    ///
    /// Fails for negative, non-finite or out-of-range values.
    pub fn try_from_secs_f64(secs: Option<f64>) -> Result<Self, TryFromFloatSecsError> {
        match secs {
            Some(s) => Ok(TimeBudget::Limited(Duration::try_from_secs_f64(s)?)),
            None => Ok(TimeBudget::Unlimited),
        }
    }

    pub fn ceiling(&self) -> Option<Duration> {
        match self {
            TimeBudget::Unlimited => None,
            TimeBudget::Limited(limit) => Some(*limit),
        }
    }

    /// Whether `running_time` is strictly over the ceiling.
    pub fn is_exceeded_by(&self, running_time: Duration) -> bool {
        match self {
            TimeBudget::Unlimited => false,
            TimeBudget::Limited(limit) => running_time > *limit,
        }
    }
}

impl From<Option<Duration>> for TimeBudget {
    fn from(value: Option<Duration>) -> Self {
        match value {
            Some(limit) => TimeBudget::Limited(limit),
            None => TimeBudget::Unlimited,
        }
    }
}

/// Started right before a resume, consumed right after it.
///
/// The step itself is never interrupted; overage is detected once it has
/// returned.
#[derive(Debug)]
#[must_use = "a timing guard measures nothing unless it is stopped"]
pub struct TimingGuard {
    started: Instant,
}

impl TimingGuard {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    /// Add the elapsed time to `running_time` and return the step's share.
    pub fn stop(self, running_time: &mut Duration) -> Duration {
        let elapsed = self.started.elapsed();
        *running_time += elapsed;
        elapsed
    }
}
