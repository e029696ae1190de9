//! Configuration options which can alter the behavior of the poll loop.

use tokio::time::Duration;

/// What the poll loop does when a connection cannot even be opened.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ConnectFailurePolicy {
    /// Treat the failure like any other unreachable database.
    #[default]
    Retry,

    /// Stop waiting immediately.
    Abort,
}

/// Bounds on each step of a single probe.
#[derive(Clone, Debug)]
pub struct ProbeConfig {
    /// How long opening a connection may take.
    pub connect_timeout: Duration,

    /// How long the liveness round-trip may take.
    pub ping_timeout: Duration,

    /// How long running and reading the readiness query may take.
    pub query_timeout: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            ping_timeout: Duration::from_secs(10),
            query_timeout: Duration::from_secs(30),
        }
    }
}

/// Policy which governs how long, and how often, a database is polled.
#[derive(Clone, Debug)]
pub struct Policy {
    /// Total budget before giving up.
    ///
    /// Must be greater than [Self::period].
    pub timeout: Duration,

    /// Budget charged per cycle. The actual sleep between cycles is drawn
    /// uniformly from `[0, period)`.
    pub period: Duration,

    pub connect_failure: ConnectFailurePolicy,
}

impl Policy {
    /// The number of cycles which fit into the timeout, rounding up.
    pub fn max_cycles(&self) -> u64 {
        let period = self.period.as_millis().max(1);
        self.timeout.as_millis().div_ceil(period) as u64
    }
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(200),
            period: Duration::from_secs(20),
            connect_failure: ConnectFailurePolicy::default(),
        }
    }
}
