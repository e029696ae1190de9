//! The poll loop, which probes a database until it is ready or time runs out.

use crate::connection_string::ConnectionSpec;
use crate::gate::LockGate;
use crate::jitter::Jitter;
use crate::policy::{ConnectFailurePolicy, Policy};
use crate::prober::{ProbeOutcome, SharedProber};
#[cfg(feature = "probes")]
use crate::probes;

use debug_ignore::DebugIgnore;
use tokio::time::Duration;
use tracing::{event, instrument, Level};

/// Where the poll loop is within a cycle.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum State {
    // Between probes.
    //
    // - (Gate holds) State becomes Gated
    // - (Otherwise) State becomes Probing
    Waiting,

    // The lock gate asked us to skip this cycle.
    //
    // - (After the delay) State becomes Waiting
    Gated,

    // A probe is in flight.
    //
    // - (On Ready) State becomes Succeeded
    // - (On Empty) State becomes EmptyTerminal
    // - (On ConnectFailed, with ConnectFailurePolicy::Abort) State becomes Aborted
    // - (Otherwise) State becomes Waiting
    Probing,

    // Final states.
    Succeeded,
    EmptyTerminal,
    TimedOut,
    Aborted,
}

impl State {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            State::Succeeded | State::EmptyTerminal | State::TimedOut | State::Aborted
        )
    }
}

/// How the poll loop finished.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The database answered with this many tables.
    Succeeded { tables: usize },

    /// The database is alive, but has no tables.
    Empty,

    /// The timeout elapsed without a successful probe.
    TimedOut,

    /// A connection could not be opened, and the policy forbids retrying.
    Aborted { cause: String },
}

impl Outcome {
    /// The process exit code which reports this outcome.
    pub const fn exit_code(&self) -> u8 {
        match self {
            Outcome::Succeeded { .. } => 0,
            Outcome::Empty => 1,
            Outcome::TimedOut => 10,
            Outcome::Aborted { .. } => 11,
        }
    }
}

/// A summary of one run of the poll loop.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PollReport {
    pub outcome: Outcome,

    /// Cycles started, including gated ones.
    pub cycles: u64,

    /// Probes actually sent to the database.
    pub probes: u64,

    /// Delays slept between cycles.
    pub sleeps: u64,

    /// Budget charged against the timeout.
    pub elapsed: Duration,
}

/// Drives repeated probes of one database.
#[derive(Debug)]
pub struct Poller {
    spec: ConnectionSpec,
    policy: Policy,
    gate: Option<LockGate>,
    prober: DebugIgnore<SharedProber>,
    state: State,
}

impl Poller {
    pub fn new(
        spec: ConnectionSpec,
        policy: Policy,
        gate: Option<LockGate>,
        prober: SharedProber,
    ) -> Self {
        #[cfg(feature = "probes")]
        if let Err(err) = usdt::register_probes() {
            event!(Level::WARN, err = ?err, "Failed to register USDT probes");
        }

        Self {
            spec,
            policy,
            gate,
            prober: DebugIgnore(prober),
            state: State::Waiting,
        }
    }

    // Transitions to a new state, returning the old state.
    fn state_transition(&mut self, new: State) -> State {
        let old = std::mem::replace(&mut self.state, new);
        debug_assert!(!old.is_terminal(), "Left terminal state {old:?}");
        if old != new {
            event!(Level::DEBUG, from = ?old, to = ?new, "state_transition");
        }
        old
    }

    fn gate_holds(&self) -> bool {
        let Some(gate) = &self.gate else {
            return false;
        };
        if !gate.should_hold() {
            return false;
        }
        event!(
            Level::INFO,
            path = %gate.path().display(),
            polarity = ?gate.polarity(),
            "Lock file asks to wait, not probing the database"
        );
        #[cfg(feature = "probes")]
        probes::gate__held!(|| gate.path().to_str().unwrap_or_default());
        true
    }

    // Probes once, returning the final outcome if the loop should stop.
    async fn probe(&mut self) -> Option<Outcome> {
        self.state_transition(State::Probing);

        let outcome = self.prober.probe(&self.spec).await;
        match outcome {
            ProbeOutcome::Ready(0) | ProbeOutcome::Empty => {
                event!(Level::INFO, "Read 0 row(s) successfully.");
                event!(Level::WARN, "Database is empty! Initialization is necessary.");
                self.state_transition(State::EmptyTerminal);
                Some(Outcome::Empty)
            }
            ProbeOutcome::Ready(tables) => {
                event!(Level::INFO, "Read {tables} row(s) successfully.");
                self.state_transition(State::Succeeded);
                Some(Outcome::Succeeded { tables })
            }
            ProbeOutcome::ConnectFailed(cause)
                if self.policy.connect_failure == ConnectFailurePolicy::Abort =>
            {
                event!(Level::ERROR, err = %cause, "Error creating connection, giving up");
                self.state_transition(State::Aborted);
                Some(Outcome::Aborted { cause })
            }
            ProbeOutcome::Unreachable(cause)
            | ProbeOutcome::DriverError(cause)
            | ProbeOutcome::ConnectFailed(cause) => {
                event!(Level::DEBUG, err = %cause, "Database is not ready");
                self.state_transition(State::Waiting);
                None
            }
        }
    }

    /// Runs the loop to completion.
    #[instrument(level = "debug", skip(self), name = "Poller::run")]
    pub async fn run(mut self) -> PollReport {
        let timeout = self.policy.timeout;
        let period = self.policy.period;

        event!(
            Level::DEBUG,
            max_cycles = self.policy.max_cycles(),
            connect_failure = ?self.policy.connect_failure,
            "Starting to poll"
        );

        let mut report = PollReport {
            outcome: Outcome::TimedOut,
            cycles: 0,
            probes: 0,
            sleeps: 0,
            elapsed: Duration::ZERO,
        };

        while report.elapsed < timeout {
            report.cycles += 1;

            if self.gate_holds() {
                self.state_transition(State::Gated);
            } else {
                report.probes += 1;
                if let Some(outcome) = self.probe().await {
                    report.outcome = outcome;
                    return report;
                }
            }

            event!(
                Level::INFO,
                "Wait {} seconds for Database '{}'. Will give up in {} seconds.",
                report.elapsed.as_secs(),
                self.spec.target().database,
                timeout.saturating_sub(report.elapsed).as_secs(),
            );

            tokio::time::sleep(period.jitter()).await;
            report.sleeps += 1;
            report.elapsed += period;
            self.state_transition(State::Waiting);
        }

        self.state_transition(State::TimedOut);
        event!(Level::ERROR, "{}", not_found_message(&self.spec, report.elapsed));
        report
    }
}

// Names everything about the target except the password.
fn not_found_message(spec: &ConnectionSpec, elapsed: Duration) -> String {
    let target = spec.target();
    format!(
        "No database '{}' found in {} seconds. Please check your configuration \
         [host: {}, database: {}, port: {}, user: {}]",
        target.database,
        elapsed.as_secs(),
        target.host,
        target.database,
        target.effective_port(),
        spec.credentials().user,
    )
}
