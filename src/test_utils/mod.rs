//! Utilities to help with testing waitdb

use crate::backend::{self, Connector};
use crate::connection_string::ConnectionSpec;
use crate::prober::{ProbeOutcome, Prober};

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// A step of a probe which a [ScriptedConnector] can be told to break.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Step {
    Connect,
    Ping,
    Query,
}

/// Observes what a [ScriptedConnector] was asked to do.
#[derive(Default)]
pub struct ConnectorStats {
    opened: AtomicUsize,
    closed: AtomicUsize,
    last_query: Mutex<Option<String>>,
}

impl ConnectorStats {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn last_query(&self) -> Option<String> {
        self.last_query.lock().unwrap().clone()
    }
}

/// A test-only connector which reports a fixed number of rows, and which
/// can fail or stall at any step.
pub struct ScriptedConnector {
    rows: usize,
    fail_at: Option<Step>,
    stall_at: Option<Step>,
    refuse: bool,
    stats: Arc<ConnectorStats>,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self {
            rows: 1,
            fail_at: None,
            stall_at: None,
            refuse: false,
            stats: Arc::new(ConnectorStats::default()),
        }
    }

    pub fn with_rows(mut self, rows: usize) -> Self {
        self.rows = rows;
        self
    }

    pub fn failing(mut self, step: Step) -> Self {
        self.fail_at = Some(step);
        self
    }

    /// Makes every connection attempt fail as if nothing listens on the port.
    pub fn refusing(mut self) -> Self {
        self.refuse = true;
        self
    }

    /// Makes `step` take an unrealistically long time.
    pub fn stalling(mut self, step: Step) -> Self {
        self.stall_at = Some(step);
        self
    }

    pub fn stats(&self) -> Arc<ConnectorStats> {
        self.stats.clone()
    }

    // Internal shared logic for each of the connector APIs
    async fn react(&self, step: Step) -> Result<(), backend::Error> {
        if self.stall_at == Some(step) {
            tokio::time::sleep(tokio::time::Duration::from_secs(9999999)).await;
        }
        if self.refuse && step == Step::Connect {
            return Err(backend::Error::Io(std::io::Error::from(
                std::io::ErrorKind::ConnectionRefused,
            )));
        }
        if self.fail_at == Some(step) {
            let err = anyhow::anyhow!("scripted failure during {step:?}");
            return Err(match step {
                Step::Connect => backend::Error::InvalidConnectionString(err.to_string()),
                _ => backend::Error::Other(err),
            });
        }
        Ok(())
    }
}

pub struct ScriptedConnection {
    stats: Arc<ConnectorStats>,
}

impl Drop for ScriptedConnection {
    fn drop(&mut self) {
        self.stats.closed.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    type Connection = ScriptedConnection;

    async fn connect(&self, _spec: &ConnectionSpec) -> Result<Self::Connection, backend::Error> {
        self.react(Step::Connect).await?;
        self.stats.opened.fetch_add(1, Ordering::SeqCst);
        Ok(ScriptedConnection {
            stats: self.stats.clone(),
        })
    }

    async fn ping(&self, _conn: &mut Self::Connection) -> Result<(), backend::Error> {
        self.react(Step::Ping).await
    }

    async fn count_rows(
        &self,
        _conn: &mut Self::Connection,
        query: &str,
    ) -> Result<usize, backend::Error> {
        *self.stats.last_query.lock().unwrap() = Some(query.to_string());
        self.react(Step::Query).await?;
        Ok(self.rows)
    }
}

/// A test-only prober which replays a list of outcomes, repeating the last
/// one forever.
pub struct ScriptedProber {
    outcomes: Mutex<VecDeque<ProbeOutcome>>,
    last: Mutex<ProbeOutcome>,
    calls: AtomicUsize,
}

impl ScriptedProber {
    pub fn new(outcomes: impl IntoIterator<Item = ProbeOutcome>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into_iter().collect()),
            last: Mutex::new(ProbeOutcome::Unreachable("no script".to_string())),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn always(outcome: ProbeOutcome) -> Self {
        Self::new([outcome])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Prober for ScriptedProber {
    async fn probe(&self, _spec: &ConnectionSpec) -> ProbeOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut last = self.last.lock().unwrap();
        if let Some(next) = self.outcomes.lock().unwrap().pop_front() {
            *last = next;
        }
        last.clone()
    }
}
