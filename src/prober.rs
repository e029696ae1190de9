//! Checks whether a database is reachable, alive, and populated.

use crate::backend::{self, Connector};
use crate::connection_string::{ConnectionSpec, Driver};
use crate::policy::ProbeConfig;
#[cfg(feature = "probes")]
use crate::probes;

use async_trait::async_trait;
use derive_where::derive_where;
use std::sync::Arc;
use thiserror::Error;
use tokio::time::{timeout, Duration};
use tracing::{event, instrument, Level};

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("This build has no driver for '{0}' databases")]
pub struct UnsupportedDriver(pub Driver);

/// The result of a single readiness probe.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The readiness query returned this many rows (never zero).
    Ready(usize),

    /// The database answered the readiness query with no rows: it is alive,
    /// but has not been initialized.
    Empty,

    /// The server refused or dropped the connection, rejected the login, or
    /// did not answer the liveness check.
    Unreachable(String),

    /// The readiness query failed.
    DriverError(String),

    /// No connection handle could be constructed, before any contact with
    /// the server.
    ConnectFailed(String),
}

impl ProbeOutcome {
    #[cfg(feature = "probes")]
    // Convert to a static string for USDT probes.
    const fn as_str(&self) -> &'static str {
        match self {
            ProbeOutcome::Ready(_) => "Ready",
            ProbeOutcome::Empty => "Empty",
            ProbeOutcome::Unreachable(_) => "Unreachable",
            ProbeOutcome::DriverError(_) => "DriverError",
            ProbeOutcome::ConnectFailed(_) => "ConnectFailed",
        }
    }
}

/// Interface for anything which can probe a database.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, spec: &ConnectionSpec) -> ProbeOutcome;
}

pub type SharedProber = Arc<dyn Prober>;

/// Probes a database through a [Connector], one fresh connection per probe.
#[derive_where(Debug)]
pub struct ConnectorProber<C: Connector> {
    #[derive_where(skip)]
    connector: C,
    config: ProbeConfig,
}

impl<C: Connector> ConnectorProber<C> {
    pub fn new(connector: C, config: ProbeConfig) -> Self {
        Self { connector, config }
    }

    // Runs the liveness check and the readiness query on an open connection.
    async fn exercise(&self, conn: &mut C::Connection, spec: &ConnectionSpec) -> ProbeOutcome {
        match timeout(self.config.ping_timeout, self.connector.ping(conn)).await {
            Ok(Ok(())) => event!(Level::INFO, "Connected!"),
            Ok(Err(err)) => {
                let cause = cause(err);
                event!(Level::WARN, err = %cause, "Database did not answer the ping");
                return ProbeOutcome::Unreachable(cause);
            }
            Err(_) => {
                event!(Level::WARN, "Ping timed out");
                return ProbeOutcome::Unreachable(timed_out(self.config.ping_timeout));
            }
        }

        let query = spec.readiness_query();
        match timeout(
            self.config.query_timeout,
            self.connector.count_rows(conn, query),
        )
        .await
        {
            Ok(Ok(0)) => ProbeOutcome::Empty,
            Ok(Ok(count)) => ProbeOutcome::Ready(count),
            Ok(Err(err)) => {
                let cause = cause(err);
                event!(Level::WARN, err = %cause, query, "Readiness query failed");
                ProbeOutcome::DriverError(cause)
            }
            Err(_) => {
                event!(Level::WARN, query, "Readiness query timed out");
                ProbeOutcome::DriverError(timed_out(self.config.query_timeout))
            }
        }
    }
}

fn cause(err: backend::Error) -> String {
    format!("{:#}", anyhow::Error::new(err))
}

fn timed_out(after: Duration) -> String {
    format!("timed out after {after:?}")
}

#[async_trait]
impl<C: Connector> Prober for ConnectorProber<C> {
    #[instrument(level = "debug", skip_all, fields(driver = %spec.driver(), db = %spec))]
    async fn probe(&self, spec: &ConnectionSpec) -> ProbeOutcome {
        #[cfg(feature = "probes")]
        probes::probe__start!(|| (spec.driver_id(), spec.target().host.as_str()));

        let connected = timeout(self.config.connect_timeout, self.connector.connect(spec)).await;
        let outcome = match connected {
            Ok(Ok(mut conn)) => {
                let outcome = self.exercise(&mut conn, spec).await;

                // A close which fails or stalls still drops the connection.
                match timeout(self.config.ping_timeout, self.connector.close(conn)).await {
                    Ok(Ok(())) => (),
                    Ok(Err(err)) => {
                        event!(Level::DEBUG, err = %cause(err), "Failed to close connection")
                    }
                    Err(_) => event!(Level::DEBUG, "Timed out closing connection"),
                }
                outcome
            }
            Ok(Err(err)) if err.is_transient() => {
                let cause = cause(err);
                event!(Level::WARN, err = %cause, "Database is unreachable");
                ProbeOutcome::Unreachable(cause)
            }
            Ok(Err(err)) => {
                let cause = cause(err);
                event!(Level::WARN, err = %cause, "Failed to create connection");
                ProbeOutcome::ConnectFailed(cause)
            }
            Err(_) => {
                event!(Level::WARN, "Connecting timed out");
                ProbeOutcome::Unreachable(timed_out(self.config.connect_timeout))
            }
        };

        #[cfg(feature = "probes")]
        match &outcome {
            ProbeOutcome::Ready(count) => {
                probes::probe__done!(|| (spec.driver_id(), *count as u64))
            }
            ProbeOutcome::Empty => probes::probe__done!(|| (spec.driver_id(), 0u64)),
            failed => probes::probe__failed!(|| (spec.driver_id(), failed.as_str())),
        }
        outcome
    }
}

/// Returns a prober for `driver`, if this build includes its connector.
pub fn for_driver(driver: Driver, config: ProbeConfig) -> Result<SharedProber, UnsupportedDriver> {
    match driver {
        #[cfg(feature = "mssql")]
        Driver::Mssql => Ok(Arc::new(ConnectorProber::new(
            crate::connectors::mssql::MssqlConnector::new(),
            config,
        ))),
        #[cfg(feature = "oracle")]
        Driver::Oracle => Ok(Arc::new(ConnectorProber::new(
            crate::connectors::oracle::OracleConnector::new(),
            config,
        ))),
        #[allow(unreachable_patterns)]
        _ => {
            let _ = config;
            Err(UnsupportedDriver(driver))
        }
    }
}
