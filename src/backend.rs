//! The interface for opening and querying connections to a database.

use crate::connection_string::ConnectionSpec;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O Error")]
    Io(#[from] std::io::Error),

    #[error("Invalid connection string: {0}")]
    InvalidConnectionString(String),

    /// The server could not be reached, or refused the login.
    #[error("Database unavailable")]
    Unavailable(#[source] anyhow::Error),

    #[error(transparent)]
    Other(anyhow::Error),
}

impl Error {
    /// Returns true if the failure came from the database side, and may go
    /// away once the server finishes starting.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Io(_) | Error::Unavailable(_))
    }
}

/// Interface for raw connections.
pub trait Connection: Send + 'static {}

impl<T> Connection for T where T: Send + 'static {}

/// Describes how a connection to a database is constructed and exercised.
///
/// Every operation may fail; the prober decides which failures are
/// transient.
#[async_trait]
pub trait Connector: Send + Sync {
    type Connection: Connection;

    /// Opens a connection described by `spec`.
    async fn connect(&self, spec: &ConnectionSpec) -> Result<Self::Connection, Error>;

    /// Performs a lightweight round-trip on the connection.
    ///
    /// By default this method does nothing.
    async fn ping(&self, _conn: &mut Self::Connection) -> Result<(), Error> {
        Ok(())
    }

    /// Runs `query` and counts the rows it returns.
    async fn count_rows(&self, conn: &mut Self::Connection, query: &str) -> Result<usize, Error>;

    /// Releases the connection.
    ///
    /// By default the connection is dropped.
    async fn close(&self, conn: Self::Connection) -> Result<(), Error> {
        drop(conn);
        Ok(())
    }
}
