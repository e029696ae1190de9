//! Implementation of [Connector] for Oracle, using the Oracle client library.
//!
//! The client library is blocking, so every call is moved onto tokio's
//! blocking thread pool and awaited.

use crate::backend::{self, Error};
use crate::connection_string::{self, ConnectionSpec};

use anyhow::anyhow;
use async_trait::async_trait;
use std::sync::Arc;

#[derive(Default)]
pub struct OracleConnector {}

impl OracleConnector {
    pub fn new() -> Self {
        Self {}
    }
}

fn other(err: oracle::Error) -> Error {
    Error::Other(anyhow!(err))
}

async fn blocking<T, F>(f: F) -> Result<T, Error>
where
    F: FnOnce() -> Result<T, oracle::Error> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::Other(anyhow!(e)))?
        .map_err(other)
}

#[async_trait]
impl backend::Connector for OracleConnector {
    type Connection = Arc<oracle::Connection>;

    async fn connect(&self, spec: &ConnectionSpec) -> Result<Self::Connection, Error> {
        let credentials = spec.credentials();
        let user = credentials.user.clone();
        let password = credentials.password.0.clone();
        let descriptor = connection_string::oracle_connect_descriptor(spec.target());

        // Listener, network and login failures all surface here.
        let conn = tokio::task::spawn_blocking(move || {
            oracle::Connection::connect(user, password, descriptor)
        })
        .await
        .map_err(|e| Error::Other(anyhow!(e)))?
        .map_err(|e| Error::Unavailable(anyhow!(e)))?;
        Ok(Arc::new(conn))
    }

    async fn ping(&self, conn: &mut Self::Connection) -> Result<(), Error> {
        let conn = conn.clone();
        blocking(move || conn.ping()).await
    }

    async fn count_rows(&self, conn: &mut Self::Connection, query: &str) -> Result<usize, Error> {
        let conn = conn.clone();
        let query = query.to_string();
        blocking(move || {
            let mut count = 0;
            for row in conn.query(&query, &[])? {
                row?;
                count += 1;
            }
            Ok(count)
        })
        .await
    }

    async fn close(&self, conn: Self::Connection) -> Result<(), Error> {
        blocking(move || conn.close()).await
    }
}
