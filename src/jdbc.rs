//! Decomposes JDBC connection URLs into a [ConnectionTarget].
//!
//! Two URL families are understood:
//!
//! * Oracle thin URLs, in either the service-name form
//!   `jdbc:oracle:thin:@//host:port/service` or the legacy SID form
//!   `jdbc:oracle:thin:@host:port:sid`.
//! * SQL Server URLs of the form
//!   `jdbc:sqlserver://host:port;databaseName=name;key=value`.
//!
//! Parsing is deliberately permissive about numbers: a port which is absent
//! or cannot be read is recorded as `0`, and later resolved to the dialect's
//! default port by [ConnectionTarget::effective_port].

use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

const PREFIX: &str = "jdbc:";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("JDBC url does not start with 'jdbc:' ({0})")]
    BadPrefix(String),

    #[error("JDBC url has no hostname ({0})")]
    MissingHost(String),

    #[error("JDBC url is not an oracle or ms sql url ({0})")]
    UnsupportedDialect(String),
}

/// The database family addressed by a URL.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Dialect {
    Mssql,
    Oracle,
}

impl Dialect {
    /// The port a server of this dialect listens on when none is given.
    pub const fn default_port(&self) -> u16 {
        match self {
            Dialect::Mssql => 1433,
            Dialect::Oracle => 1521,
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::Mssql => f.write_str("mssql"),
            Dialect::Oracle => f.write_str("oracle"),
        }
    }
}

/// How an Oracle database is named within a URL.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum AddressingMode {
    /// `@host:port:sid`
    Sid,
    /// `@//host:port/service`
    ServiceName,
}

/// Where a database lives, as described by a JDBC URL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionTarget {
    pub dialect: Dialect,
    pub host: String,
    /// Zero when the URL carried no readable port.
    pub port: u16,
    /// Database name (mssql), or SID / service name (oracle).
    pub database: String,
    /// Only meaningful for [Dialect::Oracle].
    pub addressing_mode: AddressingMode,
    /// Remaining `key=value` properties of a SQL Server URL, keyed by the
    /// lower-cased property name.
    pub properties: BTreeMap<String, String>,
}

impl ConnectionTarget {
    /// Returns the port to connect to, substituting the dialect default
    /// for an absent port.
    pub fn effective_port(&self) -> u16 {
        if self.port == 0 {
            self.dialect.default_port()
        } else {
            self.port
        }
    }

    /// Looks up a SQL Server property, ignoring the case of `key`.
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties
            .get(&key.to_ascii_lowercase())
            .map(String::as_str)
    }
}

impl std::str::FromStr for ConnectionTarget {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse(s)
    }
}

/// Parses a JDBC URL.
pub fn parse(url: &str) -> Result<ConnectionTarget, ParseError> {
    if !url.starts_with(PREFIX) {
        return Err(ParseError::BadPrefix(url.to_string()));
    }

    let segments: Vec<&str> = url.split(':').collect();
    match segments.get(1).copied() {
        Some("oracle") => parse_oracle(url, &segments),
        Some("sqlserver") => parse_sqlserver(url, &segments),
        _ => Err(ParseError::UnsupportedDialect(url.to_string())),
    }
}

// Unreadable numbers are treated as absent.
fn parse_port(s: &str) -> u16 {
    s.trim().parse().unwrap_or(0)
}

// jdbc:oracle:thin:@//hostname:1521/service
// jdbc:oracle:thin:@//hostname/service
// jdbc:oracle:thin:@hostname:1521:sid
fn parse_oracle(url: &str, segments: &[&str]) -> Result<ConnectionTarget, ParseError> {
    let missing_host = || ParseError::MissingHost(url.to_string());
    let host_segment = segments.get(3).ok_or_else(missing_host)?;

    let (host, port, database, addressing_mode) =
        if let Some((host, service)) = host_segment
            .strip_prefix("@//")
            .and_then(|address| address.split_once('/'))
        {
            (host, 0, service.to_string(), AddressingMode::ServiceName)
        } else if let Some(host) = host_segment.strip_prefix("@//") {
            let (port, service) = match segments.get(4) {
                Some(rest) => match rest.split_once('/') {
                    Some((port, service)) => (parse_port(port), service.to_string()),
                    None => (parse_port(rest), String::new()),
                },
                None => (0, String::new()),
            };
            (host, port, service, AddressingMode::ServiceName)
        } else if let Some(host) = host_segment.strip_prefix('@') {
            let port = segments.get(4).map(|p| parse_port(p)).unwrap_or(0);
            let sid = segments.get(5).map(|s| s.to_string()).unwrap_or_default();
            (host, port, sid, AddressingMode::Sid)
        } else {
            return Err(missing_host());
        };

    if host.is_empty() {
        return Err(missing_host());
    }

    Ok(ConnectionTarget {
        dialect: Dialect::Oracle,
        host: host.to_string(),
        port,
        database,
        addressing_mode,
        properties: BTreeMap::new(),
    })
}

// jdbc:sqlserver://icm-mssql-server:1433;databaseName=icmdb
fn parse_sqlserver(url: &str, segments: &[&str]) -> Result<ConnectionTarget, ParseError> {
    let missing_host = || ParseError::MissingHost(url.to_string());
    let host_segment = segments
        .get(2)
        .and_then(|s| s.strip_prefix("//"))
        .ok_or_else(missing_host)?;

    // Properties may follow the host directly when no port is given.
    let mut host_parts = host_segment.split(';');
    let host = host_parts.next().unwrap_or_default();
    if host.is_empty() {
        return Err(missing_host());
    }
    let mut pairs: Vec<&str> = host_parts.collect();

    let mut port = 0;
    if let Some(rest) = segments.get(3) {
        let mut parts = rest.split(';');
        port = parts.next().map(parse_port).unwrap_or(0);
        pairs.extend(parts);
    }

    let mut properties = BTreeMap::new();
    for pair in pairs {
        if let Some((key, value)) = pair.split_once('=') {
            properties.insert(key.trim().to_ascii_lowercase(), value.trim().to_string());
        }
    }

    let database = properties
        .remove("databasename")
        .or_else(|| properties.remove("database"))
        .unwrap_or_default();

    Ok(ConnectionTarget {
        dialect: Dialect::Mssql,
        host: host.to_string(),
        port,
        database,
        addressing_mode: AddressingMode::ServiceName,
        properties,
    })
}
