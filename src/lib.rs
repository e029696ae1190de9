//! waitdb blocks until a relational database is reachable and queryable.
//!
//! It is intended to run as an init step, ahead of services which expect
//! their database to exist. A wait is described by a JDBC URL, which is
//! decomposed and rendered into a native connection string, and then
//! probed repeatedly until one of three things happens:
//!
//! * The readiness query lists at least one table: the database is ready.
//! * The readiness query lists no tables: the database is alive, but empty.
//! * The timeout elapses.
//!
//! # Usage
//!
//! * [settings::RawSettings] collects inputs, and converts into validated
//!   [settings::Settings].
//! * [settings::Settings::into_poller] yields a [poller::Poller], whose
//!   [poller::Poller::run] drives the loop and reports a
//!   [poller::PollReport].
//! * Probes are made through a [prober::Prober]. The provided
//!   [prober::ConnectorProber] works with any [backend::Connector]; see
//!   [connectors] for the drivers built into this crate.
//!
//! # DTrace probes
//!
//! waitdb contains a handful of DTrace USDT probes:
//!
//! - `probe-start`: Fires before probing a database.
//! - `probe-done`: Fires when a probe reaches the database and counts its
//!   tables.
//! - `probe-failed`: Fires when a probe fails, with the failure kind.
//! - `gate-held`: Fires when the lock file causes a cycle to be skipped.
//!
//! The probes are behind the `"probes"` feature, which is enabled by default.

// Public API
pub mod backend;
pub mod connection_string;
pub mod gate;
pub mod jdbc;
pub mod policy;
pub mod poller;
pub mod prober;
pub mod settings;

// Necessary for implementation
mod jitter;
#[cfg(test)]
mod test_utils;

// Default implementations of generic interfaces
pub mod connectors;

/// USDT probes for tracing how waitdb probes a database.
#[cfg(feature = "probes")]
#[usdt::provider(provider = "waitdb")]
mod probes {
    /// Fires right before attempting to probe a database, with the driver
    /// and host being probed.
    fn probe__start(driver: &str, host: &str) {}

    /// Fires when a probe ran the readiness query, with the number of
    /// tables found.
    fn probe__done(driver: &str, tables: u64) {}

    /// Fires when a probe fails, with a string identifying the reason.
    fn probe__failed(driver: &str, reason: &str) {}

    /// Fires when the lock file keeps a cycle from probing.
    fn gate__held(path: &str) {}
}
