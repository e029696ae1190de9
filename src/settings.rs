//! Validated configuration for one wait.
//!
//! [RawSettings] holds inputs as an operator supplied them. Turning them
//! into [Settings] checks every constraint up front, without touching the
//! network, and reports each failure with its own exit code.

use crate::connection_string::{self, ConnectionSpec, Credentials};
use crate::gate::{GatePolarity, LockGate};
use crate::jdbc::{self, ParseError};
use crate::policy::{ConnectFailurePolicy, Policy, ProbeConfig};
use crate::poller::Poller;
use crate::prober::{self, SharedProber, UnsupportedDriver};

use debug_ignore::DebugIgnore;
use std::path::PathBuf;
use thiserror::Error;
use tokio::time::Duration;

/// Environment variable consulted when no password is given.
pub const PASSWORD_ENV: &str = "DB_USER_PASSWORD";

pub const DEFAULT_TIMEOUT_SECS: i64 = 200;
pub const DEFAULT_PERIOD_SECS: i64 = 20;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Parameter 'jdbcurl' is empty.")]
    EmptyJdbcUrl,

    #[error("Parameter 'jdbcurl' is not correct: {0}")]
    InvalidJdbcUrl(#[from] ParseError),

    #[error("Parameter 'jdbcurl' cannot be used: {0}")]
    UnrenderableJdbcUrl(#[from] connection_string::Error),

    #[error("Parameter 'user' is empty.")]
    EmptyUser,

    #[error("Parameter 'password' is empty. You can also set the environment variable '{}'.", PASSWORD_ENV)]
    EmptyPassword,

    #[error(transparent)]
    UnsupportedDriver(#[from] UnsupportedDriver),

    #[error("Parameter 'timeperiod' ({period}) is bigger than or equal to 'timeout' ({timeout}). The timeout must be bigger than the timeperiod.")]
    TimeoutNotAbovePeriod { timeout: i64, period: i64 },

    #[error("Parameter 'timeout' must be bigger than 0.")]
    NonPositiveTimeout,

    #[error("Parameter 'timeperiod' must be bigger than 0.")]
    NonPositivePeriod,
}

impl ConfigError {
    /// The process exit code which reports this error.
    pub const fn exit_code(&self) -> u8 {
        match self {
            ConfigError::EmptyJdbcUrl => 101,
            ConfigError::InvalidJdbcUrl(_) | ConfigError::UnrenderableJdbcUrl(_) => 102,
            ConfigError::EmptyUser => 103,
            ConfigError::EmptyPassword => 104,
            ConfigError::UnsupportedDriver(_) => 105,
            ConfigError::TimeoutNotAbovePeriod { .. } => 106,
            ConfigError::NonPositiveTimeout => 107,
            ConfigError::NonPositivePeriod => 108,
        }
    }
}

/// Unvalidated inputs.
#[derive(Clone, Debug)]
pub struct RawSettings {
    pub jdbc_url: String,
    pub user: String,
    /// Already resolved against [PASSWORD_ENV] by the caller.
    pub password: Option<DebugIgnore<String>>,
    pub lockfile: Option<PathBuf>,
    pub lock_polarity: GatePolarity,
    pub timeout_secs: i64,
    pub period_secs: i64,
    pub connect_failure: ConnectFailurePolicy,
    pub probe: ProbeConfig,
}

impl Default for RawSettings {
    fn default() -> Self {
        Self {
            jdbc_url: String::new(),
            user: String::new(),
            password: None,
            lockfile: None,
            lock_polarity: GatePolarity::default(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            period_secs: DEFAULT_PERIOD_SECS,
            connect_failure: ConnectFailurePolicy::default(),
            probe: ProbeConfig::default(),
        }
    }
}

/// Everything needed to run a wait.
#[derive(Debug)]
pub struct Settings {
    pub spec: ConnectionSpec,
    pub policy: Policy,
    pub gate: Option<LockGate>,
    prober: DebugIgnore<SharedProber>,
}

impl Settings {
    /// Builds the poll loop these settings describe.
    pub fn into_poller(self) -> Poller {
        Poller::new(self.spec, self.policy, self.gate, self.prober.0)
    }
}

impl TryFrom<RawSettings> for Settings {
    type Error = ConfigError;

    fn try_from(raw: RawSettings) -> Result<Self, Self::Error> {
        if raw.jdbc_url.is_empty() {
            return Err(ConfigError::EmptyJdbcUrl);
        }
        let target = jdbc::parse(&raw.jdbc_url)?;

        if raw.user.is_empty() {
            return Err(ConfigError::EmptyUser);
        }
        let password = match raw.password {
            Some(password) if !password.is_empty() => password.0,
            _ => return Err(ConfigError::EmptyPassword),
        };
        let credentials = Credentials::new(raw.user, password);
        let spec = connection_string::build(&target, &credentials)?;
        let prober = prober::for_driver(spec.driver(), raw.probe)?;

        let (timeout, period) = (raw.timeout_secs, raw.period_secs);
        if timeout <= period {
            return Err(ConfigError::TimeoutNotAbovePeriod { timeout, period });
        }
        if timeout <= 0 {
            return Err(ConfigError::NonPositiveTimeout);
        }
        if period <= 0 {
            return Err(ConfigError::NonPositivePeriod);
        }

        let policy = Policy {
            timeout: Duration::from_secs(timeout.unsigned_abs()),
            period: Duration::from_secs(period.unsigned_abs()),
            connect_failure: raw.connect_failure,
        };
        let gate = raw
            .lockfile
            .map(|path| LockGate::new(path, raw.lock_polarity));

        Ok(Settings {
            spec,
            policy,
            gate,
            prober: DebugIgnore(prober),
        })
    }
}
