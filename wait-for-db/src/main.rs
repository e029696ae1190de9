use clap::{CommandFactory, Parser, ValueEnum};
use debug_ignore::DebugIgnore;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::time::Duration;
use tracing::{event, Level};
use waitdb::gate::GatePolarity;
use waitdb::policy::{ConnectFailurePolicy, ProbeConfig};
use waitdb::settings::{
    RawSettings, Settings, DEFAULT_PERIOD_SECS, DEFAULT_TIMEOUT_SECS, PASSWORD_ENV,
};

/// Waits until a database is reachable and has tables.
///
/// Exits with 0 when tables were found, 1 when the database is empty, 10 on
/// timeout, 11 when a connection could not be opened under
/// `--on-connect-error abort`, and 101-108 on configuration errors.
#[derive(Clone, Parser)]
#[command(version)]
pub struct Args {
    /// JDBC connection URL
    #[arg(long, default_value = "")]
    pub jdbcurl: String,

    /// Database user name
    #[arg(long, default_value = "")]
    pub user: String,

    /// Password of the database user [default: $DB_USER_PASSWORD]
    #[arg(long)]
    pub password: Option<String>,

    /// Lock file which gates probing
    #[arg(long)]
    pub lockfile: Option<PathBuf>,

    /// What the presence of the lock file means
    #[arg(long, value_enum, default_value_t = LockPolarity::Busy)]
    pub lock_polarity: LockPolarity,

    /// Timeout for waiting, in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS, allow_negative_numbers = true)]
    pub timeout: i64,

    /// Time between checks, in seconds
    #[arg(long, default_value_t = DEFAULT_PERIOD_SECS, allow_negative_numbers = true)]
    pub timeperiod: i64,

    /// What to do when a connection cannot be opened
    #[arg(long, value_enum, default_value_t = OnConnectError::Retry)]
    pub on_connect_error: OnConnectError,

    /// Limit for opening one connection, in seconds
    #[arg(long, default_value_t = 30)]
    pub connect_timeout: u64,

    /// Limit for running the readiness query, in seconds
    #[arg(long, default_value_t = 30)]
    pub query_timeout: u64,

    /// Log at debug level
    #[arg(long, short = 'v')]
    pub verbose: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LockPolarity {
    /// Probe only while the lock file is absent
    Busy,
    /// Probe only while the lock file exists
    Ready,
}

impl From<LockPolarity> for GatePolarity {
    fn from(polarity: LockPolarity) -> Self {
        match polarity {
            LockPolarity::Busy => GatePolarity::BusyWhenPresent,
            LockPolarity::Ready => GatePolarity::ReadyWhenPresent,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum OnConnectError {
    /// Keep waiting
    Retry,
    /// Give up immediately
    Abort,
}

impl From<OnConnectError> for ConnectFailurePolicy {
    fn from(policy: OnConnectError) -> Self {
        match policy {
            OnConnectError::Retry => ConnectFailurePolicy::Retry,
            OnConnectError::Abort => ConnectFailurePolicy::Abort,
        }
    }
}

// An empty flag counts as omitted.
fn resolve_password(flag: Option<String>, env: Option<String>) -> Option<String> {
    flag.filter(|password| !password.is_empty()).or(env)
}

impl Args {
    /// Converts into settings, falling back to `env_password` when no
    /// password was given on the command line.
    fn into_raw_settings(self, env_password: Option<String>) -> RawSettings {
        RawSettings {
            jdbc_url: self.jdbcurl,
            user: self.user,
            password: resolve_password(self.password, env_password).map(DebugIgnore),
            lockfile: self.lockfile,
            lock_polarity: self.lock_polarity.into(),
            timeout_secs: self.timeout,
            period_secs: self.timeperiod,
            connect_failure: self.on_connect_error.into(),
            probe: ProbeConfig {
                connect_timeout: Duration::from_secs(self.connect_timeout),
                query_timeout: Duration::from_secs(self.query_timeout),
                ..Default::default()
            },
        }
    }
}

fn setup_tracing_subscriber(verbose: bool) -> anyhow::Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .try_init()
        .map_err(|err| anyhow::anyhow!(err))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<ExitCode> {
    let args: Args = Args::parse();
    setup_tracing_subscriber(args.verbose)?;

    let raw = args.into_raw_settings(std::env::var(PASSWORD_ENV).ok());
    let settings = match Settings::try_from(raw) {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("{err}");
            eprintln!("{}", Args::command().render_usage());
            return Ok(ExitCode::from(err.exit_code()));
        }
    };

    event!(
        Level::INFO,
        db = %settings.spec,
        timeout = ?settings.policy.timeout,
        period = ?settings.policy.period,
        "Waiting for database"
    );
    let report = settings.into_poller().run().await;
    event!(Level::DEBUG, report = ?report, "Finished waiting");
    Ok(ExitCode::from(report.outcome.exit_code()))
}
