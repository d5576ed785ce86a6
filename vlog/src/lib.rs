#![warn(missing_docs)]
#![warn(unused_extern_crates)]
#![warn(unused_imports)]

//! Logging setup shared by the sample service crates.
//!
//! The re-exported macros behave like the usual `tracing` ones. `warn!` and `error!`
//! additionally attach the file, line and column of the call site.
//!
//! The format of the logs in `stdout` can be `plain` or `json` and is set by the
//! `MISC_LOG_FORMAT` env variable. Filtering follows `RUST_LOG`.
//!
//! If `MISC_SENTRY_URL` holds a valid DSN, errors are also reported to sentry
//! <https://docs.sentry.io/platforms/rust/>.

use std::{backtrace::Backtrace, borrow::Cow, str::FromStr};

use sentry::{types::Dsn, ClientInitGuard};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub use chrono as __chrono;
pub use sentry as __sentry;
pub use tracing as __tracing;
pub use tracing::{debug, info, trace};

const LOG_FORMAT_VAR: &str = "MISC_LOG_FORMAT";
const SENTRY_URL_VAR: &str = "MISC_SENTRY_URL";
const SENTRY_ENVIRONMENT_VAR: &str = "MISC_SENTRY_ENVIRONMENT";

/// Logs at the warn level adding the call site location.
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::__tracing::warn!(
            file = file!(),
            line = line!(),
            column = column!(),
            $($arg)*
        )
    };
}

/// Logs at the error level adding the call site location.
#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::__tracing::error!(
            file = file!(),
            line = line!(),
            column = column!(),
            $($arg)*
        )
    };
}

/// Output format of the `stdout` logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human readable lines.
    #[default]
    Plain,
    /// One JSON object per line.
    Json,
}

/// `MISC_LOG_FORMAT` holds something other than `plain` or `json`.
#[derive(Debug, thiserror::Error)]
#[error("MISC_LOG_FORMAT has an unexpected value {0:?}, expected `plain` or `json`")]
pub struct UnknownLogFormat(String);

impl FromStr for LogFormat {
    type Err = UnknownLogFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "plain" => Ok(LogFormat::Plain),
            "json" => Ok(LogFormat::Json),
            other => Err(UnknownLogFormat(other.to_string())),
        }
    }
}

fn get_sentry_url() -> Option<Dsn> {
    let sentry_url = std::env::var(SENTRY_URL_VAR).ok()?;
    Dsn::from_str(sentry_url.as_str()).ok()
}

/// Initialize logging with tracing and set up log format.
///
/// If the sentry URL is provided via an environment variable, this function will also
/// initialize sentry and return its guard, which must be kept alive for the lifetime
/// of the process.
pub fn init() -> Result<Option<ClientInitGuard>, UnknownLogFormat> {
    let log_format = match std::env::var(LOG_FORMAT_VAR) {
        Ok(value) => value.parse()?,
        Err(_) => LogFormat::default(),
    };

    init_with_format(log_format);

    Ok(get_sentry_url().map(|sentry_url| {
        let environment = std::env::var(SENTRY_ENVIRONMENT_VAR)
            .ok()
            .map(Cow::from);

        let options = sentry::ClientOptions {
            release: sentry::release_name!(),
            environment,
            attach_stacktrace: true,
            ..Default::default()
        };

        sentry::init((sentry_url, options))
    }))
}

fn init_with_format(log_format: LogFormat) {
    match log_format {
        LogFormat::Plain => {
            tracing_subscriber::registry()
                .with(fmt::Layer::default())
                .with(tracing_subscriber::EnvFilter::from_default_env())
                .init();
        }
        LogFormat::Json => {
            let timer = tracing_subscriber::fmt::time::UtcTime::rfc_3339();
            // must be set before sentry hook for sentry to function
            install_pretty_panic_hook();

            tracing_subscriber::registry()
                .with(
                    fmt::Layer::default()
                        .with_file(true)
                        .with_line_number(true)
                        .with_timer(timer)
                        .json(),
                )
                .with(tracing_subscriber::EnvFilter::from_default_env())
                .init();
        }
    }
}

/// Format panics like `tracing::error`
fn install_pretty_panic_hook() {
    // The previous hook is not chained, otherwise every panic is logged twice.
    std::panic::set_hook(Box::new(move |panic_info| {
        let backtrace = Backtrace::capture();
        let timestamp = chrono::Utc::now();
        let panic_message = if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.as_str()
        } else if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s
        } else {
            "Panic occurred without additional info"
        };

        let panic_location = panic_info
            .location()
            .map(|val| val.to_string())
            .unwrap_or_else(|| "Unknown location".to_owned());

        println!(
            "{}",
            serde_json::json!({
                "timestamp": timestamp.format("%Y-%m-%dT%H:%M:%S%.fZ").to_string(),
                "level": "CRITICAL",
                "fields": {
                    "message": panic_message,
                    "location": panic_location,
                    "backtrace": backtrace.to_string(),
                }
            })
        );
    }));
}
