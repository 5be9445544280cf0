//! Structured logging utilities for depcache
//!
//! Logs are emitted through `tracing`. Inside a GitHub Actions job the
//! default format renders events as workflow commands so the runner can
//! pick them up:
//!
//! - `DEBUG` → `::debug::<message>` (only shown with step debugging enabled)
//! - `INFO`  → `<message>`
//! - `WARN`  → `::warning::<message>`
//! - `ERROR` → `::error::<message>` (annotates the step as failed)
//!
//! # Log Format Conventions
//!
//! - `operation`: The operation being performed (e.g., "reserve", "upload")
//! - `key`: The cache key involved
//! - `cache_id`: Identifier returned by the cache service
//! - `size_bytes`: Size in bytes
//!
//! # Examples
//!
//! ```rust
//! use tracing::info;
//!
//! let key = "node-cache-Linux-npm-abc123";
//! info!(operation = "save", key = %key, "Cache saved with the key: {}", key);
//! ```

use std::{fmt as std_fmt, io};
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{
    fmt::{self, format::Writer},
    prelude::*,
    EnvFilter,
};

use crate::actions::command::issue;

/// Formatter that renders events as GitHub Actions workflow commands
struct ActionsFormatter;

impl<S, N> FormatEvent<S, N> for ActionsFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std_fmt::Result {
        // Fields are rendered into a buffer so the command payload can be escaped
        let mut message = String::new();
        ctx.field_format()
            .format_fields(Writer::new(&mut message), event)?;

        match *event.metadata().level() {
            tracing::Level::ERROR => write!(writer, "{}", issue("error", &message))?,
            tracing::Level::WARN => write!(writer, "{}", issue("warning", &message))?,
            tracing::Level::INFO => write!(writer, "{}", message)?,
            tracing::Level::DEBUG | tracing::Level::TRACE => {
                write!(writer, "{}", issue("debug", &message))?
            }
        }

        writeln!(writer)
    }
}

/// Custom formatter that shows "depcache" instead of full module path
struct DepcacheFormatter {
    with_ansi: bool,
}

impl<S, N> FormatEvent<S, N> for DepcacheFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std_fmt::Result {
        let meta = event.metadata();

        write!(
            writer,
            "{} ",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.6fZ")
        )?;

        if self.with_ansi {
            let level_style = match *meta.level() {
                tracing::Level::ERROR => "\x1b[31m", // Red
                tracing::Level::WARN => "\x1b[33m",  // Yellow
                tracing::Level::INFO => "\x1b[32m",  // Green
                tracing::Level::DEBUG => "\x1b[34m", // Blue
                tracing::Level::TRACE => "\x1b[35m", // Magenta
            };
            write!(writer, "{}{:5}(depcache)\x1b[0m: ", level_style, meta.level())?;
        } else {
            write!(writer, "{:5}(depcache): ", meta.level())?;
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}

/// Log format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// GitHub Actions workflow commands on stdout
    Actions,
    /// Human-readable format (default for local runs)
    Pretty,
    /// Compact format (for other CI systems)
    Compact,
    /// JSON format (for log aggregation systems)
    Json,
}

impl LogFormat {
    /// Parse from environment variable (DEPCACHE_LOG_FORMAT)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`LogFormat::from_env`] with an explicit environment lookup
    pub fn from_lookup<F>(env_lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        match env_lookup("DEPCACHE_LOG_FORMAT")
            .unwrap_or_default()
            .to_lowercase()
            .as_str()
        {
            "actions" => Self::Actions,
            "json" => Self::Json,
            "compact" => Self::Compact,
            "pretty" => Self::Pretty,
            _ => {
                if env_lookup("GITHUB_ACTIONS").as_deref() == Some("true") {
                    Self::Actions
                } else if env_lookup("CI").is_some() {
                    Self::Compact
                } else {
                    Self::Pretty
                }
            }
        }
    }

    /// Filter directive used when `RUST_LOG` is not set
    fn default_directive(self) -> &'static str {
        match self {
            // The runner hides ::debug:: lines unless step debugging is on
            Self::Actions => "info,depcache=debug",
            _ => "info",
        }
    }
}

/// Initialize the global tracing subscriber
///
/// # Environment Variables
///
/// - `RUST_LOG`: Set log level (e.g., "debug", "info", "warn")
/// - `DEPCACHE_LOG_FORMAT`: Set format ("actions", "pretty", "compact", "json")
/// - `GITHUB_ACTIONS`: If "true", defaults to the actions format
/// - `CI`: If set, defaults to compact format
pub fn init() {
    let format = LogFormat::from_env();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format.default_directive()));

    match format {
        LogFormat::Actions => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .event_format(ActionsFormatter)
                        .with_writer(io::stdout),
                )
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .event_format(DepcacheFormatter { with_ansi: true })
                        .with_writer(io::stderr),
                )
                .init();
        }
        LogFormat::Compact => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .event_format(DepcacheFormatter { with_ansi: false })
                        .with_writer(io::stderr),
                )
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_target(false)
                        .with_file(false)
                        .with_line_number(false)
                        .with_ansi(false)
                        .with_writer(io::stderr)
                        .json(),
                )
                .init();
        }
    }
}
