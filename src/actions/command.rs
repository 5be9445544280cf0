/// Workflow command formatting and failure signaling
///
/// The runner scans step output for lines of the form `::command::message`.
use std::process::ExitCode;
use tracing::error;

/// Escape a command payload so it survives the runner's line-based parser
pub fn escape_data(value: &str) -> String {
    value
        .replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

/// Format a workflow command line (without trailing newline)
pub fn issue(command: &str, message: &str) -> String {
    format!("::{}::{}", command, escape_data(message))
}

/// Mark the current step as failed
///
/// Emits the message at error level (rendered as `::error::` under the
/// actions log format) and returns the exit code the process should finish
/// with. Never panics or exits on its own.
pub fn set_failed(message: &str) -> ExitCode {
    error!("{}", message);
    ExitCode::FAILURE
}
