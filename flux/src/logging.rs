//! Structured logging, built once at process startup and threaded explicitly into every
//! component that needs it. No global logger: callers hold a `slog::Logger` and pass child
//! loggers down to the pieces that report through it.

pub use slog::{crit, debug, error, info, o, trace, warn, Drain, Level, Logger};

use sloggers::terminal::{Destination, TerminalLoggerBuilder};
use sloggers::types::Severity;
use sloggers::Build;

/// Builds the root logger for the process at the given level, writing to stderr.
///
/// `level` follows the conventional `trace < debug < info < warning < error < critical` order.
pub fn init(level: Level) -> Logger {
    let mut builder = TerminalLoggerBuilder::new();
    builder.level(to_severity(level));
    builder.destination(Destination::Stderr);

    builder
        .build()
        .expect("terminal logger construction should never fail")
}

fn to_severity(level: Level) -> Severity {
    match level {
        Level::Critical => Severity::Critical,
        Level::Error => Severity::Error,
        Level::Warning => Severity::Warning,
        Level::Info => Severity::Info,
        Level::Debug => Severity::Debug,
        Level::Trace => Severity::Trace,
    }
}

/// Parses a level name as accepted in config files, environment variables and CLI flags.
/// Unrecognized names fall back to `Info`, matching the compiled-in default.
pub fn parse_level(name: &str) -> Level {
    match name.to_ascii_lowercase().as_str() {
        "critical" | "crit" => Level::Critical,
        "error" => Level::Error,
        "warning" | "warn" => Level::Warning,
        "debug" => Level::Debug,
        "trace" => Level::Trace,
        _ => Level::Info,
    }
}
