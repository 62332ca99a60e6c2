use std::fmt;
use std::io;

/// Error surfaced while resolving process configuration: a malformed config file, an
/// unparsable environment variable, or an invalid CLI flag. Startup treats any of these as
/// fatal and exits without entering the event loop.
#[derive(Debug)]
pub enum ConfigError {
    Io(io::Error),
    Parse(String),
    InvalidValue { field: &'static str, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "could not read configuration file: {}", err),
            ConfigError::Parse(msg) => write!(f, "could not parse configuration: {}", msg),
            ConfigError::InvalidValue { field, reason } => {
                write!(f, "invalid value for '{}': {}", field, reason)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<io::Error> for ConfigError {
    fn from(err: io::Error) -> Self {
        ConfigError::Io(err)
    }
}
