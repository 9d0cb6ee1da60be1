//! Error types for the rrdshim bindings.

use std::path::PathBuf;

use thiserror::Error;

use crate::capture::ErrorMessage;

/// The main error type for all safe rrdshim operations.
///
/// Everything librrd itself rejects arrives as [`RrdError::Library`] with the
/// library's message untouched. The other variants cover what the Rust side
/// has to check before or after the call: marshaling arguments into C strings
/// and interpreting the buffers librrd hands back.
#[derive(Error, Debug)]
pub enum RrdError {
    /// librrd reported an error through its thread-local error state.
    #[error("librrd error: {0}")]
    Library(#[from] LibraryError),

    /// An argument could not be marshaled for librrd.
    #[error("argument error: {0}")]
    Argument(#[from] ArgumentError),

    /// A create request was refused before reaching librrd.
    #[error("create error: {0}")]
    Create(#[from] CreateError),

    /// librrd returned output that cannot be interpreted.
    #[error("result error: {0}")]
    Result(#[from] ResultError),

    /// Client configuration could not be loaded or is invalid.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

/// An error message reported by librrd.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{operation}: {message}")]
pub struct LibraryError {
    /// The forwarded operation that failed (`create`, `fetch`, ...).
    pub operation: &'static str,
    /// The library's message, exactly as it was reported.
    pub message: String,
}

impl LibraryError {
    /// Builds a library error from a captured error message.
    pub fn new(operation: &'static str, message: &ErrorMessage) -> Self {
        Self {
            operation,
            message: message.to_string_lossy().into_owned(),
        }
    }
}

/// Errors marshaling Rust values into librrd arguments.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArgumentError {
    /// The argument contains a NUL byte and cannot become a C string.
    #[error("argument {argument:?} contains an interior NUL byte")]
    InteriorNul {
        /// The offending argument, lossily decoded.
        argument: String,
    },

    /// More arguments than a C `int` can count.
    #[error("too many arguments: {count}")]
    TooMany {
        /// The number of arguments supplied.
        count: usize,
    },

    /// A numeric argument does not fit the C type librrd expects.
    #[error("{name} value {value} is out of range for librrd")]
    OutOfRange {
        /// Which argument overflowed.
        name: &'static str,
        /// The rejected value.
        value: i128,
    },

    /// A name that does not belong to a known vocabulary.
    #[error("unknown {kind} {value:?}")]
    Unknown {
        /// What was being parsed, e.g. "consolidation function".
        kind: &'static str,
        /// The rejected input.
        value: String,
    },
}

/// Errors refusing a create request.
#[derive(Error, Debug)]
pub enum CreateError {
    /// The target file exists and overwriting was not requested.
    #[error("'{}' already exists", path.display())]
    FileExists {
        /// The database path.
        path: PathBuf,
    },

    /// The target path could not be inspected.
    #[error("failed to inspect '{}': {source}", path.display())]
    Stat {
        /// The database path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Errors interpreting output parameters populated by librrd.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResultError {
    /// An output pointer was null although no error was reported.
    #[error("{operation} returned a null {output}")]
    NullOutput {
        /// The forwarded operation.
        operation: &'static str,
        /// Which output parameter was null.
        output: &'static str,
    },

    /// The returned step is zero, so rows cannot be counted.
    #[error("{operation} returned a zero step")]
    ZeroStep {
        /// The forwarded operation.
        operation: &'static str,
    },

    /// The returned time range ends before it starts.
    #[error("{operation} returned an inverted time range {start}..{end}")]
    InvalidRange {
        /// The forwarded operation.
        operation: &'static str,
        /// Returned start time.
        start: i64,
        /// Returned end time.
        end: i64,
    },

    /// A non-zero status code with no error message behind it.
    #[error("{operation} returned status {status} without an error message")]
    Status {
        /// The forwarded operation.
        operation: &'static str,
        /// The returned status code.
        status: i32,
    },

    /// A returned length does not fit in memory on this platform.
    #[error("{operation} returned an unrepresentable length {length}")]
    Length {
        /// The forwarded operation.
        operation: &'static str,
        /// The returned length.
        length: u128,
    },
}

/// Errors loading or validating a [`ClientConfig`](crate::config::ClientConfig).
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config '{}': {source}", path.display())]
    Read {
        /// The config file path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid JSON for a client config.
    #[error("failed to parse config '{}': {source}", path.display())]
    Parse {
        /// The config file path.
        path: PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// A config value is out of bounds.
    #[error("invalid config: {reason}")]
    Invalid {
        /// Description of what was invalid.
        reason: String,
    },
}

/// Type alias for `Result<T, RrdError>`.
pub type Result<T> = std::result::Result<T, RrdError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_error_display_keeps_message() {
        let err = RrdError::from(LibraryError {
            operation: "fetch",
            message: "opening 'x.rrd': No such file or directory".to_string(),
        });
        assert_eq!(
            err.to_string(),
            "librrd error: fetch: opening 'x.rrd': No such file or directory"
        );
    }

    #[test]
    fn test_nested_conversion() {
        let err: RrdError = ArgumentError::TooMany { count: 5 }.into();
        assert!(matches!(err, RrdError::Argument(ArgumentError::TooMany { count: 5 })));

        let err: RrdError = ResultError::ZeroStep { operation: "xport" }.into();
        assert_eq!(err.to_string(), "result error: xport returned a zero step");
    }
}
