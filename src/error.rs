//! Error types and result definitions for the v2h crate.
//! Includes conversion from standard IO/JSON errors and process exit codes.

use crate::accumulator::Snapshot;
use thiserror::Error;

/// Exit code for failures caused by bad command-line input.
pub const EXIT_USAGE: u8 = 2;
/// Exit code for every other failure.
pub const EXIT_FAILURE: u8 = 1;

/// Represents all possible errors that can occur while talking to the V2H unit.
#[derive(Error, Debug, Clone)]
pub enum V2hError {
    /// Standard IO error (socket, file, etc.)
    #[error("IO error: {0}")]
    Io(String),

    /// JSON serialization or deserialization error
    #[error("JSON error: {0}")]
    Json(String),

    /// The configuration file exists but is unusable
    #[error("Config error: {0}")]
    Config(String),

    /// An inbound datagram is not a valid ECHONET Lite frame
    #[error("Decode error: {0}")]
    Decode(String),

    /// A command-line argument could not be interpreted
    #[error("{0}")]
    Usage(String),

    /// The device did not answer every polled property in time
    #[error("No response for properties: {}", format_codes(.missing))]
    Incomplete {
        missing: Vec<u8>,
        partial: Snapshot,
    },

    /// The receive loop has stopped
    #[error("Transport closed")]
    Closed,
}

/// A specialized Result type for v2h operations.
pub type Result<T> = std::result::Result<T, V2hError>;

impl From<std::io::Error> for V2hError {
    fn from(err: std::io::Error) -> Self {
        V2hError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for V2hError {
    fn from(err: serde_json::Error) -> Self {
        V2hError::Json(err.to_string())
    }
}

impl V2hError {
    pub fn exit_code(&self) -> u8 {
        match self {
            V2hError::Usage(_) => EXIT_USAGE,
            _ => EXIT_FAILURE,
        }
    }

    pub(crate) fn usage(msg: impl Into<String>) -> Self {
        V2hError::Usage(msg.into())
    }
}

fn format_codes(codes: &[u8]) -> String {
    codes
        .iter()
        .map(|c| format!("0x{:02X}", c))
        .collect::<Vec<_>>()
        .join(", ")
}
