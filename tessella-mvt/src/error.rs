//! Error type of the MVT reader.

use prost::DecodeError;
use thiserror::Error;

/// Error decoding a vector tile.
#[derive(Debug, Clone, Error)]
pub enum MvtError {
    /// The buffer is not a valid protobuf `Tile` message.
    #[error("proto error: {0}")]
    Proto(String),

    /// The message is valid protobuf, but violates the vector tile specification.
    #[error("{0}")]
    Generic(String),
}

impl From<DecodeError> for MvtError {
    fn from(value: DecodeError) -> Self {
        Self::Proto(value.to_string())
    }
}
