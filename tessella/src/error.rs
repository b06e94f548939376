//! Error types used by the crate.

use tessella_mvt::error::MvtError;
use thiserror::Error;

use crate::tile_schema::TileSchemaError;

/// Tessella error type.
#[derive(Debug, Error)]
pub enum TessellaError {
    /// Invalid tile schema.
    #[error("invalid tile schema: {0}")]
    Schema(#[from] TileSchemaError),
    /// Failed to load tile data.
    #[error("failed to load tile: {0}")]
    Load(#[from] TileLoadError),
    /// Error decoding data.
    #[error("failed to decode data: {0}")]
    Decoding(#[from] TileDecodeError),
    /// No render tile schema can be derived for the CRS.
    #[error("unsupported CRS: {0}")]
    UnsupportedCrs(String),
    /// Generic error - details are inside.
    #[error("{0}")]
    Generic(String),
}

/// Error that can occur when trying to load a tile.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TileLoadError {
    /// Could not connect to the remote server.
    #[error("network error")]
    Network,
    /// Tile with the given index does not exist.
    #[error("tile does not exist")]
    DoesNotExist,
    /// Failed to decode the tile from the binary data.
    #[error("failed to decode tile: {0}")]
    Decoding(String),
}

/// Error returned by a [`TileCodec`](crate::codec::TileCodec).
#[derive(Debug, Error)]
pub enum TileDecodeError {
    /// Malformed vector tile payload.
    #[error(transparent)]
    Mvt(#[from] MvtError),
    /// Any other decoding failure.
    #[error("{0}")]
    Generic(String),
}

impl From<TileDecodeError> for TileLoadError {
    fn from(value: TileDecodeError) -> Self {
        Self::Decoding(value.to_string())
    }
}

#[cfg(feature = "rest")]
impl From<reqwest::Error> for TileLoadError {
    fn from(value: reqwest::Error) -> Self {
        match value.status() {
            Some(reqwest::StatusCode::NOT_FOUND) => Self::DoesNotExist,
            _ => Self::Network,
        }
    }
}
