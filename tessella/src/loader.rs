//! Tile transport: the [`UrlSource`] resolving tile URLs and the [`TileLoader`] fetching them.

use bytes::Bytes;

use crate::error::TileLoadError;
use crate::tile_schema::TileIndex;

/// Function returning the URL of a source tile. `None` means there is no data for the tile.
///
/// The function is called while the source tile cache is locked, so it must not call back into the
/// [`VectorTileSource`](crate::source::VectorTileSource) it belongs to. Doing so deadlocks.
pub trait UrlSource: (Fn(&TileIndex) -> Option<String>) + Send + Sync {}
impl<T: Fn(&TileIndex) -> Option<String> + Send + Sync> UrlSource for T {}

/// Loader for raw tile data.
#[async_trait::async_trait]
pub trait TileLoader: Send + Sync {
    /// Load the tile with the given index from the URL.
    async fn load(&self, index: TileIndex, url: &str) -> Result<Bytes, TileLoadError>;
}

/// Loads tiles over HTTP.
#[cfg(feature = "rest")]
#[derive(Debug, Clone)]
pub struct RestTileLoader {
    http_client: reqwest::Client,
}

#[cfg(feature = "rest")]
impl RestTileLoader {
    /// Creates a loader with a default HTTP client.
    pub fn new() -> Result<Self, TileLoadError> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("tessella/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| {
                log::warn!("Failed to create HTTP client: {err}");
                TileLoadError::Network
            })?;

        Ok(Self::with_client(http_client))
    }

    /// Creates a loader using the given HTTP client.
    pub fn with_client(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }
}

#[cfg(feature = "rest")]
#[async_trait::async_trait]
impl TileLoader for RestTileLoader {
    async fn load(&self, index: TileIndex, url: &str) -> Result<Bytes, TileLoadError> {
        log::trace!("Loading tile {index} from url {url}");

        let response = self.http_client.get(url).send().await?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            log::debug!("Tile {index} does not exist at {url}");
            return Err(TileLoadError::DoesNotExist);
        }
        if !status.is_success() {
            log::info!("Failed to load {url}: {status}");
            return Err(TileLoadError::Network);
        }

        let bytes = response.bytes().await?;
        log::info!("Loaded tile {index} from url: {url}, {} bytes", bytes.len());

        Ok(bytes)
    }
}
