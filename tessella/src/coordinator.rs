//! Dispatching of tile loads and tracking of their results.

use std::sync::Arc;

use tessella_types::geo::Crs;

use crate::async_runtime;
use crate::codec::{FeatureCollection, TileCodec};
use crate::events::{Listeners, TileEventListener, TileLoadEvent, TileLoadEventKind};
use crate::loader::TileLoader;
use crate::tile::{RenderTile, SourceTile, TileState};

/// Loads tiles, making sure every source tile has at most one load in flight, and reports the
/// progress to the registered listeners.
///
/// The coordinator is the only writer of tile states after the tiles are created. Loads run as
/// background tasks on the current tokio runtime and are never cancelled: a tile dropped by every
/// user still gets its data and its events.
///
/// For every source tile the end (or error) event of a load is emitted before the start event of
/// the next load, even if the tile is reloaded as soon as its state becomes terminal.
pub struct LoadCoordinator<L, C> {
    loader: Arc<L>,
    codec: Arc<C>,
    crs: Crs,
    listeners: Listeners,
}

impl<L, C> Clone for LoadCoordinator<L, C> {
    fn clone(&self) -> Self {
        Self {
            loader: self.loader.clone(),
            codec: self.codec.clone(),
            crs: self.crs.clone(),
            listeners: self.listeners.clone(),
        }
    }
}

impl<L, C> LoadCoordinator<L, C>
where
    L: TileLoader + 'static,
    C: TileCodec + 'static,
{
    /// Creates a coordinator. `crs` is the CRS of the source tiles and is handed to the codec.
    pub fn new(loader: L, codec: C, crs: Crs) -> Self {
        Self {
            loader: Arc::new(loader),
            codec: Arc::new(codec),
            crs,
            listeners: Listeners::default(),
        }
    }

    /// Registers a listener of the tile lifecycle events.
    pub fn add_listener(&self, listener: impl TileEventListener + 'static) {
        self.add_shared_listener(Arc::new(listener));
    }

    pub(crate) fn add_shared_listener(&self, listener: Arc<dyn TileEventListener>) {
        self.listeners.add(listener);
    }

    /// Starts loading the render tile.
    ///
    /// Does nothing if the tile is already loading or has finished loading. A tile without source
    /// tiles is `Empty` and is never loaded.
    pub fn load(&self, tile: &Arc<RenderTile<C::Features>>) {
        self.load_render_tile(tile, false);
    }

    /// Loads the render tile again even if it has already finished loading. Does nothing while the
    /// tile is loading.
    pub fn reload(&self, tile: &Arc<RenderTile<C::Features>>) {
        self.load_render_tile(tile, true);
    }

    /// Starts loading the source tile. Returns true if a new load was dispatched.
    pub fn load_source_tile(&self, tile: &Arc<SourceTile<C::Features>>) -> bool {
        self.dispatch(tile, false)
    }

    /// Loads the source tile again if it has finished loading. Returns true if a new load was
    /// dispatched.
    pub fn reload_source_tile(&self, tile: &Arc<SourceTile<C::Features>>) -> bool {
        self.dispatch(tile, true)
    }

    fn load_render_tile(&self, tile: &Arc<RenderTile<C::Features>>, reload: bool) {
        let sources = tile.source_tiles();
        if sources.is_empty() {
            log::trace!("Render tile {} has no source tiles", tile.index());
            return;
        }

        if !tile.try_start_loading(reload) {
            log::trace!(
                "Render tile {} is already {:?}",
                tile.index(),
                tile.state()
            );
            return;
        }

        for source in &sources {
            self.dispatch(source, reload);
        }

        let tile = tile.clone();
        async_runtime::spawn(async move {
            for source in &sources {
                source.wait_terminal().await;
            }

            let state = tile.update_state();
            log::debug!(
                "Render tile {} finished loading from {} source tiles: {state:?}",
                tile.index(),
                sources.len()
            );
        });
    }

    fn dispatch(&self, tile: &Arc<SourceTile<C::Features>>, reload: bool) -> bool {
        let Some(url) = tile.url().map(str::to_string) else {
            return false;
        };

        let cycle = tile.lock_cycle();
        if !tile.try_start_loading(reload) {
            log::trace!("Source tile {} is already {:?}", tile.index(), tile.state());
            return false;
        }

        self.listeners.emit(TileLoadEvent {
            kind: TileLoadEventKind::TileLoadStart,
            index: tile.index(),
            key: tile.key().to_string(),
            state: TileState::Loading,
        });
        drop(cycle);

        log::debug!("Loading source tile {} from {url}", tile.index());

        let this = self.clone();
        let tile = tile.clone();
        async_runtime::spawn(async move {
            let features = this.fetch(&tile, &url).await;

            let _cycle = tile.lock_cycle();
            let state = match features {
                Some(features) => {
                    tile.set_loaded(features);
                    TileState::Loaded
                }
                None => {
                    tile.set_state(TileState::Error);
                    TileState::Error
                }
            };
            this.listeners
                .emit(TileLoadEvent::finished(tile.index(), tile.key(), state));
        });

        true
    }

    /// Loads and decodes the tile data. `None` means the load failed.
    async fn fetch(&self, tile: &SourceTile<C::Features>, url: &str) -> Option<C::Features> {
        let index = tile.index();
        let bytes = match self.loader.load(index, url).await {
            Ok(bytes) => bytes,
            Err(err) => {
                log::debug!("Failed to load source tile {index}: {err}");
                return None;
            }
        };

        match self.codec.decode(bytes, tile.extent(), &self.crs) {
            Ok(features) => {
                log::debug!(
                    "Source tile {index} loaded with {} features",
                    features.feature_count()
                );
                Some(features)
            }
            Err(err) => {
                log::warn!("Failed to decode source tile {index}: {err}");
                None
            }
        }
    }
}
