use std::fmt::{Debug, Formatter};
use std::sync::{Arc, OnceLock};

use tessella_types::geo::Crs;
use tokio::sync::watch;

use super::state::StateCell;
use super::{SourceTile, TileState};
use crate::tile_schema::TileIndex;

/// Where the data of a [`RenderTile`] comes from.
#[derive(Debug)]
pub enum TileBacking<F> {
    /// Render and source schemas coincide at the tile's level, so the render tile shows exactly
    /// one source tile with the same index.
    Direct(Arc<SourceTile<F>>),
    /// Source tiles overlapping the render tile. Tiles with no data are not included.
    Aggregate(Vec<Arc<SourceTile<F>>>),
}

/// Tile requested by a renderer, addressed in the render tile schema of its CRS.
pub struct RenderTile<F> {
    index: TileIndex,
    key: String,
    crs: Crs,
    pixel_ratio: f64,
    state: StateCell,
    backing: OnceLock<TileBacking<F>>,
}

impl<F> RenderTile<F> {
    pub(crate) fn new(index: TileIndex, key: impl Into<String>, crs: Crs, pixel_ratio: f64) -> Self {
        Self {
            index,
            key: key.into(),
            crs,
            pixel_ratio,
            state: StateCell::new(TileState::Idle),
            backing: OnceLock::new(),
        }
    }

    /// Index of the tile in the render tile schema.
    pub fn index(&self) -> TileIndex {
        self.index
    }

    /// Invalidation key the tile was created with.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// CRS of the render tile schema.
    pub fn crs(&self) -> &Crs {
        &self.crs
    }

    /// Pixel ratio of the first request of the tile.
    pub fn pixel_ratio(&self) -> f64 {
        self.pixel_ratio
    }

    /// Current state.
    pub fn state(&self) -> TileState {
        self.state.get()
    }

    /// Receiver of the tile state changes.
    pub fn subscribe(&self) -> watch::Receiver<TileState> {
        self.state.subscribe()
    }

    /// Waits until the tile reaches a terminal state and returns it.
    pub async fn wait_terminal(&self) -> TileState {
        self.state.wait_terminal().await
    }

    /// Data backing of the tile, if already resolved.
    pub fn backing(&self) -> Option<&TileBacking<F>> {
        self.backing.get()
    }

    /// Returns true if the tile is directly backed by a single source tile.
    pub fn is_direct(&self) -> bool {
        matches!(self.backing.get(), Some(TileBacking::Direct(_)))
    }

    /// Source tiles with data that the tile is made of.
    pub fn source_tiles(&self) -> Vec<Arc<SourceTile<F>>> {
        match self.backing.get() {
            Some(TileBacking::Direct(tile)) if tile.has_data() => vec![tile.clone()],
            Some(TileBacking::Aggregate(tiles)) => tiles.clone(),
            _ => vec![],
        }
    }

    /// Features of all loaded source tiles.
    pub fn features(&self) -> Vec<Arc<F>> {
        self.source_tiles()
            .iter()
            .filter_map(|tile| tile.features())
            .collect()
    }

    /// Resolves the backing once. A tile without source tiles becomes `Empty`.
    pub(crate) fn attach(
        &self,
        resolve: impl FnOnce() -> TileBacking<F>,
    ) -> Vec<Arc<SourceTile<F>>> {
        self.backing.get_or_init(resolve);

        let tiles = self.source_tiles();
        if tiles.is_empty() {
            self.state.set_if_idle(TileState::Empty);
        }

        tiles
    }

    pub(crate) fn try_start_loading(&self, reload: bool) -> bool {
        self.state.try_start(reload)
    }

    pub(crate) fn update_state(&self) -> TileState {
        let state = TileState::aggregate(self.source_tiles().iter().map(|tile| tile.state()));
        self.state.set(state);
        state
    }
}

impl<F> Debug for RenderTile<F> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderTile")
            .field("index", &self.index)
            .field("key", &self.key)
            .field("crs", &self.crs)
            .field("state", &self.state())
            .field("source_tiles", &self.source_tiles().len())
            .finish()
    }
}
