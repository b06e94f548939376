use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use parking_lot::{Mutex, ReentrantMutex, ReentrantMutexGuard};
use tessella_types::cartesian::Rect;
use tokio::sync::watch;

use super::state::StateCell;
use super::TileState;
use crate::tile_schema::TileIndex;

/// Single fetched and decoded unit of data at one cell of the source tile schema.
///
/// Source tiles are shared between all render tiles that need them, so every source tile is
/// loaded at most once per invalidation key.
pub struct SourceTile<F> {
    index: TileIndex,
    key: String,
    url: Option<String>,
    extent: Rect,
    state: StateCell,
    features: Mutex<Option<Arc<F>>>,
    cycle: ReentrantMutex<()>,
}

impl<F> SourceTile<F> {
    /// Tile without a URL has no data and starts in the `Empty` state.
    pub(crate) fn new(
        index: TileIndex,
        key: impl Into<String>,
        url: Option<String>,
        extent: Rect,
    ) -> Self {
        let initial_state = if url.is_some() {
            TileState::Idle
        } else {
            TileState::Empty
        };

        Self {
            index,
            key: key.into(),
            url,
            extent,
            state: StateCell::new(initial_state),
            features: Mutex::new(None),
            cycle: ReentrantMutex::new(()),
        }
    }

    /// Index of the tile in the source tile schema.
    pub fn index(&self) -> TileIndex {
        self.index
    }

    /// Invalidation key the tile was created with.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// URL the tile is loaded from. `None` means there is no data for the tile.
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// Returns true if the tile has a URL to load the data from.
    pub fn has_data(&self) -> bool {
        self.url.is_some()
    }

    /// Extent of the tile in the source CRS.
    pub fn extent(&self) -> Rect {
        self.extent
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
    ///
    /// If the load was never requested, this never resolves.
    pub async fn wait_terminal(&self) -> TileState {
        self.state.wait_terminal().await
    }

    /// Decoded features. Available after the tile is loaded.
    pub fn features(&self) -> Option<Arc<F>> {
        self.features.lock().clone()
    }

    /// Guard of one load cycle step. Starting a load and finishing it (state change together with
    /// its event) are done under this guard, so a new cycle cannot start between the terminal state
    /// and the end event of the previous one. The same thread can take it again, so listeners may
    /// reload the tile.
    pub(crate) fn lock_cycle(&self) -> ReentrantMutexGuard<'_, ()> {
        self.cycle.lock()
    }

    pub(crate) fn try_start_loading(&self, reload: bool) -> bool {
        self.has_data() && self.state.try_start(reload)
    }

    pub(crate) fn set_loaded(&self, features: F) {
        *self.features.lock() = Some(Arc::new(features));
        self.state.set(TileState::Loaded);
    }

    pub(crate) fn set_state(&self, state: TileState) {
        self.state.set(state);
    }
}

impl<F> Debug for SourceTile<F> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceTile")
            .field("index", &self.index)
            .field("key", &self.key)
            .field("url", &self.url)
            .field("state", &self.state())
            .finish()
    }
}
