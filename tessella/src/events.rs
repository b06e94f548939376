//! Tile lifecycle events.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::tile::TileState;
use crate::tile_schema::TileIndex;

/// Kind of a tile lifecycle event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TileLoadEventKind {
    /// Tile started loading. Emitted before the loader is called.
    TileLoadStart,
    /// Tile loading finished with `Loaded` or `Empty` state.
    TileLoadEnd,
    /// Tile loading finished with `Error` state.
    TileLoadError,
}

/// Lifecycle event of a source tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileLoadEvent {
    /// Kind of the event.
    pub kind: TileLoadEventKind,
    /// Index of the tile in the source tile schema.
    pub index: TileIndex,
    /// Invalidation key of the tile.
    pub key: String,
    /// State of the tile after the event.
    pub state: TileState,
}

impl TileLoadEvent {
    pub(crate) fn finished(index: TileIndex, key: &str, state: TileState) -> Self {
        let kind = if state == TileState::Error {
            TileLoadEventKind::TileLoadError
        } else {
            TileLoadEventKind::TileLoadEnd
        };

        Self {
            kind,
            index,
            key: key.to_string(),
            state,
        }
    }
}

/// Receiver of tile lifecycle events.
///
/// Listeners are called synchronously, so they must not block.
pub trait TileEventListener: Send + Sync {
    /// Called on every event.
    fn on_event(&self, event: &TileLoadEvent);
}

impl<T: Fn(&TileLoadEvent) + Send + Sync> TileEventListener for T {
    fn on_event(&self, event: &TileLoadEvent) {
        self(event)
    }
}

/// Registered listeners, shared between a source and its running loads.
#[derive(Clone, Default)]
pub(crate) struct Listeners {
    inner: Arc<RwLock<Vec<Arc<dyn TileEventListener>>>>,
}

impl Listeners {
    pub(crate) fn add(&self, listener: Arc<dyn TileEventListener>) {
        self.inner.write().push(listener);
    }

    pub(crate) fn emit(&self, event: TileLoadEvent) {
        log::trace!(
            "Tile {} event {:?}, state {:?}",
            event.index,
            event.kind,
            event.state
        );

        let listeners = self.inner.read().clone();
        for listener in listeners {
            listener.on_event(&event);
        }
    }
}
