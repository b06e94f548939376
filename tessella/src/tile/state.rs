use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// State of a tile.
///
/// A tile starts as [`Idle`](TileState::Idle) (or [`Empty`](TileState::Empty) if there is no data
/// for it), becomes [`Loading`](TileState::Loading) when a load is requested and then ends up in
/// one of the terminal states. Terminal tiles go back to `Loading` only on an explicit reload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TileState {
    /// Load was not requested yet.
    Idle,
    /// Load is in progress.
    Loading,
    /// Data is loaded and decoded. The tile may still contain no features.
    Loaded,
    /// Loading or decoding failed.
    Error,
    /// There is no data for the tile.
    Empty,
}

impl TileState {
    /// Returns true for `Loaded`, `Error` and `Empty`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Loaded | Self::Error | Self::Empty)
    }

    /// State of a tile composed of tiles with the given states.
    ///
    /// While any part is not terminal the composite is `Loading`. After that it is `Loaded` if any
    /// part is loaded, `Error` if any part failed and `Empty` otherwise (including when there are no
    /// parts at all).
    pub fn aggregate(states: impl IntoIterator<Item = TileState>) -> TileState {
        let mut any_loaded = false;
        let mut any_error = false;
        for state in states {
            match state {
                Self::Idle | Self::Loading => return Self::Loading,
                Self::Loaded => any_loaded = true,
                Self::Error => any_error = true,
                Self::Empty => {}
            }
        }

        if any_loaded {
            Self::Loaded
        } else if any_error {
            Self::Error
        } else {
            Self::Empty
        }
    }
}

/// Current state of a tile with change notifications.
///
/// All state changes go through [`watch::Sender::send_if_modified`], so checking the current state
/// and switching to `Loading` is a single atomic step.
pub(crate) struct StateCell {
    sender: watch::Sender<TileState>,
}

impl StateCell {
    pub(crate) fn new(initial: TileState) -> Self {
        Self {
            sender: watch::Sender::new(initial),
        }
    }

    pub(crate) fn get(&self) -> TileState {
        *self.sender.borrow()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<TileState> {
        self.sender.subscribe()
    }

    /// Switches to `Loading` from `Idle`, or also from a terminal state if `reload` is set.
    /// Returns false if the state was not changed.
    pub(crate) fn try_start(&self, reload: bool) -> bool {
        self.sender.send_if_modified(|state| {
            let can_start = match state {
                TileState::Idle => true,
                TileState::Loading => false,
                _ => reload,
            };
            if can_start {
                *state = TileState::Loading;
            }

            can_start
        })
    }

    pub(crate) fn set(&self, new_state: TileState) {
        self.sender.send_if_modified(|state| {
            let changed = *state != new_state;
            *state = new_state;
            changed
        });
    }

    /// Sets `new_state` only if the tile is still `Idle`.
    pub(crate) fn set_if_idle(&self, new_state: TileState) {
        self.sender.send_if_modified(|state| {
            let idle = *state == TileState::Idle;
            if idle {
                *state = new_state;
            }

            idle
        });
    }

    /// Resolves once the state is terminal. Never resolves for a tile nobody loads.
    pub(crate) async fn wait_terminal(&self) -> TileState {
        let mut receiver = self.sender.subscribe();
        let result = receiver.wait_for(TileState::is_terminal).await.map(|state| *state);
        match result {
            Ok(state) => state,
            // The sender lives as long as `self`, so the channel cannot be closed here.
            Err(_) => self.get(),
        }
    }
}
