//! Tiles handed out by a [`VectorTileSource`](crate::source::VectorTileSource) and their lifecycle.

mod render_tile;
mod source_tile;
mod state;

pub use render_tile::{RenderTile, TileBacking};
pub use source_tile::SourceTile;
pub use state::TileState;
