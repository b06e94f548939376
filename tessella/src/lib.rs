//! Tessella is a tile cache and asynchronous load coordinator for vector map data.
//!
//! For a tile requested by a renderer it answers the question "what tile object should be
//! drawn here", loading and decoding the tile data on demand, reusing tiles that are already
//! loaded and handling areas without data.
//!
//! # Quick start
//!
//! ```no_run
//! use tessella::source::VectorTileSourceBuilder;
//! use tessella::tessella_types::geo::Crs;
//!
//! # tokio_test::block_on(async {
//! let source = VectorTileSourceBuilder::new_rest(|index| {
//!     Some(format!(
//!         "https://vector_tiles.example.com/{}/{}/{}.pbf",
//!         index.z, index.x, index.y
//!     ))
//! })
//! .build()
//! .expect("valid source");
//!
//! let tile = source.get_tile(3, 4, 2, 1.0, &Crs::EPSG3857).expect("supported CRS");
//! source.load(&tile);
//! let state = tile.wait_terminal().await;
//! println!("Tile {} is {state:?} with {} feature sets", tile.index(), tile.features().len());
//! # });
//! ```
//!
//! # Main components
//!
//! * [`TileSchema`] does the math of tile indices: which tiles cover an extent at a resolution and
//!   what extent a tile has.
//! * [`SourceTile`](tile::SourceTile) is a unit of data as it is published: one request, one
//!   decoded feature collection.
//! * [`RenderTile`](tile::RenderTile) is a unit the renderer asks for. Its schema may differ from
//!   the schema of source tiles, even by CRS, in which case it collects all source tiles it overlaps.
//! * [`TileCache`](tile_cache::TileCache) makes sure the same tile is returned for the same index and
//!   invalidation key.
//! * [`LoadCoordinator`](coordinator::LoadCoordinator) loads tiles through a
//!   [`TileLoader`](loader::TileLoader) and a [`TileCodec`](codec::TileCodec), at most once at a
//!   time per tile, and reports [events](events::TileLoadEvent).
//! * [`VectorTileSource`](source::VectorTileSource) puts it all together.

pub(crate) mod async_runtime;
pub mod codec;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod loader;
pub mod source;
pub mod tile;
pub mod tile_cache;
pub mod tile_schema;

pub use tile::{RenderTile, SourceTile, TileState};
pub use tile_schema::{TileIndex, TileSchema};

// Reexport tessella_types
pub use tessella_types;

#[cfg(test)]
mod tests;
