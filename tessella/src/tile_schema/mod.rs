//! [`TileSchema`] maps map coordinates and extents to [tile indices](TileIndex) and back.

mod builder;
mod lod;
mod schema;
mod tile_index;

pub use builder::{TileSchemaBuilder, TileSchemaError};
pub use lod::Lod;
pub use schema::{TileRange, TileSchema, VerticalDirection, ZDirection};
pub use tile_index::TileIndex;
