//! [`VectorTileSource`] hands out render tiles and keeps the tile caches.

mod builder;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;
use tessella_types::cartesian::Rect;
use tessella_types::geo::{transform_extent, Crs};

pub use builder::VectorTileSourceBuilder;

use crate::codec::TileCodec;
use crate::coordinator::LoadCoordinator;
use crate::error::TessellaError;
use crate::events::TileEventListener;
use crate::loader::{TileLoader, UrlSource};
use crate::tile::{RenderTile, SourceTile, TileBacking};
use crate::tile_cache::TileCache;
use crate::tile_schema::{TileIndex, TileSchema, ZDirection};

/// Maximum z level of the render tile schemas.
pub const DEFAULT_RENDER_MAX_ZOOM: u32 = 42;

/// Render tiles covering more source tiles than this are left empty.
const MAX_SOURCE_TILES_PER_RENDER_TILE: usize = 4096;

type TileKey = (TileIndex, String);

/// Source of vector tiles.
///
/// Source tiles are published in the source [`TileSchema`]. A renderer requests tiles in a render
/// tile schema of its CRS (see [`VectorTileSource::get_tile_grid_for_projection`]). When at the
/// requested level both schemas coincide, a render tile is backed directly by the source tile with
/// the same index. Otherwise the render tile collects all source tiles overlapping its extent,
/// reprojected to the source CRS if needed.
///
/// Tiles are cached by index and invalidation key: the same instance is returned for the same
/// index and key, and changing the key with [`VectorTileSource::set_key`] makes further requests
/// create new tiles while the old ones stay cached.
pub struct VectorTileSource<L, C: TileCodec> {
    tile_schema: Arc<TileSchema>,
    url_source: Arc<dyn UrlSource>,
    coordinator: LoadCoordinator<L, C>,
    key: RwLock<String>,
    z_direction: ZDirection,
    wrap_x: bool,
    render_cache_capacity: Option<usize>,
    render_schemas: RwLock<HashMap<Crs, Arc<TileSchema>, ahash::RandomState>>,
    render_tiles:
        RwLock<HashMap<Crs, Arc<TileCache<TileKey, RenderTile<C::Features>>>, ahash::RandomState>>,
    source_tiles: TileCache<TileKey, SourceTile<C::Features>>,
}

impl<L, C> VectorTileSource<L, C>
where
    L: TileLoader + 'static,
    C: TileCodec + 'static,
{
    /// Source tile schema.
    pub fn tile_grid(&self) -> &TileSchema {
        &self.tile_schema
    }

    /// CRS of the source tiles.
    pub fn crs(&self) -> &Crs {
        self.tile_schema.crs()
    }

    /// Current invalidation key.
    pub fn key(&self) -> String {
        self.key.read().clone()
    }

    /// Sets the invalidation key. Tiles requested after the change are new instances; tiles
    /// created with the previous key stay in the caches.
    pub fn set_key(&self, key: impl Into<String>) {
        let key = key.into();
        log::debug!("Setting tile invalidation key to {key:?}");
        *self.key.write() = key;
    }

    /// Strategy of choosing the source level for a render resolution between two source levels.
    pub fn z_direction(&self) -> ZDirection {
        self.z_direction
    }

    /// Registers a listener of the source tile lifecycle events.
    pub fn add_listener(&self, listener: impl TileEventListener + 'static) {
        self.coordinator.add_listener(listener);
    }

    /// The coordinator loading the tiles of this source.
    pub fn coordinator(&self) -> &LoadCoordinator<L, C> {
        &self.coordinator
    }

    /// Render tile schema for the CRS.
    ///
    /// It is a quadtree over the whole extent of the CRS, with tiles of the size the source schema
    /// uses at its first level and levels down to [`DEFAULT_RENDER_MAX_ZOOM`]. If the extent of the
    /// CRS is unknown, the source schema itself is used for the source CRS, and other such CRSs are
    /// not supported.
    pub fn get_tile_grid_for_projection(&self, crs: &Crs) -> Result<Arc<TileSchema>, TessellaError> {
        if let Some(schema) = self.render_schemas.read().get(crs) {
            return Ok(schema.clone());
        }

        let schema = match crs.extent() {
            Some(extent) => {
                let (tile_size, _) = self.tile_schema.tile_size(self.tile_schema.min_z());
                Arc::new(TileSchema::xyz(
                    extent,
                    crs.clone(),
                    DEFAULT_RENDER_MAX_ZOOM,
                    tile_size,
                )?)
            }
            None if crs == self.crs() => self.tile_schema.clone(),
            None => return Err(TessellaError::UnsupportedCrs(crs.code())),
        };

        log::debug!("Created render tile schema for {crs}");

        Ok(self
            .render_schemas
            .write()
            .entry(crs.clone())
            .or_insert(schema)
            .clone())
    }

    /// Returns the render tile with index `z/x/y` in the render schema of the CRS.
    ///
    /// The tile is created on the first request, with its source tiles attached. Later requests with
    /// the same index and key return the same instance. The tile is not loaded, call
    /// [`VectorTileSource::load`] for that.
    pub fn get_tile(
        &self,
        z: u32,
        x: i32,
        y: i32,
        pixel_ratio: f64,
        crs: &Crs,
    ) -> Result<Arc<RenderTile<C::Features>>, TessellaError> {
        self.get_tile_grid_for_projection(crs)?;

        let index = TileIndex::new(z, x, y);
        let key = self.key();
        let cache = self.render_cache(crs);
        let tile = cache.get_or_insert_with((index, key.clone()), || {
            log::trace!("Creating render tile {index} in {crs} with key {key:?}");
            RenderTile::new(index, key.clone(), crs.clone(), pixel_ratio)
        });

        self.get_source_tiles(pixel_ratio, crs, &tile);

        Ok(tile)
    }

    /// Source tiles with data the render tile is made of.
    ///
    /// Resolved once per render tile; further calls return the same tiles. If there are no such
    /// tiles, the render tile becomes `Empty`. `pixel_ratio` does not affect which source tiles are
    /// selected.
    pub fn get_source_tiles(
        &self,
        _pixel_ratio: f64,
        crs: &Crs,
        render_tile: &RenderTile<C::Features>,
    ) -> Vec<Arc<SourceTile<C::Features>>> {
        render_tile.attach(|| self.resolve_backing(crs, render_tile.index(), render_tile.key()))
    }

    /// Starts loading the render tile. Wait for the result with [`RenderTile::wait_terminal`].
    ///
    /// Loads are spawned on the current tokio runtime, so this must be called from within one.
    /// Calling it outside a runtime panics.
    pub fn load(&self, tile: &Arc<RenderTile<C::Features>>) {
        self.coordinator.load(tile);
    }

    /// Loads the render tile again, for example after it failed to load.
    ///
    /// Like [`VectorTileSource::load`], panics when called outside a tokio runtime.
    pub fn reload(&self, tile: &Arc<RenderTile<C::Features>>) {
        self.coordinator.reload(tile);
    }

    /// Drops all cached tiles. Loads in flight still complete for the tiles they hold.
    pub fn clear(&self) {
        log::debug!("Clearing tile caches");
        self.source_tiles.clear();
        for cache in self.render_tiles.read().values() {
            cache.clear();
        }
    }

    fn render_cache(&self, crs: &Crs) -> Arc<TileCache<TileKey, RenderTile<C::Features>>> {
        if let Some(cache) = self.render_tiles.read().get(crs) {
            return cache.clone();
        }

        self.render_tiles
            .write()
            .entry(crs.clone())
            .or_insert_with(|| {
                Arc::new(match self.render_cache_capacity {
                    Some(capacity) => TileCache::with_capacity(capacity),
                    None => TileCache::new(),
                })
            })
            .clone()
    }

    fn resolve_backing(
        &self,
        crs: &Crs,
        index: TileIndex,
        key: &str,
    ) -> TileBacking<C::Features> {
        let no_tiles = TileBacking::Aggregate(vec![]);
        let Ok(render_schema) = self.get_tile_grid_for_projection(crs) else {
            return no_tiles;
        };

        if render_schema.is_same_level(index.z, &self.tile_schema) {
            return TileBacking::Direct(self.source_tile(self.wrap(index), key));
        }

        let (Some(render_resolution), Some(render_extent)) = (
            render_schema.lod_resolution(index.z),
            render_schema.tile_bbox(index),
        ) else {
            return no_tiles;
        };

        let Some((extent, resolution)) =
            self.source_extent(crs, render_extent.shrink(render_resolution), render_resolution)
        else {
            log::debug!("Render tile {index} in {crs} does not overlap source tiles");
            return no_tiles;
        };

        let Some(z) = self.tile_schema.z_for_resolution(resolution, self.z_direction) else {
            return no_tiles;
        };

        let range = self.tile_schema.tile_range_for_extent_and_z(&extent, z);
        if range.len() > MAX_SOURCE_TILES_PER_RENDER_TILE {
            log::warn!(
                "Render tile {index} in {crs} overlaps {} source tiles, leaving it empty",
                range.len()
            );
            return no_tiles;
        }

        let mut seen = HashSet::with_hasher(ahash::RandomState::new());
        let tiles: Vec<_> = range
            .iter()
            .map(|candidate| self.wrap(candidate))
            .filter(|source_index| seen.insert(*source_index))
            .map(|source_index| self.source_tile(source_index, key))
            .filter(|tile| tile.has_data())
            .collect();

        log::debug!(
            "Render tile {index} in {crs} covers {} source tiles of {} candidates at z {z}",
            tiles.len(),
            range.len()
        );

        TileBacking::Aggregate(tiles)
    }

    /// Render extent and resolution converted to the source CRS and clipped by the source bounds.
    fn source_extent(&self, crs: &Crs, extent: Rect, resolution: f64) -> Option<(Rect, f64)> {
        if extent.is_empty() {
            return None;
        }

        let source_extent = match transform_extent(extent, crs, self.crs()) {
            Ok(source_extent) => source_extent,
            Err(err) => {
                log::warn!("Cannot find source tiles for an extent in {crs}: {err}");
                return None;
            }
        };

        let source_resolution = resolution * source_extent.width() / extent.width();
        let source_extent = match self.tile_schema.bounds() {
            Some(bounds) => source_extent.intersection(bounds)?,
            None => source_extent,
        };

        if source_extent.is_empty() {
            return None;
        }

        Some((source_extent, source_resolution))
    }

    fn wrap(&self, index: TileIndex) -> TileIndex {
        if self.wrap_x {
            self.tile_schema.wrap_x(index)
        } else {
            index
        }
    }

    fn source_tile(&self, index: TileIndex, key: &str) -> Arc<SourceTile<C::Features>> {
        self.source_tiles
            .get_or_insert_with((index, key.to_string()), || {
                let url = if self.tile_schema.contains_index(index) {
                    (self.url_source)(&index)
                } else {
                    None
                };

                log::trace!("Creating source tile {index} with url {url:?}");

                // Indices without a level in the schema are never contained in it, so such tiles
                // have no URL and are never loaded.
                let extent = self
                    .tile_schema
                    .tile_bbox(index)
                    .unwrap_or(Rect::new(0.0, 0.0, 0.0, 0.0));
                SourceTile::new(index, key, url, extent)
            })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use bytes::Bytes;
    use parking_lot::Mutex;
    use tessella_mvt::MvtTile;
    use tessella_types::cartesian::Point2;

    use super::*;
    use crate::codec::MvtCodec;
    use crate::error::TileLoadError;
    use crate::events::{TileLoadEvent, TileLoadEventKind};
    use crate::tests::{url_for, TestTileLoader};
    use crate::tile::TileState;

    type TestSource = VectorTileSource<TestTileLoader, MvtCodec>;

    fn half_width() -> f64 {
        Crs::EPSG3857.extent().unwrap().x_max()
    }

    fn default_source(loader: &TestTileLoader) -> TestSource {
        VectorTileSourceBuilder::new_with_loader(url_for, loader.clone())
            .build()
            .unwrap()
    }

    /// Source schema with 256 px tiles shifted by half a tile to the east, so every render tile
    /// overlaps two columns of source tiles.
    fn shifted_source(loader: &TestTileLoader) -> TestSource {
        let top_resolution = 2.0 * half_width() / 256.0;
        let schema = TileSchema::builder(Crs::EPSG3857)
            .origin(Point2::new(
                -half_width() + 128.0 * top_resolution / 4.0,
                half_width(),
            ))
            .resolutions((0..=5).map(|z| top_resolution / 2f64.powi(z)))
            .tile_size(256, 256)
            .build()
            .unwrap();

        VectorTileSourceBuilder::new_with_loader(url_for, loader.clone())
            .with_tile_schema(schema)
            .with_z_direction(ZDirection::Nearest)
            .build()
            .unwrap()
    }

    fn record_events(source: &TestSource) -> Arc<Mutex<Vec<TileLoadEvent>>> {
        let events = Arc::new(Mutex::new(vec![]));
        let events_clone = events.clone();
        source.add_listener(move |event: &TileLoadEvent| events_clone.lock().push(event.clone()));
        events
    }

    #[tokio::test]
    async fn same_index_and_key_give_same_tile() {
        let loader = TestTileLoader::default();
        let source = default_source(&loader);

        let first = source.get_tile(3, 1, 2, 1.0, &Crs::EPSG3857).unwrap();
        let second = source.get_tile(3, 1, 2, 2.0, &Crs::EPSG3857).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.key(), "");

        source.set_key("v2");
        let third = source.get_tile(3, 1, 2, 1.0, &Crs::EPSG3857).unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(third.key(), "v2");
        assert_eq!(third.source_tiles()[0].key(), "v2");

        source.set_key("");
        let fourth = source.get_tile(3, 1, 2, 1.0, &Crs::EPSG3857).unwrap();
        assert!(Arc::ptr_eq(&first, &fourth));
    }

    #[tokio::test]
    async fn render_tiles_are_cached_per_crs() {
        let loader = TestTileLoader::default();
        let source = default_source(&loader);

        let mercator = source.get_tile(1, 0, 0, 1.0, &Crs::EPSG3857).unwrap();
        let geographic = source.get_tile(1, 0, 0, 1.0, &Crs::WGS84).unwrap();
        assert!(!Arc::ptr_eq(&mercator, &geographic));
        assert_eq!(*geographic.crs(), Crs::WGS84);
        assert!(mercator.is_direct());
        assert!(!geographic.is_direct());
    }

    #[tokio::test]
    async fn direct_tile_loads_its_source_tile() {
        let loader = TestTileLoader::default();
        let source = default_source(&loader);
        let events = record_events(&source);

        let tile = source.get_tile(3, 1, 2, 1.0, &Crs::EPSG3857).unwrap();
        assert!(tile.is_direct());
        assert_eq!(tile.state(), TileState::Idle);

        source.load(&tile);
        assert_eq!(tile.wait_terminal().await, TileState::Loaded);
        assert_eq!(
            loader.calls(),
            vec![(TileIndex::new(3, 1, 2), "test://3/1/2".to_string())]
        );

        let kinds: Vec<_> = events.lock().iter().map(|event| event.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TileLoadEventKind::TileLoadStart,
                TileLoadEventKind::TileLoadEnd
            ]
        );
        assert_eq!(events.lock()[1].state, TileState::Loaded);
    }

    #[tokio::test]
    async fn empty_payload_is_loaded() {
        let loader = TestTileLoader::default();
        let source = default_source(&loader);

        let tile = source.get_tile(5, 3, 3, 1.0, &Crs::EPSG3857).unwrap();
        source.load(&tile);
        assert_eq!(tile.wait_terminal().await, TileState::Loaded);

        let features: Vec<Arc<MvtTile>> = tile.features();
        assert_eq!(features.len(), 1);
        assert_eq!(features[0].feature_count(), 0);
    }

    #[tokio::test]
    async fn failures_end_in_error_state() {
        let loader = TestTileLoader::default();
        loader.respond(TileIndex::new(4, 0, 0), Err(TileLoadError::Network));
        loader.respond(
            TileIndex::new(4, 1, 0),
            Ok(Bytes::from_static(&[0xff, 0xff, 0xff, 0xff, 0x0f, 0x12])),
        );
        let source = default_source(&loader);
        let events = record_events(&source);

        for x in 0..2 {
            let tile = source.get_tile(4, x, 0, 1.0, &Crs::EPSG3857).unwrap();
            source.load(&tile);
            assert_eq!(tile.wait_terminal().await, TileState::Error);
        }

        let kinds: Vec<_> = events.lock().iter().map(|event| event.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TileLoadEventKind::TileLoadStart,
                TileLoadEventKind::TileLoadError,
                TileLoadEventKind::TileLoadStart,
                TileLoadEventKind::TileLoadError,
            ]
        );
    }

    #[tokio::test]
    async fn failed_tile_is_retried_only_on_reload() {
        let loader = TestTileLoader::default();
        let index = TileIndex::new(4, 0, 0);
        loader.respond(index, Err(TileLoadError::Network));
        let source = default_source(&loader);

        let tile = source.get_tile(4, 0, 0, 1.0, &Crs::EPSG3857).unwrap();
        source.load(&tile);
        assert_eq!(tile.wait_terminal().await, TileState::Error);

        source.load(&tile);
        assert_eq!(tile.state(), TileState::Error);
        assert_eq!(loader.call_count(), 1);

        loader.respond(index, Ok(Bytes::new()));
        source.reload(&tile);
        assert_eq!(tile.state(), TileState::Loading);
        assert_eq!(tile.wait_terminal().await, TileState::Loaded);
        assert_eq!(loader.call_count(), 2);
    }

    #[tokio::test]
    async fn concurrent_loads_call_loader_once() {
        let loader = TestTileLoader::default();
        let index = TileIndex::new(6, 10, 20);
        let gate = loader.gate(index);
        let source = default_source(&loader);

        let tile = source.get_tile(6, 10, 20, 1.0, &Crs::EPSG3857).unwrap();
        source.load(&tile);
        source.load(&tile);
        source.reload(&tile);
        assert_eq!(tile.state(), TileState::Loading);

        gate.notify_one();
        assert_eq!(tile.wait_terminal().await, TileState::Loaded);
        assert_eq!(loader.call_count(), 1);
    }

    #[tokio::test]
    async fn tiles_outside_bounds_are_empty() {
        let loader = TestTileLoader::default();
        let resolver_calls = Arc::new(AtomicUsize::new(0));
        let resolver_calls_clone = resolver_calls.clone();

        let top_resolution = 2.0 * half_width() / 512.0;
        let schema = TileSchema::builder(Crs::EPSG3857)
            .origin(Point2::new(-half_width(), half_width()))
            .bounds(Rect::new(0.0, 0.0, 1_000_000.0, 1_000_000.0))
            .resolutions((0..=22).map(|z| top_resolution / 2f64.powi(z)))
            .tile_size(512, 512)
            .build()
            .unwrap();
        let source = VectorTileSourceBuilder::new_with_loader(
            move |index: &TileIndex| {
                resolver_calls_clone.fetch_add(1, Ordering::Relaxed);
                url_for(index)
            },
            loader.clone(),
        )
        .with_tile_schema(schema)
        .build()
        .unwrap();
        let events = record_events(&source);

        let direct = source.get_tile(3, 0, 0, 1.0, &Crs::EPSG3857).unwrap();
        assert!(direct.is_direct());
        let aggregate = source.get_tile(3, 0, 0, 1.0, &Crs::WGS84).unwrap();
        assert!(!aggregate.is_direct());

        for tile in [direct, aggregate] {
            assert_eq!(tile.state(), TileState::Empty);
            assert!(tile.source_tiles().is_empty());
            source.load(&tile);
            assert_eq!(tile.wait_terminal().await, TileState::Empty);
        }

        assert_eq!(loader.call_count(), 0);
        assert_eq!(resolver_calls.load(Ordering::Relaxed), 0);
        assert!(events.lock().is_empty());
    }

    #[tokio::test]
    async fn resolver_without_url_gives_empty_tile() {
        let loader = TestTileLoader::default();
        let source = VectorTileSourceBuilder::new_with_loader(|_: &TileIndex| None, loader.clone())
            .build()
            .unwrap();

        let tile = source.get_tile(2, 1, 1, 1.0, &Crs::EPSG3857).unwrap();
        assert_eq!(tile.state(), TileState::Empty);
        source.load(&tile);
        assert_eq!(loader.call_count(), 0);
    }

    #[tokio::test]
    async fn aggregate_tile_collects_overlapping_source_tiles() {
        let loader = TestTileLoader::default();
        let source = shifted_source(&loader);

        let tile = source.get_tile(2, 1, 1, 1.0, &Crs::EPSG3857).unwrap();
        assert!(!tile.is_direct());
        let indices: Vec<_> = tile.source_tiles().iter().map(|t| t.index()).collect();
        assert_eq!(indices, vec![TileIndex::new(2, 0, 1), TileIndex::new(2, 1, 1)]);

        let again = source.get_source_tiles(1.0, &Crs::EPSG3857, &tile);
        assert!(Arc::ptr_eq(&again[0], &tile.source_tiles()[0]));

        let neighbour = source.get_tile(2, 2, 1, 1.0, &Crs::EPSG3857).unwrap();
        assert!(Arc::ptr_eq(
            &neighbour.source_tiles()[0],
            &tile.source_tiles()[1]
        ));
    }

    #[tokio::test]
    async fn aggregate_tile_is_loaded_if_any_source_is_loaded() {
        for failing_first in [true, false] {
            let loader = TestTileLoader::default();
            let failing = TileIndex::new(2, 0, 1);
            let succeeding = TileIndex::new(2, 1, 1);
            loader.respond(failing, Err(TileLoadError::DoesNotExist));
            let failing_gate = loader.gate(failing);
            let succeeding_gate = loader.gate(succeeding);
            let source = shifted_source(&loader);

            let tile = source.get_tile(2, 1, 1, 1.0, &Crs::EPSG3857).unwrap();
            let sources = tile.source_tiles();
            source.load(&tile);
            assert_eq!(tile.state(), TileState::Loading);

            let (first, second) = if failing_first {
                (failing_gate, succeeding_gate)
            } else {
                (succeeding_gate, failing_gate)
            };
            let (first_tile, expected_first) = if failing_first {
                (&sources[0], TileState::Error)
            } else {
                (&sources[1], TileState::Loaded)
            };

            first.notify_one();
            assert_eq!(first_tile.wait_terminal().await, expected_first);
            tokio::task::yield_now().await;
            assert_eq!(tile.state(), TileState::Loading);

            second.notify_one();
            assert_eq!(tile.wait_terminal().await, TileState::Loaded);
            assert_eq!(loader.call_count(), 2);
        }
    }

    #[tokio::test]
    async fn aggregate_tile_with_all_sources_failed_is_error() {
        let loader = TestTileLoader::default();
        loader.respond(TileIndex::new(2, 0, 1), Err(TileLoadError::Network));
        loader.respond(TileIndex::new(2, 1, 1), Err(TileLoadError::Network));
        let source = shifted_source(&loader);

        let tile = source.get_tile(2, 1, 1, 1.0, &Crs::EPSG3857).unwrap();
        source.load(&tile);
        assert_eq!(tile.wait_terminal().await, TileState::Error);
    }

    #[tokio::test]
    async fn shared_source_tile_is_loaded_once() {
        let loader = TestTileLoader::default();
        let source = shifted_source(&loader);

        let left = source.get_tile(2, 1, 1, 1.0, &Crs::EPSG3857).unwrap();
        let right = source.get_tile(2, 2, 1, 1.0, &Crs::EPSG3857).unwrap();
        source.load(&left);
        source.load(&right);
        assert_eq!(left.wait_terminal().await, TileState::Loaded);
        assert_eq!(right.wait_terminal().await, TileState::Loaded);

        let mut calls: Vec<_> = loader.calls().into_iter().map(|(index, _)| index).collect();
        calls.sort_by_key(|index| index.x);
        assert_eq!(
            calls,
            vec![
                TileIndex::new(2, 0, 1),
                TileIndex::new(2, 1, 1),
                TileIndex::new(2, 2, 1)
            ]
        );
    }

    #[tokio::test]
    async fn clear_drops_cached_tiles() {
        let loader = TestTileLoader::default();
        let source = default_source(&loader);

        let tile = source.get_tile(3, 1, 2, 1.0, &Crs::EPSG3857).unwrap();
        source.clear();
        let new_tile = source.get_tile(3, 1, 2, 1.0, &Crs::EPSG3857).unwrap();
        assert!(!Arc::ptr_eq(&tile, &new_tile));
        assert!(!Arc::ptr_eq(
            &tile.source_tiles()[0],
            &new_tile.source_tiles()[0]
        ));
    }

    #[tokio::test]
    async fn tiles_across_antimeridian_wrap_to_the_same_source_tile() {
        let loader = TestTileLoader::default();
        let source = VectorTileSourceBuilder::new_with_loader(url_for, loader.clone())
            .with_wrap_x(true)
            .build()
            .unwrap();

        let east = source.get_tile(1, 2, 0, 1.0, &Crs::EPSG3857).unwrap();
        let inside = source.get_tile(1, 0, 0, 1.0, &Crs::EPSG3857).unwrap();
        let west = source.get_tile(1, -1, 0, 1.0, &Crs::EPSG3857).unwrap();
        assert!(!Arc::ptr_eq(&east, &inside));
        assert!(Arc::ptr_eq(
            &east.source_tiles()[0],
            &inside.source_tiles()[0]
        ));
        assert_eq!(west.source_tiles()[0].index(), TileIndex::new(1, 1, 0));

        source.load(&east);
        source.load(&inside);
        assert_eq!(east.wait_terminal().await, TileState::Loaded);
        assert_eq!(inside.wait_terminal().await, TileState::Loaded);
        assert_eq!(
            loader.calls(),
            vec![(TileIndex::new(1, 0, 0), "test://1/0/0".to_string())]
        );
    }

    #[tokio::test]
    async fn tiles_outside_world_are_empty_without_wrapping() {
        let loader = TestTileLoader::default();
        let source = default_source(&loader);

        let tile = source.get_tile(1, 2, 0, 1.0, &Crs::EPSG3857).unwrap();
        assert_eq!(tile.state(), TileState::Empty);
        source.load(&tile);
        assert_eq!(loader.call_count(), 0);
    }

    #[tokio::test]
    async fn bounded_caches_keep_shared_source_tiles() {
        let loader = TestTileLoader::default();
        let top_resolution = 2.0 * half_width() / 256.0;
        let schema = TileSchema::builder(Crs::EPSG3857)
            .origin(Point2::new(
                -half_width() + 128.0 * top_resolution / 4.0,
                half_width(),
            ))
            .resolutions((0..=5).map(|z| top_resolution / 2f64.powi(z)))
            .tile_size(256, 256)
            .build()
            .unwrap();
        let source = VectorTileSourceBuilder::new_with_loader(url_for, loader.clone())
            .with_tile_schema(schema)
            .with_z_direction(ZDirection::Nearest)
            .with_render_cache_capacity(2)
            .with_source_cache_capacity(2)
            .build()
            .unwrap();

        let left = source.get_tile(2, 1, 1, 1.0, &Crs::EPSG3857).unwrap();
        for y in 0..4 {
            for x in 0..4 {
                source.get_tile(3, x, y, 1.0, &Crs::EPSG3857).unwrap();
            }
        }

        let right = source.get_tile(2, 2, 1, 1.0, &Crs::EPSG3857).unwrap();
        assert!(Arc::ptr_eq(
            &left.source_tiles()[1],
            &right.source_tiles()[0]
        ));
        assert!(Arc::ptr_eq(
            &left,
            &source.get_tile(2, 1, 1, 1.0, &Crs::EPSG3857).unwrap()
        ));

        source.load(&left);
        source.load(&right);
        assert_eq!(left.wait_terminal().await, TileState::Loaded);
        assert_eq!(right.wait_terminal().await, TileState::Loaded);
        assert_eq!(loader.call_count(), 3);
    }

    #[test]
    fn unsupported_crs() {
        let loader = TestTileLoader::default();
        let source = default_source(&loader);
        let crs = Crs::new(
            tessella_types::geo::Datum::WGS84,
            tessella_types::geo::ProjectionType::Other("EPSG:2056".into()),
        );

        assert!(matches!(
            source.get_tile(0, 0, 0, 1.0, &crs),
            Err(TessellaError::UnsupportedCrs(_))
        ));
    }
}
