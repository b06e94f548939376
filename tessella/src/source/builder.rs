use std::sync::Arc;

use parking_lot::RwLock;
use tessella_types::geo::Crs;

use super::VectorTileSource;
use crate::codec::{MvtCodec, TileCodec};
use crate::coordinator::LoadCoordinator;
use crate::error::TessellaError;
use crate::events::TileEventListener;
#[cfg(feature = "rest")]
use crate::loader::RestTileLoader;
use crate::loader::{TileLoader, UrlSource};
use crate::tile_cache::TileCache;
use crate::tile_schema::{TileSchema, ZDirection};

const DEFAULT_TILE_SIZE: u32 = 512;
const DEFAULT_MAX_ZOOM: u32 = 22;

/// Constructor for a [`VectorTileSource`].
///
/// ```
/// use tessella::source::VectorTileSourceBuilder;
///
/// let source = VectorTileSourceBuilder::new_rest(|index| {
///     Some(format!(
///         "https://vector_tiles.example.com/{}/{}/{}.pbf",
///         index.z, index.x, index.y
///     ))
/// })
/// .with_max_zoom(14)
/// .build()?;
/// # Ok::<(), tessella::error::TessellaError>(())
/// ```
pub struct VectorTileSourceBuilder<L, C> {
    url_source: Arc<dyn UrlSource>,
    loader: Result<L, TessellaError>,
    codec: C,
    tile_schema: Option<TileSchema>,
    crs: Crs,
    tile_size: u32,
    max_zoom: u32,
    key: String,
    z_direction: ZDirection,
    wrap_x: bool,
    render_cache_capacity: Option<usize>,
    source_cache_capacity: Option<usize>,
    listeners: Vec<Arc<dyn TileEventListener>>,
}

#[cfg(feature = "rest")]
impl VectorTileSourceBuilder<RestTileLoader, MvtCodec> {
    /// Initializes a builder for a source that requests Mapbox Vector Tiles over HTTP from the
    /// URLs given by the url source.
    pub fn new_rest(url_source: impl UrlSource + 'static) -> Self {
        Self::new_with_loader_result(
            url_source,
            RestTileLoader::new().map_err(TessellaError::from),
        )
    }
}

impl<L: TileLoader + 'static> VectorTileSourceBuilder<L, MvtCodec> {
    /// Initializes a builder for a source that loads tiles with the given loader.
    pub fn new_with_loader(url_source: impl UrlSource + 'static, loader: L) -> Self {
        Self::new_with_loader_result(url_source, Ok(loader))
    }

    fn new_with_loader_result(
        url_source: impl UrlSource + 'static,
        loader: Result<L, TessellaError>,
    ) -> Self {
        Self {
            url_source: Arc::new(url_source),
            loader,
            codec: MvtCodec::default(),
            tile_schema: None,
            crs: Crs::EPSG3857,
            tile_size: DEFAULT_TILE_SIZE,
            max_zoom: DEFAULT_MAX_ZOOM,
            key: String::new(),
            z_direction: ZDirection::default(),
            wrap_x: false,
            render_cache_capacity: None,
            source_cache_capacity: None,
            listeners: vec![],
        }
    }
}

impl<L: TileLoader + 'static, C: TileCodec + 'static> VectorTileSourceBuilder<L, C> {
    /// Sets the decoder of the tile data. The default is [`MvtCodec`].
    pub fn with_codec<C2: TileCodec + 'static>(self, codec: C2) -> VectorTileSourceBuilder<L, C2> {
        VectorTileSourceBuilder {
            url_source: self.url_source,
            loader: self.loader,
            codec,
            tile_schema: self.tile_schema,
            crs: self.crs,
            tile_size: self.tile_size,
            max_zoom: self.max_zoom,
            key: self.key,
            z_direction: self.z_direction,
            wrap_x: self.wrap_x,
            render_cache_capacity: self.render_cache_capacity,
            source_cache_capacity: self.source_cache_capacity,
            listeners: self.listeners,
        }
    }

    /// Sets the schema the source tiles are published in.
    ///
    /// If not set, a quadtree schema over the extent of the CRS set by
    /// [`VectorTileSourceBuilder::with_crs`] is used, with the tile size and max zoom given to
    /// this builder. When set, these three parameters are ignored.
    pub fn with_tile_schema(mut self, tile_schema: TileSchema) -> Self {
        self.tile_schema = Some(tile_schema);
        self
    }

    /// CRS of the default tile schema. Default is Web Mercator.
    pub fn with_crs(mut self, crs: Crs) -> Self {
        self.crs = crs;
        self
    }

    /// Tile size of the default tile schema. Default is `512`.
    pub fn with_tile_size(mut self, tile_size: u32) -> Self {
        self.tile_size = tile_size;
        self
    }

    /// Max z level of the default tile schema. Default is `22`.
    pub fn with_max_zoom(mut self, max_zoom: u32) -> Self {
        self.max_zoom = max_zoom;
        self
    }

    /// Initial invalidation key. Default is an empty string.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// How to choose the source level for a render resolution between two source levels.
    pub fn with_z_direction(mut self, z_direction: ZDirection) -> Self {
        self.z_direction = z_direction;
        self
    }

    /// Wrap source tile X indices around the antimeridian for schemas covering the whole world.
    pub fn with_wrap_x(mut self, wrap_x: bool) -> Self {
        self.wrap_x = wrap_x;
        self
    }

    /// Limits the number of render tiles cached for each CRS. Unlimited by default.
    pub fn with_render_cache_capacity(mut self, capacity: usize) -> Self {
        self.render_cache_capacity = Some(capacity);
        self
    }

    /// Limits the number of cached source tiles. Unlimited by default.
    pub fn with_source_cache_capacity(mut self, capacity: usize) -> Self {
        self.source_cache_capacity = Some(capacity);
        self
    }

    /// Adds a listener of the source tile lifecycle events.
    pub fn with_listener(mut self, listener: impl TileEventListener + 'static) -> Self {
        self.listeners.push(Arc::new(listener));
        self
    }

    /// Consumes the builder and constructs the source.
    ///
    /// Fails if the tile schema cannot be created or the loader could not be initialized.
    pub fn build(self) -> Result<VectorTileSource<L, C>, TessellaError> {
        let loader = self.loader?;
        let tile_schema = match self.tile_schema {
            Some(tile_schema) => tile_schema,
            None => {
                let extent = self
                    .crs
                    .extent()
                    .ok_or_else(|| TessellaError::UnsupportedCrs(self.crs.code()))?;
                TileSchema::xyz(extent, self.crs.clone(), self.max_zoom, self.tile_size)?
            }
        };

        let coordinator = LoadCoordinator::new(loader, self.codec, tile_schema.crs().clone());
        for listener in self.listeners {
            coordinator.add_shared_listener(listener);
        }

        let source_tiles = match self.source_cache_capacity {
            Some(capacity) => TileCache::with_capacity(capacity),
            None => TileCache::new(),
        };

        Ok(VectorTileSource {
            tile_schema: Arc::new(tile_schema),
            url_source: self.url_source,
            coordinator,
            key: RwLock::new(self.key),
            z_direction: self.z_direction,
            wrap_x: self.wrap_x,
            render_cache_capacity: self.render_cache_capacity,
            render_schemas: RwLock::default(),
            render_tiles: RwLock::default(),
            source_tiles,
        })
    }
}
