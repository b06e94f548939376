use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tessella_types::cartesian::{Point2, Rect};
use tessella_types::geo::Crs;
use thiserror::Error;

use super::{Lod, TileSchema, VerticalDirection};

const DEFAULT_TILE_SIZE: u32 = 256;

/// Error returned when a [`TileSchema`] cannot be built from the given parameters.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TileSchemaError {
    /// No levels of detail given.
    #[error("tile schema must have at least one level of detail")]
    NoLods,
    /// Resolution is not a finite positive number.
    #[error("invalid resolution {resolution} at z level {z}")]
    InvalidResolution {
        /// Z level of the resolution.
        z: u32,
        /// Offending value.
        resolution: f64,
    },
    /// Z indices of the levels do not follow each other.
    #[error("z levels must be contiguous, found {found} after {previous}")]
    NonContiguousZ {
        /// Previous z level.
        previous: u32,
        /// Z level following it.
        found: u32,
    },
    /// Resolution of a level is not smaller than the resolution of the previous level.
    #[error("resolution at z level {z} must be smaller than at the previous level")]
    ResolutionOrder {
        /// Z level with the offending resolution.
        z: u32,
    },
    /// Zero tile width or height.
    #[error("tile size must not be zero")]
    ZeroTileSize,
    /// Bounds rectangle has no area.
    #[error("tile schema bounds must not be empty")]
    EmptyBounds,
}

/// Builder for [`TileSchema`].
///
/// The builder is also the serialized form of the schema, so a schema read from a configuration
/// file goes through the same validation as one constructed in code.
///
/// ```
/// use tessella::tile_schema::{TileSchemaBuilder, VerticalDirection};
/// use tessella::tessella_types::cartesian::Point2;
/// use tessella::tessella_types::geo::Crs;
///
/// let schema = TileSchemaBuilder::new(Crs::EPSG3857)
///     .origin(Point2::new(218128.0, 6126002.0))
///     .resolutions([4096.0, 2048.0, 1024.0])
///     .tile_size(256, 256)
///     .y_direction(VerticalDirection::TopToBottom)
///     .build()
///     .expect("valid schema");
/// assert_eq!(schema.max_z(), 2);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TileSchemaBuilder {
    origin: Point2<f64>,
    #[serde(default)]
    bounds: Option<Rect>,
    lods: Vec<Lod>,
    tile_width: u32,
    tile_height: u32,
    #[serde(default)]
    tile_sizes: BTreeMap<u32, (u32, u32)>,
    y_direction: VerticalDirection,
    crs: Crs,
}

impl TileSchemaBuilder {
    /// Starts a schema in the given CRS with origin at `(0, 0)`, no levels, `256x256` tiles and
    /// rows counted from top to bottom.
    pub fn new(crs: Crs) -> Self {
        Self {
            origin: Point2::new(0.0, 0.0),
            bounds: None,
            lods: vec![],
            tile_width: DEFAULT_TILE_SIZE,
            tile_height: DEFAULT_TILE_SIZE,
            tile_sizes: BTreeMap::new(),
            y_direction: VerticalDirection::TopToBottom,
            crs,
        }
    }

    /// Position where tile `x == 0, y == 0` has its corner.
    pub fn origin(mut self, origin: Point2<f64>) -> Self {
        self.origin = origin;
        self
    }

    /// Area outside of which there are no tiles.
    pub fn bounds(mut self, bounds: Rect) -> Self {
        self.bounds = Some(bounds);
        self
    }

    /// Sets levels of detail from a list of resolutions, starting from `z == 0`.
    pub fn resolutions(mut self, resolutions: impl IntoIterator<Item = f64>) -> Self {
        self.lods = resolutions
            .into_iter()
            .enumerate()
            .map(|(z, resolution)| Lod::new_unchecked(resolution, z as u32))
            .collect();
        self
    }

    /// Sets levels of detail.
    pub fn lods(mut self, lods: impl IntoIterator<Item = Lod>) -> Self {
        self.lods = lods.into_iter().collect();
        self
    }

    /// Default size of a tile in pixels.
    pub fn tile_size(mut self, width: u32, height: u32) -> Self {
        self.tile_width = width;
        self.tile_height = height;
        self
    }

    /// Overrides the tile size at a single z level.
    pub fn level_tile_size(mut self, z: u32, width: u32, height: u32) -> Self {
        self.tile_sizes.insert(z, (width, height));
        self
    }

    /// Direction of the Y index.
    pub fn y_direction(mut self, y_direction: VerticalDirection) -> Self {
        self.y_direction = y_direction;
        self
    }

    /// Validates the parameters and creates the schema.
    pub fn build(self) -> Result<TileSchema, TileSchemaError> {
        let Some(first) = self.lods.first() else {
            return Err(TileSchemaError::NoLods);
        };

        let mut previous = *first;
        check_resolution(previous)?;
        for lod in self.lods.iter().skip(1) {
            check_resolution(*lod)?;
            if lod.z_index() != previous.z_index() + 1 {
                return Err(TileSchemaError::NonContiguousZ {
                    previous: previous.z_index(),
                    found: lod.z_index(),
                });
            }

            if lod.resolution() >= previous.resolution() {
                return Err(TileSchemaError::ResolutionOrder { z: lod.z_index() });
            }

            previous = *lod;
        }

        let zero_size = |(w, h): (u32, u32)| w == 0 || h == 0;
        if zero_size((self.tile_width, self.tile_height))
            || self.tile_sizes.values().copied().any(zero_size)
        {
            return Err(TileSchemaError::ZeroTileSize);
        }

        if self.bounds.is_some_and(|bounds| bounds.is_empty()) {
            return Err(TileSchemaError::EmptyBounds);
        }

        Ok(TileSchema {
            origin: self.origin,
            bounds: self.bounds,
            lods: self.lods,
            tile_width: self.tile_width,
            tile_height: self.tile_height,
            tile_sizes: self.tile_sizes,
            y_direction: self.y_direction,
            crs: self.crs,
        })
    }
}

fn check_resolution(lod: Lod) -> Result<(), TileSchemaError> {
    if lod.resolution().is_finite() && lod.resolution() > 0.0 {
        Ok(())
    } else {
        Err(TileSchemaError::InvalidResolution {
            z: lod.z_index(),
            resolution: lod.resolution(),
        })
    }
}

impl TryFrom<TileSchemaBuilder> for TileSchema {
    type Error = TileSchemaError;

    fn try_from(value: TileSchemaBuilder) -> Result<Self, Self::Error> {
        value.build()
    }
}

impl From<TileSchema> for TileSchemaBuilder {
    fn from(value: TileSchema) -> Self {
        Self {
            origin: value.origin,
            bounds: value.bounds,
            lods: value.lods,
            tile_width: value.tile_width,
            tile_height: value.tile_height,
            tile_sizes: value.tile_sizes,
            y_direction: value.y_direction,
            crs: value.crs,
        }
    }
}
