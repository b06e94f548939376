use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tessella_types::cartesian::{CartesianPoint2d, Point2, Rect};
use tessella_types::geo::Crs;

use super::{Lod, TileIndex, TileSchemaBuilder, TileSchemaError};

/// Fractional tile coordinates are rounded to this many decimals before taking floor or ceiling,
/// so that float noise does not push an exact tile border into the neighbouring tile.
const DECIMALS: i32 = 5;

/// Direction of the Y index of tiles.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum VerticalDirection {
    /// Tiles with `Y == 0` are at the top of the map.
    TopToBottom,
    /// Tiles with `Y == 0` are at the bottom of the map.
    BottomToTop,
}

/// Which level to use when a resolution falls between two levels of a schema.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum ZDirection {
    /// The level with the larger resolution of the two (smaller z).
    #[default]
    Positive,
    /// The level with the smaller resolution of the two (larger z).
    Negative,
    /// The level with the closest resolution.
    Nearest,
}

/// Inclusive range of tile indices at one z level.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileRange {
    /// Z level.
    pub z: u32,
    /// Smallest X index.
    pub min_x: i32,
    /// Largest X index.
    pub max_x: i32,
    /// Smallest Y index.
    pub min_y: i32,
    /// Largest Y index.
    pub max_y: i32,
}

impl TileRange {
    /// Creates a new range.
    pub fn new(z: u32, min_x: i32, max_x: i32, min_y: i32, max_y: i32) -> Self {
        Self {
            z,
            min_x,
            max_x,
            min_y,
            max_y,
        }
    }

    /// Range that contains no tiles.
    pub fn empty(z: u32) -> Self {
        Self::new(z, 0, -1, 0, -1)
    }

    /// Returns true if the range contains no tiles.
    pub fn is_empty(&self) -> bool {
        self.min_x > self.max_x || self.min_y > self.max_y
    }

    /// Number of tiles in the range.
    pub fn len(&self) -> usize {
        if self.is_empty() {
            return 0;
        }

        let width = (self.max_x as i64 - self.min_x as i64 + 1) as u64;
        let height = (self.max_y as i64 - self.min_y as i64 + 1) as u64;
        width
            .checked_mul(height)
            .and_then(|len| usize::try_from(len).ok())
            .unwrap_or(usize::MAX)
    }

    /// Returns true if the index is at the range's level and within it.
    pub fn contains(&self, index: &TileIndex) -> bool {
        index.z == self.z
            && (self.min_x..=self.max_x).contains(&index.x)
            && (self.min_y..=self.max_y).contains(&index.y)
    }

    /// Iterates over all indices of the range, column by column.
    pub fn iter(&self) -> impl Iterator<Item = TileIndex> {
        let TileRange {
            z,
            min_x,
            max_x,
            min_y,
            max_y,
        } = *self;
        (min_x..=max_x).flat_map(move |x| (min_y..=max_y).map(move |y| TileIndex::new(z, x, y)))
    }
}

/// Tile schema specifies how tile indices are calculated based on the map position and resolution.
///
/// Instances are created with [`TileSchemaBuilder`] (or the [`TileSchema::xyz`] shortcut), which
/// guarantees that there is at least one level, that z levels are contiguous and that resolutions
/// strictly decrease with z.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TileSchemaBuilder", into = "TileSchemaBuilder")]
pub struct TileSchema {
    pub(super) origin: Point2<f64>,
    pub(super) bounds: Option<Rect>,
    pub(super) lods: Vec<Lod>,
    pub(super) tile_width: u32,
    pub(super) tile_height: u32,
    pub(super) tile_sizes: BTreeMap<u32, (u32, u32)>,
    pub(super) y_direction: VerticalDirection,
    pub(super) crs: Crs,
}

impl TileSchema {
    /// Starts building a custom schema.
    pub fn builder(crs: Crs) -> TileSchemaBuilder {
        TileSchemaBuilder::new(crs)
    }

    /// Quadtree schema over `extent`: square tiles of `tile_size` pixels, `z` from `0` to `max_zoom`,
    /// the whole extent fitting into the single tile at `z == 0` and each next level halving the
    /// resolution. The origin is the top left corner of the extent.
    pub fn xyz(
        extent: Rect,
        crs: Crs,
        max_zoom: u32,
        tile_size: u32,
    ) -> Result<Self, TileSchemaError> {
        if extent.is_empty() {
            return Err(TileSchemaError::EmptyBounds);
        }
        if tile_size == 0 {
            return Err(TileSchemaError::ZeroTileSize);
        }

        let top_resolution = extent.width().max(extent.height()) / tile_size as f64;
        TileSchemaBuilder::new(crs)
            .origin(Point2::new(extent.x_min(), extent.y_max()))
            .bounds(extent)
            .resolutions((0..=max_zoom).map(|z| top_resolution / 2f64.powi(z as i32)))
            .tile_size(tile_size, tile_size)
            .y_direction(VerticalDirection::TopToBottom)
            .build()
    }

    /// CRS of the schema.
    pub fn crs(&self) -> &Crs {
        &self.crs
    }

    /// Position where all tiles have `X == 0, Y == 0` indices.
    pub fn origin(&self) -> Point2<f64> {
        self.origin
    }

    /// Rectangle that contains all tiles of the schema, if limited.
    pub fn bounds(&self) -> Option<Rect> {
        self.bounds
    }

    /// Direction of the Y-axis.
    pub fn y_direction(&self) -> VerticalDirection {
        self.y_direction
    }

    /// Levels of detail from the smallest z to the largest.
    pub fn lods(&self) -> impl Iterator<Item = Lod> + '_ {
        self.lods.iter().copied()
    }

    /// Smallest z level of the schema.
    pub fn min_z(&self) -> u32 {
        self.lods.first().map_or(0, Lod::z_index)
    }

    /// Largest z level of the schema.
    pub fn max_z(&self) -> u32 {
        self.lods.last().map_or(0, Lod::z_index)
    }

    fn lod(&self, z: u32) -> Option<&Lod> {
        let offset = z.checked_sub(self.min_z())?;
        self.lods.get(offset as usize)
    }

    /// Resolution of the given z-level, if exists.
    pub fn lod_resolution(&self, z: u32) -> Option<f64> {
        self.lod(z).map(Lod::resolution)
    }

    /// Width and height of tiles at the given level in pixels.
    pub fn tile_size(&self, z: u32) -> (u32, u32) {
        self.tile_sizes
            .get(&z)
            .copied()
            .unwrap_or((self.tile_width, self.tile_height))
    }

    /// Z level for the given resolution.
    ///
    /// If the resolution equals one of the levels, that level is returned. If it is between two
    /// levels, `direction` decides which one wins. Resolutions outside the ladder are clamped to the
    /// first or the last level.
    pub fn z_for_resolution(&self, resolution: f64, direction: ZDirection) -> Option<u32> {
        if resolution.is_nan() {
            return None;
        }

        let first = self.lods.first()?;
        let last = self.lods.last()?;
        if resolution >= first.resolution() {
            return Some(first.z_index());
        }
        if resolution <= last.resolution() {
            return Some(last.z_index());
        }

        // Here `lods[i - 1].resolution() > resolution >= lods[i].resolution()`.
        let i = self
            .lods
            .iter()
            .position(|lod| lod.resolution() <= resolution)?;
        let (coarser, finer) = (self.lods[i - 1], self.lods[i]);

        let lod = if finer.resolution() == resolution {
            finer
        } else {
            match direction {
                ZDirection::Positive => coarser,
                ZDirection::Negative => finer,
                ZDirection::Nearest => {
                    if resolution - finer.resolution() <= coarser.resolution() - resolution {
                        finer
                    } else {
                        coarser
                    }
                }
            }
        };

        Some(lod.z_index())
    }

    /// Index of the tile containing the point at level `z`.
    pub fn tile_coord_for_coord_and_z(
        &self,
        point: &impl CartesianPoint2d<Num = f64>,
        z: u32,
    ) -> Option<TileIndex> {
        self.tile_coord(point.x(), point.y(), z, false)
    }

    /// Index of the tile containing the point at the level selected for the resolution with
    /// [`TileSchema::z_for_resolution`].
    pub fn tile_coord_for_coord_and_resolution(
        &self,
        point: &impl CartesianPoint2d<Num = f64>,
        resolution: f64,
        direction: ZDirection,
    ) -> Option<TileIndex> {
        let z = self.z_for_resolution(resolution, direction)?;
        self.tile_coord_for_coord_and_z(point, z)
    }

    /// Range of tiles at level `z` that overlap the extent.
    ///
    /// Tiles that only touch the extent by their border are not included. Extents with no area or
    /// with non-finite coordinates give an empty range.
    pub fn tile_range_for_extent_and_z(&self, extent: &Rect, z: u32) -> TileRange {
        if extent.is_empty() {
            return TileRange::empty(z);
        }

        let (first_y, last_y) = match self.y_direction {
            VerticalDirection::TopToBottom => (extent.y_max(), extent.y_min()),
            VerticalDirection::BottomToTop => (extent.y_min(), extent.y_max()),
        };

        let min = self.tile_coord(extent.x_min(), first_y, z, false);
        let max = self.tile_coord(extent.x_max(), last_y, z, true);
        match (min, max) {
            (Some(min), Some(max)) => TileRange::new(z, min.x, max.x, min.y, max.y),
            _ => TileRange::empty(z),
        }
    }

    /// Range of tiles overlapping the extent at the level selected for the resolution.
    pub fn tile_range_for_extent_and_resolution(
        &self,
        extent: &Rect,
        resolution: f64,
        direction: ZDirection,
    ) -> TileRange {
        match self.z_for_resolution(resolution, direction) {
            Some(z) => self.tile_range_for_extent_and_z(extent, z),
            None => TileRange::empty(self.min_z()),
        }
    }

    /// Extent of the tile in the schema's CRS.
    pub fn tile_bbox(&self, index: TileIndex) -> Option<Rect> {
        let resolution = self.lod_resolution(index.z)?;
        let (width, height) = self.tile_size(index.z);
        let tile_w = width as f64 * resolution;
        let tile_h = height as f64 * resolution;

        let x_min = self.origin.x + index.x as f64 * tile_w;
        let y_min = match self.y_direction {
            VerticalDirection::TopToBottom => self.origin.y - (index.y as f64 + 1.0) * tile_h,
            VerticalDirection::BottomToTop => self.origin.y + index.y as f64 * tile_h,
        };

        Some(Rect::new(x_min, y_min, x_min + tile_w, y_min + tile_h))
    }

    /// All tiles within the schema bounds at level `z`. `None` if the level does not exist or the
    /// schema has no bounds.
    pub fn full_tile_range(&self, z: u32) -> Option<TileRange> {
        self.lod(z)?;
        let bounds = self.bounds?;
        Some(self.tile_range_for_extent_and_z(&bounds, z))
    }

    /// Returns true if the level of the index exists and the tile is within the schema bounds.
    pub fn contains_index(&self, index: TileIndex) -> bool {
        if self.lod(index.z).is_none() {
            return false;
        }

        self.full_tile_range(index.z)
            .map_or(true, |range| range.contains(&index))
    }

    /// For schemas whose bounds span the whole width of the CRS, moves the X index of the tile that
    /// is beyond the bounds back into them (wrapping around the antimeridian). Other indices are
    /// returned as is.
    pub fn wrap_x(&self, index: TileIndex) -> TileIndex {
        let (Some(bounds), Some(crs_extent)) = (self.bounds, self.crs.extent()) else {
            return index;
        };
        if (bounds.width() - crs_extent.width()).abs() > crs_extent.width() * 1e-9 {
            return index;
        }

        let Some(range) = self.full_tile_range(index.z) else {
            return index;
        };
        if range.is_empty() {
            return index;
        }

        let count = range.max_x as i64 - range.min_x as i64 + 1;
        let x = range.min_x as i64 + (index.x as i64 - range.min_x as i64).rem_euclid(count);
        TileIndex::new(index.z, x as i32, index.y)
    }

    /// Returns true if tiles of both schemas at level `z` are the same: same CRS, origin, tile size
    /// and resolution.
    pub fn is_same_level(&self, z: u32, other: &TileSchema) -> bool {
        let (Some(resolution), Some(other_resolution)) =
            (self.lod_resolution(z), other.lod_resolution(z))
        else {
            return false;
        };

        self.crs == other.crs
            && self.y_direction == other.y_direction
            && self.tile_size(z) == other.tile_size(z)
            && nearly_equal(resolution, other_resolution)
            && nearly_equal(self.origin.x, other.origin.x)
            && nearly_equal(self.origin.y, other.origin.y)
    }

    fn tile_coord(&self, x: f64, y: f64, z: u32, reverse: bool) -> Option<TileIndex> {
        let resolution = self.lod_resolution(z)?;
        let (width, height) = self.tile_size(z);

        let tile_x = (x - self.origin.x) / resolution / width as f64;
        let tile_y = match self.y_direction {
            VerticalDirection::TopToBottom => (self.origin.y - y) / resolution / height as f64,
            VerticalDirection::BottomToTop => (y - self.origin.y) / resolution / height as f64,
        };

        let (x, y) = if reverse {
            (
                to_index(round(tile_x).ceil() - 1.0)?,
                to_index(round(tile_y).ceil() - 1.0)?,
            )
        } else {
            (
                to_index(round(tile_x).floor())?,
                to_index(round(tile_y).floor())?,
            )
        };

        Some(TileIndex::new(z, x, y))
    }
}

fn round(value: f64) -> f64 {
    let multiplier = 10f64.powi(DECIMALS);
    (value * multiplier).round() / multiplier
}

fn to_index(value: f64) -> Option<i32> {
    if value.is_finite() && value >= i32::MIN as f64 && value <= i32::MAX as f64 {
        Some(value as i32)
    } else {
        None
    }
}

fn nearly_equal(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0)
}
