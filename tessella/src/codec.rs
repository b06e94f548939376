//! Decoding of raw tile data into features.

use bytes::Bytes;
use tessella_mvt::MvtTile;
use tessella_types::cartesian::Rect;
use tessella_types::geo::Crs;

use crate::error::TileDecodeError;

/// Decoded contents of a tile. The tile cache does not look inside, it only needs to know how
/// many features there are.
pub trait FeatureCollection: Send + Sync + 'static {
    /// Number of features in the collection.
    fn feature_count(&self) -> usize;

    /// Returns true if there are no features.
    fn is_empty(&self) -> bool {
        self.feature_count() == 0
    }
}

impl FeatureCollection for MvtTile {
    fn feature_count(&self) -> usize {
        MvtTile::feature_count(self)
    }
}

impl<T: Send + Sync + 'static> FeatureCollection for Vec<T> {
    fn feature_count(&self) -> usize {
        self.len()
    }
}

/// Decoder of raw tile data.
pub trait TileCodec: Send + Sync {
    /// Decoded tile type.
    type Features: FeatureCollection;

    /// Decodes the tile data. `extent` is the extent of the tile in the source CRS, `crs` is the
    /// CRS of the source tile schema.
    ///
    /// A well-formed payload without features must decode into an empty collection, not an error.
    fn decode(
        &self,
        bytes: Bytes,
        extent: Rect,
        crs: &Crs,
    ) -> Result<Self::Features, TileDecodeError>;
}

/// Decodes Mapbox Vector Tiles.
#[derive(Debug, Clone, Copy, Default)]
pub struct MvtCodec {
    skip_recoverable_errors: bool,
}

impl MvtCodec {
    /// Creates a codec that fails on any invalid feature in a tile.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a codec that drops invalid layers and features of a tile instead of failing.
    pub fn lenient() -> Self {
        Self {
            skip_recoverable_errors: true,
        }
    }
}

impl TileCodec for MvtCodec {
    type Features = MvtTile;

    fn decode(
        &self,
        bytes: Bytes,
        _extent: Rect,
        _crs: &Crs,
    ) -> Result<Self::Features, TileDecodeError> {
        Ok(MvtTile::decode(bytes, self.skip_recoverable_errors)?)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use geozero::mvt::{Message, Tile};

    use super::*;

    fn decode(codec: MvtCodec, bytes: Vec<u8>) -> Result<MvtTile, TileDecodeError> {
        codec.decode(
            Bytes::from(bytes),
            Rect::new(0.0, 0.0, 1.0, 1.0),
            &Crs::EPSG3857,
        )
    }

    #[test]
    fn empty_payload_is_empty_collection() {
        let tile = decode(MvtCodec::new(), vec![]).unwrap();
        assert!(FeatureCollection::is_empty(&tile));

        let tile = decode(MvtCodec::new(), Tile::default().encode_to_vec()).unwrap();
        assert_eq!(FeatureCollection::feature_count(&tile), 0);
    }

    #[test]
    fn malformed_payload_is_error() {
        assert_matches!(
            decode(MvtCodec::lenient(), vec![0xff, 0xff, 0xff, 0xff, 0x0f, 0x12]),
            Err(TileDecodeError::Mvt(_))
        );
    }

    #[test]
    fn vec_is_feature_collection() {
        assert_eq!(vec![1, 2, 3].feature_count(), 3);
        assert!(Vec::<u8>::new().is_empty());
    }
}
