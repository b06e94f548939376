use std::f64::consts::PI;
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use super::{Datum, GeoPoint2d, GeographicProjection, Projection, WebMercator};
use crate::cartesian::{Point2, Rect};

/// Coordinate reference system.
///
/// Two CRS are equal when they have the same projection type and datum. `Crs` is hashable, so it
/// can be used as a key of per-projection collections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Crs {
    datum: Datum,
    projection_type: ProjectionType,
}

/// Type of the projection of a [`Crs`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ProjectionType {
    /// Geographic coordinates, no projection (longitude as `x`, latitude as `y`, in degrees).
    None,
    /// Spherical Web Mercator.
    WebMercator,
    /// Any other projection, identified by its code. Extents cannot be transformed to or from it.
    Other(String),
}

impl Crs {
    /// Geographic coordinates on the WGS84 ellipsoid (EPSG:4326).
    pub const WGS84: Crs = Crs {
        datum: Datum::WGS84,
        projection_type: ProjectionType::None,
    };

    /// Web Mercator projection (EPSG:3857).
    pub const EPSG3857: Crs = Crs {
        datum: Datum::WGS84,
        projection_type: ProjectionType::WebMercator,
    };

    /// Creates a new CRS.
    pub fn new(datum: Datum, projection_type: ProjectionType) -> Self {
        Self {
            datum,
            projection_type,
        }
    }

    /// Datum of the CRS.
    pub fn datum(&self) -> Datum {
        self.datum
    }

    /// Projection type of the CRS.
    pub fn projection_type(&self) -> &ProjectionType {
        &self.projection_type
    }

    /// Code of the CRS, e.g. `EPSG:3857`.
    pub fn code(&self) -> String {
        match &self.projection_type {
            ProjectionType::None => "EPSG:4326".to_string(),
            ProjectionType::WebMercator => "EPSG:3857".to_string(),
            ProjectionType::Other(code) => code.clone(),
        }
    }

    /// The whole valid area of the CRS in its own coordinates, if known.
    pub fn extent(&self) -> Option<Rect> {
        match self.projection_type {
            ProjectionType::None => Some(Rect::new(-180.0, -90.0, 180.0, 90.0)),
            ProjectionType::WebMercator => {
                let half_size = PI * self.datum.semimajor();
                Some(Rect::new(-half_size, -half_size, half_size, half_size))
            }
            ProjectionType::Other(_) => None,
        }
    }

    /// Projection from geographic coordinates into this CRS.
    pub fn get_projection(
        &self,
    ) -> Option<Box<dyn Projection<InPoint = GeoPoint2d, OutPoint = Point2<f64>>>> {
        match self.projection_type {
            ProjectionType::None => Some(Box::new(GeographicProjection)),
            ProjectionType::WebMercator => Some(Box::new(WebMercator::new(self.datum))),
            ProjectionType::Other(_) => None,
        }
    }
}

impl Default for Crs {
    fn default() -> Self {
        Self::EPSG3857
    }
}

impl PartialEq for Crs {
    fn eq(&self, other: &Self) -> bool {
        self.projection_type == other.projection_type && self.datum == other.datum
    }
}

impl Eq for Crs {}

impl Hash for Crs {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.projection_type.hash(state);
        self.datum.semimajor().to_bits().hash(state);
        self.datum.inv_flattening().to_bits().hash(state);
    }
}

impl Display for Crs {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn crs_codes() {
        assert_eq!(Crs::EPSG3857.code(), "EPSG:3857");
        assert_eq!(Crs::WGS84.code(), "EPSG:4326");
        let other = Crs::new(Datum::WGS84, ProjectionType::Other("EPSG:3035".into()));
        assert_eq!(other.to_string(), "EPSG:3035");
        assert!(other.extent().is_none());
        assert!(other.get_projection().is_none());
    }

    #[test]
    fn crs_as_hash_key() {
        let set: HashSet<Crs> = [Crs::EPSG3857, Crs::WGS84, Crs::EPSG3857]
            .into_iter()
            .collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn serializes_to_json() {
        let json = serde_json::to_string(&Crs::EPSG3857).unwrap();
        let crs: Crs = serde_json::from_str(&json).unwrap();
        assert_eq!(crs, Crs::EPSG3857);
    }
}
