use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

use super::{Datum, GeoPoint2d};
use crate::cartesian::Point2;

/// Latitude limit of the Web Mercator projection, degrees.
const MERCATOR_MAX_LAT: f64 = 85.051_128_779_806_59;

/// Conversion between geographic and projected coordinates.
pub trait Projection {
    /// Point type before projecting.
    type InPoint;
    /// Point type after projecting.
    type OutPoint;

    /// Projects the point. Returns `None` if the point cannot be represented in the output space.
    fn project(&self, input: &Self::InPoint) -> Option<Self::OutPoint>;
    /// Inverse of [`Projection::project`].
    fn unproject(&self, input: &Self::OutPoint) -> Option<Self::InPoint>;
}

/// Spherical Web Mercator projection (EPSG:3857).
///
/// Latitudes beyond the projection limit (about ±85.05°) are clamped to it, so that extents
/// covering the poles stay finite.
#[derive(Debug, Copy, Clone, Default)]
pub struct WebMercator {
    datum: Datum,
}

impl WebMercator {
    /// Creates a projection with the given datum.
    pub fn new(datum: Datum) -> Self {
        Self { datum }
    }
}

impl Projection for WebMercator {
    type InPoint = GeoPoint2d;
    type OutPoint = Point2<f64>;

    fn project(&self, input: &GeoPoint2d) -> Option<Point2<f64>> {
        let lat = input
            .lat()
            .clamp(-MERCATOR_MAX_LAT, MERCATOR_MAX_LAT)
            .to_radians();
        let x = self.datum.semimajor() * input.lon_rad();
        let y = self.datum.semimajor() * (FRAC_PI_4 + lat / 2.0).tan().ln();

        if x.is_finite() && y.is_finite() {
            Some(Point2::new(x, y))
        } else {
            None
        }
    }

    fn unproject(&self, input: &Point2<f64>) -> Option<GeoPoint2d> {
        let lat = 2.0 * (input.y / self.datum.semimajor()).exp().atan() - FRAC_PI_2;
        let lon = input.x / self.datum.semimajor();

        if lat.is_finite() && lon.is_finite() {
            Some(GeoPoint2d::latlon(lat.to_degrees(), lon.to_degrees()))
        } else {
            None
        }
    }
}

/// Identity projection of geographic coordinates: `x` is longitude and `y` is latitude, both in
/// degrees (EPSG:4326 axis order as used by most web maps).
#[derive(Debug, Copy, Clone, Default)]
pub struct GeographicProjection;

impl Projection for GeographicProjection {
    type InPoint = GeoPoint2d;
    type OutPoint = Point2<f64>;

    fn project(&self, input: &GeoPoint2d) -> Option<Point2<f64>> {
        Some(Point2::new(input.lon(), input.lat()))
    }

    fn unproject(&self, input: &Point2<f64>) -> Option<GeoPoint2d> {
        Some(GeoPoint2d::latlon(input.y, input.x))
    }
}
