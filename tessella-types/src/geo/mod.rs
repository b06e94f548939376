//! Geographic coordinates (see [`GeoPoint2d`]), coordinate reference systems ([`Crs`]) and
//! conversion between them (see [`Projection`] and [`transform_extent`]).

mod crs;
mod datum;
mod point;
mod projection;
mod reproject;

pub use crs::{Crs, ProjectionType};
pub use datum::Datum;
pub use point::GeoPoint2d;
pub use projection::{GeographicProjection, Projection, WebMercator};
pub use reproject::transform_extent;
