//! Geometry primitives shared by the `tessella` crates: cartesian points and rectangles, coordinate
//! reference systems and conversion of extents between them.

pub mod cartesian;
pub mod error;
pub mod geo;
