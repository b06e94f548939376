//! Error type used by the crate.

use thiserror::Error;

/// Error enum.
#[derive(Debug, Error)]
pub enum TessellaTypesError {
    /// The point cannot be represented in the target coordinate system.
    #[error("point ({x}, {y}) cannot be projected")]
    Projection {
        /// X (or longitude) of the point.
        x: f64,
        /// Y (or latitude) of the point.
        y: f64,
    },
    /// There is no known transformation between two coordinate systems.
    #[error("no transformation from {from} to {to}")]
    UnsupportedTransform {
        /// Source CRS code.
        from: String,
        /// Target CRS code.
        to: String,
    },
}
