use super::Crs;
use crate::cartesian::{Point2, Rect};
use crate::error::TessellaTypesError;

/// Transforms an extent from one CRS to another.
///
/// The four corners of the extent are transformed and their bounding box is returned. For curved
/// transformations the result only approximates the true footprint of the extent, which is good
/// enough to decide what data covers it but not to draw anything.
pub fn transform_extent(extent: Rect, from: &Crs, to: &Crs) -> Result<Rect, TessellaTypesError> {
    if from == to {
        return Ok(extent);
    }

    let unsupported = || TessellaTypesError::UnsupportedTransform {
        from: from.code(),
        to: to.code(),
    };
    let source = from.get_projection().ok_or_else(unsupported)?;
    let target = to.get_projection().ok_or_else(unsupported)?;

    let mut corners = Vec::with_capacity(4);
    for corner in extent.into_quadrangle() {
        let projection_error = || TessellaTypesError::Projection {
            x: corner.x,
            y: corner.y,
        };
        let geo = source.unproject(&corner).ok_or_else(projection_error)?;
        let projected: Point2<f64> = target.project(&geo).ok_or_else(projection_error)?;
        corners.push(projected);
    }

    Rect::from_points(corners.iter()).ok_or_else(unsupported)
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::geo::{Datum, ProjectionType};

    #[test]
    fn same_crs_is_identity() {
        let extent = Rect::new(1.0, 2.0, 3.0, 4.0);
        assert_eq!(
            transform_extent(extent, &Crs::EPSG3857, &Crs::EPSG3857).unwrap(),
            extent
        );
    }

    #[test]
    fn geographic_to_mercator() {
        let extent = Rect::new(-180.0, -85.0511287798066, 180.0, 85.0511287798066);
        let projected = transform_extent(extent, &Crs::WGS84, &Crs::EPSG3857).unwrap();
        assert_abs_diff_eq!(projected.x_min(), -20037508.342789244, epsilon = 1e-3);
        assert_abs_diff_eq!(projected.x_max(), 20037508.342789244, epsilon = 1e-3);
        assert_abs_diff_eq!(projected.y_max(), 20037508.342789244, epsilon = 1.0);
    }

    #[test]
    fn mercator_to_geographic_and_back() {
        let extent = Rect::new(665307.0, 7005300.0, 704443.0, 7044436.0);
        let geo = transform_extent(extent, &Crs::EPSG3857, &Crs::WGS84).unwrap();
        assert!(geo.x_min() > 5.9 && geo.x_max() < 6.4);
        assert!(geo.y_min() > 53.0 && geo.y_max() < 53.5);

        let back = transform_extent(geo, &Crs::WGS84, &Crs::EPSG3857).unwrap();
        assert_abs_diff_eq!(back.x_min(), extent.x_min(), epsilon = 1e-6);
        assert_abs_diff_eq!(back.y_max(), extent.y_max(), epsilon = 1e-6);
    }

    #[test]
    fn unknown_crs_is_unsupported() {
        let other = Crs::new(Datum::WGS84, ProjectionType::Other("EPSG:2056".into()));
        let result = transform_extent(Rect::new(0.0, 0.0, 1.0, 1.0), &Crs::EPSG3857, &other);
        assert!(matches!(
            result,
            Err(TessellaTypesError::UnsupportedTransform { .. })
        ));
    }
}
