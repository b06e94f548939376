use serde::{Deserialize, Serialize};
use tessella_types::cartesian::CartesianPoint2d;

use crate::error::MvtError;
use crate::{CommandIterator, MvtGeomCommand, Point};

/// Sequence of points of a line string or a polygon ring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MvtContour {
    points: Vec<Point>,
    is_closed: bool,
}

impl MvtContour {
    /// Points of the contour. For closed contours the first point is not repeated at the end.
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Whether the contour was closed with a `ClosePath` command.
    pub fn is_closed(&self) -> bool {
        self.is_closed
    }

    /// Signed area by the surveyor's formula in tile coordinates (`y` pointing down).
    ///
    /// Exterior polygon rings have positive area, holes have negative area.
    pub fn signed_area(&self) -> f32 {
        let n = self.points.len();
        if n < 3 {
            return 0.0;
        }

        let mut sum = 0.0;
        for i in 0..n {
            let curr = &self.points[i];
            let next = &self.points[(i + 1) % n];
            sum += curr.x() * next.y() - next.x() * curr.y();
        }

        sum / 2.0
    }

    pub(crate) fn decode_all(commands: &[u32], extent: u32) -> Result<Vec<Self>, MvtError> {
        let mut contours = vec![];
        let mut current: Option<MvtContour> = None;

        for command in CommandIterator::new(commands.iter(), extent) {
            match command? {
                MvtGeomCommand::MoveTo(point) => {
                    if let Some(contour) = current.take() {
                        contours.push(contour);
                    }

                    current = Some(MvtContour {
                        points: vec![point],
                        is_closed: false,
                    });
                }
                MvtGeomCommand::LineTo(point) => match current.as_mut() {
                    Some(contour) => contour.points.push(point),
                    None => {
                        return Err(MvtError::Generic(
                            "LineTo command without preceding MoveTo".into(),
                        ))
                    }
                },
                MvtGeomCommand::ClosePath => {
                    if let Some(mut contour) = current.take() {
                        contour.is_closed = true;
                        contours.push(contour);
                    }
                }
            }
        }

        if let Some(contour) = current.take() {
            contours.push(contour);
        }

        Ok(contours)
    }
}

/// Polygon: an exterior ring followed by zero or more holes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MvtPolygon {
    contours: Vec<MvtContour>,
}

impl MvtPolygon {
    /// Exterior ring.
    pub fn outer_contour(&self) -> &MvtContour {
        &self.contours[0]
    }

    /// Holes of the polygon.
    pub fn inner_contours(&self) -> impl Iterator<Item = &MvtContour> {
        self.contours.iter().skip(1)
    }

    /// Splits rings into polygons: every ring with positive area starts a new polygon, rings with
    /// negative area are holes of the last started one. Zero-area rings are dropped.
    pub(crate) fn decode_all(commands: &[u32], extent: u32) -> Result<Vec<Self>, MvtError> {
        let contours = MvtContour::decode_all(commands, extent)?;
        if contours.iter().any(|c| !c.is_closed()) {
            return Err(MvtError::Generic(
                "polygon cannot contain open contours".into(),
            ));
        }

        let mut polygons: Vec<MvtPolygon> = vec![];
        for contour in contours {
            let area = contour.signed_area();
            if area > 0.0 {
                polygons.push(MvtPolygon {
                    contours: vec![contour],
                });
            } else if area < 0.0 {
                match polygons.last_mut() {
                    Some(polygon) => polygon.contours.push(contour),
                    None => log::warn!("Polygon hole without exterior ring, skipping"),
                }
            }
        }

        Ok(polygons)
    }
}
