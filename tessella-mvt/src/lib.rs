//! Reader of the [Mapbox Vector Tile](https://github.com/mapbox/vector-tile-spec) format.
//!
//! Geometries are decoded into tile-local coordinates normalized by the layer extent, so a point
//! with coordinates `(0.5, 0.5)` lies in the center of the tile regardless of the extent the tile
//! was encoded with.

use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::iter::Enumerate;

use bytes::Buf;
pub use contour::{MvtContour, MvtPolygon};
use geozero::mvt::tile::GeomType;
use geozero::mvt::{Message as GeozeroMessage, Tile};
use serde::{Deserialize, Serialize};
use tessella_types::cartesian::{CartesianPoint2d, Point2};

use crate::error::MvtError;

mod contour;
pub mod error;

const DEFAULT_EXTENT: u32 = 4096;

/// Decoded vector tile.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MvtTile {
    /// Layers of the tile.
    pub layers: Vec<MvtLayer>,
}

/// Named layer of a vector tile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MvtLayer {
    /// Name of the layer.
    pub name: String,
    /// Features of the layer.
    pub features: Vec<MvtFeature>,
    /// Property keys used by the features.
    pub properties: Vec<String>,
    /// Extent the geometries were encoded with.
    pub size: u32,
}

/// Single feature of a layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MvtFeature {
    /// Feature id, if set.
    pub id: Option<u64>,
    /// Feature attributes.
    pub properties: HashMap<String, MvtValue>,
    /// Feature geometry.
    pub geometry: MvtGeometry,
}

/// Attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MvtValue {
    /// String value.
    String(String),
    /// Single precision float.
    Float(f32),
    /// Double precision float.
    Double(f64),
    /// Signed integer, for both `int` and `sint` protobuf values.
    Int64(i64),
    /// Unsigned integer.
    Uint64(u64),
    /// Boolean.
    Bool(bool),
    /// Value that could not be decoded.
    Unknown,
}

impl Display for MvtValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            MvtValue::String(v) => write!(f, "{v}"),
            MvtValue::Float(v) => write!(f, "{v}"),
            MvtValue::Double(v) => write!(f, "{v}"),
            MvtValue::Int64(v) => write!(f, "{v}"),
            MvtValue::Uint64(v) => write!(f, "{v}"),
            MvtValue::Bool(v) => write!(f, "{v}"),
            MvtValue::Unknown => write!(f, "<NONE>"),
        }
    }
}

impl MvtValue {
    /// Compares the value with its string representation.
    pub fn eq_str(&self, str_value: &str) -> bool {
        match &self {
            MvtValue::String(s) => s == str_value,
            MvtValue::Float(v) => str_value.parse::<f32>() == Ok(*v),
            MvtValue::Double(v) => str_value.parse::<f64>() == Ok(*v),
            MvtValue::Int64(v) => str_value.parse::<i64>() == Ok(*v),
            MvtValue::Uint64(v) => str_value.parse::<u64>() == Ok(*v),
            MvtValue::Bool(v) => str_value.parse::<bool>() == Ok(*v),
            MvtValue::Unknown => false,
        }
    }
}

/// Point in normalized tile coordinates.
pub type Point = Point2<f32>;

/// Geometry of a feature.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum MvtGeometry {
    /// One or more points.
    Point(Vec<Point>),
    /// One or more line strings.
    LineString(Vec<MvtContour>),
    /// One or more polygons.
    Polygon(Vec<MvtPolygon>),
}

impl MvtTile {
    /// Decodes a tile from a protobuf buffer.
    ///
    /// An empty buffer, or a tile without layers, is a valid tile with no features. If
    /// `skip_recoverable_errors` is set, invalid layers, features and values are logged and
    /// skipped instead of failing the whole tile.
    pub fn decode<B>(buffer: B, skip_recoverable_errors: bool) -> Result<MvtTile, MvtError>
    where
        B: Buf,
    {
        let pb = Tile::decode(buffer).map_err(|e| MvtError::Proto(e.to_string()))?;

        let mut layers = vec![];
        for layer in pb.layers.into_iter() {
            match MvtLayer::decode(layer, skip_recoverable_errors) {
                Ok(v) => layers.push(v),
                Err(e) => {
                    if skip_recoverable_errors {
                        log::warn!("{e:?}");
                    } else {
                        return Err(e);
                    }
                }
            }
        }

        Ok(MvtTile { layers })
    }

    /// Total number of features in all layers.
    pub fn feature_count(&self) -> usize {
        self.layers.iter().map(|layer| layer.features.len()).sum()
    }

    /// Layer with the given name.
    pub fn layer(&self, name: &str) -> Option<&MvtLayer> {
        self.layers.iter().find(|layer| layer.name == name)
    }
}

impl MvtLayer {
    fn decode(
        pb_layer: geozero::mvt::tile::Layer,
        skip_recoverable_errors: bool,
    ) -> Result<Self, MvtError> {
        let geozero::mvt::tile::Layer {
            name,
            keys,
            values,
            features,
            version,
            extent,
        } = pb_layer;
        if version != 2 {
            return Err(MvtError::Generic(format!("Invalid version: {version}")));
        }

        let extent = extent.unwrap_or(DEFAULT_EXTENT);
        if extent == 0 {
            return Err(MvtError::Generic("Layer extent cannot be 0".into()));
        }

        let mut mvt_values = Vec::with_capacity(values.len());
        for value in values {
            match MvtValue::decode(value) {
                Ok(v) => mvt_values.push(v),
                Err(e) => {
                    if skip_recoverable_errors {
                        log::warn!("{e:?}");
                        mvt_values.push(MvtValue::Unknown);
                    } else {
                        return Err(e);
                    }
                }
            }
        }

        let mut mvt_features = Vec::with_capacity(features.len());
        for feature in features {
            match MvtFeature::decode(feature, extent, &keys, &mvt_values) {
                Ok(v) => mvt_features.push(v),
                Err(e) => {
                    if skip_recoverable_errors {
                        log::warn!("{e:?}");
                    } else {
                        return Err(e);
                    }
                }
            }
        }

        Ok(MvtLayer {
            name,
            properties: keys,
            features: mvt_features,
            size: extent,
        })
    }
}

impl MvtValue {
    fn decode(pb_value: geozero::mvt::tile::Value) -> Result<MvtValue, MvtError> {
        let mut present_types = 0;
        let mut value = MvtValue::Unknown;

        if let Some(v) = pb_value.string_value {
            value = MvtValue::String(v);
            present_types += 1;
        }

        if let Some(v) = pb_value.float_value {
            value = MvtValue::Float(v);
            present_types += 1;
        }

        if let Some(v) = pb_value.double_value {
            value = MvtValue::Double(v);
            present_types += 1;
        }

        if let Some(v) = pb_value.int_value {
            value = MvtValue::Int64(v);
            present_types += 1;
        }

        if let Some(v) = pb_value.uint_value {
            value = MvtValue::Uint64(v);
            present_types += 1;
        }

        if let Some(v) = pb_value.sint_value {
            value = MvtValue::Int64(v);
            present_types += 1;
        }

        if let Some(v) = pb_value.bool_value {
            value = MvtValue::Bool(v);
            present_types += 1;
        }

        match present_types {
            0 => Err(MvtError::Generic("No valid value present".into())),
            1 => Ok(value),
            _ => Err(MvtError::Generic("More than one value present".into())),
        }
    }
}

fn opt_number_to_geomtype(number: Option<i32>) -> GeomType {
    match number {
        Some(1) => GeomType::Point,
        Some(2) => GeomType::Linestring,
        Some(3) => GeomType::Polygon,
        _ => GeomType::Unknown,
    }
}

impl MvtFeature {
    fn decode(
        pb_feature: geozero::mvt::tile::Feature,
        extent: u32,
        keys: &[String],
        values: &[MvtValue],
    ) -> Result<MvtFeature, MvtError> {
        let geozero::mvt::tile::Feature {
            id,
            tags,
            r#type,
            geometry,
        } = pb_feature;
        let pb_type = opt_number_to_geomtype(r#type);
        let properties = Self::decode_properties(tags, keys, values)?;
        let geometry = Self::decode_geometry(pb_type, geometry, extent)?;

        Ok(MvtFeature {
            id,
            properties,
            geometry,
        })
    }

    fn decode_properties(
        tags: Vec<u32>,
        keys: &[String],
        values: &[MvtValue],
    ) -> Result<HashMap<String, MvtValue>, MvtError> {
        let mut properties = HashMap::new();
        if tags.len() % 2 != 0 {
            return Err(MvtError::Generic("Invalid number of tags in feature".into()));
        }

        for tag_pair in tags.chunks(2) {
            let key = keys
                .get(tag_pair[0] as usize)
                .ok_or(MvtError::Generic("Invalid tag key".into()))?;
            let value = values
                .get(tag_pair[1] as usize)
                .ok_or(MvtError::Generic("Invalid tag value".into()))?;

            properties.insert(key.clone(), value.clone());
        }

        Ok(properties)
    }

    fn decode_geometry(
        geom_type: GeomType,
        commands: Vec<u32>,
        extent: u32,
    ) -> Result<MvtGeometry, MvtError> {
        Ok(match geom_type {
            GeomType::Unknown => return Err(MvtError::Generic("Unknown geometry type".into())),
            GeomType::Point => MvtGeometry::Point(Self::decode_point(&commands, extent)?),
            GeomType::Linestring => {
                MvtGeometry::LineString(MvtContour::decode_all(&commands, extent)?)
            }
            GeomType::Polygon => MvtGeometry::Polygon(MvtPolygon::decode_all(&commands, extent)?),
        })
    }

    fn decode_point(commands: &[u32], extent: u32) -> Result<Vec<Point>, MvtError> {
        let mut points = Vec::with_capacity(commands.len() / 2);
        for command in CommandIterator::new(commands.iter(), extent) {
            match command? {
                MvtGeomCommand::MoveTo(p) => points.push(p),
                other => {
                    return Err(MvtError::Generic(format!(
                        "Point geometry cannot have {other:?} command"
                    )))
                }
            }
        }

        Ok(points)
    }
}

pub(crate) struct CommandIterator<'a, T: Iterator<Item = &'a u32>> {
    inner: Enumerate<T>,
    extent: u32,
    current_command: Option<(u32, u32)>,
    can_continue: bool,
    cursor: Point,
}

impl<'a, T: Iterator<Item = &'a u32>> CommandIterator<'a, T> {
    pub(crate) fn new(inner: T, extent: u32) -> Self {
        Self {
            inner: inner.enumerate(),
            extent,
            current_command: None,
            can_continue: true,
            cursor: Point::new(0.0, 0.0),
        }
    }

    fn read_point(&mut self) -> Result<Point, MvtError> {
        let vals = self.read_vals::<2>()?;
        Ok(Point::new(
            self.decode_sint_coord(vals[0]) + self.cursor.x(),
            self.decode_sint_coord(vals[1]) + self.cursor.y(),
        ))
    }

    fn decode_sint_coord(&self, val: u32) -> f32 {
        sint_to_int(val) as f32 / self.extent as f32
    }

    fn read_vals<const COUNT: usize>(&mut self) -> Result<[u32; COUNT], MvtError> {
        let mut result = [0; COUNT];
        for val in result.iter_mut() {
            *val = match self.inner.next() {
                Some((_, v)) => *v,
                None => {
                    return Err(MvtError::Generic(
                        "Expected value to be present, but found end of data".into(),
                    ));
                }
            };
        }

        Ok(result)
    }

    fn fail(&mut self, message: String) -> Option<Result<MvtGeomCommand, MvtError>> {
        self.can_continue = false;
        Some(Err(MvtError::Generic(message)))
    }
}

fn sint_to_int(sint: u32) -> i32 {
    if sint == u32::MAX {
        // Edge case. Operation below will overflow with this value.
        return i32::MIN;
    }

    match sint & 1 {
        0 => (sint >> 1) as i32,
        _ => -(((sint >> 1) + 1) as i32),
    }
}

impl<'a, T: Iterator<Item = &'a u32>> Iterator for CommandIterator<'a, T> {
    type Item = Result<MvtGeomCommand, MvtError>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.can_continue {
            return None;
        }

        let (command_id, command_count) = match self.current_command {
            Some(command) => command,
            None => {
                let (_, command_integer) = self.inner.next()?;
                (command_integer & 0x7, command_integer >> 3)
            }
        };

        self.current_command = match command_count {
            0 => return self.fail("Command count cannot be 0".into()),
            1 => None,
            v => Some((command_id, v - 1)),
        };

        let result = match command_id {
            1 => self.read_point().map(|p| {
                self.cursor = p;
                MvtGeomCommand::MoveTo(p)
            }),
            2 => self.read_point().map(|p| {
                self.cursor = p;
                MvtGeomCommand::LineTo(p)
            }),
            7 if command_count == 1 => Ok(MvtGeomCommand::ClosePath),
            7 => {
                return self.fail(format!(
                    "ClosePath command must have count 1, but has {command_count}"
                ))
            }
            _ => return self.fail(format!("Unknown command id {command_id}")),
        };

        if result.is_err() {
            self.can_continue = false;
        }

        Some(result)
    }
}

#[derive(Debug)]
pub(crate) enum MvtGeomCommand {
    MoveTo(Point),
    LineTo(Point),
    ClosePath,
}
