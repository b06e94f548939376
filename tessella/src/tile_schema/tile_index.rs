use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Address of a tile in a [`TileSchema`](super::TileSchema): z level, column and row.
#[derive(Debug, PartialEq, Eq, Copy, Clone, Hash, Serialize, Deserialize)]
pub struct TileIndex {
    /// Z index.
    pub z: u32,
    /// X index.
    pub x: i32,
    /// Y index.
    pub y: i32,
}

impl TileIndex {
    /// Create a new index instance.
    pub fn new(z: u32, x: i32, y: i32) -> Self {
        Self { z, x, y }
    }
}

impl Display for TileIndex {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_format() {
        assert_eq!(TileIndex::new(5, 13, -29).to_string(), "5/13/-29");
    }
}
