use serde::{Deserialize, Serialize};
use std::fmt;

/// Block position of a warp. `y` is stored as a SMALLINT by every backend.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: i16,
    pub z: f64,
}

impl Position {
    #[must_use]
    pub fn new(x: f64, y: i16, z: f64) -> Self {
        Self { x, y, z }
    }

    #[must_use]
    pub fn floor_x(&self) -> i64 {
        self.x.floor() as i64
    }

    #[must_use]
    pub fn floor_z(&self) -> i64 {
        self.z.floor() as i64
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.floor_x(), self.y, self.floor_z())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rotation {
    pub yaw: i16,
    pub pitch: i16,
}

impl Rotation {
    #[must_use]
    pub fn new(yaw: i16, pitch: i16) -> Self {
        Self { yaw, pitch }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floors_negative_coordinates_towards_negative_infinity() {
        let position = Position::new(-0.5, 64, 10.9);
        assert_eq!(position.floor_x(), -1);
        assert_eq!(position.floor_z(), 10);
        assert_eq!(position.to_string(), "(-1, 64, 10)");
    }
}
