use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One participant's avatar position inside a lobby.
///
/// Serialized as the flat `{user, x, y, z}` record the hosted database stores
/// under `coordinates/<lobby>/<key>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub user: String,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Coordinate {
    pub fn new(user: impl Into<String>, x: f32, y: f32, z: f32) -> Self {
        Self {
            user: user.into(),
            x,
            y,
            z,
        }
    }

    pub fn from_vec3(user: impl Into<String>, position: Vec3) -> Self {
        Self::new(user, position.x, position.y, position.z)
    }

    pub fn position(&self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }

    /// Component-wise absolute difference to another position.
    pub fn axis_delta(&self, other: Vec3) -> Vec3 {
        (self.position() - other).abs()
    }

    /// True when at least one axis moved by `threshold` or more.
    ///
    /// Samples where every axis stays below the threshold are noise.
    pub fn differs_from(&self, other: Vec3, threshold: f32) -> bool {
        self.axis_delta(other).max_element() >= threshold
    }
}

/// Composite `(lobby, user)` key for per-participant throttling state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    pub lobby: String,
    pub user: String,
}

impl CacheKey {
    pub fn new(lobby: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            lobby: lobby.into(),
            user: user.into(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.lobby, self.user)
    }
}
