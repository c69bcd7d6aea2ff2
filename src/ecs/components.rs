use bevy::prelude::*;
use glam::Vec3;

// ============================================================================
// TRANSFORM COMPONENTS
// ============================================================================

/// World-space position of a local player or remote avatar.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Position {
    pub fn from_vec3(v: Vec3) -> Self {
        Self {
            x: v.x,
            y: v.y,
            z: v.z,
        }
    }

    pub fn to_vec3(self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }
}

// ============================================================================
// SESSION RESOURCES
// ============================================================================

/// Lobby the local player is in and the user id it writes under.
#[derive(Resource, Debug, Clone, PartialEq)]
pub struct SyncSession {
    pub lobby: String,
    pub user: String,
}

impl SyncSession {
    pub fn new(lobby: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            lobby: lobby.into(),
            user: user.into(),
        }
    }
}
