use bevy::prelude::*;
use glam::Vec3;
use std::collections::HashMap;

use crate::ecs::components::Position;

#[derive(Component, Debug, Clone, PartialEq)]
pub struct LocalPlayer {
    pub user: String,
}

#[derive(Component, Debug, Clone, PartialEq)]
pub struct RemoteAvatar {
    pub user: String,
}

/// Circles the entity around `center`; stands in for keyboard and physics input.
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct Wander {
    pub center: Vec3,
    pub radius: f32,
    /// Radians per second.
    pub angular_speed: f32,
    pub phase: f32,
}

impl Default for Wander {
    fn default() -> Self {
        Self {
            center: Vec3::ZERO,
            radius: 10.0,
            angular_speed: 0.8,
            phase: 0.0,
        }
    }
}

#[derive(Bundle)]
pub struct LocalPlayerBundle {
    pub player: LocalPlayer,
    pub position: Position,
}

impl LocalPlayerBundle {
    pub fn new(user: impl Into<String>, start: Vec3) -> Self {
        Self {
            player: LocalPlayer { user: user.into() },
            position: Position::from_vec3(start),
        }
    }
}

#[derive(Bundle)]
pub struct RemoteAvatarBundle {
    pub avatar: RemoteAvatar,
    pub position: Position,
}

impl RemoteAvatarBundle {
    pub fn new(user: impl Into<String>, position: Vec3) -> Self {
        Self {
            avatar: RemoteAvatar { user: user.into() },
            position: Position::from_vec3(position),
        }
    }
}

/// Where the local player starts and whether it wanders.
#[derive(Resource, Debug, Clone, Copy, Default, PartialEq)]
pub struct LocalPlayerSettings {
    pub start: Vec3,
    pub wander: Option<Wander>,
}

#[derive(Resource, Default)]
pub struct AvatarRegistry {
    pub avatars: HashMap<String, Entity>,
}

impl AvatarRegistry {
    pub fn register_avatar(&mut self, user: impl Into<String>, entity: Entity) {
        self.avatars.insert(user.into(), entity);
    }

    pub fn unregister_avatar(&mut self, user: &str) -> Option<Entity> {
        self.avatars.remove(user)
    }

    pub fn get_avatar_entity(&self, user: &str) -> Option<Entity> {
        self.avatars.get(user).copied()
    }
}
