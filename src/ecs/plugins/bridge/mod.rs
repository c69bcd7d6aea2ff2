pub mod components;
pub mod systems;

use bevy::prelude::*;
use std::time::Duration;

use crate::ecs::components::SyncSession;
use crate::store::LobbyStore;
pub use components::{BridgeCommand, StoreBridge, WriteReport};
use systems::start_store_bridge;

/// Runs store I/O on a dedicated tokio runtime and connects it to the ECS.
pub struct StoreBridgePlugin {
    pub store: LobbyStore,
    pub resubscribe_delay: Duration,
}

impl StoreBridgePlugin {
    pub fn new(store: LobbyStore, resubscribe_delay: Duration) -> Self {
        Self {
            store,
            resubscribe_delay,
        }
    }
}

impl Plugin for StoreBridgePlugin {
    fn build(&self, app: &mut App) {
        let store = self.store.clone();
        let resubscribe_delay = self.resubscribe_delay;
        app.insert_resource(StoreBridge::default())
            .add_systems(Startup, move |bridge: Res<StoreBridge>, session: Res<SyncSession>| {
                start_store_bridge(&bridge, store.clone(), session.lobby.clone(), resubscribe_delay);
            });
    }
}
