pub mod components;
pub mod plugins;

pub use components::{Position, SyncSession};
pub use plugins::{DebugPlugin, PlayerPlugin, StoreBridgePlugin, SyncPlugin};
