pub mod bridge;
pub mod debug;
pub mod player;
pub mod sync;

pub use bridge::StoreBridgePlugin;
pub use debug::DebugPlugin;
pub use player::PlayerPlugin;
pub use sync::SyncPlugin;
