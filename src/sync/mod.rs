pub mod config;
pub mod coordinate;
pub mod reconcile;
pub mod throttle;

pub use config::{EarlySamplePolicy, RetentionConfig, SyncConfig};
pub use coordinate::{CacheKey, Coordinate};
pub use reconcile::{AvatarSignal, Reconciler, RetentionPolicy};
pub use throttle::{OfferOutcome, ThrottleStats, UpdateThrottler, WriteRequest};
