//! Rate limiting logic and state management.

mod entry;
mod limiter;
mod registry;
mod sweeper;

pub use entry::TrackingEntry;
pub use limiter::{Decision, RateLimiter};
pub use registry::EvictionRegistry;
pub use sweeper::{Sweeper, SweeperHandle, DEFAULT_SWEEP_INTERVAL};
