mod builder;
mod cache;
mod entry;
mod metrics;
mod store;
pub mod clock;
pub mod config;
pub mod driver;
pub mod entries;
pub mod listener;
pub mod manager;
pub mod object;
pub mod painter;
pub mod scheduler;
pub mod walk;

pub use builder::CacheBuilder;
pub use cache::TypedCache;
pub use clock::{Clock, ManualClock, SystemClock, Timestamp};
pub use config::{CacheConfig, ConfigError};
pub use driver::{FrameDriver, FrameHandle};
pub use manager::{CacheManager, CacheStats, SweepReport};
pub use metrics::stats::Metrics;
