//! Tailwatch - multi-tenant aircraft approach tracking
//!
//! Polls a position feed around each tenant's field, follows the tenant's aircraft through
//! concentric alert rings and sends templated notifications to the tenant's channels.

pub mod airspace;
pub mod approach_tracker;
pub mod config;
pub mod events;
pub mod feed_client;
pub mod geometry;
pub mod metrics;
pub mod notifications;
pub mod position;
pub mod scheduler;
pub mod tenant;

pub use approach_tracker::{LiveAircraft, TenantTracker};
pub use config::ServiceConfig;
pub use events::{EventKind, NotificationEvent, TenantEvents};
pub use feed_client::{AdsbLolClient, PositionFeed};
pub use notifications::{NotificationDispatcher, TenantNotifier};
pub use position::PositionSample;
pub use scheduler::TrackingScheduler;
pub use tenant::{TenantConfig, TenantId};
