//! Feed event notification.
//!
//! Change detectors report detected entries and fetch failures through an
//! [`EventBus`], which fans each event out to the handlers subscribed to its
//! [`EventKind`].

pub mod bus;
pub mod types;

pub use bus::{EventBus, SubscriptionId};
pub use types::{EventKind, FeedEvent};
