//! Client-side query cache.
//!
//! Reads are described by a [`QueryDescriptor`] and grouped by [`Tag`].
//! The [`QueryCache`] deduplicates concurrent reads, keeps results around
//! while they are subscribed (plus a grace period), and refetches tagged
//! entries after a successful write.

mod cache;
mod descriptor;
mod snapshot;
mod typed;

pub use cache::{QueryCache, Subscription, DEFAULT_IDLE_GRACE};
pub use descriptor::{DescriptorKey, QueryDescriptor, Tag};
pub use snapshot::{QuerySnapshot, QueryStatus};
pub use typed::{Query, QueryState};
