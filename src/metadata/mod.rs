//! Metadata snapshots and synchronization with the content store.

pub mod snapshot;
pub mod sync;

pub use snapshot::{Attribute, AttrValue, MetadataSnapshot, TokenDocument, SCHEMA_VERSION};
pub use sync::{MetadataSynchronizer, SyncOutcome, SyncStatus};
