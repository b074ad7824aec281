//! Epoch-versioned in-memory indexes over the content directory.
//!
//! - [`EntryIndex`]: entry id and compressed title to owning day, plus lite
//!   copies of every entry.
//! - [`CategoryIndex`]: category name to entries, derived from the entry
//!   index snapshot of the same epoch.
//!
//! Both publish immutable snapshots through `ArcSwap`; a held snapshot is
//! never modified by a later rebuild.

mod categories;
mod entry_index;

pub use categories::{CategoryDetail, CategoryEntry, CategoryIndex, CategorySnapshot};
pub use entry_index::{EntryIndex, EntryIndexSnapshot};
