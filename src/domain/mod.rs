//! Domain layer types and invariants.

pub mod entities;
pub mod filters;
pub mod notifications;
pub mod slug;
pub mod types;
