//! Flat-file content store for a self-hosted blog.
//!
//! Entries live in one file per calendar day, comments and trackings in a
//! companion file per day, and every comment is mirrored into a single
//! aggregate file. In-memory indexes are derived from those files and are
//! versioned by epoch counters so that any write invalidates them.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
pub mod util;
