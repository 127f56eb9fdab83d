//! Port definitions (hexagonal architecture interfaces)
//!
//! Ports are the interfaces the sync engine depends on, whose
//! implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IRemoteStore`] - Upload, delete and move against the remote content store
//! - [`IIgnoreFilter`] - Boolean ignore predicate over local paths

pub mod ignore_filter;
pub mod remote_store;

pub use ignore_filter::{IIgnoreFilter, NoIgnore};
pub use remote_store::{IRemoteStore, RemoteError};
