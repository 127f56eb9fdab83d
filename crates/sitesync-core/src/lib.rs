//! sitesync Core - Domain types, ports and configuration
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain types** - `RemotePath`, `PublishMode`, `SessionId`
//! - **Port definitions** - Traits for adapters: `IRemoteStore`, `IIgnoreFilter`
//! - **Configuration** - YAML config file with validation and a builder
//!
//! # Architecture
//!
//! The domain module contains pure value types with no I/O.
//! Ports define trait interfaces that adapter crates implement; the sync
//! engine only ever talks to the remote store through [`ports::IRemoteStore`].

pub mod config;
pub mod domain;
pub mod ports;
