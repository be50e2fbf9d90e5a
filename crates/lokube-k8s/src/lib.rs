//! Kubernetes integration for lokube
//!
//! This crate provides client configuration discovery, the watcher-backed
//! pod cache, and resolution of queries into container log sources.

mod cache;
mod config;
mod resolver;

pub use cache::{PodCache, PodCacheSet};
pub use config::client_from;
pub use resolver::resolve_sources;
