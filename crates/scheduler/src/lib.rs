//! Kubernetes scheduler extender serving sustainability-based node priorities

pub mod api;
pub mod config;
pub mod extender;
