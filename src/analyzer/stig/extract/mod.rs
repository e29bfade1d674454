//! Extractors for Kubernetes object data.
//!
//! Helper functions to read the fields rules care about from `k8s-openapi`
//! objects, where nearly everything is optional.

pub mod container;
pub mod metadata;

pub use container::*;
pub use metadata::*;
