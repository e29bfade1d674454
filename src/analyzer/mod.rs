//! # Analyzer Module
//!
//! Cluster evaluation engines. `stig` checks a live cluster against the
//! DISA Kubernetes STIG.

pub mod stig;
