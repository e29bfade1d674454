//! Kubernetes STIG compliance evaluation.
//!
//! The shared machinery behind every rule:
//! - `flags` - Option extraction from container commands and kubelet flags
//! - `ownership` - Deployment -> ReplicaSet -> Pod resolution
//! - `capacity` - Remaining pod capacity per node
//! - `reference_group` - One representative pod per controller
//! - `types` - Check and rule results
//!
//! Rules live in [`rules`] and are evaluated by the [`runner`].
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use stigcheck::analyzer::stig::cluster::{KubeCluster, RunContext};
//! use stigcheck::analyzer::stig::rules::{RuleEnv, all_rules};
//! use stigcheck::analyzer::stig::runner::Runner;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let cluster = Arc::new(KubeCluster::new().await?);
//! let env = RuleEnv::new(cluster.clone(), cluster.clone(), cluster);
//! let results = Runner::new(all_rules(&env)).run(&RunContext::new()).await;
//! println!("{} rules evaluated", results.len());
//! # Ok(())
//! # }
//! ```

pub mod acceptance;
pub mod capacity;
pub mod cluster;
pub mod duration;
pub mod error;
pub mod extract;
pub mod files;
pub mod flags;
pub mod formatter;
pub mod kubelet;
pub mod ownership;
pub mod reference_group;
pub mod rules;
pub mod runner;
pub mod types;
pub mod volume;

pub use acceptance::{AcceptanceList, AcceptedPods};
pub use cluster::{ClusterClient, ClusterError, NodeConfigFetcher, PodExecutor, RunContext};
pub use error::EvalError;
pub use rules::{Rule, RuleEnv, RuleError, all_rules};
pub use runner::{Report, Runner, Summary};
pub use types::{CheckResult, RuleResult, Status, Target};
