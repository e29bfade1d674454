//! Rule runner.
//!
//! Evaluates a set of rules concurrently and collects their results into a
//! [`Report`] in registration order.

use crate::analyzer::stig::cluster::RunContext;
use crate::analyzer::stig::rules::Rule;
use crate::analyzer::stig::types::{CheckResult, RuleResult, Status, Target};
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};

/// Number of check results per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub passed: usize,
    pub failed: usize,
    pub warning: usize,
    pub errored: usize,
    pub skipped: usize,
    pub accepted: usize,
}

impl Summary {
    pub fn add(&mut self, status: Status) {
        *self.slot(status) += 1;
    }

    pub fn get(&self, status: Status) -> usize {
        match status {
            Status::Passed => self.passed,
            Status::Failed => self.failed,
            Status::Warning => self.warning,
            Status::Errored => self.errored,
            Status::Skipped => self.skipped,
            Status::Accepted => self.accepted,
        }
    }

    pub fn total(&self) -> usize {
        Status::ALL.iter().map(|s| self.get(*s)).sum()
    }

    fn slot(&mut self, status: Status) -> &mut usize {
        match status {
            Status::Passed => &mut self.passed,
            Status::Failed => &mut self.failed,
            Status::Warning => &mut self.warning,
            Status::Errored => &mut self.errored,
            Status::Skipped => &mut self.skipped,
            Status::Accepted => &mut self.accepted,
        }
    }
}

/// Results of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub generated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<String>,
    pub rules: Vec<RuleResult>,
}

impl Report {
    pub fn new(rules: Vec<RuleResult>) -> Self {
        Self {
            generated_at: Utc::now(),
            cluster: None,
            rules,
        }
    }

    pub fn with_cluster(mut self, cluster: Option<String>) -> Self {
        self.cluster = cluster;
        self
    }

    pub fn summary(&self) -> Summary {
        let mut summary = Summary::default();
        for result in self.rules.iter().flat_map(|r| &r.check_results) {
            summary.add(result.status);
        }
        summary
    }

    /// Whether any check failed or could not be evaluated.
    pub fn has_findings(&self) -> bool {
        let summary = self.summary();
        summary.failed > 0 || summary.errored > 0
    }
}

/// Runs a fixed set of rules.
pub struct Runner {
    rules: Vec<Box<dyn Rule>>,
}

impl Runner {
    pub fn new(rules: Vec<Box<dyn Rule>>) -> Self {
        Self { rules }
    }

    /// Keep only the rules in `only` (when non-empty) that are not in `ignore`.
    pub fn filtered(rules: Vec<Box<dyn Rule>>, only: &[String], ignore: &[String]) -> Self {
        let rules = rules
            .into_iter()
            .filter(|rule| only.is_empty() || only.iter().any(|id| id == rule.id()))
            .filter(|rule| !ignore.iter().any(|id| id == rule.id()))
            .collect();
        Self { rules }
    }

    pub fn rule_ids(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.id()).collect()
    }

    /// Evaluate every rule. A rule that fails as a whole is reported as a
    /// single `Errored` check result.
    pub async fn run(&self, ctx: &RunContext) -> Vec<RuleResult> {
        let outcomes = join_all(self.rules.iter().map(|rule| async move {
            log::info!("running rule {}", rule.id());
            let outcome = rule.run(ctx).await;
            (rule, outcome)
        }))
        .await;

        outcomes
            .into_iter()
            .map(|(rule, outcome)| match outcome {
                Ok(result) => {
                    log::debug!(
                        "rule {} finished with {} check results",
                        result.rule_id,
                        result.check_results.len()
                    );
                    result
                }
                Err(err) => {
                    log::error!("{}", err);
                    RuleResult::single(
                        &**rule,
                        CheckResult::errored(err.to_string(), Target::new([("kind", "rule")])),
                    )
                }
            })
            .collect()
    }
}
