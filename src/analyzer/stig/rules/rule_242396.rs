//! 242396: kubectl version.

use super::{Rule, RuleEnv, RuleError, codes, rule_name};
use crate::analyzer::stig::cluster::RunContext;
use crate::analyzer::stig::types::{CheckResult, RuleResult};
use async_trait::async_trait;

const JUSTIFICATION: &str = "kubectl is not installed into control plane pods or worker nodes. Users are responsible for the kubectl version they run on their own machines.";

/// Rule: kubectl must be at least v1.12.9. Not evaluated.
pub struct KubectlVersionRule {
    env: RuleEnv,
}

impl KubectlVersionRule {
    pub fn new(env: RuleEnv) -> Self {
        Self { env }
    }
}

#[async_trait]
impl Rule for KubectlVersionRule {
    fn id(&self) -> &str {
        codes::KUBECTL_VERSION
    }

    fn name(&self) -> &str {
        rule_name(self.id())
    }

    async fn run(&self, _ctx: &RunContext) -> Result<RuleResult, RuleError> {
        Ok(RuleResult::single(
            self,
            CheckResult::skipped(JUSTIFICATION, self.env.base_target.clone()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::stig::cluster::FakeCluster;
    use crate::analyzer::stig::rules::test_support::env;
    use crate::analyzer::stig::types::{Status, Target};

    #[tokio::test]
    async fn test_skipped_with_base_target() {
        let base = Target::new([("cluster", "shoot")]);
        let rule = KubectlVersionRule::new(env(FakeCluster::new()).with_base_target(base.clone()));
        let result = rule.run(&RunContext::new()).await.unwrap();

        assert_eq!(result.check_results, vec![CheckResult::skipped(JUSTIFICATION, base)]);
        assert_eq!(result.count(Status::Skipped), 1);
    }
}
