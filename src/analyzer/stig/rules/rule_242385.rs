//! 242385: Controller Manager bind address.

use super::{Rule, RuleEnv, RuleError, codes, rule_name};
use crate::analyzer::stig::cluster::RunContext;
use crate::analyzer::stig::types::{CheckResult, RuleResult};
use async_trait::async_trait;

const JUSTIFICATION: &str = "The Kubernetes Controller Manager runs in a container which already has limited access to network interfaces. In addition ingress traffic to the Kubernetes Controller Manager is restricted via network policies, making an unintended exposure less likely.";

/// Rule: the controller manager must bind to localhost only. Not evaluated.
pub struct ControllerManagerBindAddressRule {
    env: RuleEnv,
}

impl ControllerManagerBindAddressRule {
    pub fn new(env: RuleEnv) -> Self {
        Self { env }
    }
}

#[async_trait]
impl Rule for ControllerManagerBindAddressRule {
    fn id(&self) -> &str {
        codes::CONTROLLER_MANAGER_BIND_ADDRESS
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
