//! 242388: API server insecure-bind-address not set.

use super::{Rule, RuleEnv, RuleError, api_server_target, codes, rule_name};
use crate::analyzer::stig::cluster::RunContext;
use crate::analyzer::stig::ownership::get_command_option_from_deployment;
use crate::analyzer::stig::types::{CheckResult, RuleResult};
use async_trait::async_trait;

const OPTION: &str = "insecure-bind-address";

/// Rule: the API server must not serve on an insecure address.
pub struct InsecureBindAddressRule {
    env: RuleEnv,
}

impl InsecureBindAddressRule {
    pub fn new(env: RuleEnv) -> Self {
        Self { env }
    }
}

#[async_trait]
impl Rule for InsecureBindAddressRule {
    fn id(&self) -> &str {
        codes::INSECURE_BIND_ADDRESS
    }

    fn name(&self) -> &str {
        rule_name(self.id())
    }

    async fn run(&self, ctx: &RunContext) -> Result<RuleResult, RuleError> {
        let target = api_server_target(&self.env);
        let api_server = &self.env.options.api_server;

        let values = match get_command_option_from_deployment(
            ctx,
            self.env.client.as_ref(),
            &api_server.deployment,
            &api_server.container,
            &self.env.namespace,
            OPTION,
        )
        .await
        {
            Ok(values) => values,
            Err(err) => return Ok(RuleResult::single(self, CheckResult::errored(err.to_string(), target))),
        };

        let check_result = if values.is_empty() {
            CheckResult::passed(format!("Option {} not set.", OPTION), target)
        } else {
            CheckResult::failed(format!("Option {} set.", OPTION), target)
        };
        Ok(RuleResult::single(self, check_result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::stig::cluster::FakeCluster;
    use crate::analyzer::stig::rules::test_support::{api_server, env};
    use crate::analyzer::stig::types::{Status, Target};

    async fn run(command: &[&str]) -> CheckResult {
        let cluster = FakeCluster::new().with_deployment(api_server(command));
        let result = InsecureBindAddressRule::new(env(cluster))
            .run(&RunContext::new())
            .await
            .unwrap();
        assert_eq!(result.check_results.len(), 1);
        result.check_results[0].clone()
    }

    #[tokio::test]
    async fn test_not_set_passes() {
        let result = run(&["--secure-port=443"]).await;
        assert_eq!(result.status, Status::Passed);
        assert_eq!(result.message, "Option insecure-bind-address not set.");
        assert_eq!(
            result.target,
            Target::new([("name", "kube-apiserver"), ("namespace", "kube-system"), ("kind", "deployment")])
        );
    }

    #[tokio::test]
    async fn test_set_fails() {
        let result = run(&["--insecure-bind-address=0.0.0.0"]).await;
        assert_eq!(result.status, Status::Failed);
        assert_eq!(result.message, "Option insecure-bind-address set.");
    }

    #[tokio::test]
    async fn test_missing_deployment_is_errored() {
        let result = InsecureBindAddressRule::new(env(FakeCluster::new()))
            .run(&RunContext::new())
            .await
            .unwrap();
        assert_eq!(result.check_results[0].status, Status::Errored);
        assert_eq!(
            result.check_results[0].message,
            "deployments.apps \"kube-apiserver\" not found"
        );
    }
}
