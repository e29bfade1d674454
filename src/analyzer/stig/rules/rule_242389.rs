//! 242389: API server secure-port set.

use super::{Rule, RuleEnv, RuleError, api_server_target, codes, rule_name};
use crate::analyzer::stig::cluster::RunContext;
use crate::analyzer::stig::ownership::get_command_option_from_deployment;
use crate::analyzer::stig::types::{CheckResult, RuleResult};
use async_trait::async_trait;

const OPTION: &str = "secure-port";

/// Rule: the API server secure port must not be disabled.
pub struct SecurePortRule {
    env: RuleEnv,
}

impl SecurePortRule {
    pub fn new(env: RuleEnv) -> Self {
        Self { env }
    }
}

#[async_trait]
impl Rule for SecurePortRule {
    fn id(&self) -> &str {
        codes::SECURE_PORT
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

        let check_result = match values.as_slice() {
            [] => CheckResult::warning(format!("Option {} has not been set.", OPTION), target),
            [value] if value == "0" => {
                CheckResult::failed(format!("Option {} set to not allowed value.", OPTION), target)
            }
            [_] => CheckResult::passed(format!("Option {} set to allowed value.", OPTION), target),
            _ => CheckResult::warning(
                format!("Option {} has been set more than once in container command.", OPTION),
                target,
            ),
        };
        Ok(RuleResult::single(self, check_result))
    }
}
