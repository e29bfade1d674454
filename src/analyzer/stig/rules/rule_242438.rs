//! 242438: API server request-timeout.

use super::{Rule, RuleEnv, RuleError, api_server_target, codes, rule_name};
use crate::analyzer::stig::cluster::RunContext;
use crate::analyzer::stig::duration::ApiDuration;
use crate::analyzer::stig::ownership::get_command_option_from_deployment;
use crate::analyzer::stig::types::{CheckResult, RuleResult};
use async_trait::async_trait;

const OPTION: &str = "request-timeout";

/// Rule: the API server must time out requests.
pub struct RequestTimeoutRule {
    env: RuleEnv,
}

impl RequestTimeoutRule {
    pub fn new(env: RuleEnv) -> Self {
        Self { env }
    }
}

#[async_trait]
impl Rule for RequestTimeoutRule {
    fn id(&self) -> &str {
        codes::REQUEST_TIMEOUT
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

        // Unset means the API server default of one minute.
        let value = match values.as_slice() {
            [] => {
                return Ok(RuleResult::single(
                    self,
                    CheckResult::passed(
                        format!("Option {} has not been set.", OPTION),
                        target.with([("details", "defaults to 1m0s")]),
                    ),
                ));
            }
            [value] => value,
            _ => {
                return Ok(RuleResult::single(
                    self,
                    CheckResult::warning(
                        format!("Option {} has been set more than once in container command.", OPTION),
                        target,
                    ),
                ));
            }
        };

        let check_result = match ApiDuration::parse(value) {
            Err(err) => CheckResult::errored(err.to_string(), target),
            Ok(timeout) if !timeout.is_positive() => {
                CheckResult::failed(format!("Option {} set to not allowed value.", OPTION), target)
            }
            Ok(_) => CheckResult::passed(format!("Option {} set to allowed value.", OPTION), target),
        };
        Ok(RuleResult::single(self, check_result))
    }
}
