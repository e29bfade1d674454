//! 242415: Secrets must not be stored as environment variables.

use super::{Rule, RuleEnv, RuleError, codes, rule_name};
use crate::analyzer::stig::cluster::{ListOptions, RunContext};
use crate::analyzer::stig::extract::{object_name, pod_containers};
use crate::analyzer::stig::reference_group::pod_target;
use crate::analyzer::stig::types::{CheckResult, RuleResult, Target};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Namespace, Pod};
use std::collections::{BTreeMap, HashMap};

const ACCEPTED_DEFAULT: &str = "Pod accepted to use environment to inject secret.";

/// Rule: no container may read a Secret key into an environment variable.
pub struct SecretsInEnvRule {
    env: RuleEnv,
}

impl SecretsInEnvRule {
    pub fn new(env: RuleEnv) -> Self {
        Self { env }
    }

    fn check_pod(&self, pod: &Pod, namespace_labels: Option<&BTreeMap<String, String>>) -> Vec<CheckResult> {
        let accepted_pods = &self.env.options.secrets_in_env.accepted_pods;
        let mut target = pod_target(&self.env.base_target, pod);
        let mut check_results = Vec::new();

        for container in pod_containers(pod) {
            for var in container.env.iter().flatten() {
                let Some(key_ref) = var.value_from.as_ref().and_then(|v| v.secret_key_ref.as_ref()) else {
                    continue;
                };
                target = target.with([(
                    "details",
                    format!(
                        "containerName: {}, variableName: {}, keyRef: {}",
                        container.name, var.name, key_ref.key
                    ),
                )]);

                match accepted_pods.accepted(pod.metadata.labels.as_ref(), namespace_labels, &var.name) {
                    Some("") => check_results.push(CheckResult::accepted(ACCEPTED_DEFAULT, target.clone())),
                    Some(justification) => {
                        check_results.push(CheckResult::accepted(justification, target.clone()))
                    }
                    None => check_results.push(CheckResult::failed(
                        "Pod uses environment to inject secret.",
                        target.clone(),
                    )),
                }
            }
        }

        if check_results.is_empty() {
            check_results.push(CheckResult::passed(
                "Pod does not use environment to inject secret.",
                target,
            ));
        }
        check_results
    }
}

#[async_trait]
impl Rule for SecretsInEnvRule {
    fn id(&self) -> &str {
        codes::SECRETS_IN_ENV
    }

    fn name(&self) -> &str {
        rule_name(self.id())
    }

    async fn run(&self, ctx: &RunContext) -> Result<RuleResult, RuleError> {
        let target = &self.env.base_target;
        let options = ListOptions::all().with_page_size(self.env.page_size);

        let pods = match ctx.call(self.env.client.list_pods(&options)).await {
            Ok(pods) => pods,
            Err(err) => {
                return Ok(RuleResult::single(
                    self,
                    CheckResult::errored(err.to_string(), target.with([("kind", "podList")])),
                ));
            }
        };

        let namespaces = match ctx.call(self.env.client.list_namespaces(&options)).await {
            Ok(namespaces) => namespaces,
            Err(err) => {
                return Ok(RuleResult::single(
                    self,
                    CheckResult::errored(err.to_string(), target.with([("kind", "namespaceList")])),
                ));
            }
        };
        let namespaces: HashMap<&str, &Namespace> = namespaces
            .iter()
            .map(|ns| (object_name(&ns.metadata), ns))
            .collect();

        log::debug!("checking {} pods for secrets in environment", pods.len());

        let check_results = pods
            .iter()
            .flat_map(|pod| {
                let namespace_labels = pod
                    .metadata
                    .namespace
                    .as_deref()
                    .and_then(|ns| namespaces.get(ns))
                    .and_then(|ns| ns.metadata.labels.as_ref());
                self.check_pod(pod, namespace_labels)
            })
            .collect();

        Ok(RuleResult::new(self, check_results))
    }
}
