//! 242447: kube-proxy config file permissions.
//!
//! kube-proxy pods are reduced to one representative per reference group on
//! nodes with spare capacity, then the files passed to `--kubeconfig` and
//! `--config` are inspected with `stat` inside the kube-proxy container.

use super::{Rule, RuleEnv, RuleError, codes, rule_name};
use crate::analyzer::stig::capacity::nodes_allocatable_pods;
use crate::analyzer::stig::cluster::{ListOptions, RunContext};
use crate::analyzer::stig::extract::{command_tokens, container_from_pod_spec, object_name, object_namespace};
use crate::analyzer::stig::files::get_file_stats;
use crate::analyzer::stig::flags::find_flag_value_raw;
use crate::analyzer::stig::reference_group::{pod_target, select_pod_of_reference_group};
use crate::analyzer::stig::types::{CheckResult, RuleResult};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;

/// Most permissive mode allowed for kube-proxy config files.
const MAX_PERMISSIONS: u32 = 0o644;
const FILE_FLAGS: [&str; 2] = ["kubeconfig", "config"];

/// Rule: kube-proxy config files must be 644 or more restrictive.
pub struct KubeProxyFilePermissionsRule {
    env: RuleEnv,
}

impl KubeProxyFilePermissionsRule {
    pub fn new(env: RuleEnv) -> Self {
        Self { env }
    }

    async fn check_pod(&self, ctx: &RunContext, pod: &Pod) -> Vec<CheckResult> {
        let container_name = &self.env.options.kube_proxy.container;
        let target = pod_target(&self.env.base_target, pod);

        let Some(container) = pod
            .spec
            .as_ref()
            .and_then(|spec| container_from_pod_spec(spec, container_name))
        else {
            return vec![CheckResult::errored(
                format!("pod does not contain container with name: {}", container_name),
                target,
            )];
        };

        let tokens = command_tokens(container);
        let paths: Vec<String> = FILE_FLAGS
            .iter()
            .flat_map(|flag| find_flag_value_raw(&tokens, flag))
            .filter(|path| !path.is_empty())
            .collect();
        if paths.is_empty() {
            return vec![CheckResult::warning(
                "kube-proxy does not reference any config file.",
                target,
            )];
        }

        let stats = match get_file_stats(
            ctx,
            self.env.executor.as_ref(),
            object_namespace(&pod.metadata),
            object_name(&pod.metadata),
            container_name,
            &paths,
        )
        .await
        {
            Ok(stats) => stats,
            Err(err) => return vec![CheckResult::errored(err.to_string(), target)],
        };

        stats
            .iter()
            .map(|file| {
                let target = target.with([(
                    "details",
                    format!("fileName: {}, permissions: {}", file.path, file.permissions_str()),
                )]);
                if file.exceeds(MAX_PERMISSIONS) {
                    CheckResult::failed("File has too wide permissions", target)
                } else {
                    CheckResult::passed("File has expected permissions", target)
                }
            })
            .collect()
    }
}

#[async_trait]
impl Rule for KubeProxyFilePermissionsRule {
    fn id(&self) -> &str {
        codes::KUBE_PROXY_FILE_PERMISSIONS
    }

    fn name(&self) -> &str {
        rule_name(self.id())
    }

    async fn run(&self, ctx: &RunContext) -> Result<RuleResult, RuleError> {
        let selector = &self.env.options.kube_proxy;
        if selector.label_selector.trim().is_empty() {
            return Err(RuleError::orchestration(self.id(), "kube-proxy label selector is not configured"));
        }
        let base = &self.env.base_target;
        let all = ListOptions::all().with_page_size(self.env.page_size);

        let all_pods = match ctx.call(self.env.client.list_pods(&all)).await {
            Ok(pods) => pods,
            Err(err) => {
                return Ok(RuleResult::single(
                    self,
                    CheckResult::errored(err.to_string(), base.with([("kind", "allPodsList")])),
                ));
            }
        };
        let nodes = match ctx.call(self.env.client.list_nodes(&all)).await {
            Ok(nodes) => nodes,
            Err(err) => {
                return Ok(RuleResult::single(
                    self,
                    CheckResult::errored(err.to_string(), base.with([("kind", "nodeList")])),
                ));
            }
        };

        let options = ListOptions::namespaced(&selector.namespace)
            .with_label_selector(&selector.label_selector)
            .with_page_size(self.env.page_size);
        let proxy_pods = match ctx.call(self.env.client.list_pods(&options)).await {
            Ok(pods) => pods,
            Err(err) => {
                return Ok(RuleResult::single(
                    self,
                    CheckResult::errored(err.to_string(), base.with([("kind", "podList")])),
                ));
            }
        };
        if proxy_pods.is_empty() {
            return Ok(RuleResult::single(
                self,
                CheckResult::warning("No kube-proxy pods found.", base.with([("kind", "podList")])),
            ));
        }

        let allocatable = nodes_allocatable_pods(&all_pods, &nodes);
        let (selected, mut check_results) = select_pod_of_reference_group(&proxy_pods, &allocatable, base);
        log::debug!(
            "checking {} of {} kube-proxy pods",
            selected.values().map(Vec::len).sum::<usize>(),
            proxy_pods.len()
        );

        for pods in selected.values() {
            for pod in pods {
                check_results.extend(self.check_pod(ctx, pod).await);
            }
        }

        Ok(RuleResult::new(self, check_results))
    }
}
