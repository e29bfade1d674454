//! 242451: API server PKI files owned by root.

use super::{Rule, RuleEnv, RuleError, api_server_target, codes, rule_name};
use crate::analyzer::stig::cluster::RunContext;
use crate::analyzer::stig::extract::{command_tokens, container_from_pod_spec, object_name, object_namespace};
use crate::analyzer::stig::files::{FileStats, get_file_stats};
use crate::analyzer::stig::flags::find_flag_value_raw;
use crate::analyzer::stig::ownership::get_deployment_pods;
use crate::analyzer::stig::reference_group::pod_target;
use crate::analyzer::stig::types::{CheckResult, RuleResult, Target};
use async_trait::async_trait;

const PKI_FLAGS: [&str; 3] = ["tls-cert-file", "tls-private-key-file", "client-ca-file"];
const ROOT: &str = "0";

/// Rule: certificates and keys of the API server must be owned by root.
pub struct PkiOwnershipRule {
    env: RuleEnv,
}

impl PkiOwnershipRule {
    pub fn new(env: RuleEnv) -> Self {
        Self { env }
    }
}

fn ownership_results(file: &FileStats, target: &Target) -> Vec<CheckResult> {
    let target = target.with([(
        "details",
        format!(
            "fileName: {}, ownerUser: {}, ownerGroup: {}",
            file.path, file.user_owner, file.group_owner
        ),
    )]);

    let mut results = Vec::new();
    if file.user_owner != ROOT {
        results.push(CheckResult::failed("File has unexpected owner user", target.clone()));
    }
    if file.group_owner != ROOT {
        results.push(CheckResult::failed("File has unexpected owner group", target.clone()));
    }
    if results.is_empty() {
        results.push(CheckResult::passed("File has expected owners", target));
    }
    results
}

#[async_trait]
impl Rule for PkiOwnershipRule {
    fn id(&self) -> &str {
        codes::PKI_OWNERSHIP
    }

    fn name(&self) -> &str {
        rule_name(self.id())
    }

    async fn run(&self, ctx: &RunContext) -> Result<RuleResult, RuleError> {
        let api_server = &self.env.options.api_server;
        let deployment_target = api_server_target(&self.env);

        let pods = match get_deployment_pods(
            ctx,
            self.env.client.as_ref(),
            &api_server.deployment,
            &self.env.namespace,
            self.env.page_size,
        )
        .await
        {
            Ok(pods) => pods,
            Err(err) => {
                return Ok(RuleResult::single(self, CheckResult::errored(err.to_string(), deployment_target)));
            }
        };

        // Replicas share the pod template, so the first pod stands for all.
        let Some(pod) = pods.first() else {
            return Ok(RuleResult::single(
                self,
                CheckResult::warning("Deployment has no running pods.", deployment_target),
            ));
        };
        let target = pod_target(&self.env.base_target, pod);

        let Some(container) = pod
            .spec
            .as_ref()
            .and_then(|spec| container_from_pod_spec(spec, &api_server.container))
        else {
            return Ok(RuleResult::single(
                self,
                CheckResult::errored(
                    format!("pod does not contain container with name: {}", api_server.container),
                    target,
                ),
            ));
        };

        let tokens = command_tokens(container);
        let paths: Vec<String> = PKI_FLAGS
            .iter()
            .flat_map(|flag| find_flag_value_raw(&tokens, flag))
            .filter(|path| !path.is_empty())
            .collect();
        if paths.is_empty() {
            return Ok(RuleResult::single(
                self,
                CheckResult::warning("No PKI files are configured for the API server.", target),
            ));
        }

        let check_results = match get_file_stats(
            ctx,
            self.env.executor.as_ref(),
            object_namespace(&pod.metadata),
            object_name(&pod.metadata),
            &api_server.container,
            &paths,
        )
        .await
        {
            Ok(stats) => stats.iter().flat_map(|file| ownership_results(file, &target)).collect(),
            Err(err) => vec![CheckResult::errored(err.to_string(), target)],
        };

        Ok(RuleResult::new(self, check_results))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::stig::cluster::{FakeCluster, FakeNodeConfigFetcher, FakePodExecutor, PodExecutor};
    use crate::analyzer::stig::rules::test_support::{api_server, env_with, pod, with_container, with_owner};
    use crate::analyzer::stig::types::Status;
    use k8s_openapi::api::apps::v1::{ReplicaSet, ReplicaSetSpec};
    use k8s_openapi::api::core::v1::{Container, Pod};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
    use std::sync::Arc;

    fn replica_set() -> ReplicaSet {
        ReplicaSet {
            metadata: ObjectMeta {
                name: Some("kube-apiserver-abc".to_string()),
                namespace: Some("kube-system".to_string()),
                uid: Some("rs-uid".to_string()),
                owner_references: Some(vec![OwnerReference {
                    kind: "Deployment".to_string(),
                    name: "kube-apiserver".to_string(),
                    uid: "kapi".to_string(),
                    ..Default::default()
                }]),
                ..Default::default()
            },
            spec: Some(ReplicaSetSpec {
                replicas: Some(2),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn api_server_pod(name: &str) -> Pod {
        with_container(
            with_owner(pod(name, "kube-system", "node1"), "ReplicaSet", "kube-apiserver-abc", "rs-uid"),
            Container {
                name: "kube-apiserver".to_string(),
                command: Some(vec![
                    "kube-apiserver".to_string(),
                    "--tls-cert-file=/srv/tls/tls.crt".to_string(),
                    "--tls-private-key-file=/srv/tls/tls.key".to_string(),
                    "--client-ca-file=/srv/ca/bundle.crt".to_string(),
                ]),
                ..Default::default()
            },
        )
    }

    fn cluster() -> FakeCluster {
        FakeCluster::new()
            .with_deployment(api_server(&[]))
            .with_replica_sets([replica_set()])
            .with_pods([api_server_pod("kube-apiserver-1"), api_server_pod("kube-apiserver-2")])
    }

    #[test]
    fn test_ownership_results() {
        let file = |user: &str, group: &str| FileStats {
            path: "/f".to_string(),
            permissions: 0o600,
            user_owner: user.to_string(),
            group_owner: group.to_string(),
        };
        let target = Target::default();

        let statuses = |f: FileStats| -> Vec<(Status, String)> {
            ownership_results(&f, &target)
                .into_iter()
                .map(|r| (r.status, r.message))
                .collect()
        };
        assert_eq!(statuses(file("0", "0")), vec![(Status::Passed, "File has expected owners".to_string())]);
        assert_eq!(
            statuses(file("1000", "1000")),
            vec![
                (Status::Failed, "File has unexpected owner user".to_string()),
                (Status::Failed, "File has unexpected owner group".to_string()),
            ]
        );
        assert_eq!(
            statuses(file("0", "65534")),
            vec![(Status::Failed, "File has unexpected owner group".to_string())]
        );
    }

    #[tokio::test]
    async fn test_stats_first_pod_only() {
        let executor = Arc::new(FakePodExecutor::new().with_default_responses([Ok(
            "600 0 0 /srv/tls/tls.crt\n600 0 0 /srv/tls/tls.key\n644 1000 0 /srv/ca/bundle.crt\n".to_string(),
        )]));
        let shared: Arc<dyn PodExecutor> = executor.clone();
        let mut rule_env = env_with(cluster(), FakePodExecutor::new(), FakeNodeConfigFetcher::new());
        rule_env.executor = shared;

        let result = PkiOwnershipRule::new(rule_env).run(&RunContext::new()).await.unwrap();

        let statuses: Vec<Status> = result.check_results.iter().map(|r| r.status).collect();
        assert_eq!(statuses, vec![Status::Passed, Status::Passed, Status::Failed]);
        assert_eq!(
            result.check_results[2].target,
            Target::new([
                ("name", "kube-apiserver-1"),
                ("namespace", "kube-system"),
                ("kind", "pod"),
                ("details", "fileName: /srv/ca/bundle.crt, ownerUser: 1000, ownerGroup: 0"),
            ])
        );

        let calls = executor.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].pod, "kube-apiserver-1");
        assert_eq!(
            calls[0].command,
            "stat -Lc \"%a %u %g %n\" -- '/srv/tls/tls.crt' '/srv/tls/tls.key' '/srv/ca/bundle.crt'"
        );
    }

    #[tokio::test]
    async fn test_deployment_without_pods() {
        let cluster = FakeCluster::new().with_deployment(api_server(&[]));
        let result = PkiOwnershipRule::new(env_with(cluster, FakePodExecutor::new(), FakeNodeConfigFetcher::new()))
            .run(&RunContext::new())
            .await
            .unwrap();
        assert_eq!(result.check_results[0].status, Status::Warning);
    }

    #[tokio::test]
    async fn test_missing_deployment() {
        let result = PkiOwnershipRule::new(env_with(
            FakeCluster::new(),
            FakePodExecutor::new(),
            FakeNodeConfigFetcher::new(),
        ))
        .run(&RunContext::new())
        .await
        .unwrap();
        assert_eq!(
            result.check_results,
            vec![CheckResult::errored(
                "deployments.apps \"kube-apiserver\" not found",
                Target::new([("name", "kube-apiserver"), ("namespace", "kube-system"), ("kind", "deployment")])
            )]
        );
    }
}
