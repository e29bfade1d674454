use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    ConfigMap, ConfigMapVolumeSource, Container, PodSpec, PodTemplateSpec, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use stigcheck::analyzer::stig::cluster::{FakeCluster, FakePodExecutor, RunContext};
use stigcheck::analyzer::stig::extract::container_from_deployment;
use stigcheck::analyzer::stig::flags::{command_tokens, find_flag_value_raw, find_inner_value, is_flag_set};
use stigcheck::analyzer::stig::kubelet::{get_kubelet_config, kubelet_config_path};
use stigcheck::analyzer::stig::volume::config_bytes_by_mount_path;

const ADMISSION_CONFIG: &str = "apiVersion: apiserver.config.k8s.io/v1
kind: AdmissionConfiguration
plugins:
- name: PodSecurity
";

fn meta(name: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some("kube-system".to_string()),
        ..Default::default()
    }
}

fn api_server() -> Deployment {
    Deployment {
        metadata: meta("kube-apiserver"),
        spec: Some(DeploymentSpec {
            template: PodTemplateSpec {
                spec: Some(PodSpec {
                    containers: vec![Container {
                        name: "kube-apiserver".to_string(),
                        command: Some(vec![
                            "kube-apiserver".to_string(),
                            "--admission-control-config-file=/etc/admission/config.yaml".to_string(),
                            "--feature-gates=PodSecurity=true,Foo=false".to_string(),
                        ]),
                        volume_mounts: Some(vec![VolumeMount {
                            name: "admission".to_string(),
                            mount_path: "/etc/admission".to_string(),
                            ..Default::default()
                        }]),
                        ..Default::default()
                    }],
                    volumes: Some(vec![Volume {
                        name: "admission".to_string(),
                        config_map: Some(ConfigMapVolumeSource {
                            name: "admission-config".to_string(),
                            ..Default::default()
                        }),
                        ..Default::default()
                    }]),
                    ..Default::default()
                }),
                ..Default::default()
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[tokio::test]
async fn reads_config_file_referenced_by_api_server_flag() {
    let deployment = api_server();
    let cluster = FakeCluster::new().with_config_map(ConfigMap {
        metadata: meta("admission-config"),
        data: Some(BTreeMap::from([("config.yaml".to_string(), ADMISSION_CONFIG.to_string())])),
        ..Default::default()
    });

    let container = container_from_deployment(&deployment, "kube-apiserver").unwrap();
    let tokens: Vec<String> = container.command.clone().unwrap_or_default();
    let paths = find_flag_value_raw(&tokens, "admission-control-config-file");
    assert_eq!(paths, vec!["/etc/admission/config.yaml"]);

    let bytes = config_bytes_by_mount_path(&RunContext::new(), &cluster, &deployment, "kube-apiserver", &paths[0])
        .await
        .unwrap();
    assert_eq!(String::from_utf8(bytes).unwrap(), ADMISSION_CONFIG);

    let gates = find_flag_value_raw(&tokens, "feature-gates");
    assert_eq!(find_inner_value(&gates, "PodSecurity"), vec!["true"]);
    assert!(find_inner_value(&gates, "Bar").is_empty());
}

#[tokio::test]
async fn missing_volume_key_is_reported() {
    let deployment = api_server();
    let cluster = FakeCluster::new().with_config_map(ConfigMap {
        metadata: meta("admission-config"),
        data: Some(BTreeMap::new()),
        ..Default::default()
    });

    let err = config_bytes_by_mount_path(
        &RunContext::new(),
        &cluster,
        &deployment,
        "kube-apiserver",
        "/etc/admission/config.yaml",
    )
    .await
    .unwrap_err();
    assert_eq!(
        err.to_string(),
        "configMap: admission-config does not contain field: config.yaml in Data field"
    );
}

#[tokio::test]
async fn reads_kubelet_config_from_raw_command() {
    let raw = "/usr/bin/kubelet --node-ip=10.0.0.4 --config=/var/lib/kubelet/config.yaml";
    assert!(!is_flag_set(raw, "streaming-connection-idle-timeout"));
    assert_eq!(command_tokens(raw).len(), 3);
    assert_eq!(kubelet_config_path(raw).unwrap(), "/var/lib/kubelet/config.yaml");

    let executor = FakePodExecutor::new().with_responses(
        "node-agent-0",
        [Ok("streamingConnectionIdleTimeout: 1h\nmaxPods: 110\n".to_string())],
    );
    let config = get_kubelet_config(&RunContext::new(), &executor, "kube-system", "node-agent-0", "agent", raw)
        .await
        .unwrap();

    assert_eq!(config.streaming_connection_idle_timeout.as_deref(), Some("1h"));
    assert_eq!(config.max_pods, Some(110));
    assert_eq!(executor.calls()[0].command, "cat -- '/var/lib/kubelet/config.yaml'");
}
