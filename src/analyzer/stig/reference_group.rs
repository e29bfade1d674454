//! Reference group pod selection.
//!
//! Replicas of one controller run the same pod template, so checking one of
//! them is enough. Pods sharing the UID of their first owner reference form a
//! reference group; pods without owners are their own group. The selector
//! drops pods that cannot be tested, then picks one representative per group
//! while keeping the set of nodes to visit as small as possible.

use crate::analyzer::stig::extract::{object_name, object_namespace, owner_references, pod_node_name};
use crate::analyzer::stig::types::{CheckResult, Target};
use k8s_openapi::api::core::v1::Pod;
use std::collections::{BTreeMap, BTreeSet, HashMap};

const NOT_SCHEDULED: &str = "Pod not (yet) scheduled";
const NODE_FULL: &str = "Pod cannot be tested since it is scheduled on a fully allocated node.";
const GROUP_NODES_FULL: &str =
    "Reference group cannot be tested since all pods of the group are scheduled on a fully allocated node.";

/// A controller owned group of pods, by index into the input slice.
struct ReferenceGroup<'a> {
    uid: &'a str,
    owner_name: &'a str,
    members: Vec<usize>,
    candidates: Vec<usize>,
}

/// Target for a single pod.
pub fn pod_target(base: &Target, pod: &Pod) -> Target {
    base.with([
        ("name", object_name(&pod.metadata)),
        ("namespace", object_namespace(&pod.metadata)),
        ("kind", "pod"),
    ])
}

/// Select the pods to evaluate, grouped by the node they run on.
///
/// Returns the selected pods per node in input order, plus a warning for every
/// pod or reference group that cannot be tested. Warnings come in the order
/// unscheduled pods, owner-less pods on exhausted nodes, exhausted reference
/// groups. Group members on exhausted nodes are dropped without a warning of
/// their own; a group that loses every member gets one group level warning.
pub fn select_pod_of_reference_group(
    pods: &[Pod],
    node_allocatable: &HashMap<String, i64>,
    base_target: &Target,
) -> (BTreeMap<String, Vec<Pod>>, Vec<CheckResult>) {
    let mut check_results = Vec::new();
    let mut testable = vec![true; pods.len()];

    for (idx, pod) in pods.iter().enumerate() {
        if pod_node_name(pod).is_empty() {
            testable[idx] = false;
            check_results.push(CheckResult::warning(NOT_SCHEDULED, pod_target(base_target, pod)));
        }
    }

    let mut exhausted = vec![false; pods.len()];
    for (idx, pod) in pods.iter().enumerate() {
        if !testable[idx] {
            continue;
        }
        let node_name = pod_node_name(pod);
        if node_allocatable.get(node_name).copied().unwrap_or(0) <= 0 {
            testable[idx] = false;
            exhausted[idx] = true;
            // Group members are covered by the group level warning.
            if owner_references(&pod.metadata).is_empty() {
                check_results.push(CheckResult::warning(
                    NODE_FULL,
                    pod_target(base_target, pod).with([("node", node_name)]),
                ));
            }
        }
    }

    let (mut groups, singletons) = partition(pods);
    for group in &mut groups {
        group.candidates = group.members.iter().copied().filter(|&i| testable[i]).collect();
    }

    for group in &groups {
        if group.candidates.is_empty() && group.members.iter().any(|&i| exhausted[i]) {
            check_results.push(CheckResult::warning(
                GROUP_NODES_FULL,
                base_target.with([
                    ("name", group.owner_name),
                    ("uid", group.uid),
                    ("kind", "referenceGroup"),
                ]),
            ));
        }
    }

    let mut selected = vec![false; pods.len()];
    let mut selected_nodes: BTreeSet<&str> = BTreeSet::new();
    for idx in singletons.into_iter().filter(|&i| testable[i]) {
        selected[idx] = true;
        selected_nodes.insert(pod_node_name(&pods[idx]));
    }

    let mut unresolved: Vec<&ReferenceGroup> = groups.iter().filter(|g| !g.candidates.is_empty()).collect();
    loop {
        unresolved.retain(|group| {
            let reused = group
                .candidates
                .iter()
                .copied()
                .find(|&i| selected_nodes.contains(pod_node_name(&pods[i])));
            match reused {
                Some(idx) => {
                    selected[idx] = true;
                    false
                }
                None => true,
            }
        });

        match most_shared_node(pods, &unresolved) {
            Some(node) => {
                selected_nodes.insert(node);
            }
            None => break,
        }
    }

    let mut by_node: BTreeMap<String, Vec<Pod>> = BTreeMap::new();
    for (idx, pod) in pods.iter().enumerate() {
        if selected[idx] {
            by_node
                .entry(pod_node_name(pod).to_string())
                .or_default()
                .push(pod.clone());
        }
    }

    (by_node, check_results)
}

/// Split pods into reference groups (by first owner UID, in order of first
/// appearance) and owner-less singletons.
fn partition(pods: &[Pod]) -> (Vec<ReferenceGroup<'_>>, Vec<usize>) {
    let mut groups: Vec<ReferenceGroup> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut singletons = Vec::new();

    for (idx, pod) in pods.iter().enumerate() {
        let Some(owner) = owner_references(&pod.metadata).first() else {
            singletons.push(idx);
            continue;
        };
        let uid = owner.uid.as_str();
        match index.get(uid) {
            Some(&g) => groups[g].members.push(idx),
            None => {
                index.insert(uid, groups.len());
                groups.push(ReferenceGroup {
                    uid,
                    owner_name: owner.name.as_str(),
                    members: vec![idx],
                    candidates: Vec::new(),
                });
            }
        }
    }

    (groups, singletons)
}

/// The node hosting candidates of the most unresolved groups. Ties go to the
/// lexicographically smallest node name.
fn most_shared_node<'a>(pods: &'a [Pod], groups: &[&ReferenceGroup]) -> Option<&'a str> {
    let mut shared: BTreeMap<&str, usize> = BTreeMap::new();
    for group in groups {
        let nodes: BTreeSet<&str> = group.candidates.iter().map(|&i| pod_node_name(&pods[i])).collect();
        for node in nodes {
            *shared.entry(node).or_default() += 1;
        }
    }

    let mut best: Option<(&str, usize)> = None;
    for (node, count) in shared {
        if best.is_none_or(|(_, best_count)| count > best_count) {
            best = Some((node, count));
        }
    }
    best.map(|(node, _)| node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::stig::types::Status;
    use k8s_openapi::api::core::v1::PodSpec;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};

    fn pod(name: &str, node: &str, owner_uid: Option<&str>) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                owner_references: owner_uid.map(|uid| {
                    vec![OwnerReference {
                        uid: uid.to_string(),
                        ..Default::default()
                    }]
                }),
                ..Default::default()
            },
            spec: Some(PodSpec {
                node_name: (!node.is_empty()).then(|| node.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn capacity(pairs: &[(&str, i64)]) -> HashMap<String, i64> {
        pairs.iter().map(|(n, c)| (n.to_string(), *c)).collect()
    }

    fn names(selection: &BTreeMap<String, Vec<Pod>>, node: &str) -> Vec<String> {
        selection[node]
            .iter()
            .map(|p| object_name(&p.metadata).to_string())
            .collect()
    }

    fn roomy() -> HashMap<String, i64> {
        capacity(&[("node1", 10), ("node2", 10), ("node3", 10), ("node4", 10)])
    }

    #[test]
    fn test_single_pods_grouped_by_node() {
        let pods = vec![
            pod("pod1", "node1", None),
            pod("pod2", "node2", None),
            pod("pod3", "node1", None),
            pod("pod4", "node2", None),
            pod("pod5", "node3", None),
        ];

        let (selection, results) = select_pod_of_reference_group(&pods, &roomy(), &Target::default());

        assert_eq!(selection.len(), 3);
        assert_eq!(names(&selection, "node1"), vec!["pod1", "pod3"]);
        assert_eq!(names(&selection, "node2"), vec!["pod2", "pod4"]);
        assert_eq!(names(&selection, "node3"), vec!["pod5"]);
        assert!(results.is_empty());
    }

    #[test]
    fn test_group_reuses_node_of_single_pod() {
        let pods = vec![
            pod("pod1", "node3", Some("1")),
            pod("pod2", "node2", None),
            pod("pod3", "node1", None),
            pod("pod4", "node2", Some("1")),
            pod("pod5", "node1", Some("1")),
        ];

        let (selection, results) = select_pod_of_reference_group(&pods, &roomy(), &Target::default());

        assert_eq!(selection.len(), 2);
        assert_eq!(names(&selection, "node1"), vec!["pod3"]);
        assert_eq!(names(&selection, "node2"), vec!["pod2", "pod4"]);
        assert!(results.is_empty());
    }

    #[test]
    fn test_groups_share_a_minimal_node_set() {
        let pods = vec![
            pod("pod1", "node2", Some("1")),
            pod("pod2", "node1", None),
            pod("pod3", "node3", Some("2")),
            pod("pod4", "node3", Some("1")),
            pod("pod5", "node4", Some("1")),
        ];

        let (selection, results) = select_pod_of_reference_group(&pods, &roomy(), &Target::default());

        assert_eq!(selection.len(), 2);
        assert_eq!(names(&selection, "node1"), vec!["pod2"]);
        assert_eq!(names(&selection, "node3"), vec!["pod3", "pod4"]);
        assert!(results.is_empty());
    }

    #[test]
    fn test_tie_goes_to_smallest_node_name() {
        let pods = vec![
            pod("pod1", "node3", Some("1")),
            pod("pod2", "node2", Some("1")),
        ];

        let (selection, _) = select_pod_of_reference_group(&pods, &roomy(), &Target::default());

        assert_eq!(selection.len(), 1);
        assert_eq!(names(&selection, "node2"), vec!["pod2"]);
    }

    #[test]
    fn test_unscheduled_pod_is_reported() {
        let pods = vec![pod("pod1", "", None)];

        let (selection, results) = select_pod_of_reference_group(&pods, &roomy(), &Target::default());

        assert!(selection.is_empty());
        assert_eq!(
            results,
            vec![CheckResult::warning(
                "Pod not (yet) scheduled",
                Target::new([("name", "pod1"), ("namespace", ""), ("kind", "pod")]),
            )]
        );
    }

    #[test]
    fn test_fully_allocated_nodes() {
        let mut group_pod = pod("pod1", "node3", Some("1"));
        group_pod.metadata.owner_references.as_mut().unwrap()[0].name = "owner".to_string();
        let pods = vec![
            group_pod,
            pod("pod2", "node2", None),
            pod("pod3", "node1", None),
            pod("pod4", "node2", Some("1")),
            pod("pod5", "node1", Some("1")),
        ];
        let full = capacity(&[("node1", 0), ("node2", 0), ("node3", 0)]);

        let (selection, results) = select_pod_of_reference_group(&pods, &full, &Target::default());

        assert!(selection.is_empty());
        let pod_warning = |name: &str, node: &str| {
            CheckResult::warning(
                "Pod cannot be tested since it is scheduled on a fully allocated node.",
                Target::new([("name", name), ("namespace", ""), ("kind", "pod"), ("node", node)]),
            )
        };
        assert_eq!(
            results,
            vec![
                pod_warning("pod2", "node2"),
                pod_warning("pod3", "node1"),
                CheckResult::warning(
                    "Reference group cannot be tested since all pods of the group are scheduled on a fully allocated node.",
                    Target::new([("name", "owner"), ("uid", "1"), ("kind", "referenceGroup")]),
                ),
            ]
        );
    }

    #[test]
    fn test_group_survives_when_one_member_has_room() {
        let pods = vec![
            pod("pod1", "node1", Some("1")),
            pod("pod2", "node2", Some("1")),
        ];
        let caps = capacity(&[("node1", 0), ("node2", 3)]);

        let (selection, results) = select_pod_of_reference_group(&pods, &caps, &Target::default());

        assert_eq!(names(&selection, "node2"), vec!["pod2"]);
        assert!(results.is_empty());
    }

    #[test]
    fn test_owner_less_pod_on_full_node_is_reported() {
        let pods = vec![
            pod("pod1", "node1", None),
            pod("pod2", "node2", None),
        ];
        let caps = capacity(&[("node1", 0), ("node2", 3)]);

        let (selection, results) = select_pod_of_reference_group(&pods, &caps, &Target::default());

        assert_eq!(names(&selection, "node2"), vec!["pod2"]);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, Status::Warning);
        assert_eq!(results[0].target.get("node"), Some("node1"));
    }

    #[test]
    fn test_warnings_ordered_by_kind() {
        let pods = vec![
            pod("full", "node1", None),
            pod("pending", "", None),
        ];
        let caps = capacity(&[("node1", 0)]);

        let (_, results) = select_pod_of_reference_group(&pods, &caps, &Target::default());

        let names: Vec<&str> = results.iter().filter_map(|r| r.target.get("name")).collect();
        assert_eq!(names, vec!["pending", "full"]);
    }

    #[test]
    fn test_base_target_is_prefixed() {
        let pods = vec![pod("pod1", "", None)];
        let base = Target::new([("cluster", "shoot")]);

        let (_, results) = select_pod_of_reference_group(&pods, &roomy(), &base);

        assert_eq!(
            results[0].target,
            Target::new([("cluster", "shoot"), ("name", "pod1"), ("namespace", ""), ("kind", "pod")])
        );
    }

    #[test]
    fn test_empty_input() {
        let (selection, results) = select_pod_of_reference_group(&[], &HashMap::new(), &Target::default());
        assert!(selection.is_empty());
        assert!(results.is_empty());
    }
}
