//! Metadata extraction utilities.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use std::collections::BTreeMap;

/// Name of an object, or the empty string.
pub fn object_name(meta: &ObjectMeta) -> &str {
    meta.name.as_deref().unwrap_or_default()
}

/// Namespace of an object, or the empty string for cluster scoped objects.
pub fn object_namespace(meta: &ObjectMeta) -> &str {
    meta.namespace.as_deref().unwrap_or_default()
}

/// UID of an object, or the empty string.
pub fn object_uid(meta: &ObjectMeta) -> &str {
    meta.uid.as_deref().unwrap_or_default()
}

/// Owner references of an object in declaration order.
pub fn owner_references(meta: &ObjectMeta) -> &[OwnerReference] {
    meta.owner_references.as_deref().unwrap_or_default()
}

/// Whether an object is owned by an object of the given kind and name.
pub fn is_owned_by(meta: &ObjectMeta, kind: &str, name: &str) -> bool {
    owner_references(meta)
        .iter()
        .any(|owner| owner.kind == kind && owner.name == name)
}

/// Whether every `selector` label is present with the same value in `labels`.
///
/// An empty selector matches everything, including objects without labels.
pub fn match_labels(labels: Option<&BTreeMap<String, String>>, selector: &BTreeMap<String, String>) -> bool {
    selector.iter().all(|(key, value)| {
        labels
            .and_then(|l| l.get(key))
            .is_some_and(|actual| actual == value)
    })
}
