//! Configured exceptions to otherwise failing checks.
//!
//! An acceptance entry names the pods it covers (by pod and namespace labels),
//! the values it exempts (for example environment variable names) and a
//! justification that replaces the default `Accepted` message.

use crate::analyzer::stig::extract::match_labels;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One accepted exception.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptedPods {
    #[serde(default)]
    pub pod_match_labels: BTreeMap<String, String>,
    #[serde(default)]
    pub namespace_match_labels: BTreeMap<String, String>,
    #[serde(default)]
    pub justification: String,
    #[serde(default, alias = "environmentVariables")]
    pub values: Vec<String>,
}

impl AcceptedPods {
    pub fn new(values: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            values: values.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn with_pod_labels(mut self, labels: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>) -> Self {
        self.pod_match_labels = labels.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        self
    }

    pub fn with_namespace_labels(
        mut self,
        labels: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>,
    ) -> Self {
        self.namespace_match_labels = labels.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        self
    }

    pub fn with_justification(mut self, justification: impl Into<String>) -> Self {
        self.justification = justification.into();
        self
    }

    fn covers(
        &self,
        pod_labels: Option<&BTreeMap<String, String>>,
        namespace_labels: Option<&BTreeMap<String, String>>,
        value: &str,
    ) -> bool {
        match_labels(pod_labels, &self.pod_match_labels)
            && match_labels(namespace_labels, &self.namespace_match_labels)
            && self.values.iter().any(|v| v == value)
    }
}

/// Ordered list of accepted exceptions. The first matching entry wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AcceptanceList(pub Vec<AcceptedPods>);

impl AcceptanceList {
    pub fn new(entries: Vec<AcceptedPods>) -> Self {
        Self(entries)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The justification of the first entry covering `value` for a pod with
    /// the given labels in a namespace with the given labels. An entry without
    /// justification yields an empty string.
    pub fn accepted(
        &self,
        pod_labels: Option<&BTreeMap<String, String>>,
        namespace_labels: Option<&BTreeMap<String, String>>,
        value: &str,
    ) -> Option<&str> {
        self.0
            .iter()
            .find(|entry| entry.covers(pod_labels, namespace_labels, value))
            .map(|entry| entry.justification.as_str())
    }
}
