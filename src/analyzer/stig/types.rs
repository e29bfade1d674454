//! Core result types shared by every rule.
//!
//! - `Status` - Outcome of a single check
//! - `Target` - Ordered label path identifying what a check looked at
//! - `CheckResult` - One verdict about one target
//! - `RuleResult` - All verdicts produced by one rule invocation

use crate::analyzer::stig::rules::Rule;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Outcome of a single check. Exactly one status applies per `CheckResult`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    /// The subject complies with the rule.
    Passed,
    /// The subject does not comply with the rule.
    Failed,
    /// Inconclusive. Does not fail compliance by itself.
    Warning,
    /// Evaluation could not complete (API, parse or transport failure).
    Errored,
    /// Intentionally not evaluated, with a static justification.
    Skipped,
    /// Non-compliant, but covered by a configured exception.
    Accepted,
}

impl Status {
    /// All statuses in report order.
    pub const ALL: [Status; 6] = [
        Status::Passed,
        Status::Failed,
        Status::Warning,
        Status::Errored,
        Status::Skipped,
        Status::Accepted,
    ];

    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Passed => "Passed",
            Self::Failed => "Failed",
            Self::Warning => "Warning",
            Self::Errored => "Errored",
            Self::Skipped => "Skipped",
            Self::Accepted => "Accepted",
        }
    }

    /// Parse a status from a string (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Ordered label pairs identifying the subject of a check result.
///
/// A target is never modified in place: `with` returns a new target. Keys are
/// unique; extending with a key that is already present replaces its value at
/// the original position. Equality compares the full ordered pair sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Target(Vec<(String, String)>);

impl Target {
    /// Create a target from label pairs.
    pub fn new<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::default().with(pairs)
    }

    /// Return a new target extended with the given label pairs.
    pub fn with<I, K, V>(&self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut labels = self.0.clone();
        for (key, value) in pairs {
            let key = key.into();
            let value = value.into();
            match labels.iter_mut().find(|(k, _)| *k == key) {
                Some(existing) => existing.1 = value,
                None => labels.push((key, value)),
            }
        }
        Self(labels)
    }

    /// Look up the value of a label.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Iterate over the label pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels: Vec<String> = self.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        write!(f, "{}", labels.join(", "))
    }
}

impl Serialize for Target {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in &self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Target {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TargetVisitor;

        impl<'de> Visitor<'de> for TargetVisitor {
            type Value = Target;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "a map of target labels")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Target, A::Error> {
                let mut pairs: Vec<(String, String)> = Vec::new();
                while let Some((key, value)) = access.next_entry::<String, String>()? {
                    pairs.push((key, value));
                }
                Ok(Target::new(pairs))
            }
        }

        deserializer.deserialize_map(TargetVisitor)
    }
}

/// A single verdict about a single target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    pub status: Status,
    pub message: String,
    pub target: Target,
}

impl CheckResult {
    pub fn new(status: Status, message: impl Into<String>, target: Target) -> Self {
        Self {
            status,
            message: message.into(),
            target,
        }
    }

    pub fn passed(message: impl Into<String>, target: Target) -> Self {
        Self::new(Status::Passed, message, target)
    }

    pub fn failed(message: impl Into<String>, target: Target) -> Self {
        Self::new(Status::Failed, message, target)
    }

    pub fn warning(message: impl Into<String>, target: Target) -> Self {
        Self::new(Status::Warning, message, target)
    }

    pub fn errored(message: impl Into<String>, target: Target) -> Self {
        Self::new(Status::Errored, message, target)
    }

    pub fn skipped(message: impl Into<String>, target: Target) -> Self {
        Self::new(Status::Skipped, message, target)
    }

    pub fn accepted(message: impl Into<String>, target: Target) -> Self {
        Self::new(Status::Accepted, message, target)
    }
}

/// All check results of one rule invocation, in evaluation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleResult {
    #[serde(rename = "id")]
    pub rule_id: String,
    #[serde(rename = "name")]
    pub rule_name: String,
    pub check_results: Vec<CheckResult>,
}

impl RuleResult {
    /// Create a rule result for the given rule.
    pub fn new<R: Rule + ?Sized>(rule: &R, check_results: Vec<CheckResult>) -> Self {
        Self {
            rule_id: rule.id().to_string(),
            rule_name: rule.name().to_string(),
            check_results,
        }
    }

    /// Create a rule result holding exactly one check result.
    pub fn single<R: Rule + ?Sized>(rule: &R, check_result: CheckResult) -> Self {
        Self::new(rule, vec![check_result])
    }

    /// Number of check results with the given status.
    pub fn count(&self, status: Status) -> usize {
        self.check_results
            .iter()
            .filter(|r| r.status == status)
            .count()
    }

    /// Whether any check result has the given status.
    pub fn has_status(&self, status: Status) -> bool {
        self.check_results.iter().any(|r| r.status == status)
    }
}
