//! Label selector conversion and matching
//!
//! A [`LabelSelector`] is the declarative form found in placement documents.
//! [`label_selector_as_selector`] validates it and turns it into a
//! [`Selector`], the predicate handed to the cluster registry.

use crate::error::{ClusterPlaceError, ClusterPlaceResult};
use crate::model::LabelSelector;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

const MAX_NAME_LEN: usize = 63;
const MAX_PREFIX_LEN: usize = 253;

/// Selector operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Operator {
    /// `key=value`, produced from `matchLabels`
    Equals,
    In,
    NotIn,
    Exists,
    DoesNotExist,
}

impl FromStr for Operator {
    type Err = ClusterPlaceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "In" => Ok(Operator::In),
            "NotIn" => Ok(Operator::NotIn),
            "Exists" => Ok(Operator::Exists),
            "DoesNotExist" => Ok(Operator::DoesNotExist),
            other => Err(ClusterPlaceError::InvalidSelector(format!(
                "\"{}\" is not a valid label selector operator",
                other
            ))),
        }
    }
}

/// A single validated selector requirement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    key: String,
    operator: Operator,
    values: BTreeSet<String>,
}

impl Requirement {
    /// Create a requirement, validating key, values and operator arity
    pub fn new<I, S>(key: &str, operator: Operator, values: I) -> ClusterPlaceResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        validate_key(key)?;

        let values: BTreeSet<String> = values.into_iter().map(Into::into).collect();
        match operator {
            Operator::Equals => {
                if values.len() != 1 {
                    return Err(ClusterPlaceError::InvalidSelector(format!(
                        "key {}: exactly one value required for equality",
                        key
                    )));
                }
            }
            Operator::In | Operator::NotIn => {
                if values.is_empty() {
                    return Err(ClusterPlaceError::InvalidSelector(format!(
                        "key {}: values must be non-empty for {:?}",
                        key, operator
                    )));
                }
            }
            Operator::Exists | Operator::DoesNotExist => {
                if !values.is_empty() {
                    return Err(ClusterPlaceError::InvalidSelector(format!(
                        "key {}: values must be empty for {:?}",
                        key, operator
                    )));
                }
            }
        }

        for value in &values {
            validate_value(key, value)?;
        }

        Ok(Self {
            key: key.to_string(),
            operator,
            values,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn values(&self) -> &BTreeSet<String> {
        &self.values
    }

    /// Whether the given label set satisfies this requirement
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        let value = labels.get(&self.key);
        match self.operator {
            Operator::Equals | Operator::In => value.is_some_and(|v| self.values.contains(v)),
            // absent key satisfies NotIn
            Operator::NotIn => value.map_or(true, |v| !self.values.contains(v)),
            Operator::Exists => value.is_some(),
            Operator::DoesNotExist => value.is_none(),
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = || self.values.iter().cloned().collect::<Vec<_>>().join(",");
        match self.operator {
            Operator::Equals => write!(f, "{}={}", self.key, joined()),
            Operator::In => write!(f, "{} in ({})", self.key, joined()),
            Operator::NotIn => write!(f, "{} notin ({})", self.key, joined()),
            Operator::Exists => write!(f, "{}", self.key),
            Operator::DoesNotExist => write!(f, "!{}", self.key),
        }
    }
}

/// Conjunction of requirements; empty matches everything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selector {
    requirements: Vec<Requirement>,
}

impl Selector {
    /// Selector that matches every label set
    pub fn everything() -> Self {
        Self::default()
    }

    /// Build a selector from requirements, sorted by key
    pub fn from_requirements(mut requirements: Vec<Requirement>) -> Self {
        requirements.sort_by(|a, b| a.key.cmp(&b.key).then(a.operator.cmp(&b.operator)));
        Self { requirements }
    }

    pub fn is_everything(&self) -> bool {
        self.requirements.is_empty()
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    /// Whether the given label set satisfies every requirement
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.requirements.iter().all(|r| r.matches(labels))
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, requirement) in self.requirements.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", requirement)?;
        }
        Ok(())
    }
}

/// Convert a placement label selector into a registry query predicate.
///
/// A missing selector and an empty selector both match everything.
pub fn label_selector_as_selector(selector: Option<&LabelSelector>) -> ClusterPlaceResult<Selector> {
    let Some(selector) = selector else {
        return Ok(Selector::everything());
    };

    let mut requirements =
        Vec::with_capacity(selector.match_labels.len() + selector.match_expressions.len());

    for (key, value) in &selector.match_labels {
        requirements.push(Requirement::new(key, Operator::Equals, [value.as_str()])?);
    }

    for expr in &selector.match_expressions {
        let operator: Operator = expr.operator.parse()?;
        requirements.push(Requirement::new(
            &expr.key,
            operator,
            expr.values.iter().map(String::as_str),
        )?);
    }

    Ok(Selector::from_requirements(requirements))
}

fn validate_key(key: &str) -> ClusterPlaceResult<()> {
    let (prefix, name) = match key.split_once('/') {
        Some((prefix, name)) => (Some(prefix), name),
        None => (None, key),
    };

    if let Some(prefix) = prefix {
        if prefix.is_empty() || prefix.len() > MAX_PREFIX_LEN || !is_dns_subdomain(prefix) {
            return Err(ClusterPlaceError::InvalidSelector(format!(
                "key {:?}: prefix must be a DNS subdomain",
                key
            )));
        }
    }

    if name.is_empty() || name.len() > MAX_NAME_LEN || !is_label_token(name) {
        return Err(ClusterPlaceError::InvalidSelector(format!(
            "key {:?}: name part must be 1-{} alphanumeric characters, '-', '_' or '.'",
            key, MAX_NAME_LEN
        )));
    }

    Ok(())
}

fn validate_value(key: &str, value: &str) -> ClusterPlaceResult<()> {
    if value.is_empty() {
        return Ok(());
    }
    if value.len() > MAX_NAME_LEN || !is_label_token(value) {
        return Err(ClusterPlaceError::InvalidSelector(format!(
            "key {}: invalid label value {:?}",
            key, value
        )));
    }
    Ok(())
}

/// Alphanumeric at both ends, `-`, `_`, `.` allowed inside
fn is_label_token(s: &str) -> bool {
    let bytes = s.as_bytes();
    let (Some(first), Some(last)) = (bytes.first(), bytes.last()) else {
        return false;
    };
    first.is_ascii_alphanumeric()
        && last.is_ascii_alphanumeric()
        && bytes
            .iter()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
}

fn is_dns_subdomain(s: &str) -> bool {
    s.split('.').all(|part| {
        let bytes = part.as_bytes();
        match (bytes.first(), bytes.last()) {
            (Some(first), Some(last)) => {
                (first.is_ascii_lowercase() || first.is_ascii_digit())
                    && (last.is_ascii_lowercase() || last.is_ascii_digit())
                    && bytes
                        .iter()
                        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
            }
            _ => false,
        }
    })
}
