//! Reference naming - which field name a node is published under
//!
//! Naming is a small ordered rule table evaluated against a capability query
//! (parent tag/attributes, own tag/attributes). The first rule that applies
//! wins. A rule that applies but lacks the attribute it needs does not abort
//! the build: the node falls back to its tag name and the resolution records
//! why.
//!
//! ```text
//! <datasource name='Parameters'>          → "parameters"      (Container, name)
//!   <column name='[Parameter 1]'>         → "parameter_1"     (Parameter)
//! <datasource caption='Sales'>            → "sales"           (Container, caption)
//!   <column name='[Calculation_1]'
//!           caption='Profit Ratio'>       → "profit_ratio"    (CalculatedField)
//!   <column name='[Region]'>              → "column"          (Default)
//! ```

use crate::types::Attributes;
use serde::{Deserialize, Serialize};

pub const NAME_ATTRIBUTE: &str = "name";
pub const CAPTION_ATTRIBUTE: &str = "caption";

/// Tags and markers the context rules key on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConfig {
    /// Grouping element whose fields get context names
    pub container_tag: String,
    /// Field element inside a container
    pub field_tag: String,
    /// `name` of a container that holds parameters
    pub parameter_collection: String,
    /// Substring of a field's `name` marking it as calculated
    pub calculation_marker: String,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            container_tag: "datasource".to_string(),
            field_tag: "column".to_string(),
            parameter_collection: "Parameters".to_string(),
            calculation_marker: "Calculation".to_string(),
        }
    }
}

/// Naming rules in precedence order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NamingRule {
    /// Field of a parameter collection: own `name`
    Parameter,
    /// Calculated field of a container: own `caption`
    CalculatedField,
    /// The container itself: `caption`, else `name`
    Container,
    /// Own tag
    Default,
}

pub const RULES: [NamingRule; 4] = [
    NamingRule::Parameter,
    NamingRule::CalculatedField,
    NamingRule::Container,
    NamingRule::Default,
];

/// Everything a rule may look at
#[derive(Debug, Clone, Copy)]
pub struct NamingQuery<'a> {
    pub parent_tag: Option<&'a str>,
    pub parent_attributes: Option<&'a Attributes>,
    pub tag: &'a str,
    pub attributes: &'a Attributes,
}

impl<'a> NamingQuery<'a> {
    pub fn root(tag: &'a str, attributes: &'a Attributes) -> Self {
        Self {
            parent_tag: None,
            parent_attributes: None,
            tag,
            attributes,
        }
    }

    pub fn child(
        parent_tag: &'a str,
        parent_attributes: &'a Attributes,
        tag: &'a str,
        attributes: &'a Attributes,
    ) -> Self {
        Self {
            parent_tag: Some(parent_tag),
            parent_attributes: Some(parent_attributes),
            tag,
            attributes,
        }
    }

    fn is_field_of_container(&self, config: &NamingConfig) -> bool {
        self.parent_tag == Some(config.container_tag.as_str()) && self.tag == config.field_tag
    }

    fn parent_is_parameter_collection(&self, config: &NamingConfig) -> bool {
        self.parent_attributes
            .and_then(|attrs| attrs.get(NAME_ATTRIBUTE))
            .is_some_and(|name| *name == config.parameter_collection)
    }

    fn own(&self, attribute: &str) -> Result<String, FallbackReason> {
        self.attributes
            .get(attribute)
            .cloned()
            .ok_or_else(|| FallbackReason::AttributeMissing {
                element: self.tag.to_string(),
                attribute: attribute.to_string(),
            })
    }
}

/// Why a rule could not produce a name
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum FallbackReason {
    AttributeMissing { element: String, attribute: String },
}

/// Outcome of naming a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Resolution {
    Named {
        rule: NamingRule,
        raw: String,
    },
    /// `attempted` applied but failed; the node is named by its tag
    Fallback {
        attempted: NamingRule,
        reason: FallbackReason,
        raw: String,
    },
}

impl Resolution {
    /// Raw (unnormalized) name
    pub fn raw(&self) -> &str {
        match self {
            Resolution::Named { raw, .. } | Resolution::Fallback { raw, .. } => raw,
        }
    }

    /// Rule that actually produced the name
    pub fn rule(&self) -> NamingRule {
        match self {
            Resolution::Named { rule, .. } => *rule,
            Resolution::Fallback { .. } => NamingRule::Default,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Resolution::Fallback { .. })
    }

    pub fn reference_name(&self) -> String {
        normalize(self.raw())
    }
}

impl NamingRule {
    /// `None` when the rule does not apply to the query
    pub fn evaluate(
        self,
        query: &NamingQuery<'_>,
        config: &NamingConfig,
    ) -> Option<Result<String, FallbackReason>> {
        match self {
            NamingRule::Parameter => {
                if !query.is_field_of_container(config)
                    || !query.parent_is_parameter_collection(config)
                {
                    return None;
                }
                Some(query.own(NAME_ATTRIBUTE))
            }
            NamingRule::CalculatedField => {
                if !query.is_field_of_container(config)
                    || query.parent_is_parameter_collection(config)
                {
                    return None;
                }
                match query.attributes.get(NAME_ATTRIBUTE) {
                    None => Some(query.own(NAME_ATTRIBUTE)),
                    Some(name) if name.contains(config.calculation_marker.as_str()) => {
                        Some(query.own(CAPTION_ATTRIBUTE))
                    }
                    Some(_) => None,
                }
            }
            NamingRule::Container => {
                if query.tag != config.container_tag {
                    return None;
                }
                Some(
                    query
                        .own(CAPTION_ATTRIBUTE)
                        .or_else(|_| query.own(NAME_ATTRIBUTE)),
                )
            }
            NamingRule::Default => Some(Ok(query.tag.to_string())),
        }
    }
}

/// Pick the raw name for a node
pub fn resolve(query: &NamingQuery<'_>, config: &NamingConfig) -> Resolution {
    for rule in RULES {
        match rule.evaluate(query, config) {
            None => continue,
            Some(Ok(raw)) => return Resolution::Named { rule, raw },
            Some(Err(reason)) => {
                tracing::debug!(
                    "Naming rule {:?} failed for <{}> ({:?}), using tag name",
                    rule,
                    query.tag,
                    reason
                );
                return Resolution::Fallback {
                    attempted: rule,
                    reason,
                    raw: query.tag.to_string(),
                };
            }
        }
    }

    Resolution::Named {
        rule: NamingRule::Default,
        raw: query.tag.to_string(),
    }
}

/// Raw label → snake_case reference name
///
/// Drops `[`, `]` and `-`, lowercases, and joins whitespace-separated words
/// with `_`. Idempotent.
pub fn normalize(raw: &str) -> String {
    let cleansed: String = raw
        .chars()
        .filter(|c| !matches!(c, '[' | ']' | '-'))
        .collect::<String>()
        .to_lowercase();

    cleansed.split_whitespace().collect::<Vec<_>>().join("_")
}
