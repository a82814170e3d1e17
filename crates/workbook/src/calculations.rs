//! Calculation extraction
//!
//! Every leaf that carries a `formula` is a calculation; its parent's
//! `caption` is the display name. The grandparent decides the bucket: a
//! parameter collection files it under `parameters`, anything else under
//! `data_sources`. Leaves of any other shape are skipped with a reason.
//! When two calculations share a display name, the first in document order
//! is kept.

use crate::arena::NodeArena;
use crate::document::Document;
use crate::naming::{CAPTION_ATTRIBUTE, NAME_ATTRIBUTE};
use crate::types::{NodeId, XmlNode};
use indexmap::IndexMap;
use serde::Serialize;

pub const FORMULA_ATTRIBUTE: &str = "formula";

/// Display name → formula, per bucket
#[derive(Debug, Clone, Default, Serialize)]
pub struct Calculations {
    pub parameters: IndexMap<String, String>,
    pub data_sources: IndexMap<String, String>,
    #[serde(skip)]
    pub skipped: Vec<SkippedLeaf>,
}

impl Calculations {
    /// `(parameter calculations, data source calculations)`
    pub fn into_parts(self) -> (IndexMap<String, String>, IndexMap<String, String>) {
        (self.parameters, self.data_sources)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedLeaf {
    pub node: NodeId,
    pub reason: SkipReason,
}

/// Why a leaf did not yield a calculation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    NoParent,
    NoGrandparent,
    MissingField { node: NodeId, field: String },
    /// The field exists but names a child node
    NotAnAttribute { node: NodeId, field: String },
}

enum Bucket {
    Parameters,
    DataSources,
}

pub fn extract_calculations(document: &Document) -> Calculations {
    let arena = document.arena();
    let marker = document.options().naming.parameter_collection.as_str();
    let mut calculations = Calculations::default();

    let Some(root_id) = arena.root_id() else {
        return calculations;
    };

    let walked = arena.traverse_df(root_id, |node| {
        if !node.is_leaf() {
            return Ok(());
        }

        match classify(arena, node, marker) {
            Ok((bucket, caption, formula)) => {
                let target = match bucket {
                    Bucket::Parameters => &mut calculations.parameters,
                    Bucket::DataSources => &mut calculations.data_sources,
                };
                if target.contains_key(&caption) {
                    tracing::debug!("Duplicate calculation '{}' ignored", caption);
                } else {
                    target.insert(caption, formula);
                }
            }
            Err(reason) => calculations.skipped.push(SkippedLeaf {
                node: node.node_id,
                reason,
            }),
        }
        Ok(())
    });

    if let Err(err) = walked {
        tracing::warn!("Calculation walk stopped early: {}", err);
    }

    tracing::debug!(
        "Extracted {} parameter and {} data source calculations ({} leaves skipped)",
        calculations.parameters.len(),
        calculations.data_sources.len(),
        calculations.skipped.len()
    );
    calculations
}

fn classify(
    arena: &NodeArena,
    leaf: &XmlNode,
    marker: &str,
) -> Result<(Bucket, String, String), SkipReason> {
    let parent_id = leaf.parent_id().ok_or(SkipReason::NoParent)?;
    let grandparent_id = arena
        .get(parent_id)
        .ok()
        .and_then(|parent| parent.parent_id())
        .ok_or(SkipReason::NoGrandparent)?;

    let is_parameter = match arena.field(grandparent_id, NAME_ATTRIBUTE) {
        Ok(field) => field.as_str() == Some(marker),
        Err(_) => {
            return Err(SkipReason::MissingField {
                node: grandparent_id,
                field: NAME_ATTRIBUTE.to_string(),
            })
        }
    };

    let caption = string_field(arena, parent_id, CAPTION_ATTRIBUTE)?;
    let formula = string_field(arena, leaf.node_id, FORMULA_ATTRIBUTE)?;

    let bucket = if is_parameter {
        Bucket::Parameters
    } else {
        Bucket::DataSources
    };
    Ok((bucket, caption, formula))
}

fn string_field(arena: &NodeArena, node: NodeId, field: &str) -> Result<String, SkipReason> {
    match arena.field(node, field) {
        Ok(value) => value
            .as_str()
            .map(String::from)
            .ok_or_else(|| SkipReason::NotAnAttribute {
                node,
                field: field.to_string(),
            }),
        Err(_) => Err(SkipReason::MissingField {
            node,
            field: field.to_string(),
        }),
    }
}
