//! Shortcut registry - selected nodes republished on the document itself
//!
//! By default the named children of the `datasources` collection become
//! document-level fields, so `doc.lookup("sales.profit_ratio")` works without
//! spelling out `datasources.sales...`.
//!
//! A `ShortcutTable` stores shortcuts as field paths (reference names from
//! the root) rather than node ids, so a table captured from one document can
//! be saved as JSON and applied to the next structurally similar one.

use crate::document::Document;
use crate::error::Result;
use crate::types::NodeId;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Shortcut name → node, in publication order
pub type ShortcutMap = IndexMap<String, NodeId>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShortcutTable {
    entries: IndexMap<String, Vec<String>>,
}

impl ShortcutTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `name` pointing at the node reached by `path` from the root
    pub fn insert<I, S>(&mut self, name: impl Into<String>, path: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entries
            .insert(name.into(), path.into_iter().map(Into::into).collect());
    }

    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.entries.get(name).map(|p| p.as_slice())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Table reproducing the document's current shortcuts
    ///
    /// Shortcuts whose node is not reachable by field path (its name was
    /// taken over by a later sibling) are left out.
    pub fn capture(document: &Document) -> Result<Self> {
        let arena = document.arena();
        let root_id = document.root_id()?;
        let mut table = Self::new();

        for (name, &node_id) in document.shortcuts() {
            let path = arena.field_path(node_id)?;
            match arena.navigate(root_id, path.iter().map(String::as_str)) {
                Ok(found) if found == node_id => table.insert(name.clone(), path),
                _ => tracing::debug!("Shortcut '{}' has no stable field path, skipped", name),
            }
        }

        Ok(table)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn read_from(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

/// Populate and install the document's shortcuts
///
/// Without a table the children of the configured collection are
/// discovered; with one, the table is applied as given.
pub fn build_shortcuts(document: &mut Document, table: Option<&ShortcutTable>) -> Result<ShortcutMap> {
    let shortcuts = match table {
        Some(table) => apply_table(document, table)?,
        None => discover(document)?,
    };

    document.set_shortcuts(shortcuts.clone());
    Ok(shortcuts)
}

fn discover(document: &Document) -> Result<ShortcutMap> {
    let arena = document.arena();
    let root_id = document.root_id()?;
    let collection_name = document.options().shortcut_collection.as_str();
    let mut shortcuts = ShortcutMap::new();

    let collection_id = match arena.child(root_id, collection_name) {
        Ok(id) => id,
        Err(err) => {
            tracing::debug!("No shortcut collection '{}': {}", collection_name, err);
            return Ok(shortcuts);
        }
    };

    let collection = arena.get(collection_id)?;
    for &child_id in collection.children_ids() {
        let child = arena.get(child_id)?;
        // Only the sibling currently holding the name is reachable
        if collection.named_child(child.reference_name()) == Some(child_id) {
            shortcuts.insert(child.reference_name().to_string(), child_id);
        }
    }

    Ok(shortcuts)
}

fn apply_table(document: &Document, table: &ShortcutTable) -> Result<ShortcutMap> {
    let arena = document.arena();
    let root_id = document.root_id()?;
    let mut shortcuts = ShortcutMap::with_capacity(table.len());

    for (name, path) in table.iter() {
        match arena.navigate(root_id, path.iter().map(String::as_str)) {
            Ok(node_id) => {
                shortcuts.insert(name.to_string(), node_id);
            }
            Err(err) => {
                tracing::warn!("Shortcut '{}' ({}) not found: {}", name, path.join("."), err);
            }
        }
    }

    Ok(shortcuts)
}
