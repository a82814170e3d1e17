//! Document - the root aggregate and main entry point
//!
//! Owns the node arena and the shortcut registry. Loading is
//! `bytes → XmlTree → TreeBuilder → Document`, saving goes back through the
//! serializer.
//!
//! Field access on the document checks shortcuts first, then the root
//! node's own fields:
//!
//! ```no_run
//! use workbook::Document;
//!
//! let doc = Document::load("sample.twb")?;
//! let formula = doc.value("sample_eu_superstore.profit_ratio.formula")?;
//! # Ok::<(), workbook::WorkbookError>(())
//! ```

use crate::arena::NodeArena;
use crate::builder::TreeBuilder;
use crate::calculations::{self, Calculations};
use crate::error::{Result, WorkbookError};
use crate::naming::NamingConfig;
use crate::serializer::{SerializerConfig, XmlSerializer};
use crate::shortcuts::{self, ShortcutMap, ShortcutTable};
use crate::types::{Field, NodeId, XmlNode};
use crate::xml::XmlTree;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// How shortcuts are populated at load time
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShortcutMode {
    /// Publish the children of the shortcut collection
    #[default]
    Auto,
    Disabled,
    /// Apply a precomputed table
    Table(ShortcutTable),
}

/// Configuration for loading a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadOptions {
    pub naming: NamingConfig,
    pub shortcuts: ShortcutMode,
    /// Root field whose children become shortcuts in `Auto` mode
    pub shortcut_collection: String,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            naming: NamingConfig::default(),
            shortcuts: ShortcutMode::Auto,
            shortcut_collection: "datasources".to_string(),
        }
    }
}

impl LoadOptions {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[derive(Debug)]
pub struct Document {
    arena: NodeArena,
    shortcuts: ShortcutMap,
    options: LoadOptions,
}

impl Document {
    /// Load a document from disk with default options
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::load_with(path, LoadOptions::default())
    }

    pub fn load_with(path: impl AsRef<Path>, options: LoadOptions) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let document = Self::from_bytes_with(&bytes, options)?;

        tracing::info!(
            "Loaded {} ({} nodes, {} shortcuts)",
            path.display(),
            document.arena.len(),
            document.shortcuts.len()
        );
        Ok(document)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_bytes_with(bytes, LoadOptions::default())
    }

    pub fn from_bytes_with(bytes: &[u8], options: LoadOptions) -> Result<Self> {
        let tree = XmlTree::parse(bytes)?;
        Self::from_tree(&tree, options)
    }

    /// Build the node graph for an already parsed tree
    pub fn from_tree(tree: &XmlTree, options: LoadOptions) -> Result<Self> {
        let arena = TreeBuilder::new(&options.naming).build(tree)?;
        let mut document = Self {
            arena,
            shortcuts: ShortcutMap::new(),
            options,
        };

        match document.options.shortcuts.clone() {
            ShortcutMode::Auto => {
                shortcuts::build_shortcuts(&mut document, None)?;
            }
            ShortcutMode::Table(table) => {
                shortcuts::build_shortcuts(&mut document, Some(&table))?;
            }
            ShortcutMode::Disabled => {}
        }

        Ok(document)
    }

    /// Get reference to internal arena
    pub fn arena(&self) -> &NodeArena {
        &self.arena
    }

    /// Get mutable reference to internal arena
    pub fn arena_mut(&mut self) -> &mut NodeArena {
        &mut self.arena
    }

    pub fn options(&self) -> &LoadOptions {
        &self.options
    }

    pub fn root_id(&self) -> Result<NodeId> {
        Ok(self.arena.root()?.node_id)
    }

    pub fn root(&self) -> Result<&XmlNode> {
        self.arena.root()
    }

    pub fn get(&self, node_id: NodeId) -> Result<&XmlNode> {
        self.arena.get(node_id)
    }

    pub fn shortcuts(&self) -> &ShortcutMap {
        &self.shortcuts
    }

    pub(crate) fn set_shortcuts(&mut self, shortcuts: ShortcutMap) {
        self.shortcuts = shortcuts;
    }

    /// Document-level field: a shortcut, else a field of the root node
    pub fn field(&self, name: &str) -> Result<Field<'_>> {
        if let Some(&node_id) = self.shortcuts.get(name) {
            return Ok(Field::Node(node_id));
        }
        self.arena.field(self.root_id()?, name)
    }

    /// Document-level field that must be a node
    pub fn node(&self, name: &str) -> Result<NodeId> {
        let field = self.field(name)?;
        field.as_node().ok_or_else(|| WorkbookError::FieldKind {
            tag: self.root().map(|r| r.tag.clone()).unwrap_or_default(),
            name: name.to_string(),
            expected: "a node",
            actual: field.kind(),
        })
    }

    /// Follow a dotted field path, e.g. `sales.profit_ratio.formula`
    ///
    /// The first segment is resolved on the document, the rest on the node
    /// reached so far.
    pub fn lookup(&self, path: &str) -> Result<Field<'_>> {
        self.walk(path).map(|(_, field)| field)
    }

    pub fn lookup_node(&self, path: &str) -> Result<NodeId> {
        let (owner, field) = self.walk(path)?;
        field.as_node().ok_or_else(|| WorkbookError::FieldKind {
            tag: self.tag_of(owner),
            name: path.to_string(),
            expected: "a node",
            actual: field.kind(),
        })
    }

    /// String value at a dotted field path
    pub fn value(&self, path: &str) -> Result<&str> {
        let (owner, field) = self.walk(path)?;
        field.as_str().ok_or_else(|| WorkbookError::FieldKind {
            tag: self.tag_of(owner),
            name: path.to_string(),
            expected: "an attribute",
            actual: field.kind(),
        })
    }

    /// Resolve `path`, returning the field and the node it was read from
    fn walk(&self, path: &str) -> Result<(NodeId, Field<'_>)> {
        let mut segments = path.split('.');
        let first = segments.next().unwrap_or_default();

        let mut owner = self.root_id()?;
        let mut owner_name = first;
        let mut field = self.field(first)?;

        for segment in segments {
            let node_id = field.as_node().ok_or_else(|| WorkbookError::FieldKind {
                tag: self.tag_of(owner),
                name: owner_name.to_string(),
                expected: "a node",
                actual: field.kind(),
            })?;
            owner = node_id;
            owner_name = segment;
            field = self.arena.field(node_id, segment)?;
        }

        Ok((owner, field))
    }

    fn tag_of(&self, node_id: NodeId) -> String {
        self.arena
            .get(node_id)
            .map(|node| node.tag.clone())
            .unwrap_or_default()
    }

    /// Set an attribute on the node at a dotted path
    pub fn set_attribute(
        &mut self,
        path: &str,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Option<String>> {
        let node_id = self.lookup_node(path)?;
        self.arena.set_attribute(node_id, name, value)
    }

    /// Nodes at an absolute structural path such as `/workbook/datasources/datasource`
    pub fn locate(&self, xpath: &str) -> Vec<NodeId> {
        self.arena.find_by_xpath(xpath)
    }

    pub fn calculations(&self) -> Calculations {
        calculations::extract_calculations(self)
    }

    /// Rebuild the element tree from the current node graph
    pub fn to_tree(&self) -> Result<XmlTree> {
        XmlSerializer::new().to_tree(&self.arena)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let serializer = XmlSerializer::new();
        serializer.to_bytes(&serializer.to_tree(&self.arena)?)
    }

    /// Write the document to `path`, returns the tree that was written
    pub fn save(&self, path: impl AsRef<Path>) -> Result<XmlTree> {
        self.save_with(path, SerializerConfig::default())
    }

    pub fn save_with(&self, path: impl AsRef<Path>, config: SerializerConfig) -> Result<XmlTree> {
        let path = path.as_ref();
        let serializer = XmlSerializer::with_config(config);
        let tree = serializer.to_tree(&self.arena)?;
        let bytes = serializer.to_bytes(&tree)?;
        std::fs::write(path, &bytes)?;

        tracing::info!(
            "Saved {} ({} elements, {} bytes)",
            path.display(),
            tree.len(),
            bytes.len()
        );
        Ok(tree)
    }
}

impl FromStr for Document {
    type Err = WorkbookError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_bytes(s.as_bytes())
    }
}
