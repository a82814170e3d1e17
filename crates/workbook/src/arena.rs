//! Arena-based node storage
//!
//! Every node lives in one `Vec<XmlNode>`. Parents own their children by
//! index; a child's `parent_id` is a plain index back, never an owner.
//!
//! ```text
//! Arena: Vec<XmlNode>
//!        [workbook][datasources][datasource]...
//!         ↑ 4-byte index, not a pointer
//! ```
//!
//! Field lookup goes through explicit tables: a node's named children, then
//! its own attributes, then attributes promoted from its sole child.

use crate::error::{Result, WorkbookError};
use crate::types::{Attachment, Field, NodeId, XmlNode};

#[derive(Debug)]
pub struct NodeArena {
    /// All nodes in creation (pre-order) sequence
    nodes: Vec<XmlNode>,

    /// Root node ID (if set)
    root_id: Option<NodeId>,
}

impl NodeArena {
    /// Create a new empty arena
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    /// Create arena with specific capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
            root_id: None,
        }
    }

    /// Add a node to the arena, returns its ID
    ///
    /// The node's `node_id` is overwritten with its slot index.
    pub fn add_node(&mut self, mut node: XmlNode) -> NodeId {
        let node_id = self.nodes.len() as NodeId;
        node.node_id = node_id;
        self.nodes.push(node);
        node_id
    }

    /// Get node by ID (immutable)
    pub fn get(&self, node_id: NodeId) -> Result<&XmlNode> {
        self.nodes
            .get(node_id as usize)
            .ok_or(WorkbookError::NodeNotFound(node_id))
    }

    /// Get node by ID (mutable)
    pub fn get_mut(&mut self, node_id: NodeId) -> Result<&mut XmlNode> {
        self.nodes
            .get_mut(node_id as usize)
            .ok_or(WorkbookError::NodeNotFound(node_id))
    }

    /// Set root node
    pub fn set_root(&mut self, node_id: NodeId) -> Result<()> {
        self.get(node_id)?;
        self.root_id = Some(node_id);
        Ok(())
    }

    pub fn root_id(&self) -> Option<NodeId> {
        self.root_id
    }

    pub fn root(&self) -> Result<&XmlNode> {
        let root_id = self
            .root_id
            .ok_or_else(|| WorkbookError::Malformed("No root node set".to_string()))?;
        self.get(root_id)
    }

    /// Total number of nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterator over all nodes
    pub fn iter(&self) -> impl Iterator<Item = &XmlNode> {
        self.nodes.iter()
    }

    /// Parent of a node
    pub fn parent(&self, node_id: NodeId) -> Result<Option<&XmlNode>> {
        let node = self.get(node_id)?;
        match node.parent_id {
            Some(parent_id) => Ok(Some(self.get(parent_id)?)),
            None => Ok(None),
        }
    }

    /// Append `child_id` to its parent's child list
    pub(crate) fn push_child(&mut self, parent_id: NodeId, child_id: NodeId) -> Result<()> {
        self.get_mut(parent_id)?.children_ids.push(child_id);
        Ok(())
    }

    /// Publish a node on its parent under its reference name
    ///
    /// A node that already holds the name is replaced (last write wins). It
    /// stays in the parent's child list; only the name moves.
    pub fn attach(&mut self, node_id: NodeId) -> Result<Attachment> {
        let node = self.get(node_id)?;
        let parent_id = match node.parent_id {
            Some(parent_id) => parent_id,
            None => {
                if self.root_id.is_none() || self.root_id == Some(node_id) {
                    return Ok(Attachment::Root);
                }
                tracing::warn!("<{}> has no parent, not attached", node.tag);
                return Ok(Attachment::Orphan);
            }
        };

        let name = node.reference_name.clone();
        let parent = self.get_mut(parent_id)?;
        let replaced = parent.named_children.insert(name.clone(), node_id);

        if let Some(previous) = replaced {
            tracing::debug!(
                "<{}> field '{}' now refers to node {} (was {})",
                parent.tag,
                name,
                node_id,
                previous
            );
        }

        Ok(Attachment::Attached { replaced })
    }

    /// Expose the sole child's attribute names on its parent
    ///
    /// Only for nodes with exactly one child. Names the parent already
    /// defines are left alone. Returns how many names were promoted.
    pub fn promote_sole_child(&mut self, node_id: NodeId) -> Result<usize> {
        let node = self.get(node_id)?;
        let child_id = match node.children_ids.as_slice() {
            [only] => *only,
            _ => return Ok(0),
        };

        let child = self.get(child_id)?;
        let promoted: Vec<String> = child
            .attributes
            .keys()
            .filter(|name| !node.defines(name))
            .cloned()
            .collect();

        let count = promoted.len();
        self.get_mut(node_id)?.promoted.extend(promoted);
        Ok(count)
    }

    /// Look up a field on a node
    pub fn field(&self, node_id: NodeId, name: &str) -> Result<Field<'_>> {
        let node = self.get(node_id)?;

        if let Some(child_id) = node.named_child(name) {
            return Ok(Field::Node(child_id));
        }

        if let Some(value) = node.attr(name) {
            return Ok(Field::Attribute(value));
        }

        if node.is_promoted(name) {
            if let Some(&child_id) = node.children_ids.first() {
                if let Some(value) = self.get(child_id)?.attr(name) {
                    return Ok(Field::Promoted(value));
                }
            }
        }

        Err(WorkbookError::FieldNotFound {
            tag: node.tag.clone(),
            name: name.to_string(),
        })
    }

    /// String value of an attribute field (own or promoted)
    pub fn value(&self, node_id: NodeId, name: &str) -> Result<&str> {
        match self.field(node_id, name) {
            Ok(field) => field.as_str().ok_or_else(|| WorkbookError::FieldKind {
                tag: self.nodes[node_id as usize].tag.clone(),
                name: name.to_string(),
                expected: "an attribute",
                actual: field.kind(),
            }),
            Err(WorkbookError::FieldNotFound { tag, name }) => {
                Err(WorkbookError::AttributeMissing {
                    tag,
                    attribute: name,
                })
            }
            Err(err) => Err(err),
        }
    }

    /// Named child of a node
    pub fn child(&self, node_id: NodeId, name: &str) -> Result<NodeId> {
        let field = self.field(node_id, name)?;
        field.as_node().ok_or_else(|| WorkbookError::FieldKind {
            tag: self.nodes[node_id as usize].tag.clone(),
            name: name.to_string(),
            expected: "a node",
            actual: field.kind(),
        })
    }

    /// Follow a chain of reference names from `start`
    pub fn navigate<'a, I>(&self, start: NodeId, path: I) -> Result<NodeId>
    where
        I: IntoIterator<Item = &'a str>,
    {
        path.into_iter()
            .try_fold(start, |current, name| self.child(current, name))
    }

    /// Reference names from the root down to `node_id` (root excluded)
    pub fn field_path(&self, node_id: NodeId) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut current = self.get(node_id)?;

        while let Some(parent_id) = current.parent_id {
            names.push(current.reference_name.clone());
            current = self.get(parent_id)?;
        }

        names.reverse();
        Ok(names)
    }

    /// Tags from the root down to `node_id`
    pub fn tag_path(&self, node_id: NodeId) -> Result<Vec<&str>> {
        let mut tags = Vec::new();
        let mut current_id = Some(node_id);

        while let Some(id) = current_id {
            let node = self.get(id)?;
            tags.push(node.tag.as_str());
            current_id = node.parent_id;
        }

        tags.reverse();
        Ok(tags)
    }

    /// Absolute structural path, e.g. `/workbook/datasources/datasource`
    pub fn xpath(&self, node_id: NodeId) -> Result<String> {
        Ok(format!("/{}", self.tag_path(node_id)?.join("/")))
    }

    /// All nodes whose structural path equals `xpath`, in document order
    pub fn find_by_xpath(&self, xpath: &str) -> Vec<NodeId> {
        let wanted: Vec<&str> = xpath.split('/').filter(|s| !s.is_empty()).collect();
        if wanted.is_empty() {
            return Vec::new();
        }

        self.find(|node| {
            node.tag == wanted[wanted.len() - 1]
                && self
                    .tag_path(node.node_id)
                    .map(|path| path == wanted)
                    .unwrap_or(false)
        })
    }

    /// Set an attribute, returns the previous value
    ///
    /// Does not rename the node or change its promoted names.
    pub fn set_attribute(
        &mut self,
        node_id: NodeId,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Option<String>> {
        let node = self.get_mut(node_id)?;
        Ok(node.attributes.insert(name.into(), value.into()))
    }

    pub fn remove_attribute(&mut self, node_id: NodeId, name: &str) -> Result<Option<String>> {
        let node = self.get_mut(node_id)?;
        Ok(node.attributes.shift_remove(name))
    }

    pub fn set_text(&mut self, node_id: NodeId, text: Option<String>) -> Result<()> {
        self.get_mut(node_id)?.text = text;
        Ok(())
    }

    /// Traverse tree depth-first (iterative, no recursion)
    pub fn traverse_df<F>(&self, start_id: NodeId, mut visit: F) -> Result<()>
    where
        F: FnMut(&XmlNode) -> Result<()>,
    {
        let mut stack = vec![start_id];

        while let Some(node_id) = stack.pop() {
            let node = self.get(node_id)?;
            visit(node)?;

            // Push children in reverse order (so they're visited left-to-right)
            for &child_id in node.children_ids.iter().rev() {
                stack.push(child_id);
            }
        }

        Ok(())
    }

    /// Find nodes matching predicate
    pub fn find<F>(&self, predicate: F) -> Vec<NodeId>
    where
        F: Fn(&XmlNode) -> bool,
    {
        self.nodes
            .iter()
            .filter(|node| predicate(node))
            .map(|node| node.node_id)
            .collect()
    }
}

impl Default for NodeArena {
    fn default() -> Self {
        Self::new()
    }
}
