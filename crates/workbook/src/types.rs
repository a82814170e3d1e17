//! Core type definitions for the workbook node graph
//!
//! Key design principles:
//! 1. Use u32 for indices (4 bytes vs 8 bytes pointer)
//! 2. Parents own children through the arena; children only hold an index back
//! 3. Use SmallVec for child lists (most elements have few children)
//! 4. Named children live in an explicit table, never in dynamic fields

use crate::naming::Resolution;
use ahash::AHashMap;
use indexmap::IndexMap;
use serde::Serialize;
use smallvec::SmallVec;

/// Node identifier (index into arena)
pub type NodeId = u32;

/// Element attributes in source order
pub type Attributes = IndexMap<String, String>;

/// One element of the document, wrapped with its naming metadata
#[derive(Debug, Clone, Serialize)]
pub struct XmlNode {
    pub node_id: NodeId,
    pub tag: String,
    pub attributes: Attributes,
    /// Leading text of the element (before its first child element)
    pub text: Option<String>,

    // Navigation indices
    pub(crate) parent_id: Option<NodeId>,
    pub(crate) children_ids: SmallVec<[NodeId; 4]>,

    /// Field namespace for children: reference name → child
    #[serde(skip)]
    pub(crate) named_children: AHashMap<String, NodeId>,

    // Fixed at construction
    pub(crate) reference_name: String,
    pub(crate) naming: Resolution,

    /// Attribute names exposed from the sole child
    pub(crate) promoted: SmallVec<[String; 4]>,
}

impl XmlNode {
    pub fn new(
        node_id: NodeId,
        tag: String,
        attributes: Attributes,
        text: Option<String>,
        parent_id: Option<NodeId>,
        naming: Resolution,
    ) -> Self {
        let reference_name = naming.reference_name();
        Self {
            node_id,
            tag,
            attributes,
            text,
            parent_id,
            children_ids: SmallVec::new(),
            named_children: AHashMap::new(),
            reference_name,
            naming,
            promoted: SmallVec::new(),
        }
    }

    /// Name this node is published under on its parent
    pub fn reference_name(&self) -> &str {
        &self.reference_name
    }

    /// How the reference name was chosen
    pub fn naming(&self) -> &Resolution {
        &self.naming
    }

    pub fn parent_id(&self) -> Option<NodeId> {
        self.parent_id
    }

    pub fn children_ids(&self) -> &[NodeId] {
        &self.children_ids
    }

    pub fn is_leaf(&self) -> bool {
        self.children_ids.is_empty()
    }

    /// Get attribute value
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(|s| s.as_str())
    }

    /// Named child registered under `name`
    pub fn named_child(&self, name: &str) -> Option<NodeId> {
        self.named_children.get(name).copied()
    }

    pub fn promoted_attributes(&self) -> &[String] {
        &self.promoted
    }

    pub fn is_promoted(&self, name: &str) -> bool {
        self.promoted.iter().any(|p| p == name)
    }

    /// True if `name` is already taken in this node's field namespace
    /// by an own attribute or a named child
    pub(crate) fn defines(&self, name: &str) -> bool {
        self.attributes.contains_key(name) || self.named_children.contains_key(name)
    }
}

/// Result of a field lookup on a node
///
/// Lookup order: named child, own attribute, promoted attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field<'a> {
    Node(NodeId),
    Attribute(&'a str),
    Promoted(&'a str),
}

impl<'a> Field<'a> {
    /// String value of an attribute field (own or promoted)
    pub fn as_str(&self) -> Option<&'a str> {
        match *self {
            Field::Attribute(value) | Field::Promoted(value) => Some(value),
            Field::Node(_) => None,
        }
    }

    pub fn as_node(&self) -> Option<NodeId> {
        match *self {
            Field::Node(id) => Some(id),
            _ => None,
        }
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Field::Node(_) => "a node",
            Field::Attribute(_) => "an attribute",
            Field::Promoted(_) => "a promoted attribute",
        }
    }
}

/// Result of publishing a node on its parent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attachment {
    /// The root has nothing to attach to
    Root,
    /// Published; `replaced` is the sibling that previously held the name
    Attached { replaced: Option<NodeId> },
    /// Not the root, but no parent either. Nothing was published.
    Orphan,
}
