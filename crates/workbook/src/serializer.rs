//! Serializer - node graph back to an element tree and XML bytes
//!
//! Two steps, both iterative so deep documents cannot exhaust the stack:
//! - `to_tree` walks the node arena with a work stack of
//!   (node, output element) pairs and rebuilds an `XmlTree`
//! - `write` emits the tree with a declaration and indentation
//!
//! The root is rebuilt from its tag and attributes only. Below it, text is
//! carried over verbatim unless it is indentation: text containing a
//! newline that does not start a content line is dropped. The output is
//! re-indented anyway, so keeping it would only stack whitespace up on every
//! save.

use crate::arena::NodeArena;
use crate::error::Result;
use crate::types::XmlNode;
use crate::utils;
use crate::xml::{ElementId, XmlElement, XmlTree};
use lazy_static::lazy_static;
use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::name::QName;
use quick_xml::Writer;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::io::Write;

lazy_static! {
    /// Newline, indentation, then a word character: text that happens to
    /// start on its own line
    static ref CONTENT_LINE_RE: Regex = Regex::new(r"^\n\s+\w").unwrap();
}

/// True if `text` opens with an indented content line
pub fn is_content_line(text: &str) -> bool {
    CONTENT_LINE_RE.is_match(text)
}

/// Whether captured text survives serialization
pub fn keeps_text(text: &str) -> bool {
    !text.is_empty() && (is_content_line(text) || !text.contains('\n'))
}

/// Serializer configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerializerConfig {
    /// Indent width per level; 0 writes everything on one line
    pub indent_size: usize,
    pub use_tabs: bool,
    /// Emit `<?xml version="1.0" encoding="utf-8"?>`
    pub declaration: bool,
}

impl Default for SerializerConfig {
    fn default() -> Self {
        Self {
            indent_size: 2,
            use_tabs: false,
            declaration: true,
        }
    }
}

pub struct XmlSerializer {
    config: SerializerConfig,
}

enum Step {
    Open(ElementId),
    Close(ElementId),
}

impl XmlSerializer {
    pub fn new() -> Self {
        Self::with_config(SerializerConfig::default())
    }

    pub fn with_config(config: SerializerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SerializerConfig {
        &self.config
    }

    /// Rebuild the element tree from the node graph
    pub fn to_tree(&self, arena: &NodeArena) -> Result<XmlTree> {
        let root = arena.root()?;
        // The root carries tag and attributes only
        let mut tree = XmlTree::new(XmlElement::new(root.tag.clone(), root.attributes.clone()));
        let mut stack = vec![(root.node_id, tree.root_id())];

        while let Some((node_id, element_id)) = stack.pop() {
            for &child_id in arena.get(node_id)?.children_ids() {
                let child = arena.get(child_id)?;
                let child_element = tree.append(element_id, output_element(child))?;
                stack.push((child_id, child_element));
            }
        }

        Ok(tree)
    }

    /// Write `tree` as XML
    pub fn write<W: Write>(&self, tree: &XmlTree, out: W) -> Result<()> {
        let mut writer = if self.config.indent_size == 0 {
            Writer::new(out)
        } else {
            let indent_char = if self.config.use_tabs { b'\t' } else { b' ' };
            Writer::new_with_indent(out, indent_char, self.config.indent_size)
        };

        if self.config.declaration {
            writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
        }

        let mut stack = vec![Step::Open(tree.root_id())];
        while let Some(step) = stack.pop() {
            match step {
                Step::Open(id) => {
                    let element = tree.get(id)?;
                    let start = start_tag(element);

                    if element.children.is_empty() && element.text.is_none() {
                        writer.write_event(Event::Empty(start))?;
                        continue;
                    }

                    writer.write_event(Event::Start(start))?;
                    if let Some(text) = &element.text {
                        writer.write_event(Event::Text(BytesText::new(text)))?;
                    }

                    stack.push(Step::Close(id));
                    for &child in element.children.iter().rev() {
                        stack.push(Step::Open(child));
                    }
                }
                Step::Close(id) => {
                    let element = tree.get(id)?;
                    writer.write_event(Event::End(BytesEnd::new(element.tag.as_str())))?;
                }
            }
        }

        writer.get_mut().write_all(b"\n")?;
        Ok(())
    }

    pub fn to_bytes(&self, tree: &XmlTree) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(tree.len() * 64);
        self.write(tree, &mut out)?;
        Ok(out)
    }
}

impl Default for XmlSerializer {
    fn default() -> Self {
        Self::new()
    }
}

fn output_element(node: &XmlNode) -> XmlElement {
    let mut element = XmlElement::new(node.tag.clone(), node.attributes.clone());
    element.text = node.text.as_deref().filter(|t| keeps_text(t)).map(String::from);
    element
}

fn start_tag(element: &XmlElement) -> BytesStart<'_> {
    let mut start = BytesStart::new(element.tag.as_str());
    for (key, value) in &element.attributes {
        let value = match utils::escape_attribute(value) {
            Cow::Borrowed(s) => Cow::Borrowed(s.as_bytes()),
            Cow::Owned(s) => Cow::Owned(s.into_bytes()),
        };
        start.push_attribute(Attribute {
            key: QName(key.as_bytes()),
            value,
        });
    }
    start
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::TreeBuilder;
    use crate::naming::NamingConfig;

    fn build(xml: &str) -> NodeArena {
        let tree = XmlTree::parse(xml.as_bytes()).unwrap();
        TreeBuilder::new(&NamingConfig::default()).build(&tree).unwrap()
    }

    fn non_blank_lines(bytes: &[u8]) -> Vec<String> {
        String::from_utf8(bytes.to_vec())
            .unwrap()
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_content_line_predicate() {
        assert!(is_content_line("\n    hello"));
        assert!(is_content_line("\n\t\tSUM([Sales])"));
        assert!(!is_content_line("\n    "));
        assert!(!is_content_line("\nhello"));
        assert!(!is_content_line("hello\n  world"));
        assert!(!is_content_line(""));
    }

    #[test]
    fn test_keeps_text() {
        assert!(keeps_text("[Sales]"));
        assert!(keeps_text("   "));
        assert!(keeps_text("\n    hello"));
        assert!(!keeps_text("\n    "));
        assert!(!keeps_text("\n"));
        assert!(!keeps_text("value\nwith break"));
        assert!(!keeps_text(""));
    }

    #[test]
    fn test_to_tree_preserves_order_and_attributes() {
        let arena = build(
            r#"<r z='1' a='2'>
                 <b x='1'/>
                 <a/>
                 <b x='2'><c/><d/></b>
               </r>"#,
        );
        let tree = XmlSerializer::new().to_tree(&arena).unwrap();

        let tags: Vec<&str> = tree.iter_preorder().map(|e| e.tag.as_str()).collect();
        assert_eq!(tags, vec!["r", "b", "a", "b", "c", "d"]);

        let keys: Vec<&str> = tree.root().attributes.keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["z", "a"]);
        assert_eq!(tree.root().text, None);
    }

    #[test]
    fn test_text_heuristic_applied() {
        let arena = build("<r><keep>[Sales]</keep><line>\n    total</line><indent>\n    <x/>\n  </indent></r>");
        let tree = XmlSerializer::new().to_tree(&arena).unwrap();
        let texts: Vec<Option<&str>> = tree
            .children(tree.root_id())
            .unwrap()
            .map(|e| e.text.as_deref())
            .collect();

        assert_eq!(texts, vec![Some("[Sales]"), Some("\n    total"), None]);
    }

    #[test]
    fn test_crlf_content_line_survives() {
        let arena = build("<r>\r\n  <a>\r\n    total</a>\r\n  <b>\r\n  </b>\r\n</r>");
        let tree = XmlSerializer::new().to_tree(&arena).unwrap();
        let texts: Vec<Option<&str>> = tree
            .children(tree.root_id())
            .unwrap()
            .map(|e| e.text.as_deref())
            .collect();

        assert_eq!(texts, vec![Some("\n    total"), None]);
    }

    #[test]
    fn test_root_text_not_written() {
        let arena = build("<r>heading<a>kept</a></r>");
        let tree = XmlSerializer::new().to_tree(&arena).unwrap();

        assert_eq!(arena.root().unwrap().text.as_deref(), Some("heading"));
        assert_eq!(tree.root().text, None);
        assert_eq!(tree.children(0).unwrap().next().unwrap().text.as_deref(), Some("kept"));
    }

    #[test]
    fn test_write_pretty_printed() {
        let arena = build(r#"<r a="1"><b>hi</b><c/></r>"#);
        let serializer = XmlSerializer::new();
        let tree = serializer.to_tree(&arena).unwrap();
        let bytes = serializer.to_bytes(&tree).unwrap();

        assert_eq!(
            non_blank_lines(&bytes),
            vec![
                r#"<?xml version="1.0" encoding="utf-8"?>"#,
                r#"<r a="1">"#,
                "  <b>hi</b>",
                "  <c/>",
                "</r>",
            ]
        );
        assert!(bytes.ends_with(b"\n"));
    }

    #[test]
    fn test_write_without_declaration_or_indent() {
        let arena = build("<r><b/></r>");
        let serializer = XmlSerializer::with_config(SerializerConfig {
            indent_size: 0,
            use_tabs: false,
            declaration: false,
        });
        let tree = serializer.to_tree(&arena).unwrap();
        let bytes = serializer.to_bytes(&tree).unwrap();

        assert_eq!(String::from_utf8(bytes).unwrap(), "<r><b/></r>\n");
    }

    #[test]
    fn test_write_escapes_and_reparses() {
        let arena = build(
            r#"<column><calc formula='IF [A] &lt; 1 THEN &quot;x&quot;&#13;&#10;END'>a &amp; b</calc></column>"#,
        );
        let serializer = XmlSerializer::new();
        let tree = serializer.to_tree(&arena).unwrap();
        let bytes = serializer.to_bytes(&tree).unwrap();

        let reparsed = XmlTree::parse(&bytes).unwrap();
        let calc = reparsed.children(0).unwrap().next().unwrap();
        assert_eq!(calc.attr("formula"), Some("IF [A] < 1 THEN \"x\"\r\nEND"));
        assert_eq!(calc.text.as_deref(), Some("a & b"));
    }

    #[test]
    fn test_mutation_is_serialized() {
        let mut arena = build("<r><column caption='Old'/></r>");
        let root = arena.root_id().unwrap();
        let column = arena.child(root, "column").unwrap();
        arena.set_attribute(column, "caption", "New").unwrap();
        arena.set_text(column, Some("note".to_string())).unwrap();

        let tree = XmlSerializer::new().to_tree(&arena).unwrap();
        let out = tree.children(0).unwrap().next().unwrap();
        assert_eq!(out.attr("caption"), Some("New"));
        assert_eq!(out.text.as_deref(), Some("note"));
    }

    #[test]
    fn test_promoted_attributes_not_serialized() {
        let arena = build("<column><calculation formula='1'/></column>");
        let tree = XmlSerializer::new().to_tree(&arena).unwrap();
        assert!(tree.root().attributes.is_empty());
    }

    #[test]
    fn test_deep_tree_is_iterative() {
        let depth = 2_000;
        let mut tree = XmlTree::new(XmlElement::new("n", Default::default()));
        let mut parent = tree.root_id();
        for _ in 0..depth {
            parent = tree
                .append(parent, XmlElement::new("n", Default::default()))
                .unwrap();
        }

        let bytes = XmlSerializer::new().to_bytes(&tree).unwrap();
        let reparsed = XmlTree::parse(&bytes).unwrap();
        assert_eq!(reparsed.len(), depth + 1);
    }
}
