//! Source element tree
//!
//! Plain element data (tag, attributes, leading text, children) in a flat
//! arena. It is what the reader produces from raw bytes and what the
//! serializer produces from a node graph, so a round trip is
//! `bytes → XmlTree → Document → XmlTree → bytes`.
//!
//! Only an element's leading text is kept. Text after a child element,
//! comments, processing instructions and DOCTYPE are dropped on read.

use crate::error::{Result, WorkbookError};
use crate::types::Attributes;
use crate::utils;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// Element index inside an `XmlTree`
pub type ElementId = usize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    pub tag: String,
    pub attributes: Attributes,
    pub text: Option<String>,
    pub children: Vec<ElementId>,
}

impl XmlElement {
    pub fn new(tag: impl Into<String>, attributes: Attributes) -> Self {
        Self {
            tag: tag.into(),
            attributes,
            text: None,
            children: Vec::new(),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(|s| s.as_str())
    }
}

/// Element tree; the root is always element 0
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlTree {
    elements: Vec<XmlElement>,
}

impl XmlTree {
    pub fn new(root: XmlElement) -> Self {
        Self {
            elements: vec![root],
        }
    }

    pub fn root_id(&self) -> ElementId {
        0
    }

    pub fn root(&self) -> &XmlElement {
        &self.elements[0]
    }

    pub fn get(&self, id: ElementId) -> Result<&XmlElement> {
        self.elements
            .get(id)
            .ok_or_else(|| WorkbookError::Malformed(format!("No element {}", id)))
    }

    pub(crate) fn get_mut(&mut self, id: ElementId) -> Result<&mut XmlElement> {
        self.elements
            .get_mut(id)
            .ok_or_else(|| WorkbookError::Malformed(format!("No element {}", id)))
    }

    /// Append `element` as the last child of `parent`
    pub fn append(&mut self, parent: ElementId, element: XmlElement) -> Result<ElementId> {
        let id = self.elements.len();
        self.get_mut(parent)?.children.push(id);
        self.elements.push(element);
        Ok(id)
    }

    pub fn children(&self, id: ElementId) -> Result<impl Iterator<Item = &XmlElement> + '_> {
        let element = self.get(id)?;
        Ok(element.children.iter().map(move |&c| &self.elements[c]))
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Elements in document (pre-order) order, root first
    pub fn iter_preorder(&self) -> impl Iterator<Item = &XmlElement> + '_ {
        let mut stack = vec![self.root_id()];
        std::iter::from_fn(move || {
            let id = stack.pop()?;
            let element = &self.elements[id];
            stack.extend(element.children.iter().rev());
            Some(element)
        })
    }

    /// Parse a whole document
    ///
    /// Fails on XML syntax errors, unbalanced tags, a missing root, or more
    /// than one root element.
    pub fn parse(input: &[u8]) -> Result<Self> {
        let mut reader = Reader::from_reader(input);
        reader.config_mut().trim_text(false);

        let mut tree: Option<XmlTree> = None;
        let mut open: Vec<ElementId> = Vec::new();
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(e) => {
                    let id = Self::open_element(&mut tree, &open, &e)?;
                    open.push(id);
                }
                Event::Empty(e) => {
                    Self::open_element(&mut tree, &open, &e)?;
                }
                Event::End(_) => {
                    open.pop().ok_or_else(|| {
                        WorkbookError::Malformed("Unbalanced closing tag".to_string())
                    })?;
                }
                Event::Text(e) => {
                    let text = e
                        .decode()
                        .map_err(|e| WorkbookError::Malformed(e.to_string()))?;
                    Self::push_text(&mut tree, &open, &utils::normalize_line_endings(&text))?;
                }
                Event::CData(e) => {
                    let text = String::from_utf8_lossy(&e);
                    Self::push_text(&mut tree, &open, &utils::normalize_line_endings(&text))?;
                }
                Event::GeneralRef(e) => {
                    let raw = e
                        .decode()
                        .map_err(|e| WorkbookError::Malformed(e.to_string()))?;
                    let text = utils::resolve_entity(&raw)?;
                    Self::push_text(&mut tree, &open, &text)?;
                }
                Event::Eof => break,
                Event::Comment(_) | Event::Decl(_) | Event::PI(_) | Event::DocType(_) => {}
            }
            buf.clear();
        }

        if let Some(&unclosed) = open.last() {
            let tag = tree
                .as_ref()
                .and_then(|t| t.get(unclosed).ok())
                .map(|e| e.tag.clone())
                .unwrap_or_default();
            return Err(WorkbookError::Malformed(format!("Unclosed element <{}>", tag)));
        }

        tree.ok_or_else(|| WorkbookError::Malformed("Document has no root element".to_string()))
    }

    fn open_element(
        tree: &mut Option<XmlTree>,
        open: &[ElementId],
        start: &BytesStart<'_>,
    ) -> Result<ElementId> {
        let element = read_element(start)?;

        match (tree.as_mut(), open.last()) {
            (Some(tree), Some(&parent)) => tree.append(parent, element),
            (Some(_), None) => Err(WorkbookError::Malformed(format!(
                "Second root element <{}>",
                element.tag
            ))),
            (None, _) => {
                *tree = Some(XmlTree::new(element));
                Ok(0)
            }
        }
    }

    /// Keep text only while the current element has no children yet
    fn push_text(tree: &mut Option<XmlTree>, open: &[ElementId], text: &str) -> Result<()> {
        let (Some(tree), Some(&current)) = (tree.as_mut(), open.last()) else {
            return Ok(());
        };

        let element = tree.get_mut(current)?;
        if element.children.is_empty() {
            element.text.get_or_insert_with(String::new).push_str(text);
        }
        Ok(())
    }
}

fn read_element(start: &BytesStart<'_>) -> Result<XmlElement> {
    let tag = std::str::from_utf8(start.name().as_ref())
        .map_err(|e| WorkbookError::Malformed(e.to_string()))?
        .to_string();

    let mut attributes = Attributes::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| WorkbookError::Malformed(e.to_string()))?;
        let key = std::str::from_utf8(attr.key.as_ref())
            .map_err(|e| WorkbookError::Malformed(e.to_string()))?
            .to_string();
        let value = attr
            .unescape_value()
            .map_err(|e| WorkbookError::Malformed(e.to_string()))?
            .into_owned();
        attributes.insert(key, value);
    }

    Ok(XmlElement::new(tag, attributes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_structure() {
        let xml = br#"<?xml version='1.0' encoding='utf-8' ?>
<workbook version='18.1' xmlns:user='http://www.tableausoftware.com/xml/user'>
  <datasources>
    <datasource name='Parameters'/>
    <datasource caption='Sales' name='federated.1'/>
  </datasources>
  <worksheets/>
</workbook>"#;

        let tree = XmlTree::parse(xml).unwrap();
        assert_eq!(tree.len(), 5);

        let root = tree.root();
        assert_eq!(root.tag, "workbook");
        let keys: Vec<&str> = root.attributes.keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["version", "xmlns:user"]);

        let tags: Vec<&str> = tree.iter_preorder().map(|e| e.tag.as_str()).collect();
        assert_eq!(
            tags,
            vec!["workbook", "datasources", "datasource", "datasource", "worksheets"]
        );
    }

    #[test]
    fn test_leading_text_only() {
        let xml = b"<rows>\n  [Sales]<x/>tail</rows>";
        let tree = XmlTree::parse(xml).unwrap();
        assert_eq!(tree.root().text.as_deref(), Some("\n  [Sales]"));
        let child = tree.children(0).unwrap().next().unwrap();
        assert_eq!(child.text, None);
    }

    #[test]
    fn test_entities_and_cdata() {
        let xml = br#"<calc formula='IF [A] &lt; 1 THEN &quot;x&quot; END&#10;'>a &amp; b<![CDATA[<raw>]]></calc>"#;
        let tree = XmlTree::parse(xml).unwrap();
        let root = tree.root();

        assert_eq!(root.attr("formula"), Some("IF [A] < 1 THEN \"x\" END\n"));
        assert_eq!(root.text.as_deref(), Some("a & b<raw>"));
    }

    #[test]
    fn test_crlf_text_folded_to_lf() {
        let xml = b"<r>\r\n  <a>\r\n    total\rnext</a><b><![CDATA[x\r\ny]]></b>\r\n</r>";
        let tree = XmlTree::parse(xml).unwrap();

        assert_eq!(tree.root().text.as_deref(), Some("\n  "));
        let texts: Vec<Option<&str>> = tree.children(0).unwrap().map(|e| e.text.as_deref()).collect();
        assert_eq!(texts, vec![Some("\n    total\nnext"), Some("x\ny")]);
    }

    #[test]
    fn test_malformed_documents() {
        assert!(matches!(
            XmlTree::parse(b"   "),
            Err(WorkbookError::Malformed(_))
        ));
        assert!(matches!(
            XmlTree::parse(b"<a></a><b/>"),
            Err(WorkbookError::Malformed(_))
        ));
        assert!(XmlTree::parse(b"<a><b></a>").is_err());
        assert!(XmlTree::parse(b"<a><b>").is_err());
    }

    #[test]
    fn test_append() {
        let mut tree = XmlTree::new(XmlElement::new("root", Attributes::new()));
        let a = tree.append(0, XmlElement::new("a", Attributes::new())).unwrap();
        tree.append(a, XmlElement::new("b", Attributes::new())).unwrap();
        tree.append(0, XmlElement::new("c", Attributes::new())).unwrap();

        let tags: Vec<&str> = tree.iter_preorder().map(|e| e.tag.as_str()).collect();
        assert_eq!(tags, vec!["root", "a", "b", "c"]);
        assert!(tree.append(42, XmlElement::new("d", Attributes::new())).is_err());
    }
}
