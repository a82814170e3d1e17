//! TreeBuilder - source element tree → named node graph
//!
//! One top-down pass. Each element becomes an `XmlNode`, is named against
//! its parent, published on the parent, and then its own children are built
//! in source order. A node with exactly one child exposes that child's
//! attributes once the child subtree is done.

use crate::arena::NodeArena;
use crate::error::Result;
use crate::naming::{self, NamingConfig, NamingQuery};
use crate::types::{NodeId, XmlNode};
use crate::xml::{ElementId, XmlTree};

pub struct TreeBuilder<'c> {
    config: &'c NamingConfig,
}

impl<'c> TreeBuilder<'c> {
    pub fn new(config: &'c NamingConfig) -> Self {
        Self { config }
    }

    /// Build the node arena for a whole source tree
    pub fn build(&self, source: &XmlTree) -> Result<NodeArena> {
        let mut arena = NodeArena::with_capacity(source.len());
        let root_id = self.build_node(&mut arena, source, source.root_id(), None)?;
        arena.set_root(root_id)?;

        tracing::debug!("Built {} nodes under <{}>", arena.len(), source.root().tag);
        Ok(arena)
    }

    /// Recursively build one element and its subtree
    fn build_node(
        &self,
        arena: &mut NodeArena,
        source: &XmlTree,
        element_id: ElementId,
        parent_id: Option<NodeId>,
    ) -> Result<NodeId> {
        let element = source.get(element_id)?;

        let resolution = match parent_id {
            Some(parent_id) => {
                let parent = arena.get(parent_id)?;
                naming::resolve(
                    &NamingQuery::child(
                        &parent.tag,
                        &parent.attributes,
                        &element.tag,
                        &element.attributes,
                    ),
                    self.config,
                )
            }
            None => naming::resolve(
                &NamingQuery::root(&element.tag, &element.attributes),
                self.config,
            ),
        };

        let node = XmlNode::new(
            0,
            element.tag.clone(),
            element.attributes.clone(),
            element.text.clone(),
            parent_id,
            resolution,
        );
        let node_id = arena.add_node(node);

        if let Some(parent_id) = parent_id {
            arena.push_child(parent_id, node_id)?;
            arena.attach(node_id)?;
        }

        for &child_element in &element.children {
            self.build_node(arena, source, child_element, Some(node_id))?;
        }

        if element.children.len() == 1 {
            arena.promote_sole_child(node_id)?;
        }

        Ok(node_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::NamingRule;
    use crate::types::Field;

    fn build(xml: &str) -> NodeArena {
        let tree = XmlTree::parse(xml.as_bytes()).unwrap();
        TreeBuilder::new(&NamingConfig::default()).build(&tree).unwrap()
    }

    #[test]
    fn test_parameter_scenario() {
        let arena = build(
            r#"<datasources><datasource name='Parameters'><column name='[Param1]'/></datasource></datasources>"#,
        );
        let root = arena.root_id().unwrap();
        let params = arena.child(root, "parameters").unwrap();
        let param = arena.child(params, "param1").unwrap();

        let node = arena.get(param).unwrap();
        assert_eq!(node.tag, "column");
        assert_eq!(node.naming().rule(), NamingRule::Parameter);
        assert_eq!(arena.value(param, "name").unwrap(), "[Param1]");
    }

    #[test]
    fn test_calculated_field_scenario() {
        let arena = build(
            r#"<datasource name='federated.1'>
                 <column caption='Profit Ratio' name='[Calculation_1]'>
                   <calculation class='tableau' formula='[Profit]/[Sales]'/>
                 </column>
               </datasource>"#,
        );
        let root = arena.root_id().unwrap();
        let column = arena.child(root, "profit_ratio").unwrap();

        assert_eq!(
            arena.field(column, "formula").unwrap(),
            Field::Promoted("[Profit]/[Sales]")
        );
        assert_eq!(
            arena.get(column).unwrap().promoted_attributes(),
            &["class", "formula"]
        );
    }

    #[test]
    fn test_order_preserved() {
        let arena = build("<r><c/><a/><b/><a/><d><e/><f/></d></r>");
        let root = arena.root_id().unwrap();

        let mut tags = Vec::new();
        arena
            .traverse_df(root, |node| {
                tags.push(node.tag.clone());
                Ok(())
            })
            .unwrap();
        assert_eq!(tags, vec!["r", "c", "a", "b", "a", "d", "e", "f"]);
    }

    #[test]
    fn test_collision_second_sibling_wins() {
        let arena = build("<r><item id='1'/><item id='2'/></r>");
        let root = arena.root_id().unwrap();
        let item = arena.child(root, "item").unwrap();

        assert_eq!(arena.value(item, "id").unwrap(), "2");
        assert_eq!(arena.get(root).unwrap().children_ids().len(), 2);
    }

    #[test]
    fn test_promotion_only_for_single_child() {
        let arena = build(
            r#"<r kind='root'>
                 <none a='1'/>
                 <one own='x'><leaf own='y' extra='z'/></one>
                 <two><p q='1'/><p q='2'/></two>
               </r>"#,
        );
        let root = arena.root_id().unwrap();

        let none = arena.child(root, "none").unwrap();
        assert!(arena.get(none).unwrap().promoted_attributes().is_empty());

        let one = arena.child(root, "one").unwrap();
        assert_eq!(arena.get(one).unwrap().promoted_attributes(), &["extra"]);
        assert_eq!(arena.value(one, "own").unwrap(), "x");
        assert_eq!(arena.value(one, "extra").unwrap(), "z");

        let two = arena.child(root, "two").unwrap();
        assert!(arena.get(two).unwrap().promoted_attributes().is_empty());
        assert!(arena.value(two, "q").is_err());

        assert!(arena.get(root).unwrap().promoted_attributes().is_empty());
    }

    #[test]
    fn test_promotion_is_not_transitive() {
        let arena = build("<a><b x='1'><c y='2'/></b></a>");
        let root = arena.root_id().unwrap();
        let b = arena.child(root, "b").unwrap();

        assert_eq!(arena.get(b).unwrap().promoted_attributes(), &["y"]);
        assert_eq!(arena.get(root).unwrap().promoted_attributes(), &["x"]);
        assert!(arena.value(root, "y").is_err());
    }

    #[test]
    fn test_named_child_shadows_promotion() {
        let arena = build("<a><leaf leaf='attr'/></a>");
        let root = arena.root_id().unwrap();

        assert!(arena.get(root).unwrap().promoted_attributes().is_empty());
        assert!(matches!(arena.field(root, "leaf").unwrap(), Field::Node(_)));
    }

    #[test]
    fn test_fallback_is_recorded() {
        let arena = build(
            r#"<datasource name='x'><column name='[Calculation_3]'/></datasource>"#,
        );
        let root = arena.root_id().unwrap();
        let column = arena.child(root, "column").unwrap();

        assert!(arena.get(column).unwrap().naming().is_fallback());
    }

    #[test]
    fn test_parent_links_and_text() {
        let arena = build("<r><rows>[Sales]</rows></r>");
        let root = arena.root_id().unwrap();
        let rows = arena.child(root, "rows").unwrap();

        let node = arena.get(rows).unwrap();
        assert_eq!(node.parent_id(), Some(root));
        assert_eq!(node.text.as_deref(), Some("[Sales]"));
        assert_eq!(arena.parent(rows).unwrap().unwrap().tag, "r");
    }
}
