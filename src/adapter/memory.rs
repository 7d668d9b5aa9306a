//! In-memory source adapter.
//!
//! Holds pre-built nodes and relations. Useful for embedding the pipeline
//! in a larger program and as the reference adapter in tests.

use std::collections::BTreeMap;

use crate::dedup::MergeRule;
use crate::model::{Node, Relation};

use super::{NodeStream, RelationStream, SourceAdapter};
use crate::Result;

#[derive(Debug, Clone)]
pub struct InMemoryAdapter {
    name: String,
    nodes: Vec<Node>,
    relations: Vec<Relation>,
    merge_rule: MergeRule,
    descriptions: BTreeMap<String, String>,
}

impl InMemoryAdapter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: Vec::new(),
            relations: Vec::new(),
            merge_rule: MergeRule::FirstSeen,
            descriptions: BTreeMap::new(),
        }
    }

    pub fn with_nodes(mut self, nodes: impl IntoIterator<Item = Node>) -> Self {
        self.nodes.extend(nodes);
        self
    }

    pub fn with_relations(mut self, relations: impl IntoIterator<Item = Relation>) -> Self {
        self.relations.extend(relations);
        self
    }

    pub fn with_merge_rule(mut self, rule: MergeRule) -> Self {
        self.merge_rule = rule;
        self
    }

    pub fn with_description(mut self, relation_type: impl Into<String>, text: impl Into<String>) -> Self {
        self.descriptions.insert(relation_type.into(), text.into());
        self
    }
}

impl SourceAdapter for InMemoryAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn descriptions(&self) -> BTreeMap<String, String> {
        self.descriptions.clone()
    }

    fn merge_rule(&self) -> MergeRule {
        self.merge_rule
    }

    /// Replays a copy, so repeated runs see the same stream.
    fn nodes(&mut self) -> Result<NodeStream<'_>> {
        Ok(Box::new(self.nodes.iter().cloned().map(Ok)))
    }

    fn relations(&mut self) -> Result<RelationStream<'_>> {
        Ok(Box::new(self.relations.iter().cloned().map(Ok)))
    }
}
