//! Several adapters dumped as one source.
//!
//! Streams are concatenated in list order, so the first adapter's records
//! arrive first. Under `FirstSeen` the earliest adapter that mentions a key
//! supplies its row; under `Union` it wins property conflicts.

use std::collections::BTreeMap;

use crate::dedup::MergeRule;

use super::{NodeStream, RelationStream, SourceAdapter};
use crate::Result;

pub struct ChainAdapter {
    name: String,
    parts: Vec<Box<dyn SourceAdapter>>,
    merge_rule: Option<MergeRule>,
}

impl ChainAdapter {
    pub fn new(name: impl Into<String>, parts: Vec<Box<dyn SourceAdapter>>) -> Self {
        Self { name: name.into(), parts, merge_rule: None }
    }

    /// Override the rule taken from the first part.
    pub fn with_merge_rule(mut self, rule: MergeRule) -> Self {
        self.merge_rule = Some(rule);
        self
    }
}

impl SourceAdapter for ChainAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    /// Union of every part's descriptions; earlier parts win.
    fn descriptions(&self) -> BTreeMap<String, String> {
        let mut out = BTreeMap::new();
        for part in &self.parts {
            for (relation_type, text) in part.descriptions() {
                out.entry(relation_type).or_insert(text);
            }
        }
        out
    }

    fn merge_rule(&self) -> MergeRule {
        self.merge_rule
            .or_else(|| self.parts.first().map(|p| p.merge_rule()))
            .unwrap_or_default()
    }

    /// Each part's stream is opened only once the previous one is drained.
    fn nodes(&mut self) -> Result<NodeStream<'_>> {
        Ok(Box::new(self.parts.iter_mut().flat_map(part_nodes)))
    }

    fn relations(&mut self) -> Result<RelationStream<'_>> {
        Ok(Box::new(self.parts.iter_mut().flat_map(part_relations)))
    }
}

// A part that cannot open its stream yields the error as an item.
fn part_nodes(part: &mut Box<dyn SourceAdapter>) -> NodeStream<'_> {
    match part.nodes() {
        Ok(stream) => stream,
        Err(err) => Box::new(std::iter::once(Err(err))),
    }
}

fn part_relations(part: &mut Box<dyn SourceAdapter>) -> RelationStream<'_> {
    match part.relations() {
        Ok(stream) => stream,
        Err(err) => Box::new(std::iter::once(Err(err))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::InMemoryAdapter;
    use crate::model::{Node, Relation};
    use crate::Error;

    struct Unreachable;

    impl SourceAdapter for Unreachable {
        fn name(&self) -> &str {
            "unreachable"
        }

        fn nodes(&mut self) -> Result<NodeStream<'_>> {
            Err(Error::adapter("unreachable", "connection refused"))
        }

        fn relations(&mut self) -> Result<RelationStream<'_>> {
            Ok(Box::new(std::iter::empty()))
        }
    }

    #[test]
    fn test_streams_follow_list_order() {
        let first = InMemoryAdapter::new("go_a")
            .with_nodes([Node::bio_entity("GO", "3677").with_property("name", "DNA binding")])
            .with_relations([Relation::new(("GO", "3677"), ("GO", "3676"), "isa")])
            .with_merge_rule(MergeRule::Union)
            .with_description("isa", "from go_a");
        let second = InMemoryAdapter::new("go_b")
            .with_nodes([Node::bio_entity("GO", "3677").with_property("name", "binding DNA")])
            .with_description("isa", "from go_b")
            .with_description("partof", "from go_b");
        let mut chain = ChainAdapter::new("go", vec![Box::new(first), Box::new(second)]);

        let names: Vec<String> = chain
            .nodes()
            .unwrap()
            .map(|n| n.unwrap().properties["name"].to_cell())
            .collect();
        assert_eq!(names, ["DNA binding", "binding DNA"]);
        assert_eq!(chain.relations().unwrap().count(), 1);
        assert_eq!(chain.merge_rule(), MergeRule::Union);
        assert_eq!(chain.descriptions()["isa"], "from go_a");
        assert_eq!(chain.descriptions()["partof"], "from go_b");
    }

    #[test]
    fn test_unopenable_part_surfaces_in_stream() {
        let first = InMemoryAdapter::new("hgnc").with_nodes([Node::bio_entity("HGNC", "1100")]);
        let mut chain = ChainAdapter::new("genes", vec![Box::new(first), Box::new(Unreachable)])
            .with_merge_rule(MergeRule::FirstSeen);

        let items: Vec<_> = chain.nodes().unwrap().collect();
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(matches!(&items[1], Err(Error::Adapter { adapter, .. }) if adapter == "unreachable"));
    }
}
