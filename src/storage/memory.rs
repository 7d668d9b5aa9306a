//! In-memory graph store.
//!
//! This is the reference implementation of `GraphStore`.
//! It uses HashMaps of adjacency lists protected by RwLock.
//!
//! ## Limitations
//!
//! - **Load, then read**: writes (`insert_node`, `insert_relation`,
//!   `import_dump`) take per-collection write locks and are not atomic
//!   across collections. Load before serving queries.
//! - **No persistence**: the store lives as long as the process.
//!
//! Queries take read locks only and hold them for a single call, so a
//! dropped query future leaves nothing behind.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::model::{Direction, Grounding, Node, PropertyMap, Relation};
use crate::{Error, Result};

use super::GraphStore;

// ============================================================================
// MemoryStore
// ============================================================================

/// In-memory property graph store. Cloning shares the same graph.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    nodes: RwLock<HashMap<Grounding, Node>>,
    /// start key → outgoing edges
    outgoing: RwLock<HashMap<Grounding, Vec<Edge>>>,
    /// end key → incoming edges
    incoming: RwLock<HashMap<Grounding, Vec<Edge>>>,
}

/// One adjacency entry, seen from the node that owns the list.
#[derive(Debug, Clone)]
struct Edge {
    other: Grounding,
    relation_type: String,
    properties: PropertyMap,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a node.
    pub fn insert_node(&self, node: Node) {
        self.inner.nodes.write().insert(node.grounding(), node);
    }

    /// Insert a relation. Both endpoints must already be present.
    pub fn insert_relation(&self, relation: Relation) -> Result<()> {
        {
            let nodes = self.inner.nodes.read();
            for end in [&relation.source, &relation.target] {
                if !nodes.contains_key(end) {
                    return Err(Error::NotFound(format!(
                        "node {end} for {} -[{}]-> {}",
                        relation.source, relation.relation_type, relation.target
                    )));
                }
            }
        }

        self.inner.outgoing.write().entry(relation.source.clone()).or_default().push(Edge {
            other: relation.target.clone(),
            relation_type: relation.relation_type.clone(),
            properties: relation.properties.clone(),
        });
        self.inner.incoming.write().entry(relation.target).or_default().push(Edge {
            other: relation.source,
            relation_type: relation.relation_type,
            properties: relation.properties,
        });
        Ok(())
    }

    /// Every outgoing relation of a node, properties included.
    pub fn relations_from(&self, start: &Grounding) -> Vec<Relation> {
        self.inner
            .outgoing
            .read()
            .get(start)
            .map(|edges| {
                edges
                    .iter()
                    .map(|e| {
                        Relation::new(start.clone(), e.other.clone(), e.relation_type.clone())
                            .with_properties(e.properties.clone())
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn collect_neighbors(
        &self,
        adjacency: &RwLock<HashMap<Grounding, Vec<Edge>>>,
        key: &Grounding,
        rel_types: &[&str],
        out: &mut Vec<Node>,
    ) {
        let adjacency = adjacency.read();
        let Some(edges) = adjacency.get(key) else {
            return;
        };
        let nodes = self.inner.nodes.read();
        out.extend(
            edges
                .iter()
                .filter(|e| rel_types.is_empty() || rel_types.contains(&e.relation_type.as_str()))
                .filter_map(|e| nodes.get(&e.other).cloned()),
        );
    }
}

// ============================================================================
// GraphStore impl
// ============================================================================

#[async_trait]
impl GraphStore for MemoryStore {
    async fn get_node(&self, key: &Grounding) -> Result<Option<Node>> {
        Ok(self.inner.nodes.read().get(key).cloned())
    }

    async fn neighbors(&self, key: &Grounding, dir: Direction, rel_types: &[&str]) -> Result<Vec<Node>> {
        let mut out = Vec::new();
        if matches!(dir, Direction::Outgoing | Direction::Both) {
            self.collect_neighbors(&self.inner.outgoing, key, rel_types, &mut out);
        }
        if matches!(dir, Direction::Incoming | Direction::Both) {
            self.collect_neighbors(&self.inner.incoming, key, rel_types, &mut out);
        }
        Ok(out)
    }

    async fn has_edge(&self, start: &Grounding, end: &Grounding, rel_type: &str) -> Result<bool> {
        Ok(self
            .inner
            .outgoing
            .read()
            .get(start)
            .is_some_and(|edges| edges.iter().any(|e| e.other == *end && e.relation_type == rel_type)))
    }

    async fn edges_between(
        &self,
        source_ns: &str,
        rel_type: &str,
        target_ns: &str,
    ) -> Result<Vec<(Grounding, Grounding)>> {
        let outgoing = self.inner.outgoing.read();
        Ok(outgoing
            .iter()
            .filter(|(start, _)| start.namespace == source_ns)
            .flat_map(|(start, edges)| {
                edges
                    .iter()
                    .filter(|e| e.relation_type == rel_type && e.other.namespace == target_ns)
                    .map(move |e| (start.clone(), e.other.clone()))
            })
            .collect())
    }

    async fn node_count(&self) -> Result<u64> {
        Ok(self.inner.nodes.read().len() as u64)
    }

    async fn relationship_count(&self) -> Result<u64> {
        Ok(self.inner.outgoing.read().values().map(|edges| edges.len() as u64).sum())
    }

    async fn relationship_types(&self) -> Result<Vec<String>> {
        let outgoing = self.inner.outgoing.read();
        let types: BTreeSet<&str> =
            outgoing.values().flatten().map(|e| e.relation_type.as_str()).collect();
        Ok(types.into_iter().map(str::to_string).collect())
    }

    async fn count_in_namespace(&self, namespace: &str) -> Result<u64> {
        Ok(self.inner.nodes.read().keys().filter(|k| k.namespace == namespace).count() as u64)
    }
}
