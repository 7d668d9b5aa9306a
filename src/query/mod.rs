//! # Graph Query Layer
//!
//! Read-only traversal primitives over a loaded [`GraphStore`]:
//!
//! | Primitive | Hops | Direction |
//! |-----------|------|-----------|
//! | `get_targets` / `get_successors` | 1 | outgoing |
//! | `get_sources` / `get_predecessors` | 1 | incoming |
//! | `has_relation` | 1 | directed existence test |
//! | `closure` / `ancestors` / `descendants` | 2 | either |
//! | `gene_sets` | 1, whole graph | either |
//!
//! Results are sets: unique by node identity and sorted by node key.
//! Node arguments are raw `(namespace, local_id)` pairs and go through the
//! client's [`NamespaceRegistry`] first, so `("go", "3677")` and
//! `("GO", "GO:0003677")` ask about the same node.

pub mod bio;

use std::collections::{BTreeMap, BTreeSet};

use crate::identity::NamespaceRegistry;
use crate::model::{Direction, Grounding, Node};
use crate::storage::GraphStore;
use crate::{Error, Result};

/// Namespace whose nodes make up gene sets.
pub const GENE_NAMESPACE: &str = "HGNC";

/// Ontology edges treated as one hierarchy.
pub const HIERARCHY: [&str; 2] = ["isa", "partof"];

pub struct GraphClient<S> {
    store: S,
    registry: NamespaceRegistry,
}

impl<S: GraphStore> GraphClient<S> {
    pub fn new(store: S) -> Self {
        Self { store, registry: NamespaceRegistry::default() }
    }

    pub fn with_registry(store: S, registry: NamespaceRegistry) -> Self {
        Self { store, registry }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Canonical key of a raw grounding.
    pub fn key(&self, node: impl Into<Grounding>) -> Result<Grounding> {
        let node = node.into();
        Ok(self.registry.normalize(&node.namespace, &node.local_id)?.grounding())
    }

    pub async fn get_node(&self, node: impl Into<Grounding>) -> Result<Option<Node>> {
        let key = self.key(node)?;
        self.store.get_node(&key).await
    }

    // ========================================================================
    // One hop
    // ========================================================================

    /// Nodes `n` with `node -[relation_type]-> n`.
    pub async fn get_targets(&self, node: impl Into<Grounding>, relation_type: &str) -> Result<Vec<Node>> {
        self.hop(node, Direction::Outgoing, &[relation_type]).await
    }

    /// Nodes `n` with `n -[relation_type]-> node`.
    pub async fn get_sources(&self, node: impl Into<Grounding>, relation_type: &str) -> Result<Vec<Node>> {
        self.hop(node, Direction::Incoming, &[relation_type]).await
    }

    /// Whether `a -[relation_type]-> b` exists. Direction matters.
    pub async fn has_relation(
        &self,
        a: impl Into<Grounding>,
        b: impl Into<Grounding>,
        relation_type: &str,
    ) -> Result<bool> {
        let (a, b) = (self.key(a)?, self.key(b)?);
        self.store.has_edge(&a, &b, relation_type).await
    }

    /// Outgoing hop over a set of interchangeable relation types.
    pub async fn get_successors(&self, node: impl Into<Grounding>, relation_types: &[&str]) -> Result<Vec<Node>> {
        self.hop(node, Direction::Outgoing, relation_types).await
    }

    /// Incoming hop over a set of interchangeable relation types.
    pub async fn get_predecessors(&self, node: impl Into<Grounding>, relation_types: &[&str]) -> Result<Vec<Node>> {
        self.hop(node, Direction::Incoming, relation_types).await
    }

    async fn hop(&self, node: impl Into<Grounding>, dir: Direction, relation_types: &[&str]) -> Result<Vec<Node>> {
        let key = self.key(node)?;
        Ok(node_set(self.store.neighbors(&key, dir, relation_types).await?))
    }

    // ========================================================================
    // Two-level closure
    // ========================================================================

    /// The node itself, its direct neighbours, and their neighbours.
    ///
    /// Two levels, not an unbounded walk. A node reachable both directly
    /// and through a further hop appears once, as the direct result.
    pub async fn closure(
        &self,
        node: impl Into<Grounding>,
        relation_types: &[&str],
        dir: Direction,
    ) -> Result<Vec<Node>> {
        let start = self.key(node)?;
        let mut found: BTreeMap<Grounding, Node> = BTreeMap::new();
        if let Some(node) = self.store.get_node(&start).await? {
            found.insert(start.clone(), node);
        }

        let direct = node_set(self.store.neighbors(&start, dir, relation_types).await?);
        for node in &direct {
            found.entry(node.grounding()).or_insert_with(|| node.clone());
        }
        for node in &direct {
            for further in self.store.neighbors(&node.grounding(), dir, relation_types).await? {
                found.entry(further.grounding()).or_insert(further);
            }
        }
        Ok(found.into_values().collect())
    }

    /// Closure against edge direction: for `isa`, the node and its subterms.
    pub async fn descendants(&self, node: impl Into<Grounding>, relation_types: &[&str]) -> Result<Vec<Node>> {
        self.closure(node, relation_types, Direction::Incoming).await
    }

    /// Closure along edge direction: for `isa`, the node and its superterms.
    pub async fn ancestors(&self, node: impl Into<Grounding>, relation_types: &[&str]) -> Result<Vec<Node>> {
        self.closure(node, relation_types, Direction::Outgoing).await
    }

    // ========================================================================
    // Gene sets
    // ========================================================================

    /// Every term in `term_ns` mapped to the HGNC genes it is linked to by
    /// `relation_type`.
    ///
    /// `Outgoing` follows `term -> gene` edges, `Incoming` follows
    /// `gene -> term` edges and `Both` ignores orientation. Terms without
    /// any gene are absent.
    pub async fn gene_sets(
        &self,
        term_ns: &str,
        relation_type: &str,
        dir: Direction,
    ) -> Result<BTreeMap<Grounding, BTreeSet<Grounding>>> {
        let term_ns = self
            .registry
            .canonical_namespace(term_ns)
            .ok_or_else(|| Error::UnknownNamespace(term_ns.to_string()))?;

        let mut sets: BTreeMap<Grounding, BTreeSet<Grounding>> = BTreeMap::new();
        if matches!(dir, Direction::Outgoing | Direction::Both) {
            for (term, gene) in self.store.edges_between(term_ns, relation_type, GENE_NAMESPACE).await? {
                sets.entry(term).or_default().insert(gene);
            }
        }
        if matches!(dir, Direction::Incoming | Direction::Both) {
            for (gene, term) in self.store.edges_between(GENE_NAMESPACE, relation_type, term_ns).await? {
                sets.entry(term).or_default().insert(gene);
            }
        }
        Ok(sets)
    }

    // ========================================================================
    // Counts
    // ========================================================================

    /// Number of nodes in a namespace; the gene universe for `HGNC`.
    pub async fn count_nodes_in_namespace(&self, namespace: &str) -> Result<u64> {
        let canonical = self
            .registry
            .canonical_namespace(namespace)
            .ok_or_else(|| Error::UnknownNamespace(namespace.to_string()))?;
        self.store.count_in_namespace(canonical).await
    }
}

/// Unique by identity, sorted by key; the first copy of a node wins.
fn node_set(nodes: Vec<Node>) -> Vec<Node> {
    let mut set: BTreeMap<Grounding, Node> = BTreeMap::new();
    for node in nodes {
        set.entry(node.grounding()).or_insert(node);
    }
    set.into_values().collect()
}
