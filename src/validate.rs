//! # Validation Stage
//!
//! Best-effort cleansing between the adapters and the dedup stage. Each
//! item's identifiers are normalized and checked against their namespace's
//! syntax; items that fail are dropped, logged and counted. Validation
//! never aborts a stream.
//!
//! Surviving items are rebuilt with their canonical identity, so every
//! later stage sees normalized namespaces and ids only.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::identity::{Curie, IdentityError, NamespaceRegistry};
use crate::model::{Grounding, Node, Relation};

// ============================================================================
// Rejections
// ============================================================================

/// Why an item was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RejectReason {
    MalformedIdentifier,
    UnknownNamespace,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::MalformedIdentifier => write!(f, "MalformedIdentifier"),
            RejectReason::UnknownNamespace => write!(f, "UnknownNamespace"),
        }
    }
}

impl From<&IdentityError> for RejectReason {
    fn from(err: &IdentityError) -> Self {
        match err {
            IdentityError::UnknownNamespace(_) => RejectReason::UnknownNamespace,
            IdentityError::MalformedIdentifier { .. } => RejectReason::MalformedIdentifier,
        }
    }
}

/// Aggregate rejection counts, by reason and by offending namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectionCounts {
    pub nodes: u64,
    pub relations: u64,
    pub by_reason: BTreeMap<RejectReason, u64>,
    /// (raw namespace as emitted, reason) → count
    pub by_namespace: BTreeMap<(String, RejectReason), u64>,
}

impl RejectionCounts {
    pub fn total(&self) -> u64 {
        self.nodes + self.relations
    }

    pub fn count(&self, reason: RejectReason) -> u64 {
        self.by_reason.get(&reason).copied().unwrap_or(0)
    }

    /// Namespaces that had no normalization rule, with drop counts.
    pub fn unknown_namespaces(&self) -> impl Iterator<Item = (&str, u64)> {
        self.by_namespace
            .iter()
            .filter(|((_, reason), _)| *reason == RejectReason::UnknownNamespace)
            .map(|((ns, _), n)| (ns.as_str(), *n))
    }

    fn record(&mut self, namespace: &str, reason: RejectReason) {
        *self.by_reason.entry(reason).or_default() += 1;
        *self.by_namespace.entry((namespace.to_string(), reason)).or_default() += 1;
    }
}

impl fmt::Display for RejectionCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} nodes and {} relations rejected: {} MalformedIdentifier, {} UnknownNamespace",
            self.nodes,
            self.relations,
            self.count(RejectReason::MalformedIdentifier),
            self.count(RejectReason::UnknownNamespace),
        )
    }
}

// ============================================================================
// Validator
// ============================================================================

/// Runs items through the namespace registry and keeps the tally.
pub struct Validator<'r> {
    registry: &'r NamespaceRegistry,
    counts: RejectionCounts,
}

impl<'r> Validator<'r> {
    pub fn new(registry: &'r NamespaceRegistry) -> Self {
        Self { registry, counts: RejectionCounts::default() }
    }

    pub fn counts(&self) -> &RejectionCounts {
        &self.counts
    }

    pub fn into_counts(self) -> RejectionCounts {
        self.counts
    }

    /// Check one node. `Some` carries the node with canonical identity.
    pub fn check_node(&mut self, index: usize, node: Node) -> Option<Node> {
        match self.registry.resolve(&node.namespace, &node.local_id) {
            Ok(curie) => Some(Node {
                namespace: curie.namespace().to_string(),
                local_id: curie.local_id().to_string(),
                ..node
            }),
            Err(err) => {
                let reason = RejectReason::from(&err);
                debug!(index, item = ?node.grounding(), %reason, "{err}");
                self.counts.nodes += 1;
                self.counts.record(&node.namespace, reason);
                None
            }
        }
    }

    /// Check both ends of one relation independently.
    pub fn check_relation(&mut self, index: usize, rel: Relation) -> Option<Relation> {
        let resolved = self
            .resolve_end(&rel.source)
            .and_then(|source| Ok((source, self.resolve_end(&rel.target)?)));
        match resolved {
            Ok((source, target)) => Some(Relation {
                source: source.grounding(),
                target: target.grounding(),
                ..rel
            }),
            Err((namespace, err)) => {
                let reason = RejectReason::from(&err);
                debug!(
                    index,
                    source = %rel.source,
                    target = %rel.target,
                    relation_type = %rel.relation_type,
                    %reason,
                    "{err}"
                );
                self.counts.relations += 1;
                self.counts.record(&namespace, reason);
                None
            }
        }
    }

    fn resolve_end(&self, end: &Grounding) -> Result<Curie, (String, IdentityError)> {
        self.registry
            .resolve_grounding(end)
            .map_err(|err| (end.namespace.clone(), err))
    }

    pub fn validate_nodes<'a, I>(&'a mut self, nodes: I) -> impl Iterator<Item = Node> + 'a
    where
        I: IntoIterator<Item = Node>,
        I::IntoIter: 'a,
    {
        nodes
            .into_iter()
            .enumerate()
            .filter_map(move |(index, node)| self.check_node(index, node))
    }

    pub fn validate_relations<'a, I>(&'a mut self, relations: I) -> impl Iterator<Item = Relation> + 'a
    where
        I: IntoIterator<Item = Relation>,
        I::IntoIter: 'a,
    {
        relations
            .into_iter()
            .enumerate()
            .filter_map(move |(index, rel)| self.check_relation(index, rel))
    }

    /// Emit the stage summary; unknown namespaces go out at `warn`.
    pub fn report(&self, source: &str) {
        info!(
            source,
            rejected_nodes = self.counts.nodes,
            rejected_relations = self.counts.relations,
            "validation finished"
        );
        for (namespace, n) in self.counts.unknown_namespaces() {
            warn!(source, namespace, dropped = n, "no normalization rule for namespace");
        }
    }
}
