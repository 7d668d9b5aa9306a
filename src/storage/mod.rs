//! # Graph Store Trait
//!
//! The read contract between the query layer and whatever holds the loaded
//! graph. The query layer never mutates a store; every method here is a
//! read.
//!
//! ## Implementations
//!
//! | Store | Module | Description |
//! |-------|--------|-------------|
//! | `MemoryStore` | `memory` | In-memory adjacency lists, for testing/embedding |
//!
//! A `MemoryStore` is filled from a published dump with
//! [`MemoryStore::import_dump`] (see `import`).

pub mod import;
pub mod memory;

use async_trait::async_trait;

use crate::model::{Direction, Grounding, Node};
use crate::Result;

pub use import::ImportStats;
pub use memory::MemoryStore;

// ============================================================================
// GraphStore Trait
// ============================================================================

/// A directed, labeled multigraph keyed by canonical node identity.
///
/// Keys passed in are already normalized; stores compare them verbatim.
#[async_trait]
pub trait GraphStore: Send + Sync + 'static {
    // ========================================================================
    // Lookup
    // ========================================================================

    /// Get a node by key. Returns None if not found.
    async fn get_node(&self, key: &Grounding) -> Result<Option<Node>>;

    /// Nodes one hop away along edges whose type is in `rel_types`.
    /// An empty `rel_types` matches every type. Order is unspecified and
    /// a node reachable over parallel edges may appear more than once.
    async fn neighbors(&self, key: &Grounding, dir: Direction, rel_types: &[&str]) -> Result<Vec<Node>>;

    /// Whether a `start -[rel_type]-> end` edge exists.
    async fn has_edge(&self, start: &Grounding, end: &Grounding, rel_type: &str) -> Result<bool>;

    /// Every `(start, end)` pair of a `rel_type` edge whose start is in
    /// `source_ns` and whose end is in `target_ns`. Order is unspecified.
    async fn edges_between(
        &self,
        source_ns: &str,
        rel_type: &str,
        target_ns: &str,
    ) -> Result<Vec<(Grounding, Grounding)>>;

    // ========================================================================
    // Schema introspection
    // ========================================================================

    /// Total number of nodes.
    async fn node_count(&self) -> Result<u64>;

    /// Total number of relationships.
    async fn relationship_count(&self) -> Result<u64>;

    /// All distinct relationship types, sorted.
    async fn relationship_types(&self) -> Result<Vec<String>>;

    /// Number of nodes in one namespace.
    async fn count_in_namespace(&self, namespace: &str) -> Result<u64>;
}
