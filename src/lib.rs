//! # biograph: Biomedical Knowledge Graph ETL
//!
//! Turns heterogeneous biomedical sources into deterministic bulk-load files
//! for a property-graph database, and answers typed traversal queries over
//! the loaded graph.
//!
//! ## Design Principles
//!
//! 1. **Trait-first**: `SourceAdapter` is the contract between sources and the
//!    pipeline; `GraphStore` is the contract between the query layer and storage
//! 2. **Clean DTOs**: `Node`, `Relation`, `Value` cross every stage boundary
//! 3. **Identity is a pure function**: `(namespace, local_id)` → `Curie`
//! 4. **Deterministic output**: the same input set always dumps byte-identical files
//!
//! ## Write path
//!
//! ```text
//! SourceAdapter ─▶ Validator ─▶ dedup (external sort) ─▶ DumpWriter
//!   raw ids        canonical      sorted, collapsed       staged, then published
//! ```
//!
//! ```rust,no_run
//! use biograph::{InMemoryAdapter, Node, Pipeline, PipelineConfig, Relation};
//!
//! # fn example() -> biograph::Result<()> {
//! let adapter = InMemoryAdapter::new("disgenet")
//!     .with_nodes([Node::bio_entity("HGNC", "1100"), Node::bio_entity("MESH", "D001943")])
//!     .with_relations([Relation::new(
//!         ("HGNC", "1100"),
//!         ("MESH", "D001943"),
//!         "gene_disease_association",
//!     )]);
//!
//! let pipeline = Pipeline::new(PipelineConfig::default());
//! let report = pipeline.run(Box::new(adapter))?;
//! println!("{} nodes, {} edges", report.nodes_written, report.edges_written);
//! # Ok(())
//! # }
//! ```
//!
//! ## Read path
//!
//! ```rust,no_run
//! use biograph::{GraphClient, MemoryStore};
//!
//! # async fn example() -> biograph::Result<()> {
//! let store = MemoryStore::new();
//! store.import_dump("biograph-out/disgenet")?;
//! let client = GraphClient::new(store);
//! let linked = client
//!     .has_relation(("HGNC", "1100"), ("MESH", "D001943"), "gene_disease_association")
//!     .await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod identity;
pub mod adapter;
pub mod validate;
pub mod dedup;
pub mod export;
pub mod pipeline;
pub mod storage;
pub mod query;
pub mod config;

// ============================================================================
// Re-exports: Model (the DTOs)
// ============================================================================

pub use model::{Direction, Grounding, Node, PropertyMap, Relation, Value};

// ============================================================================
// Re-exports: Write path
// ============================================================================

pub use identity::{Curie, IdentityError, NamespaceRegistry};
pub use adapter::{AdapterRegistry, ChainAdapter, InMemoryAdapter, JsonlAdapter, SourceAdapter};
pub use validate::{RejectReason, RejectionCounts, Validator};
pub use dedup::{MergeRule, SortedRun};
pub use export::{DanglingPolicy, DumpReport, DumpWriter};
pub use pipeline::{Pipeline, Stage};
pub use config::PipelineConfig;

// ============================================================================
// Re-exports: Read path
// ============================================================================

pub use storage::{GraphStore, ImportStats, MemoryStore};
pub use query::GraphClient;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Unknown namespace: {0}")]
    UnknownNamespace(String),

    #[error("Malformed identifier {namespace}:{local_id}: {reason}")]
    MalformedIdentifier {
        namespace: String,
        local_id: String,
        reason: String,
    },

    #[error("Dangling reference: {start} -[{relation_type}]-> {end} has an endpoint missing from the node table")]
    DanglingReference {
        start: String,
        end: String,
        relation_type: String,
    },

    #[error("Adapter '{adapter}' failed: {message}")]
    Adapter { adapter: String, message: String },

    #[error("Duplicate source name: {0}")]
    DuplicateSource(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Dump of '{name}' failed during {stage} stage ({rejections}): {cause}")]
    DumpFailed {
        name: String,
        stage: Stage,
        rejections: RejectionCounts,
        #[source]
        cause: Box<Error>,
    },

    #[error("Publishing {target} failed ({cause}); previous dump kept at {retained}")]
    PublishFailed {
        target: std::path::PathBuf,
        retained: std::path::PathBuf,
        cause: String,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<IdentityError> for Error {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::UnknownNamespace(ns) => Error::UnknownNamespace(ns),
            IdentityError::MalformedIdentifier { namespace, local_id, reason } => {
                Error::MalformedIdentifier { namespace, local_id, reason }
            }
        }
    }
}

impl Error {
    /// Convenience for adapters that fail closed.
    pub fn adapter(adapter: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Error::Adapter { adapter: adapter.into(), message: message.to_string() }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
