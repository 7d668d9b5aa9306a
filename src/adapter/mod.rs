//! # Source Adapter Contract
//!
//! One adapter per external data source. An adapter produces two lazy,
//! finite, single-pass streams: nodes and relations. Identifiers are raw;
//! normalization happens downstream so adapters never depend on the global
//! identity rules.
//!
//! ## Rules every adapter follows
//!
//! - **Fail closed.** If the stream cannot be produced, return `Err`. An
//!   empty stream means "the source had nothing", never "the fetch failed".
//! - **Idempotent.** The same upstream snapshot yields the same stream.
//!   Network fetches and caches are the adapter's business, including their
//!   timeouts and retries.
//! - **Name = output directory.** Two adapters with the same name would
//!   race on the same files.
//!
//! ## Implementations
//!
//! | Adapter | Module | Description |
//! |---------|--------|-------------|
//! | `InMemoryAdapter` | `memory` | Pre-built vectors, for embedding and tests |
//! | `JsonlAdapter` | `jsonl` | `nodes.jsonl[.gz]` / `relations.jsonl[.gz]` in a directory |
//! | `ChainAdapter` | `chain` | Several adapters concatenated under one name |

pub mod chain;
pub mod jsonl;
pub mod memory;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::dedup::MergeRule;
use crate::model::{Node, Relation};
use crate::{Error, Result};

pub use chain::ChainAdapter;
pub use jsonl::JsonlAdapter;
pub use memory::InMemoryAdapter;

pub type NodeStream<'a> = Box<dyn Iterator<Item = Result<Node>> + 'a>;
pub type RelationStream<'a> = Box<dyn Iterator<Item = Result<Relation>> + 'a>;

// ============================================================================
// SourceAdapter Trait
// ============================================================================

/// The producer contract each external data source implements.
pub trait SourceAdapter: Send {
    /// Source name; also the output directory name.
    fn name(&self) -> &str;

    /// Human-readable description per relation type this source emits.
    fn descriptions(&self) -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    /// How duplicate node mentions from this source collapse.
    fn merge_rule(&self) -> MergeRule {
        MergeRule::FirstSeen
    }

    /// Every node relevant to this source.
    fn nodes(&mut self) -> Result<NodeStream<'_>>;

    /// Every relation relevant to this source.
    fn relations(&mut self) -> Result<RelationStream<'_>>;
}

// ============================================================================
// Registry
// ============================================================================

/// What constructors get to see.
#[derive(Debug, Clone, Default)]
pub struct AdapterContext {
    /// Root under which file-based sources find their inputs.
    pub input_root: PathBuf,
}

impl AdapterContext {
    pub fn new(input_root: impl Into<PathBuf>) -> Self {
        Self { input_root: input_root.into() }
    }

    pub fn source_dir(&self, name: &str) -> PathBuf {
        self.input_root.join(name)
    }
}

type Constructor = Box<dyn Fn(&AdapterContext) -> Result<Box<dyn SourceAdapter>> + Send + Sync>;

/// Source name → constructor. Built explicitly and handed to the driver;
/// there is no global registry.
#[derive(Default)]
pub struct AdapterRegistry {
    constructors: BTreeMap<String, Constructor>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: impl Into<String>, constructor: F) -> Result<()>
    where
        F: Fn(&AdapterContext) -> Result<Box<dyn SourceAdapter>> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.constructors.contains_key(&name) {
            return Err(Error::DuplicateSource(name));
        }
        self.constructors.insert(name, Box::new(constructor));
        Ok(())
    }

    /// Register a `JsonlAdapter` that reads `<input_root>/<name>/`.
    pub fn register_jsonl(&mut self, name: impl Into<String>, rule: MergeRule) -> Result<()> {
        let name = name.into();
        let adapter_name = name.clone();
        self.register(name, move |ctx: &AdapterContext| {
            let adapter = JsonlAdapter::new(&adapter_name, ctx.source_dir(&adapter_name)).with_merge_rule(rule);
            Ok(Box::new(adapter) as Box<dyn SourceAdapter>)
        })
    }

    /// Register a `JsonlAdapter` for every subdirectory of `input_root`
    /// that contains a nodes file.
    pub fn discover_jsonl(&mut self, input_root: &Path, rule: MergeRule) -> Result<usize> {
        let mut found = 0;
        let mut entries: Vec<_> = std::fs::read_dir(input_root)?.collect::<std::io::Result<_>>()?;
        entries.sort_by_key(|e| e.file_name());
        for entry in entries {
            let path = entry.path();
            if !path.is_dir() || jsonl::find_input(&path, "nodes").is_none() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            self.register_jsonl(name, rule)?;
            found += 1;
        }
        Ok(found)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    pub fn build(&self, name: &str, ctx: &AdapterContext) -> Result<Box<dyn SourceAdapter>> {
        let constructor = self
            .constructors
            .get(name)
            .ok_or_else(|| Error::NotFound(format!("source adapter '{name}'")))?;
        constructor(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_rejects_duplicates() {
        let mut registry = AdapterRegistry::new();
        registry
            .register("disgenet", |_| Ok(Box::new(InMemoryAdapter::new("disgenet")) as Box<dyn SourceAdapter>))
            .unwrap();
        let again = registry.register("disgenet", |_| {
            Ok(Box::new(InMemoryAdapter::new("disgenet")) as Box<dyn SourceAdapter>)
        });
        assert!(matches!(again, Err(Error::DuplicateSource(name)) if name == "disgenet"));
    }

    #[test]
    fn test_registry_build() {
        let mut registry = AdapterRegistry::new();
        registry
            .register("bgee", |_| Ok(Box::new(InMemoryAdapter::new("bgee")) as Box<dyn SourceAdapter>))
            .unwrap();
        let ctx = AdapterContext::default();
        assert_eq!(registry.build("bgee", &ctx).unwrap().name(), "bgee");
        assert!(matches!(registry.build("sider", &ctx), Err(Error::NotFound(_))));
        assert_eq!(registry.names().collect::<Vec<_>>(), ["bgee"]);
    }

    #[test]
    fn test_discover_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("pathways")).unwrap();
        std::fs::write(dir.path().join("pathways/nodes.jsonl"), "").unwrap();
        std::fs::create_dir(dir.path().join("empty")).unwrap();

        let mut registry = AdapterRegistry::new();
        let found = registry.discover_jsonl(dir.path(), MergeRule::FirstSeen).unwrap();
        assert_eq!(found, 1);
        assert!(registry.contains("pathways"));
        assert!(!registry.contains("empty"));
    }
}
