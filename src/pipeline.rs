//! # Pipeline Driver
//!
//! Wires one adapter through every write-path stage:
//!
//! ```text
//! adapter.nodes()     ─▶ Validator ─▶ dedup ─┐
//! adapter.relations() ─▶ Validator ─▶ dedup ─┴▶ DumpWriter::stage ─▶ publish
//! ```
//!
//! A failed run returns [`Error::DumpFailed`] with the stage it stopped in
//! and the rejection counts gathered so far. Nothing is published.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::adapter::{AdapterContext, AdapterRegistry, ChainAdapter, SourceAdapter};
use crate::config::PipelineConfig;
use crate::dedup::{dedup_nodes, dedup_relations, MergeRule};
use crate::export::DumpReport;
use crate::identity::NamespaceRegistry;
use crate::validate::Validator;
use crate::{Error, Result};

/// Where a run was when it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Nodes,
    Relations,
    Dedup,
    Write,
    Publish,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Nodes => write!(f, "nodes"),
            Stage::Relations => write!(f, "relations"),
            Stage::Dedup => write!(f, "dedup"),
            Stage::Write => write!(f, "write"),
            Stage::Publish => write!(f, "publish"),
        }
    }
}

// ============================================================================
// Pipeline
// ============================================================================

pub struct Pipeline {
    config: PipelineConfig,
    registry: NamespaceRegistry,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config, registry: NamespaceRegistry::default() }
    }

    /// Use a caller-built namespace registry instead of the built-in one.
    pub fn with_registry(mut self, registry: NamespaceRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Dump one source. Sources are independent; running the same source
    /// twice at once is the caller's mistake.
    pub fn run(&self, mut adapter: Box<dyn SourceAdapter>) -> Result<DumpReport> {
        let name = adapter.name().to_string();
        info!(source = %name, "dump started");

        let mut validator = Validator::new(&self.registry);
        let mut stage = Stage::Nodes;
        let outcome = self.run_stages(adapter.as_mut(), &mut validator, &mut stage);
        let rejections = validator.into_counts();

        match outcome {
            Ok(mut report) => {
                info!(
                    source = %name,
                    nodes = report.nodes_written,
                    edges = report.edges_written,
                    rejected = rejections.total(),
                    "dump finished"
                );
                report.rejections = rejections;
                Ok(report)
            }
            Err(cause) => {
                error!(source = %name, %stage, %rejections, "dump failed: {cause}");
                Err(Error::DumpFailed { name, stage, rejections, cause: Box::new(cause) })
            }
        }
    }

    fn run_stages(
        &self,
        adapter: &mut dyn SourceAdapter,
        validator: &mut Validator<'_>,
        stage: &mut Stage,
    ) -> Result<DumpReport> {
        let name = adapter.name().to_string();
        let dedup_config = self.config.dedup_config();
        let rule = adapter.merge_rule();

        *stage = Stage::Nodes;
        let mut failed = None;
        let sorted = {
            let stream = adapter.nodes()?;
            dedup_nodes(
                validator.validate_nodes(UntilError::new(stream, &mut failed)),
                rule,
                &dedup_config,
            )
        };
        if let Some(err) = failed {
            return Err(err);
        }
        *stage = Stage::Dedup;
        let nodes = sorted?;

        *stage = Stage::Relations;
        let mut failed = None;
        let sorted = {
            let stream = adapter.relations()?;
            dedup_relations(validator.validate_relations(UntilError::new(stream, &mut failed)), &dedup_config)
        };
        if let Some(err) = failed {
            return Err(err);
        }
        *stage = Stage::Dedup;
        let relations = sorted?;
        validator.report(&name);

        *stage = Stage::Write;
        let mut staged = self.config.dump_writer().stage(&name, &nodes, &relations)?;
        staged.report_mut().descriptions = adapter.descriptions();

        *stage = Stage::Publish;
        staged.publish()
    }

    /// Dump several adapters as one source named `name`. Their streams are
    /// concatenated in list order before validation, so one key mentioned
    /// by several adapters collapses into one row and earlier adapters take
    /// precedence under the merge rule.
    pub fn run_merged(
        &self,
        name: &str,
        adapters: Vec<Box<dyn SourceAdapter>>,
        rule: MergeRule,
    ) -> Result<DumpReport> {
        self.run(Box::new(ChainAdapter::new(name, adapters).with_merge_rule(rule)))
    }

    /// Dump several distinct sources in parallel, one scoped thread each.
    /// Results come back in input order. Duplicate names fail the whole call
    /// before anything runs.
    pub fn run_all(&self, adapters: Vec<Box<dyn SourceAdapter>>) -> Result<Vec<Result<DumpReport>>> {
        let mut seen = BTreeSet::new();
        for adapter in &adapters {
            if !seen.insert(adapter.name().to_string()) {
                return Err(Error::DuplicateSource(adapter.name().to_string()));
            }
        }

        Ok(std::thread::scope(|scope| {
            let handles: Vec<_> = adapters
                .into_iter()
                .map(|adapter| {
                    let name = adapter.name().to_string();
                    (name, scope.spawn(move || self.run(adapter)))
                })
                .collect();
            handles
                .into_iter()
                .map(|(name, handle)| {
                    handle.join().unwrap_or_else(|_| Err(Error::adapter(name, "worker thread panicked")))
                })
                .collect()
        }))
    }

    /// Build the named sources from a registry and dump them.
    pub fn run_registered(
        &self,
        registry: &AdapterRegistry,
        names: &[String],
    ) -> Result<Vec<Result<DumpReport>>> {
        let ctx = AdapterContext::new(self.config.input_root());
        let adapters = names
            .iter()
            .map(|name| registry.build(name, &ctx))
            .collect::<Result<Vec<_>>>()?;
        self.run_all(adapters)
    }
}

// ============================================================================
// Stream error capture
// ============================================================================

/// Yields items until the first `Err`, which is parked in `slot`.
struct UntilError<'s, I> {
    inner: I,
    slot: &'s mut Option<Error>,
}

impl<'s, I> UntilError<'s, I> {
    fn new(inner: I, slot: &'s mut Option<Error>) -> Self {
        Self { inner, slot }
    }
}

impl<T, I> Iterator for UntilError<'_, I>
where
    I: Iterator<Item = Result<T>>,
{
    type Item = T;

    fn next(&mut self) -> Option<T> {
        if self.slot.is_some() {
            return None;
        }
        match self.inner.next()? {
            Ok(item) => Some(item),
            Err(err) => {
                *self.slot = Some(err);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{InMemoryAdapter, NodeStream, RelationStream};
    use crate::model::{Node, Relation};

    struct Broken;

    impl SourceAdapter for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn nodes(&mut self) -> Result<NodeStream<'_>> {
            Ok(Box::new(
                vec![Ok(Node::bio_entity("HGNC", "1100")), Err(Error::adapter("broken", "connection reset"))]
                    .into_iter(),
            ))
        }

        fn relations(&mut self) -> Result<RelationStream<'_>> {
            Ok(Box::new(std::iter::empty()))
        }
    }

    fn config(out: &std::path::Path) -> PipelineConfig {
        PipelineConfig { output_root: out.to_path_buf(), ..PipelineConfig::default() }
    }

    #[test]
    fn test_run_reports_rejections() {
        let out = tempfile::tempdir().unwrap();
        let adapter = InMemoryAdapter::new("disgenet")
            .with_nodes([
                Node::bio_entity("HGNC", "1100"),
                Node::bio_entity("MESH", "D001943"),
                Node::bio_entity("NOPE", "1"),
            ])
            .with_relations([Relation::new(("HGNC", "1100"), ("MESH", "D001943"), "gene_disease_association")]);

        let report = Pipeline::new(config(out.path())).run(Box::new(adapter)).unwrap();
        assert_eq!(report.nodes_written, 2);
        assert_eq!(report.edges_written, 1);
        assert_eq!(report.rejections.nodes, 1);
        assert!(out.path().join("disgenet").join("nodes.tsv.gz").is_file());
    }

    #[test]
    fn test_item_error_fails_the_run() {
        let out = tempfile::tempdir().unwrap();
        let err = Pipeline::new(config(out.path())).run(Box::new(Broken)).unwrap_err();
        match err {
            Error::DumpFailed { name, stage, cause, .. } => {
                assert_eq!(name, "broken");
                assert_eq!(stage, Stage::Nodes);
                assert!(matches!(*cause, Error::Adapter { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!out.path().join("broken").exists());
    }

    #[test]
    fn test_run_all_rejects_duplicate_names() {
        let out = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(config(out.path()));
        let err = pipeline
            .run_all(vec![Box::new(InMemoryAdapter::new("go")), Box::new(InMemoryAdapter::new("go"))])
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateSource(name) if name == "go"));
    }

    #[test]
    fn test_run_all_in_parallel() {
        let out = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(config(out.path()));
        let results = pipeline
            .run_all(vec![
                Box::new(InMemoryAdapter::new("go").with_nodes([Node::bio_entity("GO", "0003677")])),
                Box::new(Broken),
                Box::new(InMemoryAdapter::new("hp").with_nodes([Node::bio_entity("HP", "0000118")])),
            ])
            .unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().source, "go");
        assert!(results[1].is_err());
        assert_eq!(results[2].as_ref().unwrap().nodes_written, 1);
    }
}
