//! JSON-lines source adapter.
//!
//! Reads a source that has already been fetched and flattened to disk:
//!
//! ```text
//! <dir>/nodes.jsonl[.gz]       {"namespace", "local_id", "labels", "properties"}
//! <dir>/relations.jsonl[.gz]   {"source_ns", "source_id", "target_ns", "target_id",
//!                               "relation_type", "properties"}
//! ```
//!
//! Properties are plain JSON. A missing nodes file is an error; a missing
//! relations file means the source has no relations.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use serde::Deserialize;
use tracing::debug;

use crate::dedup::MergeRule;
use crate::model::{Node, PropertyMap, Relation, Value};
use crate::{Error, Result};

use super::{NodeStream, RelationStream, SourceAdapter};

pub struct JsonlAdapter {
    name: String,
    dir: PathBuf,
    merge_rule: MergeRule,
}

impl JsonlAdapter {
    pub fn new(name: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self { name: name.into(), dir: dir.into(), merge_rule: MergeRule::FirstSeen }
    }

    pub fn with_merge_rule(mut self, rule: MergeRule) -> Self {
        self.merge_rule = rule;
        self
    }

    fn lines(&self, stem: &str) -> Result<Option<impl Iterator<Item = (usize, Result<String>)> + use<>>> {
        let Some(path) = find_input(&self.dir, stem) else {
            return Ok(None);
        };
        debug!(adapter = %self.name, path = %path.display(), "opening input");
        let file = File::open(&path)?;
        let reader: Box<dyn Read + Send> = if path.extension().is_some_and(|e| e == "gz") {
            Box::new(GzDecoder::new(file))
        } else {
            Box::new(file)
        };
        let lines = BufReader::new(reader)
            .lines()
            .enumerate()
            .map(|(i, line)| (i + 1, line.map_err(Error::from)))
            .filter(|(_, line)| !matches!(line, Ok(l) if l.trim().is_empty()));
        Ok(Some(lines))
    }
}

/// `<dir>/<stem>.jsonl`, falling back to `<dir>/<stem>.jsonl.gz`.
pub(crate) fn find_input(dir: &Path, stem: &str) -> Option<PathBuf> {
    [format!("{stem}.jsonl"), format!("{stem}.jsonl.gz")]
        .into_iter()
        .map(|file| dir.join(file))
        .find(|path| path.is_file())
}

// ============================================================================
// Line formats
// ============================================================================

#[derive(Deserialize)]
struct NodeLine {
    namespace: String,
    local_id: String,
    #[serde(default)]
    labels: Vec<String>,
    #[serde(default)]
    properties: serde_json::Map<String, serde_json::Value>,
}

#[derive(Deserialize)]
struct RelationLine {
    source_ns: String,
    source_id: String,
    target_ns: String,
    target_id: String,
    relation_type: String,
    #[serde(default)]
    properties: serde_json::Map<String, serde_json::Value>,
}

fn into_properties(json: serde_json::Map<String, serde_json::Value>) -> PropertyMap {
    json.into_iter().map(|(k, v)| (k, Value::from(v))).collect()
}

impl From<NodeLine> for Node {
    fn from(line: NodeLine) -> Self {
        let mut node = Node::new(line.namespace, line.local_id).with_labels(line.labels);
        node.properties = into_properties(line.properties);
        node
    }
}

impl From<RelationLine> for Relation {
    fn from(line: RelationLine) -> Self {
        Relation::new((line.source_ns, line.source_id), (line.target_ns, line.target_id), line.relation_type)
            .with_properties(into_properties(line.properties))
    }
}

fn parse_line<L, T>(adapter: &str, file: &str, number: usize, line: Result<String>) -> Result<T>
where
    L: for<'de> Deserialize<'de> + Into<T>,
{
    let line = line?;
    let parsed: L = serde_json::from_str(&line)
        .map_err(|e| Error::adapter(adapter, format!("{file} line {number}: {e}")))?;
    Ok(parsed.into())
}

impl SourceAdapter for JsonlAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn merge_rule(&self) -> MergeRule {
        self.merge_rule
    }

    fn nodes(&mut self) -> Result<NodeStream<'_>> {
        let lines = self.lines("nodes")?.ok_or_else(|| {
            Error::adapter(&self.name, format!("no nodes.jsonl[.gz] in {}", self.dir.display()))
        })?;
        let name = self.name.clone();
        Ok(Box::new(
            lines.map(move |(n, line)| parse_line::<NodeLine, Node>(&name, "nodes", n, line)),
        ))
    }

    fn relations(&mut self) -> Result<RelationStream<'_>> {
        let Some(lines) = self.lines("relations")? else {
            return Ok(Box::new(std::iter::empty()));
        };
        let name = self.name.clone();
        Ok(Box::new(
            lines.map(move |(n, line)| parse_line::<RelationLine, Relation>(&name, "relations", n, line)),
        ))
    }
}
