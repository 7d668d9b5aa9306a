//! Bulk importer for published dumps.
//!
//! Reads `nodes.tsv.gz` and `edges.tsv.gz` back into a [`MemoryStore`],
//! the way the database's offline import tool would. Column headers carry
//! the value type:
//!
//! | Header suffix | Value |
//! |---------------|-------|
//! | `:int`, `:long` | `Int` |
//! | `:float`, `:double` | `Float` |
//! | `:boolean` | `Bool` |
//! | `:string[]` (any `[]`) | `List` of strings, split on `;` |
//! | none / `:string` | `String` |
//!
//! Property keys keep their header text verbatim, suffix included, so a
//! reimported graph carries the same keys the adapters emitted. Empty
//! cells are absent properties.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

use flate2::read::GzDecoder;
use tracing::info;

use crate::export::{EDGES_FILE, NODES_FILE};
use crate::identity::Curie;
use crate::model::{Grounding, Node, Relation, Value};
use crate::Result;

use super::MemoryStore;

/// How many records an import loaded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportStats {
    pub nodes: u64,
    pub relationships: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnType {
    Int,
    Float,
    Bool,
    List,
    Text,
}

impl ColumnType {
    fn of(header: &str) -> Self {
        let Some((_, suffix)) = header.rsplit_once(':') else {
            return ColumnType::Text;
        };
        match suffix.to_ascii_lowercase().as_str() {
            "int" | "long" => ColumnType::Int,
            "float" | "double" => ColumnType::Float,
            "boolean" => ColumnType::Bool,
            s if s.ends_with("[]") => ColumnType::List,
            _ => ColumnType::Text,
        }
    }

    fn decode(self, header: &str, cell: &str) -> Result<Value> {
        let bad = || invalid(format!("cannot read {cell:?} in column {header}"));
        Ok(match self {
            ColumnType::Int => Value::Int(cell.parse().map_err(|_| bad())?),
            ColumnType::Float => Value::Float(cell.parse().map_err(|_| bad())?),
            ColumnType::Bool => Value::Bool(cell.parse().map_err(|_| bad())?),
            ColumnType::List => Value::List(cell.split(';').map(Value::from).collect()),
            ColumnType::Text => Value::from(cell),
        })
    }
}

fn invalid(message: String) -> crate::Error {
    io::Error::new(io::ErrorKind::InvalidData, message).into()
}

fn parse_key(cell: &str) -> Result<Grounding> {
    Curie::parse(cell)
        .map(|curie| curie.grounding())
        .ok_or_else(|| invalid(format!("not a node id: {cell:?}")))
}

fn open_table(path: &Path) -> Result<csv::Reader<GzDecoder<BufReader<File>>>> {
    let file = BufReader::new(File::open(path)?);
    Ok(csv::ReaderBuilder::new().delimiter(b'\t').from_reader(GzDecoder::new(file)))
}

/// Property columns after the fixed ones: (header, type).
fn property_columns(headers: &csv::StringRecord, fixed: usize) -> Vec<(String, ColumnType)> {
    headers.iter().skip(fixed).map(|h| (h.to_string(), ColumnType::of(h))).collect()
}

impl MemoryStore {
    /// Load one published dump directory. Nodes are loaded before edges, so
    /// every edge endpoint must be in the node table.
    pub fn import_dump(&self, dir: impl AsRef<Path>) -> Result<ImportStats> {
        let dir = dir.as_ref();
        let mut stats = ImportStats::default();

        let mut reader = open_table(&dir.join(NODES_FILE))?;
        let columns = property_columns(reader.headers()?, 2);
        for record in reader.records() {
            let record = record?;
            let key = parse_key(record.get(0).unwrap_or_default())?;
            let labels = record.get(1).unwrap_or_default();
            let mut node = Node::new(key.namespace, key.local_id)
                .with_labels(labels.split(';').filter(|l| !l.is_empty()));
            for ((header, kind), cell) in columns.iter().zip(record.iter().skip(2)) {
                if !cell.is_empty() {
                    node.properties.insert(header.clone(), kind.decode(header, cell)?);
                }
            }
            self.insert_node(node);
            stats.nodes += 1;
        }

        let mut reader = open_table(&dir.join(EDGES_FILE))?;
        let columns = property_columns(reader.headers()?, 3);
        for record in reader.records() {
            let record = record?;
            let start = parse_key(record.get(0).unwrap_or_default())?;
            let end = parse_key(record.get(1).unwrap_or_default())?;
            let mut relation = Relation::new(start, end, record.get(2).unwrap_or_default());
            for ((header, kind), cell) in columns.iter().zip(record.iter().skip(3)) {
                if !cell.is_empty() {
                    relation.properties.insert(header.clone(), kind.decode(header, cell)?);
                }
            }
            self.insert_relation(relation)?;
            stats.relationships += 1;
        }

        info!(dir = %dir.display(), nodes = stats.nodes, relationships = stats.relationships, "dump imported");
        Ok(stats)
    }
}
