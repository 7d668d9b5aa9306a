//! Bulk dump writer: serialize one source's graph as bulk-load tables.
//!
//! Produces the tab-separated layout the graph database's offline import
//! tool consumes:
//!
//! ```text
//! <output_root>/<source>/
//!   nodes.tsv.gz        id:ID  :LABEL  <property keys...>
//!   nodes_sample.tsv    first N rows of the above, uncompressed
//!   edges.tsv.gz        :START_ID  :END_ID  :TYPE  <property keys...>
//!   edges_sample.tsv
//!   edges_summary.tsv   source_ns  rel  target_ns  count
//! ```
//!
//! Everything is written into a staging directory next to the final one
//! and published with a rename. A failed dump drops the staging directory
//! and leaves any previously published dump in place.

use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use hashbrown::HashSet;
use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use tracing::{debug, error, info, warn};

use crate::dedup::SortedRun;
use crate::model::{Grounding, Node, Relation};
use crate::validate::RejectionCounts;
use crate::{Error, Result};

pub const NODES_FILE: &str = "nodes.tsv.gz";
pub const NODES_SAMPLE_FILE: &str = "nodes_sample.tsv";
pub const EDGES_FILE: &str = "edges.tsv.gz";
pub const EDGES_SAMPLE_FILE: &str = "edges_sample.tsv";
pub const SUMMARY_FILE: &str = "edges_summary.tsv";

const SUMMARY_HEADER: [&str; 4] = ["source_ns", "rel", "target_ns", "count"];

/// What happens to an edge whose endpoint is not in the node table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DanglingPolicy {
    /// Drop the edge, count it, and warn once with the total.
    #[default]
    Drop,
    /// Abort the dump.
    Fail,
}

/// One row of `edges_summary.tsv`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SummaryRow {
    pub source_ns: String,
    pub relation_type: String,
    pub target_ns: String,
    pub count: u64,
}

/// Result of a published dump.
#[derive(Debug, Clone)]
pub struct DumpReport {
    pub source: String,
    pub dir: PathBuf,
    pub nodes_written: u64,
    pub edges_written: u64,
    pub dangling_dropped: u64,
    pub summary: Vec<SummaryRow>,
    pub rejections: RejectionCounts,
    /// Relation type → description, as given by the adapter.
    pub descriptions: BTreeMap<String, String>,
}

// ============================================================================
// DumpWriter
// ============================================================================

#[derive(Debug, Clone)]
pub struct DumpWriter {
    output_root: PathBuf,
    sample_size: usize,
    dangling: DanglingPolicy,
}

impl DumpWriter {
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self { output_root: output_root.into(), sample_size: 10, dangling: DanglingPolicy::Drop }
    }

    pub fn with_sample_size(mut self, sample_size: usize) -> Self {
        self.sample_size = sample_size;
        self
    }

    pub fn with_dangling(mut self, dangling: DanglingPolicy) -> Self {
        self.dangling = dangling;
        self
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Final directory for a source.
    pub fn source_dir(&self, source: &str) -> PathBuf {
        self.output_root.join(source)
    }

    /// Write and publish in one step.
    pub fn write(
        &self,
        source: &str,
        nodes: &SortedRun<Node>,
        relations: &SortedRun<Relation>,
    ) -> Result<DumpReport> {
        self.stage(source, nodes, relations)?.publish()
    }

    /// Write every artifact into a fresh staging directory. Nothing is
    /// visible under the source directory until [`StagedDump::publish`].
    ///
    /// Rows stream from the sorted runs, but the dangling-edge check keeps
    /// every distinct node grounding in an in-memory set for the duration
    /// of the relation pass. Memory is therefore bounded by the spill
    /// threshold plus one `Grounding` per distinct node.
    pub fn stage(
        &self,
        source: &str,
        nodes: &SortedRun<Node>,
        relations: &SortedRun<Relation>,
    ) -> Result<StagedDump> {
        fs::create_dir_all(&self.output_root)?;
        let staging = tempfile::Builder::new()
            .prefix(&format!(".{source}.staging-"))
            .tempdir_in(&self.output_root)?;

        // Pass 2 over nodes: rows out, node keys into the membership set.
        let node_keys: Vec<&str> = nodes.property_keys().iter().map(String::as_str).collect();
        let mut header = vec!["id:ID", ":LABEL"];
        header.extend(&node_keys);
        let mut table = TableWriter::create(staging.path(), NODES_FILE, NODES_SAMPLE_FILE, &header, self.sample_size)?;
        let mut known: HashSet<Grounding> = HashSet::with_capacity(nodes.len() as usize);
        for node in nodes.iter()? {
            let node = node?;
            let mut row = Vec::with_capacity(header.len());
            row.push(node.grounding().to_string());
            row.push(node.labels.join(";"));
            for key in &node_keys {
                row.push(node.properties.get(*key).map(|v| v.to_cell()).unwrap_or_default());
            }
            table.write_row(&row)?;
            known.insert(node.grounding());
        }
        let nodes_written = table.finish()?;

        // Pass 2 over relations, checked against the node set.
        let edge_keys: Vec<&str> = relations.property_keys().iter().map(String::as_str).collect();
        let mut header = vec![":START_ID", ":END_ID", ":TYPE"];
        header.extend(&edge_keys);
        let mut table = TableWriter::create(staging.path(), EDGES_FILE, EDGES_SAMPLE_FILE, &header, self.sample_size)?;
        let mut triples: BTreeMap<(String, String, String), u64> = BTreeMap::new();
        let mut dangling_dropped = 0u64;
        for relation in relations.iter()? {
            let relation = relation?;
            if !known.contains(&relation.source) || !known.contains(&relation.target) {
                if self.dangling == DanglingPolicy::Fail {
                    return Err(Error::DanglingReference {
                        start: relation.source.to_string(),
                        end: relation.target.to_string(),
                        relation_type: relation.relation_type,
                    });
                }
                debug!(
                    source,
                    start = %relation.source,
                    end = %relation.target,
                    relation_type = %relation.relation_type,
                    "dropping dangling edge"
                );
                dangling_dropped += 1;
                continue;
            }
            let mut row = Vec::with_capacity(header.len());
            row.push(relation.source.to_string());
            row.push(relation.target.to_string());
            row.push(relation.relation_type.clone());
            for key in &edge_keys {
                row.push(relation.properties.get(*key).map(|v| v.to_cell()).unwrap_or_default());
            }
            table.write_row(&row)?;
            *triples
                .entry((relation.source.namespace, relation.relation_type, relation.target.namespace))
                .or_default() += 1;
        }
        let edges_written = table.finish()?;
        if dangling_dropped > 0 {
            warn!(source, dangling_dropped, "dropped edges with an endpoint missing from the node table");
        }

        let summary = summarize(triples);
        write_summary(&staging.path().join(SUMMARY_FILE), &summary)?;

        info!(source, nodes_written, edges_written, "dump staged");
        Ok(StagedDump {
            staging,
            target: self.source_dir(source),
            report: DumpReport {
                source: source.to_string(),
                dir: self.source_dir(source),
                nodes_written,
                edges_written,
                dangling_dropped,
                summary,
                rejections: RejectionCounts::default(),
                descriptions: BTreeMap::new(),
            },
        })
    }
}

// ============================================================================
// Publishing
// ============================================================================

/// A fully written dump that has not been published yet. Dropping it
/// removes the staging directory.
pub struct StagedDump {
    staging: TempDir,
    target: PathBuf,
    report: DumpReport,
}

impl StagedDump {
    pub fn report_mut(&mut self) -> &mut DumpReport {
        &mut self.report
    }

    /// Replace `<output_root>/<source>/` with the staged directory.
    pub fn publish(self) -> Result<DumpReport> {
        swap_in(self.staging.path(), &self.target, |from, to| fs::rename(from, to))?;
        info!(source = %self.report.source, dir = %self.target.display(), "dump published");
        Ok(self.report)
    }
}

/// Move `staging` to `target`, retiring whatever `target` held.
///
/// An existing dump is moved aside first; a directory rename cannot
/// replace a non-empty directory. If the swap fails it is moved back. If
/// that also fails the retired directory is kept on disk and named in
/// [`Error::PublishFailed`].
fn swap_in(staging: &Path, target: &Path, rename: impl Fn(&Path, &Path) -> io::Result<()>) -> Result<()> {
    let parent = target.parent().unwrap_or(Path::new("."));
    let retired = if target.exists() {
        let holder = tempfile::Builder::new().prefix(".retired-").tempdir_in(parent)?;
        let moved = holder.path().join("dump");
        rename(target, &moved)?;
        Some((holder, moved))
    } else {
        None
    };

    // On success the retired holder is removed on drop.
    let Err(err) = rename(staging, target) else {
        return Ok(());
    };
    if let Some((holder, moved)) = retired {
        if let Err(restore) = rename(&moved, target) {
            let retained = holder.keep().join("dump");
            error!(dir = %target.display(), retained = %retained.display(), %restore, "could not restore previous dump");
            return Err(Error::PublishFailed {
                target: target.to_path_buf(),
                retained,
                cause: err.to_string(),
            });
        }
    }
    Err(err.into())
}

// ============================================================================
// Table files
// ============================================================================

/// Writes one gzip table and its uncompressed sample side by side.
struct TableWriter {
    table: csv::Writer<GzEncoder<BufWriter<File>>>,
    sample: csv::Writer<BufWriter<File>>,
    sample_left: usize,
    rows: u64,
}

impl TableWriter {
    fn create(dir: &Path, table: &str, sample: &str, header: &[&str], sample_size: usize) -> Result<Self> {
        // The default gzip header carries no file name and a zero mtime.
        let gz = GzEncoder::new(BufWriter::new(File::create(dir.join(table))?), Compression::default());
        let mut table = tsv_writer(gz);
        let mut sample = tsv_writer(BufWriter::new(File::create(dir.join(sample))?));
        table.write_record(header)?;
        sample.write_record(header)?;
        Ok(Self { table, sample, sample_left: sample_size, rows: 0 })
    }

    fn write_row(&mut self, row: &[String]) -> Result<()> {
        self.table.write_record(row)?;
        if self.sample_left > 0 {
            self.sample.write_record(row)?;
            self.sample_left -= 1;
        }
        self.rows += 1;
        Ok(())
    }

    fn finish(self) -> Result<u64> {
        let gz = self.table.into_inner().map_err(|e| Error::Io(e.into_error()))?;
        let file = gz.finish()?.into_inner().map_err(|e| Error::Io(e.into_error()))?;
        file.sync_all()?;
        let file = self.sample.into_inner().map_err(|e| Error::Io(e.into_error()))?;
        file.into_inner().map_err(|e| Error::Io(e.into_error()))?.sync_all()?;
        Ok(self.rows)
    }
}

fn tsv_writer<W: Write>(inner: W) -> csv::Writer<W> {
    csv::WriterBuilder::new().delimiter(b'\t').from_writer(inner)
}

// ============================================================================
// Summary
// ============================================================================

/// Rows by descending count, ties by ascending triple.
fn summarize(triples: BTreeMap<(String, String, String), u64>) -> Vec<SummaryRow> {
    let mut rows: Vec<SummaryRow> = triples
        .into_iter()
        .map(|((source_ns, relation_type, target_ns), count)| SummaryRow {
            source_ns,
            relation_type,
            target_ns,
            count,
        })
        .collect();
    rows.sort_by(|a, b| {
        (Reverse(a.count), &a.source_ns, &a.relation_type, &a.target_ns)
            .cmp(&(Reverse(b.count), &b.source_ns, &b.relation_type, &b.target_ns))
    });
    rows
}

fn write_summary(path: &Path, rows: &[SummaryRow]) -> Result<()> {
    let mut writer = tsv_writer(BufWriter::new(File::create(path)?));
    writer.write_record(SUMMARY_HEADER)?;
    for row in rows {
        writer.write_record([
            row.source_ns.as_str(),
            row.relation_type.as_str(),
            row.target_ns.as_str(),
            row.count.to_string().as_str(),
        ])?;
    }
    let file = writer.into_inner().map_err(|e| Error::Io(e.into_error()))?;
    file.into_inner().map_err(|e| Error::Io(e.into_error()))?.sync_all()?;
    Ok(())
}

/// Read back `edges_summary.tsv` from a published dump.
pub fn read_summary(dir: &Path) -> Result<Vec<SummaryRow>> {
    let path = dir.join(SUMMARY_FILE);
    if !path.is_file() {
        return Err(Error::NotFound(format!("summary {}", path.display())));
    }
    let mut reader = csv::ReaderBuilder::new().delimiter(b'\t').from_path(path)?;
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let field = |i: usize| record.get(i).unwrap_or_default().to_string();
        let count = field(3).parse().map_err(|_| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, format!("bad count in summary row {record:?}"))
        })?;
        rows.push(SummaryRow { source_ns: field(0), relation_type: field(1), target_ns: field(2), count });
    }
    Ok(rows)
}
