//! # Dedup & Ordering Stage
//!
//! The one stage that is not streaming: it drains a whole validated stream,
//! sorts it, collapses duplicates, and materializes the result as a
//! [`SortedRun`] the dump writer can read back.
//!
//! ```text
//! validated stream ─▶ ExternalSorter ─(spill runs)─▶ k-way merge
//!                  ─▶ collapse equal keys ─▶ SortedRun (memory or temp file)
//! ```
//!
//! Output order depends only on the input *set*: records are ordered by
//! their key and, within a key, by arrival. Collapsing then applies the
//! merge rule, so the same input in any order produces the same keys in
//! the same order.

mod external_sort;

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Lines, Write};
use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::info;

use crate::model::{merge_missing, Node, Relation};
use crate::Result;

use external_sort::ExternalSorter;

// ============================================================================
// Merge rule
// ============================================================================

/// How duplicate nodes collapse. Relations always use `Union`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeRule {
    /// The earliest occurrence is kept whole.
    #[default]
    FirstSeen,
    /// Labels and property keys are unioned; on a key conflict the
    /// earliest value is kept.
    Union,
}

// ============================================================================
// Record
// ============================================================================

/// Something the dedup stage can sort, spill and collapse.
pub trait Record: Serialize + DeserializeOwned + Clone {
    type Key: Ord + Clone;

    /// Identity and sort position in one.
    fn sort_key(&self) -> Self::Key;

    /// Fold a later duplicate into `self`.
    fn absorb(&mut self, later: Self, rule: MergeRule);

    fn property_keys(&self) -> impl Iterator<Item = &String>;
}

impl Record for Node {
    type Key = (String, String);

    fn sort_key(&self) -> Self::Key {
        (self.namespace.clone(), self.local_id.clone())
    }

    fn absorb(&mut self, later: Self, rule: MergeRule) {
        if rule == MergeRule::Union {
            for label in later.labels {
                self.push_label(label);
            }
            merge_missing(&mut self.properties, later.properties);
        }
    }

    fn property_keys(&self) -> impl Iterator<Item = &String> {
        self.properties.keys()
    }
}

impl Record for Relation {
    /// (source ns, source id, target ns, target id, type)
    type Key = (String, String, String, String, String);

    fn sort_key(&self) -> Self::Key {
        (
            self.source.namespace.clone(),
            self.source.local_id.clone(),
            self.target.namespace.clone(),
            self.target.local_id.clone(),
            self.relation_type.clone(),
        )
    }

    fn absorb(&mut self, later: Self, _rule: MergeRule) {
        merge_missing(&mut self.properties, later.properties);
    }

    fn property_keys(&self) -> impl Iterator<Item = &String> {
        self.properties.keys()
    }
}

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone)]
pub struct DedupConfig {
    /// Records held in memory before a sorted run is spilled to disk.
    pub spill_threshold: usize,
    /// Where spill files go; the system temp dir if unset.
    pub spill_dir: Option<PathBuf>,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self { spill_threshold: 500_000, spill_dir: None }
    }
}

// ============================================================================
// SortedRun
// ============================================================================

/// Deduplicated, ordered records plus the union of their property keys.
pub struct SortedRun<T> {
    storage: RunStorage<T>,
    len: u64,
    property_keys: BTreeSet<String>,
}

enum RunStorage<T> {
    Memory(Vec<T>),
    Disk(NamedTempFile),
}

impl<T: Record> SortedRun<T> {
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_spilled(&self) -> bool {
        matches!(self.storage, RunStorage::Disk(_))
    }

    /// Sorted union of every property key in the run.
    pub fn property_keys(&self) -> &BTreeSet<String> {
        &self.property_keys
    }

    /// Iterate the run from the start. May be called any number of times.
    pub fn iter(&self) -> Result<RunIter<'_, T>> {
        match &self.storage {
            RunStorage::Memory(items) => Ok(RunIter::Memory(items.iter())),
            RunStorage::Disk(file) => {
                let reader = BufReader::new(File::open(file.path())?);
                Ok(RunIter::Disk(reader.lines(), std::marker::PhantomData))
            }
        }
    }

    /// Collect into memory. Intended for tests and small runs.
    pub fn to_vec(&self) -> Result<Vec<T>> {
        self.iter()?.collect()
    }
}

pub enum RunIter<'a, T> {
    Memory(std::slice::Iter<'a, T>),
    Disk(Lines<BufReader<File>>, std::marker::PhantomData<T>),
}

impl<T: Record> Iterator for RunIter<'_, T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            RunIter::Memory(iter) => iter.next().cloned().map(Ok),
            RunIter::Disk(lines, _) => lines.next().map(|line| -> Result<T> {
                let line = line?;
                Ok(serde_json::from_str(&line)?)
            }),
        }
    }
}

/// Accumulates collapsed records, moving to a temp file past the threshold.
struct RunBuilder<T> {
    threshold: usize,
    spill_dir: Option<PathBuf>,
    memory: Vec<T>,
    disk: Option<(BufWriter<File>, NamedTempFile)>,
    len: u64,
    property_keys: BTreeSet<String>,
}

impl<T: Record> RunBuilder<T> {
    fn new(config: &DedupConfig) -> Self {
        Self {
            threshold: config.spill_threshold.max(1),
            spill_dir: config.spill_dir.clone(),
            memory: Vec::new(),
            disk: None,
            len: 0,
            property_keys: BTreeSet::new(),
        }
    }

    fn push(&mut self, item: T) -> Result<()> {
        for key in item.property_keys() {
            if !self.property_keys.contains(key) {
                self.property_keys.insert(key.clone());
            }
        }
        self.len += 1;

        if self.disk.is_none() && self.memory.len() >= self.threshold {
            let file = match &self.spill_dir {
                Some(dir) => NamedTempFile::new_in(dir)?,
                None => NamedTempFile::new()?,
            };
            let mut writer = BufWriter::new(file.reopen()?);
            for buffered in self.memory.drain(..) {
                write_line(&mut writer, &buffered)?;
            }
            self.disk = Some((writer, file));
        }
        match &mut self.disk {
            Some((writer, _)) => write_line(writer, &item),
            None => {
                self.memory.push(item);
                Ok(())
            }
        }
    }

    fn finish(self) -> Result<SortedRun<T>> {
        let storage = match self.disk {
            Some((mut writer, file)) => {
                writer.flush()?;
                RunStorage::Disk(file)
            }
            None => RunStorage::Memory(self.memory),
        };
        Ok(SortedRun { storage, len: self.len, property_keys: self.property_keys })
    }
}

fn write_line<T: Serialize>(writer: &mut BufWriter<File>, item: &T) -> Result<()> {
    serde_json::to_writer(&mut *writer, item)?;
    writer.write_all(b"\n")?;
    Ok(())
}

// ============================================================================
// Stage entry points
// ============================================================================

/// Sort, collapse and materialize a validated stream.
pub fn dedup<T, I>(items: I, rule: MergeRule, config: &DedupConfig) -> Result<SortedRun<T>>
where
    T: Record,
    I: IntoIterator<Item = T>,
{
    let mut sorter = ExternalSorter::new(config.spill_threshold, config.spill_dir.clone());
    for item in items {
        sorter.push(item)?;
    }
    let received = sorter.pushed();
    let spilled_runs = sorter.spilled_runs();

    let mut builder = RunBuilder::new(config);
    let mut current: Option<(T::Key, T)> = None;
    for item in sorter.finish()? {
        let item = item?;
        let key = item.sort_key();
        if let Some((current_key, kept)) = current.as_mut() {
            if *current_key == key {
                kept.absorb(item, rule);
                continue;
            }
        }
        if let Some((_, done)) = current.replace((key, item)) {
            builder.push(done)?;
        }
    }
    if let Some((_, done)) = current {
        builder.push(done)?;
    }

    let run = builder.finish()?;
    info!(
        received,
        unique = run.len(),
        duplicates = received - run.len(),
        spilled_runs,
        "dedup finished"
    );
    Ok(run)
}

pub fn dedup_nodes<I>(nodes: I, rule: MergeRule, config: &DedupConfig) -> Result<SortedRun<Node>>
where
    I: IntoIterator<Item = Node>,
{
    dedup(nodes, rule, config)
}

pub fn dedup_relations<I>(relations: I, config: &DedupConfig) -> Result<SortedRun<Relation>>
where
    I: IntoIterator<Item = Relation>,
{
    dedup(relations, MergeRule::Union, config)
}
