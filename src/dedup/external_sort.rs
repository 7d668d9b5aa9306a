//! Bounded-memory sort: buffer, spill sorted runs to disk, k-way merge.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Lines, Seek, SeekFrom, Write};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::Record;
use crate::Result;

/// An item tagged with its arrival position. Sorting by `(key, seq)` keeps
/// duplicates in first-seen order.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Sequenced<T> {
    pub seq: u64,
    pub item: T,
}

pub(crate) struct ExternalSorter<T: Record> {
    buffer: Vec<Sequenced<T>>,
    runs: Vec<File>,
    threshold: usize,
    spill_dir: Option<PathBuf>,
    next_seq: u64,
}

impl<T: Record> ExternalSorter<T> {
    pub fn new(threshold: usize, spill_dir: Option<PathBuf>) -> Self {
        Self {
            buffer: Vec::new(),
            runs: Vec::new(),
            threshold: threshold.max(1),
            spill_dir,
            next_seq: 0,
        }
    }

    pub fn push(&mut self, item: T) -> Result<()> {
        self.buffer.push(Sequenced { seq: self.next_seq, item });
        self.next_seq += 1;
        if self.buffer.len() >= self.threshold {
            self.spill()?;
        }
        Ok(())
    }

    pub fn pushed(&self) -> u64 {
        self.next_seq
    }

    pub fn spilled_runs(&self) -> usize {
        self.runs.len()
    }

    fn sort_buffer(&mut self) {
        self.buffer.sort_by_cached_key(|s| (s.item.sort_key(), s.seq));
    }

    fn spill(&mut self) -> Result<()> {
        self.sort_buffer();
        let mut file = match &self.spill_dir {
            Some(dir) => tempfile::tempfile_in(dir)?,
            None => tempfile::tempfile()?,
        };
        {
            let mut writer = BufWriter::new(&mut file);
            for record in self.buffer.drain(..) {
                serde_json::to_writer(&mut writer, &record)?;
                writer.write_all(b"\n")?;
            }
            writer.flush()?;
        }
        file.seek(SeekFrom::Start(0))?;
        debug!(run = self.runs.len(), "spilled sorted run");
        self.runs.push(file);
        Ok(())
    }

    /// Drain everything in `(key, seq)` order.
    pub fn finish(mut self) -> Result<Sorted<T>> {
        if self.runs.is_empty() {
            self.sort_buffer();
            return Ok(Sorted::Memory(self.buffer.into_iter()));
        }
        if !self.buffer.is_empty() {
            self.spill()?;
        }
        let mut readers: Vec<Lines<BufReader<File>>> =
            self.runs.into_iter().map(|f| BufReader::new(f).lines()).collect();
        let mut heap = BinaryHeap::with_capacity(readers.len());
        for (run, reader) in readers.iter_mut().enumerate() {
            if let Some(entry) = read_entry::<T>(reader, run)? {
                heap.push(Reverse(entry));
            }
        }
        Ok(Sorted::Merge { readers, heap })
    }
}

fn read_entry<T: Record>(
    reader: &mut Lines<BufReader<File>>,
    run: usize,
) -> Result<Option<HeapEntry<T>>> {
    match reader.next() {
        None => Ok(None),
        Some(line) => {
            let record: Sequenced<T> = serde_json::from_str(&line?)?;
            Ok(Some(HeapEntry { key: record.item.sort_key(), run, record }))
        }
    }
}

pub(crate) struct HeapEntry<T: Record> {
    key: T::Key,
    run: usize,
    record: Sequenced<T>,
}

impl<T: Record> PartialEq for HeapEntry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T: Record> Eq for HeapEntry<T> {}

impl<T: Record> PartialOrd for HeapEntry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: Record> Ord for HeapEntry<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key).then(self.record.seq.cmp(&other.record.seq))
    }
}

/// Output of [`ExternalSorter::finish`].
pub(crate) enum Sorted<T: Record> {
    Memory(std::vec::IntoIter<Sequenced<T>>),
    Merge {
        readers: Vec<Lines<BufReader<File>>>,
        heap: BinaryHeap<Reverse<HeapEntry<T>>>,
    },
}

impl<T: Record> Iterator for Sorted<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Sorted::Memory(iter) => iter.next().map(|s| Ok(s.item)),
            Sorted::Merge { readers, heap } => {
                let Reverse(entry) = heap.pop()?;
                match read_entry::<T>(&mut readers[entry.run], entry.run) {
                    Ok(Some(next)) => heap.push(Reverse(next)),
                    Ok(None) => {}
                    Err(e) => {
                        heap.clear();
                        return Some(Err(e));
                    }
                }
                Some(Ok(entry.record.item))
            }
        }
    }
}
