//! Thread-local partial outputs: a private binary record stream per region,
//! plus the two ways partials are combined into final output.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::record::{AlignmentRecord, RecordSink};
use crate::errors::MapMergeError;

/// Writes records to a partial-output file.
pub struct TempRecordWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    count: u64,
}

impl TempRecordWriter {
    /// Creates (truncating) the file.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)
            .with_context(|| format!("Failed to create temp file: {}", path.display()))?;
        Ok(Self { path, writer: BufWriter::new(file), count: 0 })
    }

    /// Appends one record.
    pub fn write(&mut self, record: &AlignmentRecord) -> Result<()> {
        record
            .write_to(&mut self.writer)
            .with_context(|| format!("Failed to write temp file: {}", self.path.display()))?;
        self.count += 1;
        Ok(())
    }

    /// Flushes the file and returns the number of records written.
    pub fn finish(mut self) -> Result<u64> {
        self.writer
            .flush()
            .with_context(|| format!("Failed to flush temp file: {}", self.path.display()))?;
        Ok(self.count)
    }
}

/// Writes `records` to `path` in output order.
pub fn write_partial<P: AsRef<Path>>(path: P, records: &mut [AlignmentRecord]) -> Result<u64> {
    records.sort_unstable();
    let mut writer = TempRecordWriter::create(path)?;
    for record in records.iter() {
        writer.write(record)?;
    }
    writer.finish()
}

/// Reads records back from a partial-output file.
pub struct TempRecordReader {
    path: PathBuf,
    reader: BufReader<File>,
}

impl TempRecordReader {
    /// Opens the file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)
            .with_context(|| format!("Failed to open temp file: {}", path.display()))?;
        Ok(Self { path, reader: BufReader::new(file) })
    }

    /// The next record, or `None` at the end of the file.
    pub fn next_record(&mut self) -> Result<Option<AlignmentRecord>> {
        match AlignmentRecord::read_from(&mut self.reader) {
            Ok(record) => Ok(record),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => Err(MapMergeError::TempFile {
                path: self.path.display().to_string(),
                reason: "truncated record".to_string(),
            }
            .into()),
            Err(e) => Err(anyhow::Error::new(e)
                .context(format!("Failed to read temp file: {}", self.path.display()))),
        }
    }
}

/// Appends every partial, in order, to `sink`. Returns the records written.
pub fn concatenate(paths: &[PathBuf], sink: &mut dyn RecordSink) -> Result<u64> {
    let mut written = 0;
    for path in paths {
        let mut reader = TempRecordReader::open(path)?;
        while let Some(record) = reader.next_record()? {
            sink.write_record(&record)?;
            written += 1;
        }
    }
    Ok(written)
}

/// Entry in the merge heap.
struct HeapEntry {
    record: AlignmentRecord,
    partial_idx: usize,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other).is_eq()
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.record.cmp(&other.record).then(self.partial_idx.cmp(&other.partial_idx))
    }
}

/// K-way merge of sorted partials into `sink`. Every record is written,
/// including identical records; equal records keep partial order.
/// Returns the records written.
pub fn merge_sorted(paths: &[PathBuf], sink: &mut dyn RecordSink) -> Result<u64> {
    let mut readers: Vec<TempRecordReader> =
        paths.iter().map(TempRecordReader::open).collect::<Result<Vec<_>>>()?;

    let mut heap: BinaryHeap<Reverse<HeapEntry>> = BinaryHeap::with_capacity(readers.len());
    for (partial_idx, reader) in readers.iter_mut().enumerate() {
        if let Some(record) = reader.next_record()? {
            heap.push(Reverse(HeapEntry { record, partial_idx }));
        }
    }

    let mut written = 0;
    while let Some(Reverse(entry)) = heap.pop() {
        sink.write_record(&entry.record)?;
        written += 1;
        if let Some(record) = readers[entry.partial_idx].next_record()? {
            heap.push(Reverse(HeapEntry { record, partial_idx: entry.partial_idx }));
        }
    }
    Ok(written)
}
