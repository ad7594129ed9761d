//! Record sink implementations.

use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use fgoxide::io::Io;
use parking_lot::Mutex;

use super::record::{AlignmentRecord, RecordSink};

/// In-memory sink whose buffer can be read from another handle.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<AlignmentRecord>>>,
    finished: Arc<Mutex<bool>>,
}

impl MemorySink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every record written so far.
    #[must_use]
    pub fn records(&self) -> Vec<AlignmentRecord> {
        self.records.lock().clone()
    }

    /// Whether [`RecordSink::finish`] has been called.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        *self.finished.lock()
    }
}

impl RecordSink for MemorySink {
    fn write_record(&mut self, record: &AlignmentRecord) -> Result<()> {
        self.records.lock().push(*record);
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        *self.finished.lock() = true;
        Ok(())
    }
}

/// Column names written by [`TsvRecordSink`].
pub const TSV_HEADER: &str =
    "read_id\tflags\ttemplate_id\tposition\tmate_template_id\tmate_position\tscore\txc";

/// Writes one tab-separated line per record. Paths ending in `.gz` are compressed.
pub struct TsvRecordSink {
    path: PathBuf,
    writer: Option<BufWriter<Box<dyn Write + Send>>>,
}

impl TsvRecordSink {
    /// Creates the file and writes the header line.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut writer = Io::default()
            .new_writer(&path)
            .with_context(|| format!("Failed to create output: {}", path.display()))?;
        writeln!(writer, "{TSV_HEADER}")?;
        Ok(Self { path, writer: Some(writer) })
    }
}

fn opt<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| ".".to_string(), |v| v.to_string())
}

impl RecordSink for TsvRecordSink {
    fn write_record(&mut self, record: &AlignmentRecord) -> Result<()> {
        let writer = self
            .writer
            .as_mut()
            .with_context(|| format!("Output already finished: {}", self.path.display()))?;
        writeln!(
            writer,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            record.read_id,
            record.flags,
            record.template_id,
            record.position,
            opt(record.mate.map(|m| m.template_id)),
            opt(record.mate.map(|m| m.position)),
            opt(record.score),
            opt(record.status_code),
        )
        .with_context(|| format!("Failed to write record to {}", self.path.display()))
    }

    fn finish(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush().with_context(|| format!("Failed to flush {}", self.path.display()))?;
        }
        Ok(())
    }
}
