//! Output processing: record types, sinks, thread-local partials and the
//! region output processor that ties them together.

pub mod aligner;
pub mod chunk;
pub mod config;
pub mod processor;
pub mod record;
pub mod sink;
pub mod temp;

pub use aligner::{Aligner, Alignment, CandidateHit, SearchScoreAligner};
pub use chunk::{chunk_ranges, find_chunk_boundaries};
pub use config::{OutputConfig, OutputKind};
pub use processor::{OutputProcessor, OutputSinks, ProcessorState, RegionOutputProcessor};
pub use record::{AlignmentRecord, MateRecord, RecordSink, sam_flags};
pub use sink::{MemorySink, TSV_HEADER, TsvRecordSink};
