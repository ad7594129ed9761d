//! Region-parallel output processing.
//!
//! A parent [`RegionOutputProcessor`] is built once per run. For a
//! multi-threaded run it hands out one child per region with
//! [`OutputProcessor::thread_clone`]; each child receives the hits of its
//! region in coordinate order, then calls [`OutputProcessor::thread_finish`].
//! The parent's [`OutputProcessor::finish`] waits for every child, combines
//! their work into the final outputs and returns the mapping statistics.
//!
//! A single-threaded run skips cloning: the parent processes hits itself,
//! bound to [`Region::NONE`].
//!
//! Children share the parent's status tracker and per-read stores, so those
//! must be the synchronized variants (`threads > 1`). A hit in the padding of
//! a region is seen by two workers; only the worker whose unpadded region
//! contains it (for a pair, its leftmost arm) updates status and stores.
//!
//! Unfiltered output is buffered per child, owned hits only, and merged from
//! sorted partials.
//! Store-backed output is drained once at `finish`, sorted, split into region
//! chunks and written in parallel.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use log::{debug, info};
use parking_lot::{Condvar, Mutex};
use rayon::prelude::*;
use tempfile::TempDir;

use mapmerge_metrics::{MapStatistics, format_count};

use super::aligner::{Alignment, CandidateHit};
use super::chunk::{chunk_ranges, find_chunk_boundaries};
use super::config::{OutputConfig, OutputKind};
use super::record::{AlignmentRecord, MateRecord, RecordSink, sam_flags};
use super::temp::{concatenate, merge_sorted, write_partial};
use crate::errors::MapMergeError;
use crate::logging::log_map_statistics;
use crate::pairing::{PairWindow, WindowEvent, WindowHit};
use crate::progress::ProgressTracker;
use crate::read::{Arm, Frame, ReadEncoder};
use crate::region::Region;
use crate::result_set::ResultSet;
use crate::status::{StatusTracker, build_tracker, calculate_statistics, flags, for_arm, xc_code};
use crate::store::{HitRecord, HitStore, StorePolicy, build_store};

/// The four lifecycle operations of an output processor.
pub trait OutputProcessor: Send + Sized {
    /// Creates a worker bound to `region`. Only an unbound parent may clone.
    ///
    /// # Errors
    /// Returns [`MapMergeError::InvalidState`] if called on a child, on a
    /// parent that already processed hits itself, or when the shared state is
    /// not synchronized.
    fn thread_clone(&mut self, region: Region) -> Result<Self>;

    /// Accepts one hit. Hits must arrive in coordinate order within a worker.
    ///
    /// # Errors
    /// Returns an error if the processor is not bound to a region or the hit
    /// lies outside the configured reference.
    fn process(
        &mut self,
        template_id: i64,
        frame: Frame,
        read_id: i32,
        template_start: i32,
        score: i32,
        indel_score: i32,
    ) -> Result<()>;

    /// Finishes the bound region and publishes its partial output.
    ///
    /// # Errors
    /// Returns an error if the processor is not bound, or if the partial
    /// output cannot be written.
    fn thread_finish(&mut self) -> Result<()>;

    /// Combines every worker's output. Blocks until every child has either
    /// finished or been dropped. Parent only; may be called once. A parent
    /// that processed hits itself and has not called
    /// [`OutputProcessor::thread_finish`] is thread-finished first.
    ///
    /// # Errors
    /// Returns [`MapMergeError::WorkerAbandoned`] if a child was dropped
    /// without finishing, or any I/O error from writing outputs.
    fn finish(&mut self) -> Result<MapStatistics>;
}

/// Lifecycle state of a processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorState {
    /// A parent that has not processed hits itself
    Unbound,
    /// Accepting hits for a region
    Bound(Region),
    /// `thread_finish` has completed
    ThreadFinished,
    /// `finish` has completed
    Finished,
}

impl fmt::Display for ProcessorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unbound => write!(f, "unbound"),
            Self::Bound(region) => write!(f, "bound to {region}"),
            Self::ThreadFinished => write!(f, "thread-finished"),
            Self::Finished => write!(f, "finished"),
        }
    }
}

fn invalid_state(operation: &'static str, state: impl ToString) -> anyhow::Error {
    MapMergeError::InvalidState { operation, state: state.to_string() }.into()
}

/// Destinations for the final outputs.
#[derive(Default)]
pub struct OutputSinks {
    /// Mate pairs (mated output only)
    pub mated: Option<Box<dyn RecordSink>>,
    /// Unmated arms, single-end placements and unfiltered hits
    pub unmated: Option<Box<dyn RecordSink>>,
    /// Arms that were not reported (mated output only)
    pub unmapped: Option<Box<dyn RecordSink>>,
}

impl OutputSinks {
    fn check(&self, kind: OutputKind) -> Result<()> {
        let (mated, unmated, unmapped) = match kind {
            OutputKind::Mated { unmated, unmapped } => (true, unmated, unmapped),
            _ => (false, true, false),
        };
        for (needed, present, name) in [
            (mated, self.mated.is_some(), "mated"),
            (unmated, self.unmated.is_some(), "unmated"),
            (unmapped, self.unmapped.is_some(), "unmapped"),
        ] {
            if needed && !present {
                return Err(MapMergeError::InvalidParameter {
                    parameter: "sinks".to_string(),
                    reason: format!("{kind:?} output requires a {name} sink"),
                }
                .into());
            }
        }
        Ok(())
    }
}

/// A child's sorted partial output.
#[derive(Debug)]
struct Partial {
    index: usize,
    region: Region,
    path: PathBuf,
}

#[derive(Debug, Default)]
struct CompletionState {
    next_index: usize,
    outstanding: usize,
    abandoned: usize,
    regions: Vec<Region>,
    partials: Vec<Partial>,
}

/// Barrier between children and the parent's `finish`.
#[derive(Debug, Default)]
struct Completion {
    state: Mutex<CompletionState>,
    changed: Condvar,
}

impl Completion {
    fn register(&self, region: Region) -> usize {
        let mut state = self.state.lock();
        let index = state.next_index;
        state.next_index += 1;
        state.outstanding += 1;
        state.regions.push(region);
        index
    }

    fn complete(&self, partial: Option<Partial>) {
        let mut state = self.state.lock();
        state.outstanding -= 1;
        state.partials.extend(partial);
        self.changed.notify_all();
    }

    fn add_partial(&self, partial: Option<Partial>) {
        self.state.lock().partials.extend(partial);
    }

    fn abandon(&self) {
        let mut state = self.state.lock();
        state.outstanding -= 1;
        state.abandoned += 1;
        self.changed.notify_all();
    }

    fn wait(&self) -> CompletionState {
        let mut state = self.state.lock();
        while state.outstanding > 0 {
            self.changed.wait(&mut state);
        }
        std::mem::take(&mut *state)
    }
}

struct Shared {
    config: OutputConfig,
    progress: ProgressTracker,
    temp_dir: TempDir,
    completion: Completion,
}

/// Per-read stores: `mated` keyed by read id, `unmated` keyed by slot
/// (arm-encoded for paired runs).
struct Stores {
    mated: Option<Box<dyn HitStore>>,
    unmated: Option<Box<dyn HitStore>>,
}

impl Stores {
    fn build(config: &OutputConfig) -> Self {
        let reads = config.dims.num_reads;
        let threads = config.threads;
        let random = StorePolicy::TopRandom { seed: config.seed };
        let store = |policy, slots| Some(build_store(policy, slots, threads));
        match config.kind {
            OutputKind::Unfiltered => Self { mated: None, unmated: None },
            OutputKind::SingleEndDedup { cap } => {
                Self { mated: None, unmated: store(StorePolicy::Dedup { cap }, reads) }
            }
            OutputKind::SingleEndTopN { n } => {
                Self { mated: None, unmated: store(StorePolicy::TopN { n }, reads) }
            }
            OutputKind::SingleEndTopRandom => Self { mated: None, unmated: store(random, reads) },
            OutputKind::Mated { unmated, .. } => Self {
                mated: store(random, reads),
                unmated: if unmated { store(random, reads * 2) } else { None },
            },
        }
    }

    fn share(&self) -> Option<Self> {
        let share = |store: &Option<Box<dyn HitStore>>| match store {
            Some(store) => store.share().map(Some),
            None => Some(None),
        };
        Some(Self { mated: share(&self.mated)?, unmated: share(&self.unmated)? })
    }
}

enum Role {
    Parent { sinks: OutputSinks, cloned: bool },
    Child { index: usize },
}

/// How result-set entries of one output stream become records.
#[derive(Debug, Clone, Copy)]
enum Stream {
    Mated,
    UnmatedPaired,
    Single,
}

impl Stream {
    fn name(self) -> &'static str {
        match self {
            Self::Mated => "mated",
            Self::UnmatedPaired | Self::Single => "unmated",
        }
    }
}

fn arm_flag(arm: Arm) -> u16 {
    match arm {
        Arm::First => sam_flags::FIRST_OF_PAIR,
        Arm::Second => sam_flags::SECOND_OF_PAIR,
    }
}

/// The output processor for all [`OutputKind`]s.
pub struct RegionOutputProcessor {
    shared: Arc<Shared>,
    role: Role,
    state: ProcessorState,
    tracker: Box<dyn StatusTracker>,
    stores: Stores,
    window: Option<PairWindow>,
    pending: Vec<WindowEvent>,
    buffer: Vec<AlignmentRecord>,
    hits: u64,
}

impl RegionOutputProcessor {
    /// Creates the parent processor.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid, a sink the output
    /// kind needs is missing, or the temp directory cannot be created.
    pub fn new(config: OutputConfig, sinks: OutputSinks) -> Result<Self> {
        config.validate()?;
        sinks.check(config.kind)?;
        let temp_dir = create_temp_dir(config.temp_dir.as_deref())?;
        debug!("Partial outputs in {}", temp_dir.path().display());

        let tracker = build_tracker(config.dims.num_reads, config.threads);
        let stores = Stores::build(&config);
        let window = Self::new_window(&config);
        let shared = Arc::new(Shared {
            config,
            progress: ProgressTracker::new("Processed hits"),
            temp_dir,
            completion: Completion::default(),
        });
        Ok(Self {
            shared,
            role: Role::Parent { sinks, cloned: false },
            state: ProcessorState::Unbound,
            tracker,
            stores,
            window,
            pending: Vec::new(),
            buffer: Vec::new(),
            hits: 0,
        })
    }

    fn new_window(config: &OutputConfig) -> Option<PairWindow> {
        matches!(config.kind, OutputKind::Mated { .. }).then(|| PairWindow::new(config.pairing))
    }

    /// The current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ProcessorState {
        self.state
    }

    /// The configuration shared by the parent and its children.
    #[must_use]
    pub fn config(&self) -> &OutputConfig {
        &self.shared.config
    }

    /// Number of hits this processor accepted.
    #[must_use]
    pub fn hits(&self) -> u64 {
        self.hits
    }

    /// Region being processed. An uncloned parent binds itself to
    /// [`Region::NONE`] on first use.
    fn bind(&mut self, operation: &'static str) -> Result<Region> {
        match (self.state, &self.role) {
            (ProcessorState::Bound(region), _) => Ok(region),
            (ProcessorState::Unbound, Role::Parent { cloned: false, .. }) => {
                self.state = ProcessorState::Bound(Region::NONE);
                Ok(Region::NONE)
            }
            (ProcessorState::Unbound, Role::Parent { cloned: true, .. }) => {
                Err(invalid_state(operation, "unbound with worker clones"))
            }
            (state, _) => Err(invalid_state(operation, state)),
        }
    }

    /// Whether this worker's unpadded region owns a position.
    fn owns(&self, template_id: i64, position: i32) -> bool {
        match self.state {
            ProcessorState::Bound(region) => region.contains(template_id, i64::from(position)),
            _ => true,
        }
    }

    fn slot(&self, read_id: i32, arm: Arm) -> i32 {
        if self.shared.config.paired { ReadEncoder::for_arm(arm).encode(read_id) } else { read_id }
    }

    /// Applies the unmated thresholds to one hit and records what was learned.
    /// Returns the alignment if it passed.
    fn align_unmated(
        &mut self,
        candidate: &CandidateHit,
        read_id: i32,
        arm: Arm,
        owned: bool,
    ) -> Option<Alignment> {
        let config = &self.shared.config;
        if candidate.score > config.max_unmated_score {
            return None;
        }
        if owned {
            self.tracker.add_status(
                read_id,
                for_arm(arm, flags::UNMATED_ALIGN_SCORE_FIRST, flags::UNMATED_ALIGN_SCORE_SECOND),
            );
        }
        let alignment = config.aligner.align(candidate)?;
        if owned {
            self.tracker.add_status(
                read_id,
                for_arm(
                    arm,
                    flags::UNMATED_COMPUTE_ALIGNMENT_FIRST,
                    flags::UNMATED_COMPUTE_ALIGNMENT_SECOND,
                ),
            );
        }
        (alignment.score <= config.max_unmated_score).then_some(alignment)
    }

    fn candidate(&self, template_id: i64, read_id: i32, arm: Arm, hit: &WindowHit) -> CandidateHit {
        CandidateHit {
            template_id,
            frame: Frame::from_reverse(hit.reverse),
            read_id: self.slot(read_id, arm),
            template_start: hit.position,
            score: hit.score,
            indel_score: hit.indel_score,
        }
    }

    /// Buffers an owned hit for this worker's partial.
    fn write_unfiltered(&mut self, candidate: &CandidateHit, read_id: i32, arm: Arm) {
        let Some(alignment) = self.align_unmated(candidate, read_id, arm, true) else { return };
        let mut flags = 0;
        if self.shared.config.paired {
            flags |= sam_flags::PAIRED | arm_flag(arm);
        }
        if candidate.frame.is_reverse() {
            flags |= sam_flags::REVERSE;
        }
        self.buffer.push(AlignmentRecord::mapped(
            read_id,
            flags,
            candidate.template_id,
            alignment.template_start,
            alignment.score,
        ));
        self.tracker.add_status(read_id, for_arm(arm, flags::REPORTED_FIRST, flags::REPORTED_SECOND));
    }

    fn offer_unmated(&mut self, template_id: i64, arm: Arm, hit: &WindowHit) {
        if !self.owns(template_id, hit.position) {
            return;
        }
        let candidate = self.candidate(template_id, hit.read_id, arm, hit);
        let Some(alignment) = self.align_unmated(&candidate, hit.read_id, arm, true) else { return };
        if let Some(store) = self.stores.unmated.as_mut() {
            store.process(
                candidate.read_id,
                HitRecord::single(template_id, alignment.template_start, hit.reverse, alignment.score),
            );
        }
    }

    fn offer_mated(&mut self, template_id: i64, first: &WindowHit, second: &WindowHit) {
        if !self.owns(template_id, first.position.min(second.position)) {
            return;
        }
        let read_id = first.read_id;
        self.tracker.add_status(read_id, flags::MATED);
        let aligner = Arc::clone(&self.shared.config.aligner);
        let first_alignment = aligner.align(&self.candidate(template_id, read_id, Arm::First, first));
        let second_alignment =
            aligner.align(&self.candidate(template_id, read_id, Arm::Second, second));
        let (Some(a), Some(b)) = (first_alignment, second_alignment) else { return };
        let combo = a.score.saturating_add(b.score);
        if combo > self.shared.config.max_mated_score {
            return;
        }
        self.tracker.add_status(read_id, flags::MATED_ALIGN_SCORE);
        if let Some(store) = self.stores.mated.as_mut() {
            store.process(
                read_id,
                HitRecord::mated(
                    template_id,
                    (a.template_start, first.reverse),
                    (b.template_start, second.reverse),
                    combo,
                ),
            );
        }
    }

    fn drain_events(&mut self) {
        for event in std::mem::take(&mut self.pending) {
            match event {
                WindowEvent::Mated { template_id, first, second } => {
                    self.offer_mated(template_id, &first, &second);
                }
                WindowEvent::Unmated { template_id, arm, hit } => {
                    self.offer_unmated(template_id, arm, &hit);
                }
            }
        }
    }

    /// Decides which retained hits are reported, recording uniqueness,
    /// blocking and reporting in the status tracker. Returns the mated and
    /// unmated result sets.
    fn collect_results(&mut self) -> (Option<ResultSet>, Option<ResultSet>) {
        let config = &self.shared.config;
        let num_reads = config.dims.num_reads as i32;
        let max_ties = u32::try_from(config.max_top_results).unwrap_or(u32::MAX);
        let blocks = !matches!(config.kind, OutputKind::SingleEndDedup { .. });
        let arms: &[Arm] = if config.paired { &[Arm::First, Arm::Second] } else { &[Arm::First] };
        let paired = config.paired;

        let mated = self.stores.mated.as_deref().map(|store| {
            let mut results = ResultSet::new();
            for read_id in 0..num_reads {
                let count = store.result_count(read_id);
                if count == 0 {
                    continue;
                }
                if count > max_ties {
                    self.tracker.add_status(read_id, flags::BLOCKED_FIRST | flags::BLOCKED_SECOND);
                    continue;
                }
                let mut bits = flags::REPORTED_FIRST | flags::REPORTED_SECOND;
                if count == 1 {
                    bits |= flags::UNIQUELY_MAPPED_FIRST | flags::UNIQUELY_MAPPED_SECOND;
                }
                store.set_results(&mut results, read_id);
                self.tracker.add_status(read_id, bits);
            }
            results
        });

        let unmated = self.stores.unmated.as_deref().map(|store| {
            let mut results = ResultSet::new();
            for read_id in 0..num_reads {
                for &arm in arms {
                    let status = self.tracker.status(read_id);
                    let done = for_arm(arm, flags::REPORTED_FIRST, flags::REPORTED_SECOND)
                        | for_arm(arm, flags::BLOCKED_FIRST, flags::BLOCKED_SECOND);
                    if status & done != 0 {
                        continue;
                    }
                    let slot = if paired { ReadEncoder::for_arm(arm).encode(read_id) } else { read_id };
                    let count = store.result_count(slot);
                    if count == 0 {
                        continue;
                    }
                    if blocks && count > max_ties {
                        self.tracker.add_status(
                            read_id,
                            for_arm(arm, flags::BLOCKED_FIRST, flags::BLOCKED_SECOND),
                        );
                        continue;
                    }
                    let mut bits = for_arm(arm, flags::REPORTED_FIRST, flags::REPORTED_SECOND);
                    if count == 1 {
                        bits |= for_arm(
                            arm,
                            flags::UNIQUELY_MAPPED_FIRST,
                            flags::UNIQUELY_MAPPED_SECOND,
                        );
                    }
                    store.set_results(&mut results, slot);
                    self.tracker.add_status(read_id, bits);
                }
            }
            results
        });

        (mated, unmated)
    }

    fn write_unfiltered_output(&self, mut partials: Vec<Partial>, sinks: &mut OutputSinks) -> Result<()> {
        let Some(sink) = sinks.unmated.as_deref_mut() else { return Ok(()) };
        partials.sort_by(|a, b| {
            a.region.padded_start().cmp(&b.region.padded_start()).then(a.index.cmp(&b.index))
        });
        let paths: Vec<PathBuf> = partials.into_iter().map(|p| p.path).collect();
        let written = merge_sorted(&paths, sink)?;
        info!("Wrote {} unfiltered records from {} partials", format_count(written), paths.len());
        Ok(())
    }

    fn write_stored_output(&mut self, mut regions: Vec<Region>, sinks: &mut OutputSinks) -> Result<()> {
        if regions.is_empty() {
            regions.push(Region::NONE);
        }
        regions.sort_by_key(Region::padded_start);

        let (mated, unmated) = self.collect_results();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.shared.config.threads)
            .build()
            .context("Failed to build rayon thread pool")?;
        let dir = self.shared.temp_dir.path();

        if let (Some(results), Some(store), Some(sink)) =
            (mated, self.stores.mated.as_deref(), sinks.mated.as_deref_mut())
        {
            write_chunked(Stream::Mated, results, store, &regions, dir, &pool, sink)?;
        }
        if let (Some(results), Some(store), Some(sink)) =
            (unmated, self.stores.unmated.as_deref(), sinks.unmated.as_deref_mut())
        {
            let stream = if self.shared.config.paired { Stream::UnmatedPaired } else { Stream::Single };
            write_chunked(stream, results, store, &regions, dir, &pool, sink)?;
        }
        if let Some(sink) = sinks.unmapped.as_deref_mut() {
            self.write_unmapped(sink)?;
        }
        Ok(())
    }

    fn write_unmapped(&self, sink: &mut dyn RecordSink) -> Result<()> {
        let mut written = 0u64;
        for read_id in 0..self.shared.config.dims.num_reads as i32 {
            let status = self.tracker.status(read_id);
            let reported =
                |arm| status & for_arm(arm, flags::REPORTED_FIRST, flags::REPORTED_SECOND) != 0;
            for arm in [Arm::First, Arm::Second] {
                if reported(arm) {
                    continue;
                }
                let mut record_flags = sam_flags::PAIRED | arm_flag(arm);
                if !reported(arm.mate()) {
                    record_flags |= sam_flags::MATE_UNMAPPED;
                }
                let code = xc_code(status, arm).code();
                sink.write_record(&AlignmentRecord::unmapped(read_id, record_flags, code))?;
                written += 1;
            }
        }
        info!("Wrote {} unmapped records", format_count(written));
        Ok(())
    }
}

/// Sorts `results`, splits it into one chunk per region, builds and writes
/// each chunk's records in parallel, then appends the chunks to `sink`.
fn write_chunked(
    stream: Stream,
    mut results: ResultSet,
    store: &dyn HitStore,
    regions: &[Region],
    dir: &Path,
    pool: &rayon::ThreadPool,
    sink: &mut dyn RecordSink,
) -> Result<()> {
    results.sort();
    let ranges = chunk_ranges(&find_chunk_boundaries(regions, &results)?);
    let results = &results;
    let paths = pool.install(|| {
        ranges
            .par_iter()
            .enumerate()
            .map(|(i, range)| {
                let mut records: Vec<AlignmentRecord> =
                    range.clone().filter_map(|idx| build_record(stream, store, results, idx)).collect();
                let path = dir.join(format!("{}_chunk_{i:04}.bin", stream.name()));
                write_partial(&path, &mut records)?;
                Ok(path)
            })
            .collect::<Result<Vec<_>>>()
    })?;
    let written = concatenate(&paths, sink)?;
    info!("Wrote {} {} records in {} chunks", format_count(written), stream.name(), paths.len());
    Ok(())
}

/// Turns result-set entry `idx` back into an output record by looking up the
/// retained hit it came from.
fn build_record(
    stream: Stream,
    store: &dyn HitStore,
    results: &ResultSet,
    idx: usize,
) -> Option<AlignmentRecord> {
    let template_id = results.template_id(idx);
    let position = results.position(idx);
    let encoded = results.encoded_read_id(idx);
    let reverse = results.reverse(idx);
    let find = |slot: i32| {
        store.records(slot).into_iter().find(|r| {
            r.template_id == template_id && r.template_start == position && r.reverse == reverse
        })
    };

    match stream {
        Stream::Mated => {
            let (read_id, arm) = ReadEncoder::decode(true, encoded);
            let record = store.records(read_id).into_iter().next()?;
            let mate = record.mate?;
            let first = (record.template_start, record.reverse);
            let second = (mate.template_start, mate.reverse);
            let other = match arm {
                Arm::First => second,
                Arm::Second => first,
            };
            let mut record_flags = sam_flags::PAIRED | sam_flags::PROPER_PAIR | arm_flag(arm);
            if reverse {
                record_flags |= sam_flags::REVERSE;
            }
            if other.1 {
                record_flags |= sam_flags::MATE_REVERSE;
            }
            Some(
                AlignmentRecord::mapped(read_id, record_flags, template_id, position, record.combo_score)
                    .with_mate(MateRecord { template_id, position: other.0, reverse: other.1 }),
            )
        }
        Stream::UnmatedPaired => {
            let (read_id, arm) = ReadEncoder::decode(true, encoded);
            let record = find(encoded)?;
            let mut record_flags = sam_flags::PAIRED | arm_flag(arm);
            if reverse {
                record_flags |= sam_flags::REVERSE;
            }
            Some(AlignmentRecord::mapped(read_id, record_flags, template_id, position, record.combo_score))
        }
        Stream::Single => {
            let record = find(encoded)?;
            let record_flags = if reverse { sam_flags::REVERSE } else { 0 };
            Some(AlignmentRecord::mapped(encoded, record_flags, template_id, position, record.combo_score))
        }
    }
}

fn create_temp_dir(base: Option<&Path>) -> Result<TempDir> {
    match base {
        Some(base) => {
            std::fs::create_dir_all(base)?;
            TempDir::new_in(base).context("Failed to create temp directory")
        }
        None => TempDir::new().context("Failed to create temp directory"),
    }
}

impl OutputProcessor for RegionOutputProcessor {
    fn thread_clone(&mut self, region: Region) -> Result<Self> {
        if !matches!((&self.role, self.state), (Role::Parent { .. }, ProcessorState::Unbound)) {
            let state = match self.role {
                Role::Child { .. } => "a worker clone".to_string(),
                Role::Parent { .. } => self.state.to_string(),
            };
            return Err(invalid_state("thread_clone", state));
        }
        let unsynchronized = || invalid_state("thread_clone", "single-threaded (threads = 1)");
        let tracker = self.tracker.share().ok_or_else(unsynchronized)?;
        let stores = self.stores.share().ok_or_else(unsynchronized)?;
        if let Role::Parent { cloned, .. } = &mut self.role {
            *cloned = true;
        }

        let index = self.shared.completion.register(region);
        debug!("Cloned worker {index} for region {region}");
        Ok(Self {
            shared: Arc::clone(&self.shared),
            role: Role::Child { index },
            state: ProcessorState::Bound(region),
            tracker,
            stores,
            window: Self::new_window(&self.shared.config),
            pending: Vec::new(),
            buffer: Vec::new(),
            hits: 0,
        })
    }

    fn process(
        &mut self,
        template_id: i64,
        frame: Frame,
        read_id: i32,
        template_start: i32,
        score: i32,
        indel_score: i32,
    ) -> Result<()> {
        let region = self.bind("process")?;
        if self.shared.config.clip_to_region
            && !region.contains(template_id, i64::from(template_start))
        {
            return Ok(());
        }

        let config = &self.shared.config;
        let (read, arm) = ReadEncoder::decode(config.paired, read_id);
        if !(0..config.dims.num_reads as i32).contains(&read) {
            return Err(MapMergeError::InvalidParameter {
                parameter: "read_id".to_string(),
                reason: format!("{read_id} is outside 0..{} reads", config.dims.num_reads),
            }
            .into());
        }
        let probe = HitRecord::single(template_id, template_start, frame.is_reverse(), score);
        if !config.dims.accepts(&probe) {
            return Err(MapMergeError::InvalidParameter {
                parameter: "hit".to_string(),
                reason: format!("{template_id}:{template_start} lies outside the reference"),
            }
            .into());
        }

        self.hits += 1;
        self.shared.progress.log_if_needed(1);
        let owned = region.contains(template_id, i64::from(template_start));
        if owned {
            self.tracker
                .add_status(read, for_arm(arm, flags::MATCHED_FIRST, flags::MATCHED_SECOND));
        }

        let hit = WindowHit {
            read_id: read,
            position: template_start,
            reverse: frame.is_reverse(),
            score,
            indel_score,
        };
        match self.shared.config.kind {
            OutputKind::Unfiltered => {
                // a hit in the padding belongs to the neighbouring worker
                if owned {
                    let candidate = self.candidate(template_id, read, arm, &hit);
                    self.write_unfiltered(&candidate, read, arm);
                }
            }
            OutputKind::Mated { .. } => {
                if let Some(window) = self.window.as_mut() {
                    window.push(template_id, arm, hit, &mut |event| self.pending.push(event));
                }
                self.drain_events();
            }
            OutputKind::SingleEndDedup { .. }
            | OutputKind::SingleEndTopN { .. }
            | OutputKind::SingleEndTopRandom => self.offer_unmated(template_id, arm, &hit),
        }
        Ok(())
    }

    fn thread_finish(&mut self) -> Result<()> {
        let region = self.bind("thread_finish")?;
        if let Some(window) = self.window.as_mut() {
            window.flush(&mut |event| self.pending.push(event));
        }
        self.drain_events();

        let index = match self.role {
            Role::Child { index } => index,
            Role::Parent { .. } => 0,
        };
        let partial = if self.shared.config.kind.uses_stores() {
            None
        } else {
            let path = self.shared.temp_dir.path().join(format!("region_{index:04}.bin"));
            let mut buffer = std::mem::take(&mut self.buffer);
            write_partial(&path, &mut buffer)?;
            Some(Partial { index, region, path })
        };

        self.shared.progress.region_finished(index, self.hits);
        self.state = ProcessorState::ThreadFinished;
        match self.role {
            Role::Child { .. } => self.shared.completion.complete(partial),
            Role::Parent { .. } => self.shared.completion.add_partial(partial),
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<MapStatistics> {
        if !matches!(self.role, Role::Parent { .. }) {
            return Err(invalid_state("finish", "a worker clone"));
        }
        if self.state == ProcessorState::Bound(Region::NONE) {
            self.thread_finish()?;
        }
        let Role::Parent { sinks, .. } = &mut self.role else {
            return Err(invalid_state("finish", "a worker clone"));
        };
        if !matches!(self.state, ProcessorState::Unbound | ProcessorState::ThreadFinished) {
            return Err(invalid_state("finish", self.state));
        }
        let mut sinks = std::mem::take(sinks);

        let outcome = self.shared.completion.wait();
        if outcome.abandoned > 0 {
            self.state = ProcessorState::Finished;
            return Err(MapMergeError::WorkerAbandoned { count: outcome.abandoned }.into());
        }

        if self.shared.config.kind.uses_stores() {
            self.write_stored_output(outcome.regions, &mut sinks)?;
        } else {
            self.write_unfiltered_output(outcome.partials, &mut sinks)?;
        }

        let paired = self.shared.config.paired;
        let mut stats = MapStatistics::new(paired);
        calculate_statistics(self.tracker.as_ref(), paired, &mut stats);

        for sink in [&mut sinks.mated, &mut sinks.unmated, &mut sinks.unmapped].into_iter().flatten() {
            sink.finish()?;
        }
        self.state = ProcessorState::Finished;
        self.shared.progress.log_final();
        log_map_statistics(&stats);
        Ok(stats)
    }
}

impl Drop for RegionOutputProcessor {
    fn drop(&mut self) {
        if let (Role::Child { index }, ProcessorState::Bound(region)) = (&self.role, self.state) {
            log::warn!("Worker {index} for region {region} dropped before thread_finish");
            self.shared.completion.abandon();
        }
    }
}
