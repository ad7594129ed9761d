//! Merge search hits into coordinate-sorted mapping output.
//!
//! Reads a table of candidate hits, partitions the reference into one padded
//! region per worker thread, feeds each worker the hits that fall inside its
//! padded region, and merges the per-region results into the final outputs.

use std::path::{Path, PathBuf};

use ahash::AHashSet;
use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use fgoxide::io::DelimFile;
use log::info;
use parking_lot::Mutex;
use serde::Deserialize;

use mapmerge_lib::logging::OperationTimer;
use mapmerge_lib::output::{
    CandidateHit, OutputConfig, OutputKind, OutputProcessor, OutputSinks, RecordSink,
    RegionOutputProcessor, TsvRecordSink,
};
use mapmerge_lib::read::{Frame, ReadEncoder};
use mapmerge_lib::region::Region;
use mapmerge_lib::store::StoreDimensions;
use mapmerge_lib::validation::validate_file_exists;
use mapmerge_metrics::{MapStatistics, format_count, write_metrics_auto};

use crate::commands::command::Command;
use crate::commands::common::{PairingOptions, ReferenceOptions, ThreadingOptions};

/// How hits are retained and which outputs are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MergeMode {
    /// Every aligned hit, coordinate sorted
    Unfiltered,
    /// Distinct placements per read, up to `--dedup-cap`
    Dedup,
    /// The `--top-n` best placements per read
    TopN,
    /// One random placement among the best-scoring ties
    TopRandom,
    /// Paired-end mate pairs within the fragment window
    Mated,
}

/// One row of the hits table.
#[derive(Debug, Clone, Deserialize)]
struct HitRow {
    template_id: i64,
    frame: String,
    read_id: i32,
    template_start: i32,
    score: i32,
    #[serde(default)]
    indel_score: i32,
}

impl HitRow {
    fn into_candidate(self) -> Result<CandidateHit> {
        let frame: Frame = self.frame.parse()?;
        Ok(CandidateHit {
            template_id: self.template_id,
            frame,
            read_id: self.read_id,
            template_start: self.template_start,
            score: self.score,
            indel_score: self.indel_score,
        })
    }
}

/// Merge candidate hits into sorted mapping output.
#[derive(Debug, Parser)]
#[command(
    name = "merge",
    about = "\x1b[38;5;72m[MAPPING]\x1b[0m        \x1b[36mMerge per-region search hits into sorted output\x1b[0m",
    long_about = r#"
Merge candidate hits from the search stage into coordinate-sorted mapping output.

The input is a tab-separated table with a header and the columns:
  template_id  frame  read_id  template_start  score  [indel_score]

`frame` is F or R. For paired runs `read_id` is arm-encoded: read * 2 for the
first arm and read * 2 + 1 for the second.

The reference is split into one region per thread. Each worker sees the hits
inside its region plus a padding wide enough to pair every fragment it owns,
so the output does not depend on the thread count.

Outputs, by mode:
  unfiltered, dedup, top-n, top-random:  <prefix>.unmated.tsv
  mated:                                 <prefix>.mated.tsv
                                         <prefix>.unmated.tsv  (--write-unmated)
                                         <prefix>.unmapped.tsv (--write-unmapped)
Mapping statistics are written to <prefix>.mapstats.txt.

Example usage:
  mapmerge merge -i hits.tsv -o out -l 5000,3000 --mode top-n --top-n 3
  mapmerge merge -i hits.tsv -o out -l 5000 --mode mated --write-unmapped -t 8
"#
)]
pub struct Merge {
    /// Input hits table
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,

    /// Output path prefix
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,

    /// Reference template lengths
    #[command(flatten)]
    pub reference: ReferenceOptions,

    /// Number of reads; derived from the largest read id when omitted
    #[arg(long = "num-reads")]
    pub num_reads: Option<usize>,

    /// Retention and output mode
    #[arg(short = 'm', long = "mode", value_enum, default_value_t = MergeMode::TopRandom)]
    pub mode: MergeMode,

    /// Treat read ids as arm-encoded pairs in unfiltered mode (implied by --mode mated)
    #[arg(long = "paired", default_value = "false")]
    pub paired: bool,

    /// Placements kept per read in top-n mode
    #[arg(long = "top-n", default_value_t = 5)]
    pub top_n: usize,

    /// Placements kept per read in dedup mode
    #[arg(long = "dedup-cap", default_value_t = 5)]
    pub dedup_cap: usize,

    /// Equal-best ties above which a read is reported as blocked
    #[arg(long = "max-top-results", default_value_t = 5)]
    pub max_top_results: usize,

    /// Seed for random tie-breaking
    #[arg(long = "seed", default_value_t = 42)]
    pub seed: u64,

    /// Highest accepted combined score for a mate pair
    #[arg(long = "max-mated-score")]
    pub max_mated_score: Option<i32>,

    /// Highest accepted score for an unmated or single-end alignment
    #[arg(long = "max-unmated-score")]
    pub max_unmated_score: Option<i32>,

    /// Write arms without a reported mate pair (mated mode)
    #[arg(long = "write-unmated", default_value = "false")]
    pub write_unmated: bool,

    /// Write arms that were not reported at all (mated mode)
    #[arg(long = "write-unmapped", default_value = "false")]
    pub write_unmapped: bool,

    /// Mate pairing options
    #[command(flatten)]
    pub pairing: PairingOptions,

    /// Drop hits outside each worker's unpadded region
    #[arg(long = "clip-to-region", default_value = "false")]
    pub clip_to_region: bool,

    /// Worker threads
    #[command(flatten)]
    pub threading: ThreadingOptions,

    /// Directory for temporary per-region files
    #[arg(long = "temp-dir")]
    pub temp_dir: Option<PathBuf>,
}

impl Merge {
    fn output_kind(&self) -> OutputKind {
        match self.mode {
            MergeMode::Unfiltered => OutputKind::Unfiltered,
            MergeMode::Dedup => OutputKind::SingleEndDedup { cap: self.dedup_cap },
            MergeMode::TopN => OutputKind::SingleEndTopN { n: self.top_n },
            MergeMode::TopRandom => OutputKind::SingleEndTopRandom,
            MergeMode::Mated => OutputKind::Mated {
                unmated: self.write_unmated,
                unmapped: self.write_unmapped,
            },
        }
    }

    fn is_paired(&self) -> bool {
        self.paired || self.mode == MergeMode::Mated
    }

    /// Padding applied around each worker region.
    fn padding(&self) -> i64 {
        if self.mode == MergeMode::Mated { self.pairing.padding() } else { 0 }
    }

    fn output_path(&self, suffix: &str) -> PathBuf {
        let mut name = self.output.as_os_str().to_owned();
        name.push(suffix);
        PathBuf::from(name)
    }

    fn build_config(&self, num_reads: usize) -> Result<OutputConfig> {
        let dims = StoreDimensions::new(
            num_reads,
            self.reference.template_lengths.len(),
            self.reference.max_length(),
        );
        let mut config = OutputConfig::new(self.output_kind(), dims)
            .paired(self.is_paired())
            .clip_to_region(self.clip_to_region)
            .threads(self.threading.threads)
            .max_top_results(self.max_top_results)
            .seed(self.seed);
        if self.mode == MergeMode::Mated {
            config = config.pairing(self.pairing.to_config()?);
        }
        if let Some(score) = self.max_mated_score {
            config = config.max_mated_score(score);
        }
        if let Some(score) = self.max_unmated_score {
            config = config.max_unmated_score(score);
        }
        if let Some(dir) = &self.temp_dir {
            config = config.temp_dir(dir.clone());
        }
        config.validate()?;
        Ok(config)
    }

    fn build_sinks(&self) -> Result<OutputSinks> {
        let sink = |suffix: &str| -> Result<Option<Box<dyn RecordSink>>> {
            Ok(Some(Box::new(TsvRecordSink::create(self.output_path(suffix))?)))
        };
        let sinks = match self.output_kind() {
            OutputKind::Mated { unmated, unmapped } => OutputSinks {
                mated: sink(".mated.tsv")?,
                unmated: if unmated { sink(".unmated.tsv")? } else { None },
                unmapped: if unmapped { sink(".unmapped.tsv")? } else { None },
            },
            _ => OutputSinks { unmated: sink(".unmated.tsv")?, ..OutputSinks::default() },
        };
        Ok(sinks)
    }
}

/// Reads the hits table and sorts it by template and position.
fn read_hits(path: &Path) -> Result<Vec<CandidateHit>> {
    let rows: Vec<HitRow> = DelimFile::default()
        .read_tsv(&path)
        .with_context(|| format!("Failed to read hits: {}", path.display()))?;
    let mut hits = rows.into_iter().map(HitRow::into_candidate).collect::<Result<Vec<_>>>()?;
    hits.sort_by_key(|h| (h.template_id, h.template_start, h.frame.is_reverse(), h.read_id, h.score));
    Ok(hits)
}

/// Number of reads implied by the largest read id.
fn derive_num_reads(hits: &[CandidateHit], paired: bool) -> Result<usize> {
    let Some(max_id) = hits.iter().map(|h| h.read_id).max() else {
        bail!("No hits found; pass --num-reads to produce unmapped output for an empty run");
    };
    if max_id < 0 {
        bail!("Read ids must be non-negative, got {max_id}");
    }
    let (read, _) = ReadEncoder::decode(paired, max_id);
    Ok(read as usize + 1)
}

fn feed(processor: &mut RegionOutputProcessor, hits: &[CandidateHit]) -> Result<()> {
    for hit in hits {
        processor.process(
            hit.template_id,
            hit.frame,
            hit.read_id,
            hit.template_start,
            hit.score,
            hit.indel_score,
        )?;
    }
    processor.thread_finish()
}

/// Runs one worker per region and waits for all of them.
fn run_workers(
    parent: &mut RegionOutputProcessor,
    regions: &[Region],
    hits: &[CandidateHit],
    threads: usize,
) -> Result<()> {
    let mut work = Vec::with_capacity(regions.len());
    for region in regions {
        let assigned: Vec<CandidateHit> = hits
            .iter()
            .filter(|h| region.contains_padded(h.template_id, i64::from(h.template_start)))
            .copied()
            .collect();
        info!("Region {region}: {} hits", format_count(assigned.len() as u64));
        work.push((parent.thread_clone(*region)?, assigned));
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .context("Failed to build rayon thread pool")?;
    let errors: Mutex<Vec<anyhow::Error>> = Mutex::new(Vec::new());
    pool.scope(|scope| {
        let errors = &errors;
        for (mut worker, assigned) in work {
            scope.spawn(move |_| {
                if let Err(e) = feed(&mut worker, &assigned) {
                    errors.lock().push(e);
                }
            });
        }
    });

    if let Some(e) = errors.into_inner().into_iter().next() {
        return Err(e.context("Worker failed"));
    }
    Ok(())
}

impl Command for Merge {
    fn execute(&self, command_line: &str) -> Result<()> {
        validate_file_exists(&self.input, "Hits")?;
        self.reference.validate()?;
        self.threading.validate()?;

        info!("Starting Merge");
        info!("Command line: {command_line}");
        info!("Input: {}", self.input.display());
        info!("Output prefix: {}", self.output.display());
        info!("Mode: {:?}", self.output_kind());
        info!("Threads: {}", self.threading.threads);

        let timer = OperationTimer::new("Merging hits");
        let hits = read_hits(&self.input)?;
        let paired = self.is_paired();
        let distinct: AHashSet<i32> =
            hits.iter().map(|h| ReadEncoder::decode(paired, h.read_id).0).collect();
        info!(
            "Read {} hits for {} distinct reads",
            format_count(hits.len() as u64),
            format_count(distinct.len() as u64)
        );

        let num_reads = match self.num_reads {
            Some(n) => n,
            None => derive_num_reads(&hits, paired)?,
        };
        let config = self.build_config(num_reads)?;
        let sinks = self.build_sinks()?;
        let mut parent = RegionOutputProcessor::new(config, sinks)?;

        if self.threading.is_single_threaded() {
            feed(&mut parent, &hits)?;
        } else {
            let regions = Region::partition(
                &self.reference.template_lengths,
                self.threading.threads,
                self.padding(),
            )?;
            run_workers(&mut parent, &regions, &hits, self.threading.threads)?;
        }

        let stats: MapStatistics = parent.finish()?;
        let metrics_path = self.output_path(".mapstats.txt");
        write_metrics_auto(&metrics_path, &stats.rows())?;
        info!("Wrote mapping statistics to {}", metrics_path.display());

        timer.log_completion(hits.len() as u64);
        Ok(())
    }
}
