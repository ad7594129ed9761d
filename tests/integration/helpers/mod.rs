//! Helper utilities for integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::thread;

use anyhow::Result;
use mapmerge_lib::output::{CandidateHit, OutputProcessor, RegionOutputProcessor};
use mapmerge_lib::read::Frame;
use mapmerge_lib::region::Region;

/// A hit on template 0.
#[must_use]
pub fn hit(read_id: i32, frame: Frame, template_start: i32, score: i32) -> CandidateHit {
    CandidateHit { template_id: 0, frame, read_id, template_start, score, indel_score: 0 }
}

/// Writes `hits` as a hits table with a header line.
///
/// # Panics
///
/// Panics if the file cannot be written.
pub fn write_hits(path: &Path, hits: &[CandidateHit]) {
    let mut text = String::from("template_id\tframe\tread_id\ttemplate_start\tscore\tindel_score\n");
    for h in hits {
        text.push_str(&format!(
            "{}\t{}\t{}\t{}\t{}\t{}\n",
            h.template_id, h.frame, h.read_id, h.template_start, h.score, h.indel_score
        ));
    }
    fs::write(path, text).expect("Failed to write hits table");
}

/// The data lines of a TSV file, split into fields.
///
/// # Panics
///
/// Panics if the file cannot be read.
#[must_use]
pub fn read_rows(path: &Path) -> Vec<Vec<String>> {
    fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("Failed to read {}: {e}", path.display()))
        .lines()
        .skip(1)
        .map(|line| line.split('\t').map(str::to_string).collect())
        .collect()
}

/// Feeds `hits` to a processor in coordinate order, then finishes its region.
pub fn feed(processor: &mut RegionOutputProcessor, hits: &[CandidateHit]) -> Result<()> {
    let mut sorted = hits.to_vec();
    sorted.sort_by_key(|h| (h.template_id, h.template_start, h.read_id));
    for h in &sorted {
        processor.process(h.template_id, h.frame, h.read_id, h.template_start, h.score, h.indel_score)?;
    }
    processor.thread_finish()
}

/// Clones one worker per region and feeds each, on its own thread, the hits in
/// its padded region.
pub fn run_regions(
    parent: &mut RegionOutputProcessor,
    regions: &[Region],
    hits: &[CandidateHit],
) -> Result<()> {
    let mut workers = Vec::with_capacity(regions.len());
    for region in regions {
        let assigned: Vec<CandidateHit> = hits
            .iter()
            .filter(|h| region.contains_padded(h.template_id, i64::from(h.template_start)))
            .copied()
            .collect();
        workers.push((parent.thread_clone(*region)?, assigned));
    }
    thread::scope(|scope| {
        let handles: Vec<_> = workers
            .into_iter()
            .map(|(mut worker, assigned)| scope.spawn(move || feed(&mut worker, &assigned)))
            .collect();
        handles.into_iter().try_for_each(|h| h.join().expect("worker panicked"))
    })
}
