//! Multi-worker runs must produce the same output as a single-threaded run.

use anyhow::Result;
use mapmerge_lib::output::{
    AlignmentRecord, MemorySink, OutputConfig, OutputKind, OutputProcessor, OutputSinks,
    RegionOutputProcessor,
};
use mapmerge_lib::pairing::PairingConfig;
use mapmerge_lib::read::{Frame, ReadEncoder};
use mapmerge_lib::region::{Region, thread_padding};
use mapmerge_lib::store::StoreDimensions;
use mapmerge_lib::output::CandidateHit;
use proptest::prelude::*;

use crate::helpers::{feed, hit, run_regions};

struct MatedOutputs {
    mated: MemorySink,
    unmated: MemorySink,
    unmapped: MemorySink,
}

impl MatedOutputs {
    fn new() -> (OutputSinks, Self) {
        let outputs =
            Self { mated: MemorySink::new(), unmated: MemorySink::new(), unmapped: MemorySink::new() };
        let sinks = OutputSinks {
            mated: Some(Box::new(outputs.mated.clone())),
            unmated: Some(Box::new(outputs.unmated.clone())),
            unmapped: Some(Box::new(outputs.unmapped.clone())),
        };
        (sinks, outputs)
    }

    fn sorted(sink: &MemorySink) -> Vec<AlignmentRecord> {
        let mut records = sink.records();
        records.sort();
        records
    }
}

fn mated_config(num_reads: usize, length: i64, pairing: PairingConfig, threads: usize) -> OutputConfig {
    OutputConfig::new(
        OutputKind::Mated { unmated: true, unmapped: true },
        StoreDimensions::new(num_reads, 1, length),
    )
    .pairing(pairing)
    .threads(threads)
}

fn first(read: i32) -> i32 {
    ReadEncoder::PairedFirst.encode(read)
}

fn second(read: i32) -> i32 {
    ReadEncoder::PairedSecond.encode(read)
}

/// Four workers, each bound to a quarter of a 50-unit template and given one
/// forward/reverse pair, match a single-threaded run.
#[test]
fn test_four_quarters_match_single_thread() -> Result<()> {
    let pairing = PairingConfig { min_fragment_length: 0, max_fragment_length: 20, read_length: 5, ..PairingConfig::default() };
    let regions = Region::partition(&[50], 4, thread_padding(20, 5))?;
    assert_eq!(regions.len(), 4);

    let per_region: Vec<Vec<CandidateHit>> = regions
        .iter()
        .enumerate()
        .map(|(i, region)| {
            let read = i as i32;
            let start = region.start_pos() as i32;
            vec![hit(first(read), Frame::Forward, start + 1, 1), hit(second(read), Frame::Reverse, start + 6, 2)]
        })
        .collect();

    let (sinks, multi) = MatedOutputs::new();
    let mut parent = RegionOutputProcessor::new(mated_config(4, 50, pairing, 4), sinks)?;
    let mut workers = regions
        .iter()
        .map(|&r| parent.thread_clone(r))
        .collect::<Result<Vec<_>>>()?;
    std::thread::scope(|scope| {
        let handles: Vec<_> = workers
            .iter_mut()
            .zip(&per_region)
            .map(|(worker, hits)| scope.spawn(move || feed(worker, hits)))
            .collect();
        handles.into_iter().try_for_each(|h| h.join().expect("worker panicked"))
    })?;
    drop(workers);
    let multi_stats = parent.finish()?;

    let (sinks, single) = MatedOutputs::new();
    let mut parent = RegionOutputProcessor::new(mated_config(4, 50, pairing, 1), sinks)?;
    let all: Vec<CandidateHit> = per_region.concat();
    feed(&mut parent, &all)?;
    let single_stats = parent.finish()?;

    let mated = MatedOutputs::sorted(&multi.mated);
    assert_eq!(mated.len(), 8);
    assert_eq!(mated, MatedOutputs::sorted(&single.mated));
    assert!(multi.unmated.records().is_empty());
    assert!(multi.unmapped.records().is_empty());
    assert_eq!(multi_stats, single_stats);
    Ok(())
}

/// Pairs that straddle region boundaries, lone arms and blocked reads all come
/// out the same when every worker is fed its padded region.
#[test]
fn test_boundary_pairs_match_single_thread() -> Result<()> {
    let pairing = PairingConfig { min_fragment_length: 50, max_fragment_length: 150, read_length: 30, ..PairingConfig::default() };
    let length = 1000;
    let hits = vec![
        // read 0 straddles the 250 boundary
        hit(first(0), Frame::Forward, 230, 1),
        hit(second(0), Frame::Reverse, 300, 1),
        // read 1 has two pair placements; the better one wins
        hit(first(1), Frame::Forward, 480, 2),
        hit(second(1), Frame::Reverse, 560, 2),
        hit(first(1), Frame::Forward, 700, 0),
        hit(second(1), Frame::Reverse, 760, 1),
        // read 2 has a lone second arm near a boundary
        hit(second(2), Frame::Reverse, 498, 3),
        // read 3 pairs equally well in three places, more than allowed
        hit(first(3), Frame::Forward, 100, 0),
        hit(second(3), Frame::Reverse, 180, 0),
        hit(first(3), Frame::Forward, 400, 0),
        hit(second(3), Frame::Reverse, 480, 0),
        hit(first(3), Frame::Forward, 820, 0),
        hit(second(3), Frame::Reverse, 900, 0),
    ];

    let config = |threads| mated_config(5, length, pairing, threads).max_top_results(2);

    let (sinks, single) = MatedOutputs::new();
    let mut parent = RegionOutputProcessor::new(config(1), sinks)?;
    feed(&mut parent, &hits)?;
    let single_stats = parent.finish()?;

    let (sinks, multi) = MatedOutputs::new();
    let mut parent = RegionOutputProcessor::new(config(4), sinks)?;
    let regions = Region::partition(&[length], 4, thread_padding(150, 30))?;
    run_regions(&mut parent, &regions, &hits)?;
    let multi_stats = parent.finish()?;

    for (single_sink, multi_sink) in
        [(&single.mated, &multi.mated), (&single.unmated, &multi.unmated), (&single.unmapped, &multi.unmapped)]
    {
        assert_eq!(MatedOutputs::sorted(single_sink), MatedOutputs::sorted(multi_sink));
    }
    assert_eq!(single_stats, multi_stats);

    let mated_reads: Vec<i32> = multi.mated.records().iter().map(|r| r.read_id).collect();
    assert_eq!(mated_reads, vec![0, 0, 1, 1]);
    assert_eq!(multi.mated.records()[2].position, 700);
    // read 2's lone arm is unmated; read 3 and read 4 are unmapped
    assert_eq!(multi.unmated.records().len(), 1);
    let unmapped: Vec<(i32, Option<char>)> =
        multi.unmapped.records().iter().map(|r| (r.read_id, r.status_code)).collect();
    assert!(unmapped.contains(&(3, Some('B'))));
    assert!(unmapped.contains(&(4, Some('A'))));
    Ok(())
}

fn unfiltered_records(hits: &[CandidateHit], threads: usize, padding: i64) -> Result<Vec<AlignmentRecord>> {
    let out = MemorySink::new();
    let sinks = OutputSinks { unmated: Some(Box::new(out.clone())), ..OutputSinks::default() };
    let config = OutputConfig::new(OutputKind::Unfiltered, StoreDimensions::new(50, 1, 2000))
        .threads(threads);
    let mut parent = RegionOutputProcessor::new(config, sinks)?;
    if threads == 1 {
        feed(&mut parent, hits)?;
    } else {
        let regions = Region::partition(&[2000], threads, padding)?;
        run_regions(&mut parent, &regions, hits)?;
    }
    parent.finish()?;
    Ok(out.records())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_unfiltered_output_independent_of_threads(
        // drawn with replacement so identical hits occur
        placements in prop::collection::vec((0i32..50, 0i32..2000), 1..60),
        threads in 2usize..6,
        padding in 0i64..200,
    ) {
        let hits: Vec<CandidateHit> = placements
            .iter()
            .map(|&(read, pos)| hit(read, if pos % 3 == 0 { Frame::Reverse } else { Frame::Forward }, pos, pos % 7))
            .collect();
        let single = unfiltered_records(&hits, 1, 0).unwrap();
        let multi = unfiltered_records(&hits, threads, padding).unwrap();
        prop_assert_eq!(single.len(), hits.len());
        prop_assert_eq!(single, multi);
    }
}
