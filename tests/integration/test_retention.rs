//! Per-read retention policies driven through several workers.

use anyhow::Result;
use mapmerge_lib::output::{
    CandidateHit, MemorySink, OutputConfig, OutputKind, OutputProcessor, OutputSinks,
    RegionOutputProcessor,
};
use mapmerge_lib::read::Frame;
use mapmerge_lib::region::Region;
use mapmerge_lib::store::StoreDimensions;
use mapmerge_metrics::{MapStatistics, StatsArm};
use proptest::prelude::*;
use rstest::rstest;

use crate::helpers::{feed, hit, run_regions};

/// Runs `hits` through two padded workers and returns the records and statistics.
fn run_two_workers(config: OutputConfig, hits: &[CandidateHit]) -> Result<(MemorySink, MapStatistics)> {
    let out = MemorySink::new();
    let sinks = OutputSinks { unmated: Some(Box::new(out.clone())), ..OutputSinks::default() };
    let mut parent = RegionOutputProcessor::new(config.threads(2), sinks)?;
    let regions = Region::partition(&[1000], 2, 100)?;
    run_regions(&mut parent, &regions, hits)?;
    let stats = parent.finish()?;
    Ok((out, stats))
}

fn dims(reads: usize) -> StoreDimensions {
    StoreDimensions::new(reads, 1, 1000)
}

#[test]
fn test_duplicate_hits_collapse_to_cap() -> Result<()> {
    // every hit sits at 400, inside both workers' padded regions
    let hits: Vec<CandidateHit> =
        [0, 0, 1, 1].iter().map(|&read| hit(read, Frame::Reverse, 400, 0)).collect();
    let (out, stats) = run_two_workers(OutputConfig::new(OutputKind::SingleEndDedup { cap: 1 }, dims(2)), &hits)?;

    let records = out.records();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.position == 400 && r.is_reverse()));
    assert_eq!(records.iter().map(|r| r.read_id).collect::<Vec<_>>(), vec![0, 1]);
    assert_eq!(stats.arm(StatsArm::First).unmated_unique, 2);
    Ok(())
}

#[rstest]
#[case::blocked(6, 5, 0)]
#[case::at_limit(5, 5, 1)]
#[case::single(1, 1, 1)]
fn test_top_random_tie_limit(
    #[case] ties: i32,
    #[case] max_top_results: usize,
    #[case] expected_records: usize,
) -> Result<()> {
    // ties alternate between the two workers' regions
    let hits: Vec<CandidateHit> =
        (0..ties).map(|i| hit(0, Frame::Forward, 100 + i * 150, 2)).collect();
    let config =
        OutputConfig::new(OutputKind::SingleEndTopRandom, dims(1)).max_top_results(max_top_results);
    let (out, stats) = run_two_workers(config, &hits)?;

    let records = out.records();
    assert_eq!(records.len(), expected_records);
    let first = stats.arm(StatsArm::First);
    if expected_records == 0 {
        assert_eq!(first.unmapped_blocked, 1);
    } else {
        assert!(hits.iter().any(|h| h.template_start == records[0].position));
        let expected_unique = u64::from(ties == 1);
        assert_eq!(first.unmated_unique, expected_unique);
        assert_eq!(first.unmated_ambiguous, 1 - expected_unique);
    }
    Ok(())
}

#[rstest]
#[case::blocked(2, 0)]
#[case::kept(3, 2)]
fn test_top_n_best_ties(#[case] max_top_results: usize, #[case] expected_records: usize) -> Result<()> {
    let hits = vec![
        hit(0, Frame::Forward, 50, 1),
        hit(0, Frame::Forward, 450, 1),
        hit(0, Frame::Reverse, 800, 1),
        hit(0, Frame::Forward, 900, 4),
    ];
    let config = OutputConfig::new(OutputKind::SingleEndTopN { n: 2 }, dims(1))
        .max_top_results(max_top_results);
    let (out, _) = run_two_workers(config, &hits)?;
    let records = out.records();
    assert_eq!(records.len(), expected_records);
    assert!(records.iter().all(|r| r.score == Some(1)));
    Ok(())
}

#[rstest]
#[case::top_n(OutputKind::SingleEndTopN { n: 1 })]
#[case::top_random(OutputKind::SingleEndTopRandom)]
fn test_repeated_tie_does_not_block(#[case] kind: OutputKind) -> Result<()> {
    // two distinct best placements, the second submitted twice from the other worker
    let hits = vec![
        hit(0, Frame::Forward, 100, 1),
        hit(0, Frame::Forward, 600, 1),
        hit(0, Frame::Forward, 600, 1),
    ];
    let config = OutputConfig::new(kind, dims(1)).max_top_results(2);
    let (out, stats) = run_two_workers(config, &hits)?;
    assert_eq!(out.records().len(), 1);
    let first = stats.arm(StatsArm::First);
    assert_eq!(first.unmapped_blocked, 0);
    assert_eq!(first.unmated_ambiguous, 1);
    Ok(())
}

#[test]
fn test_dedup_is_never_blocked() -> Result<()> {
    let out = MemorySink::new();
    let sinks = OutputSinks { unmated: Some(Box::new(out.clone())), ..OutputSinks::default() };
    let config =
        OutputConfig::new(OutputKind::SingleEndDedup { cap: 2 }, dims(1)).max_top_results(1);
    let mut parent = RegionOutputProcessor::new(config, sinks)?;
    let hits: Vec<CandidateHit> = (0..8).map(|i| hit(0, Frame::Forward, i * 100, 0)).collect();
    feed(&mut parent, &hits)?;
    let stats = parent.finish()?;

    let positions: Vec<i32> = out.records().iter().map(|r| r.position).collect();
    assert_eq!(positions, vec![0, 100]);
    assert_eq!(stats.arm(StatsArm::First).unmapped_blocked, 0);
    Ok(())
}

fn single_thread_stats(config: OutputConfig, hits: &[CandidateHit]) -> Result<MapStatistics> {
    let sinks = OutputSinks { unmated: Some(Box::new(MemorySink::new())), ..OutputSinks::default() };
    let mut parent = RegionOutputProcessor::new(config, sinks)?;
    feed(&mut parent, hits)?;
    parent.finish()
}

/// Number of reads whose distinct best-score positions exceed `max_ties`.
fn expected_blocked(hits: &[CandidateHit], reads: i32, max_ties: usize) -> u64 {
    (0..reads)
        .filter(|&read| {
            let own: Vec<_> = hits.iter().filter(|h| h.read_id == read).collect();
            let Some(best) = own.iter().map(|h| h.score).min() else { return false };
            let mut positions: Vec<i32> =
                own.iter().filter(|h| h.score == best).map(|h| h.template_start).collect();
            positions.sort_unstable();
            positions.dedup();
            positions.len() > max_ties
        })
        .count() as u64
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_tie_counts_ignore_repeats_and_workers(
        offers in prop::collection::vec((0i32..6, 0i32..20, 0i32..2), 1..50),
        top_random in any::<bool>(),
    ) {
        // few positions so identical hits are common
        let hits: Vec<CandidateHit> = offers
            .iter()
            .map(|&(read, slot, score)| hit(read, Frame::Forward, slot * 50, score))
            .collect();
        let kind = if top_random {
            OutputKind::SingleEndTopRandom
        } else {
            OutputKind::SingleEndTopN { n: 2 }
        };
        let config = OutputConfig::new(kind, dims(6)).max_top_results(2);

        let single = single_thread_stats(config.clone(), &hits).unwrap();
        let (_, multi) = run_two_workers(config, &hits).unwrap();
        prop_assert_eq!(single.arm(StatsArm::First).unmapped_blocked, expected_blocked(&hits, 6, 2));
        prop_assert_eq!(single, multi);
    }
}
