//! Integration tests for the merge and regions commands.

use std::path::Path;
use std::process::Command;

use mapmerge_lib::output::CandidateHit;
use mapmerge_lib::read::{Frame, ReadEncoder};
use tempfile::TempDir;

use crate::helpers::{hit, read_rows, write_hits};

fn run(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_mapmerge"))
        .args(args)
        .output()
        .expect("Failed to run mapmerge")
}

fn path_str(path: &Path) -> &str {
    path.to_str().expect("non-UTF-8 temp path")
}

fn paired_hits() -> Vec<CandidateHit> {
    let first = |r| ReadEncoder::PairedFirst.encode(r);
    let second = |r| ReadEncoder::PairedSecond.encode(r);
    vec![
        hit(first(0), Frame::Forward, 120, 1),
        hit(second(0), Frame::Reverse, 260, 1),
        hit(first(1), Frame::Forward, 990, 2),
        hit(second(1), Frame::Reverse, 1100, 0),
        hit(first(2), Frame::Forward, 1500, 0),
        hit(first(3), Frame::Forward, 1980, 0),
        hit(second(3), Frame::Reverse, 2010, 3),
    ]
}

fn merge_mated(dir: &TempDir, prefix: &str, threads: &str) {
    let output = run(&[
        "merge",
        "-i",
        path_str(&dir.path().join("hits.tsv")),
        "-o",
        path_str(&dir.path().join(prefix)),
        "-l",
        "2100",
        "--mode",
        "mated",
        "--write-unmated",
        "--write-unmapped",
        "--read-length",
        "50",
        "--max-fragment-length",
        "300",
        "--threads",
        threads,
        "--temp-dir",
        path_str(dir.path()),
    ]);
    assert!(output.status.success(), "merge failed: {}", String::from_utf8_lossy(&output.stderr));
}

#[test]
fn test_mated_merge_is_thread_independent() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    write_hits(&dir.path().join("hits.tsv"), &paired_hits());

    merge_mated(&dir, "single", "1");
    merge_mated(&dir, "multi", "4");

    for suffix in [".mated.tsv", ".unmated.tsv", ".unmapped.tsv", ".mapstats.txt"] {
        let single = read_rows(&dir.path().join(format!("single{suffix}")));
        let multi = read_rows(&dir.path().join(format!("multi{suffix}")));
        assert_eq!(single, multi, "{suffix} differs between thread counts");
    }

    let mated = read_rows(&dir.path().join("multi.mated.tsv"));
    let mated_reads: Vec<&str> = mated.iter().map(|row| row[0].as_str()).collect();
    assert_eq!(mated_reads, vec!["0", "0", "1", "1", "3", "3"]);

    let unmated = read_rows(&dir.path().join("multi.unmated.tsv"));
    assert_eq!(unmated.len(), 1);
    assert_eq!((unmated[0][0].as_str(), unmated[0][3].as_str()), ("2", "1500"));

    let unmapped = read_rows(&dir.path().join("multi.unmapped.tsv"));
    assert_eq!(unmapped.len(), 1);
    assert_eq!((unmapped[0][0].as_str(), unmapped[0][7].as_str()), ("2", "A"));
}

#[test]
fn test_single_end_dedup_merge() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let input = dir.path().join("hits.tsv");
    write_hits(
        &input,
        &[
            hit(0, Frame::Reverse, 400, 0),
            hit(0, Frame::Reverse, 400, 0),
            hit(1, Frame::Reverse, 400, 0),
            hit(1, Frame::Reverse, 400, 0),
        ],
    );
    let prefix = dir.path().join("out");
    let output = run(&[
        "merge",
        "-i",
        path_str(&input),
        "-o",
        path_str(&prefix),
        "-l",
        "1000",
        "--mode",
        "dedup",
        "--dedup-cap",
        "1",
        "-t",
        "2",
    ]);
    assert!(output.status.success(), "merge failed: {}", String::from_utf8_lossy(&output.stderr));

    let rows = read_rows(&dir.path().join("out.unmated.tsv"));
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|row| row[3] == "400"));

    let stats = read_rows(&dir.path().join("out.mapstats.txt"));
    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0][0], "single");
    assert_eq!(stats[0][1], "2");
}

#[test]
fn test_merge_rejects_hits_outside_reference() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let input = dir.path().join("hits.tsv");
    write_hits(&input, &[hit(0, Frame::Forward, 5000, 0)]);
    let output = run(&[
        "merge",
        "-i",
        path_str(&input),
        "-o",
        path_str(&dir.path().join("out")),
        "-l",
        "1000",
    ]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("outside the reference"));
}

#[test]
fn test_regions_command() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let output_path = dir.path().join("regions.tsv");
    let output = run(&[
        "regions",
        "-l",
        "600,400",
        "-t",
        "4",
        "--no-padding",
        "-o",
        path_str(&output_path),
    ]);
    assert!(output.status.success(), "regions failed: {}", String::from_utf8_lossy(&output.stderr));

    let rows = read_rows(&output_path);
    assert_eq!(rows.len(), 4);
    // third region starts on the first template and ends on the second
    assert_eq!(rows[2][1..5], ["0", "500", "1", "150"].map(String::from));
}
