//! Show how the reference is partitioned into worker regions.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use fgoxide::io::DelimFile;
use log::info;
use serde::Serialize;

use mapmerge_lib::region::Region;

use crate::commands::command::Command;
use crate::commands::common::{PairingOptions, ReferenceOptions, ThreadingOptions};

/// One row of the partition table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct RegionRow {
    index: usize,
    start_template: i64,
    start: i64,
    end_template: i64,
    end: i64,
    padded_start: i64,
    padded_end: i64,
}

impl RegionRow {
    fn new(index: usize, region: &Region) -> Self {
        Self {
            index,
            start_template: region.template_start_id(),
            start: region.start_pos(),
            end_template: region.template_end_id(),
            end: region.end_pos(),
            padded_start: region.padded_start_pos(),
            padded_end: region.padded_end_pos(),
        }
    }
}

/// Print the worker regions `merge` would use.
#[derive(Debug, Parser)]
#[command(
    name = "regions",
    about = "\x1b[38;5;166m[UTILITIES]\x1b[0m      \x1b[36mShow the per-thread partition of the reference\x1b[0m",
    long_about = r#"
Partition the reference into one region per thread and write the regions as a
tab-separated table. End positions are exclusive. Padding defaults to the
padding used by mated merging; pass --no-padding for the single-end layout.

Example usage:
  mapmerge regions -l 5000,3000 -t 4 -o regions.tsv
"#
)]
pub struct Regions {
    /// Output table
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,

    /// Reference template lengths
    #[command(flatten)]
    pub reference: ReferenceOptions,

    /// Number of regions
    #[command(flatten)]
    pub threading: ThreadingOptions,

    /// Mate pairing options used to size the padding
    #[command(flatten)]
    pub pairing: PairingOptions,

    /// Do not pad the regions
    #[arg(long = "no-padding", default_value = "false")]
    pub no_padding: bool,
}

impl Regions {
    fn rows(&self) -> Result<Vec<RegionRow>> {
        let padding = if self.no_padding {
            0
        } else {
            self.pairing.to_config()?;
            self.pairing.padding()
        };
        let regions =
            Region::partition(&self.reference.template_lengths, self.threading.threads, padding)?;
        Ok(regions.iter().enumerate().map(|(i, r)| RegionRow::new(i, r)).collect())
    }
}

impl Command for Regions {
    fn execute(&self, _command_line: &str) -> Result<()> {
        self.reference.validate()?;
        self.threading.validate()?;

        let rows = self.rows()?;
        for row in &rows {
            info!(
                "Region {}: {}:{}-{}:{} (padded {}-{})",
                row.index,
                row.start_template,
                row.start,
                row.end_template,
                row.end,
                row.padded_start,
                row.padded_end
            );
        }
        DelimFile::default()
            .write_tsv(&self.output, &rows)
            .with_context(|| format!("Failed to write regions: {}", self.output.display()))?;
        info!("Wrote {} regions to {}", rows.len(), self.output.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    fn regions(lengths: Vec<i64>, threads: usize, no_padding: bool) -> Regions {
        Regions {
            output: PathBuf::from("unused.tsv"),
            reference: ReferenceOptions { template_lengths: lengths },
            threading: ThreadingOptions { threads },
            pairing: PairingOptions { max_fragment_length: 50, read_length: 10, ..PairingOptions::default() },
            no_padding,
        }
    }

    #[rstest]
    #[case(vec![100], 1, 1)]
    #[case(vec![100], 4, 4)]
    #[case(vec![60, 40], 2, 2)]
    #[case(vec![3], 8, 3)]
    fn test_region_count(#[case] lengths: Vec<i64>, #[case] threads: usize, #[case] expected: usize) {
        assert_eq!(regions(lengths, threads, true).rows().unwrap().len(), expected);
    }

    #[test]
    fn test_padding_is_clamped() {
        let rows = regions(vec![100], 2, false).rows().unwrap();
        assert_eq!((rows[0].padded_start, rows[0].padded_end), (0, 100));
        assert_eq!((rows[1].start, rows[1].padded_start), (50, 0));
    }

    #[test]
    fn test_unpadded_rows_tile_the_reference() {
        let rows = regions(vec![60, 40], 2, true).rows().unwrap();
        assert_eq!(
            rows[0],
            RegionRow {
                index: 0,
                start_template: 0,
                start: 0,
                end_template: 0,
                end: 50,
                padded_start: 0,
                padded_end: 50,
            }
        );
        assert_eq!((rows[1].start_template, rows[1].start, rows[1].end_template, rows[1].end), (0, 50, 1, 40));
    }

    #[test]
    fn test_execute_writes_table() -> Result<()> {
        let dir = TempDir::new()?;
        let mut cmd = regions(vec![100, 20], 3, true);
        cmd.output = dir.path().join("regions.tsv");
        cmd.execute("test")?;
        let text = std::fs::read_to_string(&cmd.output)?;
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("index\tstart_template\tstart\tend_template\tend\tpadded_start\tpadded_end")
        );
        assert_eq!(lines.count(), 3);
        Ok(())
    }
}
