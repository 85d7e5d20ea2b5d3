use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Serialize;
use starcloud::validate::validate;
use starcloud::{CompletenessReport, FileStatus, StatusCounts};

use crate::config::AppConfig;

pub struct ValidateArgs {
    pub root: PathBuf,
    pub years: Vec<i32>,
    pub tiles: Vec<String>,
    pub csv: Option<PathBuf>,
}

pub async fn run(config: &AppConfig, args: ValidateArgs) -> Result<()> {
    let tiles = if args.tiles.is_empty() {
        config.tiles.clone()
    } else {
        args.tiles
    };
    if args.years.is_empty() {
        bail!("at least one year is required");
    }

    let client = super::build_client(config)?;
    let report = validate(
        &client,
        &args.root,
        &tiles,
        &args.years,
        &config.validate_options(),
    )
    .await;

    let stdout = std::io::stdout();
    render_report(&report, &mut stdout.lock())?;

    if let Some(path) = &args.csv {
        write_csv(&report, path)?;
        println!("Wrote completeness report to {}", path.display());
    }

    if report.pairs.is_empty() && !report.errors.is_empty() {
        bail!("no (tile, year) pair could be validated");
    }
    Ok(())
}

fn status_line(counts: &StatusCounts) -> String {
    format!(
        "{:>4} files  complete {:>5.1}%  incomplete {:>5.1}%  missing {:>5.1}%",
        counts.total(),
        counts.percent(FileStatus::Complete),
        counts.percent(FileStatus::Incomplete),
        counts.percent(FileStatus::Missing),
    )
}

/// Per-pair percentages, failed pairs, the overall summary and the
/// JSON list of tiles that still need work.
pub fn render_report(report: &CompletenessReport, out: &mut impl Write) -> Result<()> {
    for pair in &report.pairs {
        writeln!(out, "{:<12} {}", pair.pair.to_string(), status_line(&pair.counts()))?;
    }
    for (pair, reason) in &report.errors {
        writeln!(out, "{:<12} could not validate: {reason}", pair.to_string())?;
    }

    let totals = report.totals();
    writeln!(out, "{:<12} {}", "total", status_line(&totals))?;
    writeln!(
        out,
        "Incomplete tiles: {}",
        serde_json::to_string(&report.incomplete_tiles())?
    )?;
    Ok(())
}

#[derive(Serialize)]
struct CsvRow<'a> {
    tile: &'a str,
    year: i32,
    filename: &'a str,
    expected_size: u64,
    on_disk: Option<u64>,
    status: &'static str,
}

/// One row per manifest file.
pub fn write_csv(report: &CompletenessReport, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;

    for file in report.files() {
        writer.serialize(CsvRow {
            tile: &file.tile,
            year: file.year,
            filename: &file.filename,
            expected_size: file.expected_size,
            on_disk: file.on_disk,
            status: file.status.as_str(),
        })?;
    }
    writer
        .flush()
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use starcloud::{FileReport, PairReport, TileYear};

    use super::*;

    fn file(tile: &str, name: &str, on_disk: Option<u64>, status: FileStatus) -> FileReport {
        FileReport {
            tile: tile.into(),
            year: 2020,
            filename: name.into(),
            expected_size: 100,
            on_disk,
            status,
        }
    }

    fn sample() -> CompletenessReport {
        CompletenessReport {
            pairs: vec![
                PairReport {
                    pair: TileYear::new("31UFS", 2020),
                    files: vec![
                        file("31UFS", "a.tif", Some(100), FileStatus::Complete),
                        file("31UFS", "b.tif", Some(40), FileStatus::Incomplete),
                    ],
                },
                PairReport {
                    pair: TileYear::new("32UMD", 2020),
                    files: vec![file("32UMD", "c.tif", Some(100), FileStatus::Complete)],
                },
            ],
            errors: vec![(TileYear::new("33UVQ", 2020), "HTTP 500".into())],
        }
    }

    #[test]
    fn report_lists_pairs_and_incomplete_tiles() {
        let mut out = Vec::new();
        render_report(&sample(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("31UFS/2020"));
        assert!(text.contains("complete  50.0%"));
        assert!(text.contains("33UVQ/2020   could not validate: HTTP 500"));
        assert!(text.contains(r#"Incomplete tiles: ["31UFS"]"#));
    }

    #[test]
    fn csv_has_one_row_per_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.csv");
        write_csv(&sample(), &path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines[0], "tile,year,filename,expected_size,on_disk,status");
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[2], "31UFS,2020,b.tif,100,40,incomplete");
    }
}
