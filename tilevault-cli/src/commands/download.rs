//! Map download command.

use std::io::IsTerminal;
use std::ops::RangeInclusive;
use std::str::FromStr;

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use tilevault::coord::{
    count_tiles_in_bounds, tiles_in_bounds, CoordError, GeoBounds, TileCoord, MAX_ZOOM,
};
use tilevault::download::{DownloadOutcome, DownloadProgress, DownloadReport, TilePhase};
use tilevault::engine::OfflineTiles;

use crate::error::CliError;

/// Refuse bounding boxes that would expand to more tiles than this.
const MAX_BBOX_TILES: u64 = 100_000;

/// Arguments for `tilevault download`.
#[derive(Debug, Args)]
pub struct DownloadArgs {
    /// Name to store the map under
    #[arg(long)]
    pub map: String,

    /// Tile provider id (see `tilevault providers`)
    #[arg(long, default_value = "osm")]
    pub provider: String,

    /// Tile coordinates to download
    #[arg(
        long = "tile",
        value_name = "Z/X/Y",
        num_args = 1..,
        conflicts_with = "bbox",
        required_unless_present = "bbox"
    )]
    pub tiles: Vec<TileCoord>,

    /// Bounding box in degrees
    #[arg(long, value_name = "S,W,N,E", allow_hyphen_values = true, requires = "zoom")]
    pub bbox: Option<GeoBounds>,

    /// Zoom level or range for --bbox
    #[arg(long, value_name = "MIN..MAX")]
    pub zoom: Option<ZoomRange>,
}

/// Inclusive zoom range parsed from `"12"` or `"10..14"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoomRange(pub RangeInclusive<u8>);

impl FromStr for ZoomRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse = |v: &str| -> Result<u8, String> {
            let zoom: u8 = v
                .trim()
                .parse()
                .map_err(|_| format!("invalid zoom level '{}'", v))?;
            if zoom > MAX_ZOOM {
                return Err(format!("zoom {} exceeds maximum {}", zoom, MAX_ZOOM));
            }
            Ok(zoom)
        };

        let (min, max) = match s.split_once("..") {
            Some((a, b)) => (parse(a)?, parse(b)?),
            None => {
                let z = parse(s)?;
                (z, z)
            }
        };
        if min > max {
            return Err(format!("empty zoom range {}..{}", min, max));
        }
        Ok(ZoomRange(min..=max))
    }
}

impl DownloadArgs {
    /// Coordinates to download, either given directly or expanded from
    /// the bounding box.
    pub fn coordinates(&self) -> Result<Vec<TileCoord>, CliError> {
        let (Some(bounds), Some(zoom)) = (&self.bbox, &self.zoom) else {
            return Ok(self.tiles.clone());
        };

        let invalid = |e: CoordError| CliError::InvalidArgs(e.to_string());
        let count = count_tiles_in_bounds(bounds, zoom.0.clone()).map_err(invalid)?;
        if count > MAX_BBOX_TILES {
            return Err(CliError::InvalidArgs(format!(
                "Bounding box covers {} tiles (limit {}); narrow the area or zoom range",
                count, MAX_BBOX_TILES
            )));
        }
        tiles_in_bounds(bounds, zoom.0.clone()).map_err(invalid)
    }
}

fn progress_bar(total: u64) -> ProgressBar {
    if !std::io::stderr().is_terminal() {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(total);
    if let Ok(bar_style) = ProgressStyle::default_bar()
        .template("{elapsed_precise} [{bar:40.cyan/blue}] {pos}/{len} tiles ({per_sec}) {msg}")
    {
        bar.set_style(bar_style.progress_chars("█▓▒░ "));
    }
    bar
}

/// Run the download command.
///
/// Ctrl-C cancels the batch; tiles already stored and the map manifest
/// are kept.
pub async fn run(engine: &OfflineTiles, args: DownloadArgs) -> Result<(), CliError> {
    let coords = args.coordinates()?;
    info!(map = %args.map, provider = %args.provider, tiles = coords.len(), "Download requested");

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });

    let bar = progress_bar(coords.len() as u64);
    let (tx, mut rx) = mpsc::channel::<DownloadProgress>(64);
    let reporter = {
        let bar = bar.clone();
        tokio::spawn(async move {
            while let Some(progress) = rx.recv().await {
                bar.set_length(progress.total as u64);
                bar.set_position(progress.completed as u64);
                if progress.phase == TilePhase::Failed {
                    bar.set_message(format!("last failure: {}", progress.key));
                }
            }
        })
    };

    let result = engine
        .download_map(&args.map, &args.provider, &coords, Some(tx), cancel)
        .await;
    // The sender was moved into the download and is dropped by now
    let _ = reporter.await;
    bar.finish_and_clear();

    let report = result.map_err(CliError::Download)?;
    print_summary(&report);

    match report.outcome() {
        DownloadOutcome::Complete => Ok(()),
        outcome => Err(CliError::Incomplete {
            outcome,
            failed: report.failed.len(),
            unfinished: report.unfinished.len(),
        }),
    }
}

fn print_summary(report: &DownloadReport) {
    let mark = match report.outcome() {
        DownloadOutcome::Complete => style("✓").green(),
        DownloadOutcome::PartialFailure => style("!").yellow(),
        DownloadOutcome::Cancelled => style("✗").red(),
    };
    println!(
        "{} Map '{}': {}/{} tiles stored",
        mark, report.map_name, report.stored, report.total
    );
    for failed in report.failed.iter().take(10) {
        println!("    {} {}", failed.key, style(&failed.reason).dim());
    }
    if report.failed.len() > 10 {
        println!("    ... and {} more", report.failed.len() - 10);
    }
}
