//! Map management CLI commands.

use clap::Subcommand;
use console::style;
use dialoguer::Confirm;
use tilevault::engine::OfflineTiles;
use tilevault::size::format_bytes;

use crate::error::CliError;

/// Map management subcommands.
#[derive(Debug, Subcommand)]
pub enum MapAction {
    /// List stored maps with their size
    List,
    /// Delete a map and the tiles only it uses
    Delete {
        /// Map name
        name: String,
    },
    /// Rename a map
    Rename {
        /// Current map name
        old: String,
        /// New map name
        new: String,
    },
    /// Delete every stored tile and map
    Clear {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Show the number of stored tiles
    Count,
}

/// Run a map subcommand.
pub async fn run(engine: &OfflineTiles, action: MapAction) -> Result<(), CliError> {
    match action {
        MapAction::List => {
            let maps = engine.list_maps().await?;
            if maps.is_empty() {
                println!("No offline maps stored.");
                return Ok(());
            }

            let mut total = 0;
            for map in &maps {
                total += map.size_bytes();
                let gaps = if map.size.missing > 0 {
                    style(format!(" ({} tiles missing)", map.size.missing))
                        .yellow()
                        .to_string()
                } else {
                    String::new()
                };
                println!(
                    "{:<24} {:>6} tiles {:>10}{}",
                    map.name,
                    map.tile_keys.len(),
                    map.size_display(),
                    gaps
                );
            }
            println!();
            println!("{} maps, {} total", maps.len(), format_bytes(total));
            Ok(())
        }
        MapAction::Delete { name } => {
            let summary = engine.delete_map(&name).await?;
            println!(
                "{} Deleted map '{}' ({} tiles removed, {} kept for other maps)",
                style("✓").green(),
                name,
                summary.tiles_deleted,
                summary.tiles_shared
            );
            Ok(())
        }
        MapAction::Rename { old, new } => {
            engine.rename_map(&old, &new).await?;
            println!("{} Renamed '{}' to '{}'", style("✓").green(), old, new);
            Ok(())
        }
        MapAction::Clear { yes } => {
            if !yes {
                let confirmed = Confirm::new()
                    .with_prompt("Delete ALL offline tiles and maps?")
                    .default(false)
                    .interact()
                    .map_err(|e| CliError::Prompt(e.to_string()))?;
                if !confirmed {
                    println!("Aborted.");
                    return Ok(());
                }
            }
            engine.clear_all().await?;
            println!("{} All offline data cleared", style("✓").green());
            Ok(())
        }
        MapAction::Count => {
            println!("{}", engine.tile_count().await?);
            Ok(())
        }
    }
}
