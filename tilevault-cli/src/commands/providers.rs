//! Provider listing.

use console::style;
use tilevault::engine::OfflineTiles;

/// Print every registered provider.
pub fn run(engine: &OfflineTiles) {
    for provider in engine.providers() {
        println!(
            "{} {} ({}, {} mirrors)",
            style(format!("{:<14}", provider.id)).bold(),
            provider.name,
            provider.image_format,
            provider.mirrors.len()
        );
    }
}
