//! Versions command implementation.

use kdpoints_format::{version, VERSION_CURRENT};
use serde::Serialize;

/// One row of the version table.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct VersionEntry {
    /// Format version recorded in segment headers.
    pub format_version: u32,
    /// BKD protocol the format version is bound to.
    pub protocol_version: u32,
    /// Whether new segments are written with this version.
    pub current: bool,
}

/// Rows of the version table, oldest first.
pub fn entries() -> Vec<VersionEntry> {
    version::entries()
        .iter()
        .map(|&(format_version, protocol)| VersionEntry {
            format_version: format_version.get(),
            protocol_version: protocol.get(),
            current: format_version == VERSION_CURRENT,
        })
        .collect()
}

/// Runs the versions command.
pub fn run(format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let entries = entries();
    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        _ => {
            println!("{:<8} {:<10}", "Format", "Protocol");
            for entry in &entries {
                let marker = if entry.current { " (current)" } else { "" };
                println!(
                    "{:<8} {:<10}{}",
                    entry.format_version, entry.protocol_version, marker
                );
            }
        }
    }
    Ok(())
}
