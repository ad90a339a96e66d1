//! Inspect command implementation.

use super::{open_directory, open_reader};
use crate::fields::FieldSpec;
use kdpoints_bkd::PointValues;
use kdpoints_codec::to_hex;
use kdpoints_format::{read_segment_header, version, PointsReader, SegmentFiles};
use kdpoints_storage::{Directory, FsDirectory};
use serde::Serialize;
use std::path::Path;

/// Segment inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Segment directory path.
    pub path: String,
    /// Segment name.
    pub segment: String,
    /// Segment suffix.
    pub suffix: String,
    /// Segment id in hex.
    pub segment_id: String,
    /// Format version recorded in the meta file.
    pub format_version: u32,
    /// Protocol the recorded version resolves to, if this build knows it.
    pub protocol_version: Option<u32>,
    /// Sizes of the segment's files.
    pub files: Vec<FileStats>,
    /// Total size in bytes.
    pub total_size: u64,
    /// Field statistics (if fields were described).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<FieldStats>>,
}

/// Size of a single file.
#[derive(Debug, Serialize)]
pub struct FileStats {
    /// File name.
    pub name: String,
    /// Size in bytes, absent if the file is missing.
    pub size: Option<u64>,
}

/// Statistics for a single field.
#[derive(Debug, Serialize)]
pub struct FieldStats {
    /// Field name.
    pub name: String,
    /// Field number.
    pub number: u32,
    /// Total dimensions.
    pub dims: usize,
    /// Indexed dimensions.
    pub index_dims: usize,
    /// Bytes per dimension.
    pub bytes_per_dim: usize,
    /// Number of points.
    pub points: u64,
    /// Number of documents with at least one point.
    pub docs: u32,
    /// Number of leaf blocks.
    pub leaves: u32,
    /// Leaf capacity the field was written with.
    pub max_points_in_leaf: usize,
    /// Minimum packed value, hex.
    pub min_value: String,
    /// Maximum packed value, hex.
    pub max_value: String,
}

/// Runs the inspect command.
pub fn run(
    path: &Path,
    segment: &str,
    suffix: &str,
    specs: &[FieldSpec],
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let dir = open_directory(path)?;
    let header = read_segment_header(&dir, segment, suffix)?;

    let files = SegmentFiles::new(segment, suffix);
    let file_stats = file_sizes(&dir, &files)?;
    let total_size = file_stats.iter().filter_map(|f| f.size).sum();

    let fields = if specs.is_empty() {
        None
    } else {
        let reader = open_reader(&dir, &header, segment, specs)?;
        Some(field_stats(&reader))
    };

    let result = InspectResult {
        path: path.display().to_string(),
        segment: segment.to_string(),
        suffix: suffix.to_string(),
        segment_id: to_hex(&header.segment_id),
        format_version: header.format_version.get(),
        protocol_version: version::resolve(header.format_version)
            .ok()
            .map(|p| p.get()),
        files: file_stats,
        total_size,
        fields,
    };

    // Output
    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

fn file_sizes(
    dir: &FsDirectory,
    files: &SegmentFiles,
) -> Result<Vec<FileStats>, Box<dyn std::error::Error>> {
    let mut stats = Vec::new();
    for name in files.all() {
        let size = if dir.file_exists(name) {
            Some(dir.open_input(name)?.len())
        } else {
            None
        };
        stats.push(FileStats {
            name: name.to_string(),
            size,
        });
    }
    Ok(stats)
}

fn field_stats(reader: &PointsReader) -> Vec<FieldStats> {
    reader
        .fields()
        .filter_map(|info| {
            let tree = reader.values(&info.name)?;
            Some(FieldStats {
                name: info.name.clone(),
                number: info.number,
                dims: tree.num_dimensions(),
                index_dims: tree.num_index_dimensions(),
                bytes_per_dim: tree.bytes_per_dimension(),
                points: tree.size(),
                docs: tree.doc_count(),
                leaves: tree.num_leaves(),
                max_points_in_leaf: tree.max_points_in_leaf_node(),
                min_value: to_hex(tree.min_packed_value()),
                max_value: to_hex(tree.max_packed_value()),
            })
        })
        .collect()
}

fn print_text_output(result: &InspectResult) {
    println!("kdpoints Segment Inspection");
    println!("===========================");
    println!();
    println!("Path:    {}", result.path);
    println!("Segment: {}", result.segment);
    if !result.suffix.is_empty() {
        println!("Suffix:  {}", result.suffix);
    }
    println!("Id:      {}", result.segment_id);
    println!();

    println!("Versions:");
    println!("  Format version:   {}", result.format_version);
    match result.protocol_version {
        Some(protocol) => println!("  BKD protocol:     {}", protocol),
        None => println!("  BKD protocol:     unsupported by this build"),
    }
    println!();

    println!("Files:");
    for file in &result.files {
        match file.size {
            Some(size) => println!("  {:<20} {}", file.name, format_bytes(size)),
            None => println!("  {:<20} missing", file.name),
        }
    }
    println!("  {:<20} {}", "Total", format_bytes(result.total_size));

    if let Some(fields) = &result.fields {
        println!();
        println!("Fields:");
        if fields.is_empty() {
            println!("  (no described field has points)");
        }
        for field in fields {
            println!("  {} (#{}):", field.name, field.number);
            println!(
                "    Shape:  {} dims ({} indexed) x {} bytes",
                field.dims, field.index_dims, field.bytes_per_dim
            );
            println!("    Points: {} in {} docs", field.points, field.docs);
            println!(
                "    Leaves: {} (up to {} points each)",
                field.leaves, field.max_points_in_leaf
            );
            println!("    Min:    {}", field.min_value);
            println!("    Max:    {}", field.max_value);
        }
    }
}

fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}
