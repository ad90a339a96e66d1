//! CLI command implementations.

pub mod inspect;
pub mod verify;
pub mod versions;

use crate::fields::{field_infos, FieldSpec};
use kdpoints_format::{
    PointsFormat, PointsReader, SegmentHeader, SegmentInfo, SegmentReadState,
};
use kdpoints_storage::FsDirectory;
use std::path::Path;
use std::sync::Arc;

/// Opens an existing segment directory without creating it.
pub fn open_directory(path: &Path) -> Result<FsDirectory, Box<dyn std::error::Error>> {
    if !path.is_dir() {
        return Err(format!("No segment directory found at {:?}", path).into());
    }
    Ok(FsDirectory::open(path)?)
}

/// Opens the points of a segment whose fields were given on the command line.
pub fn open_reader(
    dir: &FsDirectory,
    header: &SegmentHeader,
    segment: &str,
    specs: &[FieldSpec],
) -> Result<PointsReader, Box<dyn std::error::Error>> {
    // Readers never check doc ids, so the doc count is left open.
    let info = SegmentInfo::with_id(segment, header.segment_id, u32::MAX);
    let state = SegmentReadState::new(Arc::new(dir.clone()), info, field_infos(specs)?)
        .with_suffix(header.suffix.clone());
    Ok(PointsFormat::new().fields_reader(&state)?)
}
