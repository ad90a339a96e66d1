//! Verify command implementation.

use super::{open_directory, open_reader};
use crate::fields::FieldSpec;
use kdpoints_codec::{
    check_index_header, checksum_entire_file, index_header_length, DataReader, FOOTER_LENGTH,
};
use kdpoints_format::{
    read_segment_header, version, SegmentFiles, SegmentHeader, DATA_CODEC_NAME,
    INDEX_CODEC_NAME, META_CODEC_NAME,
};
use kdpoints_storage::{Directory, FsDirectory};
use std::path::Path;

/// Verification result.
#[derive(Debug, Default)]
pub struct VerifyResult {
    /// Number of files checked.
    pub files_checked: usize,
    /// Number of fields opened and scanned.
    pub fields_checked: usize,
    /// List of errors found.
    pub errors: Vec<String>,
}

impl VerifyResult {
    fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Runs the verify command.
pub fn run(
    path: &Path,
    segment: &str,
    suffix: &str,
    specs: &[FieldSpec],
) -> Result<(), Box<dyn std::error::Error>> {
    println!("Verifying segment {} at {:?}", segment, path);
    println!();

    let dir = open_directory(path)?;
    let header = read_segment_header(&dir, segment, suffix)?;
    let mut result = VerifyResult::default();

    match version::resolve(header.format_version) {
        Ok(protocol) => println!(
            "Format version {} (BKD protocol {})",
            header.format_version,
            protocol.get()
        ),
        Err(e) => result.errors.push(e.to_string()),
    }

    println!("Checking files...");
    verify_files(&dir, &header, segment, &mut result);

    if !specs.is_empty() && result.is_ok() {
        println!("Checking fields...");
        verify_fields(&dir, &header, segment, specs, &mut result);
    }

    print_result(&result);

    println!();
    if result.is_ok() {
        println!("✓ Segment verification passed");
        Ok(())
    } else {
        println!("✗ Segment verification failed");
        Err("Verification failed".into())
    }
}

/// Checks that every file carries the meta file's version and segment and
/// that its full checksum matches.
fn verify_files(
    dir: &FsDirectory,
    header: &SegmentHeader,
    segment: &str,
    result: &mut VerifyResult,
) {
    let files = SegmentFiles::new(segment, &header.suffix);
    let version = header.format_version.get();
    for (name, codec) in [
        (&files.meta, META_CODEC_NAME),
        (&files.index, INDEX_CODEC_NAME),
        (&files.data, DATA_CODEC_NAME),
    ] {
        result.files_checked += 1;
        if let Err(e) = verify_file(dir, name, codec, version, header) {
            result.errors.push(format!("{}: {}", name, e));
        }
    }
}

fn verify_file(
    dir: &FsDirectory,
    name: &str,
    codec: &str,
    version: u32,
    header: &SegmentHeader,
) -> Result<(), Box<dyn std::error::Error>> {
    let input = dir.open_input(name)?;
    let header_len = index_header_length(codec, &header.suffix);
    if input.len() < (header_len + FOOTER_LENGTH) as u64 {
        return Err(format!("file too short: {} bytes", input.len()).into());
    }

    let head = input.read_at(0, header_len)?;
    check_index_header(
        &mut DataReader::new(&head),
        codec,
        version,
        version,
        &header.segment_id,
        &header.suffix,
    )?;
    checksum_entire_file(input.as_ref())?;
    Ok(())
}

/// Opens every described field and decodes all of its leaves.
fn verify_fields(
    dir: &FsDirectory,
    header: &SegmentHeader,
    segment: &str,
    specs: &[FieldSpec],
    result: &mut VerifyResult,
) {
    let reader = match open_reader(dir, header, segment, specs) {
        Ok(reader) => reader,
        Err(e) => {
            result.errors.push(e.to_string());
            return;
        }
    };
    for info in reader.fields() {
        result.fields_checked += 1;
        let Some(tree) = reader.values(&info.name) else {
            continue;
        };
        if let Err(e) = tree.validate_leaves() {
            result.errors.push(format!("field {}: {}", info.name, e));
        }
    }
}

fn print_result(result: &VerifyResult) {
    println!(
        "  files checked: {}, fields checked: {}, errors: {}",
        result.files_checked,
        result.fields_checked,
        result.errors.len()
    );
    for error in &result.errors {
        println!("    ERROR: {}", error);
    }
}
