//! Opening a sealed segment's points.

use crate::error::{PointsError, PointsResult};
use crate::format::{SegmentFiles, DATA_CODEC_NAME, INDEX_CODEC_NAME, META_CODEC_NAME};
use crate::segment::{FieldInfo, SegmentReadState};
use crate::version::{self, FormatVersion};
use crate::writer::END_OF_FIELDS;
use kdpoints_bkd::{BkdEngine, PointValues, ProtocolVersion, TreeEngine, TreeInputs};
use kdpoints_codec::{
    check_index_header, checksum_entire_file, index_header_length, retrieve_checksum,
    verify_checksum, CodecError, DataReader, SegmentId, FOOTER_LENGTH,
};
use kdpoints_storage::IndexInput;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug)]
struct FieldEntry<T> {
    info: FieldInfo,
    tree: T,
}

/// Read access to a sealed segment's points.
///
/// Created by [`crate::PointsFormat::fields_reader`]. Immutable and
/// shareable across threads.
#[derive(Debug)]
pub struct PointsReader<E: TreeEngine = BkdEngine> {
    format_version: FormatVersion,
    protocol: ProtocolVersion,
    segment: String,
    files: SegmentFiles,
    index: Arc<dyn IndexInput>,
    data: Arc<dyn IndexInput>,
    fields: BTreeMap<u32, FieldEntry<E::Tree>>,
}

impl<E: TreeEngine> PointsReader<E> {
    pub(crate) fn open(engine: &E, state: &SegmentReadState) -> PointsResult<Self> {
        let segment = &state.segment_info;
        let suffix = state.segment_suffix.as_str();
        let files = SegmentFiles::new(&segment.name, suffix);

        let result = Self::open_files(engine, state, &files);
        match &result {
            Ok(reader) => tracing::debug!(
                segment = %segment.name,
                format_version = reader.format_version.get(),
                protocol = reader.protocol.get(),
                fields = reader.fields.len(),
                "opened points reader"
            ),
            Err(e @ PointsError::CorruptionDetected { .. }) => {
                tracing::warn!(segment = %segment.name, error = %e, "points corruption detected");
            }
            Err(e) => tracing::debug!(segment = %segment.name, error = %e, "points open failed"),
        }
        result
    }

    fn open_files(
        engine: &E,
        state: &SegmentReadState,
        files: &SegmentFiles,
    ) -> PointsResult<Self> {
        let segment = &state.segment_info;
        let suffix = state.segment_suffix.as_str();

        let corrupt_meta = |e: CodecError| PointsError::from_codec(&files.meta, e);
        let meta_bytes = state.directory.open_input(&files.meta)?.read_all()?;
        let mut meta = DataReader::new(&meta_bytes);

        // Any version is accepted here so that an unknown one is reported
        // as unsupported rather than corrupt.
        let recorded = check_index_header(
            &mut meta,
            META_CODEC_NAME,
            0,
            u32::MAX,
            &segment.id,
            suffix,
        )
        .map_err(corrupt_meta)?;
        let format_version = FormatVersion::new(recorded);
        let protocol = version::resolve(format_version)?;
        if !engine.supports(protocol) {
            return Err(PointsError::UnsupportedVersion { version: recorded });
        }

        let index = state.directory.open_input(&files.index)?;
        let data = state.directory.open_input(&files.data)?;
        for (input, codec) in [(&index, INDEX_CODEC_NAME), (&data, DATA_CODEC_NAME)] {
            check_companion(input.as_ref(), codec, format_version, &segment.id, suffix)?;
        }

        let inputs = TreeInputs {
            index: Arc::clone(&index),
            data: Arc::clone(&data),
            segment_id: segment.id,
            suffix: suffix.to_string(),
        };
        let mut fields = BTreeMap::new();
        loop {
            let number = meta.read_i32().map_err(corrupt_meta)?;
            if number == END_OF_FIELDS {
                break;
            }
            let info = u32::try_from(number)
                .ok()
                .and_then(|n| state.field_infos.by_number(n))
                .ok_or_else(|| {
                    PointsError::corruption(&files.meta, format!("invalid field number: {number}"))
                })?;
            if fields.contains_key(&info.number) {
                return Err(PointsError::corruption(
                    &files.meta,
                    format!("field {} recorded twice", info.name),
                ));
            }
            let tree = engine
                .open(protocol, &mut meta, &inputs)
                .map_err(|e| PointsError::from_engine(&files.meta, e))?;
            check_shape(&tree, info, &files.meta)?;
            fields.insert(
                info.number,
                FieldEntry {
                    info: info.clone(),
                    tree,
                },
            );
        }

        let index_length = meta.read_u64().map_err(corrupt_meta)?;
        let data_length = meta.read_u64().map_err(corrupt_meta)?;
        for (input, expected) in [(&index, index_length), (&data, data_length)] {
            if input.len() != expected {
                return Err(PointsError::corruption(
                    input.name(),
                    format!("expected length {expected}, found {}", input.len()),
                ));
            }
        }

        if meta.remaining() != FOOTER_LENGTH {
            return Err(PointsError::corruption(
                &files.meta,
                format!("{} unexpected bytes before footer", meta.remaining()),
            ));
        }
        verify_checksum(&meta_bytes).map_err(corrupt_meta)?;

        Ok(Self {
            format_version,
            protocol,
            segment: segment.name.clone(),
            files: files.clone(),
            index,
            data,
            fields,
        })
    }

    /// The format version recorded in the segment.
    #[must_use]
    pub fn format_version(&self) -> FormatVersion {
        self.format_version
    }

    /// The tree engine protocol the recorded version resolves to.
    #[must_use]
    pub fn protocol_version(&self) -> ProtocolVersion {
        self.protocol
    }

    /// Name of the segment.
    #[must_use]
    pub fn segment(&self) -> &str {
        &self.segment
    }

    /// Names of the segment's files.
    #[must_use]
    pub fn files(&self) -> &SegmentFiles {
        &self.files
    }

    /// Fields that have points, in field number order.
    pub fn fields(&self) -> impl Iterator<Item = &FieldInfo> {
        self.fields.values().map(|entry| &entry.info)
    }

    /// Points of the named field, if it has any.
    #[must_use]
    pub fn values(&self, field: &str) -> Option<&E::Tree> {
        self.fields
            .values()
            .find(|entry| entry.info.name == field)
            .map(|entry| &entry.tree)
    }

    /// Verifies the full checksums of the index and data files.
    ///
    /// The meta file is always verified when the reader is opened.
    ///
    /// # Errors
    ///
    /// Returns [`PointsError::CorruptionDetected`] naming the first file
    /// whose checksum does not match, or a storage error.
    pub fn check_integrity(&self) -> PointsResult<()> {
        for input in [&self.index, &self.data] {
            checksum_entire_file(input.as_ref())
                .map_err(|e| PointsError::from_codec(input.name(), e))?;
        }
        tracing::debug!(segment = %self.segment, "points checksums verified");
        Ok(())
    }
}

/// Checks that an index or data file belongs to this segment and was
/// written under exactly `version`.
fn check_companion(
    input: &dyn IndexInput,
    codec: &str,
    version: FormatVersion,
    segment_id: &SegmentId,
    suffix: &str,
) -> PointsResult<()> {
    let name = input.name();
    let header_len = index_header_length(codec, suffix);
    if input.len() < (header_len + FOOTER_LENGTH) as u64 {
        return Err(PointsError::corruption(
            name,
            format!("file too short: {} bytes", input.len()),
        ));
    }
    let head = input.read_at(0, header_len)?;
    let mut r = DataReader::new(&head);
    let recorded = check_index_header(&mut r, codec, 0, u32::MAX, segment_id, suffix)
        .map_err(|e| PointsError::from_codec(name, e))?;
    if recorded != version.get() {
        return Err(PointsError::corruption(
            name,
            format!("format version {recorded} disagrees with meta version {version}"),
        ));
    }
    retrieve_checksum(input).map_err(|e| PointsError::from_codec(name, e))?;
    Ok(())
}

/// Checks an opened tree against the field's declared shape.
fn check_shape<T: PointValues>(
    tree: &T,
    info: &FieldInfo,
    resource: &str,
) -> PointsResult<()> {
    let shape = (
        tree.num_dimensions(),
        tree.num_index_dimensions(),
        tree.bytes_per_dimension(),
    );
    let declared = (
        info.point_dimension_count,
        info.point_index_dimension_count,
        info.point_num_bytes,
    );
    if shape != declared {
        return Err(PointsError::corruption(
            resource,
            format!(
                "field {} has shape {shape:?} on disk, declared {declared:?}",
                info.name
            ),
        ));
    }
    Ok(())
}
