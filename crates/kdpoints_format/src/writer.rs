//! Writing a segment's points.
//!
//! ## Meta file layout
//!
//! ```text
//! IndexHeader (PointsFormatMeta, format version, segment id, suffix)
//! repeated per field with points:
//!     field_number: i32
//!     tree record (written by the tree engine)
//! -1: i32
//! index_file_length: u64
//! data_file_length: u64
//! Footer
//! ```
//!
//! The index and data files carry only their own header, the tree
//! engine's bytes for every field, and a footer.

use crate::error::{PointsError, PointsResult};
use crate::format::{SegmentFiles, DATA_CODEC_NAME, INDEX_CODEC_NAME, META_CODEC_NAME};
use crate::reader::PointsReader;
use crate::segment::{FieldInfo, FieldInfos, SegmentWriteState};
use crate::version::FormatVersion;
use kdpoints_bkd::{
    BkdConfig, BkdEngine, BkdError, FieldOutputs, FieldSummary, IntersectVisitor, PointBuffer,
    PointValues, ProtocolVersion, Relation, TreeEngine,
};
use kdpoints_codec::{write_index_header, ChecksumOutput, DataWriter, SegmentId, FOOTER_LENGTH};
use kdpoints_storage::{Directory, StorageError};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Marks the end of the field records in the meta file.
pub(crate) const END_OF_FIELDS: i32 = -1;

/// Points of one field, collected before the field is written.
#[derive(Debug, Clone)]
pub struct FieldPoints {
    field: FieldInfo,
    buffer: PointBuffer,
}

impl FieldPoints {
    /// Creates an empty buffer for `field`.
    ///
    /// # Errors
    ///
    /// Returns [`PointsError::InvalidArgument`] if the field has no point
    /// dimensions or an invalid shape.
    pub fn new(field: &FieldInfo) -> PointsResult<Self> {
        Ok(Self {
            buffer: PointBuffer::new(field.point_config()?),
            field: field.clone(),
        })
    }

    /// Adds one point for `doc_id`.
    ///
    /// # Errors
    ///
    /// Returns [`PointsError::InvalidArgument`] if the packed value has the
    /// wrong length.
    pub fn add(&mut self, doc_id: u32, packed_value: &[u8]) -> PointsResult<()> {
        self.buffer
            .add(doc_id, packed_value)
            .map_err(|e| PointsError::invalid_argument(format!("field {}: {e}", self.field.name)))
    }

    /// The field these points belong to.
    #[must_use]
    pub fn field(&self) -> &FieldInfo {
        &self.field
    }

    /// Number of points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns true if no point was added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

/// How a source segment's doc ids map into the segment being written.
#[derive(Debug, Clone, Copy)]
pub enum DocMap<'a> {
    /// Add a fixed base to every doc id.
    Offset(u32),
    /// Look each doc id up; `None` drops the doc (deleted).
    Table(&'a [Option<u32>]),
}

impl DocMap<'_> {
    fn map(&self, doc_id: u32) -> Option<u32> {
        match self {
            Self::Offset(base) => base.checked_add(doc_id),
            Self::Table(table) => table.get(doc_id as usize).copied().flatten(),
        }
    }
}

/// One sealed segment contributing to a merged field.
#[derive(Debug)]
pub struct MergeSource<'a, E: TreeEngine = BkdEngine> {
    /// Reader over the source segment.
    pub reader: &'a PointsReader<E>,
    /// Doc id remapping for this source.
    pub doc_map: DocMap<'a>,
}

impl<'a, E: TreeEngine> MergeSource<'a, E> {
    /// Creates a merge source.
    #[must_use]
    pub fn new(reader: &'a PointsReader<E>, doc_map: DocMap<'a>) -> Self {
        Self { reader, doc_map }
    }
}

/// Collects every point of a tree, remapping doc ids.
struct MergeCollector<'a, 'b> {
    doc_map: DocMap<'a>,
    out: &'b mut PointBuffer,
    error: Option<BkdError>,
}

impl IntersectVisitor for MergeCollector<'_, '_> {
    fn visit(&mut self, _doc_id: u32) {
        // compare() never reports a cell as inside, so values always come
        // through visit_with_value.
    }

    fn visit_with_value(&mut self, doc_id: u32, packed_value: &[u8]) {
        if self.error.is_some() {
            return;
        }
        if let Some(doc) = self.doc_map.map(doc_id) {
            if let Err(e) = self.out.add(doc, packed_value) {
                self.error = Some(e);
            }
        }
    }

    fn compare(&self, _min_packed: &[u8], _max_packed: &[u8]) -> Relation {
        Relation::CellCrossesQuery
    }
}

/// Writes the points of one segment.
///
/// Created by [`crate::PointsFormat::fields_writer`]. Fields are written one
/// at a time; [`PointsWriter::finish`] seals the segment. A writer dropped
/// without `finish` leaves files the reader rejects as corrupt;
/// [`PointsWriter::abort`] deletes them instead.
///
/// A field that fails part way leaves the files inconsistent: the writer
/// then refuses further fields, and `finish` deletes the files and fails
/// instead of sealing them.
#[derive(Debug)]
pub struct PointsWriter<E: TreeEngine = BkdEngine> {
    engine: E,
    format_version: FormatVersion,
    protocol: ProtocolVersion,
    config: BkdConfig,
    directory: Arc<dyn Directory>,
    segment: String,
    segment_id: SegmentId,
    suffix: String,
    max_doc: u32,
    field_infos: FieldInfos,
    files: SegmentFiles,
    meta: ChecksumOutput,
    index: ChecksumOutput,
    data: ChecksumOutput,
    written: BTreeSet<u32>,
    failed: Option<String>,
}

impl<E: TreeEngine> PointsWriter<E> {
    pub(crate) fn create(
        engine: E,
        format_version: FormatVersion,
        protocol: ProtocolVersion,
        config: BkdConfig,
        state: &SegmentWriteState,
    ) -> PointsResult<Self> {
        let segment = &state.segment_info;
        let suffix = &state.segment_suffix;
        let files = SegmentFiles::new(&segment.name, suffix);
        let directory = Arc::clone(&state.directory);

        let mut headers = Vec::with_capacity(3);
        for (name, codec) in [
            (&files.meta, META_CODEC_NAME),
            (&files.index, INDEX_CODEC_NAME),
            (&files.data, DATA_CODEC_NAME),
        ] {
            let mut header = DataWriter::new();
            write_index_header(&mut header, codec, format_version.get(), &segment.id, suffix)
                .map_err(|e| PointsError::invalid_argument(e.to_string()))?;
            headers.push((name, header));
        }

        let mut outputs = Vec::with_capacity(3);
        for (name, header) in &headers {
            let step = directory.create_output(name).and_then(|out| {
                let mut out = ChecksumOutput::new(out);
                out.write_data(header).map(|_| out)
            });
            match step {
                Ok(out) => outputs.push(out),
                Err(e) => {
                    let mut stale: Vec<String> =
                        outputs.iter().map(|o| o.name().to_string()).collect();
                    if !matches!(e, StorageError::AlreadyExists { .. }) && directory.file_exists(name)
                    {
                        stale.push(name.to_string());
                    }
                    drop(outputs);
                    for name in &stale {
                        if let Err(cleanup) = directory.delete_file(name) {
                            tracing::warn!(file = %name, error = %cleanup, "failed to remove partial file");
                        }
                    }
                    return Err(e.into());
                }
            }
        }
        let [meta, index, data]: [ChecksumOutput; 3] = outputs
            .try_into()
            .map_err(|_| PointsError::invalid_argument("expected three segment outputs"))?;

        tracing::debug!(
            segment = %segment.name,
            suffix = %suffix,
            format_version = format_version.get(),
            protocol = protocol.get(),
            "created points writer"
        );

        Ok(Self {
            engine,
            format_version,
            protocol,
            config,
            directory,
            segment: segment.name.clone(),
            segment_id: segment.id,
            suffix: suffix.clone(),
            max_doc: segment.max_doc,
            field_infos: state.field_infos.clone(),
            files,
            meta,
            index,
            data,
            written: BTreeSet::new(),
            failed: None,
        })
    }

    /// The format version being written.
    #[must_use]
    pub fn format_version(&self) -> FormatVersion {
        self.format_version
    }

    /// The tree engine protocol being written.
    #[must_use]
    pub fn protocol_version(&self) -> ProtocolVersion {
        self.protocol
    }

    /// Names of the files being written.
    #[must_use]
    pub fn files(&self) -> &SegmentFiles {
        &self.files
    }

    /// Builds and writes the tree for one field.
    ///
    /// A field without points writes nothing.
    ///
    /// # Errors
    ///
    /// Returns [`PointsError::InvalidArgument`] if the field is not part of
    /// the segment, was already written, a doc id is out of range, or an
    /// earlier field failed; otherwise a storage error.
    pub fn write_field(&mut self, points: &FieldPoints) -> PointsResult<()> {
        self.ensure_usable()?;
        let field = points.field();
        match self.field_infos.by_number(field.number) {
            Some(known) if known == field => {}
            _ => {
                return Err(PointsError::invalid_argument(format!(
                    "field {} (#{}) is not part of segment {}",
                    field.name, field.number, self.segment
                )))
            }
        }
        if self.written.contains(&field.number) {
            return Err(PointsError::invalid_argument(format!(
                "field {} was already written",
                field.name
            )));
        }
        if let Some(max) = points.buffer.max_doc_id() {
            if max >= self.max_doc {
                return Err(PointsError::invalid_argument(format!(
                    "doc id {max} out of range for segment with {} docs",
                    self.max_doc
                )));
            }
        }
        let number = i32::try_from(field.number).map_err(|_| {
            PointsError::invalid_argument(format!("field number {} too large", field.number))
        })?;

        if points.is_empty() {
            tracing::trace!(field = %field.name, "field has no points, skipped");
            return Ok(());
        }

        // Anything written from here on cannot be taken back.
        let summary = match self.write_tree(number, points) {
            Ok(summary) => summary,
            Err(e) => {
                tracing::warn!(
                    segment = %self.segment,
                    field = %field.name,
                    error = %e,
                    "field write failed, segment must be aborted"
                );
                self.failed = Some(format!("field {}: {e}", field.name));
                return Err(e);
            }
        };
        self.written.insert(field.number);

        tracing::debug!(
            segment = %self.segment,
            field = %field.name,
            points = summary.point_count,
            docs = summary.doc_count,
            leaves = summary.num_leaves,
            "wrote field points"
        );
        Ok(())
    }

    fn write_tree(&mut self, number: i32, points: &FieldPoints) -> PointsResult<FieldSummary> {
        let mut record = DataWriter::with_capacity(4);
        record.write_i32(number);
        self.meta.write_data(&record)?;

        self.engine
            .build(
                self.protocol,
                &self.config,
                &points.buffer,
                FieldOutputs {
                    meta: &mut self.meta,
                    index: &mut self.index,
                    data: &mut self.data,
                    segment_id: &self.segment_id,
                    suffix: &self.suffix,
                },
            )
            .map_err(|e| PointsError::from_engine(&self.files.meta, e))?
            .ok_or_else(|| {
                PointsError::invalid_argument(format!(
                    "tree engine wrote no tree for field {}",
                    points.field().name
                ))
            })
    }

    fn ensure_usable(&self) -> PointsResult<()> {
        match &self.failed {
            Some(cause) => Err(PointsError::invalid_argument(format!(
                "points writer for segment {} failed earlier ({cause}); abort it",
                self.segment
            ))),
            None => Ok(()),
        }
    }

    /// Rebuilds `field` from the same field in several sealed segments.
    ///
    /// Doc ids are remapped per source; points of dropped docs are not
    /// carried over. Sources without the field contribute nothing.
    ///
    /// # Errors
    ///
    /// Returns [`PointsError::InvalidArgument`] if a source's field shape
    /// differs, plus every error of [`PointsWriter::write_field`].
    pub fn merge_field(
        &mut self,
        field: &FieldInfo,
        sources: &[MergeSource<'_, E>],
    ) -> PointsResult<()> {
        let mut merged = FieldPoints::new(field)?;
        for source in sources {
            let Some(values) = source.reader.values(&field.name) else {
                continue;
            };
            let config = values.config();
            if *config != *merged.buffer.config() {
                return Err(PointsError::invalid_argument(format!(
                    "field {} has shape {config:?} in a source, expected {:?}",
                    field.name,
                    merged.buffer.config()
                )));
            }

            let mut collector = MergeCollector {
                doc_map: source.doc_map,
                out: &mut merged.buffer,
                error: None,
            };
            values
                .intersect(&mut collector)
                .map_err(|e| PointsError::from_engine(source.reader.segment(), e))?;
            if let Some(e) = collector.error {
                return Err(PointsError::invalid_argument(e.to_string()));
            }
        }
        tracing::debug!(
            segment = %self.segment,
            field = %field.name,
            sources = sources.len(),
            points = merged.len(),
            "merged field points"
        );
        self.write_field(&merged)
    }

    /// Writes the end marker, file lengths and footers, then syncs.
    ///
    /// The segment is sealed only once this returns `Ok`.
    ///
    /// # Errors
    ///
    /// Returns [`PointsError::InvalidArgument`] if an earlier field write
    /// failed, in which case the files are deleted, or a storage error if
    /// any file cannot be completed.
    pub fn finish(mut self) -> PointsResult<()> {
        if let Err(e) = self.ensure_usable() {
            if let Err(cleanup) = self.abort() {
                tracing::warn!(error = %cleanup, "failed to remove files of a failed writer");
            }
            return Err(e);
        }
        let index_length = self.index.position() + FOOTER_LENGTH as u64;
        let data_length = self.data.position() + FOOTER_LENGTH as u64;

        let mut trailer = DataWriter::with_capacity(20);
        trailer.write_i32(END_OF_FIELDS);
        trailer.write_u64(index_length);
        trailer.write_u64(data_length);
        self.meta.write_data(&trailer)?;

        let finish = |out: ChecksumOutput, name: &str| {
            out.finish().map_err(|e| PointsError::from_codec(name, e))
        };
        finish(self.index, &self.files.index)?;
        finish(self.data, &self.files.data)?;
        finish(self.meta, &self.files.meta)?;

        tracing::debug!(
            segment = %self.segment,
            fields = self.written.len(),
            index_length,
            data_length,
            format_version = self.format_version.get(),
            "sealed points"
        );
        Ok(())
    }

    /// Drops the outputs and deletes the partially written files.
    ///
    /// # Errors
    ///
    /// Returns the first storage error other than a missing file.
    pub fn abort(self) -> PointsResult<()> {
        let Self {
            directory,
            files,
            meta,
            index,
            data,
            segment,
            ..
        } = self;
        drop((meta, index, data));

        let mut first_error = None;
        for name in files.all() {
            match directory.delete_file(name) {
                Ok(()) | Err(StorageError::NotFound { .. }) => {}
                Err(e) => {
                    tracing::warn!(file = name, error = %e, "failed to delete aborted file");
                    first_error.get_or_insert(e);
                }
            }
        }
        tracing::debug!(segment = %segment, "aborted points writer");
        first_error.map_or(Ok(()), |e| Err(PointsError::Storage(e)))
    }
}
