//! Segment and field descriptions handed to writers and readers.

use crate::error::{PointsError, PointsResult};
use kdpoints_bkd::PointConfig;
use kdpoints_codec::SegmentId;
use kdpoints_storage::Directory;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Identity of a segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentInfo {
    /// Segment name, used as the file name stem.
    pub name: String,
    /// Unique id recorded in every file header.
    pub id: SegmentId,
    /// Number of documents in the segment; doc ids are `0..max_doc`.
    pub max_doc: u32,
}

impl SegmentInfo {
    /// Creates a segment with a fresh random id.
    #[must_use]
    pub fn new(name: impl Into<String>, max_doc: u32) -> Self {
        Self::with_id(name, Uuid::new_v4().into_bytes(), max_doc)
    }

    /// Creates a segment with a known id.
    #[must_use]
    pub fn with_id(name: impl Into<String>, id: SegmentId, max_doc: u32) -> Self {
        Self {
            name: name.into(),
            id,
            max_doc,
        }
    }

    /// Segment id as a UUID.
    #[must_use]
    pub fn uuid(&self) -> Uuid {
        Uuid::from_bytes(self.id)
    }
}

impl fmt::Display for SegmentInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.uuid())
    }
}

/// A field and the shape of its points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInfo {
    /// Field name.
    pub name: String,
    /// Field number, unique within a segment.
    pub number: u32,
    /// Total number of point dimensions; 0 means the field has no points.
    pub point_dimension_count: usize,
    /// Number of dimensions the tree splits on.
    pub point_index_dimension_count: usize,
    /// Bytes per dimension.
    pub point_num_bytes: usize,
}

impl FieldInfo {
    /// Creates a field whose dimensions are all indexed.
    #[must_use]
    pub fn new(name: impl Into<String>, number: u32, dims: usize, num_bytes: usize) -> Self {
        Self {
            name: name.into(),
            number,
            point_dimension_count: dims,
            point_index_dimension_count: dims,
            point_num_bytes: num_bytes,
        }
    }

    /// Sets the number of indexed dimensions.
    #[must_use]
    pub fn index_dimensions(mut self, count: usize) -> Self {
        self.point_index_dimension_count = count;
        self
    }

    /// Returns true if the field carries points.
    #[must_use]
    pub fn has_points(&self) -> bool {
        self.point_dimension_count > 0
    }

    /// Point shape of this field.
    ///
    /// # Errors
    ///
    /// Returns [`PointsError::InvalidArgument`] if the field has no point
    /// dimensions or its shape is out of range.
    pub fn point_config(&self) -> PointsResult<PointConfig> {
        if !self.has_points() {
            return Err(PointsError::invalid_argument(format!(
                "field {} has no point dimensions",
                self.name
            )));
        }
        PointConfig::new(
            self.point_dimension_count,
            self.point_index_dimension_count,
            self.point_num_bytes,
        )
        .map_err(|e| PointsError::invalid_argument(format!("field {}: {e}", self.name)))
    }
}

/// All fields of a segment, by number.
#[derive(Debug, Clone, Default)]
pub struct FieldInfos {
    by_number: BTreeMap<u32, FieldInfo>,
}

impl FieldInfos {
    /// Creates an empty set of fields.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a set of fields.
    ///
    /// # Errors
    ///
    /// Returns [`PointsError::InvalidArgument`] if two fields share a
    /// name or number.
    pub fn from_fields(fields: impl IntoIterator<Item = FieldInfo>) -> PointsResult<Self> {
        let mut infos = Self::new();
        for field in fields {
            infos.add(field)?;
        }
        Ok(infos)
    }

    /// Adds one field.
    ///
    /// # Errors
    ///
    /// Returns [`PointsError::InvalidArgument`] if the name or number is
    /// already taken.
    pub fn add(&mut self, field: FieldInfo) -> PointsResult<()> {
        if self.by_number.contains_key(&field.number) || self.by_name(&field.name).is_some() {
            return Err(PointsError::invalid_argument(format!(
                "duplicate field {} (#{})",
                field.name, field.number
            )));
        }
        self.by_number.insert(field.number, field);
        Ok(())
    }

    /// Looks a field up by number.
    #[must_use]
    pub fn by_number(&self, number: u32) -> Option<&FieldInfo> {
        self.by_number.get(&number)
    }

    /// Looks a field up by name.
    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<&FieldInfo> {
        self.by_number.values().find(|f| f.name == name)
    }

    /// Iterates fields in number order.
    pub fn iter(&self) -> impl Iterator<Item = &FieldInfo> {
        self.by_number.values()
    }

    /// Returns true if any field carries points.
    #[must_use]
    pub fn has_point_values(&self) -> bool {
        self.iter().any(FieldInfo::has_points)
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_number.len()
    }

    /// Returns true if there are no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_number.is_empty()
    }
}

/// Everything a writer needs to allocate a segment's files.
#[derive(Debug, Clone)]
pub struct SegmentWriteState {
    /// Where the files are created.
    pub directory: Arc<dyn Directory>,
    /// The segment being written.
    pub segment_info: SegmentInfo,
    /// Fields of the segment.
    pub field_infos: FieldInfos,
    /// Suffix distinguishing several point files in one segment.
    pub segment_suffix: String,
}

impl SegmentWriteState {
    /// Creates a write state with no suffix.
    #[must_use]
    pub fn new(
        directory: Arc<dyn Directory>,
        segment_info: SegmentInfo,
        field_infos: FieldInfos,
    ) -> Self {
        Self {
            directory,
            segment_info,
            field_infos,
            segment_suffix: String::new(),
        }
    }

    /// Sets the segment suffix.
    #[must_use]
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.segment_suffix = suffix.into();
        self
    }

    /// The matching read state.
    #[must_use]
    pub fn read_state(&self) -> SegmentReadState {
        SegmentReadState {
            directory: Arc::clone(&self.directory),
            segment_info: self.segment_info.clone(),
            field_infos: self.field_infos.clone(),
            segment_suffix: self.segment_suffix.clone(),
        }
    }
}

/// Everything a reader needs to open a segment's files.
#[derive(Debug, Clone)]
pub struct SegmentReadState {
    /// Where the files live.
    pub directory: Arc<dyn Directory>,
    /// The segment being opened.
    pub segment_info: SegmentInfo,
    /// Fields of the segment.
    pub field_infos: FieldInfos,
    /// Suffix the files were written with.
    pub segment_suffix: String,
}

impl SegmentReadState {
    /// Creates a read state with no suffix.
    #[must_use]
    pub fn new(
        directory: Arc<dyn Directory>,
        segment_info: SegmentInfo,
        field_infos: FieldInfos,
    ) -> Self {
        Self {
            directory,
            segment_info,
            field_infos,
            segment_suffix: String::new(),
        }
    }

    /// Sets the segment suffix.
    #[must_use]
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.segment_suffix = suffix.into();
        self
    }
}
