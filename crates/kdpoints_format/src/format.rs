//! The points format descriptor.
//!
//! [`PointsFormat`] is the single entry point: it binds a format version,
//! resolves the tree engine protocol once, and hands out writers and
//! readers scoped to that binding.

use crate::config::PointsConfig;
use crate::error::{PointsError, PointsResult};
use crate::reader::PointsReader;
use crate::segment::{SegmentReadState, SegmentWriteState};
use crate::version::{self, FormatVersion, VERSION_CURRENT};
use crate::writer::PointsWriter;
use kdpoints_bkd::{BkdEngine, ProtocolVersion, TreeEngine};
use kdpoints_codec::{read_index_header, segment_file_name, DataReader, SegmentId};
use kdpoints_storage::Directory;

/// Codec name of the meta file.
pub const META_CODEC_NAME: &str = "PointsFormatMeta";

/// Codec name of the index file.
pub const INDEX_CODEC_NAME: &str = "PointsFormatIndex";

/// Codec name of the data file.
pub const DATA_CODEC_NAME: &str = "PointsFormatData";

/// Extension of the meta file.
pub const META_EXTENSION: &str = "kdm";

/// Extension of the index file.
pub const INDEX_EXTENSION: &str = "kdi";

/// Extension of the data file.
pub const DATA_EXTENSION: &str = "kdd";

/// Names of the three files of one segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentFiles {
    /// Meta file name.
    pub meta: String,
    /// Index file name.
    pub index: String,
    /// Data file name.
    pub data: String,
}

impl SegmentFiles {
    /// File names for `segment` with `suffix`.
    #[must_use]
    pub fn new(segment: &str, suffix: &str) -> Self {
        Self {
            meta: segment_file_name(segment, suffix, META_EXTENSION),
            index: segment_file_name(segment, suffix, INDEX_EXTENSION),
            data: segment_file_name(segment, suffix, DATA_EXTENSION),
        }
    }

    /// All three names, meta first.
    #[must_use]
    pub fn all(&self) -> [&str; 3] {
        [&self.meta, &self.index, &self.data]
    }
}

/// Binds a format version and produces writers and readers for it.
///
/// # Example
///
/// ```
/// use kdpoints_format::{FormatVersion, PointsFormat, VERSION_CURRENT, VERSION_START};
///
/// let format = PointsFormat::new();
/// assert_eq!(format.format_version(), VERSION_CURRENT);
///
/// let legacy = PointsFormat::with_version(VERSION_START).unwrap();
/// assert_eq!(legacy.protocol_version().get(), 9);
///
/// assert!(PointsFormat::with_version(FormatVersion::new(7)).is_err());
/// ```
#[derive(Debug, Clone)]
pub struct PointsFormat<E: TreeEngine = BkdEngine> {
    version: FormatVersion,
    protocol: ProtocolVersion,
    config: PointsConfig,
    engine: E,
}

impl PointsFormat<BkdEngine> {
    /// Binds the current format version.
    #[must_use]
    pub fn new() -> Self {
        let (version, protocol) = version::current();
        Self {
            version,
            protocol,
            config: PointsConfig::default(),
            engine: BkdEngine,
        }
    }

    /// Binds an explicit format version, to reproduce older layouts.
    ///
    /// # Errors
    ///
    /// Returns [`PointsError::UnsupportedVersion`] if the version has no
    /// table entry.
    pub fn with_version(version: FormatVersion) -> PointsResult<Self> {
        Self::with_engine(BkdEngine, version)
    }

    /// The tree engine protocol bound to `version`.
    ///
    /// # Errors
    ///
    /// Returns [`PointsError::UnsupportedVersion`] if the version has no
    /// table entry.
    pub fn bkd_version(version: FormatVersion) -> PointsResult<ProtocolVersion> {
        version::resolve(version)
    }
}

impl Default for PointsFormat<BkdEngine> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: TreeEngine> PointsFormat<E> {
    /// Binds `version` with a specific tree engine.
    ///
    /// # Errors
    ///
    /// Returns [`PointsError::UnsupportedVersion`] if the version has no
    /// table entry or the engine cannot speak its protocol.
    pub fn with_engine(engine: E, version: FormatVersion) -> PointsResult<Self> {
        let protocol = version::resolve(version)?;
        if !engine.supports(protocol) {
            return Err(PointsError::UnsupportedVersion {
                version: version.get(),
            });
        }
        Ok(Self {
            version,
            protocol,
            config: PointsConfig::default(),
            engine,
        })
    }

    /// Replaces the write configuration.
    #[must_use]
    pub fn with_config(mut self, config: PointsConfig) -> Self {
        self.config = config;
        self
    }

    /// The bound format version.
    #[must_use]
    pub fn format_version(&self) -> FormatVersion {
        self.version
    }

    /// The tree engine protocol the bound version resolves to.
    #[must_use]
    pub fn protocol_version(&self) -> ProtocolVersion {
        self.protocol
    }

    /// The write configuration.
    #[must_use]
    pub fn config(&self) -> &PointsConfig {
        &self.config
    }

    /// Creates the segment's three files and returns a writer for them.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the files
    /// cannot be allocated (they already exist, or storage fails).
    pub fn fields_writer(&self, state: &SegmentWriteState) -> PointsResult<PointsWriter<E>> {
        self.config.validate()?;
        PointsWriter::create(
            self.engine.clone(),
            self.version,
            self.protocol,
            self.config.bkd.clone(),
            state,
        )
    }

    /// Opens a sealed segment.
    ///
    /// The format version is taken from the segment's meta file, not from
    /// this descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`PointsError::UnsupportedVersion`] if the recorded version
    /// is unknown, [`PointsError::CorruptionDetected`] if the files cannot
    /// be parsed or disagree, or a storage error.
    pub fn fields_reader(&self, state: &SegmentReadState) -> PointsResult<PointsReader<E>> {
        PointsReader::open(&self.engine, state)
    }
}

/// What the meta file header says about a segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentHeader {
    /// Recorded format version; may be one this build does not know.
    pub format_version: FormatVersion,
    /// Recorded segment id.
    pub segment_id: SegmentId,
    /// Recorded suffix.
    pub suffix: String,
}

/// Reads the meta file header of a segment without opening it.
///
/// Lets tools open a segment when only its name is known.
///
/// # Errors
///
/// Returns [`PointsError::CorruptionDetected`] if the header is malformed
/// or belongs to another codec, or a storage error.
pub fn read_segment_header(
    directory: &dyn Directory,
    segment: &str,
    suffix: &str,
) -> PointsResult<SegmentHeader> {
    let name = segment_file_name(segment, suffix, META_EXTENSION);
    let bytes = directory.open_input(&name)?.read_all()?;

    let header = read_index_header(&mut DataReader::new(&bytes))
        .map_err(|e| PointsError::from_codec(&name, e))?;
    if header.codec != META_CODEC_NAME {
        return Err(PointsError::corruption(
            &name,
            format!("codec mismatch: expected {META_CODEC_NAME}, got {}", header.codec),
        ));
    }
    Ok(SegmentHeader {
        format_version: FormatVersion::new(header.version),
        segment_id: header.segment_id,
        suffix: header.suffix,
    })
}
