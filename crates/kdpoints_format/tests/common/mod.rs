//! Shared helpers for the format integration tests.

#![allow(dead_code)]

use kdpoints_bkd::encoding::{encode_i32, encode_i64};
use kdpoints_bkd::{PointRangeVisitor, PointValues};
use kdpoints_format::{
    FieldInfo, FieldInfos, FieldPoints, PointsFormat, PointsReader, SegmentInfo,
    SegmentReadState, SegmentWriteState,
};
use kdpoints_storage::MemoryDirectory;
use std::sync::Arc;

/// Docs in every sample segment.
pub const MAX_DOC: u32 = 500;

pub fn location_field() -> FieldInfo {
    FieldInfo::new("location", 0, 2, 4)
}

pub fn price_field() -> FieldInfo {
    FieldInfo::new("price", 1, 1, 8)
}

pub fn field_infos() -> FieldInfos {
    FieldInfos::from_fields([
        location_field(),
        price_field(),
        FieldInfo::new("title", 2, 0, 0),
    ])
    .unwrap()
}

pub fn location(doc: u32) -> [i32; 2] {
    let doc = doc as i32;
    [(doc * 37) % 181 - 90, (doc * 53) % 361 - 180]
}

pub fn price(doc: u32) -> i64 {
    (i64::from(doc) * 7_919) % 10_007 - 5_000
}

pub fn pack_location(value: [i32; 2]) -> Vec<u8> {
    let mut packed = encode_i32(value[0]).to_vec();
    packed.extend_from_slice(&encode_i32(value[1]));
    packed
}

pub fn location_points() -> FieldPoints {
    let mut points = FieldPoints::new(&location_field()).unwrap();
    for doc in 0..MAX_DOC {
        points.add(doc, &pack_location(location(doc))).unwrap();
    }
    points
}

pub fn price_points() -> FieldPoints {
    let mut points = FieldPoints::new(&price_field()).unwrap();
    // Every third doc has no price, some have two.
    for doc in (0..MAX_DOC).filter(|d| d % 3 != 0) {
        points.add(doc, &encode_i64(price(doc))).unwrap();
        if doc % 10 == 1 {
            points.add(doc, &encode_i64(price(doc) + 1)).unwrap();
        }
    }
    points
}

/// An in-memory directory plus the state to write a segment into it.
pub struct Fixture {
    pub dir: MemoryDirectory,
    pub state: SegmentWriteState,
}

impl Fixture {
    pub fn new(name: &str) -> Self {
        let dir = MemoryDirectory::new();
        let state = SegmentWriteState::new(
            Arc::new(dir.clone()),
            SegmentInfo::new(name, MAX_DOC),
            field_infos(),
        );
        Self { dir, state }
    }

    pub fn read_state(&self) -> SegmentReadState {
        self.state.read_state()
    }

    /// Writes both sample fields with `format` and seals the segment.
    pub fn write_sample(&self, format: &PointsFormat) {
        let mut writer = format.fields_writer(&self.state).unwrap();
        writer.write_field(&location_points()).unwrap();
        writer.write_field(&price_points()).unwrap();
        writer.finish().unwrap();
    }

    pub fn bytes(&self, name: &str) -> Vec<u8> {
        self.dir.file_bytes(name).unwrap()
    }

    /// Overwrites the format version recorded in a file header.
    pub fn set_header_version(&self, name: &str, codec: &str, version: u32) {
        let mut bytes = self.bytes(name);
        let at = 4 + 1 + codec.len();
        bytes[at..at + 4].copy_from_slice(&version.to_be_bytes());
        self.dir.replace_file(name, bytes);
    }
}

/// Runs an inclusive box query against a field and checks it against a
/// linear scan of the values that were written.
pub fn assert_range_matches(
    reader: &PointsReader,
    field: &str,
    lower: &[u8],
    upper: &[u8],
    written: &[(u32, Vec<u8>)],
) -> Vec<u32> {
    let values = reader.values(field).unwrap();
    let mut visitor = PointRangeVisitor::new(*values.config(), lower, upper).unwrap();

    let mut expected: Vec<u32> = written
        .iter()
        .filter(|(_, v)| visitor.matches(v))
        .map(|(d, _)| *d)
        .collect();
    expected.sort_unstable();
    expected.dedup();

    values.intersect(&mut visitor).unwrap();
    let actual = visitor.into_doc_ids();
    assert_eq!(actual, expected, "range query on {field}");
    actual
}

pub fn written_locations() -> Vec<(u32, Vec<u8>)> {
    (0..MAX_DOC)
        .map(|doc| (doc, pack_location(location(doc))))
        .collect()
}

pub fn written_prices() -> Vec<(u32, Vec<u8>)> {
    let mut out = Vec::new();
    for doc in (0..MAX_DOC).filter(|d| d % 3 != 0) {
        out.push((doc, encode_i64(price(doc)).to_vec()));
        if doc % 10 == 1 {
            out.push((doc, encode_i64(price(doc) + 1).to_vec()));
        }
    }
    out
}
