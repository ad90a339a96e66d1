//! Version binding across the write and read paths.

mod common;

use common::{
    assert_range_matches, written_locations, written_prices, Fixture, MAX_DOC,
};
use kdpoints_bkd::encoding::{encode_i32, encode_i64};
use kdpoints_bkd::{DocIdEncoding, PointValues};
use kdpoints_format::{
    version, FieldInfo, FieldInfos, FieldPoints, FormatVersion, PointsError, PointsFormat,
    SegmentInfo, SegmentWriteState, DATA_CODEC_NAME, INDEX_CODEC_NAME, META_CODEC_NAME,
    VERSION_CURRENT, VERSION_START,
};
use kdpoints_storage::{Directory, MemoryDirectory};
use std::sync::Arc;

#[test]
fn every_table_entry_resolves_to_its_protocol() {
    for &(format_version, protocol) in version::entries() {
        let first = PointsFormat::bkd_version(format_version).unwrap();
        assert_eq!(first, protocol);
        assert_eq!(PointsFormat::bkd_version(format_version).unwrap(), first);
        let format = PointsFormat::with_version(format_version).unwrap();
        assert_eq!(format.protocol_version(), protocol);
    }
}

#[test]
fn unknown_version_fails_before_any_file_exists() {
    let fixture = Fixture::new("_0");
    let err = PointsFormat::with_version(FormatVersion::new(2)).unwrap_err();
    assert!(matches!(err, PointsError::UnsupportedVersion { version: 2 }));
    assert!(fixture.dir.list_all().unwrap().is_empty());
}

#[test]
fn current_segment_round_trip() {
    let fixture = Fixture::new("_0");
    fixture.write_sample(&PointsFormat::new());

    // A fresh descriptor, as a separate process opening the segment would.
    let reader = PointsFormat::new()
        .fields_reader(&fixture.read_state())
        .unwrap();
    assert_eq!(reader.format_version(), VERSION_CURRENT);
    assert_eq!(reader.protocol_version().get(), 10);

    let names: Vec<&str> = reader.fields().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["location", "price"]);

    let location = reader.values("location").unwrap();
    assert_eq!(location.num_dimensions(), 2);
    assert_eq!(location.bytes_per_dimension(), 4);
    assert_eq!(location.size(), u64::from(MAX_DOC));

    let mut lower = encode_i32(-20).to_vec();
    lower.extend_from_slice(&encode_i32(-45));
    let mut upper = encode_i32(30).to_vec();
    upper.extend_from_slice(&encode_i32(100));
    let hits = assert_range_matches(&reader, "location", &lower, &upper, &written_locations());
    assert!(!hits.is_empty());

    let price = reader.values("price").unwrap();
    assert_eq!(price.num_dimensions(), 1);
    assert_eq!(price.bytes_per_dimension(), 8);
    let hits = assert_range_matches(
        &reader,
        "price",
        &encode_i64(-1_000),
        &encode_i64(2_500),
        &written_prices(),
    );
    assert!(hits.iter().all(|doc| doc % 3 != 0));

    reader.check_integrity().unwrap();
}

#[test]
fn legacy_segment_keeps_its_protocol() {
    let fixture = Fixture::new("_1");
    let legacy = PointsFormat::with_version(VERSION_START).unwrap();
    assert_eq!(legacy.protocol_version().get(), 9);
    fixture.write_sample(&legacy);

    // Opened through the current descriptor: the recorded version wins.
    let reader = PointsFormat::new()
        .fields_reader(&fixture.read_state())
        .unwrap();
    assert_eq!(reader.format_version(), VERSION_START);
    assert_eq!(reader.protocol_version().get(), 9);
    for field in ["location", "price"] {
        assert_eq!(reader.values(field).unwrap().protocol().get(), 9);
    }

    assert_range_matches(
        &reader,
        "price",
        &encode_i64(i64::MIN),
        &encode_i64(0),
        &written_prices(),
    );
}

/// A field whose doc ids are sparse enough to need wide leaf encodings.
fn sparse_segment(version: FormatVersion) -> (MemoryDirectory, SegmentWriteState) {
    let field = FieldInfo::new("sparse", 0, 1, 4);
    let dir = MemoryDirectory::new();
    let state = SegmentWriteState::new(
        Arc::new(dir.clone()),
        SegmentInfo::new("_s", 2_000_000),
        FieldInfos::from_fields([field.clone()]).unwrap(),
    );
    let mut points = FieldPoints::new(&field).unwrap();
    for i in 0..600_u32 {
        points.add(i * 3_301, &encode_i32(i as i32 % 97)).unwrap();
    }

    let format = PointsFormat::with_version(version).unwrap();
    let mut writer = format.fields_writer(&state).unwrap();
    writer.write_field(&points).unwrap();
    writer.finish().unwrap();
    (dir, state)
}

#[test]
fn legacy_leaves_never_use_newer_encodings() {
    let (_dir, state) = sparse_segment(VERSION_START);
    let reader = PointsFormat::new().fields_reader(&state.read_state()).unwrap();
    let encodings = reader
        .values("sparse")
        .unwrap()
        .leaf_doc_id_encodings()
        .unwrap();
    assert!(!encodings.contains(&DocIdEncoding::Bpv21));
    assert!(!encodings.contains(&DocIdEncoding::Bpv24Split));
    assert!(encodings.contains(&DocIdEncoding::Bpv24));

    let (_dir, state) = sparse_segment(VERSION_CURRENT);
    let reader = PointsFormat::new().fields_reader(&state.read_state()).unwrap();
    let encodings = reader
        .values("sparse")
        .unwrap()
        .leaf_doc_id_encodings()
        .unwrap();
    assert!(encodings.contains(&DocIdEncoding::Bpv21));
    assert!(!encodings.contains(&DocIdEncoding::Bpv24));
}

#[test]
fn disagreeing_file_versions_are_corruption() {
    let cases = [
        (META_CODEC_NAME, 0),
        (INDEX_CODEC_NAME, 1),
        (DATA_CODEC_NAME, 2),
    ];
    for (codec, which) in cases {
        let fixture = Fixture::new("_2");
        fixture.write_sample(&PointsFormat::new());
        let files = kdpoints_format::SegmentFiles::new("_2", "");
        let name = files.all()[which];
        fixture.set_header_version(name, codec, VERSION_START.get());

        let err = PointsFormat::new()
            .fields_reader(&fixture.read_state())
            .unwrap_err();
        assert!(err.is_corruption(), "{name}: {err}");
    }
}

#[test]
fn legacy_segment_with_edited_file_is_corruption() {
    let fixture = Fixture::new("_3");
    fixture.write_sample(&PointsFormat::with_version(VERSION_START).unwrap());
    fixture.set_header_version("_3.kdd", DATA_CODEC_NAME, VERSION_CURRENT.get());

    let err = PointsFormat::new()
        .fields_reader(&fixture.read_state())
        .unwrap_err();
    assert!(err.is_corruption(), "{err}");
}

#[test]
fn unknown_recorded_version_is_unsupported() {
    let fixture = Fixture::new("_4");
    fixture.write_sample(&PointsFormat::new());
    for (name, codec) in [
        ("_4.kdm", META_CODEC_NAME),
        ("_4.kdi", INDEX_CODEC_NAME),
        ("_4.kdd", DATA_CODEC_NAME),
    ] {
        fixture.set_header_version(name, codec, 7);
    }

    let err = PointsFormat::new()
        .fields_reader(&fixture.read_state())
        .unwrap_err();
    assert!(matches!(err, PointsError::UnsupportedVersion { version: 7 }));
}

#[test]
fn segment_header_can_be_peeked() {
    let fixture = Fixture::new("_5");
    fixture.write_sample(&PointsFormat::with_version(VERSION_START).unwrap());

    let header = kdpoints_format::read_segment_header(&fixture.dir, "_5", "").unwrap();
    assert_eq!(header.format_version, VERSION_START);
    assert_eq!(header.segment_id, fixture.state.segment_info.id);
    assert_eq!(header.suffix, "");

    let err = kdpoints_format::read_segment_header(&fixture.dir, "_6", "").unwrap_err();
    assert!(matches!(err, PointsError::Storage(_)));
}
