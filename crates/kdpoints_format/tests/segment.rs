//! Segment lifecycle: writing, sealing, aborting, merging and damage.

mod common;

use common::{
    assert_range_matches, location_field, location_points, price, price_field, price_points,
    written_prices, Fixture, MAX_DOC,
};
use kdpoints_bkd::encoding::{decode_i64, encode_i64};
use kdpoints_bkd::{
    BkdConfig, BkdEngine, BkdError, BkdResult, BkdTree, FieldOutputs, FieldSummary, PointBuffer,
    PointRangeVisitor, PointValues, ProtocolVersion, TreeEngine, TreeInputs,
};
use kdpoints_codec::DataReader;
use kdpoints_format::{
    DocMap, FieldInfo, FieldInfos, FieldPoints, MergeSource, PointsConfig, PointsError,
    PointsFormat, SegmentInfo, SegmentReadState, SegmentWriteState, VERSION_CURRENT,
};
use kdpoints_storage::{Directory, FsDirectory, MemoryDirectory, StorageError};
use proptest::prelude::*;
use std::sync::Arc;

#[test]
fn files_are_written_once() {
    let fixture = Fixture::new("_0");
    fixture.write_sample(&PointsFormat::new());
    assert_eq!(
        fixture.dir.list_all().unwrap(),
        vec!["_0.kdd", "_0.kdi", "_0.kdm"]
    );
    let before = fixture.bytes("_0.kdm");

    let err = PointsFormat::new().fields_writer(&fixture.state).unwrap_err();
    assert!(matches!(
        err,
        PointsError::Storage(StorageError::AlreadyExists { .. })
    ));
    // The sealed segment was not touched.
    assert_eq!(fixture.bytes("_0.kdm"), before);
    PointsFormat::new()
        .fields_reader(&fixture.read_state())
        .unwrap();
}

#[test]
fn unsealed_segment_is_rejected() {
    let fixture = Fixture::new("_1");
    let mut writer = PointsFormat::new().fields_writer(&fixture.state).unwrap();
    writer.write_field(&location_points()).unwrap();
    drop(writer);

    let err = PointsFormat::new()
        .fields_reader(&fixture.read_state())
        .unwrap_err();
    assert!(err.is_corruption(), "{err}");
}

#[test]
fn abort_removes_files() {
    let fixture = Fixture::new("_2");
    let mut writer = PointsFormat::new().fields_writer(&fixture.state).unwrap();
    writer.write_field(&price_points()).unwrap();
    writer.abort().unwrap();
    assert!(fixture.dir.list_all().unwrap().is_empty());
}

#[test]
fn writer_rejects_misuse() {
    let fixture = Fixture::new("_3");
    let mut writer = PointsFormat::new().fields_writer(&fixture.state).unwrap();

    let mut out_of_range = FieldPoints::new(&price_field()).unwrap();
    out_of_range.add(MAX_DOC, &encode_i64(1)).unwrap();
    assert!(matches!(
        writer.write_field(&out_of_range),
        Err(PointsError::InvalidArgument { .. })
    ));

    let stranger = FieldInfo::new("elevation", 9, 1, 4);
    let points = FieldPoints::new(&stranger).unwrap();
    assert!(matches!(
        writer.write_field(&points),
        Err(PointsError::InvalidArgument { .. })
    ));

    let mut wrong_length = FieldPoints::new(&price_field()).unwrap();
    assert!(wrong_length.add(0, &[1, 2, 3]).is_err());
    assert!(FieldPoints::new(&FieldInfo::new("title", 2, 0, 0)).is_err());

    writer.write_field(&price_points()).unwrap();
    assert!(matches!(
        writer.write_field(&price_points()),
        Err(PointsError::InvalidArgument { .. })
    ));
    writer.finish().unwrap();
}

#[test]
fn fields_without_points_are_absent() {
    let fixture = Fixture::new("_4");
    let mut writer = PointsFormat::new().fields_writer(&fixture.state).unwrap();
    writer
        .write_field(&FieldPoints::new(&location_field()).unwrap())
        .unwrap();
    writer.write_field(&price_points()).unwrap();
    writer.finish().unwrap();

    let reader = PointsFormat::new()
        .fields_reader(&fixture.read_state())
        .unwrap();
    assert!(reader.values("location").is_none());
    assert!(reader.values("title").is_none());
    assert_eq!(reader.fields().count(), 1);
}

#[test]
fn empty_segment_round_trip() {
    let fixture = Fixture::new("_5");
    PointsFormat::new()
        .fields_writer(&fixture.state)
        .unwrap()
        .finish()
        .unwrap();
    let reader = PointsFormat::new()
        .fields_reader(&fixture.read_state())
        .unwrap();
    assert_eq!(reader.fields().count(), 0);
    reader.check_integrity().unwrap();
}

#[test]
fn flipped_leaf_byte_fails_integrity_check() {
    let fixture = Fixture::new("_6");
    fixture.write_sample(&PointsFormat::new());
    let mut data = fixture.bytes("_6.kdd");
    let middle = data.len() / 2;
    data[middle] ^= 0xFF;
    fixture.dir.replace_file("_6.kdd", data);

    // Leaves are read lazily; only the full checksum sees the damage.
    let reader = PointsFormat::new()
        .fields_reader(&fixture.read_state())
        .unwrap();
    let err = reader.check_integrity().unwrap_err();
    assert!(err.is_corruption());
    assert!(err.to_string().contains("_6.kdd"), "{err}");
}

#[test]
fn truncated_or_extended_files_are_corruption() {
    for name in ["_7.kdm", "_7.kdi", "_7.kdd"] {
        let fixture = Fixture::new("_7");
        fixture.write_sample(&PointsFormat::new());
        let bytes = fixture.bytes(name);
        fixture
            .dir
            .replace_file(name, bytes[..bytes.len() - 1].to_vec());
        let err = PointsFormat::new()
            .fields_reader(&fixture.read_state())
            .unwrap_err();
        assert!(err.is_corruption(), "{name}: {err}");
    }

    let fixture = Fixture::new("_7");
    fixture.write_sample(&PointsFormat::new());
    let mut bytes = fixture.bytes("_7.kdi");
    bytes.extend_from_slice(&[0; 32]);
    fixture.dir.replace_file("_7.kdi", bytes);
    let err = PointsFormat::new()
        .fields_reader(&fixture.read_state())
        .unwrap_err();
    assert!(err.is_corruption(), "{err}");
}

#[test]
fn foreign_segment_id_is_corruption() {
    let fixture = Fixture::new("_8");
    fixture.write_sample(&PointsFormat::new());

    let mut state = fixture.read_state();
    state.segment_info = SegmentInfo::new("_8", MAX_DOC);
    let err = PointsFormat::new().fields_reader(&state).unwrap_err();
    assert!(err.is_corruption(), "{err}");
}

#[test]
fn suffix_selects_files() {
    let fixture = Fixture::new("_9");
    let state = fixture.state.clone().with_suffix("geo");
    let mut writer = PointsFormat::new().fields_writer(&state).unwrap();
    assert_eq!(writer.files().meta, "_9_geo.kdm");
    writer.write_field(&location_points()).unwrap();
    writer.finish().unwrap();

    let reader = PointsFormat::new()
        .fields_reader(&state.read_state())
        .unwrap();
    assert!(reader.values("location").is_some());

    let err = PointsFormat::new()
        .fields_reader(&fixture.read_state())
        .unwrap_err();
    assert!(matches!(
        err,
        PointsError::Storage(StorageError::NotFound { .. })
    ));
}

#[test]
fn leaf_size_is_configurable() {
    let fixture = Fixture::new("_10");
    let format = PointsFormat::new().with_config(PointsConfig::new().max_points_in_leaf_node(16));
    fixture.write_sample(&format);

    let reader = format.fields_reader(&fixture.read_state()).unwrap();
    let tree = reader.values("location").unwrap();
    assert_eq!(tree.max_points_in_leaf_node(), 16);
    assert!(tree.num_leaves() >= 32);

    let bad = PointsFormat::new().with_config(PointsConfig::new().max_points_in_leaf_node(0));
    let other = Fixture::new("_11");
    assert!(matches!(
        bad.fields_writer(&other.state),
        Err(PointsError::InvalidArgument { .. })
    ));
    assert!(other.dir.list_all().unwrap().is_empty());
}

#[test]
fn merge_remaps_and_drops_docs() {
    let a = Fixture::new("_a");
    a.write_sample(&PointsFormat::new());
    let b = Fixture::new("_b");
    b.write_sample(&PointsFormat::with_version(kdpoints_format::VERSION_START).unwrap());
    let reader_a = PointsFormat::new().fields_reader(&a.read_state()).unwrap();
    let reader_b = PointsFormat::new().fields_reader(&b.read_state()).unwrap();

    // Drop every even doc of the second segment and append the rest.
    let table: Vec<Option<u32>> = (0..MAX_DOC)
        .map(|doc| (doc % 2 == 1).then_some(MAX_DOC + doc / 2))
        .collect();

    let merged_dir = MemoryDirectory::new();
    let state = SegmentWriteState::new(
        Arc::new(merged_dir.clone()),
        SegmentInfo::new("_m", MAX_DOC + MAX_DOC / 2),
        FieldInfos::from_fields([price_field()]).unwrap(),
    );
    let mut writer = PointsFormat::new().fields_writer(&state).unwrap();
    writer
        .merge_field(
            &price_field(),
            &[
                MergeSource::new(&reader_a, DocMap::Offset(0)),
                MergeSource::new(&reader_b, DocMap::Table(&table)),
            ],
        )
        .unwrap();
    writer.finish().unwrap();

    let merged = PointsFormat::new()
        .fields_reader(&state.read_state())
        .unwrap();
    assert_eq!(merged.protocol_version().get(), 10);

    let mut expected = written_prices();
    for (doc, value) in written_prices() {
        if let Some(Some(new_doc)) = table.get(doc as usize) {
            expected.push((*new_doc, value));
        }
    }
    let values = merged.values("price").unwrap();
    assert_eq!(values.size(), expected.len() as u64);
    assert_range_matches(
        &merged,
        "price",
        &encode_i64(-2_000),
        &encode_i64(2_000),
        &expected,
    );
}

#[test]
fn merge_rejects_shape_change() {
    let a = Fixture::new("_a");
    a.write_sample(&PointsFormat::new());
    let reader = PointsFormat::new().fields_reader(&a.read_state()).unwrap();

    let reshaped = FieldInfo::new("price", 1, 1, 4);
    let dir = MemoryDirectory::new();
    let state = SegmentWriteState::new(
        Arc::new(dir),
        SegmentInfo::new("_m", MAX_DOC),
        FieldInfos::from_fields([reshaped.clone()]).unwrap(),
    );
    let mut writer = PointsFormat::new().fields_writer(&state).unwrap();
    let err = writer
        .merge_field(&reshaped, &[MergeSource::new(&reader, DocMap::Offset(0))])
        .unwrap_err();
    assert!(matches!(err, PointsError::InvalidArgument { .. }));
    writer.abort().unwrap();
}

/// Writes part of every multi-dimensional tree, then loses its output.
#[derive(Debug, Clone, Copy, Default)]
struct LossyEngine;

impl TreeEngine for LossyEngine {
    type Tree = BkdTree;

    fn supports(&self, protocol: ProtocolVersion) -> bool {
        BkdEngine.supports(protocol)
    }

    fn build(
        &self,
        protocol: ProtocolVersion,
        config: &BkdConfig,
        points: &PointBuffer,
        out: FieldOutputs<'_>,
    ) -> BkdResult<Option<FieldSummary>> {
        if points.config().num_dims > 1 {
            out.data.write_bytes(&[0xAA; 8])?;
            return Err(BkdError::Storage(StorageError::Io(std::io::Error::other(
                "device lost",
            ))));
        }
        BkdEngine.build(protocol, config, points, out)
    }

    fn open(
        &self,
        protocol: ProtocolVersion,
        meta: &mut DataReader<'_>,
        inputs: &TreeInputs,
    ) -> BkdResult<BkdTree> {
        BkdEngine.open(protocol, meta, inputs)
    }
}

#[test]
fn failed_field_write_never_seals() {
    let fixture = Fixture::new("_f");
    let format = PointsFormat::with_engine(LossyEngine, VERSION_CURRENT).unwrap();
    let mut writer = format.fields_writer(&fixture.state).unwrap();
    writer.write_field(&price_points()).unwrap();

    let err = writer.write_field(&location_points()).unwrap_err();
    assert!(matches!(err, PointsError::Storage(StorageError::Io(_))), "{err}");

    // The writer is done for: no more fields, and finish removes the files.
    let mut more = FieldPoints::new(&price_field()).unwrap();
    more.add(0, &encode_i64(1)).unwrap();
    assert!(matches!(
        writer.write_field(&more),
        Err(PointsError::InvalidArgument { .. })
    ));
    assert!(matches!(
        writer.finish(),
        Err(PointsError::InvalidArgument { .. })
    ));
    assert!(fixture.dir.list_all().unwrap().is_empty());
    assert!(matches!(
        PointsFormat::new().fields_reader(&fixture.read_state()),
        Err(PointsError::Storage(StorageError::NotFound { .. }))
    ));
}

#[test]
fn failed_field_write_can_be_aborted() {
    let fixture = Fixture::new("_g");
    let format = PointsFormat::with_engine(LossyEngine, VERSION_CURRENT).unwrap();
    let mut writer = format.fields_writer(&fixture.state).unwrap();
    assert!(writer.write_field(&location_points()).is_err());
    writer.abort().unwrap();
    assert!(fixture.dir.list_all().unwrap().is_empty());
}

#[test]
fn segment_on_disk() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("index");
    let directory: Arc<dyn Directory> = Arc::new(FsDirectory::open(&path).unwrap());
    let info = SegmentInfo::new("_0", MAX_DOC);
    let state = SegmentWriteState::new(
        Arc::clone(&directory),
        info.clone(),
        common::field_infos(),
    );

    let mut writer = PointsFormat::new().fields_writer(&state).unwrap();
    writer.write_field(&price_points()).unwrap();
    writer.finish().unwrap();
    drop(directory);

    // Reopen the directory from scratch.
    let directory: Arc<dyn Directory> = Arc::new(FsDirectory::open(&path).unwrap());
    let state = SegmentReadState::new(directory, info, common::field_infos());
    let reader = PointsFormat::new().fields_reader(&state).unwrap();
    reader.check_integrity().unwrap();
    assert_range_matches(
        &reader,
        "price",
        &encode_i64(0),
        &encode_i64(i64::MAX),
        &written_prices(),
    );
}

#[test]
fn readers_are_shared_across_threads() {
    let fixture = Fixture::new("_t");
    fixture.write_sample(&PointsFormat::new());
    let reader = Arc::new(
        PointsFormat::new()
            .fields_reader(&fixture.read_state())
            .unwrap(),
    );

    std::thread::scope(|scope| {
        for t in 0..4_i64 {
            let reader = Arc::clone(&reader);
            scope.spawn(move || {
                let low = -5_000 + t * 2_000;
                let values = reader.values("price").unwrap();
                let mut visitor = PointRangeVisitor::new(
                    *values.config(),
                    &encode_i64(low),
                    &encode_i64(low + 1_999),
                )
                .unwrap();
                values.intersect(&mut visitor).unwrap();
                // Some docs also carry price + 1.
                for doc in visitor.into_doc_ids() {
                    let p = price(doc);
                    assert!((low - 1..=low + 1_999).contains(&p), "doc {doc} price {p}");
                }
            });
        }
    });
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn arbitrary_prices_round_trip(
        prices in prop::collection::vec((0u32..MAX_DOC, any::<i64>()), 1..400),
        bound in any::<(i64, i64)>(),
        legacy in any::<bool>(),
    ) {
        let fixture = Fixture::new("_p");
        let format = if legacy {
            PointsFormat::with_version(kdpoints_format::VERSION_START).unwrap()
        } else {
            PointsFormat::new()
        };
        let mut points = FieldPoints::new(&price_field()).unwrap();
        let mut written = Vec::new();
        for (doc, value) in &prices {
            points.add(*doc, &encode_i64(*value)).unwrap();
            written.push((*doc, encode_i64(*value).to_vec()));
        }
        let mut writer = format.fields_writer(&fixture.state).unwrap();
        writer.write_field(&points).unwrap();
        writer.finish().unwrap();

        let reader = PointsFormat::new().fields_reader(&fixture.read_state()).unwrap();
        prop_assert_eq!(reader.format_version(), format.format_version());
        let (lo, hi) = (bound.0.min(bound.1), bound.0.max(bound.1));
        let hits = assert_range_matches(&reader, "price", &encode_i64(lo), &encode_i64(hi), &written);
        for doc in hits {
            prop_assert!(prices
                .iter()
                .any(|(d, v)| *d == doc && (lo..=hi).contains(v)));
        }

        let values = reader.values("price").unwrap();
        let min = decode_i64(values.min_packed_value().try_into().unwrap());
        prop_assert_eq!(min, prices.iter().map(|(_, v)| *v).min().unwrap());
    }
}
