mod common;

use std::sync::Arc;

use common::{init_logging, ramp_volume};
use zarrs::filesystem::FilesystemStore;
use zarrs::storage::store::MemoryStore;
use zstack_transfer::{
    ChunkedTransfer, Error, Extent, Region, SampleType, Volume, VolumeData,
    metadata::{Compression, DEFAULT_BLOCK_SHAPE, extent_to_metadata, metadata_to_extent},
    storage::{Declaration, RegionSink, RegionSource, VolumeStore, zarr::ZarrVolumeStore},
};

fn memory_store(path: &str) -> ZarrVolumeStore<MemoryStore> {
    ZarrVolumeStore::new(Arc::new(MemoryStore::new()), path).with_block_shape([4, 8, 8])
}

fn u8_volume(shape: [u64; 3]) -> Volume {
    let n: u64 = shape.iter().product();
    let data: Vec<u8> = (0..n).map(|i| (i % 251) as u8).collect();
    Volume::new(shape, data, [40.0, 4.0, 4.0], "nanometers").unwrap()
}

fn round_trip(store: &impl VolumeStore, volume: &Volume, chunk_size: u64) {
    assert_eq!(
        store.declare_extent(&volume.extent(), false).unwrap(),
        Declaration::Created
    );
    let transfer = ChunkedTransfer::new(chunk_size, 2).unwrap();
    let report = transfer.upload(volume, store).unwrap();
    assert!(report.is_success(), "{report}");

    let (downloaded, report) = transfer.download(store).unwrap();
    assert!(report.is_success(), "{report}");
    assert_eq!(&downloaded, volume);
}

#[test]
fn test_round_trip_uint16() {
    init_logging();
    // chunk size 3 does not align with the 4-slice storage blocks
    round_trip(&memory_store("/volume"), &ramp_volume([10, 9, 17]), 3);
}

#[test]
fn test_round_trip_uint8_root() {
    init_logging();
    round_trip(&memory_store("/"), &u8_volume([9, 5, 6]), 4);
}

#[test]
fn test_round_trip_compressed() {
    init_logging();
    for compression in [
        Compression::Gzip { level: 5 },
        Compression::Zstd { level: 3 },
    ] {
        let store = memory_store("/volume").with_compression(compression);
        round_trip(&store, &ramp_volume([7, 8, 8]), 2);
    }
}

#[test]
fn test_round_trip_filesystem() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let fs = Arc::new(FilesystemStore::new(dir.path()).expect("should be able to create store"));
    let volume = ramp_volume([12, 6, 6]);
    round_trip(&ZarrVolumeStore::new(fs.clone(), "/stack"), &volume, 5);

    // A fresh handle reads the extent and data back from disk.
    let reopened = ZarrVolumeStore::new(fs, "/stack");
    assert_eq!(reopened.extent().unwrap(), Some(volume.extent()));
    let (downloaded, _) = ChunkedTransfer::new(16, 0).unwrap().download(&reopened).unwrap();
    assert_eq!(downloaded, volume);
}

#[test]
fn test_extent_persisted() {
    let store = memory_store("/volume");
    assert_eq!(store.extent().unwrap(), None);

    let extent =
        Extent::new([3, 4, 5], SampleType::Uint8, [40.0, 4.0, 4.5], "micrometers").unwrap();
    store.declare_extent(&extent, false).unwrap();
    assert_eq!(store.extent().unwrap(), Some(extent));
}

#[test]
fn test_declare_existing() {
    let store = memory_store("/volume");
    let extent = Extent::new([3, 4, 5], SampleType::Uint16, [1.0; 3], "nanometers").unwrap();
    assert_eq!(
        store.declare_extent(&extent, false).unwrap(),
        Declaration::Created
    );
    assert_eq!(
        store.declare_extent(&extent, false).unwrap(),
        Declaration::Existing
    );

    let other = Extent::new([6, 4, 5], SampleType::Uint16, [1.0; 3], "nanometers").unwrap();
    assert!(matches!(
        store.declare_extent(&other, false),
        Err(Error::ExtentMismatch { .. })
    ));
    assert_eq!(
        store.declare_extent(&other, true).unwrap(),
        Declaration::Replaced
    );
    assert_eq!(store.extent().unwrap(), Some(other));
}

#[test]
fn test_overwrite_discards_data() {
    let store = memory_store("/volume");
    let volume = ramp_volume([4, 4, 4]);
    store.declare_extent(&volume.extent(), false).unwrap();
    ChunkedTransfer::new(2, 0)
        .unwrap()
        .upload(&volume, &store)
        .unwrap();

    store.declare_extent(&volume.extent(), true).unwrap();
    let data = store.read_region(&Region::full([4, 4, 4])).unwrap();
    assert_eq!(data, VolumeData::Uint16(vec![0; 64]));
}

#[test]
fn test_partial_region_read() {
    let store = memory_store("/volume");
    let volume = ramp_volume([6, 5, 4]);
    store.declare_extent(&volume.extent(), false).unwrap();
    store
        .write_region(&Region::full(volume.shape()), volume.data())
        .unwrap();

    let region = Region::new(1..3, 2..4, 1..3);
    assert_eq!(
        store.read_region(&region).unwrap(),
        volume.region(&region).unwrap()
    );
}

#[test]
fn test_write_errors_are_fatal() {
    let store = memory_store("/volume");
    let volume = ramp_volume([4, 4, 4]);
    store.declare_extent(&volume.extent(), false).unwrap();

    let wrong_type = VolumeData::Uint8(vec![0; 16]);
    let err = store
        .write_region(&Region::slab(0..1, [4, 4, 4]), &wrong_type)
        .unwrap_err();
    assert!(!err.is_retryable());

    let outside = Region::slab(3..5, [4, 4, 4]);
    let err = store
        .write_region(&outside, &VolumeData::Uint16(vec![0; 32]))
        .unwrap_err();
    assert!(!err.is_retryable());
}

#[test]
fn test_undeclared_read_fails() {
    let store = memory_store("/volume");
    let err = store.read_region(&Region::full([1, 1, 1])).unwrap_err();
    assert!(!err.is_retryable());
}

#[test]
fn test_invalid_gzip_level() {
    let store = memory_store("/volume").with_compression(Compression::Gzip { level: 12 });
    let extent = Extent::new([3, 4, 5], SampleType::Uint8, [1.0; 3], "nanometers").unwrap();
    assert!(store.declare_extent(&extent, false).is_err());
}

#[test]
fn test_redeclaration_seen_by_other_handle() {
    init_logging();
    let storage = Arc::new(MemoryStore::new());
    let first = ZarrVolumeStore::new(storage.clone(), "/volume").with_block_shape([2, 4, 4]);
    let small = ramp_volume([4, 4, 4]);
    first.declare_extent(&small.extent(), false).unwrap();
    first
        .write_region(&Region::full(small.shape()), small.data())
        .unwrap();

    let second = ZarrVolumeStore::new(storage, "/volume").with_block_shape([3, 3, 3]);
    let large = ramp_volume([6, 5, 5]);
    assert_eq!(
        second.declare_extent(&large.extent(), true).unwrap(),
        Declaration::Replaced
    );

    // The first handle now reads and writes the replaced array.
    assert_eq!(first.extent().unwrap(), Some(large.extent()));
    assert_eq!(
        first.read_region(&Region::full([6, 5, 5])).unwrap(),
        VolumeData::Uint16(vec![0; 150])
    );
    let report = ChunkedTransfer::new(4, 0)
        .unwrap()
        .upload(&large, &first)
        .unwrap();
    assert!(report.is_success(), "{report}");
    let (downloaded, _) = ChunkedTransfer::new(16, 0).unwrap().download(&second).unwrap();
    assert_eq!(downloaded, large);
}

#[test]
fn test_extent_metadata() {
    let extent = Extent::new([3, 600, 5], SampleType::Uint16, [40.0, 4.0, 4.0], "nm").unwrap();
    let metadata = extent_to_metadata(&extent, DEFAULT_BLOCK_SHAPE, Compression::Raw).unwrap();
    let json = serde_json::to_value(&metadata).unwrap();
    assert_eq!(json["fill_value"], 0);
    assert_eq!(json["data_type"], "uint16");
    assert_eq!(
        json["chunk_grid"]["configuration"]["chunk_shape"],
        serde_json::json!([3, 512, 5])
    );
    assert_eq!(json["attributes"]["voxel_unit"], "nm");
    assert_eq!(metadata_to_extent(&metadata).unwrap(), extent);
}
