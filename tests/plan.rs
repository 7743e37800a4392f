use zstack_transfer::{ChunkRange, Error, TransferPlan};

fn check_plan(axis_length: u64, chunk_size: u64) {
    let plan = TransferPlan::new(axis_length, chunk_size).expect("valid plan");
    let chunks: Vec<ChunkRange> = plan.chunks().collect();

    assert_eq!(chunks.len() as u64, axis_length.div_ceil(chunk_size));
    assert_eq!(chunks.len(), plan.num_chunks());

    let mut expected_start = 0;
    for (i, c) in chunks.iter().enumerate() {
        assert_eq!(c.index, i);
        assert_eq!(c.start, expected_start, "chunks must be contiguous");
        assert!(!c.is_empty());
        assert!(c.len() <= chunk_size);
        expected_start = c.stop;
    }
    assert_eq!(expected_start, axis_length, "chunks must cover the axis");

    if let Some(last) = chunks.last() {
        let rem = axis_length % chunk_size;
        let expected = if rem == 0 { chunk_size } else { rem };
        assert_eq!(last.len(), expected);
    }
}

#[test]
fn test_chunks_cover_axis() {
    for axis_length in [0, 1, 2, 15, 16, 17, 31, 32, 33, 50, 100, 257] {
        for chunk_size in [1, 2, 3, 7, 16, 64, 300] {
            check_plan(axis_length, chunk_size);
        }
    }
}

#[test]
fn test_remainder_chunk() {
    let plan = TransferPlan::new(50, 16).unwrap();
    let ranges: Vec<_> = plan.chunks().map(|c| c.range()).collect();
    assert_eq!(ranges, vec![0..16, 16..32, 32..48, 48..50]);
}

#[test]
fn test_even_chunks() {
    let plan = TransferPlan::new(32, 16).unwrap();
    let ranges: Vec<_> = plan.chunks().map(|c| c.range()).collect();
    assert_eq!(ranges, vec![0..16, 16..32]);
}

#[test]
fn test_single_chunk_larger_than_axis() {
    let plan = TransferPlan::new(5, 16).unwrap();
    assert_eq!(plan.num_chunks(), 1);
    assert_eq!(plan.chunk(0).unwrap().range(), 0..5);
    assert!(plan.chunk(1).is_none());
}

#[test]
fn test_empty_axis() {
    let plan = TransferPlan::new(0, 16).unwrap();
    assert_eq!(plan.num_chunks(), 0);
    assert_eq!(plan.chunks().count(), 0);
}

#[test]
fn test_zero_chunk_size() {
    assert!(matches!(
        TransferPlan::new(10, 0),
        Err(Error::InvalidChunkSize)
    ));
}
