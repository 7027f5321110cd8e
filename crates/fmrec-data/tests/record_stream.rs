use fmrec_data::prelude::*;
use fmrec_data::record::{decode_bytes, RecordReader, RecordWriter, FRAME_OVERHEAD};
use fmrec_data::sink::LocalDirSink;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use tempfile::tempdir;

/// Deterministic pseudo-random rows with varying nonzero counts.
fn varied_dataset(rows: usize, feature_count: u32) -> SparseDataset {
    let mut state: u64 = 0x9e37_79b9_7f4a_7c15;
    let mut next = move || {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        state
    };

    let rows = (0..rows)
        .map(|_| {
            let nnz = (next() % 6) as usize;
            let mut indices: Vec<u32> = Vec::with_capacity(nnz);
            while indices.len() < nnz {
                let index = (next() % feature_count as u64) as u32;
                if !indices.contains(&index) {
                    indices.push(index);
                }
            }
            let values = indices
                .iter()
                .map(|_| (next() % 1000) as f32 / 7.0 - 50.0)
                .collect();
            let label = (next() % 5 + 1) as f32;
            SparseRow::new(feature_count, indices, values, label).unwrap()
        })
        .collect();
    SparseDataset::new(feature_count, rows).unwrap()
}

#[test]
fn round_trip_preserves_every_row_in_order() {
    let dataset = varied_dataset(500, 2_625);
    let stream = encode(&dataset).unwrap();
    assert_eq!(stream.len(), 500);

    let decoded = decode(&stream).unwrap();
    assert_eq!(decoded.feature_count(), dataset.feature_count());
    for (i, (a, b)) in dataset.iter().zip(decoded.iter()).enumerate() {
        assert_eq!(a.indices, b.indices, "row {i}");
        assert_eq!(a.values, b.values, "row {i}");
        assert_eq!(a.label, b.label, "row {i}");
    }
}

#[test]
fn stream_size_tracks_nonzeros_not_width() {
    let narrow = varied_dataset(200, 64);
    let wide = SparseDataset::new(
        1_000_000,
        narrow
            .iter()
            .map(|r| SparseRow::new(1_000_000, r.indices.clone(), r.values.clone(), r.label).unwrap())
            .collect(),
    )
    .unwrap();

    let expected = narrow.len() * (12 + FRAME_OVERHEAD) + narrow.nnz() * 8;
    assert_eq!(encode(&narrow).unwrap().byte_len(), expected);
    assert_eq!(encode(&wide).unwrap().byte_len(), expected);
}

#[test]
fn persisted_stream_reads_back_through_reader() {
    let tmp = tempdir().unwrap();
    let dataset = varied_dataset(120, 943 + 1_682);
    let stream = encode(&dataset).unwrap();

    let mut sink = LocalDirSink::new(tmp.path(), "bucket", "factorization-machines/train");
    let uri = sink.put("train.rec", &stream).unwrap();
    let path = sink.object_path("train.rec");
    assert!(uri.ends_with("train.rec"));

    let reader = RecordReader::new(BufReader::new(File::open(&path).unwrap()));
    assert_eq!(reader.read_dataset().unwrap(), dataset);

    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(decode_bytes(bytes, CompressionType::None).unwrap(), dataset);
}

#[test]
fn writer_streams_to_file() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("test.rec");
    let dataset = varied_dataset(50, 300);

    {
        let mut writer = RecordWriter::new(BufWriter::new(File::create(&path).unwrap()));
        writer.write_dataset(&dataset).unwrap();
        writer.flush().unwrap();
    }

    let bytes = std::fs::read(&path).unwrap();
    let stream = RecordStream::from_bytes(bytes, CompressionType::None).unwrap();
    assert_eq!(stream.len(), 50);
    assert_eq!(decode(&stream).unwrap(), dataset);
}

#[test]
fn batches_serialize_to_independent_streams() {
    let dataset = varied_dataset(23, 128);
    let mut rebuilt = Vec::new();

    for batch in dataset.batches(5) {
        let stream = batch.to_stream(CompressionType::None).unwrap();
        assert_eq!(stream.len(), batch.len());
        rebuilt.extend(decode(&stream).unwrap().into_rows());
    }

    assert_eq!(rebuilt.as_slice(), dataset.rows());
}

#[cfg(feature = "compression")]
#[test]
fn compressed_round_trip() {
    let dataset = varied_dataset(100, 10_000);
    for compression in [
        CompressionType::Gzip,
        CompressionType::Snappy,
        CompressionType::Zlib,
    ] {
        let stream = fmrec_data::encode_with(&dataset, compression).unwrap();
        let bytes = stream.clone().into_bytes();
        let reopened = RecordStream::from_bytes(bytes, compression).unwrap();
        assert_eq!(reopened, stream);
        assert_eq!(decode(&reopened).unwrap(), dataset);
    }
}
