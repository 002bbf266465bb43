// packages/recorder/benches/recording_bench.rs
//! Writer and end-to-end recorder throughput

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use readout_recorder::recording::{
    BufferedFileWriter, CompressionAlgorithm, CompressionLevel, QueueRegistry, Record, Recorder,
    RecorderConf, SuperChunk,
};
use readout_recorder::utils::ConsumerSettings;
use std::sync::Arc;
use tempfile::tempdir;

const RECORDS_PER_ITER: u64 = 1_000;
const STREAM_BUFFER: usize = 8 * 1024 * 1024;

fn bench_writer(c: &mut Criterion) {
    let mut group = c.benchmark_group("buffered_writer");
    group.throughput(Throughput::Bytes(RECORDS_PER_ITER * SuperChunk::SIZE as u64));

    let record = SuperChunk::filled(0x42);
    for compression in [CompressionAlgorithm::None, CompressionAlgorithm::Zstd] {
        group.bench_with_input(
            BenchmarkId::from_parameter(compression),
            &compression,
            |b, &compression| {
                let dir = tempdir().unwrap();
                let path = dir.path().join("bench.dat");
                b.iter(|| {
                    let mut writer = BufferedFileWriter::open(
                        &path,
                        STREAM_BUFFER,
                        compression,
                        CompressionLevel::Fast,
                    )
                    .unwrap();
                    for _ in 0..RECORDS_PER_ITER {
                        writer.write(record.as_bytes()).unwrap();
                    }
                    writer.close().unwrap()
                });
            },
        );
    }
    group.finish();
}

fn bench_session(c: &mut Criterion) {
    let mut group = c.benchmark_group("recorder_session");
    group.sample_size(20);
    group.throughput(Throughput::Elements(RECORDS_PER_ITER));

    group.bench_function("superchunk_raw", |b| {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.dat");
        b.iter(|| {
            let registry = Arc::new(QueueRegistry::<SuperChunk>::new());
            let producer = registry.create("snb", RECORDS_PER_ITER as usize).producer();
            let recorder = Recorder::new("bench", registry, ConsumerSettings::default());
            recorder.init("snb").unwrap();
            recorder
                .configure(RecorderConf::new(&path, STREAM_BUFFER, CompressionAlgorithm::None))
                .unwrap();
            recorder.start().unwrap();
            for _ in 0..RECORDS_PER_ITER {
                producer.push(SuperChunk::filled(7)).unwrap();
            }
            recorder.stop().unwrap()
        });
    });
    group.finish();
}

criterion_group!(benches, bench_writer, bench_session);
criterion_main!(benches);
