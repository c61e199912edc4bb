use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::time::Duration;
use trngd::pipe::{EntropyPipe, MockSource};
use trngd::ShutdownFlag;

fn bench_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("cycle");
    for bytes in [16usize, 512, 4096] {
        group.throughput(Throughput::Bytes(bytes as u64));
        group.bench_with_input(BenchmarkId::from_parameter(bytes), &bytes, |b, &bytes| {
            let mut pipe = EntropyPipe::new(
                MockSource::new(0),
                NullSink,
                bytes,
                Duration::ZERO,
                ShutdownFlag::new(),
            );
            b.iter(|| pipe.run_cycle().unwrap());
        });
    }
    group.finish();
}

/// Discards everything so the bench measures the pipe, not a growing Vec.
struct NullSink;

impl trngd::EntropySink for NullSink {
    fn feed(&mut self, _buf: &[u8]) -> Result<(), trngd::DeviceError> {
        Ok(())
    }

    fn describe(&self) -> String {
        "null".to_string()
    }
}

criterion_group!(benches, bench_cycle);
criterion_main!(benches);
