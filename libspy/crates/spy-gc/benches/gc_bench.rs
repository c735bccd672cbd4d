//! spy-gc Benchmarks
//!
//! Allocation fast and slow paths, full collections, and value operations.
//! Run with: `cargo bench --package spy-gc`

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use spy_gc::util::constants::{KB, MB, WORD_SIZE};
use spy_gc::{Heap, HeapConfig, RawBuffer, SpyStr, TypeDescriptor};

fn create_heap() -> Heap {
    let config = HeapConfig {
        initial_heap_size: 16 * MB,
        max_heap_size: 256 * MB,
        verify_heap: false,
        poison_free_memory: false,
        ..Default::default()
    };
    Heap::new(config).unwrap()
}

fn bench_allocation(c: &mut Criterion) {
    let mut group = c.benchmark_group("allocation");

    for &size in &[8usize, 64, 256, 4096] {
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_function(format!("blob_{}", size), |b| {
            b.iter_batched_ref(
                create_heap,
                |heap| {
                    for _ in 0..1000 {
                        black_box(heap.allocate_blob(size).unwrap());
                    }
                },
                BatchSize::LargeInput,
            )
        });
    }

    group.finish();
}

fn bench_free_list_reuse(c: &mut Criterion) {
    let mut group = c.benchmark_group("free_list");

    group.bench_function("churn_small_heap", |b| {
        let mut heap = Heap::new(HeapConfig {
            initial_heap_size: 64 * KB,
            max_heap_size: 64 * KB,
            verify_heap: false,
            poison_free_memory: false,
            ..Default::default()
        })
        .unwrap();
        b.iter(|| {
            for n in 0..500 {
                black_box(heap.allocate_blob(n % 200).unwrap());
            }
        })
    });

    group.finish();
}

fn bench_collection(c: &mut Criterion) {
    let mut group = c.benchmark_group("collection");

    for &live in &[100usize, 1000, 10_000] {
        group.bench_function(format!("linked_list_{}", live), |b| {
            b.iter_batched_ref(
                || {
                    let mut heap = create_heap();
                    let node = heap
                        .register_type(TypeDescriptor::fixed("Node", 2 * WORD_SIZE, &[0]).unwrap())
                        .unwrap();
                    let frame = heap.roots_mut().enter_frame();
                    let head = heap.roots_mut().push(None);
                    for _ in 0..live {
                        let obj = heap.allocate(node, 0).unwrap();
                        let next = heap.roots().get(head);
                        heap.write_ref(obj, 0, next).unwrap();
                        heap.roots_mut().set(head, Some(obj));
                        // garbage between live nodes
                        heap.allocate_blob(32).unwrap();
                    }
                    (heap, frame)
                },
                |(heap, _frame)| black_box(heap.collect().unwrap()),
                BatchSize::LargeInput,
            )
        });
    }

    group.finish();
}

fn bench_strings(c: &mut Criterion) {
    let mut group = c.benchmark_group("strings");
    let mut heap = create_heap();
    let a = SpyStr::from_str(&mut heap, "hello, ").unwrap();
    let b = SpyStr::from_str(&mut heap, "world").unwrap();
    let frame = heap.roots_mut().enter_frame();
    heap.roots_mut().push(Some(a.obj()));
    heap.roots_mut().push(Some(b.obj()));

    group.bench_function("concat", |bench| {
        bench.iter(|| black_box(SpyStr::concat(&mut heap, a, b).unwrap()))
    });

    group.bench_function("equals", |bench| {
        bench.iter(|| black_box(SpyStr::equals(&heap, a, b).unwrap()))
    });

    group.bench_function("slice", |bench| {
        bench.iter(|| black_box(SpyStr::slice(&mut heap, a, 1, 5).unwrap()))
    });

    heap.roots_mut().leave_frame(frame);
    group.finish();
}

fn bench_rawbuffer_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("rawbuffer");
    let chunk = [0x5Au8; 16];

    group.throughput(Throughput::Bytes(16 * 1000));
    group.bench_function("append_1000", |b| {
        b.iter_batched_ref(
            create_heap,
            |heap| {
                let frame = heap.roots_mut().enter_frame();
                let mut buf = RawBuffer::new(heap, 0).unwrap();
                let handle = heap.roots_mut().push(Some(buf.obj()));
                for _ in 0..1000 {
                    buf = RawBuffer::append(heap, buf, &chunk).unwrap();
                    heap.roots_mut().set(handle, Some(buf.obj()));
                }
                heap.roots_mut().leave_frame(frame);
                black_box(buf)
            },
            BatchSize::LargeInput,
        )
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_allocation,
    bench_free_list_reuse,
    bench_collection,
    bench_strings,
    bench_rawbuffer_append
);
criterion_main!(benches);
