//! Encode/decode performance: arena vs heap reconstruction

use std::io::Cursor;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use treefile::bst::BstTree;
use treefile::{decode_arena, decode_heap, encode_tree};

const NODES: u64 = 10_000;

fn encoded_sample() -> Vec<u8> {
    let tree = BstTree::sample(NODES);
    let mut sink = Cursor::new(Vec::new());
    encode_tree(BstTree::layout(), tree.root(), &mut sink).expect("encode succeeds");
    sink.into_inner()
}

fn benchmark_encode(c: &mut Criterion) {
    let tree = BstTree::sample(NODES);

    c.bench_function("encode_10k", |b| {
        b.iter(|| {
            let mut sink = Cursor::new(Vec::new());
            encode_tree(BstTree::layout(), tree.root(), &mut sink).unwrap();
            black_box(sink.into_inner());
        });
    });
}

fn benchmark_decode(c: &mut Criterion) {
    let bytes = encoded_sample();

    c.bench_function("decode_arena_10k", |b| {
        b.iter(|| {
            let tree = decode_arena(Cursor::new(&bytes)).unwrap();
            black_box(tree);
        });
    });

    c.bench_function("decode_heap_10k", |b| {
        b.iter(|| {
            let tree = decode_heap(Cursor::new(&bytes)).unwrap();
            black_box(tree);
        });
    });
}

criterion_group!(benches, benchmark_encode, benchmark_decode);
criterion_main!(benches);
