use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use huff_syntax::huff;
use huff_syntax::incremental::InputEdit;
use huff_syntax::table::TableConfig;

const MACRO: &str = "#define macro TRANSFER_{n}() = takes(0) returns(0) {
    0x04 calldataload [BALANCE_SLOT] sload dup1 0x24 calldataload gt insufficient jumpi
    __FUNC_SIG(transfer) 0x00 mstore 0x20 0x00 return
    insufficient:
        __ERROR(InsufficientBalance) 0x00 mstore 0x04 0x00 revert
}
";

/// A source with `count` macros after a small header.
fn source(count: usize) -> String {
    let mut out = String::from(
        "/// @title Bench\n#define constant BALANCE_SLOT = FREE_STORAGE_POINTER()\n\
         #define error InsufficientBalance(uint256)\n",
    );
    for n in 0..count {
        out.push_str(&MACRO.replace("{n}", &n.to_string()));
    }
    out
}

fn bench_grammar_compile(c: &mut Criterion) {
    let grammar = huff::grammar().unwrap();
    c.bench_function("compile_huff_lalr", |b| {
        b.iter(|| black_box(grammar.compile(black_box(&TableConfig::default())).unwrap()));
    });
}

fn bench_full_parse(c: &mut Criterion) {
    let parser = huff::parser();
    let mut group = c.benchmark_group("full_parse");
    for count in [1, 16, 256] {
        let text = source(count);
        group.throughput(Throughput::Bytes(text.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &text, |b, text| {
            b.iter(|| black_box(parser.parse(black_box(text.as_bytes()), None, &[])));
        });
    }
    group.finish();
}

fn bench_incremental_parse(c: &mut Criterion) {
    let parser = huff::parser();
    let mut group = c.benchmark_group("incremental_parse");
    for count in [16, 256] {
        let text = source(count);
        let tree = parser.parse(text.as_bytes(), None, &[]);
        // rename one constant reference in the middle of the file
        let middle = text.len() / 2;
        let at = middle + text[middle..].find("BALANCE_SLOT").unwrap_or(0);
        let (edited, edit) = InputEdit::splice(text.as_bytes(), at..at + 7, b"SUPPLY");

        group.bench_with_input(BenchmarkId::from_parameter(count), &edited, |b, edited| {
            b.iter(|| black_box(parser.parse(black_box(edited), Some(&tree), &[edit])));
        });
    }
    group.finish();
}

fn bench_parse_batch(c: &mut Criterion) {
    let parser = huff::parser();
    let sources: Vec<String> = (0..32).map(|n| source(n % 8 + 1)).collect();
    c.bench_function("parse_batch_32", |b| {
        b.iter(|| black_box(parser.parse_batch(black_box(&sources))));
    });
}

criterion_group!(
    benches,
    bench_grammar_compile,
    bench_full_parse,
    bench_incremental_parse,
    bench_parse_batch
);
criterion_main!(benches);
