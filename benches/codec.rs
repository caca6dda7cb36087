use criterion::{black_box, criterion_group, criterion_main, Criterion};
use wasmkit::{assemble_text, emit_binary, parse_binary};

/// A module exercising every section the codec handles.
const FIXTURE: &str = r#"(module $fixture
  (type $binary (func (param i32 i32) (result i32)))
  (import "env" "report" (func $report (param i32)))
  (table 4 funcref)
  (memory 1 4)
  (global $counter (mut i32) (i32.const 0))
  (func $add (type $binary) local.get 0 local.get 1 i32.add)
  (func $mul (type $binary) local.get 0 local.get 1 i32.mul)
  (func (export "run") (param i32) (result i32)
    (block (result i32)
      (i32.add
        (call $add (local.get 0) (i32.const 1))
        (call $mul (local.get 0) (i32.const 2)))))
  (elem (i32.const 0) $add $mul)
  (data (i32.const 16) "fixture"))"#;

pub fn criterion_benchmark(c: &mut Criterion) {
    let module = assemble_text(FIXTURE).expect("the fixture assembles");
    let mut bytes = Vec::new();

    emit_binary(&module, &mut bytes).expect("the fixture emits");

    c.bench_function("assemble", |b| {
        b.iter(|| black_box(assemble_text(FIXTURE).expect("the fixture assembles")))
    });

    c.bench_function("emit", |b| {
        b.iter(|| {
            let mut output = Vec::new();

            emit_binary(&module, &mut output).expect("the fixture emits");
            black_box(output.len())
        })
    });

    c.bench_function("parse", |b| {
        b.iter(|| black_box(parse_binary(bytes.as_slice()).expect("the fixture parses")))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
