//! Compilation performance benchmarks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use slyc::*;
use std::fs;
use tempfile::TempDir;

const CARD_TEMPLATE: &str = r#"
<template data-sly-template.card="${@ title, items}">
  <section class="card">
    <h2 data-sly-element="${headingLevel}">${title @ i18n, locale='de'}</h2>
    <ul data-sly-list.item="${items}">
      <li class="${item.kind}" data-sly-attribute.href="${item.link}">${'{0} of {1}' @ format=[itemList.count, items.size]}</li>
    </ul>
    <sly data-sly-include="footer.html"/>
  </section>
</template>
<div data-sly-use.page="com.example.Page" data-sly-call="${card @ title=page.title, items=page.children}"></div>
"#;

fn large_template(rows: usize) -> String {
    let mut content = String::from("<table data-sly-test.rows=\"${model.rows}\">\n");
    for i in 0..rows {
        content.push_str(&format!(
            "<tr data-sly-repeat.cell=\"${{rows[{i}]}}\"><td title=\"Row {i}\">${{cell.value @ join=', '}}</td></tr>\n"
        ));
    }
    content.push_str("</table>\n");
    content
}

fn bench_simple_compilation(c: &mut Criterion) {
    let compiler = Compiler::default();
    c.bench_function("simple_compilation", |b| {
        b.iter(|| compiler.compile_str(black_box("<p data-sly-test=\"${on}\">Hello ${name}</p>")).unwrap())
    });
}

fn bench_directive_compilation(c: &mut Criterion) {
    let compiler = Compiler::default();
    c.bench_function("directive_compilation", |b| {
        b.iter(|| compiler.compile_str(black_box(CARD_TEMPLATE)).unwrap())
    });
}

fn bench_large_file_compilation(c: &mut Criterion) {
    let temp_dir = TempDir::new().unwrap();
    let input_path = temp_dir.path().join("large.html");
    fs::write(&input_path, large_template(1000)).unwrap();

    let compiler = Compiler::default();
    c.bench_function("large_file_compilation", |b| {
        b.iter(|| compiler.compile_file(black_box(&input_path)).unwrap())
    });
}

fn bench_buffer_sizes(c: &mut Criterion) {
    let source = large_template(200);
    let mut group = c.benchmark_group("buffer_sizes");
    for buffer_size in [16, 512, 8192] {
        let compiler = Compiler::new(CompilerOptions {
            buffer_size,
            ..Default::default()
        })
        .unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(buffer_size), &source, |b, source| {
            b.iter(|| compiler.parse_str(black_box(source)).unwrap())
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_simple_compilation,
    bench_directive_compilation,
    bench_large_file_compilation,
    bench_buffer_sizes
);
criterion_main!(benches);
