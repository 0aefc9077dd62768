use criterion::{black_box, criterion_group, criterion_main, Criterion};
use stencil_parser::parse;

fn parse_simple_pattern(c: &mut Criterion) {
    let source = r#"
        <pattern name="dot" type="widget">
            <circle cx="50%" cy="50%" r="{min(width, height) / 2}" fill="black"/>
        </pattern>
    "#;

    c.bench_function("parse_simple_pattern", |b| b.iter(|| parse(black_box(source))));
}

fn parse_library(c: &mut Criterion) {
    let mut source = String::from("<library name=\"bench\">\n");
    for i in 0..200 {
        source.push_str(&format!(
            r#"  <pattern name="p{i}" type="box">
    <arg name="label" type="string" default="item {i}"/>
    <div reference="40,20" xs="8 32" ys="4 16">
      <rect width="100%" height="100%" fill="{{gray(0.8)}}" stroke="black"/>
      <text x="50%" y="50%">{{label}} &amp; more</text>
    </div>
  </pattern>
"#
        ));
    }
    source.push_str("</library>\n");

    c.bench_function("parse_library_200_patterns", |b| {
        b.iter(|| parse(black_box(&source)))
    });
}

fn parse_malformed(c: &mut Criterion) {
    let source = "<a><b x=1 <c></d>&bogus;".repeat(100);
    c.bench_function("parse_malformed", |b| b.iter(|| parse(black_box(&source))));
}

criterion_group!(benches, parse_simple_pattern, parse_library, parse_malformed);
criterion_main!(benches);
