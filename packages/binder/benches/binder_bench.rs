use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::rc::Rc;
use stencil_binder::{bind_source, BindOptions, CommandRecorder, Instance, MonospaceMetrics, Renderer};
use stencil_geometry::Rect;

const LIBRARY: &str = r##"<library name="bench">
  <defs>
    <linear-gradient id="shade">
      <stop offset="0" color="white"/>
      <stop offset="1" color="gray"/>
    </linear-gradient>
    <rect id="tick" width="1" height="4" fill="black"/>
  </defs>
  <pattern name="meter" type="usage-bar" example-size="200 24">
    <arg name="used" type="scalar" default="0.5" test="{used >= 0}"/>
    <arg name="caption" type="string" default="Disk"/>
    <arg name="mark" type="scalar" numbered="true" default="0"/>
    <var name="split" value="{width * used}"/>
    <area role="label" width="60">
      <text y="16">{caption}</text>
    </area>
    <area role="remaining" x="60" reference="20 20" xs="4 16" ys="4 16">
      <rect fill="#shade" rx="3"/>
      <rect width="{split}" fill="blue"/>
      <use href="#tick" for-each="m in {mark}" x="{m}"/>
    </area>
  </pattern>
</library>"##;

fn bind_library(c: &mut Criterion) {
    let options = BindOptions::default();
    c.bench_function("bind_library", |b| {
        b.iter(|| bind_source(black_box(LIBRARY), &options))
    });
}

fn render_meter(c: &mut Criterion) {
    let doc = bind_source(LIBRARY, &BindOptions::default());
    let pattern = doc.pattern("meter").unwrap();
    let instance = Instance::new()
        .with_attribute("used", "0.3")
        .with_attribute("mark1", "5")
        .with_attribute("mark2", "10")
        .with_attribute("mark3", "15");
    let renderer = Renderer::new(Rc::new(MonospaceMetrics::default()));

    c.bench_function("render_meter", |b| {
        b.iter(|| {
            let mut surface = CommandRecorder::new();
            renderer
                .render(pattern, black_box(&instance), Rect::new(0.0, 0.0, 240.0, 24.0), &mut surface)
                .unwrap()
        })
    });
}

criterion_group!(benches, bind_library, render_meter);
criterion_main!(benches);
