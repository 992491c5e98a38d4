use std::time::Duration;

use criterion::measurement::WallTime;
use criterion::{
    black_box, criterion_group, criterion_main, BenchmarkGroup, BenchmarkId, Criterion,
};
use kvdoc::{Kv, Result, WriteOptions};

#[derive(Clone, Default)]
struct Unit {
    id: i32,
    name: String,
    hp: f32,
    pos: [f64; 2],
    tags: Vec<i32>,
}

fn make_units(count: usize) -> Vec<Unit> {
    (0..count)
        .map(|i| Unit {
            id: i as i32,
            name: format!("unit-{i}"),
            hp: 100.0 - (i % 40) as f32 * 0.5,
            pos: [i as f64 * 1.25, (i % 17) as f64],
            tags: (0..(i % 6) as i32).collect(),
        })
        .collect()
}

fn serialize_unit(kv: &mut Kv<'_>, unit: &mut Unit) -> Result<()> {
    kv.field("id", &mut unit.id)?;
    kv.field("name", &mut unit.name)?;
    kv.field("hp", &mut unit.hp)?;
    kv.object_begin(Some("pos"))?;
    kv.field("x", &mut unit.pos[0])?;
    kv.field("y", &mut unit.pos[1])?;
    kv.object_end()?;
    kv.field("tags", &mut unit.tags)
}

fn serialize_units(kv: &mut Kv<'_>, units: &mut [Unit]) -> Result<()> {
    for unit in units.iter_mut() {
        let key = format!("unit_{}", unit.id);
        kv.object_begin(Some(&key))?;
        serialize_unit(kv, unit)?;
        kv.object_end()?;
    }
    Ok(())
}

fn write_units(units: &mut [Unit]) -> String {
    let mut kv = Kv::write();
    serialize_units(&mut kv, units).unwrap();
    kv.into_buffer().unwrap()
}

fn make_tree(depth: usize, width: usize, seed: u64, out: &mut String) {
    out.push_str(&format!("value = {}, ", seed as i64 - 500));
    out.push_str(&format!("name = \"node-{seed}\", "));
    if depth == 0 {
        return;
    }
    for i in 0..width {
        out.push_str(&format!("child_{i} = {{ "));
        make_tree(depth - 1, width, seed * 31 + i as u64, out);
        out.push_str("}, ");
    }
}

fn bench_read(group: &mut BenchmarkGroup<'_, WallTime>, name: &str, text: &str) {
    group.throughput(criterion::Throughput::Bytes(text.len() as u64));
    group.bench_function(BenchmarkId::new("parse", name), |b| {
        b.iter(|| {
            let kv = Kv::read(black_box(text)).unwrap();
            black_box(kv);
        });
    });
}

fn bench_diff(group: &mut BenchmarkGroup<'_, WallTime>, name: &str, text: &str, base: &str) {
    let base = Kv::read(base).unwrap();
    let doc = Kv::read(text).unwrap();
    group.throughput(criterion::Throughput::Bytes(text.len() as u64));
    group.bench_function(BenchmarkId::new("diff", name), |b| {
        b.iter(|| {
            let patch = kvdoc::diff(black_box(&doc), &base, &WriteOptions::default()).unwrap();
            black_box(patch);
        });
    });
}

fn criterion_config() -> Criterion {
    if std::env::var("KVDOC_BENCH_MINIMAL").is_ok() {
        Criterion::default()
            .warm_up_time(Duration::from_secs(0))
            .measurement_time(Duration::from_millis(10))
            .sample_size(10)
            .nresamples(1)
    } else {
        Criterion::default()
    }
}

fn criterion_benchmark(c: &mut Criterion) {
    let units = make_units(2000);
    let units_text = write_units(&mut units.clone());

    let mut changed = units.clone();
    for unit in changed.iter_mut().step_by(10) {
        unit.hp += 1.0;
    }
    let changed_text = write_units(&mut changed);

    let mut tree_text = String::new();
    make_tree(5, 3, 1, &mut tree_text);

    let mut write = c.benchmark_group("write");
    write.throughput(criterion::Throughput::Bytes(units_text.len() as u64));
    write.bench_function(BenchmarkId::new("struct", "units"), |b| {
        b.iter(|| {
            let mut units = units.clone();
            black_box(write_units(black_box(&mut units)));
        });
    });
    write.finish();

    let mut read = c.benchmark_group("read");
    bench_read(&mut read, "units", &units_text);
    bench_read(&mut read, "deep_tree", &tree_text);
    read.bench_function(BenchmarkId::new("struct", "units"), |b| {
        let mut kv = Kv::read(&units_text).unwrap();
        let mut back = vec![Unit::default(); units.len()];
        for (unit, source) in back.iter_mut().zip(&units) {
            unit.id = source.id;
        }
        b.iter(|| {
            kv.reset_read_state().unwrap();
            serialize_units(&mut kv, &mut back).unwrap();
            black_box(&back);
        });
    });
    read.finish();

    let mut diff = c.benchmark_group("diff");
    bench_diff(&mut diff, "units_10pct", &changed_text, &units_text);
    bench_diff(&mut diff, "units_equal", &units_text, &units_text);
    diff.finish();
}

criterion_group! {
    name = benches;
    config = criterion_config();
    targets = criterion_benchmark
}
criterion_main!(benches);
