use criterion::{Criterion, criterion_group, criterion_main};
use std::fs;
use std::hint::black_box;
use std::path::Path;

use lindex::Index;

fn write_data_file(dir: &Path, n: u64) {
    let mut contents = String::new();
    for i in 0..n {
        contents.push_str(&format!("{i:08}payload-{i}\n"));
    }
    fs::write(dir.join("lines.txt"), contents).unwrap();
}

fn setup_index(dir: &Path, n: u64) -> Index {
    write_data_file(dir, n);
    Index::build(&dir.join("lines.txt"), &dir.join("lines.idx"), 8, &mut |_, _| {}).unwrap()
}

fn bench_index(c: &mut Criterion) {
    for n in [100u64, 1000, 10000] {
        c.bench_function(&format!("build_{n}"), |b| {
            let dir = tempfile::tempdir().unwrap();
            write_data_file(dir.path(), n);
            b.iter(|| {
                Index::build(
                    &dir.path().join("lines.txt"),
                    &dir.path().join("lines.idx"),
                    8,
                    &mut |_, _| {},
                )
                .unwrap()
            });
        });

        c.bench_function(&format!("find_{n}"), |b| {
            let dir = tempfile::tempdir().unwrap();
            let mut index = setup_index(dir.path(), n);
            b.iter(|| {
                for i in 0..n {
                    let key = format!("{i:08}");
                    black_box(index.find(key.as_bytes()).unwrap());
                }
            });
        });

        c.bench_function(&format!("list_{n}"), |b| {
            let dir = tempfile::tempdir().unwrap();
            let mut index = setup_index(dir.path(), n);
            b.iter(|| {
                let mut lines = 0u64;
                index
                    .list(b"00000000", n as usize, &mut |_| lines += 1)
                    .unwrap();
                black_box(lines)
            });
        });
    }
}

criterion_group!(benches, bench_index);
criterion_main!(benches);
