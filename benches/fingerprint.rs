use std::hint::black_box;
use std::path::Path;

use capsync::capture::fingerprint;
use capsync::tracking::TrackingStore;
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use tempfile::tempdir;

const FILE_COUNTS: [usize; 3] = [10, 100, 1_000];
const FOLDER_COUNT: usize = 500;

fn seed_folder(folder: &Path, files: usize) {
    std::fs::create_dir_all(folder).expect("create folder");
    for i in 0..files {
        std::fs::write(folder.join(format!("frame_{i:05}.png")), b"png").expect("seed file");
    }
}

fn bench_fingerprint(c: &mut Criterion) {
    let mut group = c.benchmark_group("fingerprint");
    for files in FILE_COUNTS {
        let dir = tempdir().expect("tempdir");
        seed_folder(dir.path(), files);
        group.bench_with_input(BenchmarkId::from_parameter(files), dir.path(), |b, folder| {
            b.iter(|| fingerprint(black_box(folder), &["success.json", "failed.json"]));
        });
    }
    group.finish();
}

fn bench_select_eligible(c: &mut Criterion) {
    let dir = tempdir().expect("tempdir");
    let base = dir.path().join("data");
    let store = TrackingStore::open(dir.path().join("track.db")).expect("open store");
    for i in 0..FOLDER_COUNT {
        let folder = base.join(format!("Batch{i:04}"));
        seed_folder(&folder, 2);
        store
            .upsert_folder(&folder, &format!("Batch{i:04}"), 2, "seed")
            .expect("seed upsert");
    }
    c.bench_with_input(
        BenchmarkId::new("select_eligible", FOLDER_COUNT),
        &base,
        |b, base| {
            b.iter(|| {
                store
                    .select_eligible(black_box(base), 3, &["success.json", "failed.json"])
                    .expect("select_eligible")
            });
        },
    );
}

criterion_group!(benches, bench_fingerprint, bench_select_eligible);
criterion_main!(benches);
