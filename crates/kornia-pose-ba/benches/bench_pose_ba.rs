use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use kornia_pose_ba::synthetic::{self, SceneConfig, SyntheticScene};
use kornia_pose_ba::{PoseOptimizer, PoseOptimizerOptions};
use rand::{rngs::StdRng, SeedableRng};

fn scene_with_outliers(num_points: usize, seed: u64) -> SyntheticScene {
    let config = SceneConfig {
        num_points,
        pixel_noise_std: 0.5,
        seed,
        ..Default::default()
    };
    let mut scene = synthetic::generate_scene(
        &config,
        &synthetic::reference_pose(),
        &synthetic::reference_intrinsics(),
    )
    .unwrap();
    let mut rng = StdRng::seed_from_u64(seed);
    let outliers = synthetic::choose_outlier_indices(&mut rng, num_points, 0.05);
    synthetic::inject_outliers(&mut rng, &mut scene.pixels, &outliers, 40.0);
    scene
}

fn bench_pose_ba(c: &mut Criterion) {
    let mut group = c.benchmark_group("pose_only_ba");
    group.sample_size(20);
    let initial = synthetic::reference_initial_guess();

    for &n in &[100usize, 1000, 10_000, 100_000] {
        let scene = scene_with_outliers(n, 42);
        group.throughput(Throughput::Elements(n as u64));

        for (name, parallel) in [("serial", false), ("parallel", true)] {
            let optimizer =
                PoseOptimizer::new(PoseOptimizerOptions::default().with_parallel(parallel));
            group.bench_with_input(BenchmarkId::new(name, n), &n, |b, _| {
                b.iter(|| {
                    let result = optimizer
                        .optimize(
                            &scene.points_world,
                            &scene.pixels,
                            &scene.intrinsics,
                            &initial,
                        )
                        .unwrap();
                    std::hint::black_box(result);
                });
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_pose_ba);
criterion_main!(benches);
