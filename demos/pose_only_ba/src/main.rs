use argh::FromArgs;
use std::path::PathBuf;

use kornia_lie::SE3F64;
use kornia_pose_ba::synthetic::{self, SceneConfig};
use kornia_pose_ba::{PoseOptimizer, PoseOptimizerOptions};
use rand::{rngs::StdRng, SeedableRng};

#[derive(FromArgs)]
/// Refine a camera pose against synthetic 3D-2D correspondences
struct Args {
    /// number of correspondences
    #[argh(option, default = "100_000")]
    num_points: usize,

    /// standard deviation of the pixel noise
    #[argh(option, default = "0.0")]
    pixel_noise: f64,

    /// fraction of correspondences turned into outliers
    #[argh(option, default = "0.0")]
    outlier_fraction: f64,

    /// pixel offset applied to the outliers
    #[argh(option, default = "40.0")]
    outlier_radius: f64,

    /// seed of the scene generator
    #[argh(option, default = "42")]
    seed: u64,

    /// path to a JSON file with the optimizer options
    #[argh(option)]
    config: Option<PathBuf>,

    /// print the full report and the pose trajectory
    #[argh(switch)]
    verbose: bool,
}

fn print_pose(label: &str, pose: &SE3F64) {
    let r = pose.rotation();
    println!("{label}:");
    for i in 0..3 {
        let row = r.row(i);
        println!(
            "{:>10.6} {:>10.6} {:>10.6} {:>10.6}",
            row.x, row.y, row.z, pose.t[i]
        );
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Args = argh::from_env();

    let options = match &args.config {
        Some(path) => {
            let options: PoseOptimizerOptions =
                serde_json::from_str(&std::fs::read_to_string(path)?)?;
            log::info!("loaded options from {}", path.display());
            options
        }
        None => PoseOptimizerOptions::default(),
    };

    let scene_config = SceneConfig {
        num_points: args.num_points,
        pixel_noise_std: args.pixel_noise,
        seed: args.seed,
        ..Default::default()
    };
    let mut scene = synthetic::generate_scene(
        &scene_config,
        &synthetic::reference_pose(),
        &synthetic::reference_intrinsics(),
    )?;

    let mut rng = StdRng::seed_from_u64(args.seed.wrapping_add(1));
    let outliers =
        synthetic::choose_outlier_indices(&mut rng, args.num_points, args.outlier_fraction);
    synthetic::inject_outliers(&mut rng, &mut scene.pixels, &outliers, args.outlier_radius);
    println!(
        "Generated {} correspondences ({} outliers)",
        scene.points_world.len(),
        outliers.len()
    );

    let initial_guess = synthetic::reference_initial_guess();
    let optimizer = PoseOptimizer::new(options);

    let start = std::time::Instant::now();
    let result = optimizer.optimize(
        &scene.points_world,
        &scene.pixels,
        &scene.intrinsics,
        &initial_guess,
    )?;
    let elapsed = start.elapsed();

    println!("{}", result.summary.brief_report());
    println!("Solve time: {:.3} ms", elapsed.as_secs_f64() * 1e3);

    println!("Compare pose:");
    print_pose("truth", &scene.pose);
    print_pose("Initial guess", &initial_guess);
    print_pose("Estimated", &result.pose);

    let (rotation_error, translation_error) = synthetic::pose_error(&result.pose, &scene.pose);
    println!(
        "Rotation error: {rotation_error:.3e} rad, translation error: {translation_error:.3e}"
    );

    let missed = outliers
        .iter()
        .filter(|&&index| result.inlier_mask[index])
        .count();
    let num_rejected = result.inlier_mask.iter().filter(|&&inlier| !inlier).count();
    println!(
        "Rejected {num_rejected} correspondences, {missed} injected outliers kept as inliers"
    );

    if args.verbose {
        print!("{}", result.summary.full_report());
        for (iteration, pose) in result.trajectory.iter_indexed() {
            let [qx, qy, qz, qw, tx, ty, tz] = pose.to_array();
            println!(
                "pose {iteration:>4}: q = [{qx:.6}, {qy:.6}, {qz:.6}, {qw:.6}], t = [{tx:.6}, {ty:.6}, {tz:.6}]"
            );
        }
        if result.trajectory.dropped() > 0 {
            println!("({} earlier poses dropped)", result.trajectory.dropped());
        }
    }

    Ok(())
}
