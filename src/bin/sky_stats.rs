//! Synthetic-frame background estimation demo
//!
//! Generates a synthetic detector frame (flat sky background, Gaussian
//! noise, a sprinkling of bright point sources) and runs every background
//! and noise estimator over it, printing the estimates next to the truth.
//!
//! Usage:
//!   cargo run --bin sky_stats -- [--width 256] [--sources 50] [--sigma 3]

use clap::Parser;
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use skyglow::{
    Background, BackgroundEstimator, BackgroundRms, MaskedArray, NoiseEstimator, SigmaClip,
};

/// Synthetic-frame background estimation demo
#[derive(Parser, Debug)]
#[command(
    version,
    about = "Estimates sky background and noise on a synthetic detector frame",
    long_about = None
)]
struct Args {
    /// Frame width in pixels
    #[arg(long, default_value_t = 256)]
    width: usize,

    /// Frame height in pixels
    #[arg(long, default_value_t = 256)]
    height: usize,

    /// True background level (ADU)
    #[arg(long, default_value_t = 100.0)]
    background: f64,

    /// True background noise sigma (ADU)
    #[arg(long, default_value_t = 5.0)]
    noise: f64,

    /// Number of bright sources to inject
    #[arg(long, default_value_t = 50)]
    sources: usize,

    /// Clipping threshold in sigmas
    #[arg(long, default_value_t = 3.0)]
    sigma: f64,

    /// Maximum clipping iterations (0 performs no clipping passes)
    #[arg(long, default_value_t = 5)]
    iters: usize,

    /// Random seed for reproducibility
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

/// One standard normal deviate via the Box-Muller transform.
fn standard_normal(rng: &mut StdRng) -> f64 {
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

/// Build a frame of `background + noise` with Gaussian point sources added.
fn synthetic_frame(args: &Args) -> Array2<f64> {
    let mut rng = StdRng::seed_from_u64(args.seed);
    let mut frame = Array2::from_shape_simple_fn((args.height, args.width), || {
        args.background + args.noise * standard_normal(&mut rng)
    });

    // Inject sources as small Gaussian profiles
    let fwhm_sigma = 1.5;
    let radius = 5_i64;
    for _ in 0..args.sources {
        let cx = rng.gen_range(0..args.width) as i64;
        let cy = rng.gen_range(0..args.height) as i64;
        let amplitude = args.noise * rng.gen_range(20.0..200.0);
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                let x = cx + dx;
                let y = cy + dy;
                if x < 0 || y < 0 || x >= args.width as i64 || y >= args.height as i64 {
                    continue;
                }
                let r2 = (dx * dx + dy * dy) as f64;
                frame[[y as usize, x as usize]] +=
                    amplitude * (-r2 / (2.0 * fwhm_sigma * fwhm_sigma)).exp();
            }
        }
    }

    frame
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    log::info!(
        "generating {}x{} frame with {} sources",
        args.width,
        args.height,
        args.sources
    );
    let sample = MaskedArray::from(synthetic_frame(&args));

    let clip = SigmaClip::new(args.sigma)?.with_max_iters(Some(args.iters));

    println!(
        "Synthetic frame: {}x{} px, background {:.1} ADU, noise {:.1} ADU, {} sources",
        args.width, args.height, args.background, args.noise, args.sources
    );
    println!(
        "Sigma clip: {} sigma, max {} iteration(s)",
        args.sigma, args.iters
    );
    println!();

    println!("Background level estimators:");
    let value_estimators = [
        ("Mean", BackgroundEstimator::Mean),
        ("Median", BackgroundEstimator::Median),
        ("MMM (DAOPHOT)", BackgroundEstimator::mmm()),
        ("SExtractor", BackgroundEstimator::SExtractor),
        ("Biweight location", BackgroundEstimator::biweight_location()),
    ];
    for (name, estimator) in value_estimators {
        let bkg = Background::new(estimator, clip.clone())?;
        let value = bkg
            .estimate(&sample, None)?
            .scalar()
            .unwrap_or(f64::NAN);
        println!(
            "  {:<20} {:>10.4}  (truth {:.1}, error {:+.4})",
            name,
            value,
            args.background,
            value - args.background
        );
    }

    println!();
    println!("Background noise estimators:");
    let noise_estimators = [
        ("Std", NoiseEstimator::Std),
        ("MAD std", NoiseEstimator::MadStd),
        ("Biweight midvar", NoiseEstimator::biweight_midvariance()),
    ];
    for (name, estimator) in noise_estimators {
        let rms = BackgroundRms::new(estimator, clip.clone())?;
        let value = rms
            .estimate(&sample, None)?
            .scalar()
            .unwrap_or(f64::NAN);
        println!(
            "  {:<20} {:>10.4}  (truth {:.1}, error {:+.4})",
            name,
            value,
            args.noise,
            value - args.noise
        );
    }

    Ok(())
}
