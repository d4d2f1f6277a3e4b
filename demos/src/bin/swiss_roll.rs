use clap::Parser;
use clap::ValueEnum;
use lle_rs::BruteForceSearch;
use lle_rs::EigenMethod;
use lle_rs::Lle;
use lle_rs::LleConfig;
use lle_rs::NeighborSearch;
use lle_rs::NeighborStrategy;
use ndarray::Array2;
use ndarray::ArrayView2;
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::error::Error;
use std::f64::consts::PI;
use std::fs;
use std::io::Write;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "Swiss roll LLE Demo")]
struct Args {
  /// Number of points sampled from the roll
  #[arg(short, long, default_value = "2000")]
  samples: usize,

  /// Neighbors per point
  #[arg(short = 'k', long, default_value = "12")]
  neighbors: usize,

  /// Regularization factor
  #[arg(short, long, default_value = "0.001")]
  regularization: f64,

  /// Weight workers (0 = all cores)
  #[arg(short, long, default_value = "0")]
  workers: usize,

  /// Eigensolver
  #[arg(short, long, default_value = "lanczos")]
  eigen: Eigen,

  /// Neighbor search
  #[arg(short, long, default_value = "accelerated")]
  neighbor_search: Search,

  /// Sampling seed
  #[arg(long, default_value = "42")]
  seed: u64,

  /// Optional CSV path for the embedding (x, y, t)
  #[arg(short, long)]
  output: Option<String>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Eigen {
  Lanczos,
  Dense,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Search {
  BruteForce,
  Accelerated,
}

fn main() -> Result<(), Box<dyn Error>> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();
  let args = Args::parse();

  println!("Swiss roll LLE Demo");
  println!("===================");
  println!("Samples: {}", args.samples);
  println!("Neighbors: {}", args.neighbors);
  println!("Eigensolver: {:?}", args.eigen);
  println!();

  let (data, intrinsic) = swiss_roll(args.samples, args.seed);

  let mut config = LleConfig::default();
  config.neighbors.n_neighbors = args.neighbors;
  config.neighbors.strategy = match args.neighbor_search {
    Search::BruteForce => NeighborStrategy::BruteForce,
    Search::Accelerated => NeighborStrategy::Accelerated,
  };
  config.weights.regularization = args.regularization;
  config.weights.n_workers = args.workers;
  config.eigen.method = match args.eigen {
    Eigen::Lanczos => EigenMethod::Lanczos,
    Eigen::Dense => EigenMethod::Dense,
  };

  println!("Running LLE...");
  let start = Instant::now();
  let mut lle = Lle::new(data, config)?;
  for fallback in lle.fallbacks() {
    println!("  Fallback: {fallback:?}");
  }
  println!(
    "  Using {} search, {} solver, {} workers",
    lle.neighbor_search_name(),
    lle.eigen_solver_name(),
    lle.n_workers()
  );
  let fitted = lle.compute()?;
  println!("  LLE completed in {:.2}s", start.elapsed().as_secs_f32());
  println!();

  println!("Eigenvalues: {}", fitted.eigenvalues());
  println!("Reconstruction error: {:.3e}", fitted.reconstruction_error());
  println!("Graph components: {}", fitted.graph_components());

  let embedding = fitted.embedding().mapv(|v| v as f32);
  let overlap = neighbor_overlap(intrinsic.view(), embedding.view(), 10)?;
  println!("Neighbor overlap with the unrolled sheet: {overlap:.3}");

  if let Some(path) = &args.output {
    let mut file = fs::File::create(path)?;
    writeln!(file, "x,y,t")?;
    for (row, coords) in fitted.embedding().outer_iter().zip(intrinsic.outer_iter()) {
      writeln!(file, "{},{},{}", row[0], row[1], coords[0])?;
    }
    println!("Embedding saved to {path}");
  }

  println!();
  println!("Done!");
  Ok(())
}

/// Sample the Swiss roll with arc-length-uniform density.
///
/// Returns the 3D points and their (arc, height) coordinates on the unrolled
/// sheet, which is roughly square.
fn swiss_roll(n_samples: usize, seed: u64) -> (Array2<f32>, Array2<f32>) {
  let mut rng = StdRng::seed_from_u64(seed);
  let (a, b) = (1.5 * PI, 3.0 * PI);
  let extent = (b * b - a * a) / 2.0;

  let mut points = Array2::<f32>::zeros((n_samples, 3));
  let mut intrinsic = Array2::<f32>::zeros((n_samples, 2));
  for i in 0..n_samples {
    let s = rng.random::<f64>();
    let h = extent * rng.random::<f64>();
    let t = (a * a + s * (b * b - a * a)).sqrt();
    points[(i, 0)] = (t * t.cos()) as f32;
    points[(i, 1)] = h as f32;
    points[(i, 2)] = (t * t.sin()) as f32;
    intrinsic[(i, 0)] = (extent * s) as f32;
    intrinsic[(i, 1)] = h as f32;
  }
  (points, intrinsic)
}

/// Mean fraction of shared k-nearest neighbors between two point sets.
fn neighbor_overlap(a: ArrayView2<f32>, b: ArrayView2<f32>, k: usize) -> lle_rs::Result<f64> {
  let ga = BruteForceSearch.search(a, k)?;
  let gb = BruteForceSearch.search(b, k)?;
  let shared: usize = ga
    .outer_iter()
    .zip(gb.outer_iter())
    .map(|(ra, rb)| ra.iter().filter(|j| rb.iter().any(|x| x == *j)).count())
    .sum();
  Ok(shared as f64 / (ga.nrows() * k) as f64)
}
