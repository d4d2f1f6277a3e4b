use serde::Deserialize;
use serde::Serialize;

/// How the k-nearest-neighbor graph is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NeighborStrategy {
  /// Exact O(N²) scan over all pairs. Ties are broken by index.
  BruteForce,
  /// Delegate to an accelerated [`NeighborSearch`](crate::NeighborSearch)
  /// capability. Falls back to brute force (with a warning) if none is
  /// available when the engine is built.
  Accelerated,
}

/// How the bottom eigenpairs of the cost operator are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EigenMethod {
  /// Iterative Lanczos on the sparse operator. Fast for large N, bounded by
  /// `max_iterations`.
  Lanczos,
  /// Full dense eigendecomposition. O(N³) time and O(N²) memory, always
  /// converges.
  Dense,
}

/// Configuration for the neighbor graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeighborParams {
  /// Number of nearest neighbors per point.
  ///
  /// Must be >= 1 and < n_samples. At least `n_components + 1` is
  /// recommended; smaller values only produce a warning.
  ///
  /// Default: 12
  pub n_neighbors: usize,

  /// Neighbor search strategy.
  ///
  /// Default: BruteForce
  pub strategy: NeighborStrategy,
}

impl Default for NeighborParams {
  fn default() -> Self {
    Self {
      n_neighbors: 12,
      strategy: NeighborStrategy::BruteForce,
    }
  }
}

/// Configuration for the reconstruction weight phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightParams {
  /// Regularization factor. `regularization * trace(C)` is added to the
  /// diagonal of each local Gram matrix C before solving.
  ///
  /// Must be finite and >= 0.
  ///
  /// Default: 0.001
  pub regularization: f64,

  /// Number of workers solving weights in parallel. 0 uses all available
  /// parallelism.
  ///
  /// Default: 0
  pub n_workers: usize,
}

impl Default for WeightParams {
  fn default() -> Self {
    Self {
      regularization: 1e-3,
      n_workers: 0,
    }
  }
}

/// Configuration for the eigensolver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EigenParams {
  /// Eigensolver used on the cost operator.
  ///
  /// Default: Lanczos
  pub method: EigenMethod,

  /// Maximum number of Lanczos steps before giving up with
  /// `EigenNotConverged`. Ignored by the dense method.
  ///
  /// Must be > n_components.
  ///
  /// Default: 1000
  pub max_iterations: usize,

  /// Residual tolerance for a Ritz pair of the inverted operator
  /// `(M + εI)⁻¹`, relative to its Ritz value.
  ///
  /// Default: 1e-10
  pub tolerance: f64,

  /// Seed for the Lanczos start vector. A fixed seed keeps `compute`
  /// deterministic.
  ///
  /// Default: 42
  pub seed: u64,
}

impl Default for EigenParams {
  fn default() -> Self {
    Self {
      method: EigenMethod::Lanczos,
      max_iterations: 1000,
      tolerance: 1e-10,
      seed: 42,
    }
  }
}

/// Complete LLE configuration.
///
/// # Example
///
/// ```ignore
/// use lle_rs::config::{LleConfig, NeighborParams};
///
/// let config = LleConfig {
///     n_components: 2,
///     neighbors: NeighborParams {
///         n_neighbors: 10,
///         ..Default::default()
///     },
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LleConfig {
  /// Number of dimensions in the output embedding.
  ///
  /// Must be >= 1 and < n_features.
  ///
  /// Default: 2
  pub n_components: usize,

  /// Neighbor graph configuration.
  pub neighbors: NeighborParams,

  /// Weight phase configuration.
  pub weights: WeightParams,

  /// Eigensolver configuration.
  pub eigen: EigenParams,
}

impl Default for LleConfig {
  fn default() -> Self {
    Self {
      n_components: 2,
      neighbors: NeighborParams::default(),
      weights: WeightParams::default(),
      eigen: EigenParams::default(),
    }
  }
}

impl LleConfig {
  /// Number of workers after resolving `0` to the available parallelism.
  pub fn resolved_workers(&self) -> usize {
    match self.weights.n_workers {
      0 => std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1),
      n => n,
    }
  }
}
