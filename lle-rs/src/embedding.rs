use crate::config::EigenMethod;
use crate::config::LleConfig;
use crate::config::NeighborStrategy;
use crate::eigensolver::EigenSolver;
use crate::error::LleError;
use crate::error::Result;
use crate::knn::brute_force::BruteForceSearch;
use crate::lle::build_cost_operator::build_cost_operator;
use crate::lle::check_connectivity::check_connectivity;
use crate::lle::compute_weights::ComputeWeights;
use crate::lle::extract_embedding::ExtractEmbedding;
use crate::lle::find_neighbors::find_neighbors;
use crate::search::NeighborSearch;
use crate::spectral::dense::DenseSolver;
use crate::spectral::lanczos::LanczosSolver;
use ndarray::Array1;
use ndarray::Array2;
use ndarray::ArrayView1;
use ndarray::ArrayView2;
use serde::Deserialize;
use serde::Serialize;
use std::time::Instant;
use tracing::info;
use tracing::warn;

/// A capability the configuration asked for but the engine could not use.
///
/// Fallbacks are chosen once, when the engine is built, and are both logged
/// and kept on the engine so callers can tell what actually ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Fallback {
  /// `NeighborStrategy::Accelerated` was configured without an accelerated
  /// search; brute force is used instead.
  BruteForceNeighbors,
  /// `EigenMethod::Lanczos` was configured without an iterative solver; the
  /// dense solver is used instead.
  DenseEigensolver,
}

/// Lifecycle of an [`Lle`] engine.
///
/// An engine that exists is at least `Configured`: construction either
/// succeeds or fails with `InvalidConfiguration`/`InvalidInput`. `Computing`
/// only holds while `compute` runs, which borrows the engine mutably, so
/// callers observe `Configured`, `Ready` or `Failed`.
#[derive(Debug, Clone, PartialEq)]
pub enum LleState {
  /// Validated and ready to compute; no result yet.
  Configured,
  /// `compute` is running.
  Computing,
  /// The last `compute` succeeded and its result is stored.
  Ready,
  /// The last `compute` failed with this error. Calling `compute` again
  /// retries from scratch.
  Failed(LleError),
}

/// Locally Linear Embedding engine.
///
/// Owns the dataset, the configuration and the neighbor search and eigensolver
/// selected for it. Each call to [`compute`](Lle::compute) rebuilds the
/// neighbor graph, the weight matrix and the cost operator from scratch and
/// replaces the previous result.
///
/// # Example
///
/// ```ignore
/// use lle_rs::{Lle, LleConfig};
///
/// let mut lle = Lle::new(data, LleConfig::default())?;
/// let fitted = lle.compute()?;
/// println!("eigenvalues: {}", fitted.eigenvalues());
/// let embedding = fitted.embedding();
/// ```
#[derive(Debug)]
pub struct Lle {
  data: Array2<f32>,
  config: LleConfig,
  n_workers: usize,
  neighbor_search: Box<dyn NeighborSearch>,
  eigen_solver: Box<dyn EigenSolver>,
  fallbacks: Vec<Fallback>,
  state: LleState,
  result: Option<LleEmbedding>,
  scheduling_jitter: Option<u64>,
}

#[cfg(feature = "kdtree")]
fn builtin_accelerated_search() -> Option<Box<dyn NeighborSearch>> {
  Some(Box::new(crate::knn::kdtree::KdTreeSearch::default()))
}

#[cfg(not(feature = "kdtree"))]
fn builtin_accelerated_search() -> Option<Box<dyn NeighborSearch>> {
  None
}

impl Lle {
  /// Create an engine with the built-in capabilities.
  ///
  /// The accelerated neighbor strategy uses the kd-tree when the `kdtree`
  /// feature is enabled and falls back to brute force otherwise. The Lanczos
  /// method uses [`LanczosSolver`] with the configured budget.
  ///
  /// # Errors
  ///
  /// `InvalidInput` for an empty, undersized or non-finite dataset and
  /// `InvalidConfiguration` for out-of-range parameters. Nothing is computed.
  pub fn new(data: Array2<f32>, config: LleConfig) -> Result<Self> {
    let lanczos = LanczosSolver {
      max_iterations: config.eigen.max_iterations,
      tolerance: config.eigen.tolerance,
      seed: config.eigen.seed,
    };
    Self::with_capabilities(data, config, builtin_accelerated_search(), Some(Box::new(lanczos)))
  }

  /// Create an engine with caller-supplied capabilities.
  ///
  /// `accelerated_search` serves `NeighborStrategy::Accelerated` and
  /// `iterative_solver` serves `EigenMethod::Lanczos`. Passing `None` for a
  /// capability the configuration asks for makes the engine fall back to
  /// brute force or the dense solver; the fallback is logged and recorded in
  /// [`fallbacks`](Lle::fallbacks).
  ///
  /// # Example
  ///
  /// ```ignore
  /// let lle = Lle::with_capabilities(
  ///     data,
  ///     config,
  ///     Some(Box::new(MyAnnIndex::new())),
  ///     None,
  /// )?;
  /// ```
  pub fn with_capabilities(
    data: Array2<f32>,
    config: LleConfig,
    accelerated_search: Option<Box<dyn NeighborSearch>>,
    iterative_solver: Option<Box<dyn EigenSolver>>,
  ) -> Result<Self> {
    validate_data(&data)?;
    validate_config(&config, data.nrows(), data.ncols())?;

    let mut fallbacks = Vec::new();
    let neighbor_search: Box<dyn NeighborSearch> =
      match (config.neighbors.strategy, accelerated_search) {
        (NeighborStrategy::BruteForce, _) => Box::new(BruteForceSearch),
        (NeighborStrategy::Accelerated, Some(search)) => search,
        (NeighborStrategy::Accelerated, None) => {
          warn!("Accelerated neighbor search is unavailable. Falling back to brute force.");
          fallbacks.push(Fallback::BruteForceNeighbors);
          Box::new(BruteForceSearch)
        }
      };
    let eigen_solver: Box<dyn EigenSolver> = match (config.eigen.method, iterative_solver) {
      (EigenMethod::Dense, _) => Box::new(DenseSolver),
      (EigenMethod::Lanczos, Some(solver)) => solver,
      (EigenMethod::Lanczos, None) => {
        warn!("Iterative eigensolver is unavailable. Falling back to the dense eigensolver.");
        fallbacks.push(Fallback::DenseEigensolver);
        Box::new(DenseSolver)
      }
    };

    let n_workers = config.resolved_workers();
    Ok(Self {
      data,
      config,
      n_workers,
      neighbor_search,
      eigen_solver,
      fallbacks,
      state: LleState::Configured,
      result: None,
      scheduling_jitter: None,
    })
  }

  /// Run the full pipeline and store the result.
  ///
  /// Neighbor graph, weight matrix and cost operator are rebuilt on every
  /// call. Repeated calls on an unchanged engine produce the same embedding.
  ///
  /// # Errors
  ///
  /// `SingularSystem` if any point's weights cannot be solved (the whole
  /// weight phase is aborted) and `EigenNotConverged` if the iterative solver
  /// runs out of budget. The previous result is discarded either way and the
  /// engine moves to `Failed`.
  pub fn compute(&mut self) -> Result<&LleEmbedding> {
    self.state = LleState::Computing;
    self.result = None;

    match self.run() {
      Ok(result) => {
        self.state = LleState::Ready;
        Ok(&*self.result.insert(result))
      }
      Err(err) => {
        warn!(error = %err, "lle computation failed");
        self.state = LleState::Failed(err.clone());
        Err(err)
      }
    }
  }

  fn run(&self) -> Result<LleEmbedding> {
    let n_samples = self.data.nrows();
    let n_neighbors = self.config.neighbors.n_neighbors;
    info!(
      n_samples,
      n_features = self.data.ncols(),
      n_components = self.config.n_components,
      n_neighbors,
      n_workers = self.n_workers,
      search = self.neighbor_search.name(),
      solver = self.eigen_solver.name(),
      "starting lle"
    );
    let started = Instant::now();

    let graph = find_neighbors(self.neighbor_search.as_ref(), self.data.view(), n_neighbors)?;
    let graph_components = check_connectivity(graph.view());

    let weights = ComputeWeights::builder()
      .data(self.data.view())
      .graph(graph.view())
      .regularization(self.config.weights.regularization)
      .n_workers(self.n_workers)
      .scheduling_jitter(self.scheduling_jitter)
      .build()
      .exec()?;
    drop(graph);

    let cost = build_cost_operator(&weights);
    drop(weights);

    let (embedding, eigenvalues) = ExtractEmbedding::builder()
      .cost(&cost)
      .n_components(self.config.n_components)
      .solver(self.eigen_solver.as_ref())
      .build()
      .exec()?;

    info!(
      duration_ms = started.elapsed().as_millis(),
      "lle complete"
    );
    Ok(LleEmbedding {
      embedding,
      eigenvalues,
      graph_components,
      config: self.config.clone(),
    })
  }

  /// Current lifecycle state.
  pub fn state(&self) -> &LleState {
    &self.state
  }

  /// Result of the last successful `compute`, if the engine is `Ready`.
  pub fn result(&self) -> Option<&LleEmbedding> {
    self.result.as_ref()
  }

  /// Embedding of the last successful `compute`.
  pub fn embedding(&self) -> Option<ArrayView2<'_, f64>> {
    self.result.as_ref().map(|r| r.embedding())
  }

  /// Eigenvalues of the last successful `compute`, ascending.
  pub fn eigenvalues(&self) -> Option<ArrayView1<'_, f64>> {
    self.result.as_ref().map(|r| r.eigenvalues())
  }

  /// The configuration this engine was built with.
  pub fn config(&self) -> &LleConfig {
    &self.config
  }

  /// The dataset this engine was built with.
  pub fn data(&self) -> ArrayView2<'_, f32> {
    self.data.view()
  }

  /// Number of weight workers after resolving `n_workers = 0`.
  pub fn n_workers(&self) -> usize {
    self.n_workers
  }

  /// Fallbacks chosen at construction time.
  pub fn fallbacks(&self) -> &[Fallback] {
    &self.fallbacks
  }

  /// Name of the neighbor search in use.
  pub fn neighbor_search_name(&self) -> &'static str {
    self.neighbor_search.name()
  }

  /// Name of the eigensolver in use.
  pub fn eigen_solver_name(&self) -> &'static str {
    self.eigen_solver.name()
  }

  #[cfg(test)]
  pub(crate) fn set_scheduling_jitter(&mut self, seed: Option<u64>) {
    self.scheduling_jitter = seed;
  }
}

fn validate_data(data: &Array2<f32>) -> Result<()> {
  let (n_samples, n_features) = data.dim();
  if n_samples < 2 {
    return Err(LleError::InvalidInput(format!(
      "dataset needs at least 2 samples, got {n_samples}"
    )));
  }
  if n_features == 0 {
    return Err(LleError::InvalidInput(
      "dataset has no features".to_string(),
    ));
  }
  if let Some(((i, j), _)) = data.indexed_iter().find(|(_, v)| !v.is_finite()) {
    return Err(LleError::InvalidInput(format!(
      "dataset value at ({i}, {j}) is not finite"
    )));
  }
  Ok(())
}

fn validate_config(config: &LleConfig, n_samples: usize, n_features: usize) -> Result<()> {
  let d = config.n_components;
  let k = config.neighbors.n_neighbors;

  if d < 1 {
    return Err(LleError::InvalidConfiguration(format!(
      "n_components must be >= 1, got {d}"
    )));
  }
  if d >= n_features {
    return Err(LleError::InvalidConfiguration(format!(
      "n_components ({d}) must be less than n_features ({n_features})"
    )));
  }
  if d + 1 > n_samples {
    return Err(LleError::InvalidConfiguration(format!(
      "n_components ({d}) needs at least {} samples, got {n_samples}",
      d + 1
    )));
  }
  if k < 1 {
    return Err(LleError::InvalidConfiguration(format!(
      "n_neighbors must be >= 1, got {k}"
    )));
  }
  if k >= n_samples {
    return Err(LleError::InvalidConfiguration(format!(
      "n_neighbors ({k}) must be less than n_samples ({n_samples})"
    )));
  }
  let r = config.weights.regularization;
  if !r.is_finite() || r < 0.0 {
    return Err(LleError::InvalidConfiguration(format!(
      "regularization must be finite and >= 0, got {r}"
    )));
  }
  if config.eigen.method == EigenMethod::Lanczos {
    if config.eigen.max_iterations <= d {
      return Err(LleError::InvalidConfiguration(format!(
        "max_iterations ({}) must exceed n_components ({d})",
        config.eigen.max_iterations
      )));
    }
    let tol = config.eigen.tolerance;
    if !tol.is_finite() || tol <= 0.0 {
      return Err(LleError::InvalidConfiguration(format!(
        "tolerance must be finite and > 0, got {tol}"
      )));
    }
  }

  if k < d + 1 {
    warn!(
      "n_neighbors = {k} is below n_components + 1 = {}. The local reconstructions may not constrain the embedding.",
      d + 1
    );
  }
  Ok(())
}

/// Result of a successful [`Lle::compute`].
///
/// Holds only the terminal artifacts: the embedding and its eigenvalues. It
/// can be serialized and kept after the engine is dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LleEmbedding {
  pub(crate) embedding: Array2<f64>,
  pub(crate) eigenvalues: Array1<f64>,
  pub(crate) graph_components: usize,
  pub(crate) config: LleConfig,
}

impl LleEmbedding {
  /// View of the embedding, shape (n_samples, n_components). Row i is the
  /// position of sample i.
  pub fn embedding(&self) -> ArrayView2<'_, f64> {
    self.embedding.view()
  }

  /// Consume the result and return the embedding without copying.
  pub fn into_embedding(self) -> Array2<f64> {
    self.embedding
  }

  /// Eigenvalues matching the embedding's columns, ascending.
  pub fn eigenvalues(&self) -> ArrayView1<'_, f64> {
    self.eigenvalues.view()
  }

  /// Residual of the embedding under the reconstruction weights: the sum of
  /// the retained eigenvalues.
  pub fn reconstruction_error(&self) -> f64 {
    self.eigenvalues.sum()
  }

  /// Number of connected components of the neighbor graph. Values above one
  /// mean the embedding treats the components independently.
  pub fn graph_components(&self) -> usize {
    self.graph_components
  }

  /// The configuration used for this result.
  pub fn config(&self) -> &LleConfig {
    &self.config
  }
}
