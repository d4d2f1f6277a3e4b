use thiserror::Error;

/// Result type alias using [`LleError`].
pub type Result<T> = std::result::Result<T, LleError>;

/// Errors surfaced by the LLE engine.
///
/// Configuration problems are reported before any worker is spawned. Every
/// other failure aborts the whole `compute` call; no partial embedding is
/// ever returned.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LleError {
  /// Bad `n_components`, `n_neighbors`, worker count or solver budget.
  #[error("invalid configuration: {0}")]
  InvalidConfiguration(String),

  /// Malformed or undersized dataset, or a malformed neighbor graph.
  #[error("invalid input: {0}")]
  InvalidInput(String),

  /// The local least-squares system of a point could not be solved, even
  /// after regularization (e.g. the point coincides with all its neighbors).
  #[error("singular reconstruction system at point {point}")]
  SingularSystem {
    /// Index of the point whose weights could not be solved.
    point: usize,
  },

  /// The iterative eigensolver exhausted its iteration budget.
  #[error(
    "eigensolver did not converge after {iterations} iterations ({converged} of {requested} eigenpairs converged)"
  )]
  EigenNotConverged {
    /// Lanczos steps performed.
    iterations: usize,
    /// Eigenpairs that met the tolerance.
    converged: usize,
    /// Eigenpairs requested.
    requested: usize,
  },

  /// The worker pool for the weight phase could not be created.
  #[error("failed to build worker pool: {0}")]
  ThreadPool(String),
}
