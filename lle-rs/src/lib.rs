//! Parallel Rust implementation of Locally Linear Embedding.
//!
//! LLE maps high-dimensional points to a low-dimensional embedding that keeps
//! each point's reconstruction from its nearest neighbors. The pipeline builds a
//! k-nearest-neighbor graph, solves regularized reconstruction weights for every
//! point in parallel, assembles the sparse cost operator `(I − W)(I − W)ᵀ` and
//! takes its bottom eigenvectors as the embedding.
//!
//! # Example
//!
//! ```ignore
//! use lle_rs::{Lle, LleConfig};
//!
//! let config = LleConfig {
//!     n_components: 2,
//!     ..Default::default()
//! };
//! let mut lle = Lle::new(data, config)?;
//! let fitted = lle.compute()?;
//!
//! let embedding = fitted.embedding();
//! println!("reconstruction error: {}", fitted.reconstruction_error());
//! ```
//!
//! # Features
//!
//! - **Parallel weights**: per-point solves fanned out over a bounded worker pool,
//!   merged deterministically
//! - **Sparse eigensolver**: Lanczos with full reorthogonalization, dense fallback
//! - **Pluggable capabilities**: custom neighbor search via [`NeighborSearch`] and
//!   custom eigensolvers via [`EigenSolver`]
//! - **Typed errors**: every failure is an [`LleError`], nothing panics on bad input
//!
//! # Cargo features
//!
//! - `kdtree` (default): kd-tree backed accelerated neighbor search
//!
//! # Limitations
//!
//! - Dense input only
//! - Fit only (no out-of-sample projection)
//! - Lanczos resolves repeated eigenvalues only approximately; use
//!   [`EigenMethod::Dense`] for small or highly symmetric inputs

// Public modules
pub mod config;
pub mod eigensolver;
pub mod error;
pub mod search;

// Public re-exports (primary API)
pub use config::EigenMethod;
pub use config::EigenParams;
pub use config::LleConfig;
pub use config::NeighborParams;
pub use config::NeighborStrategy;
pub use config::WeightParams;
pub use eigensolver::EigenSolver;
pub use embedding::Fallback;
pub use embedding::Lle;
pub use embedding::LleEmbedding;
pub use embedding::LleState;
pub use error::LleError;
pub use error::Result;
pub use search::NeighborSearch;

// Built-in capabilities
pub use knn::brute_force::BruteForceSearch;
#[cfg(feature = "kdtree")]
pub use knn::kdtree::KdTreeSearch;
pub use spectral::dense::DenseSolver;
pub use spectral::lanczos::LanczosSolver;

// Pipeline stages (for advanced users)
pub use lle::build_cost_operator::build_cost_operator;
pub use lle::solve_weights::solve_weights;

// Internal modules (not exposed)
mod distances;
mod embedding;
mod knn;
mod lle;
mod spectral;
