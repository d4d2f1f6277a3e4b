use crate::eigensolver::EigenSolver;
use crate::error::LleError;
use crate::error::Result;
use crate::spectral::gershgorin_bound;
use ndarray::Array1;
use ndarray::Array2;
use ndarray::s;
use sprs::CsMat;
use std::time::Instant;
use tracing::debug;
use tracing::info;
use typed_builder::TypedBuilder;

/// Negative eigenvalues within this fraction of the spectral bound are noise.
const NEGATIVE_EIGENVALUE_TOLERANCE: f64 = 1e-12;

/*
  Extract the embedding from the bottom of the cost operator's spectrum.

  The n_components + 1 smallest eigenpairs are requested. The smallest one
  belongs to the constant vector (a pure translation of the embedding) and is
  dropped; the remaining eigenvectors become the embedding's columns.

  Eigenvalues are returned in ascending order. M is positive semi-definite, so
  values down to -1e-12 times its Gershgorin bound are rounding noise and are
  clamped at zero; anything more negative is rejected. Each column
  is negated if needed so its largest-magnitude entry is positive; the sign of
  an eigenvector is otherwise arbitrary.

  Parameters
  ----------
  cost: sparse matrix of shape (n_samples, n_samples)
      Symmetric PSD cost operator.

  n_components: int
      Output dimensionality d.

  solver: EigenSolver
      Strategy computing the bottom eigenpairs.

  Returns
  -------
  embedding: array of shape (n_samples, n_components)

  eigenvalues: array of shape (n_components,)
*/
#[derive(TypedBuilder, Debug)]
pub struct ExtractEmbedding<'a> {
  cost: &'a CsMat<f64>,
  n_components: usize,
  solver: &'a dyn EigenSolver,
}

impl<'a> ExtractEmbedding<'a> {
  pub fn exec(self) -> Result<(Array2<f64>, Array1<f64>)> {
    let ExtractEmbedding {
      cost,
      n_components,
      solver,
    } = self;

    let n_samples = cost.rows();
    let count = n_components + 1;
    if count > n_samples {
      return Err(LleError::InvalidInput(format!(
        "cannot extract {n_components} components from {n_samples} samples"
      )));
    }

    let started = Instant::now();
    let (values, vectors) = solver.smallest_eigenpairs(cost, count)?;
    if values.len() != count || vectors.shape() != [n_samples, count] {
      return Err(LleError::InvalidInput(format!(
        "eigensolver {} returned {} values and vectors of shape {:?}, expected {count} and [{n_samples}, {count}]",
        solver.name(),
        values.len(),
        vectors.shape()
      )));
    }

    // Ascending, whatever order the solver used
    let mut order: Vec<usize> = (0..count).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
    debug!(trivial = values[order[0]], "dropping trivial eigenpair");

    let floor = -NEGATIVE_EIGENVALUE_TOLERANCE * gershgorin_bound(cost);
    if let Some(&bad) = values.iter().find(|&&v| !(v >= floor)) {
      return Err(LleError::InvalidInput(format!(
        "eigensolver {} returned eigenvalue {bad:e} for a positive semi-definite operator (floor {floor:e})",
        solver.name()
      )));
    }

    let kept = &order[1..];
    let eigenvalues: Array1<f64> = kept.iter().map(|&i| values[i].max(0.0)).collect();
    let mut embedding = Array2::<f64>::zeros((n_samples, n_components));
    for (c, &i) in kept.iter().enumerate() {
      let column = vectors.slice(s![.., i]);
      let pivot = column
        .iter()
        .copied()
        .fold(0.0f64, |acc, v| if v.abs() > acc.abs() { v } else { acc });
      let sign = if pivot < 0.0 { -1.0 } else { 1.0 };
      embedding
        .column_mut(c)
        .zip_mut_with(&column, |out, &v| *out = sign * v);
    }

    info!(
      duration_ms = started.elapsed().as_millis(),
      solver = solver.name(),
      n_components,
      "embedding extraction complete"
    );
    Ok((embedding, eigenvalues))
  }
}

#[cfg(test)]
mod tests {
  use super::ExtractEmbedding;
  use crate::eigensolver::EigenSolver;
  use crate::error::LleError;
  use crate::error::Result;
  use crate::spectral::dense::DenseSolver;
  use crate::spectral::lanczos::LanczosSolver;
  use approx::assert_abs_diff_eq;
  use ndarray::Array1;
  use ndarray::Array2;
  use sprs::CsMat;
  use sprs::TriMat;

  /// Returns fixed eigenvalues with orthonormal coordinate vectors.
  #[derive(Debug)]
  struct FixedSolver(Vec<f64>);

  impl EigenSolver for FixedSolver {
    fn name(&self) -> &'static str {
      "fixed"
    }

    fn smallest_eigenpairs(
      &self,
      matrix: &CsMat<f64>,
      count: usize,
    ) -> Result<(Array1<f64>, Array2<f64>)> {
      let mut vectors = Array2::zeros((matrix.rows(), count));
      for c in 0..count {
        vectors[(c, c)] = 1.0;
      }
      Ok((Array1::from(self.0.clone()), vectors))
    }
  }

  /// 4x4 identity: Gershgorin bound 1.
  fn identity_cost() -> CsMat<f64> {
    CsMat::eye(4)
  }

  fn extract(solver: &dyn EigenSolver) -> Result<(Array2<f64>, Array1<f64>)> {
    let cost = identity_cost();
    ExtractEmbedding::builder()
      .cost(&cost)
      .n_components(2)
      .solver(solver)
      .build()
      .exec()
  }

  #[test]
  fn rounding_noise_is_clamped() {
    let (_, eigenvalues) = extract(&FixedSolver(vec![-1e-15, -1e-14, 0.5])).unwrap();
    assert_eq!(eigenvalues[0], 0.0);
    assert_eq!(eigenvalues[1], 0.5);
  }

  #[test]
  fn materially_negative_eigenvalue_is_rejected() {
    let err = extract(&FixedSolver(vec![0.0, -1e-6, 0.5])).unwrap_err();
    assert!(matches!(err, LleError::InvalidInput(ref msg) if msg.contains("fixed")));

    let err = extract(&FixedSolver(vec![-0.25, 0.1, 0.5])).unwrap_err();
    assert!(matches!(err, LleError::InvalidInput(_)));
  }

  #[test]
  fn drops_trivial_pair_and_sorts() {
    // Path-graph Laplacian: eigenvalues 2 − 2cos(πj/n), all simple
    let n = 12;
    let mut tri = TriMat::new((n, n));
    for i in 0..n {
      let degree = if i == 0 || i == n - 1 { 1.0 } else { 2.0 };
      tri.add_triplet(i, i, degree);
      if i + 1 < n {
        tri.add_triplet(i, i + 1, -1.0);
        tri.add_triplet(i + 1, i, -1.0);
      }
    }
    let cost = tri.to_csr::<usize>();

    let lanczos = LanczosSolver::default();
    for solver in [&DenseSolver as &dyn crate::EigenSolver, &lanczos] {
      let (embedding, eigenvalues) = ExtractEmbedding::builder()
        .cost(&cost)
        .n_components(2)
        .solver(solver)
        .build()
        .exec()
        .unwrap();

      assert_eq!(embedding.shape(), &[n, 2]);
      for j in 0..2 {
        let expected = 2.0 - 2.0 * (std::f64::consts::PI * (j + 1) as f64 / n as f64).cos();
        assert_abs_diff_eq!(eigenvalues[j], expected, epsilon = 1e-8);
      }
      // The Fiedler vector of a path changes sign end to end
      let first = embedding.column(0);
      assert!(first[0] * first[n - 1] < 0.0);
      assert!(eigenvalues.iter().all(|&v| v >= 0.0));
    }
  }
}
