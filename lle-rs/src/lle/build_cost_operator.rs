use sprs::CsMat;
use sprs::TriMat;
use std::time::Instant;
use tracing::info;

/*
  Build the LLE cost operator from a column-wise weight matrix.

  Column i of W holds the weights reconstructing point i, so the
  reconstruction error of an embedding Y is ‖(I − Wᵀ) Y‖², whose quadratic
  form is M = (I − W)(I − W)ᵀ. Writing a_i for column i of (I − W),

      M = Σ_i a_i a_iᵀ

  and each a_i has at most k + 1 nonzeros (1 at i, −w at the neighbors), so
  M is assembled from (k + 1)² triplets per point without densifying.

  Parameters
  ----------
  weights: sparse matrix of shape (n_samples, n_samples), CSC
      Reconstruction weights, one column per point.

  Returns
  -------
  cost: sparse matrix of shape (n_samples, n_samples), CSR
      Symmetric positive semi-definite cost operator.
*/
pub fn build_cost_operator(weights: &CsMat<f64>) -> CsMat<f64> {
  let started = Instant::now();
  let n_samples = weights.rows();
  let weights = weights.to_csc();

  let mut tri = TriMat::new((n_samples, n_samples));
  let mut column: Vec<(usize, f64)> = Vec::new();
  for (i, w) in weights.outer_iterator().enumerate() {
    column.clear();
    column.push((i, 1.0));
    for (j, &v) in w.iter() {
      if j == i {
        column[0].1 -= v;
      } else {
        column.push((j, -v));
      }
    }
    for &(p, ap) in &column {
      for &(q, aq) in &column {
        tri.add_triplet(p, q, ap * aq);
      }
    }
  }

  let cost = tri.to_csr::<usize>();
  info!(
    duration_ms = started.elapsed().as_millis(),
    nnz = cost.nnz(),
    "cost operator complete"
  );
  cost
}

#[cfg(test)]
mod tests {
  use super::build_cost_operator;
  use approx::assert_abs_diff_eq;
  use sprs::CsMat;

  #[test]
  fn matches_dense_product() {
    // Three points on a triangle, each reconstructed from the other two
    let weights = CsMat::new_csc(
      (3, 3),
      vec![0, 2, 4, 6],
      vec![1, 2, 0, 2, 0, 1],
      vec![0.25, 0.75, 0.5, 0.5, 0.6, 0.4],
    );
    let cost = build_cost_operator(&weights);

    // Dense (I − W)(I − W)ᵀ
    let mut a = [[0.0f64; 3]; 3];
    for (i, row) in a.iter_mut().enumerate() {
      row[i] = 1.0;
    }
    for (&v, (r, c)) in weights.iter() {
      a[r][c] -= v;
    }
    for p in 0..3 {
      for q in 0..3 {
        let expected: f64 = (0..3).map(|i| a[p][i] * a[q][i]).sum();
        let got = cost.get(p, q).copied().unwrap_or(0.0);
        assert_abs_diff_eq!(got, expected, epsilon = 1e-12);
      }
    }
  }

  #[test]
  fn symmetric_with_constant_null_vector() {
    // Columns sum to one, so (I − Wᵀ) 1 = 0 and therefore M 1 = 0
    let weights = CsMat::new_csc(
      (4, 4),
      vec![0, 2, 4, 6, 8],
      vec![1, 3, 0, 2, 1, 3, 0, 2],
      vec![0.5, 0.5, 0.3, 0.7, 0.9, 0.1, 0.5, 0.5],
    );
    let cost = build_cost_operator(&weights);
    for (&v, (r, c)) in cost.iter() {
      let mirrored = cost.get(c, r).copied().unwrap_or(0.0);
      assert_abs_diff_eq!(v, mirrored, epsilon = 1e-14);
    }
    for row in cost.outer_iterator() {
      assert_abs_diff_eq!(row.data().iter().sum::<f64>(), 0.0, epsilon = 1e-12);
    }
  }
}
