use crate::error::LleError;
use crate::error::Result;
use nalgebra::DMatrix;
use nalgebra::DVector;
use ndarray::Array1;
use ndarray::ArrayView1;
use ndarray::ArrayView2;

/*
  Solve the reconstruction weights of a single point.

  The rows of G are the difference vectors (neighbor - point). The local Gram
  matrix C = G Gᵀ is regularized by adding regularization * trace(C) to its
  diagonal, then C w = 1 is solved by LU with partial pivoting and w is
  rescaled so that its entries sum to one.

  Parameters
  ----------
  data: array of shape (n_samples, n_features)
      The full dataset.

  point: int
      Index of the point being reconstructed.

  neighbors: array of shape (k,)
      Indices of the point's neighbors.

  regularization: float
      Diagonal perturbation, relative to trace(C).

  Returns
  -------
  weights: array of shape (k,)
      weights[a] is the coefficient of neighbors[a]; the entries sum to one.

  Errors
  ------
  SingularSystem when the regularized system cannot be solved. Because the
  perturbation scales with trace(C), a point that coincides with all of its
  neighbors (C = 0) stays singular for every regularization value.
*/
pub fn solve_weights(
  data: ArrayView2<f32>,
  point: usize,
  neighbors: ArrayView1<u32>,
  regularization: f64,
) -> Result<Array1<f64>> {
  let k = neighbors.len();
  let n_features = data.ncols();
  let x = data.row(point);

  let diffs = DMatrix::<f64>::from_fn(k, n_features, |a, f| {
    data[(neighbors[a] as usize, f)] as f64 - x[f] as f64
  });
  let mut gram = &diffs * diffs.transpose();

  let shift = regularization * gram.trace();
  for a in 0..k {
    gram[(a, a)] += shift;
  }

  let ones = DVector::<f64>::from_element(k, 1.0);
  let w = gram
    .lu()
    .solve(&ones)
    .ok_or(LleError::SingularSystem { point })?;

  let sum = w.sum();
  if !sum.is_finite() || sum == 0.0 || w.iter().any(|v| !v.is_finite()) {
    return Err(LleError::SingularSystem { point });
  }

  Ok(w.iter().map(|&v| v / sum).collect())
}

#[cfg(test)]
mod tests {
  use super::solve_weights;
  use crate::error::LleError;
  use approx::assert_abs_diff_eq;
  use approx::assert_relative_eq;
  use ndarray::Array2;
  use ndarray::array;

  #[test]
  fn midpoint_gets_equal_weights() {
    let data = array![[0.0f32, 0.0], [-1.0, 0.0], [1.0, 0.0]];
    let w = solve_weights(data.view(), 0, array![1u32, 2].view(), 1e-3).unwrap();
    assert_abs_diff_eq!(w[0], 0.5, epsilon = 1e-9);
    assert_abs_diff_eq!(w[1], 0.5, epsilon = 1e-9);
  }

  #[test]
  fn weights_sum_to_one_for_any_regularization() {
    let data = array![
      [0.0f32, 0.0, 0.0],
      [1.0, 0.2, 0.0],
      [0.1, 1.0, 0.3],
      [-0.7, 0.4, 1.0],
      [0.3, -0.9, 0.5],
      [-0.2, -0.1, -1.2],
    ];
    let neighbors = array![1u32, 2, 3, 4, 5];
    // k = 5 > D = 3 makes the unregularized Gram matrix rank deficient
    for r in [1e-6, 1e-3, 0.1, 10.0] {
      let w = solve_weights(data.view(), 0, neighbors.view(), r).unwrap();
      assert_eq!(w.len(), 5);
      assert_relative_eq!(w.sum(), 1.0, epsilon = 1e-6);
    }
  }

  #[test]
  fn reconstructs_point_inside_convex_hull() {
    let data = array![[0.25f32, 0.25], [0.0, 0.0], [1.0, 0.0], [0.0, 1.0]];
    // Exact reconstruction makes C singular; a tiny shift recovers the
    // barycentric coordinates (0.5, 0.25, 0.25).
    let w = solve_weights(data.view(), 0, array![1u32, 2, 3].view(), 1e-9).unwrap();
    assert_abs_diff_eq!(w[0], 0.5, epsilon = 1e-6);
    assert_abs_diff_eq!(w[1], 0.25, epsilon = 1e-6);
    assert_abs_diff_eq!(w[2], 0.25, epsilon = 1e-6);
  }

  #[test]
  fn coincident_neighbors_are_singular_at_any_regularization() {
    let data = Array2::<f32>::from_elem((4, 2), 3.5);
    for r in [0.0, 1e-3, 100.0] {
      let err = solve_weights(data.view(), 2, array![0u32, 1, 3].view(), r).unwrap_err();
      assert_eq!(err, LleError::SingularSystem { point: 2 });
    }
  }
}
