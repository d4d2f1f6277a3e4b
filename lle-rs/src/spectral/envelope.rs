use crate::error::LleError;
use crate::error::Result;
use ndarray::Array1;
use sprs::CsMat;
use sprs::linalg::reverse_cuthill_mckee;

/*
  Envelope (profile) Cholesky factorization of a sparse symmetric matrix.

  Rows are first reordered with reverse Cuthill-McKee, which keeps the nonzeros
  of a neighbor-graph operator close to the diagonal. Row i of the reordered
  matrix then only stores the columns first[i]..=i, where first[i] is its
  leftmost nonzero below the diagonal. Cholesky fill never leaves this
  envelope, so the factor is computed in place row by row
  (Cholesky-Banachiewicz) and both triangular solves walk the same storage.

  Cost is the sum of squared row widths. For the kNN operator of a manifold
  sampled at a few thousand points this is far below a dense factorization.
*/
#[derive(Debug)]
pub(crate) struct EnvelopeCholesky {
  /// order[new] = original index.
  order: Vec<usize>,
  first: Vec<usize>,
  offsets: Vec<usize>,
  values: Vec<f64>,
}

impl EnvelopeCholesky {
  /// Factor `matrix + shift * I`. Only the lower triangle (as seen after the
  /// reordering) is read, so the matrix must be symmetric.
  ///
  /// # Errors
  ///
  /// `InvalidInput` if a pivot is not positive, i.e. the shifted matrix is not
  /// positive definite.
  pub(crate) fn factor(matrix: &CsMat<f64>, shift: f64) -> Result<Self> {
    let n = matrix.rows();
    if matrix.cols() != n {
      return Err(LleError::InvalidInput(format!(
        "cannot factor a {}x{} matrix",
        matrix.rows(),
        matrix.cols()
      )));
    }

    let mut order: Vec<usize> = reverse_cuthill_mckee(matrix.view()).perm.vec();
    if order.len() != n {
      order = (0..n).collect();
    }
    let mut position = vec![0; n];
    for (new, &old) in order.iter().enumerate() {
      position[old] = new;
    }

    let mut first: Vec<usize> = (0..n).collect();
    for (i, &old) in order.iter().enumerate() {
      if let Some(row) = matrix.outer_view(old) {
        for (c, _) in row.iter() {
          first[i] = first[i].min(position[c]);
        }
      }
    }
    let mut offsets = Vec::with_capacity(n + 1);
    offsets.push(0);
    for i in 0..n {
      offsets.push(offsets[i] + i - first[i] + 1);
    }

    let mut values = vec![0.0; offsets[n]];
    for (i, &old) in order.iter().enumerate() {
      if let Some(row) = matrix.outer_view(old) {
        for (c, &v) in row.iter() {
          let j = position[c];
          if j <= i {
            values[offsets[i] + j - first[i]] += v;
          }
        }
      }
      values[offsets[i + 1] - 1] += shift;
    }

    for i in 0..n {
      let fi = first[i];
      let (done, rest) = values.split_at_mut(offsets[i]);
      let row_i = &mut rest[..i - fi + 1];
      for j in fi..i {
        let fj = first[j];
        let row_j = &done[offsets[j]..offsets[j + 1]];
        let k0 = fi.max(fj);
        let dot: f64 = (k0..j).map(|k| row_i[k - fi] * row_j[k - fj]).sum();
        row_i[j - fi] = (row_i[j - fi] - dot) / row_j[j - fj];
      }
      let sum_sq: f64 = row_i[..i - fi].iter().map(|v| v * v).sum();
      let pivot = row_i[i - fi] - sum_sq;
      if !(pivot > 0.0 && pivot.is_finite()) {
        return Err(LleError::InvalidInput(format!(
          "matrix is not positive definite after a shift of {shift:e} (pivot {pivot:e} at row {})",
          order[i]
        )));
      }
      row_i[i - fi] = pivot.sqrt();
    }

    Ok(Self {
      order,
      first,
      offsets,
      values,
    })
  }

  /// Solve `(matrix + shift * I) x = b`.
  pub(crate) fn solve(&self, b: &Array1<f64>) -> Array1<f64> {
    let n = self.order.len();
    let mut y: Vec<f64> = self.order.iter().map(|&old| b[old]).collect();

    // L y = b
    for i in 0..n {
      let fi = self.first[i];
      let row = &self.values[self.offsets[i]..self.offsets[i + 1]];
      let dot: f64 = (fi..i).map(|k| row[k - fi] * y[k]).sum();
      y[i] = (y[i] - dot) / row[i - fi];
    }
    // Lᵀ x = y, column by column over the stored rows
    for i in (0..n).rev() {
      let fi = self.first[i];
      let row = &self.values[self.offsets[i]..self.offsets[i + 1]];
      y[i] /= row[i - fi];
      let xi = y[i];
      for k in fi..i {
        y[k] -= row[k - fi] * xi;
      }
    }

    let mut x = Array1::zeros(n);
    for (new, &old) in self.order.iter().enumerate() {
      x[old] = y[new];
    }
    x
  }

  /// Number of stored factor entries.
  pub(crate) fn envelope_size(&self) -> usize {
    self.values.len()
  }
}
