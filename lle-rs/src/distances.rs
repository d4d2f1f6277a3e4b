use ndarray::ArrayView1;

/// Squared Euclidean distance (rdist), accumulated in f64.
///
/// The dataset is stored as f32 but neighbor ranking and weight solving need
/// the extra precision once many small differences are summed.
#[inline(always)]
pub fn rdist(x: &ArrayView1<f32>, y: &ArrayView1<f32>) -> f64 {
  x.iter()
    .zip(y.iter())
    .map(|(&a, &b)| {
      let diff = a as f64 - b as f64;
      diff * diff
    })
    .sum()
}

#[cfg(test)]
mod tests {
  use super::rdist;
  use approx::assert_relative_eq;
  use ndarray::array;

  #[test]
  fn rdist_matches_squared_norm() {
    let a = array![0.0f32, 3.0, 1.0];
    let b = array![4.0f32, 0.0, 1.0];
    assert_relative_eq!(rdist(&a.view(), &b.view()), 25.0);
    assert_eq!(rdist(&a.view(), &a.view()), 0.0);
  }
}
