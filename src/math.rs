use super::*;

/// Index of the largest element. On exact ties the first occurrence wins.
pub(crate) fn argmax<D>(x: &ArrayView<f64, D>) -> usize
where
  D: Dimension,
{
  x.iter()
    .enumerate()
    .fold((0, f64::NEG_INFINITY), |(best, max), (index, &value)| {
      if value > max {
        (index, value)
      } else {
        (best, max)
      }
    })
    .0
}

pub(crate) fn relu(x: f32) -> f32 {
  x.max(0.0)
}

/// Softmax with the maximum subtracted before exponentiating.
pub(crate) fn softmax(x: ArrayView1<f64>) -> Array1<f64> {
  let max = x.fold(f64::NEG_INFINITY, |max, &value| max.max(value));

  let exp = x.mapv(|value| (value - max).exp());

  let sum = exp.sum();

  exp / sum
}
