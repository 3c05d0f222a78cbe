use rten_tensor::prelude::*;
use rten_tensor::{Tensor, TensorView};

/// Mean and variance of samples, computed over the leading sample dims.
#[derive(Debug)]
pub struct SampleMoments {
    pub mean: Tensor,
    pub variance: Tensor,
}

/// Compute the mean and (biased) variance of `samples` over its first
/// `sample_ndims` dimensions.
///
/// This is used to check that samples drawn from a distribution are
/// consistent with its analytic moments. The result has the shape of
/// `samples` with the leading `sample_ndims` dims removed.
///
/// Panics if `samples` has fewer than `sample_ndims` dims or if there are no
/// samples.
pub fn sample_moments(samples: TensorView, sample_ndims: usize) -> SampleMoments {
    assert!(samples.ndim() >= sample_ndims, "too few sample dims");
    let out_shape = &samples.shape()[sample_ndims..];
    let n_samples: usize = samples.shape()[..sample_ndims].iter().product();
    assert!(n_samples > 0, "no samples");

    let out_len: usize = out_shape.iter().product();
    let data = samples.to_vec();

    let mut sum = vec![0f64; out_len];
    let mut sum_sq = vec![0f64; out_len];
    for sample in data.chunks(out_len.max(1)) {
        for (i, &x) in sample.iter().enumerate() {
            sum[i] += x as f64;
            sum_sq[i] += (x as f64) * (x as f64);
        }
    }

    let n = n_samples as f64;
    let mean: Vec<f32> = sum.iter().map(|s| (s / n) as f32).collect();
    let variance: Vec<f32> = sum
        .iter()
        .zip(&sum_sq)
        .map(|(s, sq)| {
            let m = s / n;
            (sq / n - m * m).max(0.) as f32
        })
        .collect();

    SampleMoments {
        mean: Tensor::from_data(out_shape, mean),
        variance: Tensor::from_data(out_shape, variance),
    }
}

/// Return true if all elements are finite.
pub fn all_finite(x: TensorView) -> bool {
    x.iter().all(|x| x.is_finite())
}

/// Return true if all elements are NaN.
pub fn all_nan(x: TensorView) -> bool {
    x.iter().all(|x| x.is_nan())
}
