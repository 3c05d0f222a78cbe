//! Concrete distributions.

use rten_shape_inference::{StaticShape, should_check_parameter};
use rten_tensor::prelude::*;
use rten_tensor::{Tensor, TensorView};

use crate::errors::DistributionError;
use crate::param::Param;
use crate::tensor_util::broadcast_all;

mod gamma;
mod mvn_diag;
mod negative_binomial;
mod normal;

pub use gamma::Gamma;
pub use mvn_diag::MultivariateNormalDiag;
pub use negative_binomial::NegativeBinomial;
pub use normal::Normal;

/// Return the static shape that results from broadcasting the static shapes
/// of `params`.
fn static_broadcast_shape(
    params: &[&Param<f32>],
    context: &'static str,
) -> Result<StaticShape, DistributionError> {
    params
        .iter()
        .try_fold(StaticShape::scalar(), |shape, param| {
            shape.broadcast(&param.static_shape())
        })
        .ok_or(DistributionError::IncompatibleParamShapes(context))
}

/// Return the shape that results from broadcasting `values` together.
fn broadcast_shape(
    values: &[&Tensor],
    context: &'static str,
) -> Result<Vec<usize>, DistributionError> {
    broadcast_all(values.iter().map(|v| v.shape()))
        .map(|shape| shape.to_vec())
        .ok_or(DistributionError::IncompatibleParamShapes(context))
}

/// Check that every element of `param` satisfies `valid`.
///
/// Like the batch shape checks of [`BatchReshape`](crate::BatchReshape),
/// constant parameters are checked once at construction and variables on
/// every use, and only if `validate_args` is enabled.
fn check_param(
    param: &Param<f32>,
    validate_args: bool,
    is_init: bool,
    valid: impl Fn(f32) -> bool,
    message: &'static str,
) -> Result<(), DistributionError> {
    if !should_check_parameter(validate_args, is_init, param.is_ref()) {
        return Ok(());
    }
    if param.value().iter().all(|&x| valid(x)) {
        Ok(())
    } else {
        log::debug!("parameter check failed: {}", message);
        Err(DistributionError::InvalidParameter(message))
    }
}

/// Check that every element of a sample passed to a density method satisfies
/// `valid`, if `validate_args` is enabled.
fn check_sample(
    x: &TensorView,
    validate_args: bool,
    valid: impl Fn(f32) -> bool,
    message: &'static str,
) -> Result<(), DistributionError> {
    if validate_args && !x.iter().all(|&x| valid(x)) {
        return Err(DistributionError::InvalidParameter(message));
    }
    Ok(())
}

/// Draw `n` samples for each element of a batch of parameters which have
/// been broadcast to `shape`.
fn sample_elementwise<const N: usize>(
    n: usize,
    shape: &[usize],
    params: [&Tensor; N],
    mut sample: impl FnMut([f32; N]) -> f32,
) -> Tensor {
    let columns: Vec<Vec<f32>> = params.iter().map(|p| p.broadcast(shape).to_vec()).collect();
    let len: usize = shape.iter().product();

    let mut data = Vec::with_capacity(n * len);
    for _ in 0..n {
        for i in 0..len {
            data.push(sample(std::array::from_fn(|k| columns[k][i])));
        }
    }

    let out_shape: Vec<usize> = [n].into_iter().chain(shape.iter().copied()).collect();
    Tensor::from_data(&out_shape, data)
}

/// Replace undefined values of a statistic with NaN, or return an error if
/// `allow_nan_stats` is false and any value is undefined.
fn nan_if_undefined(
    values: Tensor,
    defined: Tensor<bool>,
    allow_nan_stats: bool,
    message: &'static str,
) -> Result<Tensor, DistributionError> {
    if defined.iter().all(|&d| d) {
        return Ok(values);
    }
    if !allow_nan_stats {
        return Err(DistributionError::UndefinedStatistic(message));
    }
    let data: Vec<f32> = values
        .iter()
        .zip(defined.iter())
        .map(|(&x, &d)| if d { x } else { f32::NAN })
        .collect();
    Ok(Tensor::from_data(values.shape(), data))
}
