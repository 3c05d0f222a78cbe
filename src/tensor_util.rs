//! Shape and elementwise helpers shared by distributions.

use std::iter::repeat;

use rayon::prelude::*;
use rten_shape_inference::resolve_shape;
use rten_tensor::prelude::*;
use rten_tensor::{Tensor, TensorView};
use smallvec::SmallVec;

use crate::errors::DistributionError;

/// Minimum number of output elements for which elementwise evaluation is
/// split across threads.
const PARALLEL_THRESHOLD: usize = 16 * 1024;

/// Reshape `tensor` to `shape`, which may contain a single `-1` entry whose
/// size is inferred from the number of elements.
pub fn reshape_to(mut tensor: Tensor, shape: &[i64]) -> Result<Tensor, DistributionError> {
    let Some(dims) = resolve_shape(tensor.len(), shape) else {
        return Err(DistributionError::ReshapeFailed {
            from: tensor.shape().to_vec(),
            to: shape.to_vec(),
        });
    };
    if tensor.shape() != dims.as_slice() {
        log::trace!("reshape {:?} -> {:?}", tensor.shape(), dims);
        tensor.reshape(&dims);
    }
    Ok(tensor)
}

/// Convert a tensor shape to the signed form accepted by [`reshape_to`].
pub fn to_signed(shape: &[usize]) -> impl Iterator<Item = i64> + '_ {
    shape.iter().map(|&d| d as i64)
}

/// Given the shapes of two inputs to a binary operation, return the shape
/// that will result from broadcasting them following NumPy rules or `None`
/// if the shapes are not compatible.
///
/// Broadcasting works by left-padding the input shapes with 1s so they are
/// the same length, then matching dimensions starting from the right. For
/// each dimension, the values are compatible if they are the same or one of
/// them is 1. The larger of the two values is the size of that dimension in
/// the output shape.
///
/// See https://numpy.org/doc/stable/user/basics.broadcasting.html#general-broadcasting-rules
pub fn broadcast_shapes(a: &[usize], b: &[usize]) -> Option<SmallVec<[usize; 4]>> {
    let a_pad = b.len().saturating_sub(a.len());
    let b_pad = a.len().saturating_sub(b.len());

    let a_iter = a.iter().copied().rev().chain(repeat(1).take(a_pad));
    let b_iter = b.iter().copied().rev().chain(repeat(1).take(b_pad));

    let mut result = SmallVec::with_capacity(a.len().max(b.len()));
    for (a, b) in a_iter.zip(b_iter) {
        if a == b {
            result.push(a);
        } else if a == 1 {
            result.push(b);
        } else if b == 1 {
            result.push(a);
        } else {
            return None;
        }
    }
    result.reverse();

    Some(result)
}

/// Return the shape that results from broadcasting all of `shapes` together.
pub fn broadcast_all<'a>(
    shapes: impl IntoIterator<Item = &'a [usize]>,
) -> Option<SmallVec<[usize; 4]>> {
    shapes
        .into_iter()
        .try_fold(SmallVec::new(), |acc, shape| broadcast_shapes(&acc, shape))
}

/// Broadcast `inputs` against each other and apply `f` to each group of
/// corresponding elements.
///
/// `context` describes the inputs in the error returned if they cannot be
/// broadcast.
pub fn map_broadcast<const N: usize, F>(
    inputs: [TensorView; N],
    context: &'static str,
    f: F,
) -> Result<Tensor, DistributionError>
where
    F: Fn([f32; N]) -> f32 + Sync,
{
    let out_shape = broadcast_all(inputs.iter().map(|x| x.shape()))
        .ok_or(DistributionError::IncompatibleParamShapes(context))?;

    let columns: Vec<Vec<f32>> = inputs
        .iter()
        .map(|x| x.broadcast(out_shape.as_slice()).to_vec())
        .collect();
    let len: usize = out_shape.iter().product();
    let element = |i: usize| f(std::array::from_fn(|k| columns[k][i]));

    let data: Vec<f32> = if len >= PARALLEL_THRESHOLD {
        (0..len).into_par_iter().map(element).collect()
    } else {
        (0..len).map(element).collect()
    };
    Ok(Tensor::from_data(out_shape.as_slice(), data))
}

/// Sum over the last `ndim` dims of `x`.
pub fn sum_inner(x: TensorView, ndim: usize) -> Tensor {
    let split = x.ndim().saturating_sub(ndim);
    let (outer, inner) = x.shape().split_at(split);
    let inner_len: usize = inner.iter().product();

    let data: Vec<f32> = if inner_len == 0 {
        vec![0.; outer.iter().product()]
    } else {
        x.to_vec()
            .chunks(inner_len)
            .map(|chunk| chunk.iter().sum())
            .collect()
    };
    Tensor::from_data(outer, data)
}
