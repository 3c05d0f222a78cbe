use rten_shape_inference::{
    Assertion, ExpandedShape, OriginalBatch, ShapeError, StaticShape, StaticTarget,
    TOO_FEW_DIMS, TargetValue, UNEXPECTED_SHAPE, compute_expanded_shape, parameter_assertions,
    run_assertions, validate_construction,
};
use rten_tensor::prelude::*;
use rten_tensor::{Tensor, TensorView};

use crate::distribution::{DataType, Distribution, ReparameterizationType};
use crate::errors::DistributionError;
use crate::options::DistributionOptions;
use crate::param::Param;
use crate::tensor_util::{reshape_to, to_signed};

/// A distribution which reshapes the batch dimensions of another
/// distribution.
///
/// The new batch shape must have the same number of elements as the
/// original. Up to one of its entries may be `-1`, in which case the size of
/// that dimension is inferred from the others. All probability computations
/// are delegated to the wrapped distribution, after reshaping inputs to the
/// original batch shape. Results are reshaped to the new batch shape.
///
/// ```
/// use rten_prob::{BatchReshape, Distribution, DistributionOptions, MultivariateNormalDiag};
/// use rten_tensor::Tensor;
/// use rten_tensor::prelude::*;
///
/// let loc = Tensor::<f32>::zeros(&[6, 2]);
/// let scale = Tensor::full(&[6, 2], 1.0f32);
/// let mvn = MultivariateNormalDiag::new(loc, scale).unwrap();
///
/// let mut opts = DistributionOptions::default();
/// opts.validate_args(true);
/// let reshaped = BatchReshape::with_options(mvn, vec![1, 2, -1], &opts).unwrap();
/// assert_eq!(reshaped.batch_shape().as_known(), Some([1, 2, 3].as_slice()));
///
/// let mut rng = fastrand::Rng::with_seed(1234);
/// let x = reshaped.sample(&[4, 5], &mut rng).unwrap();
/// assert_eq!(x.shape(), [4, 5, 1, 2, 3, 2]);
///
/// let log_prob = reshaped.log_prob(x.view()).unwrap();
/// assert_eq!(log_prob.shape(), [4, 5, 1, 2, 3]);
/// ```
///
/// ## Validation
///
/// Properties of the new batch shape that can be checked without evaluating
/// parameters (its rank, statically known sizes) are checked at
/// construction. Other properties are checked only if `validate_args` is
/// enabled. For a constant batch shape this happens once, at construction.
/// For a batch shape given as a [`Variable`](crate::Variable) it happens on
/// every operation, since the value may be reassigned.
///
/// Inputs to the density methods must have trailing dimensions which exactly
/// match the batch and event shape. Broadcasting is not supported and
/// inputs which would need it are always rejected, regardless of
/// `validate_args`, when this can be determined from static shapes.
#[derive(Clone, Debug)]
pub struct BatchReshape<D: Distribution> {
    distribution: D,
    batch_shape_unexpanded: Param<i32>,
    batch_shape_static: StaticShape,
    validate_args: bool,
    allow_nan_stats: bool,
    name: String,
}

impl<D: Distribution> BatchReshape<D> {
    /// Reshape the batch dimensions of `distribution` to `batch_shape`, using
    /// default options.
    pub fn new(
        distribution: D,
        batch_shape: impl Into<Param<i32>>,
    ) -> Result<Self, DistributionError> {
        Self::with_options(distribution, batch_shape, &DistributionOptions::default())
    }

    /// Reshape the batch dimensions of `distribution` to `batch_shape`.
    ///
    /// The default name is `"BatchReshape"` followed by the name of the
    /// wrapped distribution.
    pub fn with_options(
        distribution: D,
        batch_shape: impl Into<Param<i32>>,
        opts: &DistributionOptions,
    ) -> Result<Self, DistributionError> {
        let batch_shape = batch_shape.into();

        let static_values: Option<Vec<i32>> = batch_shape.static_value().map(|t| t.to_vec());
        let param_shape = batch_shape.static_shape();
        let target = StaticTarget {
            ndim: param_shape.rank(),
            values: static_values.as_deref(),
            len: match param_shape.dims().as_deref() {
                Some([len]) => *len,
                _ => None,
            },
        };

        let original_batch_shape = distribution.batch_shape();
        validate_construction(&original_batch_shape, target)?;

        let batch_shape_static = match (static_values.as_deref(), original_batch_shape.as_known())
        {
            (Some(values), Some(original)) if target.ndim == Some(1) => {
                let expanded = compute_expanded_shape(values, OriginalBatch::Shape(original));
                expanded
                    .to_dims()
                    .filter(|_| expanded.size() == expanded.original_size)
                    .map(StaticShape::Known)
                    .unwrap_or_else(|| target.to_static_shape())
            }
            _ => target.to_static_shape(),
        };

        let name = opts
            .name
            .clone()
            .unwrap_or_else(|| format!("BatchReshape{}", distribution.name()));

        log::debug!(
            "{}: reshaping batch shape {} to {}",
            name,
            original_batch_shape,
            batch_shape_static
        );

        let reshaped = BatchReshape {
            distribution,
            batch_shape_unexpanded: batch_shape,
            batch_shape_static,
            validate_args: opts.validate_args,
            allow_nan_stats: opts.allow_nan_stats,
            name,
        };
        reshaped.check_parameters(&reshaped.batch_shape_unexpanded.value(), true)?;

        Ok(reshaped)
    }

    /// Return the wrapped distribution.
    pub fn distribution(&self) -> &D {
        &self.distribution
    }

    /// Return the new batch shape, as given at construction.
    pub fn batch_shape_param(&self) -> &Param<i32> {
        &self.batch_shape_unexpanded
    }

    /// Return the batch shape of the wrapped distribution, preferring the
    /// static shape if it is fully known.
    fn original_batch_shape(&self) -> Result<Vec<usize>, DistributionError> {
        match self.distribution.batch_shape() {
            StaticShape::Known(shape) => Ok(shape),
            _ => self.distribution.batch_shape_tensor(),
        }
    }

    /// Compute the new batch shape with the `-1` entry, if any, replaced.
    ///
    /// `target` is the value of the new batch shape read at the start of the
    /// current operation.
    fn calculate_new_shape(
        &self,
        target: &Tensor<i32>,
    ) -> Result<ExpandedShape, DistributionError> {
        let original = self.original_batch_shape()?;
        Ok(compute_expanded_shape(
            &target.to_vec(),
            OriginalBatch::Shape(&original),
        ))
    }

    /// Return the expanded batch shape as tensor dimension sizes.
    ///
    /// Outputs are always reshaped to this rather than to `target`, since a
    /// `-1` in `target` can't be inferred from an empty tensor.
    fn expanded_batch_shape(
        &self,
        target: &Tensor<i32>,
    ) -> Result<Vec<usize>, DistributionError> {
        let expanded = self.calculate_new_shape(target)?;
        if let Some(dims) = expanded.to_dims() {
            return Ok(dims);
        }

        // Sizes can only be negative if the target contains entries < -1.
        let (index, &size) = expanded
            .shape
            .iter()
            .enumerate()
            .find(|&(_, &size)| size < 0)
            .unwrap_or((0, &-1));
        Err(ShapeError::InvalidDim {
            index,
            size: size as i32,
        }
        .into())
    }

    /// Return the deferred checks on the new batch shape.
    ///
    /// `is_init` is true when called during construction.
    fn parameter_assertions(
        &self,
        target: &Tensor<i32>,
        is_init: bool,
    ) -> Result<Vec<Assertion>, DistributionError> {
        if !self.validate_args {
            return Ok(Vec::new());
        }
        let values = target.to_vec();
        let original = self.original_batch_shape()?;
        Ok(parameter_assertions(
            TargetValue {
                shape: target.shape(),
                values: &values,
            },
            OriginalBatch::Shape(&original),
            self.validate_args,
            is_init,
            self.batch_shape_unexpanded.is_ref(),
        ))
    }

    fn check_parameters(
        &self,
        target: &Tensor<i32>,
        is_init: bool,
    ) -> Result<(), DistributionError> {
        let assertions = self.parameter_assertions(target, is_init)?;
        run_checks(&self.name, &assertions)
    }

    /// Split the dimensions of `x` into sample dims and batch and event dims,
    /// returning the sample shape.
    ///
    /// The second value is the sample shape again if it could be determined
    /// from the static batch and event ranks, or `None` otherwise.
    fn sample_shape(
        &self,
        target: &Tensor<i32>,
        x: &TensorView,
    ) -> Result<(Vec<usize>, Option<Vec<usize>>), DistributionError> {
        let static_event_ndims = self.event_shape().rank();
        let static_batch_ndims = self.batch_shape_static.rank();

        let event_ndims = match static_event_ndims {
            Some(ndim) => ndim,
            None => self.distribution.event_shape_tensor()?.len(),
        };
        let batch_ndims = match static_batch_ndims {
            Some(ndim) => ndim,
            None => target.len(),
        };

        let Some(sample_ndims) = x.ndim().checked_sub(batch_ndims + event_ndims) else {
            return Err(too_few_dims(batch_ndims + event_ndims, x.ndim()));
        };
        let sample_shape = x.shape()[..sample_ndims].to_vec();
        let static_sample_shape = (static_event_ndims.is_some() && static_batch_ndims.is_some())
            .then(|| sample_shape.clone());

        Ok((sample_shape, static_sample_shape))
    }

    /// Check that `x` is a valid input for the density methods.
    ///
    /// The trailing dimensions of `x` must match the batch and event shape.
    /// Mismatches which can be detected from static shapes are always
    /// reported as [`DistributionError::UnsupportedBroadcast`]. Other
    /// mismatches are only detected if `validate_args` is enabled. They are
    /// reported as [`DistributionError::AssertionFailed`].
    pub fn sample_control_dependencies(&self, x: TensorView) -> Result<(), DistributionError> {
        let target = self.batch_shape_unexpanded.value();
        self.check_sample_shape(&target, &x)
    }

    fn check_sample_shape(
        &self,
        target: &Tensor<i32>,
        x: &TensorView,
    ) -> Result<(), DistributionError> {
        let x_ndims = x.ndim();
        let event_shape = self.event_shape();
        let static_expected_ndims = self
            .batch_shape_static
            .rank()
            .zip(event_shape.rank())
            .map(|(batch, event)| batch + event);

        let mut assertions = Vec::new();
        match static_expected_ndims {
            Some(expected) if x_ndims < expected => {
                return Err(too_few_dims(expected, x_ndims));
            }
            Some(_) => {}
            None if self.validate_args => {
                let expected = target.len() + self.distribution.event_shape_tensor()?.len();
                assertions.push(Assertion::RankAtLeast {
                    ndim: x_ndims,
                    min: expected,
                    message: TOO_FEW_DIMS,
                });
            }
            None => {}
        }

        let static_expected_shape = self
            .batch_shape_static
            .concatenate(&event_shape)
            .as_known()
            .map(|shape| shape.to_vec());

        match (static_expected_shape, static_expected_ndims) {
            (Some(expected), Some(expected_ndims)) => {
                let actual = &x.shape()[x_ndims.saturating_sub(expected_ndims)..];
                if actual != expected.as_slice() {
                    return Err(DistributionError::UnsupportedBroadcast(format!(
                        "Broadcasting is not supported; unexpected batch and event shape (expected {:?}, saw {:?}).",
                        expected, actual
                    )));
                }
            }
            _ if self.validate_args => {
                let mut expected = self.expanded_batch_shape(target)?;
                expected.extend(self.distribution.event_shape_tensor()?);
                let sample_ndims = x_ndims.saturating_sub(expected.len());
                assertions.push(Assertion::ShapeEqual {
                    actual: x.shape()[sample_ndims..].to_vec(),
                    expected,
                    message: UNEXPECTED_SHAPE,
                });
            }
            _ => {}
        }

        run_checks(&self.name, &assertions)
    }

    /// Evaluate a density method of the wrapped distribution on `x`.
    fn call_reshape_input_output<F>(
        &self,
        op: F,
        x: TensorView,
    ) -> Result<Tensor, DistributionError>
    where
        F: FnOnce(&D, TensorView) -> Result<Tensor, DistributionError>,
    {
        let target = self.batch_shape_unexpanded.value();
        self.check_parameters(&target, false)?;
        self.check_sample_shape(&target, &x)?;

        let (sample_shape, static_sample_shape) = self.sample_shape(&target, &x)?;

        let old_shape: Vec<i64> = to_signed(&sample_shape)
            .chain(to_signed(&self.distribution.batch_shape_tensor()?))
            .chain(to_signed(&self.distribution.event_shape_tensor()?))
            .collect();
        let x_reshaped = reshape_to(x.to_tensor(), &old_shape)?;

        let result = op(&self.distribution, x_reshaped.view())?;

        let new_shape: Vec<i64> = to_signed(&sample_shape)
            .chain(to_signed(&self.expanded_batch_shape(&target)?))
            .collect();
        let result = reshape_to(result, &new_shape)?;

        match (static_sample_shape, self.batch_shape_static.rank()) {
            (Some(static_sample_shape), Some(_)) => check_static_shape(
                result,
                &StaticShape::Known(static_sample_shape).concatenate(&self.batch_shape_static),
            ),
            _ => Ok(result),
        }
    }

    /// Evaluate a statistic of the wrapped distribution and reshape it to
    /// `batch_shape + event_shapes[0] + event_shapes[1] ...`.
    fn call_and_reshape_output<F>(
        &self,
        op: F,
        event_shapes: &[Vec<usize>],
        static_event_shapes: &[StaticShape],
    ) -> Result<Tensor, DistributionError>
    where
        F: FnOnce(&D) -> Result<Tensor, DistributionError>,
    {
        let target = self.batch_shape_unexpanded.value();
        self.check_parameters(&target, false)?;

        let new_shape: Vec<i64> = to_signed(&self.expanded_batch_shape(&target)?)
            .chain(event_shapes.iter().flat_map(|shape| to_signed(shape)))
            .collect();
        let result = reshape_to(op(&self.distribution)?, &new_shape)?;

        if self.batch_shape_static.rank().is_some() && self.event_shape().rank().is_some() {
            let static_shape = static_event_shapes
                .iter()
                .fold(self.batch_shape_static.clone(), |shape, event_shape| {
                    shape.concatenate(event_shape)
                });
            check_static_shape(result, &static_shape)
        } else {
            Ok(result)
        }
    }

    /// Evaluate a statistic with shape `batch_shape + event_shape`.
    fn call_and_reshape_event_output<F>(&self, op: F) -> Result<Tensor, DistributionError>
    where
        F: FnOnce(&D) -> Result<Tensor, DistributionError>,
    {
        let event_shape = self.distribution.event_shape_tensor()?;
        self.call_and_reshape_output(op, &[event_shape], &[self.event_shape()])
    }
}

fn too_few_dims(expected: usize, actual: usize) -> DistributionError {
    DistributionError::UnsupportedBroadcast(format!(
        "Broadcasting is not supported; too few batch and event dims (expected at least {}, saw {}).",
        expected, actual
    ))
}

fn run_checks(name: &str, assertions: &[Assertion]) -> Result<(), DistributionError> {
    run_assertions(assertions).map_err(|err| {
        log::debug!("{}: validation failed: {}", name, err);
        err.into()
    })
}

fn check_static_shape(result: Tensor, expected: &StaticShape) -> Result<Tensor, DistributionError> {
    if !expected.is_compatible_with(result.shape()) {
        return Err(DistributionError::IncompatibleShape {
            expected: expected.clone(),
            actual: result.shape().to_vec(),
        });
    }
    Ok(result)
}

impl<D: Distribution> Distribution for BatchReshape<D> {
    fn name(&self) -> &str {
        &self.name
    }

    fn dtype(&self) -> DataType {
        self.distribution.dtype()
    }

    fn reparameterization_type(&self) -> ReparameterizationType {
        self.distribution.reparameterization_type()
    }

    fn validate_args(&self) -> bool {
        self.validate_args
    }

    fn allow_nan_stats(&self) -> bool {
        self.allow_nan_stats
    }

    fn batch_shape(&self) -> StaticShape {
        self.batch_shape_static.clone()
    }

    fn batch_shape_tensor(&self) -> Result<Vec<usize>, DistributionError> {
        let target = self.batch_shape_unexpanded.value();
        self.check_parameters(&target, false)?;
        self.expanded_batch_shape(&target)
    }

    fn event_shape(&self) -> StaticShape {
        self.distribution.event_shape()
    }

    fn event_shape_tensor(&self) -> Result<Vec<usize>, DistributionError> {
        self.check_parameters(&self.batch_shape_unexpanded.value(), false)?;
        self.distribution.event_shape_tensor()
    }

    fn sample_n(&self, n: usize, rng: &mut fastrand::Rng) -> Result<Tensor, DistributionError> {
        let target = self.batch_shape_unexpanded.value();
        self.check_parameters(&target, false)?;
        let samples = self.distribution.sample_n(n, rng)?;
        let new_shape: Vec<i64> = [n as i64]
            .into_iter()
            .chain(to_signed(&self.expanded_batch_shape(&target)?))
            .chain(to_signed(&self.distribution.event_shape_tensor()?))
            .collect();
        reshape_to(samples, &new_shape)
    }

    fn log_prob(&self, x: TensorView) -> Result<Tensor, DistributionError> {
        self.call_reshape_input_output(|d, x| d.log_prob(x), x)
    }

    fn prob(&self, x: TensorView) -> Result<Tensor, DistributionError> {
        self.call_reshape_input_output(|d, x| d.prob(x), x)
    }

    fn log_cdf(&self, x: TensorView) -> Result<Tensor, DistributionError> {
        self.call_reshape_input_output(|d, x| d.log_cdf(x), x)
    }

    fn cdf(&self, x: TensorView) -> Result<Tensor, DistributionError> {
        self.call_reshape_input_output(|d, x| d.cdf(x), x)
    }

    fn log_survival_function(&self, x: TensorView) -> Result<Tensor, DistributionError> {
        self.call_reshape_input_output(|d, x| d.log_survival_function(x), x)
    }

    fn survival_function(&self, x: TensorView) -> Result<Tensor, DistributionError> {
        self.call_reshape_input_output(|d, x| d.survival_function(x), x)
    }

    fn mean(&self) -> Result<Tensor, DistributionError> {
        self.call_and_reshape_event_output(|d| d.mean())
    }

    fn mode(&self) -> Result<Tensor, DistributionError> {
        self.call_and_reshape_event_output(|d| d.mode())
    }

    fn stddev(&self) -> Result<Tensor, DistributionError> {
        self.call_and_reshape_event_output(|d| d.stddev())
    }

    fn variance(&self) -> Result<Tensor, DistributionError> {
        self.call_and_reshape_event_output(|d| d.variance())
    }

    fn entropy(&self) -> Result<Tensor, DistributionError> {
        self.call_and_reshape_output(|d| d.entropy(), &[], &[StaticShape::scalar()])
    }

    fn covariance(&self) -> Result<Tensor, DistributionError> {
        let event_shape = self.distribution.event_shape_tensor()?;
        let static_event_shape = self.event_shape();
        self.call_and_reshape_output(
            |d| d.covariance(),
            &[event_shape.clone(), event_shape],
            &[static_event_shape.clone(), static_event_shape],
        )
    }
}

#[cfg(test)]
mod tests {
    use rten_shape_inference::{
        AssertionError, SIZE_MISMATCH, ShapeError, StaticShape, TOO_FEW_DIMS,
        TOO_MANY_UNKNOWN_DIMS, UNEXPECTED_SHAPE,
    };
    use rten_tensor::Tensor;
    use rten_tensor::prelude::*;
    use rten_testing::{TestCases, expect_all_close};

    use super::BatchReshape;
    use crate::distribution::{Distribution, ReparameterizationType};
    use crate::distributions::{MultivariateNormalDiag, Normal};
    use crate::errors::DistributionError;
    use crate::options::DistributionOptions;
    use crate::param::{Param, Variable};

    fn validating() -> DistributionOptions {
        let mut opts = DistributionOptions::new();
        opts.validate_args(true);
        opts
    }

    fn range(shape: &[usize], scale: f32) -> Tensor {
        let len: usize = shape.iter().product();
        Tensor::from_data(shape, (0..len).map(|x| x as f32 * scale).collect::<Vec<_>>())
    }

    /// Batch of 6 normal distributions.
    fn normal_6() -> Normal {
        Normal::new(range(&[6], 1.), range(&[6], 0.5).map(|x| x + 1.)).unwrap()
    }

    /// Batch of 6 bivariate normal distributions.
    fn mvn_6x2() -> MultivariateNormalDiag {
        MultivariateNormalDiag::new(range(&[6, 2], 0.25), range(&[6, 2], 0.1).map(|x| x + 0.5))
            .unwrap()
    }

    #[test]
    fn test_static_batch_shape() {
        #[derive(Debug)]
        struct Case {
            target: Param<i32>,
            expected: StaticShape,
        }

        let cases = [
            Case {
                target: vec![1, 2, -1].into(),
                expected: StaticShape::from([1, 2, 3]),
            },
            Case {
                target: vec![3, 2].into(),
                expected: StaticShape::from([3, 2]),
            },
            Case {
                target: Variable::new(Tensor::from_data(&[2], vec![2, 3])).into(),
                expected: StaticShape::unknown_dims(2),
            },
            Case {
                target: Variable::with_dynamic_shape(Tensor::from_data(&[2], vec![2, 3])).into(),
                expected: StaticShape::Unknown,
            },
        ];

        cases.test_each_value(|case| {
            let dist = BatchReshape::new(normal_6(), case.target).unwrap();
            assert_eq!(dist.batch_shape(), case.expected);
            assert_eq!(dist.batch_shape_tensor().unwrap().iter().product::<usize>(), 6);
        })
    }

    #[test]
    fn test_construction_errors() {
        #[derive(Debug)]
        struct Case {
            target: Param<i32>,
            expected: DistributionError,
        }

        let cases = [
            Case {
                target: Tensor::from_data(&[1, 2], vec![2, 3]).into(),
                expected: ShapeError::NotVector { ndim: 2 }.into(),
            },
            Case {
                target: Param::scalar(6),
                expected: ShapeError::NotVector { ndim: 0 }.into(),
            },
            Case {
                target: vec![2, 4].into(),
                expected: ShapeError::SizeMismatch {
                    target_size: 8,
                    original_size: 6,
                }
                .into(),
            },
            Case {
                target: vec![-1, 0].into(),
                expected: ShapeError::InvalidDim { index: 1, size: 0 }.into(),
            },
            Case {
                target: vec![-2, -3].into(),
                expected: ShapeError::InvalidDim { index: 0, size: -2 }.into(),
            },
        ];

        cases.test_each_value(|case| {
            // Static checks happen even if validation is disabled.
            let result = BatchReshape::with_options(
                normal_6(),
                case.target,
                &DistributionOptions::new(),
            );
            assert_eq!(result.err(), Some(case.expected));
        })
    }

    #[test]
    fn test_multiple_unknown_dims() {
        let result = BatchReshape::with_options(normal_6(), vec![-1, -1], &validating());
        let Err(DistributionError::AssertionFailed(AssertionError { message, .. })) = result
        else {
            panic!("expected assertion failure");
        };
        assert_eq!(message, TOO_MANY_UNKNOWN_DIMS);

        // Without validation the target is accepted, and the placeholder
        // size is computed as if there were a single `-1`.
        let dist =
            BatchReshape::with_options(normal_6(), vec![-1, -1], &DistributionOptions::new())
                .unwrap();
        assert_eq!(dist.batch_shape_tensor().unwrap(), [6, 6]);
    }

    #[test]
    fn test_variable_batch_shape_revalidated() {
        let target = Variable::new(Tensor::from_data(&[2], vec![2, 3]));
        let dist = BatchReshape::with_options(normal_6(), &target, &validating()).unwrap();
        let x = range(&[2, 3], 1.);
        assert_eq!(dist.log_prob(x.view()).unwrap().shape(), [2, 3]);

        target
            .assign(Tensor::from_data(&[2], vec![3, -1]))
            .unwrap();
        assert_eq!(dist.batch_shape_tensor().unwrap(), [3, 2]);

        target
            .assign(Tensor::from_data(&[2], vec![4, -1]))
            .unwrap();
        for result in [
            dist.batch_shape_tensor().err(),
            dist.mean().err(),
            dist.log_prob(range(&[3, 2], 1.).view()).err(),
        ] {
            let Some(DistributionError::AssertionFailed(err)) = result else {
                panic!("expected assertion failure");
            };
            assert_eq!(err.message, SIZE_MISMATCH);
        }
    }

    #[test]
    fn test_variable_batch_shape_unvalidated() {
        let target = Variable::new(Tensor::from_data(&[2], vec![2, 3]));
        let dist = BatchReshape::with_options(normal_6(), &target, &DistributionOptions::new())
            .unwrap();
        target
            .assign(Tensor::from_data(&[2], vec![4, 2]))
            .unwrap();

        // Without validation the shapes are used as-is, and the mismatch is
        // only detected when the reshape fails.
        assert_eq!(dist.batch_shape_tensor().unwrap(), [4, 2]);
        assert!(matches!(
            dist.mean(),
            Err(DistributionError::ReshapeFailed { .. })
        ));
    }

    #[test]
    fn test_sample_and_log_prob() {
        let dist = BatchReshape::with_options(mvn_6x2(), vec![1, 2, -1], &validating()).unwrap();
        assert_eq!(dist.batch_shape(), StaticShape::from([1, 2, 3]));
        assert_eq!(dist.batch_shape_tensor().unwrap(), [1, 2, 3]);
        assert_eq!(dist.event_shape(), StaticShape::from([2]));
        assert_eq!(dist.event_shape_tensor().unwrap(), [2]);

        let mut rng = fastrand::Rng::with_seed(1234);
        let x = dist.sample(&[4, 5], &mut rng).unwrap();
        assert_eq!(x.shape(), [4, 5, 1, 2, 3, 2]);

        let log_prob = dist.log_prob(x.view()).unwrap();
        assert_eq!(log_prob.shape(), [4, 5, 1, 2, 3]);

        // Evaluating the wrapped distribution on the same values in the
        // original layout gives the same result.
        let mut x_orig = x.clone();
        x_orig.reshape(&[4, 5, 6, 2]);
        let mut expected = dist.distribution().log_prob(x_orig.view()).unwrap();
        expected.reshape(&[4, 5, 1, 2, 3]);
        expect_all_close(log_prob.view(), expected.view()).unwrap();

        let prob = dist.prob(x.view()).unwrap();
        expect_all_close(prob.view(), log_prob.map(|x| x.exp()).view()).unwrap();
    }

    #[test]
    fn test_empty_sample_shape() {
        #[derive(Debug)]
        struct Case {
            target: Param<i32>,
        }

        let cases = [
            Case {
                target: vec![1, 2, -1].into(),
            },
            Case {
                target: Variable::new(Tensor::from_data(&[3], vec![1, 2, -1])).into(),
            },
        ];

        cases.test_each_value(|case| {
            // The `-1` entry is inferred from the original batch size, not
            // from the size of the output.
            let dist = BatchReshape::with_options(mvn_6x2(), case.target, &validating()).unwrap();
            let mut rng = fastrand::Rng::with_seed(1234);

            let samples = dist.sample_n(0, &mut rng).unwrap();
            assert_eq!(samples.shape(), [0, 1, 2, 3, 2]);

            let samples = dist.sample(&[0, 5], &mut rng).unwrap();
            assert_eq!(samples.shape(), [0, 5, 1, 2, 3, 2]);

            let x = Tensor::<f32>::zeros(&[0, 1, 2, 3, 2]);
            assert_eq!(dist.log_prob(x.view()).unwrap().shape(), [0, 1, 2, 3]);
            assert_eq!(dist.prob(x.view()).unwrap().shape(), [0, 1, 2, 3]);
        })
    }

    #[test]
    fn test_empty_batch() {
        let empty = Tensor::<f32>::zeros(&[0]);
        let normal = Normal::new(empty.clone(), empty.map(|x| x + 1.)).unwrap();
        let dist = BatchReshape::with_options(normal, vec![-1, 2], &validating()).unwrap();
        assert_eq!(dist.batch_shape(), StaticShape::from([0, 2]));
        assert_eq!(dist.batch_shape_tensor().unwrap(), [0, 2]);

        let mut rng = fastrand::Rng::with_seed(1234);
        assert_eq!(dist.sample_n(3, &mut rng).unwrap().shape(), [3, 0, 2]);
        assert_eq!(dist.mean().unwrap().shape(), [0, 2]);

        let x = Tensor::<f32>::zeros(&[4, 0, 2]);
        assert_eq!(dist.log_prob(x.view()).unwrap().shape(), [4, 0, 2]);
    }

    #[test]
    fn test_sample_n() {
        let dist = BatchReshape::new(normal_6(), vec![3, 2]).unwrap();
        let mut rng = fastrand::Rng::with_seed(5678);
        let samples = dist.sample_n(7, &mut rng).unwrap();
        assert_eq!(samples.shape(), [7, 3, 2]);

        // Sampling is delegated, so the same seed gives the same values.
        let mut rng = fastrand::Rng::with_seed(5678);
        let expected = dist.distribution().sample_n(7, &mut rng).unwrap();
        assert_eq!(samples.to_vec(), expected.to_vec());
    }

    #[test]
    fn test_density_methods() {
        let dist = BatchReshape::new(normal_6(), vec![2, 3]).unwrap();
        let x = range(&[4, 2, 3], 0.3);
        let mut x_orig = x.clone();
        x_orig.reshape(&[4, 6]);
        let inner = dist.distribution();

        let cases: [(&str, Tensor, Tensor); 6] = [
            (
                "log_prob",
                dist.log_prob(x.view()).unwrap(),
                inner.log_prob(x_orig.view()).unwrap(),
            ),
            (
                "prob",
                dist.prob(x.view()).unwrap(),
                inner.prob(x_orig.view()).unwrap(),
            ),
            (
                "cdf",
                dist.cdf(x.view()).unwrap(),
                inner.cdf(x_orig.view()).unwrap(),
            ),
            (
                "log_cdf",
                dist.log_cdf(x.view()).unwrap(),
                inner.log_cdf(x_orig.view()).unwrap(),
            ),
            (
                "survival_function",
                dist.survival_function(x.view()).unwrap(),
                inner.survival_function(x_orig.view()).unwrap(),
            ),
            (
                "log_survival_function",
                dist.log_survival_function(x.view()).unwrap(),
                inner.log_survival_function(x_orig.view()).unwrap(),
            ),
        ];

        for (op, actual, expected) in cases {
            assert_eq!(actual.shape(), [4, 2, 3], "{}", op);
            assert_eq!(actual.to_vec(), expected.to_vec(), "{}", op);
        }
    }

    #[test]
    fn test_moments() {
        let dist = BatchReshape::new(mvn_6x2(), vec![2, -1]).unwrap();
        let inner = dist.distribution();

        for (op, actual, expected) in [
            ("mean", dist.mean().unwrap(), inner.mean().unwrap()),
            ("mode", dist.mode().unwrap(), inner.mode().unwrap()),
            ("stddev", dist.stddev().unwrap(), inner.stddev().unwrap()),
            ("variance", dist.variance().unwrap(), inner.variance().unwrap()),
        ] {
            assert_eq!(actual.shape(), [2, 3, 2], "{}", op);
            assert_eq!(actual.to_vec(), expected.to_vec(), "{}", op);
        }

        let entropy = dist.entropy().unwrap();
        assert_eq!(entropy.shape(), [2, 3]);
        assert_eq!(entropy.to_vec(), inner.entropy().unwrap().to_vec());

        let covariance = dist.covariance().unwrap();
        assert_eq!(covariance.shape(), [2, 3, 2, 2]);
        assert_eq!(covariance.to_vec(), inner.covariance().unwrap().to_vec());
    }

    #[test]
    fn test_not_implemented_passes_through() {
        let dist = BatchReshape::new(mvn_6x2(), vec![6]).unwrap();
        let x = range(&[6, 2], 0.1);
        assert!(matches!(
            dist.cdf(x.view()),
            Err(DistributionError::NotImplemented { op: "cdf", .. })
        ));
    }

    #[test]
    fn test_broadcasting_rejected() {
        #[derive(Debug)]
        struct Case<'a> {
            x_shape: &'a [usize],
            expected: &'a str,
        }

        let cases = [
            Case {
                x_shape: &[3, 2],
                expected: "Broadcasting is not supported; too few batch and event dims (expected at least 3, saw 2).",
            },
            Case {
                x_shape: &[4, 2, 3, 1],
                expected: "Broadcasting is not supported; unexpected batch and event shape (expected [2, 3, 2], saw [2, 3, 1]).",
            },
        ];

        cases.test_each(|case| {
            // Static shape mismatches are fatal even without validation.
            let dist =
                BatchReshape::with_options(mvn_6x2(), vec![2, 3], &DistributionOptions::new())
                    .unwrap();
            let x = Tensor::<f32>::zeros(case.x_shape);
            assert_eq!(
                dist.log_prob(x.view()).err(),
                Some(DistributionError::UnsupportedBroadcast(
                    case.expected.to_string()
                ))
            );
        })
    }

    #[test]
    fn test_broadcasting_rejected_dynamic() {
        // With a target whose rank is not known statically, mismatches are
        // detected by deferred checks.
        let target = Variable::with_dynamic_shape(Tensor::from_data(&[2], vec![2, 3]));
        let dist = BatchReshape::with_options(mvn_6x2(), &target, &validating()).unwrap();
        assert_eq!(dist.batch_shape(), StaticShape::Unknown);

        let err = dist.log_prob(Tensor::<f32>::zeros(&[3, 2]).view()).err();
        let Some(DistributionError::AssertionFailed(err)) = err else {
            panic!("expected assertion failure");
        };
        assert_eq!(err.message, TOO_FEW_DIMS);

        let err = dist.log_prob(Tensor::<f32>::zeros(&[3, 2, 2]).view()).err();
        let Some(DistributionError::AssertionFailed(err)) = err else {
            panic!("expected assertion failure");
        };
        assert_eq!(err.message, UNEXPECTED_SHAPE);

        let log_prob = dist.log_prob(Tensor::<f32>::zeros(&[5, 2, 3, 2]).view()).unwrap();
        assert_eq!(log_prob.shape(), [5, 2, 3]);

        // Without validation, an under-rank input is still rejected when the
        // sample dims are computed.
        let dist =
            BatchReshape::with_options(mvn_6x2(), &target, &DistributionOptions::new()).unwrap();
        assert!(matches!(
            dist.log_prob(Tensor::<f32>::zeros(&[3, 2]).view()),
            Err(DistributionError::UnsupportedBroadcast(_))
        ));
    }

    #[test]
    fn test_properties() {
        let dist = BatchReshape::new(normal_6(), vec![2, 3]).unwrap();
        assert_eq!(dist.name(), "BatchReshapeNormal");
        assert_eq!(
            dist.reparameterization_type(),
            ReparameterizationType::FullyReparameterized
        );
        assert_eq!(dist.is_scalar_batch(), Some(false));
        assert_eq!(dist.is_scalar_event(), Some(true));

        let mut opts = DistributionOptions::new();
        opts.name("reshaped").allow_nan_stats(false);
        let dist = BatchReshape::with_options(normal_6(), vec![6], &opts).unwrap();
        assert_eq!(dist.name(), "reshaped");
        assert!(!dist.allow_nan_stats());
        assert!(!dist.validate_args());
    }

    #[test]
    fn test_wraps_reference() {
        let normal = normal_6();
        let dist = BatchReshape::new(&normal, vec![3, 2]).unwrap();
        assert_eq!(dist.mean().unwrap().shape(), [3, 2]);

        // Reshaping can be nested.
        let nested = BatchReshape::new(dist, vec![6]).unwrap();
        assert_eq!(nested.name(), "BatchReshapeBatchReshapeNormal");
        assert_eq!(nested.mean().unwrap().to_vec(), normal.mean().unwrap().to_vec());
    }
}
