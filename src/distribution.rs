//! The interface implemented by all distributions.

use std::sync::Arc;

use rten_shape_inference::StaticShape;
use rten_tensor::prelude::*;
use rten_tensor::{Tensor, TensorView};

use crate::errors::DistributionError;
use crate::tensor_util::reshape_to;

/// Enum specifying the element type of a distribution's samples.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum DataType {
    Int32,
    Float,
}

/// Describes how samples depend on a distribution's parameters.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ReparameterizationType {
    /// Samples are a differentiable function of the parameters and a
    /// parameter-free noise source.
    FullyReparameterized,
    NotReparameterized,
}

/// A batch of probability distributions.
///
/// The dimensions of a sample tensor are divided into _sample_ dims, which
/// index independent draws, followed by _batch_ dims, which index
/// independent distributions, followed by _event_ dims, which hold the value
/// of a single draw. For example, a batch of 6 bivariate normal distributions
/// has batch shape `[6]` and event shape `[2]`. Drawing 4 samples from it
/// produces a tensor of shape `[4, 6, 2]`, and evaluating [`log_prob`] on
/// that tensor produces a result of shape `[4, 6]`.
///
/// Implementations must provide the shape queries, [`sample_n`] and
/// [`log_prob`]. Other operations have default implementations which are
/// either derived from related operations (eg. [`prob`] from [`log_prob`]),
/// or return [`DistributionError::NotImplemented`].
///
/// [`log_prob`]: Distribution::log_prob
/// [`prob`]: Distribution::prob
/// [`sample_n`]: Distribution::sample_n
pub trait Distribution {
    /// Return the display name of this distribution.
    fn name(&self) -> &str;

    fn dtype(&self) -> DataType {
        DataType::Float
    }

    fn reparameterization_type(&self) -> ReparameterizationType;

    /// Return true if this distribution checks its arguments.
    fn validate_args(&self) -> bool;

    /// Return true if undefined statistics are reported as NaN rather than
    /// as an error.
    fn allow_nan_stats(&self) -> bool;

    /// Return the batch shape, as far as it is known without evaluating
    /// parameters.
    fn batch_shape(&self) -> StaticShape;

    /// Return the batch shape, evaluating parameters if necessary.
    fn batch_shape_tensor(&self) -> Result<Vec<usize>, DistributionError>;

    /// Return the event shape, as far as it is known without evaluating
    /// parameters.
    fn event_shape(&self) -> StaticShape;

    /// Return the event shape, evaluating parameters if necessary.
    fn event_shape_tensor(&self) -> Result<Vec<usize>, DistributionError>;

    /// Draw `n` samples from each distribution in the batch.
    ///
    /// The result has shape `[n] + batch_shape + event_shape`.
    fn sample_n(&self, n: usize, rng: &mut fastrand::Rng) -> Result<Tensor, DistributionError>;

    /// Return the log of the probability density or mass of `x`.
    ///
    /// `x` has shape `sample_shape + batch_shape + event_shape` and the
    /// result has shape `sample_shape + batch_shape`.
    fn log_prob(&self, x: TensorView) -> Result<Tensor, DistributionError>;

    /// Return the probability density or mass of `x`.
    fn prob(&self, x: TensorView) -> Result<Tensor, DistributionError> {
        Ok(self.log_prob(x)?.map(|x| x.exp()))
    }

    /// Return the log of the cumulative distribution function at `x`.
    fn log_cdf(&self, x: TensorView) -> Result<Tensor, DistributionError> {
        Ok(self.cdf(x)?.map(|x| x.ln()))
    }

    /// Return the cumulative distribution function at `x`.
    fn cdf(&self, _x: TensorView) -> Result<Tensor, DistributionError> {
        Err(DistributionError::not_implemented("cdf", self.name()))
    }

    /// Return the log of the survival function, `1 - cdf(x)`.
    fn log_survival_function(&self, x: TensorView) -> Result<Tensor, DistributionError> {
        Ok(self.survival_function(x)?.map(|x| x.ln()))
    }

    /// Return the survival function, `1 - cdf(x)`.
    fn survival_function(&self, x: TensorView) -> Result<Tensor, DistributionError> {
        Ok(self.cdf(x)?.map(|x| 1. - x))
    }

    /// Return the mean, with shape `batch_shape + event_shape`.
    fn mean(&self) -> Result<Tensor, DistributionError> {
        Err(DistributionError::not_implemented("mean", self.name()))
    }

    /// Return the mode, with shape `batch_shape + event_shape`.
    fn mode(&self) -> Result<Tensor, DistributionError> {
        Err(DistributionError::not_implemented("mode", self.name()))
    }

    /// Return the standard deviation, with shape `batch_shape + event_shape`.
    fn stddev(&self) -> Result<Tensor, DistributionError> {
        Ok(self.variance()?.map(|x| x.sqrt()))
    }

    /// Return the variance, with shape `batch_shape + event_shape`.
    fn variance(&self) -> Result<Tensor, DistributionError> {
        Err(DistributionError::not_implemented("variance", self.name()))
    }

    /// Return the entropy, with shape `batch_shape`.
    fn entropy(&self) -> Result<Tensor, DistributionError> {
        Err(DistributionError::not_implemented("entropy", self.name()))
    }

    /// Return the covariance, with shape `batch_shape + event_shape +
    /// event_shape`.
    fn covariance(&self) -> Result<Tensor, DistributionError> {
        Err(DistributionError::not_implemented("covariance", self.name()))
    }

    /// Draw samples arranged in a tensor with shape `sample_shape`.
    ///
    /// The result has shape `sample_shape + batch_shape + event_shape`.
    fn sample(
        &self,
        sample_shape: &[usize],
        rng: &mut fastrand::Rng,
    ) -> Result<Tensor, DistributionError> {
        let n = sample_shape.iter().product();
        let samples = self.sample_n(n, rng)?;

        let out_shape: Vec<i64> = sample_shape
            .iter()
            .chain(samples.shape().iter().skip(1))
            .map(|&d| d as i64)
            .collect();
        reshape_to(samples, &out_shape)
    }

    /// Return whether the batch shape is `[]`, if known statically.
    fn is_scalar_batch(&self) -> Option<bool> {
        self.batch_shape().rank().map(|ndim| ndim == 0)
    }

    /// Return whether the event shape is `[]`, if known statically.
    fn is_scalar_event(&self) -> Option<bool> {
        self.event_shape().rank().map(|ndim| ndim == 0)
    }
}

macro_rules! impl_distribution_for_ptr {
    ($ptr:ty) => {
        impl<D: Distribution + ?Sized> Distribution for $ptr {
            fn name(&self) -> &str {
                (**self).name()
            }

            fn dtype(&self) -> DataType {
                (**self).dtype()
            }

            fn reparameterization_type(&self) -> ReparameterizationType {
                (**self).reparameterization_type()
            }

            fn validate_args(&self) -> bool {
                (**self).validate_args()
            }

            fn allow_nan_stats(&self) -> bool {
                (**self).allow_nan_stats()
            }

            fn batch_shape(&self) -> StaticShape {
                (**self).batch_shape()
            }

            fn batch_shape_tensor(&self) -> Result<Vec<usize>, DistributionError> {
                (**self).batch_shape_tensor()
            }

            fn event_shape(&self) -> StaticShape {
                (**self).event_shape()
            }

            fn event_shape_tensor(&self) -> Result<Vec<usize>, DistributionError> {
                (**self).event_shape_tensor()
            }

            fn sample_n(
                &self,
                n: usize,
                rng: &mut fastrand::Rng,
            ) -> Result<Tensor, DistributionError> {
                (**self).sample_n(n, rng)
            }

            fn log_prob(&self, x: TensorView) -> Result<Tensor, DistributionError> {
                (**self).log_prob(x)
            }

            fn prob(&self, x: TensorView) -> Result<Tensor, DistributionError> {
                (**self).prob(x)
            }

            fn log_cdf(&self, x: TensorView) -> Result<Tensor, DistributionError> {
                (**self).log_cdf(x)
            }

            fn cdf(&self, x: TensorView) -> Result<Tensor, DistributionError> {
                (**self).cdf(x)
            }

            fn log_survival_function(&self, x: TensorView) -> Result<Tensor, DistributionError> {
                (**self).log_survival_function(x)
            }

            fn survival_function(&self, x: TensorView) -> Result<Tensor, DistributionError> {
                (**self).survival_function(x)
            }

            fn mean(&self) -> Result<Tensor, DistributionError> {
                (**self).mean()
            }

            fn mode(&self) -> Result<Tensor, DistributionError> {
                (**self).mode()
            }

            fn stddev(&self) -> Result<Tensor, DistributionError> {
                (**self).stddev()
            }

            fn variance(&self) -> Result<Tensor, DistributionError> {
                (**self).variance()
            }

            fn entropy(&self) -> Result<Tensor, DistributionError> {
                (**self).entropy()
            }

            fn covariance(&self) -> Result<Tensor, DistributionError> {
                (**self).covariance()
            }

            fn sample(
                &self,
                sample_shape: &[usize],
                rng: &mut fastrand::Rng,
            ) -> Result<Tensor, DistributionError> {
                (**self).sample(sample_shape, rng)
            }
        }
    };
}

impl_distribution_for_ptr!(&D);
impl_distribution_for_ptr!(Box<D>);
impl_distribution_for_ptr!(Arc<D>);
