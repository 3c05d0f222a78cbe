use std::borrow::Cow;
use std::f64::consts::{E, PI};

use fastrand_contrib::RngExt;
use rten_shape_inference::StaticShape;
use rten_tensor::prelude::*;
use rten_tensor::{Tensor, TensorView};

use super::{broadcast_shape, check_param, sample_elementwise, static_broadcast_shape};
use crate::distribution::{Distribution, ReparameterizationType};
use crate::errors::DistributionError;
use crate::options::DistributionOptions;
use crate::param::Param;
use crate::tensor_util::{map_broadcast, sum_inner};

const PARAMS: &str = "loc, scale_diag";

/// A batch of multivariate normal distributions with diagonal covariance.
///
/// The last dimension of the broadcast parameter shape is the event
/// dimension. The preceding dimensions form the batch shape.
#[derive(Clone, Debug)]
pub struct MultivariateNormalDiag {
    loc: Param<f32>,
    scale_diag: Param<f32>,
    validate_args: bool,
    allow_nan_stats: bool,
    name: String,
}

impl MultivariateNormalDiag {
    pub fn new(
        loc: impl Into<Param<f32>>,
        scale_diag: impl Into<Param<f32>>,
    ) -> Result<Self, DistributionError> {
        Self::with_options(loc, scale_diag, &DistributionOptions::default())
    }

    /// Create a batch of distributions with mean `loc` and standard
    /// deviations `scale_diag`.
    pub fn with_options(
        loc: impl Into<Param<f32>>,
        scale_diag: impl Into<Param<f32>>,
        opts: &DistributionOptions,
    ) -> Result<Self, DistributionError> {
        let mvn = MultivariateNormalDiag {
            loc: loc.into(),
            scale_diag: scale_diag.into(),
            validate_args: opts.validate_args,
            allow_nan_stats: opts.allow_nan_stats,
            name: opts
                .name
                .clone()
                .unwrap_or_else(|| "MultivariateNormalDiag".to_string()),
        };
        let shape = static_broadcast_shape(&[&mvn.loc, &mvn.scale_diag], PARAMS)?;
        if shape.rank() == Some(0) {
            return Err(DistributionError::InvalidParameter(
                "Parameters must have at least one dimension.",
            ));
        }
        mvn.check_params(true)?;
        Ok(mvn)
    }

    pub fn loc(&self) -> &Param<f32> {
        &self.loc
    }

    pub fn scale_diag(&self) -> &Param<f32> {
        &self.scale_diag
    }

    fn check_params(&self, is_init: bool) -> Result<(), DistributionError> {
        check_param(
            &self.scale_diag,
            self.validate_args,
            is_init,
            |x| x > 0.,
            "Argument `scale_diag` must be positive.",
        )
    }

    fn params(&self) -> Result<(Cow<'_, Tensor>, Cow<'_, Tensor>), DistributionError> {
        self.check_params(false)?;
        Ok((self.loc.value(), self.scale_diag.value()))
    }

    /// Return the broadcast parameter shape, `batch_shape + event_shape`.
    fn param_shape(&self) -> Result<Vec<usize>, DistributionError> {
        let (loc, scale) = self.params()?;
        let shape = broadcast_shape(&[&*loc, &*scale], PARAMS)?;
        if shape.is_empty() {
            return Err(DistributionError::InvalidParameter(
                "Parameters must have at least one dimension.",
            ));
        }
        Ok(shape)
    }
}

/// Split a static shape into its leading dims and last dim.
fn split_last(shape: &StaticShape) -> (StaticShape, StaticShape) {
    match shape.dims() {
        Some(dims) if !dims.is_empty() => {
            let (batch, event) = dims.split_at(dims.len() - 1);
            (
                StaticShape::from_dims(batch.to_vec()),
                StaticShape::from_dims(event.to_vec()),
            )
        }
        _ => (StaticShape::Unknown, StaticShape::unknown_dims(1)),
    }
}

impl Distribution for MultivariateNormalDiag {
    fn name(&self) -> &str {
        &self.name
    }

    fn reparameterization_type(&self) -> ReparameterizationType {
        ReparameterizationType::FullyReparameterized
    }

    fn validate_args(&self) -> bool {
        self.validate_args
    }

    fn allow_nan_stats(&self) -> bool {
        self.allow_nan_stats
    }

    fn batch_shape(&self) -> StaticShape {
        static_broadcast_shape(&[&self.loc, &self.scale_diag], PARAMS)
            .map(|shape| split_last(&shape).0)
            .unwrap_or(StaticShape::Unknown)
    }

    fn batch_shape_tensor(&self) -> Result<Vec<usize>, DistributionError> {
        let mut shape = self.param_shape()?;
        shape.pop();
        Ok(shape)
    }

    fn event_shape(&self) -> StaticShape {
        static_broadcast_shape(&[&self.loc, &self.scale_diag], PARAMS)
            .map(|shape| split_last(&shape).1)
            .unwrap_or(StaticShape::unknown_dims(1))
    }

    fn event_shape_tensor(&self) -> Result<Vec<usize>, DistributionError> {
        let shape = self.param_shape()?;
        Ok(shape[shape.len() - 1..].to_vec())
    }

    fn sample_n(&self, n: usize, rng: &mut fastrand::Rng) -> Result<Tensor, DistributionError> {
        let shape = self.param_shape()?;
        let (loc, scale) = self.params()?;
        Ok(sample_elementwise(n, &shape, [&*loc, &*scale], |[loc, scale]| {
            rng.f32_normal(loc, scale)
        }))
    }

    fn log_prob(&self, x: TensorView) -> Result<Tensor, DistributionError> {
        let (loc, scale) = self.params()?;
        let log_norm = 0.5 * (2. * PI).ln();
        let terms = map_broadcast([x, loc.view(), scale.view()], PARAMS, |[x, loc, scale]| {
            let z = ((x - loc) / scale) as f64;
            (-0.5 * z * z - log_norm - (scale as f64).ln()) as f32
        })?;
        Ok(sum_inner(terms.view(), 1))
    }

    fn mean(&self) -> Result<Tensor, DistributionError> {
        let (loc, scale) = self.params()?;
        map_broadcast([loc.view(), scale.view()], PARAMS, |[loc, _]| loc)
    }

    fn mode(&self) -> Result<Tensor, DistributionError> {
        self.mean()
    }

    fn stddev(&self) -> Result<Tensor, DistributionError> {
        let (loc, scale) = self.params()?;
        map_broadcast([loc.view(), scale.view()], PARAMS, |[_, scale]| scale.abs())
    }

    fn variance(&self) -> Result<Tensor, DistributionError> {
        let (loc, scale) = self.params()?;
        map_broadcast([loc.view(), scale.view()], PARAMS, |[_, scale]| {
            scale * scale
        })
    }

    fn covariance(&self) -> Result<Tensor, DistributionError> {
        let variance = self.variance()?;
        let shape = variance.shape();
        let k = shape[shape.len() - 1];

        let mut data = vec![0.; variance.len() * k];
        for (i, &var) in variance.iter().enumerate() {
            let (batch, j) = (i / k, i % k);
            data[batch * k * k + j * k + j] = var;
        }

        let out_shape: Vec<usize> = shape.iter().copied().chain([k]).collect();
        Ok(Tensor::from_data(&out_shape, data))
    }

    fn entropy(&self) -> Result<Tensor, DistributionError> {
        let (loc, scale) = self.params()?;
        let log_norm = 0.5 * (2. * PI * E).ln();
        let terms = map_broadcast([loc.view(), scale.view()], PARAMS, |[_, scale]| {
            (log_norm + (scale.abs() as f64).ln()) as f32
        })?;
        Ok(sum_inner(terms.view(), 1))
    }
}

#[cfg(test)]
mod tests {
    use rten_shape_inference::StaticShape;
    use rten_tensor::Tensor;
    use rten_tensor::prelude::*;
    use rten_testing::{expect_all_close, expect_all_close_with_tolerance, sample_moments};

    use super::MultivariateNormalDiag;
    use crate::distribution::Distribution;
    use crate::distributions::Normal;
    use crate::errors::DistributionError;
    use crate::param::Variable;
    use crate::tensor_util::sum_inner;

    fn mvn(batch: usize, k: usize) -> MultivariateNormalDiag {
        let len = batch * k;
        let loc: Vec<f32> = (0..len).map(|x| x as f32 * 0.5).collect();
        let scale: Vec<f32> = (0..len).map(|x| 1. + x as f32 * 0.25).collect();
        MultivariateNormalDiag::new(
            Tensor::from_data(&[batch, k], loc),
            Tensor::from_data(&[batch, k], scale),
        )
        .unwrap()
    }

    #[test]
    fn test_shapes() {
        let dist = mvn(6, 2);
        assert_eq!(dist.batch_shape(), StaticShape::from([6]));
        assert_eq!(dist.event_shape(), StaticShape::from([2]));
        assert_eq!(dist.batch_shape_tensor().unwrap(), [6]);
        assert_eq!(dist.event_shape_tensor().unwrap(), [2]);
        assert_eq!(dist.is_scalar_event(), Some(false));

        let dist = MultivariateNormalDiag::new(
            Variable::with_dynamic_shape(Tensor::<f32>::zeros(&[3, 4])),
            Tensor::full(&[4], 1.0f32),
        )
        .unwrap();
        assert_eq!(dist.batch_shape(), StaticShape::Unknown);
        assert_eq!(dist.event_shape(), StaticShape::unknown_dims(1));
        assert_eq!(dist.batch_shape_tensor().unwrap(), [3]);
        assert_eq!(dist.event_shape_tensor().unwrap(), [4]);

        let err =
            MultivariateNormalDiag::new(Tensor::from_scalar(0.0f32), Tensor::from_scalar(1.0f32))
                .err();
        assert!(matches!(err, Some(DistributionError::InvalidParameter(_))));
    }

    #[test]
    fn test_log_prob_is_sum_of_normals() {
        let dist = mvn(3, 2);
        let normal = Normal::new(dist.loc().clone(), dist.scale_diag().clone()).unwrap();

        let x = Tensor::from_data(&[4, 3, 2], (0..24).map(|x| x as f32 * 0.1).collect::<Vec<_>>());
        let log_prob = dist.log_prob(x.view()).unwrap();
        assert_eq!(log_prob.shape(), [4, 3]);

        let expected = sum_inner(normal.log_prob(x.view()).unwrap().view(), 1);
        expect_all_close(log_prob.view(), expected.view()).unwrap();
    }

    #[test]
    fn test_moments() {
        let dist = mvn(2, 3);
        assert_eq!(dist.mean().unwrap().shape(), [2, 3]);
        assert_eq!(dist.stddev().unwrap().to_vec(), dist.scale_diag().value().to_vec());

        let covariance = dist.covariance().unwrap();
        assert_eq!(covariance.shape(), [2, 3, 3]);
        let variance = dist.variance().unwrap().to_vec();
        for b in 0..2 {
            for i in 0..3 {
                for j in 0..3 {
                    let expected = if i == j { variance[b * 3 + i] } else { 0. };
                    assert_eq!(covariance.get([b, i, j]).copied(), Some(expected));
                }
            }
        }

        let entropy = dist.entropy().unwrap();
        assert_eq!(entropy.shape(), [2]);
        let normal = Normal::new(dist.loc().clone(), dist.scale_diag().clone()).unwrap();
        let expected = sum_inner(normal.entropy().unwrap().view(), 1);
        expect_all_close(entropy.view(), expected.view()).unwrap();
    }

    #[test]
    fn test_cdf_not_implemented() {
        let dist = mvn(1, 2);
        let x = Tensor::<f32>::zeros(&[1, 2]);
        assert_eq!(
            dist.cdf(x.view()).err(),
            Some(DistributionError::NotImplemented {
                op: "cdf",
                distribution: "MultivariateNormalDiag".into(),
            })
        );
    }

    #[test]
    fn test_sample() {
        let dist = mvn(2, 2);
        let mut rng = fastrand::Rng::with_seed(4321);
        let samples = dist.sample(&[20_000], &mut rng).unwrap();
        assert_eq!(samples.shape(), [20_000, 2, 2]);

        let moments = sample_moments(samples.view(), 1);
        expect_all_close_with_tolerance(
            moments.mean.view(),
            dist.mean().unwrap().view(),
            0.05,
            0.,
        )
        .unwrap();
        expect_all_close_with_tolerance(
            moments.variance.view(),
            dist.variance().unwrap().view(),
            0.,
            0.05,
        )
        .unwrap();
    }
}
