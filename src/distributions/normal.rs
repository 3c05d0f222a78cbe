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
use crate::special::{log_ndtr, ndtr};
use crate::tensor_util::map_broadcast;

const PARAMS: &str = "loc, scale";

/// A batch of univariate normal distributions.
#[derive(Clone, Debug)]
pub struct Normal {
    loc: Param<f32>,
    scale: Param<f32>,
    validate_args: bool,
    allow_nan_stats: bool,
    name: String,
}

impl Normal {
    pub fn new(
        loc: impl Into<Param<f32>>,
        scale: impl Into<Param<f32>>,
    ) -> Result<Normal, DistributionError> {
        Self::with_options(loc, scale, &DistributionOptions::default())
    }

    /// Create a batch of normal distributions with mean `loc` and standard
    /// deviation `scale`.
    ///
    /// The batch shape is the broadcast of the parameter shapes.
    pub fn with_options(
        loc: impl Into<Param<f32>>,
        scale: impl Into<Param<f32>>,
        opts: &DistributionOptions,
    ) -> Result<Normal, DistributionError> {
        let normal = Normal {
            loc: loc.into(),
            scale: scale.into(),
            validate_args: opts.validate_args,
            allow_nan_stats: opts.allow_nan_stats,
            name: opts.name.clone().unwrap_or_else(|| "Normal".to_string()),
        };
        static_broadcast_shape(&[&normal.loc, &normal.scale], PARAMS)?;
        normal.check_params(true)?;
        Ok(normal)
    }

    pub fn loc(&self) -> &Param<f32> {
        &self.loc
    }

    pub fn scale(&self) -> &Param<f32> {
        &self.scale
    }

    fn check_params(&self, is_init: bool) -> Result<(), DistributionError> {
        check_param(
            &self.scale,
            self.validate_args,
            is_init,
            |x| x > 0.,
            "Argument `scale` must be positive.",
        )
    }

    fn params(&self) -> Result<(Cow<'_, Tensor>, Cow<'_, Tensor>), DistributionError> {
        self.check_params(false)?;
        Ok((self.loc.value(), self.scale.value()))
    }

    /// Apply `f` to the standardized value `(x - loc) / scale`.
    fn map_standardized(
        &self,
        x: TensorView,
        f: impl Fn(f64) -> f64 + Sync,
    ) -> Result<Tensor, DistributionError> {
        let (loc, scale) = self.params()?;
        map_broadcast([x, loc.view(), scale.view()], PARAMS, |[x, loc, scale]| {
            f(((x - loc) / scale) as f64) as f32
        })
    }
}

impl Distribution for Normal {
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
        static_broadcast_shape(&[&self.loc, &self.scale], PARAMS).unwrap_or(StaticShape::Unknown)
    }

    fn batch_shape_tensor(&self) -> Result<Vec<usize>, DistributionError> {
        let (loc, scale) = self.params()?;
        broadcast_shape(&[&*loc, &*scale], PARAMS)
    }

    fn event_shape(&self) -> StaticShape {
        StaticShape::scalar()
    }

    fn event_shape_tensor(&self) -> Result<Vec<usize>, DistributionError> {
        Ok(Vec::new())
    }

    fn sample_n(&self, n: usize, rng: &mut fastrand::Rng) -> Result<Tensor, DistributionError> {
        let (loc, scale) = self.params()?;
        let shape = broadcast_shape(&[&*loc, &*scale], PARAMS)?;
        Ok(sample_elementwise(n, &shape, [&*loc, &*scale], |[loc, scale]| {
            rng.f32_normal(loc, scale)
        }))
    }

    fn log_prob(&self, x: TensorView) -> Result<Tensor, DistributionError> {
        let (loc, scale) = self.params()?;
        let log_norm = 0.5 * (2. * PI).ln();
        map_broadcast([x, loc.view(), scale.view()], PARAMS, |[x, loc, scale]| {
            let z = ((x - loc) / scale) as f64;
            (-0.5 * z * z - log_norm - (scale as f64).ln()) as f32
        })
    }

    fn cdf(&self, x: TensorView) -> Result<Tensor, DistributionError> {
        self.map_standardized(x, ndtr)
    }

    fn log_cdf(&self, x: TensorView) -> Result<Tensor, DistributionError> {
        self.map_standardized(x, log_ndtr)
    }

    fn survival_function(&self, x: TensorView) -> Result<Tensor, DistributionError> {
        self.map_standardized(x, |z| ndtr(-z))
    }

    fn log_survival_function(&self, x: TensorView) -> Result<Tensor, DistributionError> {
        self.map_standardized(x, |z| log_ndtr(-z))
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
        map_broadcast([loc.view(), scale.view()], PARAMS, |[_, scale]| scale)
    }

    fn variance(&self) -> Result<Tensor, DistributionError> {
        let (loc, scale) = self.params()?;
        map_broadcast([loc.view(), scale.view()], PARAMS, |[_, scale]| {
            scale * scale
        })
    }

    fn entropy(&self) -> Result<Tensor, DistributionError> {
        let (loc, scale) = self.params()?;
        let log_norm = 0.5 * (2. * PI * E).ln();
        map_broadcast([loc.view(), scale.view()], PARAMS, |[_, scale]| {
            (log_norm + (scale as f64).ln()) as f32
        })
    }
}
