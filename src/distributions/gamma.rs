use std::borrow::Cow;

use rten_shape_inference::StaticShape;
use rten_tensor::prelude::*;
use rten_tensor::{Tensor, TensorView};

use super::{
    broadcast_shape, check_param, check_sample, nan_if_undefined, sample_elementwise,
    static_broadcast_shape,
};
use crate::distribution::{Distribution, ReparameterizationType};
use crate::errors::DistributionError;
use crate::options::DistributionOptions;
use crate::param::Param;
use crate::random::standard_gamma;
use crate::special::{digamma, gammainc, lgamma};
use crate::tensor_util::map_broadcast;

const PARAMS: &str = "concentration, rate";

/// A batch of gamma distributions, parameterized by shape (`concentration`)
/// and inverse scale (`rate`).
#[derive(Clone, Debug)]
pub struct Gamma {
    concentration: Param<f32>,
    rate: Param<f32>,
    validate_args: bool,
    allow_nan_stats: bool,
    name: String,
}

impl Gamma {
    pub fn new(
        concentration: impl Into<Param<f32>>,
        rate: impl Into<Param<f32>>,
    ) -> Result<Gamma, DistributionError> {
        Self::with_options(concentration, rate, &DistributionOptions::default())
    }

    pub fn with_options(
        concentration: impl Into<Param<f32>>,
        rate: impl Into<Param<f32>>,
        opts: &DistributionOptions,
    ) -> Result<Gamma, DistributionError> {
        let gamma = Gamma {
            concentration: concentration.into(),
            rate: rate.into(),
            validate_args: opts.validate_args,
            allow_nan_stats: opts.allow_nan_stats,
            name: opts.name.clone().unwrap_or_else(|| "Gamma".to_string()),
        };
        static_broadcast_shape(&[&gamma.concentration, &gamma.rate], PARAMS)?;
        gamma.check_params(true)?;
        Ok(gamma)
    }

    pub fn concentration(&self) -> &Param<f32> {
        &self.concentration
    }

    pub fn rate(&self) -> &Param<f32> {
        &self.rate
    }

    fn check_params(&self, is_init: bool) -> Result<(), DistributionError> {
        check_param(
            &self.concentration,
            self.validate_args,
            is_init,
            |x| x > 0.,
            "Argument `concentration` must be positive.",
        )?;
        check_param(
            &self.rate,
            self.validate_args,
            is_init,
            |x| x > 0.,
            "Argument `rate` must be positive.",
        )
    }

    fn params(&self) -> Result<(Cow<'_, Tensor>, Cow<'_, Tensor>), DistributionError> {
        self.check_params(false)?;
        Ok((self.concentration.value(), self.rate.value()))
    }

    fn check_sample(&self, x: &TensorView) -> Result<(), DistributionError> {
        check_sample(
            x,
            self.validate_args,
            |x| x >= 0.,
            "Sample must be non-negative.",
        )
    }
}

/// `x * ln(y)`, defined as zero where `x` is zero.
fn xlogy(x: f64, y: f64) -> f64 {
    if x == 0. && !y.is_nan() {
        0.
    } else {
        x * y.ln()
    }
}

impl Distribution for Gamma {
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
        static_broadcast_shape(&[&self.concentration, &self.rate], PARAMS)
            .unwrap_or(StaticShape::Unknown)
    }

    fn batch_shape_tensor(&self) -> Result<Vec<usize>, DistributionError> {
        let (concentration, rate) = self.params()?;
        broadcast_shape(&[&*concentration, &*rate], PARAMS)
    }

    fn event_shape(&self) -> StaticShape {
        StaticShape::scalar()
    }

    fn event_shape_tensor(&self) -> Result<Vec<usize>, DistributionError> {
        Ok(Vec::new())
    }

    fn sample_n(&self, n: usize, rng: &mut fastrand::Rng) -> Result<Tensor, DistributionError> {
        let (concentration, rate) = self.params()?;
        let shape = broadcast_shape(&[&*concentration, &*rate], PARAMS)?;
        Ok(sample_elementwise(
            n,
            &shape,
            [&*concentration, &*rate],
            |[concentration, rate]| {
                (standard_gamma(rng, concentration as f64) / rate as f64) as f32
            },
        ))
    }

    fn log_prob(&self, x: TensorView) -> Result<Tensor, DistributionError> {
        self.check_sample(&x)?;
        let (concentration, rate) = self.params()?;
        map_broadcast(
            [x, concentration.view(), rate.view()],
            PARAMS,
            |[x, concentration, rate]| {
                let (x, a, rate) = (x as f64, concentration as f64, rate as f64);
                (xlogy(a - 1., x) - rate * x + a * rate.ln() - lgamma(a)) as f32
            },
        )
    }

    fn cdf(&self, x: TensorView) -> Result<Tensor, DistributionError> {
        self.check_sample(&x)?;
        let (concentration, rate) = self.params()?;
        map_broadcast(
            [x, concentration.view(), rate.view()],
            PARAMS,
            |[x, concentration, rate]| {
                gammainc(concentration as f64, rate as f64 * x.max(0.) as f64) as f32
            },
        )
    }

    fn mean(&self) -> Result<Tensor, DistributionError> {
        let (concentration, rate) = self.params()?;
        map_broadcast(
            [concentration.view(), rate.view()],
            PARAMS,
            |[concentration, rate]| concentration / rate,
        )
    }

    /// Return the mode `(concentration - 1) / rate`.
    ///
    /// The mode is undefined where `concentration < 1`.
    fn mode(&self) -> Result<Tensor, DistributionError> {
        let (concentration, rate) = self.params()?;
        let mode = map_broadcast(
            [concentration.view(), rate.view()],
            PARAMS,
            |[concentration, rate]| (concentration - 1.) / rate,
        )?;
        let defined = map_broadcast(
            [concentration.view(), rate.view()],
            PARAMS,
            |[concentration, _]| if concentration >= 1. { 1. } else { 0. },
        )?
        .map(|&d| d > 0.);
        nan_if_undefined(
            mode,
            defined,
            self.allow_nan_stats,
            "Mode not defined when any concentration < 1.",
        )
    }

    fn stddev(&self) -> Result<Tensor, DistributionError> {
        let (concentration, rate) = self.params()?;
        map_broadcast(
            [concentration.view(), rate.view()],
            PARAMS,
            |[concentration, rate]| concentration.sqrt() / rate,
        )
    }

    fn variance(&self) -> Result<Tensor, DistributionError> {
        let (concentration, rate) = self.params()?;
        map_broadcast(
            [concentration.view(), rate.view()],
            PARAMS,
            |[concentration, rate]| concentration / (rate * rate),
        )
    }

    fn entropy(&self) -> Result<Tensor, DistributionError> {
        let (concentration, rate) = self.params()?;
        map_broadcast(
            [concentration.view(), rate.view()],
            PARAMS,
            |[concentration, rate]| {
                let (a, rate) = (concentration as f64, rate as f64);
                (a - rate.ln() + lgamma(a) + (1. - a) * digamma(a)) as f32
            },
        )
    }
}
