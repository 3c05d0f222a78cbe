use std::borrow::Cow;

use rten_shape_inference::StaticShape;
use rten_tensor::prelude::*;
use rten_tensor::{Tensor, TensorView};

use super::{broadcast_shape, check_param, check_sample, sample_elementwise, static_broadcast_shape};
use crate::distribution::{Distribution, ReparameterizationType};
use crate::errors::DistributionError;
use crate::options::DistributionOptions;
use crate::param::Param;
use crate::random::{poisson, standard_gamma};
use crate::special::{betainc, lgamma, log_sigmoid, sigmoid};
use crate::tensor_util::map_broadcast;

const PARAMS: &str = "total_count, logits";

/// Success probability parameter of a [`NegativeBinomial`].
#[derive(Clone, Debug)]
enum SuccessParam {
    Logits(Param<f32>),
    Probs(Param<f32>),
}

impl SuccessParam {
    fn param(&self) -> &Param<f32> {
        match self {
            SuccessParam::Logits(p) | SuccessParam::Probs(p) => p,
        }
    }
}

/// A batch of negative binomial distributions.
///
/// Each distribution counts the successes in a sequence of Bernoulli trials
/// before `total_count` failures occur, where each trial succeeds with
/// probability `probs = sigmoid(logits)`.
#[derive(Clone, Debug)]
pub struct NegativeBinomial {
    total_count: Param<f32>,
    success: SuccessParam,
    validate_args: bool,
    allow_nan_stats: bool,
    name: String,
}

impl NegativeBinomial {
    pub fn from_logits(
        total_count: impl Into<Param<f32>>,
        logits: impl Into<Param<f32>>,
    ) -> Result<NegativeBinomial, DistributionError> {
        Self::with_options(
            total_count,
            Some(logits.into()),
            None,
            &DistributionOptions::default(),
        )
    }

    pub fn from_probs(
        total_count: impl Into<Param<f32>>,
        probs: impl Into<Param<f32>>,
    ) -> Result<NegativeBinomial, DistributionError> {
        Self::with_options(
            total_count,
            None,
            Some(probs.into()),
            &DistributionOptions::default(),
        )
    }

    /// Create a batch of negative binomial distributions.
    ///
    /// Exactly one of `logits` or `probs` must be given.
    pub fn with_options(
        total_count: impl Into<Param<f32>>,
        logits: Option<Param<f32>>,
        probs: Option<Param<f32>>,
        opts: &DistributionOptions,
    ) -> Result<NegativeBinomial, DistributionError> {
        let success = match (logits, probs) {
            (Some(logits), None) => SuccessParam::Logits(logits),
            (None, Some(probs)) => SuccessParam::Probs(probs),
            _ => {
                return Err(DistributionError::InvalidParameter(
                    "Must pass probs or logits, but not both.",
                ));
            }
        };
        let nb = NegativeBinomial {
            total_count: total_count.into(),
            success,
            validate_args: opts.validate_args,
            allow_nan_stats: opts.allow_nan_stats,
            name: opts
                .name
                .clone()
                .unwrap_or_else(|| "NegativeBinomial".to_string()),
        };
        static_broadcast_shape(&[&nb.total_count, nb.success.param()], PARAMS)?;
        nb.check_params(true)?;
        Ok(nb)
    }

    pub fn total_count(&self) -> &Param<f32> {
        &self.total_count
    }

    /// Return the log-odds of success.
    pub fn logits(&self) -> Result<Tensor, DistributionError> {
        Ok(self.params()?.1)
    }

    /// Return the probability of success.
    pub fn probs(&self) -> Result<Tensor, DistributionError> {
        self.check_params(false)?;
        Ok(match &self.success {
            SuccessParam::Probs(probs) => probs.value().into_owned(),
            SuccessParam::Logits(logits) => logits.value().map(|&l| sigmoid(l as f64) as f32),
        })
    }

    fn check_params(&self, is_init: bool) -> Result<(), DistributionError> {
        check_param(
            &self.total_count,
            self.validate_args,
            is_init,
            |x| x >= 0.,
            "`total_count` has components less than 0.",
        )?;
        check_param(
            &self.total_count,
            self.validate_args,
            is_init,
            |x| x.fract() == 0.,
            "`total_count` has fractional components.",
        )?;
        if let SuccessParam::Probs(probs) = &self.success {
            check_param(
                probs,
                self.validate_args,
                is_init,
                |p| p >= 0.,
                "`probs` has components less than 0.",
            )?;
            check_param(
                probs,
                self.validate_args,
                is_init,
                |p| p <= 1.,
                "`probs` has components greater than 1.",
            )?;
        }
        Ok(())
    }

    /// Return `(total_count, logits)`, converting probabilities to logits if
    /// needed.
    fn params(&self) -> Result<(Cow<'_, Tensor>, Tensor), DistributionError> {
        self.check_params(false)?;
        let logits = match &self.success {
            SuccessParam::Logits(logits) => logits.value().into_owned(),
            SuccessParam::Probs(probs) => probs.value().map(|&p| {
                let p = p as f64;
                (p.ln() - (-p).ln_1p()) as f32
            }),
        };
        Ok((self.total_count.value(), logits))
    }

    fn check_sample(&self, x: &TensorView) -> Result<(), DistributionError> {
        check_sample(
            x,
            self.validate_args,
            |x| x >= 0.,
            "Sample has components less than 0.",
        )?;
        check_sample(
            x,
            self.validate_args,
            |x| x.fract() == 0.,
            "Sample has fractional components.",
        )
    }
}

impl Distribution for NegativeBinomial {
    fn name(&self) -> &str {
        &self.name
    }

    fn reparameterization_type(&self) -> ReparameterizationType {
        ReparameterizationType::NotReparameterized
    }

    fn validate_args(&self) -> bool {
        self.validate_args
    }

    fn allow_nan_stats(&self) -> bool {
        self.allow_nan_stats
    }

    fn batch_shape(&self) -> StaticShape {
        static_broadcast_shape(&[&self.total_count, self.success.param()], PARAMS)
            .unwrap_or(StaticShape::Unknown)
    }

    fn batch_shape_tensor(&self) -> Result<Vec<usize>, DistributionError> {
        let (total_count, logits) = self.params()?;
        broadcast_shape(&[&*total_count, &logits], PARAMS)
    }

    fn event_shape(&self) -> StaticShape {
        StaticShape::scalar()
    }

    fn event_shape_tensor(&self) -> Result<Vec<usize>, DistributionError> {
        Ok(Vec::new())
    }

    /// Sample from the gamma-Poisson mixture: draw a rate from
    /// `Gamma(total_count, exp(-logits))`, then a count from `Poisson(rate)`.
    fn sample_n(&self, n: usize, rng: &mut fastrand::Rng) -> Result<Tensor, DistributionError> {
        let (total_count, logits) = self.params()?;
        let shape = broadcast_shape(&[&*total_count, &logits], PARAMS)?;
        Ok(sample_elementwise(
            n,
            &shape,
            [&*total_count, &logits],
            |[total_count, logits]| {
                if total_count == 0. {
                    return 0.;
                }
                let rate = standard_gamma(rng, total_count as f64) * (logits as f64).exp();
                poisson(rng, rate) as f32
            },
        ))
    }

    fn log_prob(&self, x: TensorView) -> Result<Tensor, DistributionError> {
        self.check_sample(&x)?;
        let (total_count, logits) = self.params()?;
        map_broadcast(
            [x, total_count.view(), logits.view()],
            PARAMS,
            |[x, total_count, logits]| {
                let (x, n, l) = (x as f64, total_count as f64, logits as f64);
                let log_unnormalized = n * log_sigmoid(-l) + x * log_sigmoid(l);
                let log_normalization = -lgamma(n + x) + lgamma(1. + x) + lgamma(n);
                (log_unnormalized - log_normalization) as f32
            },
        )
    }

    fn cdf(&self, x: TensorView) -> Result<Tensor, DistributionError> {
        self.check_sample(&x)?;
        let (total_count, logits) = self.params()?;
        map_broadcast(
            [x, total_count.view(), logits.view()],
            PARAMS,
            |[x, total_count, logits]| {
                betainc(total_count as f64, 1. + x as f64, sigmoid(-logits as f64)) as f32
            },
        )
    }

    fn mean(&self) -> Result<Tensor, DistributionError> {
        let (total_count, logits) = self.params()?;
        map_broadcast(
            [total_count.view(), logits.view()],
            PARAMS,
            |[total_count, logits]| total_count * logits.exp(),
        )
    }

    fn mode(&self) -> Result<Tensor, DistributionError> {
        let (total_count, logits) = self.params()?;
        map_broadcast(
            [total_count.view(), logits.view()],
            PARAMS,
            |[total_count, logits]| ((total_count - 1.).max(0.) * logits.exp()).floor(),
        )
    }

    fn variance(&self) -> Result<Tensor, DistributionError> {
        let (total_count, logits) = self.params()?;
        map_broadcast(
            [total_count.view(), logits.view()],
            PARAMS,
            |[total_count, logits]| {
                let mean = total_count as f64 * (logits as f64).exp();
                (mean / sigmoid(-logits as f64)) as f32
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use rten_shape_inference::StaticShape;
    use rten_tensor::Tensor;
    use rten_tensor::prelude::*;
    use rten_testing::{
        TestCases, expect_all_close, expect_all_close_with_tolerance, sample_moments,
    };

    use super::NegativeBinomial;
    use crate::distribution::{Distribution, ReparameterizationType};
    use crate::errors::DistributionError;
    use crate::options::DistributionOptions;
    use crate::param::{Param, Variable};

    fn tensor(shape: &[usize], data: &[f32]) -> Tensor {
        Tensor::from_data(shape, data.to_vec())
    }

    #[test]
    fn test_logits_or_probs() {
        let opts = DistributionOptions::new();
        let expected = Some(DistributionError::InvalidParameter(
            "Must pass probs or logits, but not both.",
        ));
        assert_eq!(
            NegativeBinomial::with_options(Param::scalar(1.), None, None, &opts).err(),
            expected
        );
        assert_eq!(
            NegativeBinomial::with_options(
                Param::scalar(1.),
                Some(Param::scalar(0.)),
                Some(Param::scalar(0.5)),
                &opts
            )
            .err(),
            expected
        );

        let nb =
            NegativeBinomial::from_probs(Param::scalar(3.), tensor(&[2], &[0.5, 0.25])).unwrap();
        expect_all_close(
            nb.logits().unwrap().view(),
            tensor(&[2], &[0., (1f32 / 3.).ln()]).view(),
        )
        .unwrap();

        let nb = NegativeBinomial::from_logits(Param::scalar(3.), tensor(&[2], &[0., 0.])).unwrap();
        assert_eq!(nb.probs().unwrap().to_vec(), [0.5, 0.5]);
        assert_eq!(nb.batch_shape(), StaticShape::from([2]));
        assert_eq!(nb.batch_shape_tensor().unwrap(), [2]);
        assert_eq!(nb.event_shape(), StaticShape::scalar());
        assert_eq!(
            nb.reparameterization_type(),
            ReparameterizationType::NotReparameterized
        );
    }

    #[test]
    fn test_log_prob_and_cdf() {
        // With `total_count = 1` the distribution is geometric:
        // P(X = k) = (1 - p) p^k.
        let nb = NegativeBinomial::from_probs(Param::scalar(1.), Param::scalar(0.25)).unwrap();
        let x = tensor(&[4], &[0., 1., 2., 5.]);

        let expected = x.map(|&k| 0.75f32.ln() + k * 0.25f32.ln());
        expect_all_close(nb.log_prob(x.view()).unwrap().view(), expected.view()).unwrap();

        let expected = x.map(|&k| 1. - 0.25f32.powf(k + 1.));
        expect_all_close(nb.cdf(x.view()).unwrap().view(), expected.view()).unwrap();

        let expected = x.map(|&k| 0.25f32.powf(k + 1.));
        expect_all_close(
            nb.survival_function(x.view()).unwrap().view(),
            expected.view(),
        )
        .unwrap();
    }

    #[test]
    fn test_moments() {
        #[derive(Debug)]
        struct Case {
            total_count: f32,
            probs: f32,
            mean: f32,
            variance: f32,
            mode: f32,
        }

        let cases = [
            Case {
                total_count: 4.,
                probs: 0.5,
                mean: 4.,
                variance: 8.,
                mode: 3.,
            },
            Case {
                total_count: 1.,
                probs: 0.75,
                mean: 3.,
                variance: 12.,
                mode: 0.,
            },
            Case {
                total_count: 10.,
                probs: 0.2,
                mean: 2.5,
                variance: 3.125,
                mode: 2.,
            },
        ];

        cases.test_each(|case| {
            let nb = NegativeBinomial::from_probs(
                Param::scalar(case.total_count),
                Param::scalar(case.probs),
            )
            .unwrap();
            expect_all_close(
                nb.mean().unwrap().view(),
                Tensor::from_scalar(case.mean).view(),
            )
            .unwrap();
            expect_all_close(
                nb.variance().unwrap().view(),
                Tensor::from_scalar(case.variance).view(),
            )
            .unwrap();
            expect_all_close(
                nb.stddev().unwrap().view(),
                Tensor::from_scalar(case.variance.sqrt()).view(),
            )
            .unwrap();
            assert_eq!(nb.mode().unwrap().item().copied(), Some(case.mode));
        })
    }

    #[test]
    fn test_sample() {
        let nb = NegativeBinomial::from_probs(
            tensor(&[3], &[0., 2., 20.]),
            tensor(&[3], &[0.5, 0.3, 0.6]),
        )
        .unwrap();
        let mut rng = fastrand::Rng::with_seed(1234);
        let samples = nb.sample(&[20_000], &mut rng).unwrap();
        assert_eq!(samples.shape(), [20_000, 3]);
        assert!(samples.iter().all(|&x| x >= 0. && x.fract() == 0.));

        let moments = sample_moments(samples.view(), 1);
        expect_all_close_with_tolerance(
            moments.mean.view(),
            nb.mean().unwrap().view(),
            0.,
            0.05,
        )
        .unwrap();
        expect_all_close_with_tolerance(
            moments.variance.view(),
            nb.variance().unwrap().view(),
            0.,
            0.1,
        )
        .unwrap();
    }

    #[test]
    fn test_validate_args() {
        let mut opts = DistributionOptions::new();
        opts.validate_args(true);

        #[derive(Debug)]
        struct Case {
            total_count: f32,
            probs: f32,
            expected: &'static str,
        }

        let cases = [
            Case {
                total_count: -1.,
                probs: 0.5,
                expected: "`total_count` has components less than 0.",
            },
            Case {
                total_count: 1.5,
                probs: 0.5,
                expected: "`total_count` has fractional components.",
            },
            Case {
                total_count: 1.,
                probs: -0.5,
                expected: "`probs` has components less than 0.",
            },
            Case {
                total_count: 1.,
                probs: 1.5,
                expected: "`probs` has components greater than 1.",
            },
        ];

        cases.test_each(|case| {
            let err = NegativeBinomial::with_options(
                Param::scalar(case.total_count),
                None,
                Some(Param::scalar(case.probs)),
                &opts,
            )
            .err();
            assert_eq!(err, Some(DistributionError::InvalidParameter(case.expected)));
        });

        // Variables are checked on use rather than at construction.
        let total_count = Variable::new(Tensor::from_scalar(2.0f32));
        let nb = NegativeBinomial::with_options(&total_count, Some(Param::scalar(0.)), None, &opts)
            .unwrap();
        assert!(nb.mean().is_ok());
        total_count.assign(Tensor::from_scalar(2.5)).unwrap();
        assert_eq!(
            nb.mean().err(),
            Some(DistributionError::InvalidParameter(
                "`total_count` has fractional components."
            ))
        );

        let nb =
            NegativeBinomial::with_options(Param::scalar(2.), Some(Param::scalar(0.)), None, &opts)
                .unwrap();
        assert_eq!(
            nb.log_prob(tensor(&[2], &[1., 0.5]).view()).err(),
            Some(DistributionError::InvalidParameter(
                "Sample has fractional components."
            ))
        );
    }
}
