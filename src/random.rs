//! Random variate generation for the distributions in this crate.

use fastrand::Rng;
use fastrand_contrib::RngExt;

use crate::special::lgamma;

/// Draw a sample from the standard normal distribution.
pub fn standard_normal(rng: &mut Rng) -> f64 {
    rng.f32_normal(0., 1.) as f64
}

/// Draw a sample from the gamma distribution with shape `alpha` and unit
/// rate, using the method of Marsaglia and Tsang.
///
/// Returns NaN if `alpha` is not positive.
pub fn standard_gamma(rng: &mut Rng, alpha: f64) -> f64 {
    if alpha.is_nan() || alpha <= 0. {
        return f64::NAN;
    }
    if alpha < 1. {
        // Boost the shape above 1 and correct with a uniform power.
        let u = rng.f64().max(f64::MIN_POSITIVE);
        return standard_gamma(rng, alpha + 1.) * u.powf(1. / alpha);
    }

    let d = alpha - 1. / 3.;
    let c = 1. / (9. * d).sqrt();
    loop {
        let x = standard_normal(rng);
        let v = 1. + c * x;
        if v <= 0. {
            continue;
        }
        let v = v * v * v;
        let u = rng.f64();
        if u < 1. - 0.0331 * x.powi(4) {
            return d * v;
        }
        if u > 0. && u.ln() < 0.5 * x * x + d * (1. - v + v.ln()) {
            return d * v;
        }
    }
}

/// Rates above which Poisson samples are generated by transformed rejection
/// rather than by multiplying uniforms.
const POISSON_PTRS_THRESHOLD: f64 = 10.;

/// Draw a sample from the Poisson distribution with the given rate.
///
/// Returns NaN if `rate` is negative or NaN.
pub fn poisson(rng: &mut Rng, rate: f64) -> f64 {
    if rate.is_nan() || rate < 0. {
        return f64::NAN;
    }
    if rate == 0. {
        return 0.;
    }
    if rate.is_infinite() {
        return f64::INFINITY;
    }
    if rate < POISSON_PTRS_THRESHOLD {
        poisson_mult(rng, rate)
    } else {
        poisson_ptrs(rng, rate)
    }
}

/// Knuth's algorithm: count uniforms until their product drops below
/// `exp(-rate)`.
fn poisson_mult(rng: &mut Rng, rate: f64) -> f64 {
    let limit = (-rate).exp();
    let mut count = 0.;
    let mut prod = rng.f64();
    while prod > limit {
        count += 1.;
        prod *= rng.f64();
    }
    count
}

/// Hörmann's transformed rejection with squeeze (PTRS).
fn poisson_ptrs(rng: &mut Rng, rate: f64) -> f64 {
    let slam = rate.sqrt();
    let loglam = rate.ln();
    let b = 0.931 + 2.53 * slam;
    let a = -0.059 + 0.02483 * b;
    let inv_alpha = 1.1239 + 1.1328 / (b - 3.4);
    let vr = 0.9277 - 3.6224 / (b - 2.);

    loop {
        let u = rng.f64() - 0.5;
        let v = rng.f64();
        let us = 0.5 - u.abs();
        let k = ((2. * a / us + b) * u + rate + 0.43).floor();

        if us >= 0.07 && v <= vr {
            return k;
        }
        if k < 0. || (us < 0.013 && v > us) {
            continue;
        }
        if v.ln() + inv_alpha.ln() - (a / (us * us) + b).ln() <= -rate + k * loglam - lgamma(k + 1.)
        {
            return k;
        }
    }
}
