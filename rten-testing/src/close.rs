use std::error::Error;
use std::fmt;

use rten_tensor::TensorView;
use rten_tensor::prelude::*;

/// Maximum number of mismatched elements included in error details.
const MAX_REPORTED_MISMATCHES: usize = 5;

#[derive(Debug)]
pub enum AllCloseError {
    ShapeMismatch(String),
    ValueMismatch(String),
}

impl fmt::Display for AllCloseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllCloseError::ShapeMismatch(details) => write!(f, "{}", details),
            AllCloseError::ValueMismatch(details) => write!(f, "{}", details),
        }
    }
}

impl Error for AllCloseError {}

fn is_close(actual: f32, expected: f32, atol: f32, rtol: f32) -> bool {
    if actual.is_nan() || expected.is_nan() {
        return actual.is_nan() && expected.is_nan();
    }
    if actual.is_infinite() || expected.is_infinite() {
        return actual == expected;
    }
    (actual - expected).abs() <= atol + rtol * expected.abs()
}

/// Check that two tensors have the same shape and approximately equal
/// elements, using tolerances suitable for `f32` results.
///
/// Unlike NumPy's `allclose`, NaNs compare equal to each other.
pub fn expect_all_close(actual: TensorView, expected: TensorView) -> Result<(), AllCloseError> {
    expect_all_close_with_tolerance(actual, expected, 1e-6, 1e-5)
}

/// Variant of [`expect_all_close`] with custom tolerances.
///
/// Elements match if `|actual - expected| <= atol + rtol * |expected|`.
pub fn expect_all_close_with_tolerance(
    actual: TensorView,
    expected: TensorView,
    atol: f32,
    rtol: f32,
) -> Result<(), AllCloseError> {
    if actual.shape() != expected.shape() {
        return Err(AllCloseError::ShapeMismatch(format!(
            "Tensors have different shapes. {:?} vs. {:?}",
            actual.shape(),
            expected.shape()
        )));
    }

    let mismatches: Vec<(usize, f32, f32)> = actual
        .iter()
        .zip(expected.iter())
        .enumerate()
        .filter(|&(_, (&a, &e))| !is_close(a, e, atol, rtol))
        .map(|(i, (&a, &e))| (i, a, e))
        .collect();

    if mismatches.is_empty() {
        return Ok(());
    }

    let details: Vec<String> = mismatches
        .iter()
        .take(MAX_REPORTED_MISMATCHES)
        .map(|(i, a, e)| format!("index {}: {} != {}", i, a, e))
        .collect();
    Err(AllCloseError::ValueMismatch(format!(
        "{} values differ. First {}: {}",
        mismatches.len(),
        details.len(),
        details.join(", ")
    )))
}
