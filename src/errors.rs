//! Error types reported by distributions.

use std::error::Error;
use std::fmt;

use rten_shape_inference::{AssertionError, ShapeError, StaticShape};

/// Possible reasons why constructing or evaluating a distribution may fail.
#[derive(Clone, Debug, PartialEq)]
pub enum DistributionError {
    /// A shape argument violates a statically checkable constraint.
    InvalidShape(ShapeError),

    /// A check enabled by `validate_args` failed.
    AssertionFailed(AssertionError),

    /// An input would need to be broadcast against the batch and event
    /// shape, which is not supported.
    UnsupportedBroadcast(String),

    /// The distribution does not implement an operation.
    NotImplemented {
        op: &'static str,
        distribution: String,
    },

    /// A tensor could not be reshaped because the number of elements differs.
    ReshapeFailed { from: Vec<usize>, to: Vec<i64> },

    /// An output has a shape that contradicts its statically known shape.
    IncompatibleShape {
        expected: StaticShape,
        actual: Vec<usize>,
    },

    /// Parameter shapes cannot be broadcast together.
    IncompatibleParamShapes(&'static str),

    /// A parameter has an invalid value or combination of values.
    InvalidParameter(&'static str),

    /// A statistic is undefined for some batch members and `allow_nan_stats`
    /// is false.
    UndefinedStatistic(&'static str),

    /// A value assigned to a variable does not match its shape.
    InvalidAssignment {
        expected: StaticShape,
        actual: Vec<usize>,
    },
}

impl DistributionError {
    pub(crate) fn not_implemented(op: &'static str, distribution: &str) -> DistributionError {
        DistributionError::NotImplemented {
            op,
            distribution: distribution.to_string(),
        }
    }
}

impl fmt::Display for DistributionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DistributionError::InvalidShape(err) => write!(f, "invalid shape: {}", err),
            DistributionError::AssertionFailed(err) => write!(f, "assertion failed: {}", err),
            DistributionError::UnsupportedBroadcast(details) => write!(f, "{}", details),
            DistributionError::NotImplemented { op, distribution } => {
                write!(f, "{} is not implemented for {}", op, distribution)
            }
            DistributionError::ReshapeFailed { from, to } => write!(
                f,
                "cannot reshape tensor of shape {:?} to {:?}",
                from, to
            ),
            DistributionError::IncompatibleShape { expected, actual } => write!(
                f,
                "shape {:?} is incompatible with static shape {}",
                actual, expected
            ),
            DistributionError::IncompatibleParamShapes(details) => {
                write!(f, "incompatible parameter shapes: {}", details)
            }
            DistributionError::InvalidParameter(details) => {
                write!(f, "invalid parameter: {}", details)
            }
            DistributionError::UndefinedStatistic(details) => {
                write!(f, "undefined statistic: {}", details)
            }
            DistributionError::InvalidAssignment { expected, actual } => write!(
                f,
                "cannot assign value of shape {:?} to variable of shape {}",
                actual, expected
            ),
        }
    }
}

impl Error for DistributionError {}

impl From<ShapeError> for DistributionError {
    fn from(val: ShapeError) -> DistributionError {
        DistributionError::InvalidShape(val)
    }
}

impl From<AssertionError> for DistributionError {
    fn from(val: AssertionError) -> DistributionError {
        DistributionError::AssertionFailed(val)
    }
}
