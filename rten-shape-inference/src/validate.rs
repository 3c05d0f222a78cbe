//! Construction-time validation and deferred assertions for batch shapes.

use std::error::Error;
use std::fmt;

use crate::infer_shapes::{OriginalBatch, compute_expanded_shape};
use crate::static_shape::StaticShape;

/// Message for a target shape whose rank is not 1.
pub const NOT_A_VECTOR: &str = "New shape must be a vector.";

/// Message for a target shape with more than one `-1` entry.
pub const TOO_MANY_UNKNOWN_DIMS: &str = "At most one dimension can be unknown.";

/// Message for a target shape with entries less than `-1`.
pub const INVALID_ELEMENTS: &str = "Shape elements must be >=-1.";

/// Message for a target shape whose size differs from the original.
pub const SIZE_MISMATCH: &str = "Shape sizes do not match.";

/// Message for an input with fewer dims than the batch and event dims.
pub const TOO_FEW_DIMS: &str = "Broadcasting is not supported; too few batch and event dims.";

/// Message for an input whose trailing dims differ from the batch and event
/// shape.
pub const UNEXPECTED_SHAPE: &str =
    "Broadcasting is not supported; unexpected batch and event shape.";

/// Errors in the target batch shape which are detected when a reshaping
/// distribution is constructed.
#[derive(Clone, Debug, PartialEq)]
pub enum ShapeError {
    /// The target shape tensor is not a vector.
    NotVector { ndim: usize },

    /// The statically known target size differs from the original batch
    /// size.
    SizeMismatch { target_size: i64, original_size: usize },

    /// A statically known target element is less than 1 and is not the `-1`
    /// placeholder.
    InvalidDim { index: usize, size: i32 },
}

impl fmt::Display for ShapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShapeError::NotVector { ndim } => {
                write!(f, "`batch_shape` must be a vector (saw rank: {}).", ndim)
            }
            ShapeError::SizeMismatch {
                target_size,
                original_size,
            } => write!(
                f,
                "`batch_shape` size ({}) must match `distribution.batch_shape` size ({}).",
                target_size, original_size
            ),
            ShapeError::InvalidDim { index, size } => write!(
                f,
                "`batch_shape` elements must be >=-1 (saw {} at index {}).",
                size, index
            ),
        }
    }
}

impl Error for ShapeError {}

/// A deferred check failed.
#[derive(Clone, Debug, PartialEq)]
pub struct AssertionError {
    /// Fixed message identifying the invariant that failed.
    pub message: &'static str,

    /// The values that were compared.
    pub details: String,
}

impl fmt::Display for AssertionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.details)
    }
}

impl Error for AssertionError {}

/// Target batch shape as seen during construction.
///
/// Either value may be unavailable if the target is a mutable parameter.
#[derive(Clone, Copy, Debug)]
pub struct StaticTarget<'a> {
    /// Rank of the target shape tensor, if known.
    pub ndim: Option<usize>,

    /// Values of the target shape tensor, if known.
    pub values: Option<&'a [i32]>,

    /// Number of elements in the target shape tensor, if known. This is used
    /// to form unknown dims when the values are not known.
    pub len: Option<usize>,
}

impl StaticTarget<'_> {
    /// Return the statically known batch shape described by the target.
    ///
    /// `-1` entries become unknown dims. If the values are not known but the
    /// target is a vector of known length, the result has that many unknown
    /// dims.
    pub fn to_static_shape(&self) -> StaticShape {
        match (self.ndim, self.values, self.len) {
            (Some(1), Some(values), _) => StaticShape::from_shape_vector(values),
            (Some(1), None, Some(len)) => StaticShape::unknown_dims(len),
            _ => StaticShape::Unknown,
        }
    }
}

/// Check the statically known properties of a target batch shape.
///
/// This is done once at construction, regardless of whether argument
/// validation is enabled. Properties that are only known dynamically are
/// checked by [`parameter_assertions`] instead.
pub fn validate_construction(
    original_batch_shape: &StaticShape,
    target: StaticTarget,
) -> Result<(), ShapeError> {
    if let Some(ndim) = target.ndim {
        if ndim != 1 {
            return Err(ShapeError::NotVector { ndim });
        }
    }

    let Some(values) = target.values else {
        return Ok(());
    };

    let target_size: Option<i64> = if values.contains(&-1) {
        None
    } else {
        Some(values.iter().map(|&v| v as i64).product())
    };
    if let (Some(target_size), Some(original_size)) =
        (target_size, original_batch_shape.num_elements())
    {
        if target_size != original_size as i64 {
            return Err(ShapeError::SizeMismatch {
                target_size,
                original_size,
            });
        }
    }

    if let Some((index, &size)) = values
        .iter()
        .enumerate()
        .find(|&(_, &size)| size != -1 && size < 1)
    {
        return Err(ShapeError::InvalidDim { index, size });
    }

    Ok(())
}

/// Return true if deferred checks on a parameter should be run.
///
/// Checks on constant parameters run once, at initialization. Checks on
/// mutable parameters run on every use instead, since the value may have
/// changed. Nothing is checked unless argument validation is enabled.
pub fn should_check_parameter(validate_args: bool, is_init: bool, is_ref: bool) -> bool {
    validate_args && is_init != is_ref
}

/// A check whose inputs have been computed, but which has not yet been run.
///
/// Checks are run in order by [`run_assertions`], stopping at the first
/// failure. Checks which depend on an earlier one passing must come after it.
#[derive(Clone, Debug, PartialEq)]
pub enum Assertion {
    /// Check that a tensor has the expected rank.
    RankEqual {
        ndim: usize,
        expected: usize,
        message: &'static str,
    },

    /// Check that a tensor's rank is at least `min`.
    RankAtLeast {
        ndim: usize,
        min: usize,
        message: &'static str,
    },

    /// Check that the number of `-1` entries is at most `max`.
    CountAtMost {
        count: usize,
        max: usize,
        message: &'static str,
    },

    /// Check that every value is `>= min`.
    AllAtLeast {
        values: Vec<i64>,
        min: i64,
        message: &'static str,
    },

    /// Check that two sizes are equal.
    SizeEqual {
        actual: i64,
        expected: i64,
        message: &'static str,
    },

    /// Check that two shapes are equal.
    ShapeEqual {
        actual: Vec<usize>,
        expected: Vec<usize>,
        message: &'static str,
    },
}

impl Assertion {
    /// Return the fixed message reported if this check fails.
    pub fn message(&self) -> &'static str {
        match self {
            Assertion::RankEqual { message, .. }
            | Assertion::RankAtLeast { message, .. }
            | Assertion::CountAtMost { message, .. }
            | Assertion::AllAtLeast { message, .. }
            | Assertion::SizeEqual { message, .. }
            | Assertion::ShapeEqual { message, .. } => message,
        }
    }

    /// Run the check.
    pub fn check(&self) -> Result<(), AssertionError> {
        let failure = |details: String| {
            Err(AssertionError {
                message: self.message(),
                details,
            })
        };

        match self {
            Assertion::RankEqual { ndim, expected, .. } => {
                if ndim != expected {
                    return failure(format!("expected rank {}, saw {}", expected, ndim));
                }
            }
            Assertion::RankAtLeast { ndim, min, .. } => {
                if ndim < min {
                    return failure(format!("expected rank >= {}, saw {}", min, ndim));
                }
            }
            Assertion::CountAtMost { count, max, .. } => {
                if count > max {
                    return failure(format!("expected count <= {}, saw {}", max, count));
                }
            }
            Assertion::AllAtLeast { values, min, .. } => {
                if let Some(value) = values.iter().find(|&v| v < min) {
                    return failure(format!("expected all >= {}, saw {}", min, value));
                }
            }
            Assertion::SizeEqual {
                actual, expected, ..
            } => {
                if actual != expected {
                    return failure(format!("expected {}, saw {}", expected, actual));
                }
            }
            Assertion::ShapeEqual {
                actual, expected, ..
            } => {
                if actual != expected {
                    return failure(format!("expected {:?}, saw {:?}", expected, actual));
                }
            }
        }
        Ok(())
    }
}

/// Run `assertions` in order, returning the first failure.
pub fn run_assertions(assertions: &[Assertion]) -> Result<(), AssertionError> {
    assertions.iter().try_for_each(|a| a.check())
}

/// Current value of a target batch shape tensor.
#[derive(Clone, Copy, Debug)]
pub struct TargetValue<'a> {
    /// Shape of the target tensor. This is `[n]` for a valid target.
    pub shape: &'a [usize],

    /// Elements of the target tensor, in row-major order.
    pub values: &'a [i32],
}

/// Return the deferred checks for a target batch shape.
///
/// The result is empty unless [`should_check_parameter`] is true for the
/// given flags. Otherwise the checks are, in order: the target is a vector,
/// it has at most one `-1`, all entries are `>= -1` and the expanded size
/// matches the size of `original`.
pub fn parameter_assertions(
    target: TargetValue,
    original: OriginalBatch,
    validate_args: bool,
    is_init: bool,
    is_ref: bool,
) -> Vec<Assertion> {
    if !should_check_parameter(validate_args, is_init, is_ref) {
        return Vec::new();
    }

    let expanded = compute_expanded_shape(target.values, original);
    vec![
        Assertion::RankEqual {
            ndim: target.shape.len(),
            expected: 1,
            message: NOT_A_VECTOR,
        },
        Assertion::CountAtMost {
            count: target.values.iter().filter(|&&v| v == -1).count(),
            max: 1,
            message: TOO_MANY_UNKNOWN_DIMS,
        },
        Assertion::AllAtLeast {
            values: target.values.iter().map(|&v| v as i64).collect(),
            min: -1,
            message: INVALID_ELEMENTS,
        },
        Assertion::SizeEqual {
            actual: expanded.size(),
            expected: expanded.original_size,
            message: SIZE_MISMATCH,
        },
    ]
}
