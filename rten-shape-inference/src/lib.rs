//! Batch shape inference and validation for distributions.
//!
//! # About batch shapes
//!
//! A batched distribution divides the dimensions of its samples into three
//! groups: _sample_ dims for independent draws, _batch_ dims indexing
//! independent distributions and _event_ dims for the shape of a single draw.
//! The batch shape of a distribution can be reinterpreted by reshaping, as
//! long as the number of batch members stays the same.
//!
//! A new batch shape is given as a vector of sizes, one of which may be `-1`
//! to indicate that its size should be inferred from the others. For example
//! a distribution with batch shape `[6]` can be reshaped with `[1, 2, -1]` to
//! give batch shape `[1, 2, 3]`.
//!
//! Shapes are not always known ahead of time. If a distribution's parameters
//! can change after it has been created, its batch shape may only be known
//! when those parameters are read. Hence this crate distinguishes between:
//!
//! - _Static_ shapes ([`StaticShape`]), which may be fully known, have a
//!   known rank but unknown sizes, or be entirely unknown.
//! - _Dynamic_ shapes (`&[usize]`), which are always concrete but can only
//!   be obtained by evaluating parameters.
//!
//! # Crate overview
//!
//! - [`compute_expanded_shape`] resolves a target shape's `-1` entry against
//!   the original batch shape.
//! - [`validate_construction`] checks what can be checked statically, once.
//! - [`parameter_assertions`] produces [`Assertion`]s for what can only be
//!   checked dynamically. These are run with [`run_assertions`].

mod infer_shapes;
mod static_shape;
mod validate;

pub use infer_shapes::{ExpandedShape, OriginalBatch, compute_expanded_shape, resolve_shape};
pub use static_shape::StaticShape;
pub use validate::{
    Assertion, AssertionError, INVALID_ELEMENTS, NOT_A_VECTOR, SIZE_MISMATCH, ShapeError,
    StaticTarget, TOO_FEW_DIMS, TOO_MANY_UNKNOWN_DIMS, TargetValue, UNEXPECTED_SHAPE,
    parameter_assertions, run_assertions, should_check_parameter, validate_construction,
};
