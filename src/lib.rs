//! rten-prob provides batched probability distributions built on
//! [rten-tensor](rten_tensor).
//!
//! # Batches and events
//!
//! Every distribution in this crate represents a _batch_ of independent
//! distributions. Tensors produced and consumed by a distribution divide
//! their dimensions into three groups:
//!
//! - _Sample_ dims index independent draws.
//! - _Batch_ dims index members of the batch.
//! - _Event_ dims hold the coordinates of a single draw. These are empty for
//!   univariate distributions such as [`Normal`].
//!
//! For example sampling `[4, 5]` draws from a [`MultivariateNormalDiag`] with
//! batch shape `[6]` and event shape `[2]` produces a tensor of shape
//! `[4, 5, 6, 2]`, and its `log_prob` has shape `[4, 5, 6]`.
//!
//! # Reshaping batches
//!
//! [`BatchReshape`] wraps another distribution and reinterprets its batch
//! dims with a new shape that has the same number of elements. All
//! operations are delegated to the wrapped distribution.
//!
//! ```
//! use rten_prob::{BatchReshape, Distribution, MultivariateNormalDiag};
//! use rten_tensor::Tensor;
//! use rten_tensor::prelude::*;
//!
//! let mvn = MultivariateNormalDiag::new(
//!     Tensor::<f32>::zeros(&[6, 2]),
//!     Tensor::full(&[6, 2], 1.0f32),
//! )
//! .unwrap();
//! let reshaped = BatchReshape::new(mvn, vec![2, -1]).unwrap();
//! assert_eq!(reshaped.batch_shape_tensor().unwrap(), [2, 3]);
//! assert_eq!(reshaped.mean().unwrap().shape(), [2, 3, 2]);
//! ```
//!
//! # Parameters
//!
//! Distribution parameters are [`Param`]s. A parameter is either a constant
//! tensor, which is validated once when the distribution is created, or a
//! [`Variable`] which may be reassigned afterwards and is validated each time
//! it is read.
//!
//! # Validation
//!
//! Checks which require evaluating parameter or input values are only run if
//! `validate_args` is enabled via [`DistributionOptions`]. The default for
//! this can be set with the `RTEN_PROB_VALIDATE_ARGS` environment variable.
//! Checks which can be made using static shapes alone are always run.
//!
//! # Crate features
//!
//! - `serde` enables serialization of [`StaticShape`].

mod batch_reshape;
mod distribution;
mod env;
mod errors;
mod options;
mod param;
mod random;
mod special;
mod tensor_util;

pub mod distributions;

pub use batch_reshape::BatchReshape;
pub use distribution::{DataType, Distribution, ReparameterizationType};
pub use distributions::{Gamma, MultivariateNormalDiag, NegativeBinomial, Normal};
pub use env::VALIDATE_ARGS_VAR;
pub use errors::DistributionError;
pub use options::DistributionOptions;
pub use param::{Param, ParamKind, Variable};
pub use rten_shape_inference::StaticShape;
