//! Distribution parameters, which are either constants or mutable variables.

use std::borrow::Cow;
use std::sync::{Arc, PoisonError, RwLock};

use rten_shape_inference::StaticShape;
use rten_tensor::Tensor;
use rten_tensor::prelude::*;

use crate::errors::DistributionError;

/// Whether a parameter's value can change after it is passed to a
/// distribution.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ParamKind {
    Constant,
    Mutable,
}

/// A tensor whose value can be replaced after it has been passed to a
/// distribution.
///
/// Clones of a variable share the same value, so assigning through one clone
/// is visible to distributions holding another. Distributions with variable
/// parameters re-read and, if argument validation is enabled, re-check them
/// on every use.
///
/// A variable has a static shape which every assigned value must be
/// compatible with. [`Variable::new`] fixes the static shape to that of the
/// initial value. [`Variable::with_dynamic_shape`] leaves it unknown, so that
/// values of any shape can be assigned.
#[derive(Debug)]
pub struct Variable<T> {
    value: Arc<RwLock<Tensor<T>>>,
    static_shape: StaticShape,
}

impl<T> Clone for Variable<T> {
    fn clone(&self) -> Self {
        Variable {
            value: self.value.clone(),
            static_shape: self.static_shape.clone(),
        }
    }
}

impl<T: Clone> Variable<T> {
    /// Create a variable whose shape is fixed to that of `value`.
    pub fn new(value: Tensor<T>) -> Self {
        let static_shape = StaticShape::from(value.shape());
        Variable {
            value: Arc::new(RwLock::new(value)),
            static_shape,
        }
    }

    /// Create a variable which can be assigned values of any shape.
    pub fn with_dynamic_shape(value: Tensor<T>) -> Self {
        Variable {
            value: Arc::new(RwLock::new(value)),
            static_shape: StaticShape::Unknown,
        }
    }

    /// Return the static shape of this variable.
    pub fn static_shape(&self) -> &StaticShape {
        &self.static_shape
    }

    /// Return a copy of the current value.
    pub fn value(&self) -> Tensor<T> {
        self.value
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Return the shape of the current value.
    pub fn shape(&self) -> Vec<usize> {
        self.value
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .shape()
            .to_vec()
    }

    /// Replace the value of this variable.
    pub fn assign(&self, value: Tensor<T>) -> Result<(), DistributionError> {
        if !self.static_shape.is_compatible_with(value.shape()) {
            return Err(DistributionError::InvalidAssignment {
                expected: self.static_shape.clone(),
                actual: value.shape().to_vec(),
            });
        }
        *self.value.write().unwrap_or_else(PoisonError::into_inner) = value;
        Ok(())
    }
}

/// A distribution parameter.
#[derive(Clone, Debug)]
pub enum Param<T> {
    Constant(Tensor<T>),
    Variable(Variable<T>),
}

impl<T: Clone> Param<T> {
    /// Create a scalar constant parameter.
    pub fn scalar(value: T) -> Self {
        Param::Constant(Tensor::from_scalar(value))
    }

    pub fn kind(&self) -> ParamKind {
        match self {
            Param::Constant(_) => ParamKind::Constant,
            Param::Variable(_) => ParamKind::Mutable,
        }
    }

    /// Return true if this parameter's value can change between uses.
    pub fn is_ref(&self) -> bool {
        self.kind() == ParamKind::Mutable
    }

    /// Return the current value.
    ///
    /// This borrows constants and copies the value of variables, so that the
    /// result is not affected by later assignments.
    pub fn value(&self) -> Cow<'_, Tensor<T>> {
        match self {
            Param::Constant(value) => Cow::Borrowed(value),
            Param::Variable(var) => Cow::Owned(var.value()),
        }
    }

    /// Return the value if it is known without evaluation.
    pub fn static_value(&self) -> Option<&Tensor<T>> {
        match self {
            Param::Constant(value) => Some(value),
            Param::Variable(_) => None,
        }
    }

    /// Return the shape of the parameter that is known without evaluation.
    pub fn static_shape(&self) -> StaticShape {
        match self {
            Param::Constant(value) => StaticShape::from(value.shape()),
            Param::Variable(var) => var.static_shape().clone(),
        }
    }

    /// Return the shape of the current value.
    pub fn shape(&self) -> Vec<usize> {
        match self {
            Param::Constant(value) => value.shape().to_vec(),
            Param::Variable(var) => var.shape(),
        }
    }
}

impl<T> From<Tensor<T>> for Param<T> {
    fn from(val: Tensor<T>) -> Self {
        Param::Constant(val)
    }
}

impl<T> From<Variable<T>> for Param<T> {
    fn from(val: Variable<T>) -> Self {
        Param::Variable(val)
    }
}

impl<T> From<&Variable<T>> for Param<T> {
    fn from(val: &Variable<T>) -> Self {
        Param::Variable(val.clone())
    }
}

impl<T> From<Vec<T>> for Param<T> {
    /// Create a constant vector parameter.
    fn from(val: Vec<T>) -> Self {
        let len = val.len();
        Param::Constant(Tensor::from_data(&[len], val))
    }
}

#[cfg(test)]
mod tests {
    use rten_shape_inference::StaticShape;
    use rten_tensor::Tensor;
    use rten_tensor::prelude::*;

    use super::{Param, ParamKind, Variable};
    use crate::errors::DistributionError;

    #[test]
    fn test_constant_param() {
        let param: Param<i32> = vec![2, 3].into();
        assert_eq!(param.kind(), ParamKind::Constant);
        assert!(!param.is_ref());
        assert_eq!(param.static_shape(), StaticShape::from([2]));
        assert_eq!(param.value().to_vec(), [2, 3]);
        assert!(param.static_value().is_some());

        let scalar = Param::scalar(1.5f32);
        assert_eq!(scalar.shape(), Vec::<usize>::new());
    }

    #[test]
    fn test_variable_param() {
        let var = Variable::new(Tensor::from_data(&[2], vec![2, 3]));
        let param = Param::from(&var);
        assert_eq!(param.kind(), ParamKind::Mutable);
        assert!(param.is_ref());
        assert!(param.static_value().is_none());
        assert_eq!(param.static_shape(), StaticShape::from([2]));

        let before = param.value().into_owned();
        var.assign(Tensor::from_data(&[2], vec![3, 2])).unwrap();
        assert_eq!(before.to_vec(), [2, 3]);
        assert_eq!(param.value().to_vec(), [3, 2]);
    }

    #[test]
    fn test_variable_assign_shape() {
        let fixed = Variable::new(Tensor::from_data(&[2], vec![2, 3]));
        assert_eq!(
            fixed.assign(Tensor::from_data(&[3], vec![1, 2, 3])),
            Err(DistributionError::InvalidAssignment {
                expected: StaticShape::from([2]),
                actual: vec![3],
            })
        );

        let dynamic = Variable::with_dynamic_shape(Tensor::from_data(&[2], vec![2, 3]));
        assert_eq!(dynamic.static_shape(), &StaticShape::Unknown);
        dynamic
            .assign(Tensor::from_data(&[3], vec![1, 2, 3]))
            .unwrap();
        assert_eq!(dynamic.shape(), [3]);
    }
}
