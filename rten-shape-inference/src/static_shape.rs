//! Shapes whose dimensions may only be partially known ahead of evaluation.

use std::fmt;

use smallvec::SmallVec;

/// Shape information that is available without evaluating any mutable
/// parameters.
///
/// This is the counterpart of a dynamic shape (a plain `&[usize]`), which is
/// only available once parameter values have been read. A distribution's
/// static batch shape for example may be fully known if its parameters are
/// constants, but only have a known rank, or be entirely unknown, if its
/// parameters are variables.
///
/// ```
/// use rten_shape_inference::StaticShape;
///
/// let shape = StaticShape::from_dims(vec![Some(2), None]);
/// assert_eq!(shape.rank(), Some(2));
/// assert_eq!(shape.num_elements(), None);
/// assert!(shape.is_compatible_with(&[2, 5]));
/// assert!(!shape.is_compatible_with(&[3, 5]));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StaticShape {
    /// All dimension sizes are known.
    Known(Vec<usize>),

    /// The rank is known, but some dimension sizes are not.
    ///
    /// Values of this variant created via [`StaticShape::from_dims`] always
    /// contain at least one unknown dimension.
    PartiallyKnown(Vec<Option<usize>>),

    /// Neither the rank nor the dimension sizes are known.
    Unknown,
}

impl StaticShape {
    /// Return the shape of a scalar, which has no dimensions.
    pub fn scalar() -> StaticShape {
        StaticShape::Known(Vec::new())
    }

    /// Create a shape with known rank and `ndim` unknown dimensions.
    pub fn unknown_dims(ndim: usize) -> StaticShape {
        Self::from_dims(vec![None; ndim])
    }

    /// Create a shape from a list of optional dimension sizes.
    ///
    /// The result is [`StaticShape::Known`] if every size is present.
    pub fn from_dims(dims: Vec<Option<usize>>) -> StaticShape {
        if dims.iter().all(|d| d.is_some()) {
            StaticShape::Known(dims.into_iter().flatten().collect())
        } else {
            StaticShape::PartiallyKnown(dims)
        }
    }

    /// Interpret the statically known value of a shape vector as a shape.
    ///
    /// `-1` entries are placeholders for a size which is not yet known and
    /// become unknown dims. Other negative values are not valid sizes and also
    /// become unknown dims. Callers that need to reject those values should
    /// validate the vector first.
    pub fn from_shape_vector(values: &[i32]) -> StaticShape {
        Self::from_dims(
            values
                .iter()
                .map(|&v| if v >= 0 { Some(v as usize) } else { None })
                .collect(),
        )
    }

    /// Return the number of dimensions, if known.
    pub fn rank(&self) -> Option<usize> {
        match self {
            StaticShape::Known(dims) => Some(dims.len()),
            StaticShape::PartiallyKnown(dims) => Some(dims.len()),
            StaticShape::Unknown => None,
        }
    }

    /// Return the size of each dimension, if the rank is known.
    pub fn dims(&self) -> Option<SmallVec<[Option<usize>; 4]>> {
        match self {
            StaticShape::Known(dims) => Some(dims.iter().copied().map(Some).collect()),
            StaticShape::PartiallyKnown(dims) => Some(dims.iter().copied().collect()),
            StaticShape::Unknown => None,
        }
    }

    /// Return the dimension sizes if the shape is fully known.
    pub fn as_known(&self) -> Option<&[usize]> {
        match self {
            StaticShape::Known(dims) => Some(dims),
            _ => None,
        }
    }

    /// Return true if the rank and all dimension sizes are known.
    pub fn is_fully_defined(&self) -> bool {
        matches!(self, StaticShape::Known(_))
    }

    /// Return the number of elements in a tensor of this shape, if known.
    pub fn num_elements(&self) -> Option<usize> {
        self.as_known().map(|dims| dims.iter().product())
    }

    /// Return the shape formed by appending the dimensions of `other` to
    /// those of `self`.
    ///
    /// The result has unknown rank if either input does.
    pub fn concatenate(&self, other: &StaticShape) -> StaticShape {
        match (self, other) {
            (StaticShape::Known(a), StaticShape::Known(b)) => {
                StaticShape::Known(a.iter().chain(b).copied().collect())
            }
            (a, b) => match (a.dims(), b.dims()) {
                (Some(a), Some(b)) => Self::from_dims(a.into_iter().chain(b).collect()),
                _ => StaticShape::Unknown,
            },
        }
    }

    /// Return true if a tensor with the concrete shape `shape` could have
    /// this static shape.
    pub fn is_compatible_with(&self, shape: &[usize]) -> bool {
        let Some(dims) = self.dims() else {
            return true;
        };
        dims.len() == shape.len()
            && dims
                .iter()
                .zip(shape)
                .all(|(dim, &size)| dim.is_none_or(|d| d == size))
    }

    /// Combine the static knowledge in `self` and `other`.
    ///
    /// Returns `None` if the two shapes cannot describe the same tensor.
    pub fn merge_with(&self, other: &StaticShape) -> Option<StaticShape> {
        let (Some(a), Some(b)) = (self.dims(), other.dims()) else {
            return Some(if self.rank().is_some() {
                self.clone()
            } else {
                other.clone()
            });
        };
        if a.len() != b.len() {
            return None;
        }
        let mut merged = Vec::with_capacity(a.len());
        for (a, b) in a.into_iter().zip(b) {
            let dim = match (a, b) {
                (Some(a), Some(b)) if a != b => return None,
                (Some(a), _) => Some(a),
                (None, b) => b,
            };
            merged.push(dim);
        }
        Some(Self::from_dims(merged))
    }

    /// Return the shape resulting from broadcasting `self` with `other`.
    ///
    /// Returns `None` if the shapes are known to be incompatible.
    pub fn broadcast(&self, other: &StaticShape) -> Option<StaticShape> {
        let (Some(a), Some(b)) = (self.dims(), other.dims()) else {
            return Some(StaticShape::Unknown);
        };

        let a_pad = b.len().saturating_sub(a.len());
        let b_pad = a.len().saturating_sub(b.len());
        let a_iter = std::iter::repeat_n(Some(1), a_pad).chain(a);
        let b_iter = std::iter::repeat_n(Some(1), b_pad).chain(b);

        let mut out = Vec::with_capacity(a_pad + self.rank().unwrap_or(0));
        for (a, b) in a_iter.zip(b_iter) {
            let dim = match (a, b) {
                (Some(a), Some(b)) if a == b => Some(a),
                (Some(1), b) => b,
                (a, Some(1)) => a,
                (Some(_), Some(_)) => return None,

                // If one size is known and is not 1, broadcasting can only
                // succeed if the unknown size matches it.
                (Some(a), None) => Some(a),
                (None, Some(b)) => Some(b),
                (None, None) => None,
            };
            out.push(dim);
        }
        Some(Self::from_dims(out))
    }
}

impl From<&[usize]> for StaticShape {
    fn from(shape: &[usize]) -> StaticShape {
        StaticShape::Known(shape.to_vec())
    }
}

impl From<Vec<usize>> for StaticShape {
    fn from(shape: Vec<usize>) -> StaticShape {
        StaticShape::Known(shape)
    }
}

impl<const N: usize> From<[usize; N]> for StaticShape {
    fn from(shape: [usize; N]) -> StaticShape {
        StaticShape::Known(shape.to_vec())
    }
}

impl fmt::Display for StaticShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(dims) = self.dims() else {
            return write!(f, "<unknown>");
        };
        write!(f, "[")?;
        for (i, dim) in dims.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match dim {
                Some(size) => write!(f, "{}", size)?,
                None => write!(f, "?")?,
            }
        }
        write!(f, "]")
    }
}
