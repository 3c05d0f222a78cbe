//! Inference of batch shapes containing a placeholder dimension.

/// Batch shape of the distribution whose batch dimensions are being
/// reshaped, or its precomputed size.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum OriginalBatch<'a> {
    Shape(&'a [usize]),
    Size(usize),
}

impl OriginalBatch<'_> {
    /// Return the number of batch members.
    ///
    /// The empty shape (a scalar batch) has size 1.
    pub fn size(&self) -> i64 {
        match self {
            OriginalBatch::Shape([]) => 1,
            OriginalBatch::Shape(shape) => shape.iter().map(|&d| d as i64).product(),
            OriginalBatch::Size(size) => *size as i64,
        }
    }
}

/// Result of [`compute_expanded_shape`].
#[derive(Clone, Debug, PartialEq)]
pub struct ExpandedShape {
    /// Target shape with the `-1` placeholder replaced.
    pub shape: Vec<i64>,

    /// Number of elements in the original batch shape.
    pub original_size: i64,
}

impl ExpandedShape {
    /// Return the product of the expanded dimension sizes.
    pub fn size(&self) -> i64 {
        self.shape.iter().fold(1i64, |prod, &d| prod.saturating_mul(d))
    }

    /// Convert the expanded shape into tensor dimension sizes.
    ///
    /// Returns `None` if any entry is negative, which can happen if the
    /// target shape was not validated.
    pub fn to_dims(&self) -> Option<Vec<usize>> {
        self.shape
            .iter()
            .map(|&d| usize::try_from(d).ok())
            .collect()
    }
}

/// Compute the new batch shape described by `target_shape`, filling in the
/// size of a `-1` entry, if present, from the size of `original`.
///
/// The size of the placeholder is `original_size / max(1, -product(target))`.
/// With exactly one `-1` entry the product of the target is negative, and its
/// negation is the product of the other entries. When there is no placeholder
/// the target is returned unchanged.
///
/// This does not validate `target_shape`. If it has more than one `-1`, or
/// entries less than `-1`, the result is meaningless, though computing it
/// will not fail. Use [`parameter_assertions`](crate::parameter_assertions)
/// to check the inputs when that matters.
///
/// ```
/// use rten_shape_inference::{OriginalBatch, compute_expanded_shape};
///
/// let expanded = compute_expanded_shape(&[1, 2, -1], OriginalBatch::Shape(&[6]));
/// assert_eq!(expanded.shape, [1, 2, 3]);
/// assert_eq!(expanded.original_size, 6);
/// ```
pub fn compute_expanded_shape(target_shape: &[i32], original: OriginalBatch) -> ExpandedShape {
    let original_size = original.size();

    let target_product = target_shape
        .iter()
        .fold(1i64, |prod, &d| prod.saturating_mul(d as i64));
    let implicit_dim_size = original_size / 1i64.max(target_product.saturating_neg());

    let shape = target_shape
        .iter()
        .map(|&d| if d == -1 { implicit_dim_size } else { d as i64 })
        .collect();

    ExpandedShape {
        shape,
        original_size,
    }
}

/// Resolve a shape vector which may contain a single `-1` entry against a
/// tensor with `len` elements, following the same rules as a tensor reshape.
///
/// Unlike [`compute_expanded_shape`] this validates `shape`, returning `None`
/// if it contains more than one `-1`, has entries less than `-1` or cannot
/// contain exactly `len` elements.
pub fn resolve_shape(len: usize, shape: &[i64]) -> Option<Vec<usize>> {
    let mut unspecified_dim = None;
    let mut specified_dims_size: usize = 1;
    for (dim, &size) in shape.iter().enumerate() {
        if size < -1 {
            return None;
        } else if size == -1 {
            if unspecified_dim.is_some() {
                return None;
            }
            unspecified_dim = Some(dim);
        } else {
            specified_dims_size = specified_dims_size.checked_mul(size as usize)?;
        }
    }

    let unspecified_dim_size = match (unspecified_dim, len, specified_dims_size) {
        (None, _, _) => 0,
        (Some(_), 0, _) => 0,
        // A non-empty tensor can't be reshaped if another dim is zero.
        (Some(_), _, 0) => return None,
        (Some(_), len, specified) => {
            if len % specified != 0 {
                return None;
            }
            len / specified
        }
    };

    let out_shape: Vec<usize> = shape
        .iter()
        .map(|&size| {
            if size == -1 {
                unspecified_dim_size
            } else {
                size as usize
            }
        })
        .collect();

    if out_shape.iter().product::<usize>() != len {
        return None;
    }
    Some(out_shape)
}
