use std::fmt::{Display, Formatter};

use crate::Error;

/// Static shape of an array, represented as an ordered sequence of non-negative dimension sizes.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Shape {
    dims: Vec<i64>,
}

impl Shape {
    /// Creates a new [`Shape`] from the provided dimension sizes, all of which must be non-negative.
    pub fn new(dims: Vec<i64>) -> Result<Self, Error> {
        if let Some(dim) = dims.iter().find(|dim| **dim < 0) {
            Err(Error::invalid_argument(format!("shape dimension sizes must be non-negative, but got {dim}")))
        } else {
            Ok(Self { dims })
        }
    }

    /// Returns the dimension sizes of this [`Shape`].
    pub fn dims(&self) -> &[i64] {
        self.dims.as_slice()
    }

    /// Returns the rank (i.e., number of dimensions) of this [`Shape`].
    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// Returns the total number of elements in an array of this [`Shape`], saturating at [`i64::MAX`] if the
    /// product of the dimension sizes overflows.
    pub fn num_elements(&self) -> i64 {
        self.dims.iter().fold(1, |product, dim| product.saturating_mul(*dim))
    }
}

impl Display for Shape {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[")?;
        for (dim_index, dim) in self.dims.iter().enumerate() {
            if dim_index > 0 {
                write!(f, ",")?;
            }
            write!(f, "{dim}")?;
        }
        write!(f, "]")
    }
}

/// Tag that marks which dimensions of a [`DynamicShape`] are dynamic. Dynamic dimensions are _bounded_: the
/// corresponding dimension size in the shape is an upper bound rather than an exact size.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BoundedDynamicShapeTag {
    dynamic_dims: Vec<bool>,
}

impl BoundedDynamicShapeTag {
    /// Creates a new [`BoundedDynamicShapeTag`] from per-dimension dynamism flags. At least one dimension must be
    /// marked dynamic, as a shape with no dynamic dimensions is just a static [`Shape`].
    pub fn new(dynamic_dims: Vec<bool>) -> Result<Self, Error> {
        if dynamic_dims.iter().any(|dynamic| *dynamic) {
            Ok(Self { dynamic_dims })
        } else {
            Err(Error::invalid_argument("bounded dynamic shape tags must mark at least one dimension as dynamic"))
        }
    }

    /// Returns the per-dimension dynamism flags of this [`BoundedDynamicShapeTag`].
    pub fn dynamic_dims(&self) -> &[bool] {
        self.dynamic_dims.as_slice()
    }

    /// Returns the rank that shapes tagged by this [`BoundedDynamicShapeTag`] must have.
    pub fn rank(&self) -> usize {
        self.dynamic_dims.len()
    }
}

/// Shape of an array with one or more bounded-dynamic dimensions.
///
/// A dynamic shape pairs a static [`Shape`] holding the dimension bounds with a [`BoundedDynamicShapeTag`] marking
/// which of those dimensions are dynamic. The tag must have the same rank as the bounds.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DynamicShape {
    bounds: Shape,
    tag: BoundedDynamicShapeTag,
}

impl DynamicShape {
    /// Creates a new [`DynamicShape`] from the provided dimension bounds and dynamism tag.
    pub fn new(bounds: Shape, tag: BoundedDynamicShapeTag) -> Result<Self, Error> {
        if bounds.rank() != tag.rank() {
            return Err(Error::invalid_argument(format!(
                "dynamic shape bounds have rank {} but the dynamism tag has rank {}",
                bounds.rank(),
                tag.rank(),
            )));
        }
        Ok(Self { bounds, tag })
    }

    /// Returns the dimension bounds of this [`DynamicShape`].
    pub fn bounds(&self) -> &Shape {
        &self.bounds
    }

    /// Returns the dynamism tag of this [`DynamicShape`].
    pub fn tag(&self) -> &BoundedDynamicShapeTag {
        &self.tag
    }

    /// Returns `true` if dimension `dim_index` of this [`DynamicShape`] is dynamic.
    pub fn is_dynamic_dim(&self, dim_index: usize) -> bool {
        self.tag.dynamic_dims().get(dim_index).copied().unwrap_or(false)
    }

    /// Returns the static [`Shape`] obtained by padding every dynamic dimension to its bound.
    pub fn bound_shape(&self) -> Shape {
        self.bounds.clone()
    }
}

impl Display for DynamicShape {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[")?;
        for (dim_index, dim) in self.bounds.dims().iter().enumerate() {
            if dim_index > 0 {
                write!(f, ",")?;
            }
            if self.is_dynamic_dim(dim_index) {
                write!(f, "<={dim}")?;
            } else {
                write!(f, "{dim}")?;
            }
        }
        write!(f, "]")
    }
}
