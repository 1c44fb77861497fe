#[macro_use]
mod macros;

/// A Smallvec instantiation with 4 embeddable values.
///
/// Used about everywhere in moir, for ports, shapes and small index lists.
pub type TVec<T> = smallvec::SmallVec<[T; 4]>;

pub mod prelude {
    pub use crate::TVec;
    pub use crate::datum::{Datum, DatumType};
    pub use crate::tensor::litteral::*;
    pub use crate::tensor::{IntoArcTensor, IntoTensor, Tensor};
    pub use crate::tvec;
    pub use crate::{dispatch_datum, dispatch_numbers};
}

pub mod internal {
    pub use crate::prelude::*;
    pub use ndarray as moir_ndarray;
    pub use smallvec as moir_smallvec;
}

pub use anyhow;

mod datum;
mod tensor;
