//! `Tensor`, the constant values carried by graph data nodes.
use crate::TVec;
use crate::datum::{Datum, DatumType};
use anyhow::{Context, bail, ensure};
use itertools::Itertools;
use ndarray::prelude::*;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

pub mod litteral;

#[derive(Clone, PartialEq)]
pub(crate) enum Storage {
    Bool(ArrayD<bool>),
    I64(ArrayD<i64>),
    F32(ArrayD<f32>),
}

/// Tensor is a concrete, owned tensor value.
///
/// Only the element types the optimizer folds are supported: booleans,
/// 64-bit integers (shapes, axes, indices) and 32-bit floats.
#[derive(Clone, PartialEq)]
pub struct Tensor(pub(crate) Storage);

macro_rules! on_storage {
    ($storage: expr, $array: ident => $body: expr) => {
        match $storage {
            Storage::Bool($array) => $body,
            Storage::I64($array) => $body,
            Storage::F32($array) => $body,
        }
    };
}

impl Tensor {
    /// Build a tensor from a shape and a flat, row-major, list of values.
    pub fn from_shape<T: Datum>(shape: &[usize], data: &[T]) -> anyhow::Result<Tensor> {
        let array = ArrayD::from_shape_vec(IxDyn(shape), data.to_vec())
            .with_context(|| format!("Building a {shape:?} tensor from {} values", data.len()))?;
        Ok(T::wrap(array))
    }

    /// A tensor filled with the default value of T.
    pub fn zero<T: Datum>(shape: &[usize]) -> Tensor {
        T::wrap(ArrayD::default(IxDyn(shape)))
    }

    pub fn datum_type(&self) -> DatumType {
        match &self.0 {
            Storage::Bool(_) => DatumType::Bool,
            Storage::I64(_) => DatumType::I64,
            Storage::F32(_) => DatumType::F32,
        }
    }

    pub fn shape(&self) -> &[usize] {
        on_storage!(&self.0, a => a.shape())
    }

    pub fn rank(&self) -> usize {
        self.shape().len()
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        on_storage!(&self.0, a => a.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn array<T: Datum>(&self) -> anyhow::Result<&ArrayD<T>> {
        T::array(self).with_context(|| {
            format!(
                "Tensor datum type error: tensor is {:?}, accessed as {:?}",
                self.datum_type(),
                T::datum_type()
            )
        })
    }

    pub fn to_array_view<T: Datum>(&self) -> anyhow::Result<ArrayViewD<'_, T>> {
        Ok(self.array::<T>()?.view())
    }

    pub fn as_slice<T: Datum>(&self) -> anyhow::Result<&[T]> {
        self.array::<T>()?.as_slice().context("Tensor is not in standard layout")
    }

    pub fn to_scalar<T: Datum>(&self) -> anyhow::Result<&T> {
        ensure!(self.len() == 1, "to_scalar called on a tensor of shape {:?}", self.shape());
        Ok(&self.as_slice::<T>()?[0])
    }

    /// Values of an integer-like tensor, flattened.
    pub fn to_i64s(&self) -> anyhow::Result<TVec<i64>> {
        let cast = self.cast_to::<i64>()?;
        Ok(cast.to_array_view::<i64>()?.iter().copied().collect())
    }

    pub fn cast_to<T: Datum>(&self) -> anyhow::Result<Cow<'_, Tensor>> {
        self.cast_to_dt(T::datum_type())
    }

    pub fn cast_to_dt(&self, dt: DatumType) -> anyhow::Result<Cow<'_, Tensor>> {
        use Storage::*;
        if self.datum_type() == dt {
            return Ok(Cow::Borrowed(self));
        }
        let storage = match (&self.0, dt) {
            (Bool(a), DatumType::I64) => I64(a.mapv(|b| b as i64)),
            (Bool(a), DatumType::F32) => F32(a.mapv(|b| if b { 1.0 } else { 0.0 })),
            (I64(a), DatumType::F32) => F32(a.mapv(|x| x as f32)),
            (I64(a), DatumType::Bool) => Bool(a.mapv(|x| x != 0)),
            (F32(a), DatumType::I64) => I64(a.mapv(|x| x as i64)),
            (F32(a), DatumType::Bool) => Bool(a.mapv(|x| x != 0.0)),
            (_, dt) => bail!("Unsupported cast from {:?} to {:?}", self.datum_type(), dt),
        };
        Ok(Cow::Owned(Tensor(storage)))
    }

    /// Change the shape, keeping the row-major element order.
    pub fn into_shape(self, shape: &[usize]) -> anyhow::Result<Tensor> {
        ensure!(
            shape.iter().product::<usize>() == self.len(),
            "Can not reshape a {:?} tensor to {:?}",
            self.shape(),
            shape
        );
        fn reshape<T: Clone>(array: ArrayD<T>, shape: &[usize]) -> anyhow::Result<ArrayD<T>> {
            Ok(array.as_standard_layout().into_owned().into_shape_with_order(IxDyn(shape))?)
        }
        let storage = match self.0 {
            Storage::Bool(a) => Storage::Bool(reshape(a, shape)?),
            Storage::I64(a) => Storage::I64(reshape(a, shape)?),
            Storage::F32(a) => Storage::F32(reshape(a, shape)?),
        };
        Ok(Tensor(storage))
    }

    pub fn into_arc_tensor(self) -> Arc<Tensor> {
        Arc::new(self)
    }

    fn dump(&self) -> String {
        let content = on_storage!(&self.0, a => {
            if a.len() > 12 {
                format!("{}...", a.iter().take(12).join(", "))
            } else {
                a.iter().join(", ")
            }
        });
        format!("{},{:?} {}", self.shape().iter().join(","), self.datum_type(), content)
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.dump())
    }
}

impl fmt::Display for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.dump())
    }
}

impl<D: ndarray::Dimension, T: Datum> From<Array<T, D>> for Tensor {
    fn from(it: Array<T, D>) -> Tensor {
        T::wrap(it.into_dyn())
    }
}

/// Convenient conversion to Tensor.
pub trait IntoTensor: Sized {
    /// Convert Self to a Tensor.
    ///
    /// May perform a copy
    fn into_tensor(self) -> Tensor;
}

/// Convenient conversion to Arc<Tensor>.
pub trait IntoArcTensor: Sized {
    /// Convert Self to a Arc<Tensor>.
    ///
    /// May perform a copy
    fn into_arc_tensor(self) -> Arc<Tensor>;
}

impl<D: ndarray::Dimension, T: Datum> IntoTensor for Array<T, D> {
    fn into_tensor(self) -> Tensor {
        Tensor::from(self)
    }
}

impl IntoTensor for Tensor {
    fn into_tensor(self) -> Tensor {
        self
    }
}

impl IntoTensor for Arc<Tensor> {
    fn into_tensor(self) -> Tensor {
        Arc::try_unwrap(self).unwrap_or_else(|t| (*t).clone())
    }
}

impl<D: ndarray::Dimension, T: Datum> IntoArcTensor for Array<T, D> {
    fn into_arc_tensor(self) -> Arc<Tensor> {
        Arc::new(Tensor::from(self))
    }
}

impl IntoArcTensor for Tensor {
    fn into_arc_tensor(self) -> Arc<Tensor> {
        Arc::new(self)
    }
}

impl IntoArcTensor for Arc<Tensor> {
    fn into_arc_tensor(self) -> Arc<Tensor> {
        self
    }
}
