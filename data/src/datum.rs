use crate::tensor::litteral::tensor0;
use crate::tensor::{Storage, Tensor};
use ndarray::ArrayD;
use std::fmt;

/// Element type of a constant tensor.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DatumType {
    Bool,
    I64,
    F32,
}

impl DatumType {
    pub fn is_float(&self) -> bool {
        *self == DatumType::F32
    }

    pub fn is_integer(&self) -> bool {
        *self == DatumType::I64
    }

    pub fn is_number(&self) -> bool {
        self.is_float() || self.is_integer()
    }
}

impl fmt::Display for DatumType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            DatumType::Bool => "bool",
            DatumType::I64 => "i64",
            DatumType::F32 => "f32",
        };
        write!(f, "{s}")
    }
}

pub trait Datum:
    Clone + Send + Sync + fmt::Debug + fmt::Display + Default + 'static + PartialEq
{
    fn name() -> &'static str;
    fn datum_type() -> DatumType;
    #[doc(hidden)]
    fn array(tensor: &Tensor) -> Option<&ArrayD<Self>>;
    #[doc(hidden)]
    fn wrap(array: ArrayD<Self>) -> Tensor;
}

macro_rules! datum {
    ($t:ty, $v:ident) => {
        impl From<$t> for Tensor {
            fn from(it: $t) -> Tensor {
                tensor0(it)
            }
        }

        impl Datum for $t {
            fn name() -> &'static str {
                stringify!($t)
            }

            fn datum_type() -> DatumType {
                DatumType::$v
            }

            fn array(tensor: &Tensor) -> Option<&ArrayD<$t>> {
                match &tensor.0 {
                    Storage::$v(array) => Some(array),
                    _ => None,
                }
            }

            fn wrap(array: ArrayD<$t>) -> Tensor {
                Tensor(Storage::$v(array))
            }
        }
    };
}

datum!(bool, Bool);
datum!(i64, I64);
datum!(f32, F32);

#[cfg(test)]
mod tests {
    use crate::internal::*;
    use ndarray::arr1;

    #[test]
    fn test_array_to_tensor_to_array() {
        let array = arr1(&[12i64, 42]);
        let tensor = Tensor::from(array.clone());
        let view = tensor.to_array_view::<i64>().unwrap();
        assert_eq!(array, view.into_dimensionality().unwrap());
    }

    #[test]
    fn test_cast_i64_to_f32() {
        let t_i64: Tensor = tensor1(&[0i64, 3]);
        let t_f32 = t_i64.cast_to::<f32>().unwrap();
        assert_eq!(&*t_f32, &tensor1(&[0f32, 3.0]));
    }

    #[test]
    fn test_cast_i64_to_bool() {
        let t_i64: Tensor = tensor1(&[0i64, 2]);
        assert_eq!(t_i64.cast_to::<bool>().unwrap().as_slice::<bool>().unwrap(), &[false, true]);
    }

    #[test]
    fn test_wrong_datum_type_access() {
        let t: Tensor = tensor1(&[1f32]);
        assert!(t.as_slice::<i64>().is_err());
    }
}
