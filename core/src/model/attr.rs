use crate::infer::InferFn;
use moir_data::prelude::*;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Attributes of an operation node, by name.
pub type Attrs = BTreeMap<String, AttrValue>;

/// A single attribute value.
#[derive(Clone)]
pub enum AttrValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Ints(TVec<i64>),
    Floats(TVec<f64>),
    Strs(Vec<String>),
    Tensor(Arc<Tensor>),
    /// Per-node inference override. Wins over the registry rule.
    Infer(InferFn),
}

impl AttrValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttrValue::Int(i) => Some(*i),
            AttrValue::Bool(b) => Some(*b as i64),
            AttrValue::Tensor(t) if t.len() == 1 => t.to_i64s().ok().map(|v| v[0]),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            AttrValue::Float(f) => Some(*f),
            AttrValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Booleans also come as 0/1 integers from some extractors.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Bool(b) => Some(*b),
            AttrValue::Int(i) => Some(*i != 0),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_ints(&self) -> Option<TVec<i64>> {
        match self {
            AttrValue::Ints(v) => Some(v.clone()),
            AttrValue::Int(i) => Some(tvec!(*i)),
            AttrValue::Tensor(t) => t.to_i64s().ok(),
            _ => None,
        }
    }

    pub fn as_strs(&self) -> Option<&[String]> {
        match self {
            AttrValue::Strs(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_tensor(&self) -> Option<&Arc<Tensor>> {
        match self {
            AttrValue::Tensor(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_infer(&self) -> Option<InferFn> {
        match self {
            AttrValue::Infer(f) => Some(*f),
            _ => None,
        }
    }
}

impl PartialEq for AttrValue {
    fn eq(&self, other: &AttrValue) -> bool {
        use AttrValue::*;
        match (self, other) {
            (Int(a), Int(b)) => a == b,
            (Float(a), Float(b)) => a == b,
            (Bool(a), Bool(b)) => a == b,
            (Str(a), Str(b)) => a == b,
            (Ints(a), Ints(b)) => a == b,
            (Floats(a), Floats(b)) => a == b,
            (Strs(a), Strs(b)) => a == b,
            (Tensor(a), Tensor(b)) => a == b,
            (Infer(a), Infer(b)) => std::ptr::fn_addr_eq(*a, *b),
            _ => false,
        }
    }
}

impl fmt::Debug for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AttrValue::Int(i) => write!(f, "{i}"),
            AttrValue::Float(x) => write!(f, "{x:?}"),
            AttrValue::Bool(b) => write!(f, "{b}"),
            AttrValue::Str(s) => write!(f, "{s:?}"),
            AttrValue::Ints(v) => write!(f, "{:?}", &**v),
            AttrValue::Floats(v) => write!(f, "{:?}", &**v),
            AttrValue::Strs(v) => write!(f, "{v:?}"),
            AttrValue::Tensor(t) => write!(f, "{t:?}"),
            AttrValue::Infer(_) => write!(f, "<infer>"),
        }
    }
}

macro_rules! attr_from {
    ($t: ty, $v: ident, $conv: expr) => {
        impl From<$t> for AttrValue {
            fn from(it: $t) -> AttrValue {
                AttrValue::$v($conv(it))
            }
        }
    };
}

attr_from!(i64, Int, |i| i);
attr_from!(i32, Int, |i: i32| i as i64);
attr_from!(usize, Int, |i: usize| i as i64);
attr_from!(f64, Float, |f| f);
attr_from!(f32, Float, |f: f32| f as f64);
attr_from!(bool, Bool, |b| b);
attr_from!(&str, Str, |s: &str| s.to_string());
attr_from!(String, Str, |s| s);
attr_from!(TVec<i64>, Ints, |v| v);
attr_from!(Vec<i64>, Ints, |v: Vec<i64>| v.into());
attr_from!(&[i64], Ints, |v: &[i64]| v.into());
attr_from!(Vec<f64>, Floats, |v: Vec<f64>| v.into());
attr_from!(Vec<String>, Strs, |v| v);
attr_from!(Tensor, Tensor, Arc::new);
attr_from!(Arc<Tensor>, Tensor, |t| t);

impl<const N: usize> From<[i64; N]> for AttrValue {
    fn from(it: [i64; N]) -> AttrValue {
        AttrValue::Ints(it.iter().copied().collect())
    }
}
