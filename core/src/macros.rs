/// Build an [`Attrs`](crate::model::Attrs) map.
///
/// ```
/// # use moir_core::prelude::*;
/// let attrs = attrs!("transpose_a" => false, "axis" => -1);
/// assert_eq!(attrs["axis"], AttrValue::Int(-1));
/// ```
#[macro_export]
macro_rules! attrs {
    ($($k:expr => $v:expr),* $(,)?) => {{
        #[allow(unused_mut)]
        let mut attrs = $crate::model::Attrs::new();
        $(attrs.insert(String::from($k), $crate::model::AttrValue::from($v));)*
        attrs
    }};
}
