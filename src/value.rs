//! Comparable values stored in tuples.
//!
//! [`Value`] is the scalar used both as a tuple's value and, inside the index,
//! as the key of a values container. The order is total over concrete values:
//! first by [`ValueType`] tag, then by the value itself (floats use IEEE
//! `total_cmp`). The [`Value::Any`] wildcard compares equal to everything and
//! is therefore only meaningful in queries, never in stored tuples.

use std::cmp::Ordering;
use std::fmt as StdFmt;

// ============================================================================
//  ValueType
// ============================================================================

/// Type tag of a [`Value`].
///
/// The declaration order is the cross-type sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ValueType {
    /// Wildcard; matches every type.
    Any,
    /// `u8`
    U8,
    /// `u16`
    U16,
    /// `u32`
    U32,
    /// `u64`
    U64,
    /// `i8`
    I8,
    /// `i16`
    I16,
    /// `i32`
    I32,
    /// `i64`
    I64,
    /// `f32`
    F32,
    /// `f64`
    F64,
    /// UTF-8 string
    String,
}

impl ValueType {
    /// Returns true if a value of type `other` satisfies this type filter.
    ///
    /// `Any` on either side always matches.
    #[must_use]
    #[inline]
    pub fn accepts(self, other: Self) -> bool {
        self == Self::Any || other == Self::Any || self == other
    }
}

impl StdFmt::Display for ValueType {
    fn fmt(&self, f: &mut StdFmt::Formatter<'_>) -> StdFmt::Result {
        let name = match self {
            Self::Any => "any",
            Self::U8 => "uint8",
            Self::U16 => "uint16",
            Self::U32 => "uint32",
            Self::U64 => "uint64",
            Self::I8 => "int8",
            Self::I16 => "int16",
            Self::I32 => "int32",
            Self::I64 => "int64",
            Self::F32 => "float32",
            Self::F64 => "float64",
            Self::String => "string",
        };
        f.write_str(name)
    }
}

// ============================================================================
//  Value
// ============================================================================

/// A totally ordered scalar.
///
/// # Ordering
///
/// ```rust
/// use assoctree::Value;
///
/// // Same type: natural order.
/// assert!(Value::from(1u8) < Value::from(2u8));
///
/// // Different types: ordered by type tag, regardless of magnitude.
/// assert!(Value::from(200u8) < Value::from(1i8));
///
/// // The wildcard equals everything.
/// assert_eq!(Value::Any, Value::from("anything"));
/// ```
#[derive(Debug, Clone)]
pub enum Value {
    /// Wildcard that compares equal to every value.
    Any,
    /// `u8`
    U8(u8),
    /// `u16`
    U16(u16),
    /// `u32`
    U32(u32),
    /// `u64`
    U64(u64),
    /// `i8`
    I8(i8),
    /// `i16`
    I16(i16),
    /// `i32`
    I32(i32),
    /// `i64`
    I64(i64),
    /// `f32`
    F32(f32),
    /// `f64`
    F64(f64),
    /// UTF-8 string
    String(String),
}

impl Value {
    /// The type tag of this value.
    #[must_use]
    #[inline]
    pub const fn value_type(&self) -> ValueType {
        match self {
            Self::Any => ValueType::Any,
            Self::U8(_) => ValueType::U8,
            Self::U16(_) => ValueType::U16,
            Self::U32(_) => ValueType::U32,
            Self::U64(_) => ValueType::U64,
            Self::I8(_) => ValueType::I8,
            Self::I16(_) => ValueType::I16,
            Self::I32(_) => ValueType::I32,
            Self::I64(_) => ValueType::I64,
            Self::F32(_) => ValueType::F32,
            Self::F64(_) => ValueType::F64,
            Self::String(_) => ValueType::String,
        }
    }

    /// Check if this is the wildcard.
    #[must_use]
    #[inline]
    pub const fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }

    /// Returns true if both values carry the same concrete type tag.
    ///
    /// Unlike [`ValueType::accepts`], `Any` only matches `Any` here.
    #[must_use]
    #[inline]
    pub fn same_type(&self, other: &Self) -> bool {
        self.value_type() == other.value_type()
    }

    /// Borrow the string payload, if this is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Any, _) | (_, Self::Any) => Ordering::Equal,
            (Self::U8(a), Self::U8(b)) => a.cmp(b),
            (Self::U16(a), Self::U16(b)) => a.cmp(b),
            (Self::U32(a), Self::U32(b)) => a.cmp(b),
            (Self::U64(a), Self::U64(b)) => a.cmp(b),
            (Self::I8(a), Self::I8(b)) => a.cmp(b),
            (Self::I16(a), Self::I16(b)) => a.cmp(b),
            (Self::I32(a), Self::I32(b)) => a.cmp(b),
            (Self::I64(a), Self::I64(b)) => a.cmp(b),
            (Self::F32(a), Self::F32(b)) => a.total_cmp(b),
            (Self::F64(a), Self::F64(b)) => a.total_cmp(b),
            (Self::String(a), Self::String(b)) => a.cmp(b),
            _ => self.value_type().cmp(&other.value_type()),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl StdFmt::Display for Value {
    fn fmt(&self, f: &mut StdFmt::Formatter<'_>) -> StdFmt::Result {
        match self {
            Self::Any => f.write_str("*"),
            Self::U8(v) => write!(f, "{v}"),
            Self::U16(v) => write!(f, "{v}"),
            Self::U32(v) => write!(f, "{v}"),
            Self::U64(v) => write!(f, "{v}"),
            Self::I8(v) => write!(f, "{v}"),
            Self::I16(v) => write!(f, "{v}"),
            Self::I32(v) => write!(f, "{v}"),
            Self::I64(v) => write!(f, "{v}"),
            Self::F32(v) => write!(f, "{v}"),
            Self::F64(v) => write!(f, "{v}"),
            Self::String(v) => write!(f, "{v:?}"),
        }
    }
}

macro_rules! impl_from_scalar {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                #[inline]
                fn from(v: $ty) -> Self {
                    Self::$variant(v)
                }
            }
        )*
    };
}

impl_from_scalar! {
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    f32 => F32,
    f64 => F64,
    String => String,
}

impl From<&str> for Value {
    #[inline]
    fn from(v: &str) -> Self {
        Self::String(v.to_owned())
    }
}

// ============================================================================
//  Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_type_natural_order() {
        assert!(Value::from(1u64) < Value::from(2u64));
        assert!(Value::from(-3i32) < Value::from(0i32));
        assert!(Value::from("a") < Value::from("b"));
        assert!(Value::from(1.5f64) > Value::from(-0.5f64));
    }

    #[test]
    fn test_cross_type_orders_by_tag() {
        // u8 sorts before i8 regardless of magnitude.
        assert!(Value::from(255u8) < Value::from(-128i8));
        assert!(Value::from(1u64) < Value::from(1i64));
        assert!(Value::from(1e30f64) < Value::from(""));
        assert_ne!(Value::from(1u8), Value::from(1u16));
    }

    #[test]
    fn test_any_equals_everything() {
        assert_eq!(Value::Any, Value::from(7u8));
        assert_eq!(Value::from("x"), Value::Any);
        assert_eq!(Value::Any.cmp(&Value::from(1.0f32)), Ordering::Equal);
    }

    #[test]
    fn test_float_total_order() {
        assert!(Value::from(f64::NEG_INFINITY) < Value::from(0.0f64));
        assert_eq!(Value::from(f64::NAN), Value::from(f64::NAN));
        assert!(Value::from(-0.0f32) < Value::from(0.0f32));
    }

    #[test]
    fn test_type_filter_accepts() {
        assert!(ValueType::Any.accepts(ValueType::String));
        assert!(ValueType::I64.accepts(ValueType::I64));
        assert!(!ValueType::I64.accepts(ValueType::I32));
        assert!(Value::from(1i64).same_type(&Value::from(9i64)));
        assert!(!Value::Any.same_type(&Value::from(9i64)));
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::from("a b").to_string(), "\"a b\"");
        assert_eq!(Value::from(42u32).to_string(), "42");
        assert_eq!(Value::Any.to_string(), "*");
        assert_eq!(ValueType::F32.to_string(), "float32");
    }
}
