//! Witness values: random values drawn by a scenario's own generator calls.
//!
//! A witness is recorded in the trace so replay can re-inject it instead of
//! sampling again. Values form a closed set of kinds; each carries a
//! [`WitnessKind`] tag checked on replay before the value is handed back to
//! the scenario.

#![allow(missing_docs)]

use std::fmt;

use serde::{Deserialize, Serialize};

/// Runtime type tag of a [`WitnessValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WitnessKind {
    Bool,
    Int,
    UInt,
    Char,
    Text,
    List,
}

impl WitnessKind {
    /// Stable lowercase name used in renderings and error messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::UInt => "uint",
            Self::Char => "char",
            Self::Text => "text",
            Self::List => "list",
        }
    }
}

impl fmt::Display for WitnessKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recorded auxiliary random value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum WitnessValue {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Char(char),
    Text(String),
    List(Vec<WitnessValue>),
}

impl WitnessValue {
    /// The kind tag of this value.
    #[must_use]
    pub const fn kind(&self) -> WitnessKind {
        match self {
            Self::Bool(_) => WitnessKind::Bool,
            Self::Int(_) => WitnessKind::Int,
            Self::UInt(_) => WitnessKind::UInt,
            Self::Char(_) => WitnessKind::Char,
            Self::Text(_) => WitnessKind::Text,
            Self::List(_) => WitnessKind::List,
        }
    }
}

impl fmt::Display for WitnessValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::UInt(v) => write!(f, "{v}"),
            Self::Char(v) => write!(f, "{v:?}"),
            Self::Text(v) => write!(f, "{v:?}"),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

/// Conversion between Rust values and recorded witnesses.
///
/// `from_witness` returns `None` when the value has the wrong kind or does
/// not fit the target type (for example a negative `Int` read as `u8`).
pub trait Witness: Sized {
    /// Kind tag every value of this type is recorded under.
    const KIND: WitnessKind;

    /// Record this value.
    fn into_witness(self) -> WitnessValue;

    /// Recover a value from a recorded witness.
    fn from_witness(value: &WitnessValue) -> Option<Self>;
}

impl Witness for bool {
    const KIND: WitnessKind = WitnessKind::Bool;

    fn into_witness(self) -> WitnessValue {
        WitnessValue::Bool(self)
    }

    fn from_witness(value: &WitnessValue) -> Option<Self> {
        match value {
            WitnessValue::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

macro_rules! signed_witness {
    ($($ty:ty),*) => {$(
        impl Witness for $ty {
            const KIND: WitnessKind = WitnessKind::Int;

            fn into_witness(self) -> WitnessValue {
                WitnessValue::Int(i64::from(self))
            }

            fn from_witness(value: &WitnessValue) -> Option<Self> {
                match value {
                    WitnessValue::Int(v) => <$ty>::try_from(*v).ok(),
                    _ => None,
                }
            }
        }
    )*};
}

macro_rules! unsigned_witness {
    ($($ty:ty),*) => {$(
        impl Witness for $ty {
            const KIND: WitnessKind = WitnessKind::UInt;

            fn into_witness(self) -> WitnessValue {
                WitnessValue::UInt(u64::from(self))
            }

            fn from_witness(value: &WitnessValue) -> Option<Self> {
                match value {
                    WitnessValue::UInt(v) => <$ty>::try_from(*v).ok(),
                    _ => None,
                }
            }
        }
    )*};
}

signed_witness!(i8, i16, i32, i64);
unsigned_witness!(u8, u16, u32, u64);

impl Witness for usize {
    const KIND: WitnessKind = WitnessKind::UInt;

    fn into_witness(self) -> WitnessValue {
        WitnessValue::UInt(u64::try_from(self).unwrap_or(u64::MAX))
    }

    fn from_witness(value: &WitnessValue) -> Option<Self> {
        match value {
            WitnessValue::UInt(v) => usize::try_from(*v).ok(),
            _ => None,
        }
    }
}

impl Witness for char {
    const KIND: WitnessKind = WitnessKind::Char;

    fn into_witness(self) -> WitnessValue {
        WitnessValue::Char(self)
    }

    fn from_witness(value: &WitnessValue) -> Option<Self> {
        match value {
            WitnessValue::Char(v) => Some(*v),
            _ => None,
        }
    }
}

impl Witness for String {
    const KIND: WitnessKind = WitnessKind::Text;

    fn into_witness(self) -> WitnessValue {
        WitnessValue::Text(self)
    }

    fn from_witness(value: &WitnessValue) -> Option<Self> {
        match value {
            WitnessValue::Text(v) => Some(v.clone()),
            _ => None,
        }
    }
}

impl<T: Witness> Witness for Vec<T> {
    const KIND: WitnessKind = WitnessKind::List;

    fn into_witness(self) -> WitnessValue {
        WitnessValue::List(self.into_iter().map(Witness::into_witness).collect())
    }

    fn from_witness(value: &WitnessValue) -> Option<Self> {
        match value {
            WitnessValue::List(items) => items.iter().map(T::from_witness).collect(),
            _ => None,
        }
    }
}
