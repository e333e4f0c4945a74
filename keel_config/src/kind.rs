use serde_value::Value;
use std::fmt::{Display, Formatter};

/// The kind of a raw document value, as seen by a [`DecodeHook`](crate::DecodeHook).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// `true` or `false`
    Bool,
    /// Any signed or unsigned integer
    Integer,
    /// Any floating-point number
    Float,
    /// A single character
    Char,
    /// A string
    Str,
    /// A byte buffer
    Bytes,
    /// An explicit absence of value (e.g., YAML `null`)
    Unit,
    /// An optional value
    Option,
    /// A sequence
    Seq,
    /// A mapping
    Map,
    /// A newtype wrapper
    Newtype,
}

/// The kind of value a decoding target asks for, as seen by a
/// [`DecodeHook`](crate::DecodeHook).
///
/// Named targets carry the Rust type name reported by their `Deserialize`
/// implementation, e.g. `Struct("Duration")` for [`std::time::Duration`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    /// A self-describing target that accepts whatever is there
    Any,
    /// `bool`
    Bool,
    /// Any integer type
    Integer,
    /// Any floating-point type
    Float,
    /// `char`
    Char,
    /// `&str` or `String`
    Str,
    /// Byte buffers
    Bytes,
    /// `Option<T>`
    Option,
    /// `()`
    Unit,
    /// Sequences of any length
    Seq,
    /// Tuples
    Tuple,
    /// Maps
    Map,
    /// A struct with named fields
    Struct(&'static str),
    /// A struct without fields
    UnitStruct(&'static str),
    /// A single-field tuple struct
    NewtypeStruct(&'static str),
    /// A tuple struct
    TupleStruct(&'static str),
    /// An enum
    Enum(&'static str),
    /// A field or variant name; never hooked
    Identifier,
    /// A value that is skipped; never hooked
    Ignored,
}

impl SourceKind {
    /// Classifies the given document value.
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Bool(_) => Self::Bool,
            Value::U8(_)
            | Value::U16(_)
            | Value::U32(_)
            | Value::U64(_)
            | Value::I8(_)
            | Value::I16(_)
            | Value::I32(_)
            | Value::I64(_) => Self::Integer,
            Value::F32(_) | Value::F64(_) => Self::Float,
            Value::Char(_) => Self::Char,
            Value::String(_) => Self::Str,
            Value::Bytes(_) => Self::Bytes,
            Value::Unit => Self::Unit,
            Value::Option(_) => Self::Option,
            Value::Seq(_) => Self::Seq,
            Value::Map(_) => Self::Map,
            Value::Newtype(_) => Self::Newtype,
        }
    }

    /// Reports whether this is a single textual or numeric value.
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Self::Bool | Self::Integer | Self::Float | Self::Char | Self::Str,
        )
    }
}

impl TargetKind {
    /// Reports whether hooks are consulted for this target at all.
    pub fn is_hookable(&self) -> bool {
        !matches!(self, Self::Identifier | Self::Ignored)
    }

    /// The Rust type name of a named target.
    pub fn name(&self) -> Option<&'static str> {
        match self {
            Self::Struct(name)
            | Self::UnitStruct(name)
            | Self::NewtypeStruct(name)
            | Self::TupleStruct(name)
            | Self::Enum(name) => Some(*name),
            _ => None,
        }
    }
}

impl Display for SourceKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Bool => "bool",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Char => "char",
            Self::Str => "string",
            Self::Bytes => "bytes",
            Self::Unit => "null",
            Self::Option => "option",
            Self::Seq => "sequence",
            Self::Map => "map",
            Self::Newtype => "newtype",
        };

        f.write_str(name)
    }
}

impl Display for TargetKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if let Some(name) = self.name() {
            return f.write_str(name);
        }

        let name = match self {
            Self::Any => "any",
            Self::Bool => "bool",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Char => "char",
            Self::Str => "string",
            Self::Bytes => "bytes",
            Self::Option => "option",
            Self::Unit => "unit",
            Self::Seq => "sequence",
            Self::Tuple => "tuple",
            Self::Map => "map",
            Self::Identifier => "identifier",
            _ => "ignored",
        };

        f.write_str(name)
    }
}
