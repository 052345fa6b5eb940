//! Typed argument and return values carried through mocks.
//!
//! Mocked functions are C-like: their arguments are scalars, pointers,
//! strings, or byte buffers. [`ArgValue`] captures one such value at call
//! time so the ledger can hold it after the caller's storage is gone.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Declared type of a mock argument or return value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgType {
    Void,
    Bool,
    Int,
    UInt,
    Float,
    Ptr,
    Str,
    Bytes,
}

impl ArgType {
    /// Zero value for this type; the default strict-mode result of a mock.
    #[must_use]
    pub fn zero(self) -> ArgValue {
        match self {
            Self::Void => ArgValue::Void,
            Self::Bool => ArgValue::Bool(false),
            Self::Int => ArgValue::Int(0),
            Self::UInt => ArgValue::UInt(0),
            Self::Float => ArgValue::Float(0.0),
            Self::Ptr => ArgValue::Ptr(0),
            Self::Str => ArgValue::Str(String::new()),
            Self::Bytes => ArgValue::Bytes(Vec::new()),
        }
    }
}

impl fmt::Display for ArgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Void => "void",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::UInt => "uint",
            Self::Float => "float",
            Self::Ptr => "ptr",
            Self::Str => "str",
            Self::Bytes => "bytes",
        };
        f.write_str(s)
    }
}

/// A value captured at invocation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum ArgValue {
    Void,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    /// Address only; the pointee is never dereferenced by the runtime.
    Ptr(usize),
    Str(String),
    Bytes(Vec<u8>),
}

impl ArgValue {
    #[must_use]
    pub fn ty(&self) -> ArgType {
        match self {
            Self::Void => ArgType::Void,
            Self::Bool(_) => ArgType::Bool,
            Self::Int(_) => ArgType::Int,
            Self::UInt(_) => ArgType::UInt,
            Self::Float(_) => ArgType::Float,
            Self::Ptr(_) => ArgType::Ptr,
            Self::Str(_) => ArgType::Str,
            Self::Bytes(_) => ArgType::Bytes,
        }
    }

    /// Build a pointer value from a reference, recording only its address.
    #[must_use]
    pub fn ptr_of<T>(value: &T) -> Self {
        Self::Ptr(std::ptr::from_ref(value) as usize)
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_uint(&self) -> Option<u64> {
        match self {
            Self::UInt(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_ptr(&self) -> Option<usize> {
        match self {
            Self::Ptr(p) => Some(*p),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Void => f.write_str("void"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::UInt(v) => write!(f, "{v}u"),
            Self::Float(v) => write!(f, "{v:?}"),
            Self::Ptr(p) => write!(f, "{p:#x}"),
            Self::Str(s) => write!(f, "{s:?}"),
            Self::Bytes(b) => write!(f, "{b:?}"),
        }
    }
}

macro_rules! impl_from_signed {
    ($($t:ty),*) => {$(
        impl From<$t> for ArgValue {
            fn from(v: $t) -> Self {
                Self::Int(i64::from(v))
            }
        }
    )*};
}

macro_rules! impl_from_unsigned {
    ($($t:ty),*) => {$(
        impl From<$t> for ArgValue {
            fn from(v: $t) -> Self {
                Self::UInt(u64::from(v))
            }
        }
    )*};
}

impl_from_signed!(i8, i16, i32, i64);
impl_from_unsigned!(u8, u16, u32, u64);

impl From<usize> for ArgValue {
    fn from(v: usize) -> Self {
        Self::UInt(u64::try_from(v).unwrap_or(u64::MAX))
    }
}

impl From<bool> for ArgValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<f32> for ArgValue {
    fn from(v: f32) -> Self {
        Self::Float(f64::from(v))
    }
}

impl From<f64> for ArgValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for ArgValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for ArgValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<Vec<u8>> for ArgValue {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl From<&[u8]> for ArgValue {
    fn from(v: &[u8]) -> Self {
        Self::Bytes(v.to_vec())
    }
}

impl From<()> for ArgValue {
    fn from((): ()) -> Self {
        Self::Void
    }
}

/// One declared argument of a mocked function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgSpec {
    pub name: String,
    pub ty: ArgType,
}

impl ArgSpec {
    #[must_use]
    pub fn new(name: impl Into<String>, ty: ArgType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// Declared shape of a mocked function. Argument positions follow
/// declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MockSignature {
    pub name: String,
    pub args: Vec<ArgSpec>,
    pub returns: ArgType,
}

impl MockSignature {
    /// Start a signature for a void function with no arguments.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
            returns: ArgType::Void,
        }
    }

    /// Append an argument.
    #[must_use]
    pub fn arg(mut self, name: impl Into<String>, ty: ArgType) -> Self {
        self.args.push(ArgSpec::new(name, ty));
        self
    }

    /// Set the return type.
    #[must_use]
    pub fn returns(mut self, ty: ArgType) -> Self {
        self.returns = ty;
        self
    }

    /// Position of the named argument, if declared.
    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.args.iter().position(|a| a.name == name)
    }

    #[must_use]
    pub fn arity(&self) -> usize {
        self.args.len()
    }
}
