//! Runtime values of the four WebAssembly number types.

use crate::model::ValueType;
use std::fmt;

/// A runtime value: a 32 or 64 bit two's-complement integer,
/// or an IEEE-754 binary32/binary64 float.
/// NaN payloads pass through loads, stores,
/// and reinterpretations bit-for-bit.
///
/// # Examples
/// ```rust
/// use wasmkit::interpreter::Value;
/// use wasmkit::ValueType;
///
/// assert_eq!(Value::from(42i32).kind(), ValueType::I32);
/// assert_eq!(Value::from(2.5f64).kind(), ValueType::F64);
/// assert_eq!(Value::default_of(ValueType::I64), Value::I64(0));
/// ```
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Value {
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
}

impl Value {
    /// The value type of this value.
    pub fn kind(&self) -> ValueType {
        match self {
            Value::I32(_) => ValueType::I32,
            Value::I64(_) => ValueType::I64,
            Value::F32(_) => ValueType::F32,
            Value::F64(_) => ValueType::F64,
        }
    }

    /// The zero value of the given type,
    /// used to initialize locals and globals.
    pub fn default_of(kind: ValueType) -> Value {
        match kind {
            ValueType::I32 => Value::I32(0),
            ValueType::I64 => Value::I64(0),
            ValueType::F32 => Value::F32(0.0),
            ValueType::F64 => Value::F64(0.0),
        }
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::I32(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::I64(value)
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::I32(value as i32)
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Value::I64(value as i64)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::F32(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::F64(value)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::I32(value) => write!(f, "{value}"),
            Value::I64(value) => write!(f, "{value}"),
            Value::F32(value) => write!(f, "{value}"),
            Value::F64(value) => write!(f, "{value}"),
        }
    }
}
