use super::{Fields, Value};
use crate::record::RecordRef;

/// Conversion between a typed field and its [`Value`] form.
///
/// Backs the accessors generated by `model!`: `get_*` reads through
/// `from_value`, `set_*` writes through `into_value`.
pub trait FieldValue: Sized {
    fn from_value(value: &Value) -> Option<Self>;

    fn into_value(self) -> Value;
}

impl FieldValue for Value {
    fn from_value(value: &Value) -> Option<Self> {
        Some(value.clone())
    }

    fn into_value(self) -> Value {
        self
    }
}

impl FieldValue for bool {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_bool()
    }

    fn into_value(self) -> Value {
        Value::Bool(self)
    }
}

impl FieldValue for i64 {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_i64()
    }

    fn into_value(self) -> Value {
        Value::from(self)
    }
}

impl FieldValue for u64 {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_u64(),
            _ => None,
        }
    }

    fn into_value(self) -> Value {
        Value::from(self)
    }
}

impl FieldValue for f64 {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_f64()
    }

    fn into_value(self) -> Value {
        Value::from(self)
    }
}

impl FieldValue for String {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_str().map(str::to_string)
    }

    fn into_value(self) -> Value {
        Value::Text(self)
    }
}

impl FieldValue for RecordRef {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_record().cloned()
    }

    fn into_value(self) -> Value {
        Value::Record(self)
    }
}

impl FieldValue for Vec<Value> {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_list().map(<[Value]>::to_vec)
    }

    fn into_value(self) -> Value {
        Value::List(self)
    }
}

impl FieldValue for Fields {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_map().cloned()
    }

    fn into_value(self) -> Value {
        Value::Map(self)
    }
}
