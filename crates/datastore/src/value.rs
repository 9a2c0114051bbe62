//! Values and records.
//!
//! A [Record] is an ordered map from field name to [Value].  Records are loosely structured: two records written in
//! the same batch may have different fields, and the same field may hold values of different kinds.
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use smallvec::SmallVec;

use crate::errors::*;

/// A scalar value in a record.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

/// The kind of a [Value], without the payload.
///
/// Ordered so that sets of kinds iterate deterministically.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum ValueKind {
    Null,
    Boolean,
    Integer,
    Float,
    Text,
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Boolean(_) => ValueKind::Boolean,
            Value::Integer(_) => ValueKind::Integer,
            Value::Float(_) => ValueKind::Float,
            Value::Text(_) => ValueKind::Text,
        }
    }

    /// Convert a JSON value.
    ///
    /// Integers which don't fit in an i64 become floats.  Arrays and objects are kept as their JSON text, which is
    /// what we'd store for them anyway.
    pub fn from_json(value: serde_json::Value) -> Value {
        use serde_json::Value as J;

        match value {
            J::Null => Value::Null,
            J::Bool(b) => Value::Boolean(b),
            J::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
            },
            J::String(s) => Value::Text(s),
            nested @ (J::Array(_) | J::Object(_)) => Value::Text(nested.to_string()),
        }
    }

    /// Convert to JSON.  Non-finite floats have no JSON representation and become null.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as J;

        match self {
            Value::Null => J::Null,
            Value::Boolean(b) => J::Bool(*b),
            Value::Integer(i) => J::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(J::Number)
                .unwrap_or(J::Null),
            Value::Text(s) => J::String(s.clone()),
        }
    }
}

macro_rules! value_from {
    ($variant:ident, $($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Value {
                    Value::$variant(v.into())
                }
            }
        )*
    };
}

value_from!(Boolean, bool);
value_from!(Integer, i8, i16, i32, i64, u8, u16, u32);
value_from!(Float, f32, f64);
value_from!(Text, String, &str);

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Value {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            // sqlite has no boolean type.
            Value::Boolean(b) => ToSqlOutput::Borrowed(ValueRef::Integer(*b as i64)),
            Value::Integer(i) => ToSqlOutput::Borrowed(ValueRef::Integer(*i)),
            Value::Float(f) => ToSqlOutput::Borrowed(ValueRef::Real(*f)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        })
    }
}

impl FromSql for Value {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value {
            ValueRef::Null => Ok(Value::Null),
            ValueRef::Integer(i) => Ok(Value::Integer(i)),
            ValueRef::Real(f) => Ok(Value::Float(f)),
            ValueRef::Text(t) => Ok(Value::Text(String::from_utf8_lossy(t).into_owned())),
            ValueRef::Blob(_) => Err(FromSqlError::InvalidType),
        }
    }
}

/// Records are usually small, so instead of a hashmap we keep a `SmallVec` of entries in insertion order.
#[derive(Clone, Debug, PartialEq)]
struct RecordEntry {
    name: String,
    value: Value,
}

/// An ordered mapping from field name to value.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Record {
    entries: SmallVec<[RecordEntry; 16]>,
}

impl Record {
    pub fn new() -> Record {
        Default::default()
    }

    /// Set a field, returning the previous value if there was one.  Replacing keeps the field's position.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let name = name.into();
        let value = value.into();

        if let Some(e) = self.entries.iter_mut().find(|e| e.name == name) {
            return Some(std::mem::replace(&mut e.value, value));
        }

        self.entries.push(RecordEntry { name, value });
        None
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| &e.value)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|e| (e.name.as_str(), &e.value))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Build a record from a JSON object.  Fields come out in the order serde_json's map iterates them.
    pub fn from_json(value: serde_json::Value) -> Result<Record> {
        match value {
            serde_json::Value::Object(map) => Ok(map
                .into_iter()
                .map(|(k, v)| (k, Value::from_json(v)))
                .collect()),
            other => Err(Error::NotAnObject(other.to_string())),
        }
    }

    /// Build a record from anything serde can serialize to a JSON object, e.g. a struct.
    pub fn from_serialize(value: &impl serde::Serialize) -> Result<Record> {
        // Going through serde_json is the quickest way to get something we can walk.  If this proves too slow, a
        // custom serializer can replace it.
        Record::from_json(serde_json::to_value(value)?)
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.entries
                .iter()
                .map(|e| (e.name.clone(), e.value.to_json()))
                .collect(),
        )
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut r = Record::new();
        for (k, v) in iter {
            r.insert(k, v);
        }
        r
    }
}
