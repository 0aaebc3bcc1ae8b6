use std::{borrow::Cow, time::Duration};

use serde::ser::{Error as _, Serialize, SerializeMap, SerializeSeq, Serializer};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

/// A named structured field attached to a log record.
///
/// # Examples
/// ```rust
/// use actix_web_middleware_reqlog::{Attr, Value};
///
/// let attr = Attr::group("user", vec![Attr::new("id", 42u64), Attr::new("name", "ada")]);
/// assert_eq!(attr.value().get("name").and_then(Value::as_str), Some("ada"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Attr {
    key: Cow<'static, str>,
    value: Value,
}

impl Attr {
    pub fn new(key: impl Into<Cow<'static, str>>, value: impl Into<Value>) -> Self {
        Attr {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Nest `attrs` under `key`. Rendered as a map by structured writers.
    pub fn group(key: impl Into<Cow<'static, str>>, attrs: Vec<Attr>) -> Self {
        Attr {
            key: key.into(),
            value: Value::Group(attrs),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &Value {
        &self.value
    }
}

/// Typed value of an [`Attr`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Str(String),
    /// Serialized as a human readable string. Example: 25.958µs
    Duration(Duration),
    /// Serialized in RFC3339 format. Example: 2019-05-29T18:51:00.000000Z
    Time(OffsetDateTime),
    List(Vec<Value>),
    Group(Vec<Attr>),
}

impl Value {
    pub fn list<I>(items: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        Value::List(items.into_iter().map(Into::into).collect())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_group(&self) -> Option<&[Attr]> {
        match self {
            Value::Group(attrs) => Some(attrs),
            _ => None,
        }
    }

    /// Look up `key` inside a group value. Returns the last match, the way
    /// a map built from the group would.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_group()?
            .iter()
            .rev()
            .find(|attr| attr.key() == key)
            .map(Attr::value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<Cow<'_, str>> for Value {
    fn from(value: Cow<'_, str>) -> Self {
        Value::Str(value.into_owned())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value.into())
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Value::Uint(value)
    }
}

impl From<u16> for Value {
    fn from(value: u16) -> Self {
        Value::Uint(value.into())
    }
}

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        Value::Uint(value as u64)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<Duration> for Value {
    fn from(value: Duration) -> Self {
        Value::Duration(value)
    }
}

impl From<OffsetDateTime> for Value {
    fn from(value: OffsetDateTime) -> Self {
        Value::Time(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Bool(v) => serializer.serialize_bool(*v),
            Value::Int(v) => serializer.serialize_i64(*v),
            Value::Uint(v) => serializer.serialize_u64(*v),
            Value::Float(v) => serializer.serialize_f64(*v),
            Value::Str(v) => serializer.serialize_str(v),
            Value::Duration(v) => serializer.collect_str(&format_args!("{v:?}")),
            Value::Time(v) => {
                let formatted = v.format(&Rfc3339).map_err(S::Error::custom)?;
                serializer.serialize_str(&formatted)
            }
            Value::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Group(attrs) => {
                let mut map = serializer.serialize_map(Some(attrs.len()))?;
                for attr in attrs {
                    map.serialize_entry(attr.key(), attr.value())?;
                }
                map.end()
            }
        }
    }
}
