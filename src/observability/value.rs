//! Extra field values and their JSON reduction.
//!
//! [`FieldValue`] is the closed set of shapes a log record can carry as an
//! extra attribute. [`serialize_field`] reduces any of them to a
//! `serde_json::Value`, dispatching on the variant in a fixed order.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Number, Value};
use uuid::Uuid;

/// Boxed error returned by value coercions.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failure to reduce a value to JSON.
#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    /// A binary payload was not valid UTF-8.
    #[error("binary payload is not valid utf-8: {0}")]
    Decode(#[from] std::str::Utf8Error),

    /// A domain object failed to dump itself.
    #[error("failed to dump {type_name}: {source}")]
    Dump {
        type_name: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// Neither coercion produced a mapping.
    #[error("cannot serialize {type_name}: {}", .errors.join("; "))]
    Unrepresentable {
        type_name: &'static str,
        errors: Vec<String>,
    },
}

/// A domain object that can dump itself to a JSON mapping.
///
/// Implemented for every `Serialize` type.
pub trait Dump: fmt::Debug + Send + Sync {
    fn dump(&self) -> Result<Value, serde_json::Error>;

    fn type_name(&self) -> &'static str;
}

impl<T> Dump for T
where
    T: Serialize + fmt::Debug + Send + Sync,
{
    fn dump(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

/// A value with no direct JSON shape.
///
/// The serializer first asks for a mapping view and then for the value's
/// attributes. When both fail the record cannot be formatted.
pub trait Coerce: fmt::Debug + Send + Sync {
    fn to_mapping(&self) -> Result<Fields, BoxError> {
        Err(format!("{} is not a mapping", self.type_name()).into())
    }

    fn attributes(&self) -> Result<Fields, BoxError> {
        Err(format!("{} has no attributes", self.type_name()).into())
    }

    fn type_name(&self) -> &'static str;
}

/// One extra attribute value.
#[derive(Debug, Clone)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
    DateTime(DateTime<FixedOffset>),
    NaiveDateTime(NaiveDateTime),
    Date(NaiveDate),
    Map(Fields),
    Seq(Vec<FieldValue>),
    Bytes(Bytes),
    Uuid(Uuid),
    Object(Arc<dyn Dump>),
    Opaque(Arc<dyn Coerce>),
}

impl FieldValue {
    /// Wrap a serializable domain object.
    pub fn object<T>(value: T) -> Self
    where
        T: Serialize + fmt::Debug + Send + Sync + 'static,
    {
        FieldValue::Object(Arc::new(value))
    }

    /// Wrap a value that only offers coercions.
    pub fn opaque<T: Coerce + 'static>(value: T) -> Self {
        FieldValue::Opaque(Arc::new(value))
    }
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for FieldValue {
                fn from(value: $ty) -> Self {
                    FieldValue::$variant(value.into())
                }
            }
        )*
    };
}

impl_from! {
    bool => Bool,
    i32 => Int,
    i64 => Int,
    u16 => UInt,
    u32 => UInt,
    u64 => UInt,
    f64 => Float,
    String => Str,
    &str => Str,
    NaiveDateTime => NaiveDateTime,
    NaiveDate => Date,
    Fields => Map,
    Bytes => Bytes,
    Uuid => Uuid,
}

impl From<usize> for FieldValue {
    fn from(value: usize) -> Self {
        FieldValue::UInt(value as u64)
    }
}

impl<Tz: TimeZone> From<DateTime<Tz>> for FieldValue {
    fn from(value: DateTime<Tz>) -> Self {
        FieldValue::DateTime(value.fixed_offset())
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(FieldValue::Null, Into::into)
    }
}

impl<T: Into<FieldValue>> From<Vec<T>> for FieldValue {
    fn from(value: Vec<T>) -> Self {
        FieldValue::Seq(value.into_iter().map(Into::into).collect())
    }
}

/// Ordered extra attributes. Inserting an existing key replaces its value
/// in place.
#[derive(Debug, Clone, Default)]
pub struct Fields(IndexMap<String, FieldValue>);

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<FieldValue>) {
        self.0.insert(key.into(), value.into());
    }

    /// Insert only when the key is not present yet.
    pub fn insert_if_absent(&mut self, key: impl Into<String>, value: impl Into<FieldValue>) {
        self.0.entry(key.into()).or_insert_with(|| value.into());
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K: Into<String>, V: Into<FieldValue>> FromIterator<(K, V)> for Fields {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut fields = Fields::new();
        for (k, v) in iter {
            fields.insert(k, v);
        }
        fields
    }
}

/// Build [`Fields`] from `key => value` pairs.
#[macro_export]
macro_rules! fields {
    () => { $crate::observability::Fields::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {
        $crate::observability::Fields::new()$(.with($key, $value))+
    };
}

/// Reduce a field value to JSON.
pub fn serialize_field(value: &FieldValue) -> Result<Value, SerializeError> {
    match value {
        FieldValue::Null => Ok(Value::Null),
        FieldValue::Bool(b) => Ok(Value::Bool(*b)),
        FieldValue::Int(n) => Ok(Value::from(*n)),
        FieldValue::UInt(n) => Ok(Value::from(*n)),
        // Non-finite floats have no JSON form and fall back to their text.
        FieldValue::Float(f) => Ok(Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(f.to_string()))),
        FieldValue::Str(s) => Ok(Value::String(s.clone())),
        FieldValue::DateTime(dt) => Ok(Value::String(dt.to_rfc3339_opts(SecondsFormat::AutoSi, false))),
        FieldValue::NaiveDateTime(dt) => Ok(Value::String(dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string())),
        FieldValue::Date(d) => Ok(Value::String(d.format("%Y-%m-%d").to_string())),
        FieldValue::Map(fields) => serialize_fields(fields).map(Value::Object),
        FieldValue::Seq(items) => items
            .iter()
            .map(serialize_field)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        FieldValue::Bytes(bytes) => {
            let text = std::str::from_utf8(bytes)?;
            Ok(serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string())))
        }
        FieldValue::Uuid(id) => Ok(Value::String(id.to_string())),
        FieldValue::Object(object) => object.dump().map_err(|source| SerializeError::Dump {
            type_name: object.type_name(),
            source,
        }),
        FieldValue::Opaque(opaque) => {
            let mapping = match opaque.to_mapping() {
                Ok(mapping) => mapping,
                Err(first) => opaque.attributes().map_err(|second| SerializeError::Unrepresentable {
                    type_name: opaque.type_name(),
                    errors: vec![first.to_string(), second.to_string()],
                })?,
            };
            serialize_fields(&mapping).map(Value::Object)
        }
    }
}

/// Reduce every value of a field collection, keeping key order.
pub fn serialize_fields(fields: &Fields) -> Result<Map<String, Value>, SerializeError> {
    fields
        .iter()
        .map(|(k, v)| Ok((k.to_string(), serialize_field(v)?)))
        .collect()
}
