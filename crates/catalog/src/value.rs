//! Field values and declared field types.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;

/// Date formats accepted on input: ISO first, then `05-Mar-2021`.
const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%d-%b-%Y"];

/// A single cell of a record.
///
/// `Integer` and `Float` are both numeric and compare with each other by
/// value. No other variants are coerced into one another.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    List(Vec<Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Type-sensitive equality, numeric across `Integer`/`Float`.
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (a, b) if a.as_f64().is_some() && b.as_f64().is_some() => a.as_f64() == b.as_f64(),
            (Self::List(a), Self::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.equals(y))
            }
            (a, b) => a == b,
        }
    }

    /// Natural ordering: numeric, chronological or lexicographic.
    ///
    /// `None` when the two values are not comparable (null, lists, booleans,
    /// mixed kinds).
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Self::Integer(a), Self::Integer(b)) => Some(a.cmp(b)),
            (Self::Text(a), Self::Text(b)) => Some(a.cmp(b)),
            (Self::Date(a), Self::Date(b)) => Some(a.cmp(b)),
            (a, b) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        }
    }

    /// Whether the list contains `needle`. `false` for non-lists.
    pub fn contains(&self, needle: &Value) -> bool {
        match self {
            Self::List(items) => items.iter().any(|item| item.equals(needle)),
            _ => false,
        }
    }

    /// Convert an untyped JSON scalar or array.
    pub fn from_json(json: &serde_json::Value) -> Result<Value, String> {
        match json {
            serde_json::Value::Null => Ok(Self::Null),
            serde_json::Value::Bool(b) => Ok(Self::Bool(*b)),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Ok(Self::Integer(i)),
                None => n
                    .as_f64()
                    .map(Self::Float)
                    .ok_or_else(|| format!("number {} is out of range", n)),
            },
            serde_json::Value::String(s) => Ok(Self::Text(s.clone())),
            serde_json::Value::Array(items) => items
                .iter()
                .map(Self::from_json)
                .collect::<Result<Vec<_>, _>>()
                .map(Self::List),
            serde_json::Value::Object(_) => Err("nested objects are not supported".to_string()),
        }
    }

    /// Convert a JSON value into `field_type`.
    ///
    /// Integer fields accept floats with no fractional part, float fields
    /// accept integers, date fields accept strings in either date format.
    /// `null` always converts to `Value::Null`.
    pub fn coerce(json: &serde_json::Value, field_type: &FieldType) -> Result<Value, String> {
        use serde_json::Value as Json;

        match (field_type, json) {
            (_, Json::Null) => Ok(Self::Null),
            (FieldType::Bool, Json::Bool(b)) => Ok(Self::Bool(*b)),
            (FieldType::Text, Json::String(s)) => Ok(Self::Text(s.clone())),
            (FieldType::Integer, Json::Number(n)) => match (n.as_i64(), n.as_f64()) {
                (Some(i), _) => Ok(Self::Integer(i)),
                (None, Some(f)) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                    Ok(Self::Integer(f as i64))
                }
                _ => Err(format!("{} is not an integer", n)),
            },
            (FieldType::Float, Json::Number(n)) => n
                .as_f64()
                .map(Self::Float)
                .ok_or_else(|| format!("number {} is out of range", n)),
            (FieldType::Date, Json::String(s)) => parse_date(s).map(Self::Date),
            (FieldType::List(inner), Json::Array(items)) => items
                .iter()
                .map(|item| Self::coerce(item, inner))
                .collect::<Result<Vec<_>, _>>()
                .map(Self::List),
            (expected, actual) => Err(format!("expected {}, got {}", expected, actual)),
        }
    }
}

/// Parse a date in any of the accepted formats.
pub fn parse_date(s: &str) -> Result<NaiveDate, String> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s.trim(), fmt).ok())
        .ok_or_else(|| format!("'{}' is not a date (expected YYYY-MM-DD)", s))
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Integer(i) => serializer.serialize_i64(*i),
            Self::Float(f) => serializer.serialize_f64(*f),
            Self::Text(s) => serializer.serialize_str(s),
            Self::Date(d) => serializer.serialize_str(&d.format("%Y-%m-%d").to_string()),
            Self::List(items) => items.serialize(serializer),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
            Self::Text(s) => write!(f, "{:?}", s),
            Self::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Self::List(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
        }
    }
}

/// Declared type of a column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Integer,
    Float,
    Date,
    Bool,
    List(Box<FieldType>),
}

impl FieldType {
    pub fn list_of(inner: FieldType) -> Self {
        Self::List(Box::new(inner))
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer | Self::Float)
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Self::List(_))
    }

    /// Whether `<`, `>` and friends are meaningful for this type.
    pub fn is_ordered(&self) -> bool {
        matches!(self, Self::Integer | Self::Float | Self::Date | Self::Text)
    }

    /// Smallest type covering both, if any. Integer widens to float.
    pub fn unify(&self, other: &FieldType) -> Option<FieldType> {
        match (self, other) {
            (a, b) if a == b => Some(a.clone()),
            (Self::Integer, Self::Float) | (Self::Float, Self::Integer) => Some(Self::Float),
            (Self::List(a), Self::List(b)) => a.unify(b).map(Self::list_of),
            _ => None,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Integer => write!(f, "integer"),
            Self::Float => write!(f, "float"),
            Self::Date => write!(f, "date"),
            Self::Bool => write!(f, "bool"),
            Self::List(inner) => write!(f, "list<{}>", inner),
        }
    }
}
