//! Catalog records.

use crate::value::Value;
use indexmap::IndexMap;
use serde::Serialize;

static NULL: Value = Value::Null;

/// One product entry: an ordered mapping from column name to value.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct Record {
    fields: IndexMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, used when assembling records in code.
    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    pub(crate) fn insert(&mut self, name: String, value: Value) {
        self.fields.insert(name, value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Value of a column, `Null` when the record lacks it.
    pub fn value(&self, name: &str) -> &Value {
        self.fields.get(name).unwrap_or(&NULL)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.fields
                .iter()
                .map(|(k, v)| (k.clone(), serde_json::to_value(v).unwrap_or_default()))
                .collect(),
        )
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_column_reads_as_null() {
        let record = Record::new().with("id", Value::Integer(1));
        assert_eq!(record.value("id"), &Value::Integer(1));
        assert!(record.value("watt").is_null());
        assert!(record.get("watt").is_none());
    }

    #[test]
    fn test_column_order_preserved_in_json() {
        let record = Record::new()
            .with("name", Value::Text("XBO 2000 W/HS OFR".to_string()))
            .with("nennleistung", Value::Float(2000.0))
            .with("erzeugnisnummer", Value::List(vec![Value::Integer(4008321)]));

        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(
            json,
            r#"{"name":"XBO 2000 W/HS OFR","nennleistung":2000.0,"erzeugnisnummer":[4008321]}"#
        );
        assert_eq!(record.to_json()["nennleistung"], 2000.0);
    }
}
