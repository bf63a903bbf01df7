//! Search conditions and filter specs.

use crate::schema::{FieldDef, Schema};
use crate::value::{FieldType, Value};
use lumen_core::{AppError, AppResult};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Comparison operator of a `Compare` condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
}

impl Operator {
    pub const ALL: [Operator; 6] = [
        Operator::Eq,
        Operator::Ne,
        Operator::Gt,
        Operator::Ge,
        Operator::Lt,
        Operator::Le,
    ];

    /// Parse an operator token.
    ///
    /// # Errors
    /// `AppError::UnsupportedOperator` for anything outside the six symbols.
    pub fn parse(token: &str) -> AppResult<Self> {
        Self::ALL
            .into_iter()
            .find(|op| op.symbol() == token.trim())
            .ok_or_else(|| AppError::UnsupportedOperator(token.to_string()))
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Lt => "<",
            Self::Le => "<=",
        }
    }

    /// Whether the operator needs an ordering rather than equality.
    pub fn is_ordering(&self) -> bool {
        !matches!(self, Self::Eq | Self::Ne)
    }

    /// Evaluate `left <op> right`.
    ///
    /// Null or incomparable operands satisfy only `!=`.
    pub fn evaluate(&self, left: &Value, right: &Value) -> bool {
        match self {
            Self::Eq => left.equals(right),
            Self::Ne => !left.equals(right),
            ordering => match left.compare(right) {
                Some(ord) => ordering.holds(ord),
                None => false,
            },
        }
    }

    fn holds(&self, ord: Ordering) -> bool {
        match self {
            Self::Eq => ord == Ordering::Equal,
            Self::Ne => ord != Ordering::Equal,
            Self::Gt => ord == Ordering::Greater,
            Self::Ge => ord != Ordering::Less,
            Self::Lt => ord == Ordering::Less,
            Self::Le => ord != Ordering::Greater,
        }
    }
}

impl FromStr for Operator {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Constraint on a single column.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// No constraint
    Null,
    /// Column equals the value (membership when the column is a list)
    Equals(Value),
    /// List column contains the value
    Membership(Value),
    /// `column <op> value`
    Compare(Operator, Value),
}

impl Condition {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Parse one condition from extraction output.
    ///
    /// `null` is no constraint, `{"operator", "value"}` is a comparison and a
    /// bare scalar is equality, or membership for list columns.
    pub fn from_json(field: &FieldDef, json: &serde_json::Value) -> AppResult<Self> {
        let condition = match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Object(object) => {
                let (Some(operator), Some(value)) = (object.get("operator"), object.get("value"))
                else {
                    return Err(AppError::Schema(format!(
                        "Condition on '{}' must be null, a value, or {{operator, value}}",
                        field.name
                    )));
                };
                let token = operator.as_str().ok_or_else(|| {
                    AppError::UnsupportedOperator(operator.to_string())
                })?;
                let op = Operator::parse(token)?;
                if value.is_null() {
                    return Ok(Self::Null);
                }
                Self::Compare(op, condition_value(field, scalar_type(&field.field_type), value)?)
            }
            scalar => match &field.field_type {
                FieldType::List(inner) => Self::Membership(condition_value(field, inner, scalar)?),
                other => Self::Equals(condition_value(field, other, scalar)?),
            },
        };

        condition.validate(field)?;
        Ok(condition)
    }

    /// Check that the condition can be evaluated against `field`.
    pub fn validate(&self, field: &FieldDef) -> AppResult<()> {
        let (op, value) = match self {
            Self::Null => return Ok(()),
            Self::Membership(value) => {
                if !field.field_type.is_list() {
                    return Err(AppError::Schema(format!(
                        "Membership condition on '{}', which is not a list column",
                        field.name
                    )));
                }
                (None, value)
            }
            Self::Equals(value) => (None, value),
            Self::Compare(op, value) => (Some(*op), value),
        };

        if value.is_null() {
            return Err(AppError::Schema(format!(
                "Condition on '{}' compares against null",
                field.name
            )));
        }

        if !fits(value, scalar_type(&field.field_type)) {
            return Err(AppError::Schema(format!(
                "Value {} cannot be compared with '{}' of type {}",
                value, field.name, field.field_type
            )));
        }

        if let Some(op) = op.filter(Operator::is_ordering) {
            if !field.field_type.is_ordered() {
                return Err(AppError::Schema(format!(
                    "Operator '{}' cannot be applied to '{}' of type {}",
                    op, field.name, field.field_type
                )));
            }
        }

        Ok(())
    }

    /// Whether `record_value` satisfies the condition for a column of `field_type`.
    pub fn matches(&self, field_type: &FieldType, record_value: &Value) -> bool {
        match self {
            Self::Null => true,
            Self::Membership(value) => record_value.contains(value),
            Self::Equals(value) if field_type.is_list() => record_value.contains(value),
            Self::Equals(value) => record_value.equals(value),
            Self::Compare(Operator::Eq, value) if field_type.is_list() => {
                record_value.contains(value)
            }
            Self::Compare(Operator::Ne, value) if field_type.is_list() => {
                !record_value.contains(value)
            }
            Self::Compare(op, value) => op.evaluate(record_value, value),
        }
    }
}

impl Serialize for Condition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::Equals(value) | Self::Membership(value) => value.serialize(serializer),
            Self::Compare(op, value) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("operator", op)?;
                map.serialize_entry("value", value)?;
                map.end()
            }
        }
    }
}

/// Element type for list columns, the column type otherwise.
fn scalar_type(field_type: &FieldType) -> &FieldType {
    match field_type {
        FieldType::List(inner) => inner,
        other => other,
    }
}

/// Whether a scalar operand can be compared with values of `field_type`.
fn fits(value: &Value, field_type: &FieldType) -> bool {
    match (value, field_type) {
        (Value::Integer(_) | Value::Float(_), ty) => ty.is_numeric(),
        (Value::Text(_), FieldType::Text) => true,
        (Value::Date(_), FieldType::Date) => true,
        (Value::Bool(_), FieldType::Bool) => true,
        _ => false,
    }
}

/// Convert a condition operand to the column's type.
///
/// Numeric columns take any number, so `10.0` can bound an integer column.
fn condition_value(
    field: &FieldDef,
    field_type: &FieldType,
    json: &serde_json::Value,
) -> AppResult<Value> {
    let converted = if field_type.is_numeric() && json.is_number() {
        Value::from_json(json)
    } else {
        Value::coerce(json, field_type)
    };

    converted.map_err(|e| {
        AppError::Schema(format!(
            "Value {} does not fit '{}' ({}): {}",
            json, field.name, field.field_type, e
        ))
    })
}

/// Ordered conditions, one per column, combined with AND.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSpec {
    conditions: Vec<(String, Condition)>,
}

impl FilterSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a condition. Unchecked; the filter engine validates before running.
    pub fn with(mut self, field: impl Into<String>, condition: Condition) -> Self {
        self.conditions.push((field.into(), condition));
        self
    }

    /// Parse and validate extraction output against `schema`.
    ///
    /// # Errors
    /// - `AppError::Schema` for unknown columns, malformed conditions or
    ///   operands that do not fit the column type
    /// - `AppError::UnsupportedOperator` for unknown operator tokens
    pub fn from_json(schema: &Schema, json: &serde_json::Value) -> AppResult<Self> {
        let object = json.as_object().ok_or_else(|| {
            AppError::Schema(format!("Filter spec must be a JSON object, got {}", json))
        })?;

        let mut spec = Self::new();
        for (name, raw) in object {
            let field = schema.require(name)?;
            spec.conditions
                .push((name.clone(), Condition::from_json(field, raw)?));
        }

        Ok(spec)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Condition)> {
        self.conditions.iter().map(|(name, c)| (name.as_str(), c))
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Conditions that actually constrain something.
    pub fn active(&self) -> impl Iterator<Item = (&str, &Condition)> {
        self.iter().filter(|(_, c)| !c.is_null())
    }
}

impl Serialize for FilterSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.conditions.len()))?;
        for (name, condition) in &self.conditions {
            map.serialize_entry(name, condition)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> Schema {
        Schema::illuminants()
    }

    #[test]
    fn test_operator_parse() {
        assert_eq!(Operator::parse(">=").unwrap(), Operator::Ge);
        assert_eq!(" < ".parse::<Operator>().unwrap(), Operator::Lt);
        match Operator::parse("=~") {
            Err(AppError::UnsupportedOperator(token)) => assert_eq!(token, "=~"),
            other => panic!("Expected unsupported operator, got {:?}", other),
        }
    }

    #[test]
    fn test_operator_evaluate() {
        let v100 = Value::Integer(100);
        let v150 = Value::Float(150.0);
        assert!(Operator::Lt.evaluate(&v100, &v150));
        assert!(Operator::Ge.evaluate(&v150, &Value::Integer(150)));
        assert!(!Operator::Gt.evaluate(&v150, &Value::Integer(150)));
        assert!(Operator::Ne.evaluate(&Value::Null, &v100));
        assert!(!Operator::Ge.evaluate(&Value::Null, &v100));
    }

    #[test]
    fn test_parse_spec_kinds() {
        let spec = FilterSpec::from_json(
            &schema(),
            &json!({
                "name": "XBO 4000 W/HS XL OFR",
                "nennleistung": {"operator": ">=", "value": 2000.0},
                "erzeugnisnummer": 4008321,
                "kuehlung": null
            }),
        )
        .unwrap();

        let conditions: Vec<_> = spec.iter().collect();
        assert_eq!(conditions.len(), 4);
        assert_eq!(
            conditions[0],
            ("name", &Condition::Equals(Value::Text("XBO 4000 W/HS XL OFR".to_string())))
        );
        assert_eq!(
            conditions[1],
            ("nennleistung", &Condition::Compare(Operator::Ge, Value::Float(2000.0)))
        );
        assert_eq!(
            conditions[2],
            ("erzeugnisnummer", &Condition::Membership(Value::Integer(4008321)))
        );
        assert_eq!(conditions[3], ("kuehlung", &Condition::Null));
        assert_eq!(spec.active().count(), 3);
    }

    #[test]
    fn test_parse_spec_unknown_field() {
        let result = FilterSpec::from_json(&schema(), &json!({"wattage": 100}));
        match result {
            Err(AppError::Schema(msg)) => assert!(msg.contains("wattage")),
            other => panic!("Expected schema error, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_spec_unsupported_operator() {
        let result = FilterSpec::from_json(
            &schema(),
            &json!({"lifetime": {"operator": "~=", "value": 1000}}),
        );
        assert!(matches!(result, Err(AppError::UnsupportedOperator(_))));
    }

    #[test]
    fn test_parse_spec_type_mismatch() {
        let result = FilterSpec::from_json(&schema(), &json!({"name": 42}));
        assert!(matches!(result, Err(AppError::Schema(_))));

        let result = FilterSpec::from_json(
            &schema(),
            &json!({"nennleistung": {"operator": ">", "value": "viel"}}),
        );
        assert!(matches!(result, Err(AppError::Schema(_))));
    }

    #[test]
    fn test_parse_spec_date_comparison() {
        let spec = FilterSpec::from_json(
            &schema(),
            &json!({"datum_deklaration": {"operator": ">", "value": "2021-01-01"}}),
        )
        .unwrap();
        let (_, condition) = spec.iter().next().unwrap();
        assert!(matches!(condition, Condition::Compare(Operator::Gt, Value::Date(_))));
    }

    #[test]
    fn test_ordering_on_list_column_rejected() {
        let field = schema().require("erzeugnisnummer").unwrap().clone();
        let condition = Condition::Compare(Operator::Gt, Value::Integer(5));
        assert!(matches!(condition.validate(&field), Err(AppError::Schema(_))));
    }

    #[test]
    fn test_hand_built_operand_type_checked() {
        let field = schema().require("name").unwrap().clone();
        let condition = Condition::Compare(Operator::Gt, Value::Integer(3));
        assert!(matches!(condition.validate(&field), Err(AppError::Schema(_))));

        let field = schema().require("lifetime").unwrap().clone();
        assert!(Condition::Equals(Value::Float(1500.0)).validate(&field).is_ok());
    }

    #[test]
    fn test_spec_serializes_like_extraction_output() {
        let spec = FilterSpec::new()
            .with("nennleistung", Condition::Compare(Operator::Lt, Value::Float(3000.0)))
            .with("kuehlung", Condition::Null)
            .with("brennstellung", Condition::Equals(Value::Text("s15".to_string())));

        assert_eq!(
            serde_json::to_value(&spec).unwrap(),
            json!({
                "nennleistung": {"operator": "<", "value": 3000.0},
                "kuehlung": null,
                "brennstellung": "s15"
            })
        );
    }
}
