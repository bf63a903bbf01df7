//! Record schema: declared columns, their types, and the extraction schema
//! derived from them.

use crate::condition::Operator;
use crate::value::{parse_date, FieldType};
use lumen_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Appended to every field description in the extraction schema.
const EXTRACTION_HINT: &str = "Falls der Nutzer nichts derartiges fragt, extrahiere null.";

/// One column of the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,

    #[serde(rename = "type")]
    pub field_type: FieldType,

    #[serde(default)]
    pub nullable: bool,

    /// What the column means; becomes the extraction field description
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            nullable: false,
            description: String::new(),
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Whether extraction asks for `{operator, value}` rather than a bare value.
    pub fn takes_operator(&self) -> bool {
        self.field_type.is_numeric() || self.field_type == FieldType::Date
    }

    fn extraction_property(&self) -> serde_json::Value {
        let description = if self.description.is_empty() {
            EXTRACTION_HINT.to_string()
        } else {
            format!("{} {}", self.description, EXTRACTION_HINT)
        };

        if self.takes_operator() {
            let value = match self.field_type {
                FieldType::Date => json!({
                    "type": "string",
                    "description": "Das Datum im Format YYYY-MM-DD."
                }),
                _ => json!({"type": "number", "description": "Der numerische Wert."}),
            };
            let operators: Vec<&str> = Operator::ALL.iter().map(|op| op.symbol()).collect();

            return json!({
                "description": description,
                "anyOf": [
                    {
                        "type": "object",
                        "properties": {
                            "operator": {
                                "type": "string",
                                "enum": operators,
                                "description": "Vergleichsoperator. Ohne Hinweis auf einen Bereich exakter Match (==)."
                            },
                            "value": value
                        },
                        "required": ["operator", "value"],
                        "additionalProperties": false
                    },
                    {"type": "null"}
                ]
            });
        }

        let scalar = match &self.field_type {
            FieldType::List(inner) => inner.as_ref(),
            other => other,
        };
        let json_type = match scalar {
            FieldType::Integer => "integer",
            FieldType::Float => "number",
            FieldType::Bool => "boolean",
            _ => "string",
        };

        json!({"type": [json_type, "null"], "description": description})
    }
}

/// Ordered set of column definitions shared by every record of a catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SchemaFields")]
pub struct Schema {
    fields: Vec<FieldDef>,
}

/// Unchecked wire form of [`Schema`].
#[derive(Deserialize)]
struct SchemaFields {
    fields: Vec<FieldDef>,
}

impl TryFrom<SchemaFields> for Schema {
    type Error = AppError;

    fn try_from(raw: SchemaFields) -> AppResult<Self> {
        Schema::new(raw.fields)
    }
}

impl Schema {
    /// Create a schema; column names must be unique.
    pub fn new(fields: Vec<FieldDef>) -> AppResult<Self> {
        for (i, field) in fields.iter().enumerate() {
            if fields[..i].iter().any(|f| f.name == field.name) {
                return Err(AppError::Schema(format!(
                    "Column '{}' is declared twice",
                    field.name
                )));
            }
        }
        Ok(Self { fields })
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// Look up a column, failing with `AppError::Schema` if it is unknown.
    pub fn require(&self, name: &str) -> AppResult<&FieldDef> {
        self.field(name).ok_or_else(|| {
            AppError::Schema(format!(
                "Column '{}' does not exist in the catalog schema",
                name
            ))
        })
    }

    /// JSON Schema for extracting search criteria, one nullable property per column.
    ///
    /// Compatible with OpenAI strict structured outputs: every property is
    /// required and nullable, extra properties are forbidden.
    pub fn extraction_schema(&self) -> serde_json::Value {
        let properties: serde_json::Map<String, serde_json::Value> = self
            .fields
            .iter()
            .map(|f| (f.name.clone(), f.extraction_property()))
            .collect();
        let required: Vec<&str> = self.fields.iter().map(|f| f.name.as_str()).collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false
        })
    }

    /// Infer a schema from every row at once.
    ///
    /// Columns appear in first-seen order. A column is nullable if any row
    /// lacks it or holds null. Integer and float widen to float; any other
    /// disagreement between rows is an error. Text columns whose values all
    /// parse as ISO dates become date columns.
    pub fn infer(rows: &[serde_json::Map<String, serde_json::Value>]) -> AppResult<Self> {
        let mut columns: Vec<ColumnStats> = Vec::new();

        for (index, row) in rows.iter().enumerate() {
            for (name, value) in row {
                let position = match columns.iter().position(|c| &c.name == name) {
                    Some(position) => position,
                    None => {
                        columns.push(ColumnStats::new(name, index > 0));
                        columns.len() - 1
                    }
                };
                columns[position].observe(value, index + 1)?;
            }
            for column in columns.iter_mut() {
                if !row.contains_key(&column.name) {
                    column.nullable = true;
                }
            }
        }

        let fields = columns
            .into_iter()
            .map(ColumnStats::finish)
            .collect::<AppResult<Vec<_>>>()?;

        tracing::debug!("Inferred schema with {} columns from {} rows", fields.len(), rows.len());

        Self::new(fields)
    }

    /// Built-in schema of the illuminant product catalog.
    pub fn illuminants() -> Self {
        use FieldType::*;

        let fields = vec![
            FieldDef::new("name", Text)
                .describe("Der Name, Titel oder die Bezeichnung des Leuchtmittels."),
            FieldDef::new("nennstrom", Float).describe("Der Nennstrom des Leuchtmittels in Ampere."),
            FieldDef::new("min_stromsteuerbereich", Integer)
                .describe("Das Minimum des Stromsteuerbereichs in Ampere."),
            FieldDef::new("max_stromsteuerbereich", Integer)
                .describe("Das Maximum des Stromsteuerbereichs in Ampere."),
            FieldDef::new("nennleistung", Float)
                .describe("Die Nennleistung des Leuchtmittels in Watt."),
            FieldDef::new("nennspannung", Float)
                .describe("Die Nennspannung des Leuchtmittels in Volt."),
            FieldDef::new("durchmesser", Float)
                .describe("Der Durchmesser des Leuchtmittels in Millimeter."),
            FieldDef::new("laenge", Float).describe("Die Länge des Leuchtmittels in Millimeter."),
            FieldDef::new("laenge_sockel", Float).describe(
                "Die Länge des Leuchtmittels mit Sockel, jedoch ohne Sockelstift, in Millimeter.",
            ),
            FieldDef::new("abstand_lichtschwerpunkt", Float)
                .describe("Der Abstand Lichtschwerpunkt (LCL) des Leuchtmittels in Millimeter."),
            FieldDef::new("elektrodenabstand_kalt", Float)
                .describe("Der Elektrodenabstand kalt des Leuchtmittels in Millimeter."),
            FieldDef::new("produktgewicht", Float)
                .describe("Das Produktgewicht des Leuchtmittels in Gramm."),
            FieldDef::new("kabel_laenge", Float)
                .nullable()
                .describe("Die Kabellänge des Leuchtmittels, falls vorhanden."),
            FieldDef::new("max_temp", Integer).describe(
                "Die maximal zulässige Umgebungstemperatur an der Quetschung in Grad Celsius.",
            ),
            FieldDef::new("lifetime", Integer)
                .describe("Die Lebensdauer des Leuchtmittels in Stunden."),
            FieldDef::new("warranty", Integer)
                .describe("Die Service Warranty Lifetime des Leuchtmittels in Stunden."),
            FieldDef::new("sockel_anode", Text)
                .describe("Die Sockel Anode (Normbezeichnung) des Leuchtmittels."),
            FieldDef::new("sockel_kathode", Text)
                .describe("Die Sockel Kathode (Normbezeichnung) des Leuchtmittels."),
            FieldDef::new("anmerkung_produkt", Text)
                .describe("Die Anmerkung zum Produkt des Leuchtmittels."),
            FieldDef::new("kuehlung", Text).describe("Die Kühlung des Leuchtmittels."),
            FieldDef::new("brennstellung", Text).describe("Die Brennstellung des Leuchtmittels."),
            FieldDef::new("datum_deklaration", Date)
                .describe("Das Datum der Deklaration des Leuchtmittels."),
            FieldDef::new("erzeugnisnummer", FieldType::list_of(Integer))
                .describe("Eine Erzeugnisnummer des Leuchtmittels."),
            FieldDef::new("stoff_kandidatenliste", Text)
                .describe("Der Stoff der Kandidatenliste des Leuchtmittels."),
            FieldDef::new("stoff_cas_nr", Text)
                .describe("Die CAS-Nummer des Stoffes des Leuchtmittels."),
            FieldDef::new("info_sicherer_gebrauch", Text)
                .describe("Die Informationen zum sicheren Gebrauch des Leuchtmittels."),
            FieldDef::new("scip_deklarationsnummer", FieldType::list_of(Text))
                .describe("Eine SCIP-Deklarationsnummer des Leuchtmittels."),
            FieldDef::new("file_name", Text)
                .describe("Der Dateiname des Produktdatenblatts."),
        ];

        Self { fields }
    }
}

/// Running type information for one column during inference.
struct ColumnStats {
    name: String,
    field_type: Option<FieldType>,
    nullable: bool,
    saw_empty_list: bool,
    all_dates: bool,
}

impl ColumnStats {
    fn new(name: &str, missing_earlier: bool) -> Self {
        Self {
            name: name.to_string(),
            field_type: None,
            nullable: missing_earlier,
            saw_empty_list: false,
            all_dates: true,
        }
    }

    fn observe(&mut self, value: &serde_json::Value, line: usize) -> AppResult<()> {
        let observed = match value {
            serde_json::Value::Null => {
                self.nullable = true;
                return Ok(());
            }
            serde_json::Value::Array(items) if items.iter().all(|i| i.is_null()) => {
                self.saw_empty_list = true;
                return Ok(());
            }
            other => json_type(other).map_err(|e| {
                AppError::Schema(format!("line {}: column '{}': {}", line, self.name, e))
            })?,
        };

        if let serde_json::Value::String(s) = value {
            self.all_dates &= parse_date(s).is_ok();
        }

        self.field_type = match self.field_type.take() {
            None => Some(observed),
            Some(current) => Some(current.unify(&observed).ok_or_else(|| {
                AppError::Schema(format!(
                    "line {}: column '{}' holds {} but earlier rows hold {}",
                    line, self.name, observed, current
                ))
            })?),
        };

        Ok(())
    }

    fn finish(self) -> AppResult<FieldDef> {
        let field_type = match (self.field_type, self.saw_empty_list) {
            (None, true) => FieldType::list_of(FieldType::Text),
            (None, false) => FieldType::Text,
            (Some(ty), true) if !ty.is_list() => {
                return Err(AppError::Schema(format!(
                    "column '{}' mixes lists and {} values",
                    self.name, ty
                )))
            }
            (Some(FieldType::Text), _) if self.all_dates => FieldType::Date,
            (Some(ty), _) => ty,
        };

        let mut field = FieldDef::new(self.name, field_type);
        field.nullable = self.nullable;
        Ok(field)
    }
}

/// Type of a single non-null JSON value.
fn json_type(value: &serde_json::Value) -> Result<FieldType, String> {
    match value {
        serde_json::Value::Bool(_) => Ok(FieldType::Bool),
        serde_json::Value::Number(n) if n.is_i64() || n.is_u64() => Ok(FieldType::Integer),
        serde_json::Value::Number(_) => Ok(FieldType::Float),
        serde_json::Value::String(_) => Ok(FieldType::Text),
        serde_json::Value::Array(items) => {
            let mut inner: Option<FieldType> = None;
            for item in items.iter().filter(|i| !i.is_null()) {
                let ty = json_type(item)?;
                if ty.is_list() {
                    return Err("nested lists are not supported".to_string());
                }
                inner = match inner {
                    None => Some(ty),
                    Some(current) => Some(
                        current
                            .unify(&ty)
                            .ok_or_else(|| format!("list mixes {} and {}", current, ty))?,
                    ),
                };
            }
            Ok(FieldType::list_of(inner.unwrap_or(FieldType::Text)))
        }
        serde_json::Value::Null => Err("null has no type".to_string()),
        serde_json::Value::Object(_) => Err("nested objects are not supported".to_string()),
    }
}
