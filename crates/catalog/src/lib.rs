//! Lamp catalog: typed records, filter specs and the filter engine.
//!
//! A [`Catalog`] is loaded once from JSONL and is read-only afterwards.
//! Queries arrive as a [`FilterSpec`], usually parsed from language model
//! extraction output, and produce a [`FilterOutcome`].

pub mod condition;
pub mod filter;
pub mod loader;
pub mod record;
pub mod schema;
pub mod value;


pub use condition::{Condition, FilterSpec, Operator};
pub use filter::{filter_records, FilterOutcome};
pub use loader::{load_jsonl, write_jsonl};
pub use record::Record;
pub use schema::{FieldDef, Schema};
pub use value::{FieldType, Value};

use lumen_core::AppResult;
use std::path::Path;

/// An in-memory record collection and the schema its records share.
#[derive(Debug, Clone)]
pub struct Catalog {
    schema: Schema,
    records: Vec<Record>,
}

impl Catalog {
    pub fn new(schema: Schema, records: Vec<Record>) -> Self {
        Self { schema, records }
    }

    /// Load a JSONL catalog, checked against `schema` or with an inferred one.
    pub fn load(path: &Path, schema: Option<Schema>) -> AppResult<Self> {
        let (schema, records) = load_jsonl(path, schema)?;
        Ok(Self::new(schema, records))
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Parse extraction output into a spec valid for this catalog.
    pub fn parse_spec(&self, json: &serde_json::Value) -> AppResult<FilterSpec> {
        FilterSpec::from_json(&self.schema, json)
    }

    /// Run the filter engine over all records.
    pub fn filter(&self, spec: &FilterSpec) -> AppResult<FilterOutcome<'_>> {
        filter_records(&self.schema, &self.records, spec)
    }
}
