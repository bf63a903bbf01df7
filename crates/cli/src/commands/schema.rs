//! Schema command handler.

use super::{declared_schema, load_catalog};
use clap::Args;
use lumen_catalog::Schema;
use lumen_core::{config::AppConfig, AppResult};

/// Show the catalog schema
#[derive(Args, Debug)]
pub struct SchemaCommand {
    /// Print the JSON Schema used for search criteria extraction
    #[arg(long)]
    pub extraction: bool,
}

impl SchemaCommand {
    /// Execute the schema command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing schema command");

        let schema = match declared_schema(config) {
            Some(schema) => schema,
            None => load_catalog(config)?.schema().clone(),
        };

        if self.extraction {
            println!(
                "{}",
                serde_json::to_string_pretty(&schema.extraction_schema())?
            );
        } else {
            print!("{}", render_table(&schema));
        }

        Ok(())
    }
}

fn render_table(schema: &Schema) -> String {
    let name_width = schema
        .fields()
        .iter()
        .map(|f| f.name.len())
        .max()
        .unwrap_or(0)
        .max("column".len());

    let mut out = format!("{:<name_width$}  {:<13}  {:<8}  description\n", "column", "type", "nullable");
    for field in schema.fields() {
        out.push_str(&format!(
            "{:<name_width$}  {:<13}  {:<8}  {}\n",
            field.name,
            field.field_type.to_string(),
            if field.nullable { "yes" } else { "no" },
            field.description
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_catalog::{FieldDef, FieldType};

    #[test]
    fn test_render_table() {
        let schema = Schema::new(vec![
            FieldDef::new("name", FieldType::Text).describe("Bezeichnung"),
            FieldDef::new("erzeugnisnummer", FieldType::list_of(FieldType::Integer)).nullable(),
        ])
        .unwrap();

        let table = render_table(&schema);
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("column "));
        assert!(lines[1].starts_with("name "));
        assert!(lines[1].ends_with("Bezeichnung"));
        assert!(lines[2].contains("list<integer>"));
        assert!(lines[2].contains("yes"));
    }
}
