//! Filter command handler.
//!
//! Runs the filter engine directly on a JSON filter spec, without a model.

use super::load_catalog;
use clap::Args;
use lumen_catalog::{write_jsonl, FilterOutcome, Record};
use lumen_core::{config::AppConfig, AppError, AppResult};
use std::path::{Path, PathBuf};

/// Filter the catalog with a JSON filter spec
#[derive(Args, Debug)]
pub struct FilterCommand {
    /// Filter spec, e.g. '{"nennleistung": {"operator": ">=", "value": 2000}}'
    #[arg(long, conflicts_with = "spec_file", required_unless_present = "spec_file")]
    pub spec: Option<String>,

    /// Read the filter spec from a file
    #[arg(long)]
    pub spec_file: Option<PathBuf>,

    /// Also write the matches to this JSONL file
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl FilterCommand {
    /// Execute the filter command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing filter command");

        let raw = self.read_spec()?;
        let json: serde_json::Value = serde_json::from_str(&raw)
            .map_err(|e| AppError::Schema(format!("Filter spec is not valid JSON: {}", e)))?;

        let catalog = load_catalog(config)?;
        let spec = catalog.parse_spec(&json)?;
        let outcome = catalog.filter(&spec)?;

        match &outcome {
            FilterOutcome::NoResults => println!("no results"),
            FilterOutcome::Matches(records) => {
                for record in records {
                    println!("{}", serde_json::to_string(record)?);
                }
            }
        }

        if let Some(ref output) = self.output {
            let records: Vec<Record> = outcome.records().iter().map(|r| (*r).clone()).collect();
            let path = write_output(&records, output)?;
            tracing::info!("Wrote {} matches to {:?}", records.len(), path);
        }

        Ok(())
    }

    fn read_spec(&self) -> AppResult<String> {
        match (&self.spec, &self.spec_file) {
            (Some(spec), _) => Ok(spec.clone()),
            (None, Some(path)) => std::fs::read_to_string(path).map_err(|e| {
                AppError::Config(format!("Failed to read spec file {:?}: {}", path, e))
            }),
            (None, None) => Err(AppError::Config("No filter spec provided".to_string())),
        }
    }
}

/// Split `output` into directory and file name for the JSONL writer.
fn write_output(records: &[Record], output: &Path) -> AppResult<PathBuf> {
    let dir = output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let filename = output
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| AppError::Config(format!("Invalid output path: {:?}", output)))?;

    write_jsonl(records, dir, filename)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_catalog::Value;
    use tempfile::TempDir;

    #[test]
    fn test_write_output_appends_extension() {
        let temp = TempDir::new().unwrap();
        let records = vec![Record::new().with("name", Value::Text("XBO".to_string()))];

        let path = write_output(&records, &temp.path().join("treffer")).unwrap();

        assert_eq!(path, temp.path().join("treffer.jsonl"));
        assert_eq!(std::fs::read_to_string(path).unwrap(), "{\"name\":\"XBO\"}\n");
    }

    #[test]
    fn test_read_spec_prefers_inline() {
        let cmd = FilterCommand {
            spec: Some("{}".to_string()),
            spec_file: None,
            output: None,
        };
        assert_eq!(cmd.read_spec().unwrap(), "{}");
    }
}
