//! Prompt loader for built-in and workspace YAML prompt definitions.

use crate::types::PromptDefinition;
use lumen_core::{AppError, AppResult};
use std::path::{Path, PathBuf};

/// Prompts compiled into the binary, by id.
const BUILTIN_PROMPTS: [(&str, &str); 3] = [
    (
        "router.select_mode",
        include_str!("../prompts/router.select_mode.yml"),
    ),
    ("router.retrieve", include_str!("../prompts/router.retrieve.yml")),
    ("router.respond", include_str!("../prompts/router.respond.yml")),
];

fn prompts_dir(workspace_path: &Path) -> PathBuf {
    workspace_path.join(".lumen").join("prompts")
}

/// Load a prompt definition by ID.
///
/// A workspace file `.lumen/prompts/<id>.yml` takes precedence over the
/// built-in prompt of the same id.
///
/// # Example
/// ```no_run
/// use lumen_prompt::load_prompt;
/// use std::path::Path;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let prompt = load_prompt(Path::new("."), "router.respond")?;
/// println!("Loaded prompt: {}", prompt.title);
/// # Ok(())
/// # }
/// ```
pub fn load_prompt(workspace_path: &Path, prompt_id: &str) -> AppResult<PromptDefinition> {
    let prompt_file = prompts_dir(workspace_path).join(format!("{}.yml", prompt_id));

    let (contents, origin) = if prompt_file.exists() {
        tracing::debug!("Loading prompt from: {:?}", prompt_file);
        let contents = std::fs::read_to_string(&prompt_file).map_err(|e| {
            AppError::Prompt(format!(
                "Failed to read prompt file {:?}: {}",
                prompt_file, e
            ))
        })?;
        (contents, prompt_file.display().to_string())
    } else if let Some((_, builtin)) = BUILTIN_PROMPTS.iter().find(|(id, _)| *id == prompt_id) {
        (builtin.to_string(), "built-in".to_string())
    } else {
        return Err(AppError::Prompt(format!(
            "Prompt '{}' not found (no built-in and no file at {:?})",
            prompt_id, prompt_file
        )));
    };

    let definition: PromptDefinition = serde_yaml::from_str(&contents).map_err(|e| {
        AppError::Prompt(format!("Failed to parse prompt YAML {}: {}", origin, e))
    })?;

    validate_prompt(&definition)?;

    tracing::debug!(
        "Loaded prompt: {} ({}) from {}",
        definition.id,
        definition.title,
        origin
    );

    Ok(definition)
}

/// List all available prompt IDs: built-ins plus workspace files, sorted.
pub fn list_prompts(workspace_path: &Path) -> AppResult<Vec<String>> {
    let mut prompt_ids: Vec<String> = BUILTIN_PROMPTS
        .iter()
        .map(|(id, _)| id.to_string())
        .collect();

    let dir = prompts_dir(workspace_path);
    if dir.exists() {
        for entry in walkdir::WalkDir::new(&dir)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("yml") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    prompt_ids.push(stem.to_string());
                }
            }
        }
    }

    prompt_ids.sort();
    prompt_ids.dedup();
    Ok(prompt_ids)
}

/// Validate a prompt definition.
fn validate_prompt(def: &PromptDefinition) -> AppResult<()> {
    if def.id.is_empty() {
        return Err(AppError::Prompt("Prompt ID cannot be empty".to_string()));
    }

    if def.title.is_empty() {
        return Err(AppError::Prompt("Prompt title cannot be empty".to_string()));
    }

    if def.template.trim().is_empty() {
        return Err(AppError::Prompt(
            "Prompt template cannot be empty".to_string(),
        ));
    }

    if !def.api_version.contains('.') {
        return Err(AppError::Prompt(format!(
            "Invalid apiVersion format: '{}'. Expected format: 'x.y'",
            def.api_version
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_prompt(dir: &Path, id: &str, valid: bool) -> PathBuf {
        let prompts_dir = prompts_dir(dir);
        fs::create_dir_all(&prompts_dir).unwrap();

        let content = if valid {
            format!(
                r#"
id: {}
title: "Test Prompt"
apiVersion: "1.0"
createdBy: test
template: "Antworte knapp auf {{{{language}}}}."
output:
  format: text
"#,
                id
            )
        } else {
            "invalid: yaml: content:".to_string()
        };

        let file_path = prompts_dir.join(format!("{}.yml", id));
        fs::write(&file_path, content).unwrap();
        file_path
    }

    #[test]
    fn test_builtin_prompts_are_valid() {
        let temp_dir = TempDir::new().unwrap();
        for (id, _) in BUILTIN_PROMPTS {
            let prompt = load_prompt(temp_dir.path(), id).unwrap();
            assert_eq!(prompt.id, id);
        }
    }

    #[test]
    fn test_workspace_prompt_overrides_builtin() {
        let temp_dir = TempDir::new().unwrap();
        create_test_prompt(temp_dir.path(), "router.respond", true);

        let prompt = load_prompt(temp_dir.path(), "router.respond").unwrap();
        assert_eq!(prompt.title, "Test Prompt");
        assert!(prompt.template.starts_with("Antworte knapp"));
    }

    #[test]
    fn test_load_nonexistent_prompt() {
        let temp_dir = TempDir::new().unwrap();
        let result = load_prompt(temp_dir.path(), "nonexistent");
        assert!(matches!(result, Err(AppError::Prompt(_))));
    }

    #[test]
    fn test_load_invalid_yaml() {
        let temp_dir = TempDir::new().unwrap();
        create_test_prompt(temp_dir.path(), "invalid", false);

        let result = load_prompt(temp_dir.path(), "invalid");
        assert!(result.is_err());
    }

    #[test]
    fn test_list_prompts() {
        let temp_dir = TempDir::new().unwrap();
        create_test_prompt(temp_dir.path(), "custom.one", true);
        create_test_prompt(temp_dir.path(), "router.respond", true);

        let prompts = list_prompts(temp_dir.path()).unwrap();
        assert_eq!(
            prompts,
            vec![
                "custom.one".to_string(),
                "router.respond".to_string(),
                "router.retrieve".to_string(),
                "router.select_mode".to_string(),
            ]
        );
    }
}
