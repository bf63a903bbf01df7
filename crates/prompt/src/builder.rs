//! Prompt builder for rendering templates.

use crate::types::{BuiltPrompt, PromptDefinition};
use handlebars::Handlebars;
use lumen_core::{AppError, AppResult};
use std::collections::HashMap;

/// Build a prompt from a definition and input variables.
///
/// Renders `template` and, when present, `system` with Handlebars. An empty
/// variable is falsy, so templates can branch with `{{#if name}}`.
///
/// # Example
/// ```no_run
/// use lumen_prompt::{build_prompt, PromptDefinition};
/// use std::collections::HashMap;
///
/// # fn example(def: PromptDefinition) -> Result<(), Box<dyn std::error::Error>> {
/// let mut vars = HashMap::new();
/// vars.insert("language".to_string(), "Deutsch".to_string());
///
/// let built = build_prompt(&def, vars)?;
/// println!("Instruction: {}", built.user);
/// # Ok(())
/// # }
/// ```
pub fn build_prompt(
    definition: &PromptDefinition,
    variables: HashMap<String, String>,
) -> AppResult<BuiltPrompt> {
    tracing::debug!("Building prompt: {}", definition.id);

    let user = render_template(&definition.template, &variables)?;
    let system = definition
        .system
        .as_deref()
        .map(|template| render_template(template, &variables))
        .transpose()?;

    Ok(BuiltPrompt::new(
        system,
        user,
        definition.id.clone(),
        variables,
    ))
}

/// Render a Handlebars template with variables.
fn render_template(template: &str, variables: &HashMap<String, String>) -> AppResult<String> {
    let mut handlebars = Handlebars::new();

    // Plain text, not HTML
    handlebars.register_escape_fn(handlebars::no_escape);

    handlebars
        .register_template_string("prompt", template)
        .map_err(|e| AppError::Prompt(format!("Failed to register template: {}", e)))?;

    let rendered = handlebars
        .render("prompt", variables)
        .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))?;

    Ok(rendered.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load_prompt;
    use crate::types::PromptOutputSpec;
    use tempfile::TempDir;

    fn create_test_definition(system: Option<&str>) -> PromptDefinition {
        PromptDefinition {
            id: "test.prompt".to_string(),
            title: "Test".to_string(),
            api_version: "1.0".to_string(),
            created_by: "test".to_string(),
            description: String::new(),
            system: system.map(str::to_string),
            template: "Frage: {{question}}".to_string(),
            output: PromptOutputSpec {
                format: "text".to_string(),
            },
        }
    }

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_render_simple_template() {
        let result = render_template("Frage: {{question}}", &vars(&[("question", "<XBO> & Co")]));
        assert_eq!(result.unwrap(), "Frage: <XBO> & Co");
    }

    #[test]
    fn test_build_prompt_renders_system() {
        let def = create_test_definition(Some("Antworte auf {{language}}."));
        let built = build_prompt(
            &def,
            vars(&[("question", "Wie lang?"), ("language", "Englisch")]),
        )
        .unwrap();

        assert_eq!(built.user, "Frage: Wie lang?");
        assert_eq!(built.system.as_deref(), Some("Antworte auf Englisch."));
        assert_eq!(built.metadata.source_prompt_id, "test.prompt");
    }

    #[test]
    fn test_render_template_missing_variable() {
        // Handlebars renders missing variables as empty strings
        let result = render_template("Frage: {{missing}}", &HashMap::new());
        assert_eq!(result.unwrap(), "Frage:");
    }

    #[test]
    fn test_respond_prompt_branches() {
        let temp_dir = TempDir::new().unwrap();
        let def = load_prompt(temp_dir.path(), "router.respond").unwrap();

        let chit_chat = build_prompt(&def, vars(&[("language", "Deutsch")])).unwrap();
        assert!(chit_chat.user.contains("Antworte immer auf Deutsch."));
        assert!(!chit_chat.user.contains("Ergebnisse"));
        assert!(!chit_chat.user.contains("keine passenden"));

        let no_results = build_prompt(
            &def,
            vars(&[("language", "Deutsch"), ("retrieval", "true")]),
        )
        .unwrap();
        assert!(no_results.user.contains("keine Leuchtmittel zu dieser Anfrage gefunden"));

        let with_results = build_prompt(
            &def,
            vars(&[
                ("language", "Deutsch"),
                ("retrieval", "true"),
                ("results", r#"[{"name":"XBO 2000 W/HS OFR"}]"#),
                ("count", "1"),
            ]),
        )
        .unwrap();
        assert!(with_results.user.contains(r#"[{"name":"XBO 2000 W/HS OFR"}]"#));
        assert!(!with_results.user.contains("keine Leuchtmittel"));
    }
}
