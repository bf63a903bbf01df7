//! Ask command handler.
//!
//! Runs a single conversation turn and prints the reply.

use super::build_router;
use clap::Args;
use lumen_core::{config::AppConfig, AppError, AppResult};
use lumen_llm::ChatMessage;
use std::path::PathBuf;

/// Ask a single question
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: Option<String>,

    /// Read the question from a file
    #[arg(short, long, conflicts_with = "question")]
    pub file: Option<PathBuf>,

    /// Output as JSON: answer, mode and matching records
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    /// Execute the ask command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");
        tracing::debug!("Ask command options: {:?}", self);

        let question = self.get_question()?;
        let router = build_router(config)?;

        let state = router.run_turn(vec![ChatMessage::user(question)]).await?;

        if self.json {
            let matches: Vec<serde_json::Value> =
                state.matches().iter().map(|r| r.to_json()).collect();
            let output = serde_json::json!({
                "answer": state.answer(),
                "mode": state.mode,
                "matches": matches,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!("{}", state.answer());
        }

        Ok(())
    }

    /// Get the question from the argument or the file.
    fn get_question(&self) -> AppResult<String> {
        let question = match (&self.question, &self.file) {
            (Some(question), _) => question.clone(),
            (None, Some(path)) => std::fs::read_to_string(path).map_err(|e| {
                AppError::Config(format!("Failed to read question file {:?}: {}", path, e))
            })?,
            (None, None) => return Err(AppError::Config("No question provided".to_string())),
        };

        let question = question.trim();
        if question.is_empty() {
            return Err(AppError::Config("Question is empty".to_string()));
        }
        Ok(question.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn command(question: Option<&str>, file: Option<PathBuf>) -> AskCommand {
        AskCommand {
            question: question.map(str::to_string),
            file,
            json: false,
        }
    }

    #[test]
    fn test_question_from_argument() {
        let cmd = command(Some("  Wie lang ist XBO 3000? "), None);
        assert_eq!(cmd.get_question().unwrap(), "Wie lang ist XBO 3000?");
    }

    #[test]
    fn test_question_from_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("frage.txt");
        std::fs::write(&path, "Welche Kühlung hat XBO 2000?\n").unwrap();

        let cmd = command(None, Some(path));
        assert_eq!(cmd.get_question().unwrap(), "Welche Kühlung hat XBO 2000?");
    }

    #[test]
    fn test_missing_question() {
        assert!(matches!(command(None, None).get_question(), Err(AppError::Config(_))));
        assert!(command(Some("   "), None).get_question().is_err());
    }
}
