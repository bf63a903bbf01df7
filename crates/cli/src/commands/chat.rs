//! Chat command handler.
//!
//! Interactive conversation loop over stdin/stdout.

use super::build_router;
use clap::Args;
use lumen_agent::{ChatMode, ModeRouter, TurnState};
use lumen_core::{config::AppConfig, AppResult};
use lumen_llm::ChatMessage;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

const GREETING: &str = "Willkommen beim Leuchtmittel-Chatbot! Fragen Sie nach Informationen über \
Leuchtmittel. /reset leert den Verlauf, /exit beendet.";

/// What the loop should do with one input line.
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Skip,
    Reset,
    Exit,
    Message(&'a str),
}

fn classify(line: &str) -> Input<'_> {
    match line.trim() {
        "" => Input::Skip,
        "/reset" => Input::Reset,
        "/exit" | "/quit" => Input::Exit,
        text => Input::Message(text),
    }
}

/// The reply as printed, optionally prefixed with the mode and match count.
fn render_reply(state: &TurnState, show_mode: bool) -> String {
    if !show_mode {
        return state.answer().to_string();
    }
    match state.mode {
        ChatMode::Retrieval => format!(
            "[{}: {} Treffer] {}",
            state.mode,
            state.matches().len(),
            state.answer()
        ),
        ChatMode::ChitChat => format!("[{}] {}", state.mode, state.answer()),
    }
}

/// Start an interactive chat session
#[derive(Args, Debug)]
pub struct ChatCommand {
    /// Prefix each reply with the chosen mode and match count
    #[arg(long)]
    pub show_mode: bool,
}

impl ChatCommand {
    /// Execute the chat command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing chat command");

        let router = build_router(config)?;
        let mut history: Vec<ChatMessage> = Vec::new();
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        println!("{}", GREETING);

        loop {
            print!("> ");
            std::io::stdout().flush()?;

            let Some(line) = lines.next_line().await? else {
                println!();
                break;
            };

            match classify(&line) {
                Input::Skip => continue,
                Input::Exit => break,
                Input::Reset => {
                    history.clear();
                    tracing::info!("Conversation reset");
                    println!("Verlauf gelöscht.");
                }
                Input::Message(text) => {
                    history.push(ChatMessage::user(text));
                    self.turn(&router, &mut history).await;
                }
            }
        }

        tracing::info!("Chat session ended after {} messages", history.len());
        Ok(())
    }

    /// Run one turn. A failed turn is reported and removed from the history.
    async fn turn(&self, router: &ModeRouter, history: &mut Vec<ChatMessage>) {
        match router.run_turn(history.clone()).await {
            Ok(state) => {
                println!("{}", render_reply(&state, self.show_mode));
                history.push(ChatMessage::assistant(state.answer()));
            }
            Err(e) => {
                tracing::error!("Turn failed: {}", e);
                eprintln!("Fehler: {}", e);
                history.pop();
            }
        }
    }
}
