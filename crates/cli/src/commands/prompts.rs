//! Prompts command handler.

use clap::Args;
use lumen_core::{config::AppConfig, AppResult};
use lumen_prompt::{list_prompts, load_prompt};

/// List available prompts
#[derive(Args, Debug)]
pub struct PromptsCommand {
    /// Print the templates of this prompt instead
    #[arg(long)]
    pub show: Option<String>,
}

impl PromptsCommand {
    /// Execute the prompts command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing prompts command");

        if let Some(ref id) = self.show {
            let prompt = load_prompt(&config.workspace, id)?;
            println!("# {} ({})", prompt.title, prompt.id);
            if let Some(ref system) = prompt.system {
                println!("{}\n", system.trim_end());
            }
            println!("{}", prompt.template.trim_end());
            return Ok(());
        }

        let overrides = config.lumen_dir().join("prompts");
        for id in list_prompts(&config.workspace)? {
            let marker = if overrides.join(format!("{}.yml", id)).exists() {
                " (workspace)"
            } else {
                ""
            };
            println!("{}{}", id, marker);
        }

        Ok(())
    }
}
