//! Ask command implementation.

use super::load_app;
use crate::cli::Output;
use crate::config::Settings;
use anyhow::Result;

/// Run the ask command.
pub async fn run_ask(question: &str, show_tools: bool, settings: Settings) -> Result<()> {
    let app = load_app(&settings).await?;

    let spinner = Output::spinner("Investigating...");

    match app.agent.run(question).await {
        Ok(response) => {
            spinner.finish_and_clear();

            if show_tools && !response.tool_calls.is_empty() {
                Output::header("Tool calls");
                for record in &response.tool_calls {
                    Output::tool_call(record);
                }
                println!();
            }

            println!("\n{}\n", response.content);
        }
        Err(e) => {
            spinner.finish_and_clear();
            Output::error(&format!("Failed to generate answer: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
