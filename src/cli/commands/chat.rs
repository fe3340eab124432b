//! Interactive chat command.

use super::load_app;
use crate::agent::ChatSession;
use crate::cli::Output;
use crate::config::Settings;
use anyhow::Result;
use console::style;
use std::io::{self, BufRead, Write};

/// Run the interactive chat command.
pub async fn run_chat(settings: Settings) -> Result<()> {
    let app = load_app(&settings).await?;
    let mut session = ChatSession::new(app.agent.clone())?;

    println!("\n{}", style("Spendscope Chat").bold().cyan());
    println!(
        "{}",
        style(format!(
            "Project {} | dataset {}",
            app.deployment.project_id,
            app.deployment.dataset_id()?
        ))
        .dim()
    );
    println!(
        "{}\n",
        style("Type your questions, or 'exit' to quit. Use 'clear' to reset conversation.").dim()
    );

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("{} ", style("You:").green().bold());
        stdout.flush()?;

        let mut input = String::new();
        if stdin.lock().read_line(&mut input)? == 0 {
            break;
        }

        let input = input.trim();

        if input.is_empty() {
            continue;
        }

        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            Output::info("Goodbye!");
            break;
        }

        if input.eq_ignore_ascii_case("clear") {
            session.clear();
            Output::info("Conversation history cleared.");
            continue;
        }

        let spinner = Output::spinner("Investigating...");
        let result = session.send(input).await;
        spinner.finish_and_clear();

        match result {
            Ok(response) => {
                for record in &response.tool_calls {
                    println!("{}", style(format!("  [{}]", record.name)).dim());
                }
                println!("\n{} {}\n", style("Analyst:").cyan().bold(), response.content);
            }
            Err(e) => {
                Output::error(&format!("Error: {}", e));
            }
        }
    }

    Ok(())
}
