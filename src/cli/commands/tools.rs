//! List the agent's tools.

use crate::agent::tool_definitions;
use crate::cli::Output;
use anyhow::Result;

pub fn run_tools() -> Result<()> {
    Output::header("Agent tools");
    for tool in tool_definitions() {
        let description = tool.function.description.unwrap_or_default();
        Output::list_item(&format!("{} - {}", tool.function.name, description));
    }
    Ok(())
}
