//! Print the rendered agent instruction.

use super::load_app;
use crate::config::Settings;
use anyhow::Result;

pub async fn run_instruction(settings: Settings) -> Result<()> {
    let app = load_app(&settings).await?;
    println!("{}", app.agent.instruction());
    Ok(())
}
