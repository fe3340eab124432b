//! CLI command implementations.

mod ask;
mod chat;
mod config;
mod doctor;
mod instruction;
mod serve;
mod tools;

pub use ask::run_ask;
pub use chat::run_chat;
pub use config::run_config;
pub use doctor::run_doctor;
pub use instruction::run_instruction;
pub use serve::run_serve;
pub use tools::run_tools;

use crate::app::App;
use crate::cli::Output;
use crate::config::{EnvVars, Settings};

/// Assemble the app from the process environment, reporting failures.
pub(crate) async fn load_app(settings: &Settings) -> anyhow::Result<App> {
    match App::from_env(settings, &EnvVars::from_process()).await {
        Ok(app) => Ok(app),
        Err(e) => {
            Output::error(&format!("{}", e));
            Output::info("Run 'spendscope doctor' for detailed diagnostics.");
            Err(e.into())
        }
    }
}
