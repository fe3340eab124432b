//! CLI module for spendscope.

pub mod commands;
mod output;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Spendscope - vendor spend compliance analyst
///
/// Answers questions about vendor spend by combining BigQuery transaction
/// data with contracts, policies and audit reports indexed in Vertex AI Search.
#[derive(Parser, Debug)]
#[command(name = "spendscope")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ask a single question
    Ask {
        /// The question to ask
        question: String,

        /// Print the tool calls the agent made
        #[arg(short, long)]
        show_tools: bool,
    },

    /// Start an interactive chat session
    Chat,

    /// Start HTTP API server for integration with other systems
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "8080")]
        port: u16,
    },

    /// Print the rendered agent instruction
    Instruction,

    /// List the tools available to the agent
    Tools,

    /// Check credentials and configuration
    Doctor,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Open configuration file in editor
    Edit,

    /// Show configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ask() {
        let cli = Cli::try_parse_from(["spendscope", "-v", "ask", "Top vendors?", "--show-tools"]).unwrap();
        assert_eq!(cli.verbose, 1);
        match cli.command {
            Commands::Ask { question, show_tools } => {
                assert_eq!(question, "Top vendors?");
                assert!(show_tools);
            }
            _ => panic!("Expected Ask command"),
        }
    }

    #[test]
    fn test_parse_serve_defaults() {
        let cli = Cli::try_parse_from(["spendscope", "serve"]).unwrap();
        match cli.command {
            Commands::Serve { host, port } => {
                assert_eq!(host, "127.0.0.1");
                assert_eq!(port, 8080);
            }
            _ => panic!("Expected Serve command"),
        }
    }

    #[test]
    fn test_parse_config_path() {
        let cli = Cli::try_parse_from(["spendscope", "--config", "/tmp/s.toml", "config", "path"]).unwrap();
        assert_eq!(cli.config.as_deref(), Some("/tmp/s.toml"));
        assert!(matches!(
            cli.command,
            Commands::Config { action: ConfigAction::Path }
        ));
    }
}
