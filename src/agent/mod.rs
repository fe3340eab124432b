//! The spend analyst agent.
//!
//! An LLM loop that explores BigQuery spend data, searches contracts and
//! policy documents, and answers with the sources it used.

mod runner;
mod tools;

pub use runner::{Agent, AgentResponse, ChatSession, ToolCallRecord};
pub use tools::{parse_tool_call, tool_definitions, ToolCall, ToolContext};
