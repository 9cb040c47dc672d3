//! Agent runtime for the shopping assistant.
//!
//! This crate is the glue between the LLM and the deterministic core:
//! - `llm`: pluggable completion client (OpenAI-compatible HTTP, scripted
//!   replies for tests)
//! - `tools`: the seven shopping tools the model may invoke, executed
//!   against the catalog, the cart store and the session reference memory
//! - `runtime`: the bounded per-turn loop that completes against the model,
//!   executes the requested tool, feeds the observation back, and
//!   normalizes the final reply into a typed envelope
//!
//! The LLM decides *which* tool to call; it never computes prices, cart
//! contents or reference resolutions itself. Those stay deterministic in
//! the core and in the tool implementations.

pub mod llm;
pub mod runtime;
pub mod tools;

pub use llm::{HttpLlmClient, LlmClient, ScriptedLlmClient};
pub use runtime::AgentRuntime;
pub use tools::{Tool, ToolContext, ToolRegistry};
