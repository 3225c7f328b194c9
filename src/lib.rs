//! Vault Copilot - an agentic chat engine over a folder of notes
//!
//! A user message starts a run: the engine streams a completion from the
//! model service, executes the vault tools it asks for, feeds the results
//! back and repeats until the model is done.

pub mod auth;
pub mod config;
pub mod conversation;
pub mod engine;
pub mod llm;
pub mod state_machine;
pub mod tools;
