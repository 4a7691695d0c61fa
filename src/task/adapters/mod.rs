//! Adapters for the task queue ports.
//!
//! - [`memory`]: thread-safe in-memory storage and a scripted generation
//!   client for tests
//! - [`postgres`]: `PostgreSQL` persistence using Diesel ORM
//! - [`llm`]: OpenAI-compatible chat completions generation client

pub mod llm;
pub mod memory;
pub mod postgres;
