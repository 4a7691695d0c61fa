//! Generation client adapter for OpenAI-compatible chat completion APIs.

mod client;
mod prompts;

pub use client::{ChatGenerationClient, Stage};
