//! Wordsmith: daily article generation task queue.
//!
//! A scheduler enqueues one "generate today's article" task per generation
//! profile, and a single worker claims and executes those tasks one at a
//! time against an external language model, checkpointing multi-stage
//! progress so a crashed run resumes instead of starting over.
//!
//! # Architecture
//!
//! Wordsmith follows hexagonal architecture principles:
//!
//! - **Domain**: Pure business logic with no infrastructure dependencies
//! - **Ports**: Abstract trait interfaces for persistence and generation
//! - **Adapters**: Concrete implementations of ports (`PostgreSQL`, chat
//!   completions API, in-memory)
//!
//! # Modules
//!
//! - [`task`]: The task queue: enqueue, claim, execute, recovery and drain
//! - [`driver`]: Single-flight wrapper used by scheduled callers
//! - [`config`]: Environment-driven worker configuration
//! - [`telemetry`]: Tracing subscriber setup

pub mod config;
pub mod driver;
pub mod task;
pub mod telemetry;
