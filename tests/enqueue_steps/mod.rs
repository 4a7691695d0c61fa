//! Step definitions for queue BDD scenarios.

pub mod given;
pub mod then;
pub mod when;
pub mod world;
