//! Operation handler modules
//!
//! - Item flows (get, put, patch, delete)
//! - Command execution
//! - Conditional request checks shared by both

pub mod command;
pub mod conditions;
pub mod item;
