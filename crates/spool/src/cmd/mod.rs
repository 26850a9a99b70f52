//! Command implementations for the spool CLI

pub mod cat;
pub mod schema;
pub mod write;
