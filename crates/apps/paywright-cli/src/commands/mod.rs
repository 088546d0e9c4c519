//! Command implementations.

pub mod budget;
pub mod fetch;
pub mod history;
pub mod wallet;
