//! Result Hydration
//!
//! Maps `alias_column` result columns back onto the joined entities and writes
//! them into typed containers.

pub mod containers;
pub mod mapping;
pub mod results;

pub use containers::{Destination, MaterializedRow};
pub use mapping::{column_alias, parse_column_alias};
pub use results::Results;
