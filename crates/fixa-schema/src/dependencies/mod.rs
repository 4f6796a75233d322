//! Foreign-key dependency graph
//!
//! Builds a parent/child graph of tables from imported foreign keys and
//! ranks every table by its depth below the root tables.

mod parser;


pub use parser::{DependencyParser, TableNode};
