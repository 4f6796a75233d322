//! Fixa Core - Core abstractions shared by the fixture loader crates
//!
//! This crate provides the fundamental traits and types that all other
//! Fixa crates depend on. It defines:
//!
//! - `Connection` / `Transaction` - Traits for transactional SQL execution
//! - `SchemaIntrospection` - Trait for table, column and foreign-key metadata
//! - `SqlType` - Normalized SQL type codes and their classification
//! - Common types like `Value`, `Row`, `QueryResult`

mod connection;
mod error;
mod schema;
mod sql_type;
mod types;

pub use connection::*;
pub use error::*;
pub use schema::*;
pub use sql_type::*;
pub use types::*;
