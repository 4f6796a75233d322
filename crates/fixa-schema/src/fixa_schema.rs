//! Fixa Schema - Metadata lookups and foreign-key driven table ordering
//!
//! This crate provides:
//! - A cached per-table metadata provider (`DbInfo`, `GenericDbInfo`)
//! - The foreign-key dependency graph and its depth ranking
//! - `TableSorter`, which orders tables parent-first or child-first

mod db_info;
pub mod dependencies;
mod sorter;

pub use db_info::{DbInfo, GenericDbInfo};
pub use dependencies::{DependencyParser, TableNode};
pub use sorter::{TableNamed, TableSorter};
