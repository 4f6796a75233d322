//! Fixa Fixtures - Loading and checking database fixture data
//!
//! This crate provides:
//! - Default values for columns a fixture row leaves out
//! - `TableData`, one table's fixture rows with their insert/delete/load
//! - `FixtureLoader`, which replaces many tables at once in foreign-key order
//!   and asserts table contents
//! - Master data set-up, backup and restore
//! - A transaction template and a statement-recording connection

mod assertion;
mod default_values;
mod loader;
mod master_data;
mod recorder;
mod table_data;
mod transaction;

pub use assertion::{assert_table_data_equals, assert_table_equals};
pub use default_values::{BasicDefaultValues, DefaultValues};
pub use loader::FixtureLoader;
pub use master_data::{MasterDataRestorer, MasterDataSetUp, TableDuplicator};
pub use recorder::StatementRecorder;
pub use table_data::{FixtureRow, TableData};
pub use transaction::{TransactionCallback, TransactionTemplate};
