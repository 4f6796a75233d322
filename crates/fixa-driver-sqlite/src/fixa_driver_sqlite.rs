//! SQLite connection, transaction and metadata implementation

mod connection;
mod schema;

pub use connection::{SqliteConnection, SqliteTransaction};
