//! The datastore crate.
//!
//! This crate writes loosely structured records to sqlite without declaring a schema first.  There are 3 primary
//! entities:
//!
//! - The [Database], which owns the connection and hands out tables.
//! - The [Table], a handle to one table which may not exist yet.  The first write to a missing table creates it,
//!   inferring a column type per field from the records being written.
//! - The [Record], a map from field name to [Value].  Records in one batch may have different fields.
//!
//! Writes are batched: a batch becomes a handful of multi-row inserts, committed per chunk or all at once depending on
//! the [CommitPolicy].  This crate is a convenience layer, not an ORM: there is no query builder and no migrations.
mod config;
mod database;
mod engine;
mod errors;
mod schema;
mod table;
mod unify;
mod value;
mod writer;

pub use config::*;
pub use database::*;
pub use engine::ExecuteOutcome;
pub use errors::*;
pub use schema::*;
pub use table::*;
pub use unify::*;
pub use value::*;
pub use writer::{CommitPolicy, WriteResult, DEFAULT_BATCH_SIZE};
