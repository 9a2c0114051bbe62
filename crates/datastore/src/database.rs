//! The database wraps a rusqlite connection and hands out [Table] handles.
use itertools::Itertools;
use log::*;

use crate::config::DatabaseConfig;
use crate::engine::{Engine, SqliteEngine, StorageEngine};
use crate::errors::*;
use crate::schema;
use crate::table::Table;
use crate::unify::ColumnTypes;

pub struct Database {
    engine: Engine,
    config: DatabaseConfig,
}

/// SQL that we run as part of opening a connection.
///
/// - Enables the busy timeout.
/// - Raises the cache size.
/// - Turns foreign key enforcement on or off.
/// - For databases on disk, sets up WAL and makes sure the WAL file is truncated, because it can grow quite large
///   under some obscure conditions.
const INITIAL_SQL_TEMPLATE: &str = r#"
PRAGMA busy_timeout = {{ busy_timeout_ms }};
PRAGMA cache_size = {{ cache_size }};
PRAGMA foreign_keys = {% if foreign_keys %}1{% else %}0{% endif %};
{%- if wal %}
PRAGMA journal_mode = WAL;
PRAGMA wal_autocheckpoint = 10000;
PRAGMA wal_checkpoint(full);
{%- endif %}
"#;

fn build_initial_sql(config: &DatabaseConfig) -> Result<String> {
    let mut context = tera::Context::new();
    context.insert("busy_timeout_ms", &config.busy_timeout_ms());
    context.insert("cache_size", &config.cache_size());
    context.insert("foreign_keys", &config.foreign_keys());
    context.insert(
        "wal",
        &(config.write_ahead_log() && config.path().is_some()),
    );
    Ok(tera::Tera::one_off(INITIAL_SQL_TEMPLATE, &context, false)?)
}

impl Database {
    /// Open the database described by `config`, creating the file if needed.
    pub fn open(config: DatabaseConfig) -> Result<Self> {
        let conn = match config.path() {
            Some(p) => {
                info!("Opening database at {}", p.display());
                rusqlite::Connection::open(p)
            }
            None => {
                info!("Opening in-memory database");
                rusqlite::Connection::open_in_memory()
            }
        }
        .map_err(EngineError::from)?;
        Database::with_connection(conn, config)
    }

    /// An in-memory database with the default configuration.
    pub fn open_in_memory() -> Result<Self> {
        Database::open(Default::default())
    }

    /// Build a database from an already-open connection.
    ///
    /// The connection's pragmas are set from `config`; its path is only used to decide about WAL.
    pub fn with_connection(conn: rusqlite::Connection, config: DatabaseConfig) -> Result<Self> {
        let engine = SqliteEngine::new(conn);
        let initial_sql = build_initial_sql(&config)?;
        debug!("Initial SQL: {}", initial_sql);
        engine.execute_batch(&initial_sql)?;

        let db = Database {
            engine: engine.into(),
            config,
        };
        info!("Database has the following tables: {}", db.tables()?.iter().join(", "));
        Ok(db)
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    pub(crate) fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Names of all tables, as the engine currently sees them.
    pub fn tables(&self) -> Result<Vec<String>> {
        Ok(self.engine.table_names()?)
    }

    /// Whether `name` exists right now.
    pub fn has_table(&self, name: &str) -> Result<bool> {
        Ok(self.tables()?.iter().any(|t| t == name))
    }

    /// Get a handle to a table, which need not exist yet.
    pub fn table(&self, name: &str) -> Result<Table<'_>> {
        let exists = self.has_table(name)?;
        Ok(Table::new(self, name.to_string(), exists))
    }

    /// Create a table with the given columns and return a fresh handle to it.
    pub fn create_table(
        &self,
        name: &str,
        columns: &ColumnTypes,
        pk: Option<&str>,
    ) -> Result<Table<'_>> {
        schema::create_table(&self.engine, name, columns, pk)?;
        self.table(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    use crate::config::DatabaseConfigBuilder;
    use crate::unify::ColumnType;

    fn columns() -> ColumnTypes {
        [("id".to_string(), ColumnType::Integer)].into_iter().collect()
    }

    #[test]
    fn opens_in_memory() {
        let db = Database::open_in_memory().expect("Database should open");
        assert!(db.tables().unwrap().is_empty());
    }

    #[test]
    fn initial_sql_skips_wal_in_memory() {
        let sql = build_initial_sql(&DatabaseConfig::default()).unwrap();
        assert!(!sql.contains("WAL"));
        assert!(sql.contains("PRAGMA foreign_keys = 0;"));

        let sql = build_initial_sql(&DatabaseConfig::at_path("/tmp/x")).unwrap();
        assert!(sql.contains("PRAGMA journal_mode = WAL;"));
    }

    /// Will detect if opening trips over an existing database.
    #[test]
    fn opens_twice() {
        let tdir = tempfile::TempDir::new().unwrap();
        let path = tdir.path().join("database.sqlite");
        {
            let db = Database::open(DatabaseConfig::at_path(&path)).expect("Database should open");
            db.create_table("t", &columns(), Some("id")).unwrap();
        }
        let db = Database::open(DatabaseConfig::at_path(&path)).expect("Database should open");
        assert_eq!(db.tables().unwrap(), vec!["t".to_string()]);
        assert!(db.table("t").unwrap().exists());
    }

    #[test]
    fn with_connection_applies_pragmas() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let config = DatabaseConfigBuilder::default()
            .foreign_keys(false)
            .build()
            .unwrap();
        let db = Database::with_connection(conn, config).unwrap();
        assert!(!db.config().foreign_keys());

        db.create_table("parent", &columns(), Some("id")).unwrap();
        let mut child = db.table("child").unwrap();
        let fk = crate::ForeignKey::new("parent_id", "INTEGER", "parent", "id");
        let record: crate::Record = [("name", crate::Value::from("orphan")), ("parent_id", 42.into())]
            .into_iter()
            .collect();
        // Nothing references 42, but enforcement is off.
        child
            .insert(
                &record,
                &crate::InsertOptions {
                    foreign_keys: vec![fk],
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(child.rows().unwrap(), vec![record]);
    }

    #[test]
    fn create_table_returns_present_handle() {
        let db = Database::open_in_memory().unwrap();
        let before = db.table("t").unwrap();
        assert!(!before.exists());

        let t = db.create_table("t", &columns(), None).unwrap();
        assert!(t.exists());
        assert_eq!(t.name(), "t");
        assert!(db.has_table("t").unwrap());
        assert!(matches!(
            db.create_table("t", &columns(), None),
            Err(Error::Schema { .. })
        ));
    }
}
