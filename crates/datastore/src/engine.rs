//! The storage engine seam.
//!
//! Everything above this module talks to the database through [StorageEngine]: execute a statement with bound
//! parameters, commit, roll back, and a little introspection.  The only engine is sqlite.
use log::*;

use crate::errors::*;
use crate::schema::Column;
use crate::value::{Record, Value};

/// What executing one statement did.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct ExecuteOutcome {
    pub rows_affected: usize,
    pub last_insert_rowid: i64,
}

#[enum_dispatch::enum_dispatch(Engine)]
pub(crate) trait StorageEngine {
    /// Run a statement.  Writes stay pending until [StorageEngine::commit].
    fn execute(&self, sql: &str, params: &[&Value]) -> EngineResult<ExecuteOutcome>;

    /// Make everything executed since the last commit durable.
    fn commit(&self) -> EngineResult<()>;

    /// Throw away everything executed since the last commit.
    fn rollback(&self) -> EngineResult<()>;

    fn table_names(&self) -> EngineResult<Vec<String>>;

    /// Column metadata for a table, in declaration order.  Empty if the table doesn't exist.
    fn column_info(&self, table: &str) -> EngineResult<Vec<Column>>;

    /// Run a read-only statement, calling `callback` with each row.
    fn query(
        &self,
        sql: &str,
        params: &[&Value],
        callback: &mut dyn FnMut(Record) -> EngineResult<()>,
    ) -> EngineResult<()>;
}

#[enum_dispatch::enum_dispatch]
pub(crate) enum Engine {
    Sqlite(SqliteEngine),
}

/// Quote an identifier for sqlite.
///
/// Quoting keeps names like `order` or `first name` usable; whether a name is acceptable at all is still up to the
/// engine.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

pub(crate) struct SqliteEngine {
    conn: rusqlite::Connection,
}

impl SqliteEngine {
    pub(crate) fn new(conn: rusqlite::Connection) -> SqliteEngine {
        SqliteEngine { conn }
    }

    pub(crate) fn execute_batch(&self, sql: &str) -> EngineResult<()> {
        Ok(self.conn.execute_batch(sql)?)
    }
}

impl StorageEngine for SqliteEngine {
    fn execute(&self, sql: &str, params: &[&Value]) -> EngineResult<ExecuteOutcome> {
        // Match the DB-API: the first write opens a transaction which lives until commit or rollback.
        if self.conn.is_autocommit() {
            self.conn.execute_batch("BEGIN")?;
        }

        let rows_affected = self
            .conn
            .execute(sql, rusqlite::params_from_iter(params.iter()))?;
        Ok(ExecuteOutcome {
            rows_affected,
            last_insert_rowid: self.conn.last_insert_rowid(),
        })
    }

    fn commit(&self) -> EngineResult<()> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("COMMIT")?;
        }
        Ok(())
    }

    fn rollback(&self) -> EngineResult<()> {
        if !self.conn.is_autocommit() {
            debug!("Rolling back pending writes");
            self.conn.execute_batch("ROLLBACK")?;
        }
        Ok(())
    }

    fn table_names(&self) -> EngineResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table'")?;
        let names = stmt
            .query_map([], |r| r.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(names)
    }

    fn column_info(&self, table: &str) -> EngineResult<Vec<Column>> {
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_info({})", quote_ident(table)))?;
        let columns = stmt
            .query_map([], |r| {
                Ok(Column {
                    cid: r.get(0)?,
                    name: r.get(1)?,
                    declared_type: r.get(2)?,
                    not_null: r.get(3)?,
                    default_value: r.get(4)?,
                    // This is the column's position in the primary key, 0 if it isn't part of it.
                    is_pk: r.get::<_, i64>(5)? > 0,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(columns)
    }

    fn query(
        &self,
        sql: &str,
        params: &[&Value],
        callback: &mut dyn FnMut(Record) -> EngineResult<()>,
    ) -> EngineResult<()> {
        let mut stmt = self.conn.prepare(sql)?;
        let names = stmt
            .column_names()
            .into_iter()
            .map(String::from)
            .collect::<Vec<_>>();

        let mut rows = stmt.query(rusqlite::params_from_iter(params.iter()))?;
        while let Some(row) = rows.next()? {
            let mut record = Record::new();
            for (i, name) in names.iter().enumerate() {
                record.insert(name.as_str(), row.get::<_, Value>(i)?);
            }
            callback(record)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    fn engine() -> SqliteEngine {
        SqliteEngine::new(rusqlite::Connection::open_in_memory().unwrap())
    }

    #[test]
    fn quoting() {
        assert_eq!(quote_ident("plain"), "`plain`");
        assert_eq!(quote_ident("we`ird"), "`we``ird`");
    }

    #[test]
    fn writes_are_pending_until_commit() {
        let e = engine();
        e.execute("CREATE TABLE t (x INTEGER)", &[]).unwrap();
        e.commit().unwrap();

        let one = Value::Integer(1);
        let outcome = e.execute("INSERT INTO t (x) VALUES (?)", &[&one]).unwrap();
        assert_eq!(outcome.rows_affected, 1);
        e.rollback().unwrap();

        let mut seen = vec![];
        e.query("SELECT x FROM t", &[], &mut |r| {
            seen.push(r);
            Ok(())
        })
        .unwrap();
        assert!(seen.is_empty());

        e.execute("INSERT INTO t (x) VALUES (?)", &[&one]).unwrap();
        e.commit().unwrap();
        e.query("SELECT x FROM t", &[], &mut |r| {
            seen.push(r);
            Ok(())
        })
        .unwrap();
        assert_eq!(seen, vec![[("x", 1)].into_iter().collect::<Record>()]);
    }

    #[test]
    fn introspection() {
        let e = engine();
        e.execute(
            "CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT NOT NULL DEFAULT 'x')",
            &[],
        )
        .unwrap();
        e.commit().unwrap();

        assert_eq!(e.table_names().unwrap(), vec!["t".to_string()]);
        let cols = e.column_info("t").unwrap();
        assert_eq!(
            cols,
            vec![
                Column {
                    cid: 0,
                    name: "id".into(),
                    declared_type: "INTEGER".into(),
                    not_null: false,
                    default_value: Value::Null,
                    is_pk: true,
                },
                Column {
                    cid: 1,
                    name: "name".into(),
                    declared_type: "TEXT".into(),
                    not_null: true,
                    default_value: Value::Text("'x'".into()),
                    is_pk: false,
                },
            ]
        );
        assert!(e.column_info("missing").unwrap().is_empty());
    }
}
