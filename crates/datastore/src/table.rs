//! Handles to tables.
//!
//! A [Table] remembers whether its table existed when the handle was made, and flips that to true when it creates
//! the table itself.  It never notices anything done through other handles or connections: a table dropped elsewhere
//! still looks present here until [Table::refresh] is called.
use log::*;

use crate::database::Database;
use crate::engine::{quote_ident, StorageEngine};
use crate::errors::*;
use crate::schema::{self, Column, ForeignKey};
use crate::unify::{infer_column_types, ColumnTypes};
use crate::value::Record;
use crate::writer::{BatchPlan, CommitPolicy, WriteResult};

/// Options for [Table::insert_all] and friends.
///
/// `pk` and `foreign_keys` only matter if the write ends up creating the table.  Unset batch sizes and commit
/// policies come from the database's config.
#[derive(Clone, Debug, Default)]
pub struct InsertOptions {
    pub pk: Option<String>,
    pub foreign_keys: Vec<ForeignKey>,
    /// Replace rows whose primary key conflicts instead of failing.
    pub upsert: bool,
    pub batch_size: Option<usize>,
    pub commit_policy: Option<CommitPolicy>,
}

impl InsertOptions {
    /// Options with `pk` as the primary key.
    pub fn with_pk(pk: impl Into<String>) -> InsertOptions {
        InsertOptions {
            pk: Some(pk.into()),
            ..Default::default()
        }
    }
}

pub struct Table<'db> {
    db: &'db Database,
    name: String,
    exists: bool,
}

impl<'db> Table<'db> {
    pub(crate) fn new(db: &'db Database, name: String, exists: bool) -> Self {
        Table { db, name, exists }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the table existed as of construction or our own create.  May be stale.
    pub fn exists(&self) -> bool {
        self.exists
    }

    /// Ask the engine whether the table exists, and remember the answer.
    pub fn refresh(&mut self) -> Result<bool> {
        self.exists = self.db.has_table(&self.name)?;
        Ok(self.exists)
    }

    /// The table's columns, straight from the engine.  Empty if the handle thinks the table doesn't exist.
    pub fn columns(&self) -> Result<Vec<Column>> {
        if !self.exists {
            return Ok(vec![]);
        }
        Ok(self.db.engine().column_info(&self.name)?)
    }

    /// Create the table.
    ///
    /// Columns claimed by a foreign key are dropped from `columns` and added afterward, in order, from the foreign
    /// key's own type.  Calling this on a table which already exists fails with the engine's complaint.
    pub fn create(
        &mut self,
        columns: &ColumnTypes,
        pk: Option<&str>,
        foreign_keys: &[ForeignKey],
    ) -> Result<()> {
        let columns: ColumnTypes = columns
            .iter()
            .filter(|(name, _)| !foreign_keys.iter().any(|fk| fk.column == *name))
            .collect();

        schema::create_table(self.db.engine(), &self.name, &columns, pk)?;
        for fk in foreign_keys {
            self.add_foreign_key(fk)?;
        }

        self.exists = true;
        Ok(())
    }

    /// Drop the table.  Doesn't update [Table::exists].
    pub fn drop(&self) -> Result<()> {
        let engine = self.db.engine();
        let res = engine
            .execute(&format!("DROP TABLE {}", quote_ident(&self.name)), &[])
            .and_then(|_| engine.commit());
        if let Err(source) = res {
            if let Err(e) = engine.rollback() {
                warn!("Rollback after failed drop of {} also failed: {}", self.name, e);
            }
            return Err(Error::Usage {
                table: self.name.clone(),
                source,
            });
        }
        Ok(())
    }

    pub fn add_foreign_key(&self, fk: &ForeignKey) -> Result<()> {
        schema::add_foreign_key(self.db.engine(), &self.name, fk)
    }

    /// Infer column types from sample records.
    pub fn detect_column_types(&self, records: &[Record]) -> ColumnTypes {
        infer_column_types(records)
    }

    pub fn insert(&mut self, record: &Record, options: &InsertOptions) -> Result<WriteResult> {
        self.insert_all(std::slice::from_ref(record), options)
    }

    /// Insert many records, creating the table first if this handle thinks it doesn't exist.
    ///
    /// A created table gets its column types from these same records, and gets columns for every key of every
    /// record.  With no records, or only records without fields, there is nothing to create a table from, so nothing is
    /// created or written.  A table which already exists takes field-less records as rows of defaults.
    pub fn insert_all(&mut self, records: &[Record], options: &InsertOptions) -> Result<WriteResult> {
        if !self.exists {
            if records.iter().all(Record::is_empty) {
                debug!("Not creating {}: no record has a field", self.name);
                return Ok(Default::default());
            }

            let types = infer_column_types(records);
            debug!("Creating {} with inferred columns {:?}", self.name, types);
            self.create(&types, options.pk.as_deref(), &options.foreign_keys)?;
        }

        let config = self.db.config();
        BatchPlan {
            table: &self.name,
            upsert: options.upsert,
            batch_size: options.batch_size.unwrap_or_else(|| config.batch_size()),
            commit_policy: options
                .commit_policy
                .unwrap_or_else(|| config.commit_policy()),
        }
        .write(self.db.engine(), records)
    }

    /// [Table::insert], replacing on primary key conflict.
    pub fn upsert(&mut self, record: &Record, options: &InsertOptions) -> Result<WriteResult> {
        self.upsert_all(std::slice::from_ref(record), options)
    }

    /// [Table::insert_all], replacing on primary key conflict.
    pub fn upsert_all(&mut self, records: &[Record], options: &InsertOptions) -> Result<WriteResult> {
        let options = InsertOptions {
            upsert: true,
            ..options.clone()
        };
        self.insert_all(records, &options)
    }

    /// Load the table, calling `callback` with each row.
    ///
    /// This can fail in the middle, but will always pass complete rows to the callback.  So e.g. if you see 500 rows
    /// and then a failure, there might have been 2000.
    pub fn load_records(&self, mut callback: impl FnMut(Record) -> Result<()>) -> Result<()> {
        let mut failure = None;
        let sql = format!("SELECT * FROM {}", quote_ident(&self.name));

        let res = self.db.engine().query(&sql, &[], &mut |r| {
            callback(r).map_err(|e| {
                failure = Some(e);
                EngineError::Interrupted
            })
        });

        match failure {
            Some(e) => Err(e),
            None => Ok(res?),
        }
    }

    /// Load the table, deserializing each row into a `T`.
    pub fn load<T: serde::de::DeserializeOwned>(
        &self,
        mut callback: impl FnMut(T) -> Result<()>,
    ) -> Result<()> {
        self.load_records(|r| callback(serde_json::from_value(r.to_json())?))
    }

    /// Every row of the table.
    pub fn rows(&self) -> Result<Vec<Record>> {
        let mut out = vec![];
        self.load_records(|r| {
            out.push(r);
            Ok(())
        })?;
        Ok(out)
    }
}
