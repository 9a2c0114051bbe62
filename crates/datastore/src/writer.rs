//! Batched multi-row inserts.
//!
//! A batch is written as consecutive chunks, one `INSERT` with many `VALUES` rows per chunk.  All chunks of a batch
//! share one column list: the sorted union of every record's keys.  Records missing a column bind null for it.  If no
//! record has any key, there is nothing to put in a `VALUES` row, so each record becomes its own `DEFAULT VALUES`
//! insert.
use std::collections::BTreeSet;

use log::*;

use crate::engine::{quote_ident, Engine, ExecuteOutcome, StorageEngine};
use crate::errors::*;
use crate::value::{Record, Value};

pub const DEFAULT_BATCH_SIZE: usize = 100;

/// When a batched write commits.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum CommitPolicy {
    /// Commit after every chunk.  If a chunk fails, the chunks before it stay written.
    #[default]
    PerChunk,

    /// Commit once, after the last chunk.  If any chunk fails, nothing from the batch is written.
    AllOrNothing,
}

/// The outcome of a batched write.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct WriteResult {
    /// Rows changed by the last chunk.
    pub rows_affected: usize,

    /// Rowid of the last row inserted by the last chunk.
    pub last_insert_rowid: i64,

    /// How many chunks were executed.
    pub chunks: usize,
}

/// How to write one batch.
#[derive(Copy, Clone, Debug)]
pub(crate) struct BatchPlan<'a> {
    pub(crate) table: &'a str,
    pub(crate) upsert: bool,
    pub(crate) batch_size: usize,
    pub(crate) commit_policy: CommitPolicy,
}

const INSERT_TEMPLATE: &str = r#"
INSERT {% if upsert %}OR REPLACE {% endif %}INTO {{ table }}
{%- if columns %}(
    {{ columns | join(sep=", ") }}
) VALUES
{%- for i in range(end=row_count) %}
    ({{ placeholders }}){% if not loop.last %},{% endif %}
{%- endfor %}
{%- else %} DEFAULT VALUES
{%- endif %}
"#;

/// The sorted union of all keys in all records.
pub(crate) fn unified_columns(records: &[Record]) -> Vec<&str> {
    records
        .iter()
        .flat_map(|r| r.keys())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn build_insert_statement(
    table: &str,
    columns: &[&str],
    row_count: usize,
    upsert: bool,
) -> Result<String> {
    use itertools::Itertools;

    let mut context = tera::Context::new();
    context.insert("table", &quote_ident(table));
    context.insert(
        "columns",
        &columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>(),
    );
    context.insert("row_count", &row_count);
    context.insert("placeholders", &columns.iter().map(|_| "?").join(", "));
    context.insert("upsert", &upsert);
    Ok(tera::Tera::one_off(INSERT_TEMPLATE, &context, false)?)
}

static NULL: Value = Value::Null;

/// Flatten a chunk into parameters, row-major, in column order.
fn bind_chunk<'a>(chunk: &'a [Record], columns: &[&str]) -> Vec<&'a Value> {
    chunk
        .iter()
        .flat_map(|r| columns.iter().map(move |c| r.get(c).unwrap_or(&NULL)))
        .collect()
}

/// Run one chunk's statement.  Without columns the statement inserts a single row of defaults, so it runs once per
/// record.
fn execute_chunk(
    engine: &Engine,
    sql: &str,
    chunk: &[Record],
    columns: &[&str],
) -> EngineResult<ExecuteOutcome> {
    if !columns.is_empty() {
        return engine.execute(sql, &bind_chunk(chunk, columns));
    }

    let mut outcome = ExecuteOutcome::default();
    for _ in chunk {
        outcome = engine.execute(sql, &[])?;
    }
    Ok(outcome)
}

impl<'a> BatchPlan<'a> {
    fn write_error(&self, engine: &Engine, chunks_committed: usize, source: EngineError) -> Error {
        // Whatever the policy, the failed chunk and anything uncommitted before it must not linger on the connection.
        if let Err(e) = engine.rollback() {
            warn!(
                "Rollback after failed write to {} also failed: {}",
                self.table, e
            );
        }

        Error::Write {
            table: self.table.to_string(),
            chunks_committed,
            source,
        }
    }

    /// Write `records`.
    ///
    /// Fails on the first chunk the engine rejects.  See [CommitPolicy] for what is left behind.
    pub(crate) fn write(&self, engine: &Engine, records: &[Record]) -> Result<WriteResult> {
        if self.batch_size == 0 {
            return Err(Error::InvalidBatchSize);
        }

        if records.is_empty() {
            return Ok(Default::default());
        }

        let columns = unified_columns(records);
        let chunk_count = (records.len() + self.batch_size - 1) / self.batch_size;
        debug!(
            "Writing {} records to {} in {} chunks of up to {} ({:?}, upsert={})",
            records.len(),
            self.table,
            chunk_count,
            self.batch_size,
            self.commit_policy,
            self.upsert
        );

        // Every chunk but the last has the same size, so the statement only needs rebuilding for the tail.  Chunks are
        // never empty, so the first one always builds.
        let mut statement: (usize, String) = (0, String::new());
        let mut outcome = ExecuteOutcome::default();
        let mut committed = 0;

        for (index, chunk) in records.chunks(self.batch_size).enumerate() {
            if statement.0 != chunk.len() {
                let built = build_insert_statement(self.table, &columns, chunk.len(), self.upsert)?;
                trace!("Insert statement for {}: {}", self.table, built);
                statement = (chunk.len(), built);
            }

            outcome = match execute_chunk(engine, &statement.1, chunk, &columns) {
                Ok(o) => o,
                Err(e) => return Err(self.write_error(engine, committed, e)),
            };

            if self.commit_policy == CommitPolicy::PerChunk {
                if let Err(e) = engine.commit() {
                    return Err(self.write_error(engine, committed, e));
                }
                committed += 1;
            }
            trace!("Chunk {} of {} written to {}", index + 1, chunk_count, self.table);
        }

        if self.commit_policy == CommitPolicy::AllOrNothing {
            if let Err(e) = engine.commit() {
                return Err(self.write_error(engine, 0, e));
            }
        }

        Ok(WriteResult {
            rows_affected: outcome.rows_affected,
            last_insert_rowid: outcome.last_insert_rowid,
            chunks: chunk_count,
        })
    }
}
