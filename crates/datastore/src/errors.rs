/// Failures reported by the storage engine itself.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum EngineError {
    #[error("sqlite: {}", _0)]
    Sqlite(#[from] rusqlite::Error),

    /// A row callback asked for the query to stop.
    #[error("Query stopped by its row callback")]
    Interrupted,
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Creating a table or adding a column to it failed.
    #[error("Schema change on table {table} failed: {source}")]
    Schema {
        table: String,
        #[source]
        source: EngineError,
    },

    /// A chunk of a batched write failed.
    ///
    /// `chunks_committed` chunks from the start of the batch are durable; nothing after them was written.
    #[error("Write to table {table} failed after {chunks_committed} committed chunks: {source}")]
    Write {
        table: String,
        chunks_committed: usize,
        #[source]
        source: EngineError,
    },

    /// The table wasn't in a state which allows the operation, e.g. dropping a table which doesn't exist.
    #[error("Operation on table {table} was rejected: {source}")]
    Usage {
        table: String,
        #[source]
        source: EngineError,
    },

    #[error("Storage engine error: {}", _0)]
    Engine(#[from] EngineError),

    #[error("Batch size must be at least 1")]
    InvalidBatchSize,

    #[error("Could not render statement: {}", _0)]
    Template(#[from] tera::Error),

    #[error("JSON conversion failed: {}", _0)]
    Json(#[from] serde_json::Error),

    #[error("Records must be JSON objects, got {}", _0)]
    NotAnObject(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
