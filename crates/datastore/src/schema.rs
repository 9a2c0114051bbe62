//! Creating tables and adding foreign keys.
//!
//! Statements are tera templates.  Nothing here validates names or checks that referenced tables exist: the engine
//! does that, and its complaints come back as [Error::Schema].
use log::*;

use crate::engine::{quote_ident, Engine, StorageEngine};
use crate::errors::*;
use crate::unify::ColumnTypes;
use crate::value::Value;

/// A column of an existing table, as the engine reports it.
#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    /// Position of the column in the table, starting at 0.
    pub cid: i64,
    pub name: String,
    /// The type text from the table's declaration, e.g. `INTEGER`.
    pub declared_type: String,
    pub not_null: bool,
    /// The default value's SQL text, or null if there isn't one.
    pub default_value: Value,
    pub is_pk: bool,
}

/// A column which references a column of another table.
///
/// Columns named by a foreign key are left out of type inference and added to the table after it is created.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct ForeignKey {
    pub column: String,
    /// Declared type text for the column, e.g. `INTEGER`.
    pub column_type: String,
    pub other_table: String,
    pub other_column: String,
}

impl ForeignKey {
    pub fn new(
        column: impl Into<String>,
        column_type: impl Into<String>,
        other_table: impl Into<String>,
        other_column: impl Into<String>,
    ) -> ForeignKey {
        ForeignKey {
            column: column.into(),
            column_type: column_type.into(),
            other_table: other_table.into(),
            other_column: other_column.into(),
        }
    }
}

#[derive(serde::Serialize)]
struct ColumnContext {
    name: String,
    sql_type: &'static str,
    primary_key: bool,
}

const CREATE_TABLE_TEMPLATE: &str = r#"
CREATE TABLE {{ table }} (
{%- for c in columns %}
    {{ c.name }} {{ c.sql_type }}{% if c.primary_key %} PRIMARY KEY{% endif %}{% if not loop.last %},{% endif %}
{%- endfor %}
)
"#;

const ADD_FOREIGN_KEY_TEMPLATE: &str = r#"
ALTER TABLE {{ table }} ADD COLUMN {{ column }} {{ column_type }}
REFERENCES {{ other_table }}({{ other_column }})
"#;

fn build_create_table(name: &str, columns: &ColumnTypes, pk: Option<&str>) -> Result<String> {
    let mut context = tera::Context::new();
    context.insert("table", &quote_ident(name));
    context.insert(
        "columns",
        &columns
            .iter()
            .map(|(n, t)| ColumnContext {
                name: quote_ident(n),
                sql_type: t.sql_type(),
                primary_key: pk == Some(n),
            })
            .collect::<Vec<_>>(),
    );
    Ok(tera::Tera::one_off(CREATE_TABLE_TEMPLATE, &context, false)?)
}

fn build_add_foreign_key(table: &str, fk: &ForeignKey) -> Result<String> {
    let mut context = tera::Context::new();
    context.insert("table", &quote_ident(table));
    context.insert("column", &quote_ident(&fk.column));
    context.insert("column_type", &fk.column_type);
    context.insert("other_table", &quote_ident(&fk.other_table));
    context.insert("other_column", &quote_ident(&fk.other_column));
    Ok(tera::Tera::one_off(ADD_FOREIGN_KEY_TEMPLATE, &context, false)?)
}

/// Run a DDL statement and commit it, rolling back on failure so that nothing is left pending.
fn run_ddl(engine: &Engine, table: &str, sql: &str) -> Result<()> {
    debug!("DDL for {}: {}", table, sql);
    let res = engine.execute(sql, &[]).and_then(|_| engine.commit());
    if let Err(source) = res {
        if let Err(e) = engine.rollback() {
            warn!("Rollback after failed DDL on {} also failed: {}", table, e);
        }
        return Err(Error::Schema {
            table: table.to_string(),
            source,
        });
    }
    Ok(())
}

/// Create `name` with one column per entry of `columns`, `pk` being the primary key if given.
pub(crate) fn create_table(
    engine: &Engine,
    name: &str,
    columns: &ColumnTypes,
    pk: Option<&str>,
) -> Result<()> {
    let sql = build_create_table(name, columns, pk)?;
    run_ddl(engine, name, &sql)
}

/// Add the foreign key's column to `table`.
pub(crate) fn add_foreign_key(engine: &Engine, table: &str, fk: &ForeignKey) -> Result<()> {
    let sql = build_add_foreign_key(table, fk)?;
    run_ddl(engine, table, &sql)
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    use crate::engine::SqliteEngine;
    use crate::unify::ColumnType;

    fn engine() -> Engine {
        SqliteEngine::new(rusqlite::Connection::open_in_memory().unwrap()).into()
    }

    fn types(t: &[(&str, ColumnType)]) -> ColumnTypes {
        t.iter().map(|(n, t)| (n.to_string(), *t)).collect()
    }

    #[test]
    fn create_table_statement() {
        let sql = build_create_table(
            "people",
            &types(&[("id", ColumnType::Integer), ("name", ColumnType::Text)]),
            Some("id"),
        )
        .unwrap();
        assert_eq!(
            sql.trim(),
            "CREATE TABLE `people` (\n    `id` INTEGER PRIMARY KEY,\n    `name` TEXT\n)"
        );
    }

    #[test]
    fn columns_are_created_in_given_order() {
        let e = engine();
        create_table(
            &e,
            "t",
            &types(&[("zeta", ColumnType::Text), ("alpha", ColumnType::Integer)]),
            None,
        )
        .unwrap();
        let names = e
            .column_info("t")
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["zeta".to_string(), "alpha".to_string()]);
    }

    #[test]
    fn creates_with_primary_key() {
        let e = engine();
        create_table(
            &e,
            "t",
            &types(&[("id", ColumnType::Integer), ("score", ColumnType::Float)]),
            Some("id"),
        )
        .unwrap();

        let cols = e.column_info("t").unwrap();
        let summary = cols
            .iter()
            .map(|c| (c.name.as_str(), c.declared_type.as_str(), c.is_pk))
            .collect::<Vec<_>>();
        assert_eq!(
            summary,
            vec![("id", "INTEGER", true), ("score", "FLOAT", false)]
        );
    }

    #[test]
    fn duplicate_create_is_a_schema_error() {
        let e = engine();
        let cols = types(&[("a", ColumnType::Text)]);
        create_table(&e, "t", &cols, None).unwrap();
        let err = create_table(&e, "t", &cols, None).unwrap_err();
        assert!(matches!(err, Error::Schema { ref table, .. } if table == "t"), "{}", err);
    }

    #[test]
    fn no_columns_is_a_schema_error() {
        let e = engine();
        assert!(matches!(
            create_table(&e, "t", &ColumnTypes::new(), None),
            Err(Error::Schema { .. })
        ));
        assert!(e.table_names().unwrap().is_empty());
    }

    #[test]
    fn foreign_key_adds_column() {
        let e = engine();
        create_table(&e, "other", &types(&[("id", ColumnType::Integer)]), Some("id")).unwrap();
        create_table(&e, "t", &types(&[("a", ColumnType::Integer)]), None).unwrap();
        add_foreign_key(&e, "t", &ForeignKey::new("other_id", "INTEGER", "other", "id")).unwrap();

        let names = e
            .column_info("t")
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["a".to_string(), "other_id".to_string()]);

        // Adding it again collides.
        assert!(matches!(
            add_foreign_key(&e, "t", &ForeignKey::new("other_id", "INTEGER", "other", "id")),
            Err(Error::Schema { .. })
        ));
    }
}
