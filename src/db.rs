use std::ops::DerefMut;
use std::time::Duration;

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::query_builder::{BoxedSqlQuery, SqlQuery};
use diesel::r2d2::{self, ConnectionManager, CustomizeConnection};
use diesel::sql_query;
use diesel::sql_types::{BigInt, Text};
use diesel::sqlite::Sqlite;

use crate::error::StoreError;
use crate::models::IdRow;
use crate::schema::SCHEMA;

type DbPool = r2d2::Pool<ConnectionManager<SqliteConnection>>;

// One connection, never reaped: checking it out is the store-wide lock, and an
// in-memory database lives exactly as long as the store.
const POOL_MAX_OPEN: u32 = 1;
const POOL_CHECKOUT_TIMEOUT_SECONDS: u64 = 30;

/// A positional statement parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Param {
    Int(i64),
    Text(String),
}

impl From<i64> for Param {
    fn from(value: i64) -> Self {
        Param::Int(value)
    }
}

impl From<u32> for Param {
    fn from(value: u32) -> Self {
        Param::Int(i64::from(value))
    }
}

impl From<&str> for Param {
    fn from(value: &str) -> Self {
        Param::Text(value.to_string())
    }
}

/// Readies every connection the pool opens: SQLite ships with foreign keys
/// off (the pragma is per connection), and a replacement `:memory:`
/// connection starts without tables.
#[derive(Debug)]
struct PrepareConnection;

impl CustomizeConnection<SqliteConnection, r2d2::Error> for PrepareConnection {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), r2d2::Error> {
        conn.batch_execute("PRAGMA foreign_keys = ON;")
            .and_then(|_| conn.batch_execute(SCHEMA))
            .map_err(r2d2::Error::QueryError)
    }
}

/// The data store. Owns the single SQLite connection and the schema on it.
#[derive(Clone)]
pub(crate) struct Store {
    pool: DbPool,
}

impl Store {
    /// Opens (or creates) the database at `path` and makes sure every table
    /// exists. `:memory:` gives a private database tied to this store.
    pub(crate) fn open(path: &str) -> Result<Self, StoreError> {
        let manager = ConnectionManager::<SqliteConnection>::new(path);
        let pool = r2d2::Pool::builder()
            .max_size(POOL_MAX_OPEN)
            .idle_timeout(None)
            .max_lifetime(None)
            .connection_timeout(Duration::from_secs(POOL_CHECKOUT_TIMEOUT_SECONDS))
            .connection_customizer(Box::new(PrepareConnection))
            .build(manager)?;

        // fail now rather than on the first request
        pool.get()?;
        log::info!("recipe store ready at {path}");

        Ok(Store { pool })
    }

    /// Runs `operation` inside one transaction on the store connection.
    /// Any `Err` rolls back everything the operation wrote.
    pub(crate) fn transaction<T, F>(&self, operation: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T, StoreError>,
    {
        let mut conn = self.pool.get()?;
        conn.deref_mut().transaction(operation)
    }
}

fn prepare<'a>(sql: &str, params: &'a [Param]) -> BoxedSqlQuery<'a, Sqlite, SqlQuery> {
    params
        .iter()
        .fold(sql_query(sql).into_boxed::<Sqlite>(), |query, param| match param {
            Param::Int(value) => query.bind::<BigInt, _>(*value),
            Param::Text(value) => query.bind::<Text, _>(value.as_str()),
        })
}

fn report(sql: &str, err: diesel::result::Error) -> StoreError {
    let err = StoreError::from(err);
    if err.is_constraint_violation() {
        log::warn!("`{sql}` violated a constraint: {err}");
    } else {
        log::error!("`{sql}` failed: {err}");
    }
    err
}

/// Runs one statement and decodes every row it returns.
///
/// Panics if the rows do not decode into `T`: the schema fixes the shape of
/// every query, so a mismatch is a programming error.
pub(crate) fn exec<T>(
    conn: &mut SqliteConnection,
    sql: &str,
    params: &[Param],
) -> Result<Vec<T>, StoreError>
where
    T: QueryableByName<Sqlite> + 'static,
{
    log::debug!("exec `{sql}` with {} params", params.len());
    match prepare(sql, params).load::<T>(conn) {
        Ok(rows) => Ok(rows),
        Err(diesel::result::Error::DeserializationError(err)) => {
            panic!("`{sql}` returned rows of unexpected shape: {err}")
        }
        Err(err) => Err(report(sql, err)),
    }
}

/// Runs one statement that returns no rows; yields the affected row count.
pub(crate) fn execute(
    conn: &mut SqliteConnection,
    sql: &str,
    params: &[Param],
) -> Result<usize, StoreError> {
    log::debug!("execute `{sql}` with {} params", params.len());
    prepare(sql, params)
        .execute(conn)
        .map_err(|err| report(sql, err))
}

/// Inserts `params.len() / fields.len()` rows into `table` with a single
/// multi-row `INSERT`. No rows is a no-op.
///
/// Panics unless `params` is a whole number of rows.
pub(crate) fn insert(
    conn: &mut SqliteConnection,
    table: &str,
    fields: &[&str],
    params: &[Param],
) -> Result<usize, StoreError> {
    assert!(!fields.is_empty(), "insert into {table} names no fields");
    assert!(
        params.len() % fields.len() == 0,
        "insert into {table}: {} params do not split into rows of {} fields",
        params.len(),
        fields.len()
    );

    if params.is_empty() {
        return Ok(0);
    }

    let row = format!("({})", vec!["?"; fields.len()].join(", "));
    let rows = vec![row.as_str(); params.len() / fields.len()].join(", ");
    let sql = format!("INSERT INTO {table} ({}) VALUES {rows};", fields.join(", "));
    execute(conn, &sql, params)
}

/// Looks up the id of the one row in `table` whose `fields` equal `params`.
///
/// Panics if the field and param counts differ, or if more than one row
/// matches: callers only pass a unique key.
pub(crate) fn select_id(
    conn: &mut SqliteConnection,
    table: &str,
    fields: &[&str],
    params: &[Param],
    id_field: &str,
) -> Result<i64, StoreError> {
    assert!(!fields.is_empty(), "select from {table} names no fields");
    assert_eq!(
        fields.len(),
        params.len(),
        "select from {table}: field and param counts differ"
    );

    let conditions = fields
        .iter()
        .map(|field| format!("{field} = ?"))
        .collect::<Vec<_>>()
        .join(" AND ");
    let sql = format!("SELECT {id_field} AS id FROM {table} WHERE {conditions};");

    let rows: Vec<IdRow> = exec(conn, &sql, params)?;
    match rows.as_slice() {
        [] => Err(StoreError::NotFound(format!(
            "No id in {table} matches the given fields."
        ))),
        [row] => Ok(row.id),
        _ => panic!("`{sql}` matched {} rows, expected one", rows.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IngredientRow;
    use crate::schema::{INGREDIENTS, RECIPES, RECIPE_INGREDIENTS};

    fn store() -> Store {
        Store::open(":memory:").unwrap()
    }

    #[test]
    fn insert_writes_every_row_in_one_statement() {
        let store = store();
        let params: Vec<Param> = vec![
            "milk".into(),
            48u32.into(),
            "flour".into(),
            364u32.into(),
            "egg".into(),
            156u32.into(),
        ];

        let inserted = store
            .transaction(|conn| insert(conn, INGREDIENTS, &["name", "kcal"], &params))
            .unwrap();
        assert_eq!(inserted, 3);

        let rows: Vec<IngredientRow> = store
            .transaction(|conn| exec(conn, "SELECT id, name, kcal FROM ingredients ORDER BY id;", &[]))
            .unwrap();
        let names: Vec<_> = rows.iter().map(|row| row.name.as_str()).collect();
        assert_eq!(names, ["milk", "flour", "egg"]);
        assert_eq!(rows[2].kcal, 156);
    }

    #[test]
    fn insert_without_rows_is_a_no_op() {
        let store = store();
        let inserted = store
            .transaction(|conn| {
                insert(conn, RECIPE_INGREDIENTS, &["recipe_id", "ingredient_id", "weight"], &[])
            })
            .unwrap();
        assert_eq!(inserted, 0);
    }

    #[test]
    fn insert_reports_constraint_violation_as_invalid_argument() {
        let store = store();
        let params: Vec<Param> = vec!["milk".into(), 48u32.into()];
        store
            .transaction(|conn| insert(conn, INGREDIENTS, &["name", "kcal"], &params))
            .unwrap();

        let err = store
            .transaction(|conn| insert(conn, INGREDIENTS, &["name", "kcal"], &params))
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidArgument(_)), "{err:?}");
    }

    #[test]
    fn unknown_foreign_key_is_invalid_argument() {
        let store = store();
        let params: Vec<Param> = vec![1i64.into(), 1i64.into(), 100u32.into()];
        let err = store
            .transaction(|conn| {
                insert(conn, RECIPE_INGREDIENTS, &["recipe_id", "ingredient_id", "weight"], &params)
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidArgument(_)), "{err:?}");
    }

    #[test]
    #[should_panic(expected = "do not split into rows")]
    fn insert_with_partial_row_panics() {
        let store = store();
        let params: Vec<Param> = vec!["milk".into(), 48u32.into(), "flour".into()];
        let _ = store.transaction(|conn| insert(conn, INGREDIENTS, &["name", "kcal"], &params));
    }

    #[test]
    fn select_id_finds_the_inserted_row() {
        let store = store();
        let id = store
            .transaction(|conn| {
                insert(conn, RECIPES, &["name", "description"], &["pancake".into(), "do it".into()])?;
                select_id(conn, RECIPES, &["name"], &["pancake".into()], "id")
            })
            .unwrap();
        assert_eq!(id, 1);
    }

    #[test]
    fn select_id_without_match_is_not_found() {
        let store = store();
        let err = store
            .transaction(|conn| select_id(conn, RECIPES, &["name"], &["soup".into()], "id"))
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)), "{err:?}");
    }

    #[test]
    #[should_panic(expected = "field and param counts differ")]
    fn select_id_with_mismatched_params_panics() {
        let store = store();
        let _ = store.transaction(|conn| {
            select_id(conn, INGREDIENTS, &["name", "kcal"], &["milk".into()], "id")
        });
    }

    #[test]
    #[should_panic(expected = "unexpected shape")]
    fn exec_panics_when_rows_miss_columns() {
        let store = store();
        let _ = store.transaction(|conn| {
            insert(conn, INGREDIENTS, &["name", "kcal"], &["milk".into(), 48u32.into()])?;
            exec::<IngredientRow>(conn, "SELECT id FROM ingredients;", &[])
        });
    }

    #[test]
    fn every_new_connection_gets_schema_and_foreign_keys() {
        let mut conn = SqliteConnection::establish(":memory:").unwrap();
        PrepareConnection.on_acquire(&mut conn).unwrap();

        insert(&mut conn, INGREDIENTS, &["name", "kcal"], &["milk".into(), 48u32.into()]).unwrap();
        let err = insert(
            &mut conn,
            RECIPE_INGREDIENTS,
            &["recipe_id", "ingredient_id", "weight"],
            &[7i64.into(), 1i64.into(), 100u32.into()],
        )
        .unwrap_err();
        assert!(matches!(err, StoreError::InvalidArgument(_)), "{err:?}");

        // running it again on a live connection keeps the data
        PrepareConnection.on_acquire(&mut conn).unwrap();
        let rows: Vec<IngredientRow> =
            exec(&mut conn, "SELECT id, name, kcal FROM ingredients;", &[]).unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn failed_transaction_leaves_nothing_behind() {
        let store = store();
        let err = store
            .transaction(|conn| {
                insert(conn, INGREDIENTS, &["name", "kcal"], &["milk".into(), 48u32.into()])?;
                Err::<(), _>(StoreError::Internal("abort".to_string()))
            })
            .unwrap_err();
        assert_eq!(err, StoreError::Internal("abort".to_string()));

        let rows: Vec<IngredientRow> = store
            .transaction(|conn| exec(conn, "SELECT id, name, kcal FROM ingredients;", &[]))
            .unwrap();
        assert!(rows.is_empty());
    }
}
