//! Connect / execute / fetch wrappers for ad-hoc database access
//!
//! None of these return `Err` or panic on database failure. Every failure is
//! logged and handed back as `DbOutcome::Failure`, so "no rows" and "failed"
//! stay distinguishable.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use either::Either;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use sqlx::encode::IsNull;
use sqlx::error::BoxDynError;
use sqlx::postgres::types::PgInterval;
use sqlx::postgres::{PgArgumentBuffer, PgConnection, PgRow, PgTypeInfo, Postgres};
use sqlx::{Column, Connection, Describe, Encode, Executor, Row, Type, TypeInfo};
use thiserror::Error;

use super::connection::{BackendQuery, ConnectionParams, DbConnection, InnerMut, bind_param};
use crate::formats::Value;

/// Postgres result types decoded natively; anything else is read back as text
const DECODED_PG_TYPES: &[&str] = &[
    "BOOL",
    "INT2",
    "INT4",
    "INT8",
    "FLOAT4",
    "FLOAT8",
    "NUMERIC",
    "TEXT",
    "VARCHAR",
    "BPCHAR",
    "NAME",
    "TIMESTAMP",
    "TIMESTAMPTZ",
    "DATE",
    "INTERVAL",
];

/// Result of a helper call
#[derive(Debug)]
pub enum DbOutcome<T> {
    Success(T),
    Failure(DbError),
}

impl<T> DbOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, DbOutcome::Success(_))
    }

    pub fn into_result(self) -> Result<T, DbError> {
        match self {
            DbOutcome::Success(value) => Ok(value),
            DbOutcome::Failure(error) => Err(error),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbErrorKind {
    Connection,
    Statement,
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("could not connect to {target}: {source}")]
    Connection {
        target: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("statement failed: {0}")]
    Statement(#[from] sqlx::Error),

    #[error("invalid statement parameter: {0}")]
    Parameter(String),

    #[error("column '{column}' has unsupported type {type_name}")]
    UnsupportedType { column: String, type_name: String },
}

impl DbError {
    pub fn kind(&self) -> DbErrorKind {
        match self {
            DbError::Connection { .. } => DbErrorKind::Connection,
            DbError::Statement(_) | DbError::Parameter(_) | DbError::UnsupportedType { .. } => {
                DbErrorKind::Statement
            }
        }
    }
}

fn failure<T>(error: DbError) -> DbOutcome<T> {
    tracing::error!("{}", error);
    DbOutcome::Failure(error)
}

/// Open a connection with `params`
pub async fn connect(params: &ConnectionParams) -> DbOutcome<DbConnection> {
    match DbConnection::connect(params).await {
        Ok(db) => {
            tracing::info!("Connected to {}", params.display_target());
            DbOutcome::Success(db)
        }
        Err(source) => failure(DbError::Connection {
            target: params.display_target(),
            source,
        }),
    }
}

/// Run a mutating statement in its own transaction and commit it
///
/// Returns the affected row count. On failure the transaction is rolled back
/// and the connection stays usable.
pub async fn execute(db: &mut DbConnection, statement: &str, params: &[Value]) -> DbOutcome<u64> {
    match execute_in_transaction(db, statement, params).await {
        Ok(rows) => DbOutcome::Success(rows),
        Err(error) => failure(error),
    }
}

/// Run a query and return every row
pub async fn fetch(
    db: &mut DbConnection,
    statement: &str,
    params: &[Value],
) -> DbOutcome<Vec<Vec<Value>>> {
    match fetch_rows(db, statement, params).await {
        Ok(rows) => DbOutcome::Success(rows),
        Err(error) => failure(error),
    }
}

async fn execute_in_transaction(
    db: &mut DbConnection,
    statement: &str,
    params: &[Value],
) -> Result<u64, DbError> {
    match db.inner_mut() {
        InnerMut::Postgres(conn) => {
            let param_types = if params.iter().any(Value::is_null) {
                parameter_types(&describe_pg(conn, statement).await?)
            } else {
                Vec::new()
            };
            let query =
                bind_pg_params(sqlx::query::<Postgres>(statement), params, &param_types)?;
            let mut tx = conn.begin().await?;
            match query.execute(&mut *tx).await {
                Ok(result) => {
                    tx.commit().await?;
                    Ok(result.rows_affected())
                }
                Err(e) => {
                    rollback(tx).await;
                    Err(e.into())
                }
            }
        }
        #[cfg(test)]
        InnerMut::Sqlite(conn) => {
            let sql = to_sqlite_placeholders(statement);
            let query = bind_sqlite_params(sqlx::query::<sqlx::Sqlite>(&sql), params)?;
            let mut tx = conn.begin().await?;
            match query.execute(&mut *tx).await {
                Ok(result) => {
                    tx.commit().await?;
                    Ok(result.rows_affected())
                }
                Err(e) => {
                    rollback(tx).await;
                    Err(e.into())
                }
            }
        }
    }
}

async fn rollback<DB: sqlx::Database>(tx: sqlx::Transaction<'_, DB>) {
    if let Err(e) = tx.rollback().await {
        tracing::warn!("Rollback failed: {}", e);
    }
}

async fn fetch_rows(
    db: &mut DbConnection,
    statement: &str,
    params: &[Value],
) -> Result<Vec<Vec<Value>>, DbError> {
    match db.inner_mut() {
        InnerMut::Postgres(conn) => {
            let described = describe_pg(conn, statement).await?;
            let param_types = parameter_types(&described);
            let as_text: Vec<bool> = described
                .columns()
                .iter()
                .map(|column| !DECODED_PG_TYPES.contains(&column.type_info().name()))
                .collect();

            let text_count = as_text.iter().filter(|&&text| text).count();
            let sql = if text_count > 0 {
                tracing::debug!("reading {} result columns as text", text_count);
                with_text_columns(statement, &as_text)
            } else {
                statement.to_string()
            };

            let rows = bind_pg_params(sqlx::query::<Postgres>(&sql), params, &param_types)?
                .fetch_all(&mut *conn)
                .await?;
            rows.iter().map(decode_pg_row).collect()
        }
        #[cfg(test)]
        InnerMut::Sqlite(conn) => {
            let sql = to_sqlite_placeholders(statement);
            let rows = bind_sqlite_params(sqlx::query::<sqlx::Sqlite>(&sql), params)?
                .fetch_all(conn)
                .await?;
            rows.iter().map(decode_sqlite_row).collect()
        }
    }
}

async fn describe_pg(
    conn: &mut PgConnection,
    statement: &str,
) -> Result<Describe<Postgres>, DbError> {
    Ok((&mut *conn).describe(statement).await?)
}

/// Parameter types the server inferred for a described statement
fn parameter_types(described: &Describe<Postgres>) -> Vec<PgTypeInfo> {
    match described.parameters() {
        Some(Either::Left(types)) => types.to_vec(),
        _ => Vec::new(),
    }
}

/// NULL parameter sent with the type the server expects at its position
struct TypedNull(PgTypeInfo);

impl Type<Postgres> for TypedNull {
    fn type_info() -> PgTypeInfo {
        <String as Type<Postgres>>::type_info()
    }
}

impl Encode<'_, Postgres> for TypedNull {
    fn encode_by_ref(&self, _buf: &mut PgArgumentBuffer) -> Result<IsNull, BoxDynError> {
        Ok(IsNull::Yes)
    }

    fn produces(&self) -> Option<PgTypeInfo> {
        Some(self.0.clone())
    }
}

/// Bind helper parameters; NULLs take the matching entry of `param_types`
fn bind_pg_params<'q>(
    query: BackendQuery<'q, Postgres>,
    params: &'q [Value],
    param_types: &[PgTypeInfo],
) -> Result<BackendQuery<'q, Postgres>, DbError> {
    params
        .iter()
        .enumerate()
        .try_fold(query, |query, (idx, value)| match (value, param_types.get(idx)) {
            (Value::Null, Some(type_info)) => Ok(query.bind(TypedNull(type_info.clone()))),
            _ => bind_param(query, value).map_err(parameter_error),
        })
}

#[cfg(test)]
fn bind_sqlite_params<'q>(
    query: BackendQuery<'q, sqlx::Sqlite>,
    params: &'q [Value],
) -> Result<BackendQuery<'q, sqlx::Sqlite>, DbError> {
    params
        .iter()
        .try_fold(query, |query, value| bind_param(query, value).map_err(parameter_error))
}

fn parameter_error(error: anyhow::Error) -> DbError {
    DbError::Parameter(format!("{:#}", error))
}

/// Wrap `statement` so the flagged result columns are cast to text
///
/// Columns are renamed positionally, so duplicate or unnamed output columns
/// are fine.
fn with_text_columns(statement: &str, as_text: &[bool]) -> String {
    let aliases: Vec<String> = (1..=as_text.len()).map(|i| format!("c{}", i)).collect();
    let select: Vec<String> = aliases
        .iter()
        .zip(as_text)
        .map(|(alias, &text)| {
            if text {
                format!("{}::text", alias)
            } else {
                alias.clone()
            }
        })
        .collect();
    let body = statement.trim_end_matches(|c: char| c == ';' || c.is_whitespace());

    format!(
        "WITH q ({}) AS (\n{}\n) SELECT {} FROM q",
        aliases.join(", "),
        body,
        select.join(", ")
    )
}

/// Decode a Postgres row by the declared type of each column
fn decode_pg_row(row: &PgRow) -> Result<Vec<Value>, DbError> {
    row.columns()
        .iter()
        .map(|column| {
            let idx = column.ordinal();
            let value = match column.type_info().name() {
                "BOOL" => row.try_get::<Option<bool>, _>(idx)?.map(Value::Bool),
                "INT2" => row
                    .try_get::<Option<i16>, _>(idx)?
                    .map(|v| Value::Int(v.into())),
                "INT4" => row
                    .try_get::<Option<i32>, _>(idx)?
                    .map(|v| Value::Int(v.into())),
                "INT8" => row.try_get::<Option<i64>, _>(idx)?.map(Value::Int),
                "FLOAT4" => row
                    .try_get::<Option<f32>, _>(idx)?
                    .map(|v| Value::Float(v.into())),
                "FLOAT8" => row.try_get::<Option<f64>, _>(idx)?.map(Value::Float),
                "NUMERIC" => row.try_get::<Option<Decimal>, _>(idx)?.map(numeric_value),
                "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => {
                    row.try_get::<Option<String>, _>(idx)?.map(Value::Text)
                }
                "TIMESTAMP" => row
                    .try_get::<Option<NaiveDateTime>, _>(idx)?
                    .map(Value::Timestamp),
                "TIMESTAMPTZ" => row
                    .try_get::<Option<DateTime<Utc>>, _>(idx)?
                    .map(|ts| Value::Timestamp(ts.naive_utc())),
                "DATE" => row
                    .try_get::<Option<NaiveDate>, _>(idx)?
                    .map(|d| Value::Timestamp(d.and_time(NaiveTime::MIN))),
                "INTERVAL" => row
                    .try_get::<Option<PgInterval>, _>(idx)?
                    .map(|interval| Value::Text(format_interval(&interval))),
                other => {
                    return Err(DbError::UnsupportedType {
                        column: column.name().to_string(),
                        type_name: other.to_string(),
                    });
                }
            };
            Ok(value.unwrap_or(Value::Null))
        })
        .collect()
}

/// NUMERIC without fractional digits becomes an integer when it fits
fn numeric_value(decimal: Decimal) -> Value {
    if decimal.scale() == 0 {
        if let Some(v) = decimal.to_i64() {
            return Value::Int(v);
        }
    }
    match decimal.to_f64() {
        Some(v) => Value::Float(v),
        None => Value::Text(decimal.to_string()),
    }
}

/// Render an interval the way Postgres prints it by default
fn format_interval(interval: &PgInterval) -> String {
    let mut parts = Vec::new();
    let fields = [
        (interval.months / 12, "year"),
        (interval.months % 12, "mon"),
        (interval.days, "day"),
    ];
    for (n, unit) in fields {
        if n != 0 {
            let plural = if n == 1 { "" } else { "s" };
            parts.push(format!("{} {}{}", n, unit, plural));
        }
    }

    if interval.microseconds != 0 || parts.is_empty() {
        let sign = if interval.microseconds < 0 { "-" } else { "" };
        let micros = interval.microseconds.unsigned_abs();
        let secs = micros / 1_000_000;
        let mut time = format!(
            "{}{:02}:{:02}:{:02}",
            sign,
            secs / 3600,
            secs / 60 % 60,
            secs % 60
        );
        let frac = micros % 1_000_000;
        if frac != 0 {
            time.push_str(format!(".{:06}", frac).trim_end_matches('0'));
        }
        parts.push(time);
    }

    parts.join(" ")
}

/// Decode a SQLite row by the storage class of each value
#[cfg(test)]
fn decode_sqlite_row(row: &sqlx::sqlite::SqliteRow) -> Result<Vec<Value>, DbError> {
    use sqlx::ValueRef;

    row.columns()
        .iter()
        .map(|column| {
            let idx = column.ordinal();
            let raw = row.try_get_raw(idx)?;
            if raw.is_null() {
                return Ok(Value::Null);
            }
            let type_name = raw.type_info().name().to_string();
            match type_name.as_str() {
                "INTEGER" | "BOOLEAN" => Ok(Value::Int(row.try_get_unchecked::<i64, _>(idx)?)),
                "REAL" => Ok(Value::Float(row.try_get_unchecked::<f64, _>(idx)?)),
                "TEXT" => Ok(Value::Text(row.try_get_unchecked::<String, _>(idx)?)),
                _ => Err(DbError::UnsupportedType {
                    column: column.name().to_string(),
                    type_name,
                }),
            }
        })
        .collect()
}

/// Convert Postgres placeholders ($1, $2) to numbered SQLite ones (?1, ?2)
#[cfg(test)]
fn to_sqlite_placeholders(sql: &str) -> String {
    sql.replace('$', "?")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connection::ConnectionParamsBuilder;

    async fn trips_db() -> DbConnection {
        let mut db = DbConnection::sqlite_in_memory().await.unwrap();
        let created = execute(
            &mut db,
            "CREATE TABLE trips (id INTEGER NOT NULL, zone TEXT, fare REAL)",
            &[],
        )
        .await;
        assert!(created.is_success());
        db
    }

    #[tokio::test]
    async fn test_execute_then_fetch() {
        let mut db = trips_db().await;

        let inserted = execute(
            &mut db,
            "INSERT INTO trips (id, zone, fare) VALUES ($1, $2, $3), ($4, $5, $6)",
            &[
                Value::Int(1),
                Value::Text("Astoria".into()),
                Value::Float(12.5),
                Value::Int(2),
                Value::Null,
                Value::Float(7.0),
            ],
        )
        .await
        .into_result()
        .unwrap();
        assert_eq!(inserted, 2);

        let rows = fetch(
            &mut db,
            "SELECT id, zone, fare FROM trips WHERE id >= $1 ORDER BY id",
            &[Value::Int(1)],
        )
        .await
        .into_result()
        .unwrap();

        assert_eq!(
            rows,
            vec![
                vec![
                    Value::Int(1),
                    Value::Text("Astoria".into()),
                    Value::Float(12.5)
                ],
                vec![Value::Int(2), Value::Null, Value::Float(7.0)],
            ]
        );
    }

    #[tokio::test]
    async fn test_fetch_empty_result_is_success() {
        let mut db = trips_db().await;
        let rows = fetch(&mut db, "SELECT id FROM trips", &[]).await;
        match rows {
            DbOutcome::Success(rows) => assert!(rows.is_empty()),
            DbOutcome::Failure(e) => panic!("unexpected failure: {}", e),
        }
    }

    #[tokio::test]
    async fn test_failed_execute_commits_nothing_and_connection_survives() {
        let mut db = trips_db().await;

        // Second row violates NOT NULL
        let outcome = execute(
            &mut db,
            "INSERT INTO trips (id) VALUES ($1), ($2)",
            &[Value::Int(1), Value::Null],
        )
        .await;
        match outcome {
            DbOutcome::Failure(e) => assert_eq!(e.kind(), DbErrorKind::Statement),
            DbOutcome::Success(_) => panic!("expected failure"),
        }

        let outcome = execute(&mut db, "INSERT INTO no_such_table VALUES (1)", &[]).await;
        assert!(!outcome.is_success());

        let rows = fetch(&mut db, "SELECT COUNT(*) FROM trips", &[])
            .await
            .into_result()
            .unwrap();
        assert_eq!(rows, vec![vec![Value::Int(0)]]);
    }

    #[tokio::test]
    async fn test_failed_fetch_is_statement_failure() {
        let mut db = trips_db().await;
        match fetch(&mut db, "SELECT nope FROM trips", &[]).await {
            DbOutcome::Failure(e) => assert_eq!(e.kind(), DbErrorKind::Statement),
            DbOutcome::Success(_) => panic!("expected failure"),
        }
    }

    #[tokio::test]
    async fn test_connect_failure_is_reported() {
        let params = ConnectionParamsBuilder::default()
            .host("127.0.0.1")
            .port(1)
            .build()
            .unwrap();

        match connect(&params).await {
            DbOutcome::Failure(e) => assert_eq!(e.kind(), DbErrorKind::Connection),
            DbOutcome::Success(_) => panic!("expected connection failure"),
        }
    }

    #[test]
    fn test_numeric_keeps_integers_integral() {
        assert_eq!(numeric_value(Decimal::new(1_234, 0)), Value::Int(1_234));
        assert_eq!(numeric_value(Decimal::new(15, 1)), Value::Float(1.5));
        assert_eq!(numeric_value(Decimal::new(20, 1)), Value::Float(2.0));
    }

    #[test]
    fn test_format_interval_like_postgres() {
        let interval = |months, days, microseconds| PgInterval {
            months,
            days,
            microseconds,
        };
        assert_eq!(format_interval(&interval(0, 0, 0)), "00:00:00");
        assert_eq!(
            format_interval(&interval(0, 1, 7_200_000_000)),
            "1 day 02:00:00"
        );
        assert_eq!(format_interval(&interval(14, 3, 0)), "1 year 2 mons 3 days");
        assert_eq!(format_interval(&interval(0, 0, -1_500_000)), "-00:00:01.5");
    }

    #[test]
    fn test_text_columns_are_cast_by_position() {
        let sql = with_text_columns("SELECT doc, id FROM docs;\n", &[true, false]);
        assert_eq!(
            sql,
            "WITH q (c1, c2) AS (\nSELECT doc, id FROM docs\n) SELECT c1::text, c2 FROM q"
        );
    }

    // Postgres-only behaviour, run when TAXI_INGEST_TEST_PG is set

    #[tokio::test]
    async fn test_pg_null_params_take_column_types() {
        let Some(mut db) = DbConnection::postgres_from_env().await else {
            return;
        };
        execute(
            &mut db,
            "CREATE TEMP TABLE fares (trip_id BIGINT, pickup TIMESTAMP, paid BOOLEAN)",
            &[],
        )
        .await
        .into_result()
        .unwrap();

        let inserted = execute(
            &mut db,
            "INSERT INTO fares (trip_id, pickup, paid) VALUES ($1, $2, $3), ($4, $5, $6)",
            &[
                Value::Null,
                Value::Null,
                Value::Null,
                Value::Int(2),
                Value::Null,
                Value::Bool(true),
            ],
        )
        .await
        .into_result()
        .unwrap();
        assert_eq!(inserted, 2);

        let rows = fetch(
            &mut db,
            "SELECT COUNT(*) FROM fares WHERE trip_id IS NOT DISTINCT FROM $1",
            &[Value::Null],
        )
        .await
        .into_result()
        .unwrap();
        assert_eq!(rows, vec![vec![Value::Int(1)]]);
    }

    #[tokio::test]
    async fn test_pg_fetch_decodes_aggregates_and_intervals() {
        let Some(mut db) = DbConnection::postgres_from_env().await else {
            return;
        };
        execute(&mut db, "CREATE TEMP TABLE trips (distance BIGINT)", &[])
            .await
            .into_result()
            .unwrap();
        execute(
            &mut db,
            "INSERT INTO trips (distance) VALUES ($1), ($2)",
            &[Value::Int(1), Value::Int(2)],
        )
        .await
        .into_result()
        .unwrap();

        let rows = fetch(&mut db, "SELECT SUM(distance), AVG(distance) FROM trips", &[])
            .await
            .into_result()
            .unwrap();
        assert_eq!(rows, vec![vec![Value::Int(3), Value::Float(1.5)]]);

        let rows = fetch(
            &mut db,
            "SELECT INTERVAL '1 day 02:00:00', now() - now()",
            &[],
        )
        .await
        .into_result()
        .unwrap();
        assert_eq!(
            rows,
            vec![vec![
                Value::Text("1 day 02:00:00".into()),
                Value::Text("00:00:00".into())
            ]]
        );

        let rows = fetch(
            &mut db,
            "SELECT distance FROM trips WHERE distance > $1",
            &[Value::Int(9)],
        )
        .await;
        match rows {
            DbOutcome::Success(rows) => assert!(rows.is_empty()),
            DbOutcome::Failure(e) => panic!("unexpected failure: {}", e),
        }
    }

    #[tokio::test]
    async fn test_pg_other_types_come_back_as_text() {
        let Some(mut db) = DbConnection::postgres_from_env().await else {
            return;
        };
        let rows = fetch(
            &mut db,
            "SELECT '{\"zone\": 7}'::jsonb, 7::int4, '7'::text AS c1;",
            &[],
        )
        .await
        .into_result()
        .unwrap();
        assert_eq!(
            rows,
            vec![vec![
                Value::Text("{\"zone\": 7}".into()),
                Value::Int(7),
                Value::Text("7".into())
            ]]
        );
    }

    #[tokio::test]
    async fn test_pg_failed_execute_rolls_back() {
        let Some(mut db) = DbConnection::postgres_from_env().await else {
            return;
        };
        execute(&mut db, "CREATE TEMP TABLE zones (id BIGINT NOT NULL)", &[])
            .await
            .into_result()
            .unwrap();

        let outcome = execute(
            &mut db,
            "INSERT INTO zones (id) VALUES ($1), ($2)",
            &[Value::Int(1), Value::Null],
        )
        .await;
        match outcome {
            DbOutcome::Failure(e) => assert_eq!(e.kind(), DbErrorKind::Statement),
            DbOutcome::Success(_) => panic!("expected failure"),
        }

        let rows = fetch(&mut db, "SELECT COUNT(*) FROM zones", &[])
            .await
            .into_result()
            .unwrap();
        assert_eq!(rows, vec![vec![Value::Int(0)]]);
    }
}
