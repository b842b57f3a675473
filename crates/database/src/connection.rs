use crate::error::DbError;
use crate::pool::Pool;
use crate::source::{Connection, ConnectionSource};
use async_trait::async_trait;
use configuration::DatabaseConfig;
use core_types::{Row, Value};
use sqlx::postgres::{PgConnectOptions, PgRow, PgSslMode};
use sqlx::{Column, Connection as _, PgConnection, Row as _, TypeInfo, ValueRef};
use tracing::{debug, info, warn};

/// Opens physical Postgres connections with `sqlx`.
#[derive(Debug, Clone)]
pub struct PgSource {
    options: PgConnectOptions,
}

impl PgSource {
    pub fn new(config: &DatabaseConfig) -> Self {
        let ssl_mode = if config.tls {
            PgSslMode::Require
        } else {
            PgSslMode::Disable
        };
        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.username)
            .password(&config.password)
            .database(&config.database)
            .ssl_mode(ssl_mode);
        Self { options }
    }
}

#[async_trait]
impl ConnectionSource for PgSource {
    async fn open(&self) -> Result<Box<dyn Connection>, DbError> {
        let conn = PgConnection::connect_with(&self.options)
            .await
            .map_err(|e| DbError::ConnectFailed(e.to_string()))?;
        Ok(Box::new(PgSession { conn, broken: false }))
    }
}

/// A single open Postgres connection.
struct PgSession {
    conn: PgConnection,
    // Set once the transport fails; the pool then closes the session instead of reusing it.
    broken: bool,
}

#[async_trait]
impl Connection for PgSession {
    async fn execute(&mut self, sql: &str) -> Result<Vec<Row>, DbError> {
        // Statements are fully rendered SQL text, so they go over the simple query protocol.
        let conn: &mut PgConnection = &mut self.conn;
        let result = sqlx::Executor::fetch_all(conn, sqlx::raw_sql(sql)).await;
        let rows = match result {
            Ok(rows) => rows,
            Err(e) => {
                let (error, broken) = driver_error(e);
                if broken {
                    warn!(error = %error, "database connection failed, it will not be reused");
                    self.broken = true;
                }
                return Err(error);
            }
        };
        rows.iter().map(decode_row).collect()
    }

    fn is_closed(&self) -> bool {
        self.broken
    }

    async fn close(self: Box<Self>) -> Result<(), DbError> {
        self.conn.close().await?;
        Ok(())
    }
}

/// Maps a driver error into [`DbError`] and reports whether the connection is
/// no longer usable.
///
/// Errors the server reported about the statement become [`DbError::Database`];
/// transport failures leave the connection broken.
fn driver_error(error: sqlx::Error) -> (DbError, bool) {
    let broken = matches!(
        error,
        sqlx::Error::Io(_) | sqlx::Error::Protocol(_) | sqlx::Error::Tls(_)
    );
    let error = match error {
        sqlx::Error::Database(db) => DbError::Database(db.to_string()),
        other => DbError::Sqlx(other),
    };
    (error, broken)
}

/// How a result column is read, chosen from its Postgres type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnDecoder {
    Int2,
    Int4,
    Int8,
    Bool,
    Float4,
    Float8,
    Bytes,
    Json,
    // text, char, xml, numeric, dates: the simple protocol returns them as text.
    Text,
}

impl ColumnDecoder {
    fn for_type(type_name: &str) -> Self {
        match type_name {
            "INT2" => ColumnDecoder::Int2,
            "INT4" => ColumnDecoder::Int4,
            "INT8" => ColumnDecoder::Int8,
            "BOOL" => ColumnDecoder::Bool,
            "FLOAT4" => ColumnDecoder::Float4,
            "FLOAT8" => ColumnDecoder::Float8,
            "BYTEA" => ColumnDecoder::Bytes,
            "JSON" | "JSONB" => ColumnDecoder::Json,
            _ => ColumnDecoder::Text,
        }
    }
}

/// A JSON array is a document list; anything else is a single document.
fn json_value(doc: serde_json::Value) -> Value {
    match doc {
        serde_json::Value::Array(items) => Value::JsonList(items),
        doc => Value::Json(doc),
    }
}

/// Converts a driver row into an owned [`Row`].
fn decode_row(row: &PgRow) -> Result<Row, DbError> {
    let mut decoded = Row::with_capacity(row.len());
    for column in row.columns() {
        let index = column.ordinal();
        if row.try_get_raw(index)?.is_null() {
            decoded.push(column.name(), Value::Null);
            continue;
        }
        let value = match ColumnDecoder::for_type(column.type_info().name()) {
            ColumnDecoder::Int2 => Value::Int(i64::from(row.try_get::<i16, _>(index)?)),
            ColumnDecoder::Int4 => Value::Int(i64::from(row.try_get::<i32, _>(index)?)),
            ColumnDecoder::Int8 => Value::Int(row.try_get::<i64, _>(index)?),
            ColumnDecoder::Bool => Value::Bool(row.try_get::<bool, _>(index)?),
            ColumnDecoder::Float4 => Value::Float(f64::from(row.try_get::<f32, _>(index)?)),
            ColumnDecoder::Float8 => Value::Float(row.try_get::<f64, _>(index)?),
            ColumnDecoder::Bytes => Value::Bytes(row.try_get::<Vec<u8>, _>(index)?),
            ColumnDecoder::Json => json_value(row.try_get::<serde_json::Value, _>(index)?),
            ColumnDecoder::Text => Value::Text(row.try_get_unchecked::<String, _>(index)?),
        };
        decoded.push(column.name(), value);
    }
    Ok(decoded)
}

/// Builds a connection pool from configuration and verifies it can reach the database.
///
/// One connection is opened eagerly and left idle, so an unreachable server is
/// reported here rather than on the first query.
pub async fn connect(config: &DatabaseConfig) -> Result<Pool, DbError> {
    let pool = Pool::new(PgSource::new(config), config.maximum_connections);
    let conn = pool.acquire().await?;
    conn.release().await;
    info!(
        host = %config.host,
        database = %config.database,
        max_connections = config.maximum_connections,
        "connected to database"
    );
    Ok(pool)
}

impl Pool {
    /// Same as [`connect`].
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, DbError> {
        connect(config).await
    }
}

/// Opens a single connection outside any pool.
///
/// Useful for binding a record façade to one connection for a batch of statements.
pub async fn open(config: &DatabaseConfig) -> Result<Box<dyn Connection>, DbError> {
    debug!(host = %config.host, "opening a standalone database connection");
    PgSource::new(config).open().await
}
