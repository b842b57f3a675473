use crate::record::Record;
use crate::schema::Schema;
use crate::statements;
use core_types::CoreError;
use database::{Connection, DbError, Pool};
use tracing::{debug, info};

/// A set of record types created and dropped together.
///
/// Tables are created without inline references first, then every inferred
/// foreign key is added in a second pass, so registration order never matters
/// for creation. Dropping runs in reverse registration order.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    schemas: Vec<Schema>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a record type. Registering the same table twice keeps the first registration.
    pub fn register<T: Record>(mut self) -> Result<Self, CoreError> {
        let schema = Schema::of::<T>()?;
        if !self.schemas.iter().any(|s| s.table() == schema.table()) {
            self.schemas.push(schema);
        }
        Ok(self)
    }

    pub fn schemas(&self) -> &[Schema] {
        &self.schemas
    }

    /// Every statement `create_all` runs, in order.
    pub fn create_statements(&self) -> Vec<String> {
        let mut sql = Vec::new();
        for schema in &self.schemas {
            sql.push(statements::create_table_without_references(schema));
            sql.extend(statements::create_indexes(schema));
        }
        for schema in &self.schemas {
            sql.extend(statements::add_foreign_keys(schema));
        }
        sql
    }

    /// Every statement `drop_all` runs, in order.
    pub fn drop_statements(&self) -> Vec<String> {
        self.schemas
            .iter()
            .rev()
            .map(statements::drop_table_cascade)
            .collect()
    }

    /// Creates every registered table on `conn`.
    pub async fn create_all_on(&self, conn: &mut dyn Connection) -> Result<(), DbError> {
        run_all(conn, &self.create_statements()).await?;
        info!(tables = self.schemas.len(), "catalog created");
        Ok(())
    }

    /// Creates every registered table on one pool connection.
    pub async fn create_all(&self, pool: &Pool) -> Result<(), DbError> {
        let mut conn = pool.acquire().await?;
        let result = self.create_all_on(&mut conn).await;
        conn.release().await;
        result
    }

    /// Drops every registered table, most recently registered first.
    pub async fn drop_all(&self, pool: &Pool) -> Result<(), DbError> {
        let mut conn = pool.acquire().await?;
        let result = run_all(&mut conn, &self.drop_statements()).await;
        conn.release().await;
        result?;
        info!(tables = self.schemas.len(), "catalog dropped");
        Ok(())
    }
}

async fn run_all(conn: &mut dyn Connection, statements: &[String]) -> Result<(), DbError> {
    for sql in statements {
        debug!(sql = sql.as_str(), "executing catalog statement");
        conn.execute(sql).await?;
    }
    Ok(())
}
