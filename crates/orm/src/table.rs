use crate::query::Select;
use crate::record::Record;
use crate::schema::Schema;
use crate::statements;
use core_types::{CoreError, Row, Value};
use database::{Connection, DbError, Pool};
use std::ops::{Deref, DerefMut};
use tracing::{debug, trace};

/// Where a façade sends its statements.
enum Executor<'c> {
    /// Borrow a pool connection per statement.
    Pool(Pool),
    /// Reuse a connection owned by the caller. It is never released by the façade.
    Bound(&'c mut dyn Connection),
}

/// CRUD and query operations for one record type.
///
/// A `Table` wraps a record value together with its schema. It dereferences
/// to the record, so fields are read and written directly before calling
/// [`Table::save`], and are refreshed by [`Table::get`].
pub struct Table<'c, T: Record> {
    record: T,
    schema: Schema,
    executor: Executor<'c>,
}

impl<T: Record> Table<'static, T> {
    /// A façade over a default record that borrows connections from `pool`.
    pub fn new(pool: &Pool) -> Result<Self, CoreError> {
        Self::with_record(pool, T::default())
    }

    pub fn with_record(pool: &Pool, record: T) -> Result<Self, CoreError> {
        Ok(Self {
            record,
            schema: Schema::of::<T>()?,
            executor: Executor::Pool(pool.clone()),
        })
    }
}

impl<'c, T: Record> Table<'c, T> {
    /// A façade that runs every statement on `conn`.
    pub fn bound(conn: &'c mut dyn Connection) -> Result<Self, CoreError> {
        Self::bound_with_record(conn, T::default())
    }

    pub fn bound_with_record(conn: &'c mut dyn Connection, record: T) -> Result<Self, CoreError> {
        Ok(Self {
            record,
            schema: Schema::of::<T>()?,
            executor: Executor::Bound(conn),
        })
    }

    pub fn record(&self) -> &T {
        &self.record
    }

    pub fn into_record(self) -> T {
        self.record
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Runs raw SQL and returns the rows untouched.
    pub async fn execute(&mut self, sql: &str) -> Result<Vec<Row>, DbError> {
        self.run(sql).await
    }

    /// Creates the table and its unique indexes. Safe to call repeatedly.
    pub async fn create(&mut self) -> Result<(), DbError> {
        self.run(&statements::create_table(&self.schema)).await?;
        for sql in statements::create_indexes(&self.schema) {
            self.run(&sql).await?;
        }
        Ok(())
    }

    pub async fn drop(&mut self) -> Result<(), DbError> {
        self.run(&statements::drop_table(&self.schema)).await?;
        Ok(())
    }

    /// Inserts the record when its key is zero, otherwise updates it.
    ///
    /// The returned row is decoded back into the record, so a generated key is
    /// visible afterwards. Returns the key.
    pub async fn save(&mut self) -> Result<Value, DbError> {
        let values = self.record.values()?;
        self.schema.check_values(&values)?;
        let inserting = values[0].is_zero();
        let sql = if inserting {
            statements::insert(&self.schema, &values)?
        } else {
            statements::update(&self.schema, &values)?
        };

        let rows = self.run(&sql).await?;
        let row = rows.first().ok_or(DbError::RecordNotSaved)?;
        self.record.decode(row)?;
        let key = row
            .column(self.schema.primary_key().name())
            .cloned()
            .ok_or(DbError::RecordNotSaved)?;
        debug!(table = self.schema.table(), inserted = inserting, %key, "record saved");
        Ok(key)
    }

    /// Loads the record with primary key `id`.
    pub async fn get(&mut self, id: impl Into<Value>) -> Result<&T, DbError> {
        self.get_by("", id).await
    }

    /// Loads the first record whose `key` column equals `value`. An empty key means the primary key.
    pub async fn get_by(&mut self, key: &str, value: impl Into<Value>) -> Result<&T, DbError> {
        let sql = statements::select_by(&self.schema, key, &value.into());
        let rows = self.run(&sql).await?;
        let row = rows.first().ok_or(DbError::RecordNotFound)?;
        self.record.decode(row)?;
        Ok(&self.record)
    }

    /// Runs `query` against this table and decodes each row into a new record.
    pub async fn query(&mut self, query: &Select) -> Result<Vec<T>, DbError> {
        self.query_into::<T>(query).await
    }

    /// Like [`Table::query`], decoding into another record type (typically one
    /// whose fields span a join).
    pub async fn query_into<U: Record>(&mut self, query: &Select) -> Result<Vec<U>, DbError> {
        let sql = statements::select(&self.schema, query)?;
        self.query_sql(&sql).await
    }

    /// Runs hand-written SQL and decodes each row into a new `U`.
    pub async fn query_sql<U: Record>(&mut self, sql: &str) -> Result<Vec<U>, DbError> {
        let rows = self.run(sql).await?;
        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut record = U::default();
            record.decode(row)?;
            records.push(record);
        }
        Ok(records)
    }

    /// Sets `columns` to `values` wherever `key` equals `value`. Returns the number of rows changed.
    pub async fn update(
        &mut self,
        columns: &[&str],
        values: &[Value],
        key: &str,
        value: impl Into<Value>,
    ) -> Result<u64, DbError> {
        let sql = statements::update_columns(&self.schema, columns, values, key, &value.into())?;
        Ok(self.run(&sql).await?.len() as u64)
    }

    /// Deletes the row matching the record's primary key. Returns false if there was none.
    pub async fn delete(&mut self) -> Result<bool, DbError> {
        let values = self.record.values()?;
        self.schema.check_values(&values)?;
        let sql = statements::delete(&self.schema, &values[0]);
        Ok(!self.run(&sql).await?.is_empty())
    }

    pub async fn delete_id(&mut self, id: impl Into<Value>) -> Result<bool, DbError> {
        let sql = statements::delete(&self.schema, &id.into());
        Ok(!self.run(&sql).await?.is_empty())
    }

    /// Deletes every row whose `key` column equals `value`. Returns the number removed.
    pub async fn delete_by(&mut self, key: &str, value: impl Into<Value>) -> Result<u64, DbError> {
        let sql = statements::delete_by(&self.schema, key, &value.into());
        Ok(self.run(&sql).await?.len() as u64)
    }

    /// Sends one statement, borrowing a pool connection for its duration when not bound.
    async fn run(&mut self, sql: &str) -> Result<Vec<Row>, DbError> {
        debug!(table = self.schema.table(), sql, "executing statement");
        let rows = match &mut self.executor {
            Executor::Bound(conn) => conn.execute(sql).await?,
            Executor::Pool(pool) => {
                let mut conn = pool.acquire().await?;
                let result = conn.execute(sql).await;
                conn.release().await;
                result?
            }
        };
        trace!(table = self.schema.table(), rows = rows.len(), "statement finished");
        Ok(rows)
    }
}

impl<T: Record> Deref for Table<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.record
    }
}

impl<T: Record> DerefMut for Table<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.record
    }
}
