//! Database client trait for catalog introspection.
//!
//! Introspection only ever reads, so the trait exposes `query` and `query_opt`.

use crate::error::{SchemaError, SchemaResult};
use tokio_postgres::Row;
use tokio_postgres::types::ToSql;

/// A trait for types that can run read-only PostgreSQL catalog queries.
///
/// Implemented for `tokio_postgres::Client`.
/// Implementations must allow concurrent calls through `&self`; batched
/// introspection issues many queries at once over one connection.
#[async_trait::async_trait]
pub trait IntrospectClient: Sync {
    /// Execute a query and return all rows.
    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> SchemaResult<Vec<Row>>;

    /// Execute a query and return at most one row.
    async fn query_opt(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> SchemaResult<Option<Row>>;
}

#[async_trait::async_trait]
impl IntrospectClient for tokio_postgres::Client {
    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> SchemaResult<Vec<Row>> {
        self.query(sql, params).await.map_err(SchemaError::from)
    }

    async fn query_opt(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> SchemaResult<Option<Row>> {
        self.query_opt(sql, params).await.map_err(SchemaError::from)
    }
}

/// Extension trait for accessing row columns with better error handling.
pub trait RowExt {
    /// Get a column value by name, returning a SchemaError on failure.
    fn try_get_column<'a, T>(&'a self, column: &str) -> SchemaResult<T>
    where
        T: tokio_postgres::types::FromSql<'a>;
}

impl RowExt for Row {
    fn try_get_column<'a, T>(&'a self, column: &str) -> SchemaResult<T>
    where
        T: tokio_postgres::types::FromSql<'a>,
    {
        self.try_get(column)
            .map_err(|e| SchemaError::decode(column, e.to_string()))
    }
}
