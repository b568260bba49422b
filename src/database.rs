//! [`PgClient`] over a SeaORM `DatabaseConnection`.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use sea_orm::{
    ConnectionTrait, Database, DatabaseConnection, DbBackend, DbErr, QueryResult, Statement,
    Value,
};

use crate::client::PgClient;
use crate::conninfo::ConnectionConfig;

/// A PostgreSQL connection backed by SeaORM.
///
/// SeaORM has no named server-side statements, so [`PgClient::prepare`]
/// registers the SQL under its name on this connection and
/// [`PgClient::exec_prepared`] runs it with the given parameters.
///
/// Connecting needs the `sqlx-postgres` feature; without it
/// [`PgClient::connect`] fails with SeaORM's own error.
#[derive(Debug)]
pub struct SeaOrmClient {
    inner: DatabaseConnection,
    prepared: RwLock<HashMap<String, String>>,
}

impl SeaOrmClient {
    pub fn new(connection: DatabaseConnection) -> Self {
        Self {
            inner: connection,
            prepared: RwLock::new(HashMap::new()),
        }
    }

    /// Get a reference to the underlying `DatabaseConnection`.
    pub fn inner(&self) -> &DatabaseConnection {
        &self.inner
    }

    /// Consume the client and return the underlying `DatabaseConnection`.
    pub fn into_inner(self) -> DatabaseConnection {
        self.inner
    }

    fn statement(sql: &str, params: &[Value]) -> Statement {
        if params.is_empty() {
            Statement::from_string(DbBackend::Postgres, sql)
        } else {
            Statement::from_sql_and_values(DbBackend::Postgres, sql, params.iter().cloned())
        }
    }
}

impl From<DatabaseConnection> for SeaOrmClient {
    fn from(connection: DatabaseConnection) -> Self {
        Self::new(connection)
    }
}

#[async_trait]
impl PgClient for SeaOrmClient {
    type Rows = Vec<QueryResult>;
    type Param = Value;
    type Error = DbErr;

    async fn connect(config: &ConnectionConfig) -> Result<Self, Self::Error> {
        let url = config
            .to_url()
            .map_err(|err| DbErr::Custom(err.to_string()))?;
        Database::connect(url.to_string()).await.map(Self::new)
    }

    async fn exec(&self, sql: &str) -> Result<Self::Rows, Self::Error> {
        self.inner.query_all(Self::statement(sql, &[])).await
    }

    async fn exec_params(
        &self,
        sql: &str,
        params: &[Self::Param],
    ) -> Result<Self::Rows, Self::Error> {
        self.inner.query_all(Self::statement(sql, params)).await
    }

    async fn prepare(&self, name: &str, sql: &str) -> Result<Self::Rows, Self::Error> {
        let mut prepared = self.prepared.write().unwrap_or_else(PoisonError::into_inner);
        if prepared.contains_key(name) {
            return Err(DbErr::Custom(format!(
                "prepared statement \"{name}\" already exists"
            )));
        }
        prepared.insert(name.to_string(), sql.to_string());
        Ok(Vec::new())
    }

    async fn exec_prepared(
        &self,
        name: &str,
        params: &[Self::Param],
    ) -> Result<Self::Rows, Self::Error> {
        let sql = self
            .prepared
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| {
                DbErr::Custom(format!("prepared statement \"{name}\" does not exist"))
            })?;

        self.inner.query_all(Self::statement(&sql, params)).await
    }
}
