// Azure Data Warehouse Adapter
// SQL-adapter facade over the connection manager

use crate::db::credentials::{Credentials, ADAPTER_TYPE};
use crate::db::managers::ConnectionManager;
use crate::db::query::{Cursor, QueryResult};
use crate::db::traits::{AdapterError, BindValue};
use crate::db::SharedConnection;

pub struct AzureDataWarehouseAdapter {
    connections: ConnectionManager,
}

impl AzureDataWarehouseAdapter {
    pub fn new(connections: ConnectionManager) -> Self {
        Self { connections }
    }

    /// Adapter over the native TDS driver
    pub fn from_credentials(credentials: Credentials) -> Result<Self, AdapterError> {
        Ok(Self::new(ConnectionManager::mssql(credentials)?))
    }

    pub fn type_name() -> &'static str {
        ADAPTER_TYPE
    }

    /// Queries on this warehouse cannot be cancelled once sent
    pub fn is_cancelable() -> bool {
        false
    }

    /// Names of connections a cancellation was issued for. Always empty here.
    pub fn cancel_open_connections(&self) -> Vec<String> {
        Vec::new()
    }

    pub fn connections(&self) -> &ConnectionManager {
        &self.connections
    }

    pub fn execute(
        &self,
        sql: &str,
        auto_begin: bool,
        fetch: bool,
    ) -> Result<(String, Option<QueryResult>), AdapterError> {
        self.connections.execute(sql, None, auto_begin, fetch)
    }

    pub fn add_query(
        &self,
        sql: &str,
        name: Option<&str>,
        auto_begin: bool,
        bindings: Option<&[BindValue]>,
        abridge_sql_log: bool,
    ) -> Result<(SharedConnection, Cursor), AdapterError> {
        self.connections
            .add_query(sql, name, auto_begin, bindings, abridge_sql_log)
    }

    pub fn begin(&self, name: &str) -> Result<(), AdapterError> {
        self.connections.begin(name)
    }

    pub fn commit(&self, name: &str) -> Result<(), AdapterError> {
        self.connections.commit(name)
    }

    pub fn release(&self, name: &str) -> Result<(), AdapterError> {
        self.connections.release(name)
    }

    pub fn cleanup_connections(&self) -> Vec<String> {
        self.connections.cleanup_all()
    }
}
