// Azure SQL Data Warehouse connection adapter
// Credentials, connection lifecycle and the statement execution envelope

// Module declarations
pub mod adapter;
pub mod config;
pub mod db;
pub mod logging;

pub use adapter::AzureDataWarehouseAdapter;
pub use config::{ProfilesFile, TargetConfig};
pub use db::{
    AdapterError, AuthenticationMode, ConnectionManager, ConnectionStatus, Credentials, Cursor,
};
pub use logging::{AdapterLogger, TracingLogger};
