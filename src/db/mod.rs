// Database Module
// Credentials, connection lifecycle, statement execution and the driver seam

pub mod connection;
pub mod connection_string;
pub mod credentials;
pub mod drivers;
pub mod managers;
pub mod query;
pub mod traits;

#[cfg(test)]
pub(crate) mod testing;

pub use connection::{Connection, ConnectionStatus, SharedConnection};
pub use connection_string::{obfuscate_password, ConnectionString};
pub use credentials::{AuthenticationMode, Credentials, ADAPTER_TYPE, DEFAULT_DRIVER, DEFAULT_PORT};
pub use drivers::MssqlDriver;
pub use managers::{ConnectionManager, DEFAULT_CONNECTION_NAME};
pub use query::{Cursor, QueryResult, STATUS_OK};
pub use traits::{
    AdapterError, BindValue, CellValue, ColumnInfo, DatabaseDriver, DriverError, DriverSession,
    QueryOutcome,
};
