// Database Driver Traits
// Seam between the connection manager and the driver that talks to the warehouse

use serde::{Deserialize, Serialize};

/// Classified adapter error. Every variant carries the original message.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AdapterError {
    #[error("Schema validation error: {0}")]
    SchemaValidation(String),

    #[error("Unsupported authentication: {0}")]
    UnsupportedAuthentication(String),

    #[error("Failed to connect: {0}")]
    FailedToConnect(String),

    #[error("Database error: {0}")]
    DatabaseExecution(String),

    #[error("Runtime error: {0}")]
    RuntimeExecution(String),

    #[error("Connection not found: {0}")]
    ConnectionNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Error reported by a driver before the adapter classifies it
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DriverError {
    /// The session could not be established
    #[error("{0}")]
    Connect(String),

    /// The warehouse rejected or failed the statement
    #[error("{message}")]
    Database { code: Option<u32>, message: String },

    /// Anything that is not a database-level failure (arguments, conversions)
    #[error("{0}")]
    Runtime(String),
}

impl DriverError {
    pub fn database(message: impl Into<String>) -> Self {
        DriverError::Database {
            code: None,
            message: message.into(),
        }
    }

    pub fn is_database_error(&self) -> bool {
        matches!(self, DriverError::Database { .. } | DriverError::Connect(_))
    }
}

/// Positional parameter bound to a statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BindValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl From<&str> for BindValue {
    fn from(value: &str) -> Self {
        BindValue::String(value.to_string())
    }
}

impl From<String> for BindValue {
    fn from(value: String) -> Self {
        BindValue::String(value)
    }
}

impl From<i64> for BindValue {
    fn from(value: i64) -> Self {
        BindValue::Int(value)
    }
}

impl From<f64> for BindValue {
    fn from(value: f64) -> Self {
        BindValue::Float(value)
    }
}

impl From<bool> for BindValue {
    fn from(value: bool) -> Self {
        BindValue::Bool(value)
    }
}

/// Cell value in a result set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    DateTime(String),
    Binary(Vec<u8>),
}

/// Column metadata for a result set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
}

/// Everything a driver hands back for one executed statement
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOutcome {
    pub columns: Vec<ColumnInfo>,
    pub rows: Vec<Vec<CellValue>>,
    pub rows_affected: Option<u64>,
}

/// Live session with the warehouse. Owned by exactly one `Connection`.
#[async_trait::async_trait]
pub trait DriverSession: Send {
    /// Execute one statement with positional bindings
    async fn execute(
        &mut self,
        sql: &str,
        bindings: &[BindValue],
    ) -> Result<QueryOutcome, DriverError>;

    /// Close the session
    async fn close(self: Box<Self>) -> Result<(), DriverError>;
}

/// Database driver - opens sessions from an ODBC-style connection string
#[async_trait::async_trait]
pub trait DatabaseDriver: Send + Sync {
    /// Display name for logs
    fn driver_name(&self) -> &'static str;

    async fn connect(&self, connection_string: &str) -> Result<Box<dyn DriverSession>, DriverError>;
}
