// Credential Model
// Validated, immutable description of how to reach the warehouse

use crate::db::traits::AdapterError;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const ADAPTER_TYPE: &str = "azuredatawarehouse";
pub const DEFAULT_DRIVER: &str = "ODBC Driver 17 for SQL Server";
pub const DEFAULT_PORT: u16 = 1433;

/// Authentication modes understood by the warehouse driver
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AuthenticationMode {
    #[serde(rename = "ActiveDirectoryIntegrated")]
    IntegratedAd,
    #[serde(rename = "ActiveDirectoryMSI")]
    MsiAd,
    #[serde(rename = "ActiveDirectoryPassword")]
    PasswordAd,
    #[serde(rename = "Sql")]
    SqlAuth,
}

impl AuthenticationMode {
    /// Value written into the AUTHENTICATION clause
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthenticationMode::IntegratedAd => "ActiveDirectoryIntegrated",
            AuthenticationMode::MsiAd => "ActiveDirectoryMSI",
            AuthenticationMode::PasswordAd => "ActiveDirectoryPassword",
            AuthenticationMode::SqlAuth => "Sql",
        }
    }

    pub fn requires_username(&self) -> bool {
        matches!(
            self,
            AuthenticationMode::SqlAuth | AuthenticationMode::PasswordAd
        )
    }
}

impl fmt::Display for AuthenticationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Warehouse credentials. Build through [`Credentials::from_value`] so the
/// record is validated before any connection uses it.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Credentials {
    #[serde(alias = "server")]
    pub host: String,
    pub database: String,
    pub schema: String,
    pub authentication: AuthenticationMode,
    #[serde(default, alias = "user")]
    pub username: Option<String>,
    #[serde(default, alias = "pass", skip_serializing)]
    pub password: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub driver: Option<String>,
}

impl Credentials {
    /// Validate a raw configuration value into a credential record
    pub fn from_value(value: serde_json::Value) -> Result<Self, AdapterError> {
        let credentials: Credentials = serde_json::from_value(value)
            .map_err(|e| AdapterError::SchemaValidation(e.to_string()))?;
        credentials.validate()?;
        Ok(credentials)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, AdapterError> {
        let value: serde_json::Value = serde_json::from_str(raw)
            .map_err(|e| AdapterError::SchemaValidation(e.to_string()))?;
        Self::from_value(value)
    }

    fn validate(&self) -> Result<(), AdapterError> {
        let has_username = self
            .username
            .as_deref()
            .map(|u| !u.is_empty())
            .unwrap_or(false);
        if self.authentication.requires_username() && !has_username {
            return Err(AdapterError::SchemaValidation(format!(
                "username is required for authentication {}",
                self.authentication
            )));
        }
        Ok(())
    }

    pub fn adapter_type(&self) -> &'static str {
        ADAPTER_TYPE
    }

    /// Driver name, falling back to the default ODBC driver
    pub fn driver_or_default(&self) -> &str {
        self.driver
            .as_deref()
            .filter(|d| !d.is_empty())
            .unwrap_or(DEFAULT_DRIVER)
    }

    pub fn port_or_default(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }

    /// Fields that are safe to print in diagnostics. Never includes the
    /// password or the driver.
    pub fn connection_keys(&self) -> Vec<(&'static str, String)> {
        vec![
            ("host", self.host.clone()),
            ("database", self.database.clone()),
            ("schema", self.schema.clone()),
            ("username", self.username.clone().unwrap_or_default()),
            ("authentication", self.authentication.to_string()),
        ]
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("host", &self.host)
            .field("database", &self.database)
            .field("schema", &self.schema)
            .field("authentication", &self.authentication)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("port", &self.port)
            .field("driver", &self.driver)
            .finish()
    }
}
