// MS-SQL Driver
// Native TDS driver for Azure SQL Data Warehouse built on tiberius

use crate::db::connection_string::parse as parse_connection_string;
use crate::db::traits::{
    BindValue, CellValue, ColumnInfo, DatabaseDriver, DriverError, DriverSession, QueryOutcome,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use tiberius::numeric::Numeric;
use tiberius::{AuthMethod, Client, Column, ColumnType, Config, EncryptionLevel, Query, Row};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

type TdsClient = Client<Compat<TcpStream>>;

/// Driver that speaks TDS directly instead of going through an ODBC manager.
/// Only `Sql` authentication can be satisfied without an identity provider.
#[derive(Debug, Clone, Copy, Default)]
pub struct MssqlDriver;

impl MssqlDriver {
    pub fn new() -> Self {
        Self
    }

    /// Translate the ODBC-style connection string into a tiberius Config
    pub fn to_tiberius_config(connection_string: &str) -> Result<Config, DriverError> {
        let pairs = parse_connection_string(connection_string)?;
        let get = |key: &str| {
            pairs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        };

        let server = get("SERVER")
            .filter(|s| !s.is_empty())
            .ok_or_else(|| DriverError::Connect("SERVER is required".to_string()))?;
        let (host, server_port) = split_server(server)?;

        let mut config = Config::new();
        config.host(host);

        let port = match get("PORT").filter(|p| !p.is_empty()) {
            Some(p) => Some(p.parse::<u16>().map_err(|_| {
                DriverError::Connect(format!("invalid PORT value '{}'", p))
            })?),
            None => server_port,
        };
        if let Some(port) = port {
            config.port(port);
        }

        if let Some(database) = get("DATABASE").filter(|d| !d.is_empty()) {
            config.database(database);
        }

        let username = get("UID").unwrap_or_default();
        let password = get("PWD").unwrap_or_default();
        match get("AUTHENTICATION").unwrap_or("Sql") {
            "Sql" | "SqlPassword" => {
                config.authentication(AuthMethod::sql_server(username, password));
            }
            other => {
                return Err(DriverError::Connect(format!(
                    "authentication {} is not supported by the native TDS driver",
                    other
                )))
            }
        }

        // Azure only accepts encrypted sessions unless told otherwise
        let encrypt = get("ENCRYPT").map(is_truthy).unwrap_or(true);
        config.encryption(if encrypt {
            EncryptionLevel::Required
        } else {
            EncryptionLevel::Off
        });
        if get("TRUSTSERVERCERTIFICATE").map(is_truthy).unwrap_or(false) {
            config.trust_cert();
        }

        Ok(config)
    }

    async fn connect_client(config: Config) -> Result<TdsClient, tiberius::error::Error> {
        let tcp = TcpStream::connect(config.get_addr()).await?;
        tcp.set_nodelay(true)?;
        Client::connect(config, tcp.compat_write()).await
    }
}

#[async_trait::async_trait]
impl DatabaseDriver for MssqlDriver {
    fn driver_name(&self) -> &'static str {
        "tiberius"
    }

    async fn connect(&self, connection_string: &str) -> Result<Box<dyn DriverSession>, DriverError> {
        let config = Self::to_tiberius_config(connection_string)?;

        // Azure gateways may redirect the login to another node
        let client = match Self::connect_client(config.clone()).await {
            Err(tiberius::error::Error::Routing { host, port }) => {
                let mut config = config;
                config.host(&host);
                config.port(port);
                Self::connect_client(config).await
            }
            other => other,
        }
        .map_err(|e| DriverError::Connect(e.to_string()))?;

        Ok(Box::new(MssqlSession { client }))
    }
}

/// Live TDS session
pub struct MssqlSession {
    client: TdsClient,
}

#[async_trait::async_trait]
impl DriverSession for MssqlSession {
    async fn execute(
        &mut self,
        sql: &str,
        bindings: &[BindValue],
    ) -> Result<QueryOutcome, DriverError> {
        let mut query = Query::new(sql);
        for value in bindings {
            match value.clone() {
                BindValue::Null => query.bind(Option::<String>::None),
                BindValue::Bool(v) => query.bind(v),
                BindValue::Int(v) => query.bind(v),
                BindValue::Float(v) => query.bind(v),
                BindValue::String(v) => query.bind(v),
            }
        }

        let mut stream = query.query(&mut self.client).await.map_err(classify)?;
        let columns: Vec<ColumnInfo> = stream
            .columns()
            .await
            .map_err(classify)?
            .map(|cols| cols.iter().map(column_info).collect())
            .unwrap_or_default();
        let rows = stream.into_first_result().await.map_err(classify)?;

        let rows = rows
            .iter()
            .map(|row| {
                row.columns()
                    .iter()
                    .enumerate()
                    .map(|(idx, col)| cell_value(row, idx, &col.column_type()))
                    .collect()
            })
            .collect();

        Ok(QueryOutcome {
            columns,
            rows,
            rows_affected: None,
        })
    }

    async fn close(self: Box<Self>) -> Result<(), DriverError> {
        self.client.close().await.map_err(classify)
    }
}

/// Server, transport and protocol failures are database errors; conversion
/// and encoding problems are runtime errors
pub fn classify(err: tiberius::error::Error) -> DriverError {
    use tiberius::error::Error;

    match &err {
        Error::Server(token) => DriverError::Database {
            code: Some(token.code()),
            message: token.message().to_string(),
        },
        Error::Io { .. } | Error::Protocol(_) | Error::Tls(_) | Error::Routing { .. } => {
            DriverError::database(err.to_string())
        }
        _ => DriverError::Runtime(err.to_string()),
    }
}

/// Accepts `host`, `tcp:host` and `host,port`
fn split_server(server: &str) -> Result<(&str, Option<u16>), DriverError> {
    let server = server.strip_prefix("tcp:").unwrap_or(server);
    match server.split_once(',') {
        Some((host, port)) => {
            let port = port.trim().parse::<u16>().map_err(|_| {
                DriverError::Connect(format!("invalid port in SERVER '{}'", server))
            })?;
            Ok((host.trim(), Some(port)))
        }
        None => Ok((server.trim(), None)),
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "yes" | "true" | "1" | "mandatory" | "strict"
    )
}

fn column_info(col: &Column) -> ColumnInfo {
    ColumnInfo {
        name: col.name().to_string(),
        data_type: format_sql_data_type(&col.column_type()),
        nullable: true, // Tiberius doesn't expose nullability
    }
}

fn format_sql_data_type(col_type: &ColumnType) -> String {
    let name = match col_type {
        ColumnType::Int1 => "tinyint",
        ColumnType::Int2 => "smallint",
        ColumnType::Int4 | ColumnType::Intn => "int",
        ColumnType::Int8 => "bigint",
        ColumnType::Float4 => "real",
        ColumnType::Float8 | ColumnType::Floatn => "float",
        ColumnType::Decimaln => "decimal",
        ColumnType::Numericn => "numeric",
        ColumnType::Money => "money",
        ColumnType::Money4 => "smallmoney",
        ColumnType::Bit | ColumnType::Bitn => "bit",
        ColumnType::BigVarChar => "varchar",
        ColumnType::BigChar => "char",
        ColumnType::NVarchar => "nvarchar",
        ColumnType::NChar => "nchar",
        ColumnType::Text => "text",
        ColumnType::NText => "ntext",
        ColumnType::BigVarBin => "varbinary",
        ColumnType::BigBinary => "binary",
        ColumnType::Image => "image",
        ColumnType::Datetime | ColumnType::Datetimen => "datetime",
        ColumnType::Datetime2 => "datetime2",
        ColumnType::Datetime4 => "smalldatetime",
        ColumnType::Daten => "date",
        ColumnType::Timen => "time",
        ColumnType::DatetimeOffsetn => "datetimeoffset",
        ColumnType::Guid => "uniqueidentifier",
        ColumnType::Xml => "xml",
        ColumnType::Null => "null",
        other => return format!("{:?}", other).to_lowercase(),
    };
    name.to_string()
}

fn cell_value(row: &Row, idx: usize, col_type: &ColumnType) -> CellValue {
    match col_type {
        ColumnType::Null => CellValue::Null,

        ColumnType::Int1 => row
            .try_get::<u8, _>(idx)
            .ok()
            .flatten()
            .map(|v| CellValue::Int(v as i64))
            .unwrap_or(CellValue::Null),
        ColumnType::Int2 => row
            .try_get::<i16, _>(idx)
            .ok()
            .flatten()
            .map(|v| CellValue::Int(v as i64))
            .unwrap_or(CellValue::Null),
        ColumnType::Int4 => row
            .try_get::<i32, _>(idx)
            .ok()
            .flatten()
            .map(|v| CellValue::Int(v as i64))
            .unwrap_or(CellValue::Null),
        ColumnType::Int8 => row
            .try_get::<i64, _>(idx)
            .ok()
            .flatten()
            .map(CellValue::Int)
            .unwrap_or(CellValue::Null),
        ColumnType::Intn => row
            .try_get::<i64, _>(idx)
            .ok()
            .flatten()
            .map(CellValue::Int)
            .or_else(|| {
                row.try_get::<i32, _>(idx)
                    .ok()
                    .flatten()
                    .map(|v| CellValue::Int(v as i64))
            })
            .unwrap_or(CellValue::Null),

        ColumnType::Float4 => row
            .try_get::<f32, _>(idx)
            .ok()
            .flatten()
            .map(|v| CellValue::Float(v as f64))
            .unwrap_or(CellValue::Null),
        ColumnType::Float8 | ColumnType::Floatn | ColumnType::Money | ColumnType::Money4 => row
            .try_get::<f64, _>(idx)
            .ok()
            .flatten()
            .map(CellValue::Float)
            .unwrap_or(CellValue::Null),
        ColumnType::Decimaln | ColumnType::Numericn => row
            .try_get::<Numeric, _>(idx)
            .ok()
            .flatten()
            .map(|n| CellValue::Float(f64::from(n)))
            .unwrap_or(CellValue::Null),

        ColumnType::Bit | ColumnType::Bitn => row
            .try_get::<bool, _>(idx)
            .ok()
            .flatten()
            .map(CellValue::Bool)
            .unwrap_or(CellValue::Null),

        ColumnType::Datetime
        | ColumnType::Datetime2
        | ColumnType::Datetimen
        | ColumnType::Datetime4 => row
            .try_get::<NaiveDateTime, _>(idx)
            .ok()
            .flatten()
            .map(|dt| CellValue::DateTime(dt.to_string()))
            .unwrap_or(CellValue::Null),
        ColumnType::DatetimeOffsetn => row
            .try_get::<DateTime<Utc>, _>(idx)
            .ok()
            .flatten()
            .map(|dt| CellValue::DateTime(dt.to_rfc3339()))
            .unwrap_or(CellValue::Null),
        ColumnType::Daten => row
            .try_get::<NaiveDate, _>(idx)
            .ok()
            .flatten()
            .map(|d| CellValue::DateTime(d.to_string()))
            .unwrap_or(CellValue::Null),
        ColumnType::Timen => row
            .try_get::<NaiveTime, _>(idx)
            .ok()
            .flatten()
            .map(|t| CellValue::DateTime(t.to_string()))
            .unwrap_or(CellValue::Null),

        ColumnType::BigVarBin | ColumnType::BigBinary | ColumnType::Image => row
            .try_get::<&[u8], _>(idx)
            .ok()
            .flatten()
            .map(|b| CellValue::Binary(b.to_vec()))
            .unwrap_or(CellValue::Null),

        ColumnType::Guid => row
            .try_get::<tiberius::Uuid, _>(idx)
            .ok()
            .flatten()
            .map(|u| CellValue::String(u.to_string()))
            .unwrap_or(CellValue::Null),

        // Strings and anything else with a text representation
        _ => row
            .try_get::<&str, _>(idx)
            .ok()
            .flatten()
            .map(|s| CellValue::String(s.to_string()))
            .unwrap_or(CellValue::Null),
    }
}
