// Connection Manager
// Opens connections, keeps the named-connection pool, and wraps every
// statement in the execution envelope (begin -> execute -> log -> cursor)

use crate::db::connection::{Connection, SharedConnection};
use crate::db::connection_string::ConnectionString;
use crate::db::credentials::{AuthenticationMode, Credentials, ADAPTER_TYPE};
use crate::db::drivers::MssqlDriver;
use crate::db::query::{Cursor, QueryResult, STATUS_OK};
use crate::db::traits::{AdapterError, BindValue, DatabaseDriver, DriverError};
use crate::logging::{tracing_logger, AdapterLogger};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

/// Connection used when the caller does not name one
pub const DEFAULT_CONNECTION_NAME: &str = "master";

/// Characters of SQL kept when a statement is logged in abridged form
pub const ABRIDGED_SQL_CHARS: usize = 512;

struct PoolSlot {
    connection: SharedConnection,
    in_use: bool,
}

/// Manages named warehouse connections.
///
/// All operations block until the driver finishes. The async driver is run on
/// a private current-thread runtime, so the manager must not be called from
/// inside another tokio runtime.
pub struct ConnectionManager {
    credentials: Arc<Credentials>,
    driver: Arc<dyn DatabaseDriver>,
    logger: Arc<dyn AdapterLogger>,
    slots: Mutex<HashMap<String, PoolSlot>>,
    // Declared last so sessions are dropped while the runtime is still alive
    runtime: tokio::runtime::Runtime,
}

impl ConnectionManager {
    pub fn new(
        credentials: Credentials,
        driver: Arc<dyn DatabaseDriver>,
        logger: Arc<dyn AdapterLogger>,
    ) -> Result<Self, AdapterError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| AdapterError::RuntimeExecution(e.to_string()))?;

        Ok(Self {
            credentials: Arc::new(credentials),
            driver,
            logger,
            slots: Mutex::new(HashMap::new()),
            runtime,
        })
    }

    /// Manager backed by the native TDS driver and `tracing` logging
    pub fn mssql(credentials: Credentials) -> Result<Self, AdapterError> {
        Self::new(credentials, Arc::new(MssqlDriver::new()), tracing_logger())
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn driver_name(&self) -> &'static str {
        self.driver.driver_name()
    }

    // --- Connection state ---

    /// Open a connection. Already-open connections are returned untouched.
    pub fn open<'a>(
        &self,
        connection: &'a mut Connection,
    ) -> Result<&'a mut Connection, AdapterError> {
        if connection.is_open() {
            self.logger.debug("using open connection");
            return Ok(connection);
        }

        let credentials = connection.credentials();
        if credentials.authentication == AuthenticationMode::MsiAd {
            let message = format!(
                "Service discovery in Azure is not supported at this time, authentication {} is not supported",
                AuthenticationMode::MsiAd
            );
            self.logger.critical(&message);
            return Err(AdapterError::UnsupportedAuthentication(message));
        }

        let connection_string = ConnectionString::from_credentials(credentials);
        self.logger.debug(&format!(
            "opening connection using string '{}'",
            connection_string.redacted()
        ));

        let result = self
            .runtime
            .block_on(self.driver.connect(&connection_string.expose()));

        match result {
            Ok(session) => {
                connection.mark_open(session);
                self.logger
                    .debug(&format!("connection '{}' opened", connection.name()));
                Ok(connection)
            }
            Err(e) => {
                connection.mark_failed();
                self.logger.critical(&e.to_string());
                Err(AdapterError::FailedToConnect(e.to_string()))
            }
        }
    }

    /// The driver reports no per-statement status; always "OK"
    pub fn get_status(&self, _cursor: &Cursor) -> &'static str {
        STATUS_OK
    }

    /// Statement cancellation is not supported by the warehouse; no-op
    pub fn cancel(&self, _connection: &Connection) {}

    // --- Pool ---

    /// Fetch the named connection, creating and opening it when needed
    pub fn get(&self, name: &str) -> Result<SharedConnection, AdapterError> {
        let connection = {
            let mut slots = self.lock_slots()?;
            let slot = slots.entry(name.to_string()).or_insert_with(|| {
                self.logger
                    .debug(&format!("Acquiring new {} connection \"{}\".", ADAPTER_TYPE, name));
                PoolSlot {
                    connection: Arc::new(Mutex::new(Connection::new(
                        name,
                        Arc::clone(&self.credentials),
                    ))),
                    in_use: false,
                }
            });
            Arc::clone(&slot.connection)
        };

        {
            let mut guard = lock_connection(&connection)?;
            self.open(&mut guard)?;
        }

        if let Some(slot) = self.lock_slots()?.get_mut(name) {
            slot.in_use = true;
        }
        Ok(connection)
    }

    /// Return a connection to the pool, rolling back any open transaction
    pub fn release(&self, name: &str) -> Result<(), AdapterError> {
        let connection = {
            let mut slots = self.lock_slots()?;
            let slot = slots
                .get_mut(name)
                .ok_or_else(|| AdapterError::ConnectionNotFound(name.to_string()))?;
            slot.in_use = false;
            Arc::clone(&slot.connection)
        };

        let mut guard = lock_connection(&connection)?;
        if !guard.transaction_open {
            return Ok(());
        }
        guard.transaction_open = false;

        let Some(session) = guard.handle_mut() else {
            return Ok(());
        };
        self.logger.debug(&format!("On {}: ROLLBACK TRANSACTION", name));
        self.runtime
            .block_on(session.execute("ROLLBACK TRANSACTION", &[]))
            .map(|_| ())
            .map_err(classify)
    }

    /// Close the driver session of the named connection
    pub fn close(&self, name: &str) -> Result<(), AdapterError> {
        let connection = {
            let mut slots = self.lock_slots()?;
            let slot = slots
                .get_mut(name)
                .ok_or_else(|| AdapterError::ConnectionNotFound(name.to_string()))?;
            slot.in_use = false;
            Arc::clone(&slot.connection)
        };

        let session = lock_connection(&connection)?.take_handle();
        if let Some(session) = session {
            if let Err(e) = self.runtime.block_on(session.close()) {
                self.logger
                    .debug(&format!("Error closing connection \"{}\": {}", name, e));
            }
        }
        Ok(())
    }

    /// Close every connection in the pool; returns the names closed
    pub fn cleanup_all(&self) -> Vec<String> {
        let mut names = self.connection_names();
        names.sort();
        for name in &names {
            if let Err(e) = self.close(name) {
                self.logger.debug(&format!("Unable to close \"{}\": {}", name, e));
            }
        }
        names
    }

    pub fn connection_names(&self) -> Vec<String> {
        self.slots
            .lock()
            .map(|slots| slots.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn in_use(&self, name: &str) -> bool {
        self.slots
            .lock()
            .map(|slots| slots.get(name).map(|s| s.in_use).unwrap_or(false))
            .unwrap_or(false)
    }

    // --- Transactions ---

    pub fn begin(&self, name: &str) -> Result<(), AdapterError> {
        let connection = self.get(name)?;
        if lock_connection(&connection)?.transaction_open {
            let message = format!(
                "Tried to begin a new transaction on connection \"{}\", but it already had one open!",
                name
            );
            self.logger.critical(&message);
            return Err(AdapterError::RuntimeExecution(message));
        }

        self.add_query("BEGIN TRANSACTION", Some(name), false, None, false)?;
        lock_connection(&connection)?.transaction_open = true;
        Ok(())
    }

    pub fn commit(&self, name: &str) -> Result<(), AdapterError> {
        let connection = self.get(name)?;
        if !lock_connection(&connection)?.transaction_open {
            let message = format!(
                "Tried to commit transaction on connection \"{}\", but it does not have one open!",
                name
            );
            self.logger.critical(&message);
            return Err(AdapterError::RuntimeExecution(message));
        }

        self.logger.debug(&format!("On {}: COMMIT", name));
        self.add_query("COMMIT TRANSACTION", Some(name), false, None, false)?;
        lock_connection(&connection)?.transaction_open = false;
        Ok(())
    }

    // --- Execution envelope ---

    /// Run `work` with the adapter's error policy: database errors become
    /// `DatabaseExecution`, everything else `RuntimeExecution`. Either way the
    /// named connection is released once and the original message is kept.
    pub fn exception_handler<T, F>(
        &self,
        sql: &str,
        connection_name: &str,
        work: F,
    ) -> Result<T, AdapterError>
    where
        F: FnOnce() -> Result<T, DriverError>,
    {
        match work() {
            Ok(value) => Ok(value),
            Err(e) if e.is_database_error() => {
                self.logger
                    .critical(&format!("{} error: {}", ADAPTER_TYPE, e));
                self.attempt_release(connection_name);
                Err(AdapterError::DatabaseExecution(e.to_string()))
            }
            Err(e) => {
                self.logger.critical(&format!("Error running SQL: {}", sql));
                self.logger.debug("Rolling back transaction");
                self.attempt_release(connection_name);
                Err(AdapterError::RuntimeExecution(e.to_string()))
            }
        }
    }

    fn attempt_release(&self, connection_name: &str) {
        if let Err(e) = self.release(connection_name) {
            self.logger
                .debug(&format!("Unable to release connection: {}", e));
        }
    }

    /// Execute one statement on the named connection and hand back the
    /// connection together with a cursor over its results
    pub fn add_query(
        &self,
        sql: &str,
        name: Option<&str>,
        auto_begin: bool,
        bindings: Option<&[BindValue]>,
        abridge_sql_log: bool,
    ) -> Result<(SharedConnection, Cursor), AdapterError> {
        let name = name.unwrap_or(DEFAULT_CONNECTION_NAME);
        let connection = self.get(name)?;

        if auto_begin && !lock_connection(&connection)?.transaction_open {
            self.begin(name)?;
        }

        self.logger
            .debug(&format!("Using {} connection \"{}\".", ADAPTER_TYPE, name));
        let logged_sql = if abridge_sql_log {
            abridge(sql, ABRIDGED_SQL_CHARS)
        } else {
            sql
        };
        self.logger.debug(&format!("On {}: {}", name, logged_sql));

        let bindings = bindings.unwrap_or(&[]);
        let cursor = self.exception_handler(sql, name, || {
            let mut guard = connection
                .lock()
                .map_err(|_| DriverError::Runtime(format!("connection \"{}\" is poisoned", name)))?;
            let session = guard.handle_mut().ok_or_else(|| {
                DriverError::Runtime(format!("connection \"{}\" is not open", name))
            })?;

            let started = Instant::now();
            let outcome = self.runtime.block_on(session.execute(sql, bindings))?;
            let elapsed = started.elapsed();

            let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
            let cursor = Cursor::new(sql, outcome, elapsed_ms);
            self.logger.debug(&format!(
                "SQL status: {} in {:.2} seconds",
                self.get_status(&cursor),
                elapsed.as_secs_f64()
            ));
            Ok(cursor)
        })?;

        Ok((connection, cursor))
    }

    /// `add_query` plus status, optionally fetching every row
    pub fn execute(
        &self,
        sql: &str,
        name: Option<&str>,
        auto_begin: bool,
        fetch: bool,
    ) -> Result<(String, Option<QueryResult>), AdapterError> {
        let (_connection, mut cursor) = self.add_query(sql, name, auto_begin, None, false)?;
        let status = self.get_status(&cursor).to_string();
        let table = fetch.then(|| QueryResult::from_cursor(&mut cursor));
        Ok((status, table))
    }

    fn lock_slots(&self) -> Result<MutexGuard<'_, HashMap<String, PoolSlot>>, AdapterError> {
        self.slots
            .lock()
            .map_err(|_| AdapterError::RuntimeExecution("connection pool is poisoned".to_string()))
    }
}

fn lock_connection(
    connection: &SharedConnection,
) -> Result<MutexGuard<'_, Connection>, AdapterError> {
    connection
        .lock()
        .map_err(|_| AdapterError::RuntimeExecution("connection is poisoned".to_string()))
}

fn classify(err: DriverError) -> AdapterError {
    if err.is_database_error() {
        AdapterError::DatabaseExecution(err.to_string())
    } else {
        AdapterError::RuntimeExecution(err.to_string())
    }
}

/// First `limit` characters of `sql`
fn abridge(sql: &str, limit: usize) -> &str {
    match sql.char_indices().nth(limit) {
        Some((idx, _)) => &sql[..idx],
        None => sql,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connection::ConnectionStatus;
    use crate::db::testing::{DriverScript, MockDriver};
    use crate::db::traits::{CellValue, ColumnInfo, QueryOutcome};
    use crate::logging::testing::{Level, RecordingLogger};
    use serde_json::json;

    fn credentials(authentication: &str) -> Credentials {
        Credentials::from_value(json!({
            "host": "h",
            "database": "db",
            "schema": "s",
            "authentication": authentication,
            "username": "u",
            "password": "hunter2",
            "port": 1433,
            "driver": "D",
        }))
        .unwrap()
    }

    fn manager(
        authentication: &str,
    ) -> (ConnectionManager, Arc<DriverScript>, Arc<RecordingLogger>) {
        let (driver, script) = MockDriver::new();
        let logger = Arc::new(RecordingLogger::default());
        let manager =
            ConnectionManager::new(credentials(authentication), driver, logger.clone()).unwrap();
        (manager, script, logger)
    }

    fn fresh_connection(manager: &ConnectionManager) -> Connection {
        Connection::new("model.x", Arc::new(manager.credentials().clone()))
    }

    #[test]
    fn test_open_connects_with_full_string() {
        let (manager, script, logger) = manager("Sql");
        let mut conn = fresh_connection(&manager);

        let opened = manager.open(&mut conn).unwrap();
        assert_eq!(opened.status(), ConnectionStatus::Open);
        assert!(opened.has_handle());

        assert_eq!(
            script.connection_strings.lock().unwrap().clone(),
            vec![
                "DRIVER={D};SERVER=h;DATABASE=db;PORT=1433;AUTHENTICATION=Sql;AUTOCOMMIT=TRUE;UID=u;PWD=hunter2;"
                    .to_string()
            ]
        );
        assert!(logger.contains("PWD=h*****2;"));
        assert!(!logger.contains("hunter2"));
    }

    #[test]
    fn test_open_is_idempotent() {
        let (manager, script, logger) = manager("Sql");
        let mut conn = fresh_connection(&manager);

        manager.open(&mut conn).unwrap();
        manager.open(&mut conn).unwrap();

        assert_eq!(script.connects(), 1);
        assert_eq!(conn.status(), ConnectionStatus::Open);
        assert!(logger.contains("using open connection"));
    }

    #[test]
    fn test_open_rejects_msi() {
        let (manager, script, logger) = manager("ActiveDirectoryMSI");
        let mut conn = fresh_connection(&manager);

        let err = manager.open(&mut conn).unwrap_err();
        assert!(matches!(err, AdapterError::UnsupportedAuthentication(_)));
        assert_eq!(script.connects(), 0);
        assert_eq!(conn.status(), ConnectionStatus::Closed);
        assert_eq!(logger.messages(Level::Critical).len(), 1);
    }

    #[test]
    fn test_open_failure_marks_connection_failed() {
        let (manager, script, logger) = manager("Sql");
        script.fail_connect(DriverError::Connect(
            "Login failed for user 'u'. (18456)".to_string(),
        ));
        let mut conn = fresh_connection(&manager);

        let err = manager.open(&mut conn).unwrap_err();
        match err {
            AdapterError::FailedToConnect(msg) => assert!(msg.contains("Login failed for user 'u'")),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(conn.status(), ConnectionStatus::Fail);
        assert!(!conn.has_handle());
        assert!(logger
            .messages(Level::Critical)
            .iter()
            .any(|m| m.contains("Login failed")));
    }

    #[test]
    fn test_failed_open_leaves_slot_free() {
        let (manager, script, _logger) = manager("Sql");
        script.fail_connect(DriverError::Connect("timeout".to_string()));

        let err = manager.get("m").unwrap_err();
        assert!(matches!(err, AdapterError::FailedToConnect(_)));
        assert!(!manager.in_use("m"));

        *script.connect_error.lock().unwrap() = None;
        manager.get("m").unwrap();
        assert!(manager.in_use("m"));
    }

    #[test]
    fn test_msi_get_leaves_slot_free() {
        let (manager, _script, _logger) = manager("ActiveDirectoryMSI");

        let err = manager.get("m").unwrap_err();
        assert!(matches!(err, AdapterError::UnsupportedAuthentication(_)));
        assert!(!manager.in_use("m"));
        assert_eq!(manager.connection_names(), vec!["m".to_string()]);
    }

    #[test]
    fn test_reopen_after_failure() {
        let (manager, script, _logger) = manager("Sql");
        script.fail_connect(DriverError::Connect("timeout".to_string()));
        let mut conn = fresh_connection(&manager);
        assert!(manager.open(&mut conn).is_err());

        *script.connect_error.lock().unwrap() = None;
        manager.open(&mut conn).unwrap();
        assert_eq!(conn.status(), ConnectionStatus::Open);
        assert_eq!(script.connects(), 2);
    }

    #[test]
    fn test_status_stub_and_cancel() {
        let (manager, script, _logger) = manager("Sql");
        let (_, cursor) = manager
            .add_query("select 1", None, false, None, false)
            .unwrap();
        assert_eq!(manager.get_status(&cursor), "OK");

        let conn = manager.get(DEFAULT_CONNECTION_NAME).unwrap();
        manager.cancel(&conn.lock().unwrap());
        assert_eq!(conn.lock().unwrap().status(), ConnectionStatus::Open);
        assert_eq!(script.count_executed("select 1"), 1);
    }

    #[test]
    fn test_add_query_defaults_to_master() {
        let (manager, script, logger) = manager("Sql");
        script.set_outcome(QueryOutcome {
            columns: vec![ColumnInfo {
                name: "n".to_string(),
                data_type: "int".to_string(),
                nullable: true,
            }],
            rows: vec![vec![CellValue::Int(1)]],
            rows_affected: None,
        });

        let (conn, mut cursor) = manager
            .add_query("select 1 as n", None, false, None, false)
            .unwrap();

        assert_eq!(conn.lock().unwrap().name(), "master");
        assert_eq!(cursor.fetchone(), Some(vec![CellValue::Int(1)]));
        assert!(logger.contains("Using azuredatawarehouse connection \"master\"."));
        assert!(logger.contains("SQL status: OK in"));
    }

    #[test]
    fn test_add_query_passes_bindings() {
        let (manager, script, _logger) = manager("Sql");
        let bindings = vec![BindValue::Int(7), BindValue::from("x")];

        manager
            .add_query(
                "select * from t where id = @P1 and k = @P2",
                Some("model.a"),
                false,
                Some(&bindings),
                false,
            )
            .unwrap();

        let executed = script.executed.lock().unwrap().clone();
        assert_eq!(executed.last().unwrap().1, bindings);
    }

    #[test]
    fn test_auto_begin_opens_transaction_once() {
        let (manager, script, _logger) = manager("Sql");

        manager
            .add_query("insert into t values (1)", Some("m"), true, None, false)
            .unwrap();
        let (conn, _) = manager
            .add_query("insert into t values (2)", Some("m"), true, None, false)
            .unwrap();

        assert!(conn.lock().unwrap().transaction_open);
        assert_eq!(script.count_executed("BEGIN TRANSACTION"), 1);
        assert_eq!(
            script.executed_sql(),
            vec![
                "BEGIN TRANSACTION".to_string(),
                "insert into t values (1)".to_string(),
                "insert into t values (2)".to_string(),
            ]
        );
    }

    #[test]
    fn test_abridged_sql_log() {
        let (manager, _script, logger) = manager("Sql");
        let long_sql = format!("select '{}'", "x".repeat(1000));

        manager
            .add_query(&long_sql, None, false, None, true)
            .unwrap();

        let logged = logger
            .messages(Level::Debug)
            .into_iter()
            .find(|m| m.starts_with("On master: select"))
            .unwrap();
        assert_eq!(logged.len(), "On master: ".len() + ABRIDGED_SQL_CHARS);
    }

    #[test]
    fn test_abridge_respects_char_boundaries() {
        assert_eq!(abridge("ééé", 2), "éé");
        assert_eq!(abridge("short", 512), "short");
    }

    #[test]
    fn test_database_error_releases_and_propagates() {
        let (manager, script, logger) = manager("Sql");
        script.fail_statement(
            "select * from missing",
            DriverError::Database {
                code: Some(208),
                message: "Invalid object name 'missing'.".to_string(),
            },
        );

        let err = manager
            .add_query("select * from missing", Some("m"), false, None, false)
            .unwrap_err();

        assert_eq!(
            err,
            AdapterError::DatabaseExecution("Invalid object name 'missing'.".to_string())
        );
        assert!(!manager.in_use("m"));
        assert!(logger
            .messages(Level::Critical)
            .contains(&"azuredatawarehouse error: Invalid object name 'missing'.".to_string()));
    }

    #[test]
    fn test_release_failure_does_not_mask_error() {
        let (manager, script, logger) = manager("Sql");
        script.fail_statement("insert into t values (1)", DriverError::database("deadlock"));
        script.fail_statement("ROLLBACK TRANSACTION", DriverError::database("no session"));

        let err = manager
            .add_query("insert into t values (1)", Some("m"), true, None, false)
            .unwrap_err();

        assert_eq!(err, AdapterError::DatabaseExecution("deadlock".to_string()));
        assert_eq!(script.count_executed("ROLLBACK TRANSACTION"), 1);
        assert!(logger
            .messages(Level::Debug)
            .iter()
            .any(|m| m.starts_with("Unable to release connection")));
    }

    #[test]
    fn test_runtime_error_path() {
        let (manager, script, logger) = manager("Sql");
        script.fail_statement(
            "select @P1",
            DriverError::Runtime("conversion failed for parameter 1".to_string()),
        );

        let err = manager
            .add_query("select @P1", Some("m"), true, Some(&[BindValue::Null]), false)
            .unwrap_err();

        assert_eq!(
            err,
            AdapterError::RuntimeExecution("conversion failed for parameter 1".to_string())
        );
        assert!(logger
            .messages(Level::Critical)
            .contains(&"Error running SQL: select @P1".to_string()));
        assert!(logger
            .messages(Level::Debug)
            .contains(&"Rolling back transaction".to_string()));
        // The release rolled back the transaction auto_begin opened
        assert_eq!(script.count_executed("ROLLBACK TRANSACTION"), 1);
        let conn = manager.get("m").unwrap();
        assert!(!conn.lock().unwrap().transaction_open);
    }

    #[test]
    fn test_exception_handler_unknown_connection() {
        let (manager, _script, logger) = manager("Sql");

        let result: Result<(), _> = manager.exception_handler("select 1", "nobody", || {
            Err(DriverError::database("server went away"))
        });

        assert_eq!(
            result.unwrap_err(),
            AdapterError::DatabaseExecution("server went away".to_string())
        );
        assert!(logger
            .messages(Level::Debug)
            .iter()
            .any(|m| m.contains("Connection not found: nobody")));
    }

    #[test]
    fn test_exception_handler_passthrough() {
        let (manager, _script, logger) = manager("Sql");
        let value = manager
            .exception_handler("select 1", "master", || Ok::<_, DriverError>(42))
            .unwrap();
        assert_eq!(value, 42);
        assert!(logger.messages(Level::Critical).is_empty());
    }

    #[test]
    fn test_add_query_connect_failure() {
        let (manager, script, _logger) = manager("Sql");
        script.fail_connect(DriverError::Connect("network unreachable".to_string()));

        let err = manager
            .add_query("select 1", None, false, None, false)
            .unwrap_err();
        assert!(matches!(err, AdapterError::FailedToConnect(ref m) if m.contains("unreachable")));
        assert!(script.executed_sql().is_empty());
    }

    #[test]
    fn test_begin_and_commit() {
        let (manager, script, _logger) = manager("Sql");

        manager.begin("m").unwrap();
        let err = manager.begin("m").unwrap_err();
        assert!(matches!(err, AdapterError::RuntimeExecution(_)));

        manager.commit("m").unwrap();
        let err = manager.commit("m").unwrap_err();
        assert!(matches!(err, AdapterError::RuntimeExecution(_)));

        assert_eq!(
            script.executed_sql(),
            vec!["BEGIN TRANSACTION".to_string(), "COMMIT TRANSACTION".to_string()]
        );
    }

    #[test]
    fn test_release_without_transaction() {
        let (manager, script, _logger) = manager("Sql");
        manager.get("m").unwrap();
        assert!(manager.in_use("m"));

        manager.release("m").unwrap();
        assert!(!manager.in_use("m"));
        assert!(script.executed_sql().is_empty());

        assert_eq!(
            manager.release("unknown").unwrap_err(),
            AdapterError::ConnectionNotFound("unknown".to_string())
        );
    }

    #[test]
    fn test_close_and_cleanup_all() {
        let (manager, script, _logger) = manager("Sql");
        manager.get("a").unwrap();
        let b = manager.get("b").unwrap();

        manager.close("b").unwrap();
        assert_eq!(b.lock().unwrap().status(), ConnectionStatus::Closed);

        let closed = manager.cleanup_all();
        assert_eq!(closed, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(script.close_calls.load(std::sync::atomic::Ordering::SeqCst), 2);

        // A closed connection reopens on demand
        manager.add_query("select 1", Some("b"), false, None, false).unwrap();
        assert_eq!(script.connects(), 3);
    }

    #[test]
    fn test_execute_fetch() {
        let (manager, script, _logger) = manager("Sql");
        script.set_outcome(QueryOutcome {
            columns: vec![ColumnInfo {
                name: "name".to_string(),
                data_type: "nvarchar".to_string(),
                nullable: true,
            }],
            rows: vec![
                vec![CellValue::String("a".to_string())],
                vec![CellValue::String("b".to_string())],
            ],
            rows_affected: None,
        });

        let (status, table) = manager
            .execute("select name from sys.schemas", None, false, true)
            .unwrap();
        assert_eq!(status, "OK");
        assert_eq!(table.unwrap().row_count, 2);

        let (_, table) = manager
            .execute("select name from sys.schemas", None, false, false)
            .unwrap();
        assert!(table.is_none());
    }
}
