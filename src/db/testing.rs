// Scripted driver used by the manager and adapter tests

use crate::db::traits::{BindValue, DatabaseDriver, DriverError, DriverSession, QueryOutcome};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
pub struct DriverScript {
    pub connect_calls: AtomicUsize,
    pub close_calls: AtomicUsize,
    pub connect_error: Mutex<Option<DriverError>>,
    pub connection_strings: Mutex<Vec<String>>,
    pub executed: Mutex<Vec<(String, Vec<BindValue>)>>,
    pub statement_errors: Mutex<HashMap<String, DriverError>>,
    pub outcome: Mutex<QueryOutcome>,
}

impl DriverScript {
    pub fn fail_connect(&self, error: DriverError) {
        *self.connect_error.lock().unwrap() = Some(error);
    }

    pub fn fail_statement(&self, sql: &str, error: DriverError) {
        self.statement_errors
            .lock()
            .unwrap()
            .insert(sql.to_string(), error);
    }

    pub fn set_outcome(&self, outcome: QueryOutcome) {
        *self.outcome.lock().unwrap() = outcome;
    }

    pub fn connects(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }

    pub fn executed_sql(&self) -> Vec<String> {
        self.executed
            .lock()
            .unwrap()
            .iter()
            .map(|(sql, _)| sql.clone())
            .collect()
    }

    pub fn count_executed(&self, sql: &str) -> usize {
        self.executed_sql().iter().filter(|s| *s == sql).count()
    }
}

pub struct MockDriver {
    pub script: Arc<DriverScript>,
}

impl MockDriver {
    pub fn new() -> (Arc<Self>, Arc<DriverScript>) {
        let script = Arc::new(DriverScript::default());
        (
            Arc::new(Self {
                script: Arc::clone(&script),
            }),
            script,
        )
    }
}

struct MockSession {
    script: Arc<DriverScript>,
}

#[async_trait::async_trait]
impl DriverSession for MockSession {
    async fn execute(
        &mut self,
        sql: &str,
        bindings: &[BindValue],
    ) -> Result<QueryOutcome, DriverError> {
        self.script
            .executed
            .lock()
            .unwrap()
            .push((sql.to_string(), bindings.to_vec()));
        if let Some(err) = self.script.statement_errors.lock().unwrap().get(sql) {
            return Err(err.clone());
        }
        Ok(self.script.outcome.lock().unwrap().clone())
    }

    async fn close(self: Box<Self>) -> Result<(), DriverError> {
        self.script.close_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait::async_trait]
impl DatabaseDriver for MockDriver {
    fn driver_name(&self) -> &'static str {
        "mock"
    }

    async fn connect(&self, connection_string: &str) -> Result<Box<dyn DriverSession>, DriverError> {
        self.script.connect_calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .connection_strings
            .lock()
            .unwrap()
            .push(connection_string.to_string());
        if let Some(err) = self.script.connect_error.lock().unwrap().clone() {
            return Err(err);
        }
        Ok(Box::new(MockSession {
            script: Arc::clone(&self.script),
        }))
    }
}
