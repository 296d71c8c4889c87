// Cursor
// Result handle returned by each statement execution

use crate::db::traits::{CellValue, ColumnInfo, QueryOutcome};
use serde::{Deserialize, Serialize};

/// Literal status reported for every statement. The driver exposes nothing
/// more granular, so this value says nothing about success or failure.
pub const STATUS_OK: &str = "OK";

/// Cursor-like handle over the rows of one executed statement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cursor {
    pub query_id: String,
    pub sql: String,
    columns: Vec<ColumnInfo>,
    rows: Vec<Vec<CellValue>>,
    rows_affected: Option<u64>,
    position: usize,
    pub execution_time_ms: u64,
}

impl Cursor {
    pub fn new(sql: &str, outcome: QueryOutcome, execution_time_ms: u64) -> Self {
        Self {
            query_id: uuid::Uuid::new_v4().to_string(),
            sql: sql.to_string(),
            columns: outcome.columns,
            rows: outcome.rows,
            rows_affected: outcome.rows_affected,
            position: 0,
            execution_time_ms,
        }
    }

    /// Column metadata, empty for statements that return no result set
    pub fn description(&self) -> &[ColumnInfo] {
        &self.columns
    }

    /// Rows affected when the driver reports it, otherwise the number of
    /// rows fetched. `-1` when neither is known.
    pub fn rowcount(&self) -> i64 {
        match self.rows_affected {
            Some(n) => n as i64,
            None if !self.columns.is_empty() => self.rows.len() as i64,
            None => -1,
        }
    }

    pub fn fetchone(&mut self) -> Option<Vec<CellValue>> {
        let row = self.rows.get(self.position).cloned();
        if row.is_some() {
            self.position += 1;
        }
        row
    }

    pub fn fetchmany(&mut self, size: usize) -> Vec<Vec<CellValue>> {
        let end = self.position.saturating_add(size).min(self.rows.len());
        let batch = self.rows[self.position..end].to_vec();
        self.position = end;
        batch
    }

    /// Remaining rows
    pub fn fetchall(&mut self) -> Vec<Vec<CellValue>> {
        let rest = self.rows[self.position..].to_vec();
        self.position = self.rows.len();
        rest
    }
}

/// Rows fetched by `execute`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<ColumnInfo>,
    pub rows: Vec<Vec<CellValue>>,
    pub row_count: usize,
}

impl QueryResult {
    pub fn from_cursor(cursor: &mut Cursor) -> Self {
        let columns = cursor.description().to_vec();
        let rows = cursor.fetchall();
        Self {
            row_count: rows.len(),
            columns,
            rows,
        }
    }
}
