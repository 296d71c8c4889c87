// Connection
// A named connection and its state machine: Closed -> Open | Failed

use crate::db::credentials::Credentials;
use crate::db::traits::DriverSession;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex};

/// Observable connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Closed,
    Open,
    Fail,
}

/// The driver session only exists inside `Open`, so a handle without an open
/// state (or the reverse) cannot be represented.
enum ConnectionState {
    Closed,
    Open(Box<dyn DriverSession>),
    Failed,
}

pub struct Connection {
    name: String,
    credentials: Arc<Credentials>,
    state: ConnectionState,
    pub transaction_open: bool,
}

/// Connection shared between the pool and callers of `add_query`
pub type SharedConnection = Arc<Mutex<Connection>>;

impl Connection {
    pub fn new(name: impl Into<String>, credentials: Arc<Credentials>) -> Self {
        Self {
            name: name.into(),
            credentials,
            state: ConnectionState::Closed,
            transaction_open: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn status(&self) -> ConnectionStatus {
        match self.state {
            ConnectionState::Closed => ConnectionStatus::Closed,
            ConnectionState::Open(_) => ConnectionStatus::Open,
            ConnectionState::Failed => ConnectionStatus::Fail,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, ConnectionState::Open(_))
    }

    pub fn has_handle(&self) -> bool {
        self.is_open()
    }

    pub(crate) fn handle_mut(&mut self) -> Option<&mut (dyn DriverSession + 'static)> {
        match &mut self.state {
            ConnectionState::Open(session) => Some(session.as_mut()),
            _ => None,
        }
    }

    pub(crate) fn mark_open(&mut self, session: Box<dyn DriverSession>) {
        self.state = ConnectionState::Open(session);
    }

    /// Drops any handle and marks the connection failed
    pub(crate) fn mark_failed(&mut self) {
        self.state = ConnectionState::Failed;
        self.transaction_open = false;
    }

    /// Moves the session out, leaving the connection closed
    pub(crate) fn take_handle(&mut self) -> Option<Box<dyn DriverSession>> {
        self.transaction_open = false;
        match std::mem::replace(&mut self.state, ConnectionState::Closed) {
            ConnectionState::Open(session) => Some(session),
            ConnectionState::Closed => None,
            ConnectionState::Failed => {
                // Keep the failure visible until the next open()
                self.state = ConnectionState::Failed;
                None
            }
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("name", &self.name)
            .field("status", &self.status())
            .field("transaction_open", &self.transaction_open)
            .field("credentials", &self.credentials)
            .finish()
    }
}
