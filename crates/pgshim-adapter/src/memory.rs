//! Scripted in-memory client.
//!
//! Statements are matched against registered SQL prefixes in registration
//! order; unmatched statements succeed with no rows. Every execution is
//! recorded so tests can assert on what the adapter sent.

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use pgshim_errors::RawBackendError;

use crate::{Error, Result};
use crate::client::{ClientConnector, ClientError, QueryOutput, ReservedClient, SqlClient, SqlExecutor};
use crate::config::ConnectionConfig;
use crate::value::{DbValue, Row};

/// One statement seen by a [`MemoryClient`].
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutedStatement {
    pub sql: String,
    pub args: Vec<DbValue>,
    /// Reservation id, or `None` when run on the shared client.
    pub reservation: Option<usize>,
}

#[derive(Debug, Clone)]
enum Response {
    Output(QueryOutput),
    Backend(RawBackendError),
    Fault(String),
}

#[derive(Debug)]
struct Script {
    prefix: String,
    response: Response,
}

#[derive(Debug, Default)]
struct MemoryState {
    scripts: Mutex<Vec<Script>>,
    log: Mutex<Vec<ExecutedStatement>>,
    closed: AtomicBool,
    reservations: AtomicUsize,
    releases: AtomicUsize,
}

impl MemoryState {
    fn run(&self, sql: &str, args: &[DbValue], reservation: Option<usize>) -> std::result::Result<QueryOutput, ClientError> {
        lock(&self.log).push(ExecutedStatement {
            sql: sql.to_string(),
            args: args.to_vec(),
            reservation,
        });

        let response = lock(&self.scripts)
            .iter()
            .find(|script| sql.trim_start().starts_with(&script.prefix))
            .map(|script| script.response.clone());

        match response {
            None => Ok(QueryOutput::default()),
            Some(Response::Output(output)) => Ok(output),
            Some(Response::Backend(raw)) => Err(ClientError::Database(raw)),
            Some(Response::Fault(message)) => {
                Err(ClientError::Io(io::Error::new(io::ErrorKind::TimedOut, message)))
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Client that answers from scripted responses.
#[derive(Debug, Clone, Default)]
pub struct MemoryClient {
    state: Arc<MemoryState>,
}

impl MemoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self, prefix: impl Into<String>, response: Response) {
        lock(&self.state.scripts).push(Script {
            prefix: prefix.into(),
            response,
        });
    }

    /// Answer statements starting with `prefix` with `rows`.
    pub fn respond_with_rows(&self, prefix: impl Into<String>, rows: Vec<Row>) -> &Self {
        self.script(prefix, Response::Output(QueryOutput::rows(rows)));
        self
    }

    /// Answer statements starting with `prefix` with an affected-row count.
    pub fn respond_with_affected(&self, prefix: impl Into<String>, rows_affected: u64) -> &Self {
        self.script(prefix, Response::Output(QueryOutput::affected(rows_affected)));
        self
    }

    /// Fail statements starting with `prefix` with a backend error.
    pub fn fail_with(&self, prefix: impl Into<String>, error: RawBackendError) -> &Self {
        self.script(prefix, Response::Backend(error));
        self
    }

    /// Fail statements starting with `prefix` with a non-backend I/O fault.
    pub fn fail_with_fault(&self, prefix: impl Into<String>, message: impl Into<String>) -> &Self {
        self.script(prefix, Response::Fault(message.into()));
        self
    }

    pub fn executed(&self) -> Vec<ExecutedStatement> {
        lock(&self.state.log).clone()
    }

    /// SQL text of every executed statement, in order.
    pub fn statements(&self) -> Vec<String> {
        lock(&self.state.log)
            .iter()
            .map(|statement| statement.sql.clone())
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        self.state.closed.load(Ordering::SeqCst)
    }

    pub fn reservations(&self) -> usize {
        self.state.reservations.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.state.releases.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SqlExecutor for MemoryClient {
    async fn execute(&self, sql: &str, args: &[DbValue]) -> std::result::Result<QueryOutput, ClientError> {
        if self.is_closed() {
            return Err(ClientError::Closed);
        }
        self.state.run(sql, args, None)
    }
}

#[async_trait]
impl SqlClient for MemoryClient {
    type Reserved = MemoryReserved;

    async fn reserve(&self) -> std::result::Result<MemoryReserved, ClientError> {
        if self.is_closed() {
            return Err(ClientError::Closed);
        }
        let id = self.state.reservations.fetch_add(1, Ordering::SeqCst);
        Ok(MemoryReserved {
            id,
            state: self.state.clone(),
            released: AtomicBool::new(false),
        })
    }

    async fn close(&self) {
        self.state.closed.store(true, Ordering::SeqCst);
    }
}

/// Reservation handed out by [`MemoryClient::reserve`].
#[derive(Debug)]
pub struct MemoryReserved {
    id: usize,
    state: Arc<MemoryState>,
    released: AtomicBool,
}

impl MemoryReserved {
    pub fn id(&self) -> usize {
        self.id
    }
}

#[async_trait]
impl SqlExecutor for MemoryReserved {
    async fn execute(&self, sql: &str, args: &[DbValue]) -> std::result::Result<QueryOutput, ClientError> {
        if self.released.load(Ordering::SeqCst) {
            return Err(ClientError::Released);
        }
        self.state.run(sql, args, Some(self.id))
    }
}

#[async_trait]
impl ReservedClient for MemoryReserved {
    async fn release(&self) {
        if !self.released.swap(true, Ordering::SeqCst) {
            self.state.releases.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[derive(Debug, Clone)]
enum Queued {
    Client(MemoryClient),
    Refuse(RawBackendError),
}

/// Connector handing out [`MemoryClient`]s.
///
/// Clients and refusals queued with [`MemoryConnector::with_client`] and
/// [`MemoryConnector::with_refusal`] are used first, in order; afterwards each
/// connect creates a fresh client.
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    queued: Arc<Mutex<VecDeque<Queued>>>,
    connected: Arc<Mutex<Vec<(ConnectionConfig, MemoryClient)>>>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(self, client: MemoryClient) -> Self {
        lock(&self.queued).push_back(Queued::Client(client));
        self
    }

    /// Fail the matching connect with a backend error.
    pub fn with_refusal(self, error: RawBackendError) -> Self {
        lock(&self.queued).push_back(Queued::Refuse(error));
        self
    }

    /// Every client created so far with the config it was created from.
    pub fn connected(&self) -> Vec<(ConnectionConfig, MemoryClient)> {
        lock(&self.connected).clone()
    }
}

#[async_trait]
impl ClientConnector for MemoryConnector {
    type Client = MemoryClient;

    async fn connect(&self, config: &ConnectionConfig) -> Result<MemoryClient> {
        config.validate()?;
        let queued = lock(&self.queued).pop_front();
        let client = match queued {
            Some(Queued::Client(client)) => client,
            Some(Queued::Refuse(raw)) => {
                return Err(Error::from_client("connect", ClientError::Database(raw)));
            }
            None => MemoryClient::default(),
        };
        lock(&self.connected).push((config.clone(), client.clone()));
        Ok(client)
    }
}
