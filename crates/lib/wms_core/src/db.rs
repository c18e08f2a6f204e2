//! Connection pool owned by the composition root.
//!
//! `ConnectionPool` caches one store handle. `acquire` reuses it while it
//! reports `Connected`; otherwise the stale handle is closed and a new
//! connection is opened, retried a bounded number of times. In development
//! mode an exhausted retry budget yields a degraded handle whose store answers
//! every query with an empty result.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use tokio::sync::Mutex;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::store::{ConnectionState, DocumentStore, NullStore, PgStore, StoreError, StoreResult};

/// Upper bound on waiting for a pooled connection.
pub const SERVER_SELECTION_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound on establishing the initial connection.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound on a single statement.
pub const SOCKET_TIMEOUT: Duration = Duration::from_secs(45);

/// Connect attempts before giving up.
pub const CONNECT_ATTEMPTS: u32 = 3;

/// Pause between connect attempts.
pub const CONNECT_BACKOFF: Duration = Duration::from_secs(1);

/// Where and how to connect.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub url: String,
    pub max_connections: u32,
    pub server_selection_timeout: Duration,
    pub connect_timeout: Duration,
    pub socket_timeout: Duration,
}

impl ConnectionSettings {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 5,
            server_selection_timeout: SERVER_SELECTION_TIMEOUT,
            connect_timeout: CONNECT_TIMEOUT,
            socket_timeout: SOCKET_TIMEOUT,
        }
    }
}

/// Opens store connections.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, settings: &ConnectionSettings) -> StoreResult<Arc<dyn DocumentStore>>;
}

/// Connects to PostgreSQL and runs the embedded migrations.
#[derive(Debug, Default, Clone, Copy)]
pub struct PgConnector;

#[async_trait]
impl Connector for PgConnector {
    async fn connect(&self, settings: &ConnectionSettings) -> StoreResult<Arc<dyn DocumentStore>> {
        let options: PgConnectOptions = settings
            .url
            .parse()
            .map_err(|e: sqlx::Error| StoreError::Connection(e.to_string()))?;
        let statement_timeout = settings.socket_timeout.as_millis().to_string();
        let options = options.options([("statement_timeout", statement_timeout.as_str())]);

        let pending = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(settings.server_selection_timeout)
            .connect_with(options);
        let pool = timeout(settings.connect_timeout, pending)
            .await
            .map_err(|_| {
                StoreError::Connection(format!(
                    "connect timed out after {:?}",
                    settings.connect_timeout
                ))
            })?
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StoreError::Connection(format!("migration failed: {e}")))?;

        Ok(Arc::new(PgStore::new(pool)))
    }
}

/// Hands out a store that already exists. Used for embedding and tests.
#[derive(Clone)]
pub struct StaticConnector {
    store: Arc<dyn DocumentStore>,
}

impl StaticConnector {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Connector for StaticConnector {
    async fn connect(&self, _settings: &ConnectionSettings) -> StoreResult<Arc<dyn DocumentStore>> {
        Ok(self.store.clone())
    }
}

/// A store handle as seen by request handlers.
#[derive(Clone)]
pub struct DbHandle {
    store: Arc<dyn DocumentStore>,
    degraded: bool,
}

impl DbHandle {
    fn connected(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            degraded: false,
        }
    }

    /// Handle backed by `NullStore`.
    pub fn degraded() -> Self {
        Self {
            store: Arc::new(NullStore),
            degraded: true,
        }
    }

    pub fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }

    /// True when no real database backs this handle.
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub fn state(&self) -> ConnectionState {
        self.store.state()
    }
}

impl std::fmt::Debug for DbHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbHandle")
            .field("state", &self.state())
            .field("degraded", &self.degraded)
            .finish()
    }
}

/// Shared connection cache.
pub struct ConnectionPool {
    connector: Arc<dyn Connector>,
    settings: ConnectionSettings,
    development: bool,
    backoff: Duration,
    cached: Mutex<Option<DbHandle>>,
}

impl ConnectionPool {
    pub fn new(connector: Arc<dyn Connector>, settings: ConnectionSettings, development: bool) -> Self {
        Self {
            connector,
            settings,
            development,
            backoff: CONNECT_BACKOFF,
            cached: Mutex::new(None),
        }
    }

    /// Pool over an existing store; never reconnects to anything else.
    pub fn from_store(store: Arc<dyn DocumentStore>, development: bool) -> Self {
        Self::new(
            Arc::new(StaticConnector::new(store)),
            ConnectionSettings::new("memory://"),
            development,
        )
    }

    /// Override the pause between connect attempts.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn is_development(&self) -> bool {
        self.development
    }

    /// Return a usable handle, reconnecting when the cached one is not ready.
    ///
    /// The cache lock is held across the reconnect so concurrent cold starts
    /// open a single connection.
    pub async fn acquire(&self) -> StoreResult<DbHandle> {
        let mut cached = self.cached.lock().await;

        if let Some(handle) = cached.as_ref() {
            let state = handle.state();
            if state == ConnectionState::Connected {
                return Ok(handle.clone());
            }
            debug!(?state, "closing stale connection");
            handle.store().close().await;
        }
        *cached = None;

        match self.connect_with_retry().await {
            Ok(handle) => {
                *cached = Some(handle.clone());
                Ok(handle)
            }
            Err(e) if self.development => {
                warn!(error = %e, "database unreachable, serving degraded handle");
                Ok(DbHandle::degraded())
            }
            Err(e) => Err(e),
        }
    }

    /// State of the cached handle, `Disconnected` when nothing is cached.
    pub async fn state(&self) -> ConnectionState {
        self.cached
            .lock()
            .await
            .as_ref()
            .map(DbHandle::state)
            .unwrap_or(ConnectionState::Disconnected)
    }

    /// Close and forget the cached handle.
    pub async fn close(&self) {
        if let Some(handle) = self.cached.lock().await.take() {
            handle.store().close().await;
        }
    }

    async fn connect_with_retry(&self) -> StoreResult<DbHandle> {
        let mut attempt = 1;
        loop {
            match self.connector.connect(&self.settings).await {
                Ok(store) => {
                    info!(attempt, "database connected");
                    return Ok(DbHandle::connected(store));
                }
                Err(e) if attempt < CONNECT_ATTEMPTS => {
                    warn!(attempt, error = %e, "database connect failed, retrying");
                    sleep(self.backoff).await;
                    attempt += 1;
                }
                Err(e) => {
                    warn!(attempt, error = %e, "database connect failed, giving up");
                    return Err(e);
                }
            }
        }
    }
}
