//! Session registry
//!
//! Owns every live remote connection, keyed by an opaque session key. Sessions
//! are created lazily and only ever removed by an explicit close, either by
//! exact key or by substring pattern.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use futures::future::join_all;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::errors::LaunchError;
use crate::session::client::{Connector, Credentials, Transport};
use crate::session::shell::{ShellEvent, ShellHandle, WindowSize};

/// One live connection held by the registry
pub struct Session {
    key: String,
    transport: Arc<dyn Transport>,
    shell: std::sync::Mutex<Option<ShellHandle>>,
    created_at: DateTime<Utc>,
    last_used_ms: AtomicI64,
}

impl Session {
    fn new(key: String, transport: Arc<dyn Transport>) -> Self {
        let now = Utc::now();
        Self {
            key,
            transport,
            shell: std::sync::Mutex::new(None),
            created_at: now,
            last_used_ms: AtomicI64::new(now.timestamp_millis()),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_used(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.last_used_ms.load(Ordering::SeqCst))
            .single()
            .unwrap_or(self.created_at)
    }

    /// Record activity on this session
    pub fn touch(&self) {
        self.last_used_ms
            .store(Utc::now().timestamp_millis(), Ordering::SeqCst);
    }

    /// Current interactive shell, if one is open
    pub fn shell(&self) -> Option<ShellHandle> {
        let shell = self.shell.lock().unwrap_or_else(|e| e.into_inner());
        shell.as_ref().filter(|s| !s.is_closed()).cloned()
    }

    fn set_shell(&self, handle: ShellHandle) {
        let mut shell = self.shell.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = shell.replace(handle) {
            previous.close();
        }
    }

    fn take_shell(&self) -> Option<ShellHandle> {
        let mut shell = self.shell.lock().unwrap_or_else(|e| e.into_inner());
        shell.take()
    }

    async fn shutdown(&self) {
        if let Some(shell) = self.take_shell() {
            shell.close();
        }
        if let Err(e) = self.transport.close().await {
            warn!("Error while closing session {}: {}", self.key, e);
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("key", &self.key)
            .field("created_at", &self.created_at)
            .field("last_used", &self.last_used())
            .field("has_shell", &self.shell().is_some())
            .finish_non_exhaustive()
    }
}

/// Registry of live sessions
pub struct SessionRegistry {
    connector: Arc<dyn Connector>,
    sessions: Mutex<HashMap<String, Arc<Session>>>,
}

impl SessionRegistry {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Look up a session without creating one
    pub async fn get(&self, key: &str) -> Option<Arc<Session>> {
        self.sessions.lock().await.get(key).cloned()
    }

    /// Return the session for `key`, authenticating a new one if needed.
    ///
    /// Connection failures are returned as-is; retrying is up to the caller.
    pub async fn get_or_create(
        &self,
        key: &str,
        credentials: &Credentials,
    ) -> Result<Arc<Session>, LaunchError> {
        if let Some(session) = self.get(key).await {
            session.touch();
            return Ok(session);
        }

        // Connect outside the lock so one slow host does not stall other keys.
        let transport = self.connector.connect(credentials).await?;
        let created = Arc::new(Session::new(key.to_string(), transport));

        let mut sessions = self.sessions.lock().await;
        if let Some(existing) = sessions.get(key).cloned() {
            drop(sessions);
            debug!("Session {} was created concurrently, dropping duplicate", key);
            created.shutdown().await;
            existing.touch();
            return Ok(existing);
        }
        sessions.insert(key.to_string(), created.clone());
        info!("Opened session {}", key);
        Ok(created)
    }

    /// Close the session stored under exactly `key`
    pub async fn close(&self, key: &str) -> bool {
        let removed = self.sessions.lock().await.remove(key);
        match removed {
            Some(session) => {
                session.shutdown().await;
                info!("Closed session {}", key);
                true
            }
            None => false,
        }
    }

    /// Close every session whose key contains `pattern`; returns the count
    pub async fn close_matching(&self, pattern: &str) -> usize {
        let removed: Vec<Arc<Session>> = {
            let mut sessions = self.sessions.lock().await;
            let keys: Vec<String> = sessions
                .keys()
                .filter(|k| k.contains(pattern))
                .cloned()
                .collect();
            keys.iter().filter_map(|k| sessions.remove(k)).collect()
        };

        let count = removed.len();
        join_all(removed.iter().map(|s| s.shutdown())).await;
        if count > 0 {
            info!("Closed {} session(s) matching '{}'", count, pattern);
        }
        count
    }

    /// Close everything, used on shutdown
    pub async fn close_all(&self) -> usize {
        let removed: Vec<Arc<Session>> = {
            let mut sessions = self.sessions.lock().await;
            sessions.drain().map(|(_, s)| s).collect()
        };
        let count = removed.len();
        join_all(removed.iter().map(|s| s.shutdown())).await;
        count
    }

    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.sessions.lock().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Open (or replace) the interactive shell of the session under `key`
    pub async fn open_shell(
        &self,
        key: &str,
        credentials: &Credentials,
        size: WindowSize,
        events: mpsc::UnboundedSender<ShellEvent>,
    ) -> Result<(), LaunchError> {
        let session = self.get_or_create(key, credentials).await?;
        let handle = session.transport().open_shell(size, events).await?;
        session.set_shell(handle);
        info!("Opened interactive shell on {}", key);
        Ok(())
    }

    /// Forward keystrokes to the shell under `key`
    pub async fn write_shell(&self, key: &str, data: &[u8]) -> Result<(), LaunchError> {
        let shell = self.require_shell(key).await?;
        shell.write(data)
    }

    /// Resize the shell window under `key`
    pub async fn resize_shell(&self, key: &str, size: WindowSize) -> Result<(), LaunchError> {
        let shell = self.require_shell(key).await?;
        shell.resize(size)
    }

    /// Close only the interactive shell, keeping the connection
    pub async fn close_shell(&self, key: &str) -> Result<(), LaunchError> {
        let session = self
            .get(key)
            .await
            .ok_or_else(|| LaunchError::SessionNotFound(key.to_string()))?;
        if let Some(shell) = session.take_shell() {
            shell.close();
        }
        Ok(())
    }

    async fn require_shell(&self, key: &str) -> Result<ShellHandle, LaunchError> {
        let session = self
            .get(key)
            .await
            .ok_or_else(|| LaunchError::SessionNotFound(key.to_string()))?;
        session.touch();
        session
            .shell()
            .ok_or_else(|| LaunchError::SessionNotFound(format!("{} has no open shell", key)))
    }
}
