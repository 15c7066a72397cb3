//! SSH connection factory
//!
//! Authenticates with username/password and exposes the connection through
//! the [`Transport`] trait so the registry never depends on russh directly.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use russh::client::{self, Handle};
use russh::{ChannelMsg, Disconnect};
use russh_keys::key;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::errors::LaunchError;
use crate::session::shell::{ShellEvent, ShellHandle, ShellInput, WindowSize};

/// Login details for a target host
#[derive(Debug, Clone)]
pub struct Credentials {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
}

impl Credentials {
    /// Session key used by interactive terminals
    pub fn terminal_key(&self) -> String {
        format!("{}@{}", self.username, self.host)
    }
}

/// An authenticated connection able to run commands and open shells
#[async_trait]
pub trait Transport: Send + Sync {
    /// Run one command on a fresh exec channel and return stdout and stderr
    /// concatenated, once the remote side closes the channel.
    async fn exec(&self, command: &str) -> Result<String, LaunchError>;

    /// Open a PTY-backed login shell; output is pushed into `events`
    async fn open_shell(
        &self,
        size: WindowSize,
        events: mpsc::UnboundedSender<ShellEvent>,
    ) -> Result<ShellHandle, LaunchError>;

    /// Disconnect the underlying transport
    async fn close(&self) -> Result<(), LaunchError>;
}

/// Creates authenticated transports
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, credentials: &Credentials) -> Result<Arc<dyn Transport>, LaunchError>;
}

/// SSH connection options
#[derive(Debug, Clone)]
pub struct SshOptions {
    /// Timeout for TCP connect plus key exchange
    pub connect_timeout: Duration,

    /// Keepalive interval, `None` disables keepalives
    pub keepalive_interval: Option<Duration>,
}

impl Default for SshOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            keepalive_interval: Some(Duration::from_secs(30)),
        }
    }
}

struct ClientHandler;

#[async_trait]
impl client::Handler for ClientHandler {
    type Error = russh::Error;

    // Targets are fresh VPS hosts with no pinned key material.
    async fn check_server_key(
        &mut self,
        _server_public_key: &key::PublicKey,
    ) -> Result<bool, Self::Error> {
        Ok(true)
    }
}

/// russh-backed [`Connector`]
pub struct SshConnector {
    options: SshOptions,
    config: Arc<client::Config>,
}

impl SshConnector {
    pub fn new(options: SshOptions) -> Self {
        let config = client::Config {
            keepalive_interval: options.keepalive_interval,
            ..Default::default()
        };
        Self {
            options,
            config: Arc::new(config),
        }
    }
}

impl Default for SshConnector {
    fn default() -> Self {
        Self::new(SshOptions::default())
    }
}

#[async_trait]
impl Connector for SshConnector {
    async fn connect(&self, credentials: &Credentials) -> Result<Arc<dyn Transport>, LaunchError> {
        let address = (credentials.host.as_str(), credentials.port);
        info!(
            "Connecting to {}@{}:{}",
            credentials.username, credentials.host, credentials.port
        );

        let mut handle = tokio::time::timeout(
            self.options.connect_timeout,
            client::connect(self.config.clone(), address, ClientHandler),
        )
        .await
        .map_err(|_| {
            LaunchError::ConnectionError(format!(
                "Timed out connecting to {}:{}",
                credentials.host, credentials.port
            ))
        })??;

        let authenticated = handle
            .authenticate_password(
                credentials.username.as_str(),
                credentials.password.expose_secret(),
            )
            .await?;

        if !authenticated {
            return Err(LaunchError::ConnectionError(format!(
                "Authentication failed for {}@{}",
                credentials.username, credentials.host
            )));
        }

        debug!("Authenticated as {}@{}", credentials.username, credentials.host);
        Ok(Arc::new(SshTransport {
            handle,
            label: format!("{}@{}", credentials.username, credentials.host),
        }))
    }
}

/// Output of one exec channel.
///
/// A channel that ends without an exit status, EOF or close was cut off,
/// usually because the session was disconnected mid-command.
#[derive(Debug, Default)]
struct ExecOutput {
    bytes: Vec<u8>,
    finished: bool,
}

impl ExecOutput {
    fn push(&mut self, data: &[u8]) {
        self.bytes.extend_from_slice(data);
    }

    fn finish(&mut self) {
        self.finished = true;
    }

    fn into_result(self) -> Result<String, LaunchError> {
        if !self.finished {
            return Err(LaunchError::ConnectionError(
                "channel closed before command finished".to_string(),
            ));
        }
        Ok(String::from_utf8_lossy(&self.bytes).into_owned())
    }
}

/// A live russh client connection
pub struct SshTransport {
    handle: Handle<ClientHandler>,
    label: String,
}

#[async_trait]
impl Transport for SshTransport {
    async fn exec(&self, command: &str) -> Result<String, LaunchError> {
        let mut channel = self.handle.channel_open_session().await?;
        channel.exec(true, command).await?;

        let mut output = ExecOutput::default();
        while let Some(msg) = channel.wait().await {
            match msg {
                ChannelMsg::Data { ref data } => output.push(data),
                ChannelMsg::ExtendedData { ref data, .. } => output.push(data),
                ChannelMsg::ExitStatus { exit_status } => {
                    debug!("[{}] command exited with {}", self.label, exit_status);
                    output.finish();
                }
                ChannelMsg::Eof | ChannelMsg::Close => output.finish(),
                _ => {}
            }
        }

        output.into_result()
    }

    async fn open_shell(
        &self,
        size: WindowSize,
        events: mpsc::UnboundedSender<ShellEvent>,
    ) -> Result<ShellHandle, LaunchError> {
        let mut channel = self.handle.channel_open_session().await?;
        channel
            .request_pty(
                false,
                "xterm-256color",
                size.cols as u32,
                size.rows as u32,
                0,
                0,
                &[],
            )
            .await?;
        channel.request_shell(false).await?;

        let (tx, mut rx) = mpsc::unbounded_channel::<ShellInput>();
        let label = self.label.clone();

        tokio::spawn(async move {
            info!("Shell loop started for {}", label);
            loop {
                tokio::select! {
                    input = rx.recv() => match input {
                        Some(ShellInput::Data(bytes)) => {
                            if let Err(e) = channel.data(&bytes[..]).await {
                                warn!("Shell write failed for {}: {}", label, e);
                                break;
                            }
                        }
                        Some(ShellInput::Resize(size)) => {
                            if let Err(e) = channel
                                .window_change(size.cols as u32, size.rows as u32, 0, 0)
                                .await
                            {
                                warn!("Shell resize failed for {}: {}", label, e);
                            }
                        }
                        Some(ShellInput::Close) | None => {
                            let _ = channel.eof().await;
                            break;
                        }
                    },
                    msg = channel.wait() => match msg {
                        Some(ChannelMsg::Data { data }) => {
                            if events.send(ShellEvent::Output(data.to_vec())).is_err() {
                                break;
                            }
                        }
                        Some(ChannelMsg::ExtendedData { data, .. }) => {
                            if events.send(ShellEvent::Output(data.to_vec())).is_err() {
                                break;
                            }
                        }
                        Some(ChannelMsg::Close) | None => break,
                        _ => {}
                    },
                }
            }
            let _ = events.send(ShellEvent::Closed);
            info!("Shell loop ended for {}", label);
        });

        Ok(ShellHandle::new(tx))
    }

    async fn close(&self) -> Result<(), LaunchError> {
        self.handle
            .disconnect(Disconnect::ByApplication, "session closed", "en")
            .await?;
        Ok(())
    }
}
