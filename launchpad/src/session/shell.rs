//! Interactive PTY shell handles
//!
//! The transport owns the remote channel inside a forwarding task; callers
//! hold a [`ShellHandle`] that feeds keystrokes and window changes into it.

use tokio::sync::mpsc;

use crate::errors::LaunchError;

/// Terminal window size in character cells
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSize {
    pub cols: u16,
    pub rows: u16,
}

impl Default for WindowSize {
    fn default() -> Self {
        Self { cols: 80, rows: 24 }
    }
}

/// Input sent to the shell's forwarding task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellInput {
    Data(Vec<u8>),
    Resize(WindowSize),
    Close,
}

/// Output produced by a shell
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellEvent {
    Output(Vec<u8>),
    Closed,
}

/// Write side of an open interactive shell
#[derive(Debug, Clone)]
pub struct ShellHandle {
    tx: mpsc::UnboundedSender<ShellInput>,
}

impl ShellHandle {
    pub fn new(tx: mpsc::UnboundedSender<ShellInput>) -> Self {
        Self { tx }
    }

    /// Write raw bytes (keystrokes) into the shell
    pub fn write(&self, data: &[u8]) -> Result<(), LaunchError> {
        self.send(ShellInput::Data(data.to_vec()))
    }

    /// Resize the remote pseudo-terminal
    pub fn resize(&self, size: WindowSize) -> Result<(), LaunchError> {
        self.send(ShellInput::Resize(size))
    }

    /// Ask the forwarding task to close the channel
    pub fn close(&self) {
        let _ = self.tx.send(ShellInput::Close);
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    fn send(&self, input: ShellInput) -> Result<(), LaunchError> {
        self.tx
            .send(input)
            .map_err(|_| LaunchError::ConnectionError("Shell channel is closed".to_string()))
    }
}
