//! Remote session layer: connection factory, registry, executor and shells

pub mod client;
pub mod exec;
pub mod registry;
pub mod shell;

pub use client::{Connector, Credentials, SshConnector, SshOptions, Transport};
pub use exec::execute;
pub use registry::{Session, SessionRegistry};
pub use shell::{ShellEvent, ShellHandle, ShellInput, WindowSize};
