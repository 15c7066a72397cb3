//! Launchpad
//!
//! Agentless deployment of web applications to Debian/Ubuntu hosts over SSH.

pub mod app;
pub mod deploy;
pub mod errors;
pub mod filesys;
pub mod http;
pub mod logs;
pub mod models;
pub mod server;
pub mod session;
pub mod storage;
pub mod utils;
