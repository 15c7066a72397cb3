//! Outbound HTTP clients

pub mod client;
pub mod github;

pub use github::{GitHubApi, GitHubClient};
