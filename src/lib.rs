pub mod config;
pub mod error;
pub mod fakes;
pub mod github;
pub mod http;
pub mod server;
pub mod webhook;

pub type Result<T, E = error::Error> = std::result::Result<T, E>;
