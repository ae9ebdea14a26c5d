#[macro_use]
extern crate prometheus;

pub mod cmd;
pub mod config;
pub mod connection;
pub mod db;
pub mod error;
pub mod metrics;
pub mod parser;
pub mod server;
mod shutdown;

pub use connection::Connection;
pub use db::Db;
pub use error::{CacheError, Result};
