pub mod config;
pub mod error;
pub mod form;
pub mod job;
pub mod output;
pub mod relay;
pub mod schema;
pub mod server;
pub mod session;

pub use error::{Error, Result};
