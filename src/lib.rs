pub mod record;
pub mod source;
pub mod delivery;
pub mod publisher;

#[cfg(feature = "http")]
pub mod http;

pub mod config;
pub mod endpoint;
pub mod env;
pub mod init;
pub mod spool;
