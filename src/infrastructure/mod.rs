//! Infrastructure concerns: configuration and logging.

pub mod config;
