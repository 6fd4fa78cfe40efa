//! db-parity - run the same SQL against two data sources and report where
//! their observable behavior diverges.
//!
//! This library exposes the core modules for use by the binary and by
//! integration tests.

pub mod cli;
pub mod compare;
pub mod config;
pub mod connection;
pub mod db;
pub mod error;
pub mod logging;
pub mod report;
pub mod statements;
pub mod warehouse;
