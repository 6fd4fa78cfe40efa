//! Integration tests for db-parity.

pub mod compare_test;
pub mod connection_test;
pub mod postgres_test;
