//! Connection provider.
//!
//! Hands out one shared handle per connection string for the lifetime of a
//! comparison run.

pub mod provider;

pub use provider::ConnectionProvider;
