//! Durable storage for cycle history.

pub mod postgres;

pub use postgres::PostgresRunHistory;
