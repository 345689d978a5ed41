//! MySQL/MariaDB implementation of the relational store.

pub mod config;
pub mod decode;
pub mod store;

pub use store::MySqlStore;
