//! # pgtable Database Crate
//!
//! This crate owns every physical connection to PostgreSQL. It knows nothing
//! about records or SQL generation; it moves literal SQL text to the server and
//! brings decoded rows back.
//!
//! ## Architectural Principles
//!
//! - **Driver Behind a Trait:** `Connection` and `ConnectionSource` hide `sqlx`
//!   from the record layer, which only ever sees `core_types::Row`. Tests swap
//!   in scripted sources.
//! - **Bounded & Fair:** `Pool` caps the number of borrowed connections and
//!   serves waiters first-come-first-served.
//! - **Orderly Shutdown:** closing the pool fails waiters, closes idle
//!   connections at once and closes borrowed ones when they are returned.
//!
//! ## Public API
//!
//! - `connect`: builds a `Pool` over Postgres from `DatabaseConfig` and checks it can connect.
//! - `open`: opens one standalone connection.
//! - `Pool` / `PooledConnection`: acquire, release and shutdown.
//! - `Connection` / `ConnectionSource`: the driver seam.
//! - `DbError`: the error taxonomy shared with the record layer.

// Declare the modules that constitute this crate.
pub mod connection;
pub mod error;
pub mod pool;
pub mod source;

// Re-export the key components to create a clean, public-facing API.
pub use connection::{PgSource, connect, open};
pub use error::DbError;
pub use pool::{Pool, PooledConnection};
pub use source::{Connection, ConnectionSource};
