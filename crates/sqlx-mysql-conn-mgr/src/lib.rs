//! # sqlx-mysql-conn-mgr
//!
//! A small wrapper around SQLx that turns validated connection settings into a
//! tuned MySQL connection pool.
//!
//! ## Core Types
//!
//! - **[`ConnectionBuilder`]**: Fluent settings accumulator; `build()` validates and opens a [`Client`]
//! - **[`ConnectionConfig`]**: Serde-friendly settings with defaults for everything but credentials
//! - **[`Client`]**: Cloneable handle over the opened pool
//! - **[`TlsRegistry`]**: Named trust profiles referenced by locators (`tls=custom`)
//! - **[`DriverRegistry`]**: Drivers addressable by name; `mysql` is built in
//! - **[`Error`]**: Error type for build and client operations
//!
//! ## Build sequence
//!
//! 1. Host, database name, username and password must be non-empty, checked in that order
//! 2. A CA file, when set, is registered as the `custom` trust profile (TLS 1.3 minimum)
//! 3. The locator `{user}:{pass}@tcp({host})/{db}?parseTime=true&charset={cs}&tls={false|custom}` is rendered
//! 4. The named driver opens a pool for the locator, tuned with the configured limits
//! 5. When `initial_ping` is set, the database is pinged; on failure the pool is closed
//!
//! ## Usage
//!
//! ```no_run
//! use sqlx_mysql_conn_mgr::ConnectionBuilder;
//!
//! #[tokio::main]
//! async fn main() -> sqlx_mysql_conn_mgr::Result<()> {
//!     let client = ConnectionBuilder::new()
//!         .with_host("localhost:3306")
//!         .with_db_name("shop")
//!         .with_username("app")
//!         .with_password("secret")
//!         .build()
//!         .await?;
//!
//!     if let Some(pool) = client.mysql_pool() {
//!         let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM products")
//!             .fetch_one(pool)
//!             .await?;
//!         println!("{} products", n);
//!     }
//!
//!     client.close().await;
//!     Ok(())
//! }
//! ```
//!
mod builder;
mod client;
mod config;
mod driver;
mod error;
mod locator;
mod mysql;
mod tls;

// Re-export public types
pub use builder::ConnectionBuilder;
pub use client::Client;
pub use config::{CUSTOM_TLS_PROFILE, ConnectionConfig, PoolSettings, TlsMode};
pub use driver::{Driver, DriverRegistry, PoolHandle, TransactionHandle};
pub use error::{Error, OpenError, TlsError};
pub use locator::{Locator, format_locator};
pub use mysql::{MySqlDriver, MySqlPoolHandle, MySqlTransaction};
pub use tls::{TlsProfile, TlsRegistry, TlsVersion};

/// A type alias for Results with our custom Error type
pub type Result<T> = std::result::Result<T, Error>;
