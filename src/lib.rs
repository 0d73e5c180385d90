//! Configuration-driven MySQL clients and best-effort transaction finalization.
//!
//! This crate sits on top of the connection manager (`sqlx-mysql-conn-mgr`) and
//! gives application code:
//!
//! - [`ConnectionBuilder`]: validated, fluent client construction (re-exported)
//! - [`finish_transaction`]: commit on success, roll back on failure, roll back once
//!   more when the commit itself fails; never returns a second error
//! - [`complete`] and [`with_transaction`]: unit-of-work helpers built on it
//! - [`Error`]: unified error with machine-readable codes
//!
//! # Example
//!
//! ```no_run
//! use sqlx_mysql_commons::{ConnectionBuilder, Error, with_transaction};
//!
//! # async fn example() -> Result<(), Error> {
//! let client = ConnectionBuilder::new()
//!     .with_host("db.internal:3306")
//!     .with_db_name("orders")
//!     .with_username("orders_svc")
//!     .with_password("secret")
//!     .with_ca_file("/etc/mysql/ca.pem")
//!     .build()
//!     .await?;
//!
//! with_transaction(&client, |tx| {
//!     Box::pin(async move {
//!         if let Some(conn) = tx.connection() {
//!             sqlx::query("INSERT INTO audit (event) VALUES (?)")
//!                 .bind("startup")
//!                 .execute(conn)
//!                 .await?;
//!         }
//!         Ok::<_, Error>(())
//!     })
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

mod error;
mod transactions;

pub use error::{Error, Result, is_no_rows_error};
pub use transactions::{Finalization, complete, finish_transaction, with_transaction};

// Re-export commonly used types from the connection manager
pub use sqlx_mysql_conn_mgr::{
   Client, ConnectionBuilder, ConnectionConfig, DriverRegistry, PoolSettings, TlsMode,
   TlsRegistry, TransactionHandle,
};
