//! Database client handed back by a successful build

use std::fmt;
use std::sync::Arc;

use sqlx::mysql::MySqlPool;
use tracing::debug;

use crate::Result;
use crate::config::{PoolSettings, TlsMode};
use crate::driver::{PoolHandle, TransactionHandle};
use crate::error::Error;

/// A configured, open connection pool
///
/// Cloning is cheap; clones share the same pool. The pool settings are fixed at
/// build time.
///
/// # Example
///
/// ```no_run
/// use sqlx_mysql_conn_mgr::{ConnectionBuilder, TransactionHandle};
///
/// # async fn example() -> Result<(), sqlx_mysql_conn_mgr::Error> {
/// let client = ConnectionBuilder::new()
///     .with_host("localhost:3306")
///     .with_db_name("shop")
///     .with_username("app")
///     .with_password("secret")
///     .build()
///     .await?;
///
/// let mut tx = client.begin().await?;
/// if let Some(conn) = tx.connection() {
///     sqlx::query("UPDATE stock SET qty = qty - 1 WHERE sku = ?")
///         .bind("A-1")
///         .execute(conn)
///         .await?;
/// }
/// tx.commit().await?;
///
/// client.close().await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
   driver_name: String,
   tls_mode: TlsMode,
   handle: Arc<dyn PoolHandle>,
}

impl Client {
   pub(crate) fn new(driver_name: String, tls_mode: TlsMode, handle: Arc<dyn PoolHandle>) -> Self {
      Self {
         driver_name,
         tls_mode,
         handle,
      }
   }

   pub fn driver_name(&self) -> &str {
      &self.driver_name
   }

   pub fn tls_mode(&self) -> TlsMode {
      self.tls_mode
   }

   /// Pool tuning in effect for this client
   pub fn pool_settings(&self) -> PoolSettings {
      self.handle.settings()
   }

   /// Check that the database answers
   pub async fn ping(&self) -> Result<()> {
      self.ensure_open()?;
      self.handle.ping().await.map_err(Error::Connectivity)
   }

   /// Start a transaction on a pooled connection
   ///
   /// Finish it with `commit` or `rollback`. Dropping it unfinished discards the
   /// connection.
   pub async fn begin(&self) -> Result<Box<dyn TransactionHandle>> {
      self.ensure_open()?;
      Ok(self.handle.begin().await?)
   }

   /// The sqlx pool behind this client, for running queries directly
   ///
   /// Returns `None` for drivers that are not sqlx-backed.
   pub fn mysql_pool(&self) -> Option<&MySqlPool> {
      self.handle.mysql_pool()
   }

   /// Close the pool. Waits for checked-out connections to be returned.
   pub async fn close(&self) {
      debug!(driver = %self.driver_name, "Closing database client");
      self.handle.close().await;
   }

   pub fn is_closed(&self) -> bool {
      self.handle.is_closed()
   }

   fn ensure_open(&self) -> Result<()> {
      if self.handle.is_closed() {
         return Err(Error::ClientClosed);
      }
      Ok(())
   }
}

impl fmt::Debug for Client {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.debug_struct("Client")
         .field("driver_name", &self.driver_name)
         .field("tls_mode", &self.tls_mode)
         .field("pool_settings", &self.handle.settings())
         .field("closed", &self.handle.is_closed())
         .finish()
   }
}
