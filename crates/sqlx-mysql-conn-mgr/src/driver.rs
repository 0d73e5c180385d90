//! Driver seam between the builder and the pooled-connection primitive
//!
//! A [`Driver`] turns a locator into an open pool. The pool is reached through
//! [`PoolHandle`], and transactions begun on it through [`TransactionHandle`].
//! The default `mysql` driver is backed by sqlx; other drivers can be registered
//! by name in a [`DriverRegistry`].

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use sqlx::mysql::{MySqlConnection, MySqlPool};
use tokio::sync::RwLock;

use crate::config::{DEFAULT_DRIVER_NAME, PoolSettings};
use crate::error::OpenError;
use crate::mysql::MySqlDriver;
use crate::tls::TlsRegistry;

/// Opens pools for a wire dialect
#[async_trait]
pub trait Driver: Send + Sync {
   /// Open a pool for `locator`, tuned with `settings`
   ///
   /// Opening does not need to touch the network; liveness is checked separately
   /// through [`PoolHandle::ping`]. TLS profile names found in the locator must be
   /// resolved against `tls` here.
   async fn open(
      &self,
      locator: &str,
      tls: &TlsRegistry,
      settings: &PoolSettings,
   ) -> Result<Arc<dyn PoolHandle>, OpenError>;
}

/// An open connection pool
#[async_trait]
pub trait PoolHandle: Send + Sync {
   /// Verify that a connection can be established and answers
   async fn ping(&self) -> Result<(), sqlx::Error>;

   /// Acquire a connection and start a transaction on it
   async fn begin(&self) -> Result<Box<dyn TransactionHandle>, sqlx::Error>;

   /// Close every connection. Waits for checked-out connections to be returned.
   async fn close(&self);

   fn is_closed(&self) -> bool;

   /// Tuning the pool was opened with
   fn settings(&self) -> PoolSettings;

   /// The underlying sqlx pool, when the driver is sqlx-backed
   fn mysql_pool(&self) -> Option<&MySqlPool> {
      None
   }
}

/// A transaction in progress on a single connection
///
/// Both operations take `&mut self` so that a failed commit can still be followed
/// by a rollback on the same connection.
#[async_trait]
pub trait TransactionHandle: Send {
   async fn commit(&mut self) -> Result<(), sqlx::Error>;

   async fn rollback(&mut self) -> Result<(), sqlx::Error>;

   /// The connection the transaction runs on, for executing statements
   fn connection(&mut self) -> Option<&mut MySqlConnection> {
      None
   }
}

#[async_trait]
impl<T: TransactionHandle + ?Sized> TransactionHandle for Box<T> {
   async fn commit(&mut self) -> Result<(), sqlx::Error> {
      (**self).commit().await
   }

   async fn rollback(&mut self) -> Result<(), sqlx::Error> {
      (**self).rollback().await
   }

   fn connection(&mut self) -> Option<&mut MySqlConnection> {
      (**self).connection()
   }
}

/// Drivers addressable by name
///
/// Cloning is cheap; clones share the same drivers.
#[derive(Clone, Default)]
pub struct DriverRegistry(Arc<RwLock<HashMap<String, Arc<dyn Driver>>>>);

impl DriverRegistry {
   /// Create an empty registry
   pub fn new() -> Self {
      Self::default()
   }

   /// Create a registry holding the built-in `mysql` driver
   pub fn with_defaults() -> Self {
      let mut drivers: HashMap<String, Arc<dyn Driver>> = HashMap::new();
      drivers.insert(DEFAULT_DRIVER_NAME.to_string(), Arc::new(MySqlDriver));
      Self(Arc::new(RwLock::new(drivers)))
   }

   /// The process-wide registry used by builders that were not given one
   pub fn global() -> &'static DriverRegistry {
      static GLOBAL: OnceLock<DriverRegistry> = OnceLock::new();
      GLOBAL.get_or_init(DriverRegistry::with_defaults)
   }

   /// Register `driver` under `name`, returning the driver it replaced
   pub async fn register(
      &self,
      name: impl Into<String>,
      driver: Arc<dyn Driver>,
   ) -> Option<Arc<dyn Driver>> {
      self.0.write().await.insert(name.into(), driver)
   }

   /// Look up a driver by name
   pub async fn get(&self, name: &str) -> Result<Arc<dyn Driver>, OpenError> {
      self
         .0
         .read()
         .await
         .get(name)
         .cloned()
         .ok_or_else(|| OpenError::UnknownDriver(name.to_string()))
   }

   pub async fn names(&self) -> Vec<String> {
      let mut names: Vec<String> = self.0.read().await.keys().cloned().collect();
      names.sort();
      names
   }
}

impl fmt::Debug for DriverRegistry {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.debug_struct("DriverRegistry").finish_non_exhaustive()
   }
}

#[cfg(test)]
mod tests {
   use super::*;

   #[tokio::test]
   async fn test_defaults_contain_mysql() {
      let registry = DriverRegistry::with_defaults();
      assert!(registry.get("mysql").await.is_ok());
      assert_eq!(registry.names().await, vec!["mysql".to_string()]);
   }

   #[tokio::test]
   async fn test_unknown_driver() {
      let registry = DriverRegistry::with_defaults();
      let err = registry.get("sqlserver").await.err().unwrap();
      assert!(matches!(err, OpenError::UnknownDriver(ref name) if name == "sqlserver"));
      assert_eq!(err.to_string(), "unknown driver \"sqlserver\"");
   }

   #[tokio::test]
   async fn test_register_under_alias() {
      let registry = DriverRegistry::new();
      assert!(registry.get("mysql").await.is_err());

      assert!(registry.register("mariadb", Arc::new(MySqlDriver)).await.is_none());
      assert!(registry.get("mariadb").await.is_ok());
   }
}
