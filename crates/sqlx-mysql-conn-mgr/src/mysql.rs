//! Built-in `mysql` driver backed by sqlx

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlPool, MySqlPoolOptions, MySqlSslMode};
use sqlx::pool::PoolConnection;
use sqlx::{Connection, Executor, MySql, Row};
use tracing::debug;

use crate::config::PoolSettings;
use crate::driver::{Driver, PoolHandle, TransactionHandle};
use crate::error::OpenError;
use crate::locator::Locator;
use crate::tls::{TlsRegistry, TlsVersion};

/// Opens lazily-connecting sqlx MySQL pools
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDriver;

impl MySqlDriver {
   /// Translate a locator into sqlx connect options, resolving its TLS profile
   pub async fn connect_options(
      &self,
      locator: &Locator,
      tls: &TlsRegistry,
   ) -> Result<MySqlConnectOptions, OpenError> {
      self.resolve(locator, tls).await.map(|(options, _)| options)
   }

   /// Connect options plus the minimum protocol version of the resolved profile
   async fn resolve(
      &self,
      locator: &Locator,
      tls: &TlsRegistry,
   ) -> Result<(MySqlConnectOptions, Option<TlsVersion>), OpenError> {
      let mut options = MySqlConnectOptions::new()
         .host(&locator.host)
         .port(locator.port)
         .username(&locator.username)
         .database(&locator.db_name);

      if !locator.password.is_empty() {
         options = options.password(&locator.password);
      }
      if let Some(charset) = &locator.charset {
         options = options.charset(charset);
      }

      let resolved = match locator.tls.as_deref() {
         None | Some("false") => (options.ssl_mode(MySqlSslMode::Disabled), None),
         Some("true") | Some("skip-verify") => (options.ssl_mode(MySqlSslMode::Required), None),
         Some("preferred") => (options.ssl_mode(MySqlSslMode::Preferred), None),
         Some(profile_name) => {
            let profile = tls
               .get(profile_name)
               .await
               .ok_or_else(|| OpenError::UnknownTlsProfile(profile_name.to_string()))?;
            let options = options
               .ssl_mode(MySqlSslMode::VerifyCa)
               .ssl_ca_from_pem(profile.pem().to_vec());
            (options, Some(profile.min_version()))
         }
      };

      Ok(resolved)
   }
}

#[async_trait]
impl Driver for MySqlDriver {
   async fn open(
      &self,
      locator: &str,
      tls: &TlsRegistry,
      settings: &PoolSettings,
   ) -> Result<Arc<dyn PoolHandle>, OpenError> {
      let locator = Locator::parse(locator)?;
      let (options, min_version) = self.resolve(&locator, tls).await?;

      // sqlx has no idle cap; idle connections are bounded by max_connections
      let mut pool_options = MySqlPoolOptions::new()
         .max_connections(settings.max_open_conns)
         .min_connections(0)
         .max_lifetime(Some(settings.conn_max_lifetime));

      // sqlx only takes a CA for MySQL, so the protocol floor is checked on
      // every new connection instead of in the handshake
      if min_version == Some(TlsVersion::Tls13) {
         pool_options = pool_options.after_connect(|conn, _meta| {
            Box::pin(async move { require_tls13(conn).await })
         });
      }

      let pool = pool_options.connect_lazy_with(options);

      debug!(
         host = %locator.host,
         port = locator.port,
         database = %locator.db_name,
         min_tls = ?min_version,
         "Opened lazy MySQL pool"
      );

      Ok(Arc::new(MySqlPoolHandle {
         pool,
         settings: *settings,
      }))
   }
}

/// Reject a freshly opened connection unless the session negotiated TLS 1.3
async fn require_tls13(conn: &mut MySqlConnection) -> Result<(), sqlx::Error> {
   let row = (&mut *conn)
      .fetch_optional(sqlx::raw_sql("SHOW SESSION STATUS LIKE 'Ssl_version'"))
      .await?;

   let version = match row {
      Some(row) => {
         let value: Vec<u8> = row.try_get(1)?;
         Some(String::from_utf8_lossy(&value).into_owned())
      }
      None => None,
   };

   check_negotiated_version(version.as_deref())
}

fn check_negotiated_version(version: Option<&str>) -> Result<(), sqlx::Error> {
   match version {
      Some(NEGOTIATED_TLS13) => Ok(()),
      Some("") | None => Err(sqlx::Error::Tls(
         "connection is not encrypted but the trust profile requires TLSv1.3".into(),
      )),
      Some(other) => Err(sqlx::Error::Tls(
         format!("server negotiated {}, the trust profile requires TLSv1.3", other).into(),
      )),
   }
}

const NEGOTIATED_TLS13: &str = "TLSv1.3";

/// Pool handle returned by [`MySqlDriver`]
#[derive(Debug)]
pub struct MySqlPoolHandle {
   pool: MySqlPool,
   settings: PoolSettings,
}

#[async_trait]
impl PoolHandle for MySqlPoolHandle {
   async fn ping(&self) -> Result<(), sqlx::Error> {
      let mut conn = self.pool.acquire().await?;
      conn.ping().await
   }

   async fn begin(&self) -> Result<Box<dyn TransactionHandle>, sqlx::Error> {
      let mut conn = self.pool.acquire().await?;
      (&mut *conn).execute(sqlx::raw_sql("BEGIN")).await?;
      Ok(Box::new(MySqlTransaction::new(conn)))
   }

   async fn close(&self) {
      self.pool.close().await;
   }

   fn is_closed(&self) -> bool {
      self.pool.is_closed()
   }

   fn settings(&self) -> PoolSettings {
      self.settings
   }

   fn mysql_pool(&self) -> Option<&MySqlPool> {
      Some(&self.pool)
   }
}

/// Transaction running on a connection checked out of a [`MySqlPoolHandle`]
///
/// Derefs to `MySqlConnection` so statements can be executed with
/// `sqlx::query(..).execute(&mut *tx)`. If the transaction is dropped before a
/// successful commit or rollback, the connection is closed instead of being
/// returned to the pool with an open transaction.
#[derive(Debug)]
pub struct MySqlTransaction {
   conn: PoolConnection<MySql>,
   finished: bool,
}

impl MySqlTransaction {
   fn new(conn: PoolConnection<MySql>) -> Self {
      Self {
         conn,
         finished: false,
      }
   }
}

#[async_trait]
impl TransactionHandle for MySqlTransaction {
   async fn commit(&mut self) -> Result<(), sqlx::Error> {
      (&mut *self.conn).execute(sqlx::raw_sql("COMMIT")).await?;
      self.finished = true;
      Ok(())
   }

   async fn rollback(&mut self) -> Result<(), sqlx::Error> {
      (&mut *self.conn).execute(sqlx::raw_sql("ROLLBACK")).await?;
      self.finished = true;
      Ok(())
   }

   fn connection(&mut self) -> Option<&mut MySqlConnection> {
      Some(&mut *self.conn)
   }
}

impl Deref for MySqlTransaction {
   type Target = MySqlConnection;

   fn deref(&self) -> &Self::Target {
      &self.conn
   }
}

impl DerefMut for MySqlTransaction {
   fn deref_mut(&mut self) -> &mut Self::Target {
      &mut self.conn
   }
}

impl Drop for MySqlTransaction {
   fn drop(&mut self) {
      if !self.finished {
         debug!("Dropping unfinished transaction, closing its connection");
         self.conn.close_on_drop();
      }
   }
}

#[cfg(test)]
mod tests {
   use super::*;

   const CA_PEM: &[u8] = include_bytes!("../tests/fixtures/ca.pem");

   fn settings() -> PoolSettings {
      PoolSettings {
         max_idle_conns: 2,
         max_open_conns: 4,
         conn_max_lifetime: std::time::Duration::from_secs(1),
      }
   }

   #[tokio::test]
   async fn test_open_is_lazy() {
      let handle = MySqlDriver
         .open(
            "app:pw@tcp(127.0.0.1:1)/db?parseTime=true&charset=utf8&tls=false",
            &TlsRegistry::new(),
            &settings(),
         )
         .await
         .unwrap();

      assert_eq!(handle.settings(), settings());
      let pool = handle.mysql_pool().unwrap();
      assert_eq!(pool.options().get_max_connections(), 4);
      assert_eq!(pool.size(), 0);
      handle.close().await;
      assert!(handle.is_closed());
   }

   #[tokio::test]
   async fn test_open_rejects_malformed_locator() {
      let result = MySqlDriver
         .open("not a locator", &TlsRegistry::new(), &settings())
         .await;
      assert!(matches!(result, Err(OpenError::InvalidLocator(_))));
   }

   #[tokio::test]
   async fn test_unregistered_profile() {
      let result = MySqlDriver
         .open("app:pw@tcp(localhost)/db?tls=custom", &TlsRegistry::new(), &settings())
         .await;
      assert!(matches!(result, Err(OpenError::UnknownTlsProfile(ref name)) if name == "custom"));
   }

   #[tokio::test]
   async fn test_registered_profile_resolves() {
      let tls = TlsRegistry::new();
      tls.register("custom", CA_PEM, TlsVersion::Tls13).await.unwrap();

      let locator = Locator::parse("app:pw@tcp(localhost)/db?tls=custom").unwrap();
      assert!(MySqlDriver.connect_options(&locator, &tls).await.is_ok());
   }

   #[tokio::test]
   async fn test_tls12_profile_resolves_without_floor() {
      let tls = TlsRegistry::new();
      tls.register("legacy", CA_PEM, TlsVersion::Tls12).await.unwrap();

      let locator = Locator::parse("app:pw@tcp(localhost)/db?tls=legacy").unwrap();
      let (_, min_version) = MySqlDriver.resolve(&locator, &tls).await.unwrap();
      assert_eq!(min_version, Some(TlsVersion::Tls12));

      let locator = Locator::parse("app:pw@tcp(localhost)/db?tls=false").unwrap();
      let (_, min_version) = MySqlDriver.resolve(&locator, &tls).await.unwrap();
      assert_eq!(min_version, None);
   }

   #[tokio::test]
   async fn test_custom_profile_carries_tls13_floor() {
      let tls = TlsRegistry::new();
      tls.register("custom", CA_PEM, TlsVersion::Tls13).await.unwrap();

      let locator = Locator::parse("app:pw@tcp(localhost)/db?tls=custom").unwrap();
      let (_, min_version) = MySqlDriver.resolve(&locator, &tls).await.unwrap();
      assert_eq!(min_version, Some(TlsVersion::Tls13));
   }

   #[test]
   fn test_negotiated_version_must_be_tls13() {
      assert!(check_negotiated_version(Some("TLSv1.3")).is_ok());

      let err = check_negotiated_version(Some("TLSv1.2")).unwrap_err();
      assert!(matches!(err, sqlx::Error::Tls(_)));
      assert!(err.to_string().contains("TLSv1.2"));

      assert!(matches!(check_negotiated_version(Some("")), Err(sqlx::Error::Tls(_))));
      assert!(matches!(check_negotiated_version(None), Err(sqlx::Error::Tls(_))));
   }
}
