//! Fluent construction of database clients

use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, warn};

use crate::Result;
use crate::client::Client;
use crate::config::{CUSTOM_TLS_PROFILE, ConnectionConfig};
use crate::driver::DriverRegistry;
use crate::error::Error;
use crate::locator::format_locator;
use crate::tls::{TlsRegistry, TlsVersion};

/// Accumulates connection settings and opens a [`Client`]
///
/// Every setter returns the builder so calls can be chained. Only the host,
/// database name, username and password are required; everything else has a
/// default (see [`ConnectionConfig`]).
///
/// # Examples
///
/// ```no_run
/// use sqlx_mysql_conn_mgr::ConnectionBuilder;
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), sqlx_mysql_conn_mgr::Error> {
/// let client = ConnectionBuilder::new()
///     .with_host("db.internal:3306")
///     .with_db_name("orders")
///     .with_username("orders_svc")
///     .with_password("secret")
///     .with_ca_file("/etc/mysql/ca.pem")
///     .with_max_open_conns(50)
///     .with_conn_max_lifetime(Duration::from_secs(300))
///     .build()
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ConnectionBuilder {
   config: ConnectionConfig,
   tls: TlsRegistry,
   drivers: DriverRegistry,
}

impl Default for ConnectionBuilder {
   fn default() -> Self {
      Self::new()
   }
}

impl ConnectionBuilder {
   /// Create a builder with default settings, resolving drivers and TLS profiles
   /// through the process-wide registries
   pub fn new() -> Self {
      Self::from_config(ConnectionConfig::default())
   }

   /// Create a builder seeded with `config`
   pub fn from_config(config: ConnectionConfig) -> Self {
      Self {
         config,
         tls: TlsRegistry::global().clone(),
         drivers: DriverRegistry::global().clone(),
      }
   }

   pub fn with_driver_name(mut self, name: impl Into<String>) -> Self {
      self.config.driver_name = name.into();
      self
   }

   pub fn with_charset(mut self, charset: impl Into<String>) -> Self {
      self.config.charset = charset.into();
      self
   }

   /// Server address, `host` or `host:port`
   pub fn with_host(mut self, host: impl Into<String>) -> Self {
      self.config.host = host.into();
      self
   }

   pub fn with_db_name(mut self, name: impl Into<String>) -> Self {
      self.config.db_name = name.into();
      self
   }

   pub fn with_username(mut self, username: impl Into<String>) -> Self {
      self.config.username = username.into();
      self
   }

   pub fn with_password(mut self, password: impl Into<String>) -> Self {
      self.config.password = password.into();
      self
   }

   /// Trust exactly the certificates in this PEM bundle and require TLS 1.3
   ///
   /// This is the only way to enable TLS.
   pub fn with_ca_file(mut self, path: impl Into<PathBuf>) -> Self {
      self.config.ca_file_path = Some(path.into());
      self
   }

   pub fn with_max_idle_conns(mut self, max_idle_conns: u32) -> Self {
      self.config.max_idle_conns = max_idle_conns;
      self
   }

   pub fn with_max_open_conns(mut self, max_open_conns: u32) -> Self {
      self.config.max_open_conns = max_open_conns;
      self
   }

   pub fn with_conn_max_lifetime(mut self, conn_max_lifetime: Duration) -> Self {
      self.config.conn_max_lifetime = conn_max_lifetime;
      self
   }

   /// Whether `build` pings the database before returning (default: true)
   pub fn with_initial_ping(mut self, initial_ping: bool) -> Self {
      self.config.initial_ping = initial_ping;
      self
   }

   /// Register and resolve TLS profiles in `registry` instead of the global one
   pub fn with_tls_registry(mut self, registry: TlsRegistry) -> Self {
      self.tls = registry;
      self
   }

   /// Resolve drivers in `registry` instead of the global one
   pub fn with_driver_registry(mut self, registry: DriverRegistry) -> Self {
      self.drivers = registry;
      self
   }

   pub fn config(&self) -> &ConnectionConfig {
      &self.config
   }

   /// The locator `build` opens
   pub fn locator(&self) -> String {
      format_locator(&self.config)
   }

   /// Validate the settings and open a client
   ///
   /// Steps run in a fixed order: required fields are checked (host, database
   /// name, username, password), the CA bundle is registered as the `custom`
   /// trust profile, the pool is opened and tuned, and finally the database is
   /// pinged when `initial_ping` is set. A failed ping closes the pool before
   /// the error is returned.
   ///
   /// # Errors
   ///
   /// - [`Error::Configuration`] when a required field is empty
   /// - [`Error::TlsConfiguration`] when the CA file cannot be read or registered
   /// - [`Error::Connection`] when the driver is unknown or refuses the locator
   /// - [`Error::Connectivity`] when the initial ping fails
   pub async fn build(self) -> Result<Client> {
      self.validate()?;

      let config = &self.config;
      debug!(
         driver = %config.driver_name,
         host = %config.host,
         database = %config.db_name,
         tls = %config.tls_mode(),
         "Building database client"
      );

      if let Some(ca_file) = &config.ca_file_path {
         self
            .tls
            .register_file(CUSTOM_TLS_PROFILE, ca_file, TlsVersion::Tls13)
            .await
            .map_err(Error::TlsConfiguration)?;
      }

      let locator = format_locator(config);
      let settings = config.pool_settings();
      let connection_error = |source| Error::Connection {
         driver: config.driver_name.clone(),
         source,
      };

      let driver = self
         .drivers
         .get(&config.driver_name)
         .await
         .map_err(connection_error)?;
      let handle = driver
         .open(&locator, &self.tls, &settings)
         .await
         .map_err(connection_error)?;

      if config.initial_ping
         && let Err(e) = handle.ping().await
      {
         warn!(driver = %config.driver_name, "Initial ping failed, closing pool: {}", e);
         handle.close().await;
         return Err(Error::Connectivity(e));
      }

      debug!(driver = %config.driver_name, "Database client ready");
      Ok(Client::new(
         config.driver_name.clone(),
         config.tls_mode(),
         handle,
      ))
   }

   fn validate(&self) -> Result<()> {
      let config = &self.config;

      if config.host.is_empty() {
         return Err(Error::configuration("database host cannot be empty"));
      }
      if config.db_name.is_empty() {
         return Err(Error::configuration("database name cannot be empty"));
      }
      if config.username.is_empty() {
         return Err(Error::configuration("database username cannot be empty"));
      }
      if config.password.is_empty() {
         return Err(Error::configuration("database password cannot be empty"));
      }
      if config.max_open_conns == 0 {
         return Err(Error::configuration(
            "database max open connections must be greater than zero",
         ));
      }

      Ok(())
   }
}
