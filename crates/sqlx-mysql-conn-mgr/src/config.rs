//! Configuration for MySQL clients and their connection pools

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub(crate) const DEFAULT_DRIVER_NAME: &str = "mysql";
pub(crate) const DEFAULT_CHARSET: &str = "utf8";
pub(crate) const DEFAULT_MAX_IDLE_CONNS: u32 = 100;
pub(crate) const DEFAULT_MAX_OPEN_CONNS: u32 = 350;
pub(crate) const DEFAULT_CONN_MAX_LIFETIME: Duration = Duration::from_millis(100);

/// Name under which the trust profile built from a custom CA file is registered
pub const CUSTOM_TLS_PROFILE: &str = "custom";

/// Transport encryption mode written into the locator's `tls` parameter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TlsMode {
   /// Plaintext transport
   #[default]
   Disabled,
   /// Encrypted transport verified against the [`CUSTOM_TLS_PROFILE`] trust profile
   Custom,
}

impl TlsMode {
   /// Token used for the `tls` query parameter of a locator
   pub fn as_locator_token(&self) -> &'static str {
      match self {
         Self::Disabled => "false",
         Self::Custom => CUSTOM_TLS_PROFILE,
      }
   }
}

impl fmt::Display for TlsMode {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.write_str(self.as_locator_token())
   }
}

/// Connection settings accumulated by a [`ConnectionBuilder`](crate::ConnectionBuilder)
///
/// Deserializing fills any missing field with its default, so a config file only
/// needs to carry the four required fields.
///
/// # Examples
///
/// ```
/// use sqlx_mysql_conn_mgr::ConnectionConfig;
///
/// let config: ConnectionConfig = serde_json::from_str(
///     r#"{"host": "db:3306", "db_name": "shop", "username": "app", "password": "secret"}"#,
/// ).unwrap();
///
/// assert_eq!(config.charset, "utf8");
/// assert_eq!(config.max_open_conns, 350);
/// ```
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ConnectionConfig {
   /// Name of the registered driver used to open the pool
   ///
   /// Default: `mysql`
   pub driver_name: String,

   /// Connection character set
   ///
   /// Default: `utf8`
   pub charset: String,

   /// Server address, `host` or `host:port`
   pub host: String,

   /// Database (schema) name
   pub db_name: String,

   pub username: String,

   pub password: String,

   /// PEM bundle whose certificates become the only trusted roots. Setting it
   /// switches the transport to [`TlsMode::Custom`].
   pub ca_file_path: Option<PathBuf>,

   /// Default: 100
   pub max_idle_conns: u32,

   /// Upper bound on connections held by the pool
   ///
   /// Default: 350
   pub max_open_conns: u32,

   /// How long a pooled connection may live before it is replaced
   ///
   /// Default: 100 ms
   #[serde(rename = "conn_max_lifetime_ms", with = "duration_ms")]
   pub conn_max_lifetime: Duration,

   /// Verify liveness before handing back a client
   ///
   /// Default: true
   pub initial_ping: bool,
}

impl ConnectionConfig {
   /// Transport mode implied by the presence of a CA file
   pub fn tls_mode(&self) -> TlsMode {
      if self.ca_file_path.is_some() {
         TlsMode::Custom
      } else {
         TlsMode::Disabled
      }
   }

   /// Snapshot of the pool tuning fields
   pub fn pool_settings(&self) -> PoolSettings {
      PoolSettings {
         max_idle_conns: self.max_idle_conns,
         max_open_conns: self.max_open_conns,
         conn_max_lifetime: self.conn_max_lifetime,
      }
   }
}

impl Default for ConnectionConfig {
   fn default() -> Self {
      Self {
         driver_name: DEFAULT_DRIVER_NAME.to_string(),
         charset: DEFAULT_CHARSET.to_string(),
         host: String::new(),
         db_name: String::new(),
         username: String::new(),
         password: String::new(),
         ca_file_path: None,
         max_idle_conns: DEFAULT_MAX_IDLE_CONNS,
         max_open_conns: DEFAULT_MAX_OPEN_CONNS,
         conn_max_lifetime: DEFAULT_CONN_MAX_LIFETIME,
         initial_ping: true,
      }
   }
}

impl fmt::Debug for ConnectionConfig {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.debug_struct("ConnectionConfig")
         .field("driver_name", &self.driver_name)
         .field("charset", &self.charset)
         .field("host", &self.host)
         .field("db_name", &self.db_name)
         .field("username", &self.username)
         .field("password", &"<redacted>")
         .field("ca_file_path", &self.ca_file_path)
         .field("max_idle_conns", &self.max_idle_conns)
         .field("max_open_conns", &self.max_open_conns)
         .field("conn_max_lifetime", &self.conn_max_lifetime)
         .field("initial_ping", &self.initial_ping)
         .finish()
   }
}

/// Pool tuning applied to an opened pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
   pub max_idle_conns: u32,
   pub max_open_conns: u32,
   pub conn_max_lifetime: Duration,
}

impl Default for PoolSettings {
   fn default() -> Self {
      ConnectionConfig::default().pool_settings()
   }
}

mod duration_ms {
   use std::time::Duration;

   use serde::{Deserialize, Deserializer, Serializer};

   pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
      serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
   }

   pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
      u64::deserialize(deserializer).map(Duration::from_millis)
   }
}
