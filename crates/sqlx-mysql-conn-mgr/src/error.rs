//! Error types for sqlx-mysql-conn-mgr

use std::path::PathBuf;

use thiserror::Error;

/// Errors that may occur while building or using a database client
#[derive(Error, Debug)]
pub enum Error {
   /// A required connection setting is missing or invalid. Raised before any
   /// file or network I/O takes place.
   #[error("{message}")]
   Configuration { message: &'static str },

   /// The CA bundle could not be read or the trust profile could not be registered
   #[error("error adding certificate in database: {0}")]
   TlsConfiguration(#[source] TlsError),

   /// The driver refused to open a pool for the configured locator
   #[error("error connecting to {driver} database: {source}")]
   Connection {
      driver: String,
      #[source]
      source: OpenError,
   },

   /// The initial liveness probe failed after the pool was opened
   #[error("ping has failed: {0}")]
   Connectivity(#[source] sqlx::Error),

   /// The client has been closed and cannot be used
   #[error("database client has been closed")]
   ClientClosed,

   /// Error from the sqlx library. Standard sqlx errors are converted to this variant
   #[error("Sqlx error: {0}")]
   Sqlx(#[from] sqlx::Error),
}

impl Error {
   pub(crate) fn configuration(message: &'static str) -> Self {
      Self::Configuration { message }
   }
}

/// Errors raised while registering a TLS trust profile
#[derive(Error, Debug)]
pub enum TlsError {
   /// The CA bundle file could not be read
   #[error("failed to read CA file '{}': {source}", path.display())]
   Io {
      path: PathBuf,
      #[source]
      source: std::io::Error,
   },

   /// The bundle is not valid PEM
   #[error("failed to parse PEM certificate bundle: {0}")]
   Pem(#[source] std::io::Error),

   /// The bundle parsed but contained no usable certificate
   #[error("no valid certificates found in PEM bundle")]
   NoCertificates,

   /// rustls rejected the client configuration
   #[error("invalid TLS configuration: {0}")]
   Rustls(#[from] rustls::Error),
}

/// Errors raised by a [`Driver`](crate::Driver) when opening a pool
#[derive(Error, Debug)]
pub enum OpenError {
   /// No driver is registered under the requested name
   #[error("unknown driver \"{0}\"")]
   UnknownDriver(String),

   /// The locator string could not be parsed
   #[error("invalid locator: {0}")]
   InvalidLocator(String),

   /// The locator references a TLS profile that has not been registered
   #[error("unknown TLS profile \"{0}\"")]
   UnknownTlsProfile(String),

   /// Error from the sqlx library while constructing the pool
   #[error(transparent)]
   Sqlx(#[from] sqlx::Error),
}
