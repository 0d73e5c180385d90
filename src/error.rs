use serde::{Serialize, Serializer};

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Structured error response for API layers.
#[derive(Serialize)]
struct ErrorResponse {
   code: String,
   message: String,
}

/// Error types for MySQL client operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
   /// Error from building or using a client.
   #[error(transparent)]
   ConnectionManager(#[from] sqlx_mysql_conn_mgr::Error),

   /// Error from SQLx operations.
   #[error(transparent)]
   Sqlx(#[from] sqlx::Error),

   /// Generic error for operations that don't fit other categories.
   #[error("{0}")]
   Other(String),
}

impl Error {
   /// Extract a structured error code from the error type.
   ///
   /// This provides machine-readable error codes for callers that report errors
   /// over an API.
   pub fn error_code(&self) -> String {
      use sqlx_mysql_conn_mgr::Error as ConnError;

      match self {
         Error::ConnectionManager(e) => match e {
            ConnError::Configuration { .. } => "CONFIGURATION_ERROR".to_string(),
            ConnError::TlsConfiguration(_) => "TLS_CONFIGURATION_ERROR".to_string(),
            ConnError::Connection { .. } => "CONNECTION_ERROR".to_string(),
            ConnError::Connectivity(_) => "CONNECTIVITY_ERROR".to_string(),
            ConnError::ClientClosed => "CLIENT_CLOSED".to_string(),
            ConnError::Sqlx(e) => sqlx_error_code(e),
         },
         Error::Sqlx(e) => sqlx_error_code(e),
         Error::Other(_) => "ERROR".to_string(),
      }
   }

   /// Whether this error means a query matched no rows.
   pub fn is_no_rows(&self) -> bool {
      match self {
         Error::Sqlx(e) | Error::ConnectionManager(sqlx_mysql_conn_mgr::Error::Sqlx(e)) => {
            is_no_rows_error(e)
         }
         _ => false,
      }
   }
}

/// Whether a sqlx error means a query matched no rows.
pub fn is_no_rows_error(err: &sqlx::Error) -> bool {
   matches!(err, sqlx::Error::RowNotFound)
}

fn sqlx_error_code(e: &sqlx::Error) -> String {
   if is_no_rows_error(e) {
      return "NO_ROWS".to_string();
   }
   // Extract MySQL error codes from sqlx errors
   if let Some(code) = e.as_database_error().and_then(|db_err| db_err.code()) {
      return format!("MYSQL_{}", code);
   }
   "SQLX_ERROR".to_string()
}

impl Serialize for Error {
   fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
   where
      S: Serializer,
   {
      let response = ErrorResponse {
         code: self.error_code(),
         message: self.to_string(),
      };
      response.serialize(serializer)
   }
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn test_error_code_configuration() {
      let err = Error::from(sqlx_mysql_conn_mgr::Error::Configuration {
         message: "database host cannot be empty",
      });
      assert_eq!(err.error_code(), "CONFIGURATION_ERROR");
      assert_eq!(err.to_string(), "database host cannot be empty");
   }

   #[test]
   fn test_error_code_connection() {
      let err = Error::from(sqlx_mysql_conn_mgr::Error::Connection {
         driver: "sqlserver".into(),
         source: sqlx_mysql_conn_mgr::OpenError::UnknownDriver("sqlserver".into()),
      });
      assert_eq!(err.error_code(), "CONNECTION_ERROR");
      assert!(err.to_string().contains("sqlserver"));
   }

   #[test]
   fn test_error_code_client_closed() {
      let err = Error::from(sqlx_mysql_conn_mgr::Error::ClientClosed);
      assert_eq!(err.error_code(), "CLIENT_CLOSED");
   }

   #[test]
   fn test_no_rows() {
      let err = Error::Sqlx(sqlx::Error::RowNotFound);
      assert!(err.is_no_rows());
      assert_eq!(err.error_code(), "NO_ROWS");

      let wrapped = Error::from(sqlx_mysql_conn_mgr::Error::Sqlx(sqlx::Error::RowNotFound));
      assert!(wrapped.is_no_rows());

      assert!(!Error::Sqlx(sqlx::Error::PoolTimedOut).is_no_rows());
      assert!(!Error::Other("no rows".into()).is_no_rows());
   }

   #[test]
   fn test_error_code_sqlx_non_database() {
      let err = Error::Sqlx(sqlx::Error::PoolTimedOut);
      assert_eq!(err.error_code(), "SQLX_ERROR");
   }

   #[test]
   fn test_error_code_other() {
      assert_eq!(Error::Other("boom".into()).error_code(), "ERROR");
   }

   #[test]
   fn test_serialize() {
      let err = Error::from(sqlx_mysql_conn_mgr::Error::Configuration {
         message: "database name cannot be empty",
      });
      let value = serde_json::to_value(&err).unwrap();
      assert_eq!(value["code"], "CONFIGURATION_ERROR");
      assert_eq!(value["message"], "database name cannot be empty");
   }
}
