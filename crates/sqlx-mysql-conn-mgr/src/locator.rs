//! Locator strings
//!
//! A locator carries everything a driver needs to open a pool:
//!
//! ```text
//! {username}:{password}@tcp({host})/{db_name}?parseTime=true&charset={charset}&tls={false|custom}
//! ```

use std::fmt;

use crate::config::ConnectionConfig;
use crate::error::OpenError;

const DEFAULT_PORT: u16 = 3306;

/// Render the locator for a configuration
pub fn format_locator(config: &ConnectionConfig) -> String {
   format!(
      "{}:{}@tcp({})/{}?parseTime={}&charset={}&tls={}",
      config.username,
      config.password,
      config.host,
      config.db_name,
      true,
      config.charset,
      config.tls_mode().as_locator_token(),
   )
}

/// Parsed locator
#[derive(Clone, PartialEq, Eq)]
pub struct Locator {
   pub username: String,
   pub password: String,
   pub host: String,
   pub port: u16,
   pub db_name: String,
   pub parse_time: bool,
   pub charset: Option<String>,
   /// Raw `tls` token: `false`, `true`, `skip-verify`, `preferred` or a profile name
   pub tls: Option<String>,
   /// Parameters not interpreted above, in order of appearance
   pub params: Vec<(String, String)>,
}

impl Locator {
   /// Parse a locator string
   pub fn parse(s: &str) -> Result<Self, OpenError> {
      // Nothing is escaped, so credentials may hold '?', '&' or '/'. The database
      // name follows the last '/' and only the text after it carries parameters.
      let slash = s
         .rfind('/')
         .ok_or_else(|| invalid("missing '/' before the database name"))?;
      let (prefix, rest) = (&s[..slash], &s[slash + 1..]);
      let (db_name, query) = rest.split_once('?').unwrap_or((rest, ""));

      // Passwords may contain '@', so credentials end at the last one
      let (credentials, address) = match prefix.rfind('@') {
         Some(at) => (&prefix[..at], &prefix[at + 1..]),
         None => ("", prefix),
      };
      let (username, password) = match credentials.split_once(':') {
         Some((user, pass)) => (user, pass),
         None => (credentials, ""),
      };

      let inner = address
         .strip_prefix("tcp(")
         .and_then(|rest| rest.strip_suffix(')'))
         .ok_or_else(|| invalid(format!("unsupported address '{}', expected tcp(host[:port])", address)))?;
      let (host, port) = split_host_port(inner)?;

      let mut locator = Self {
         username: username.to_string(),
         password: password.to_string(),
         host,
         port,
         db_name: db_name.to_string(),
         parse_time: false,
         charset: None,
         tls: None,
         params: Vec::new(),
      };

      for pair in query.split('&').filter(|pair| !pair.is_empty()) {
         let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| invalid(format!("parameter '{}' has no value", pair)))?;
         match key {
            "parseTime" => {
               locator.parse_time = value
                  .parse()
                  .map_err(|_| invalid(format!("parseTime must be true or false, got '{}'", value)))?
            }
            "charset" => locator.charset = Some(value.to_string()),
            "tls" => locator.tls = Some(value.to_string()),
            _ => locator.params.push((key.to_string(), value.to_string())),
         }
      }

      Ok(locator)
   }
}

fn split_host_port(address: &str) -> Result<(String, u16), OpenError> {
   if address.is_empty() {
      return Err(invalid("empty host"));
   }

   // Bracketed IPv6 literal, e.g. [::1]:3306
   if let Some(rest) = address.strip_prefix('[') {
      let (host, after) = rest
         .split_once(']')
         .ok_or_else(|| invalid(format!("unbalanced brackets in '{}'", address)))?;
      let port = match after.strip_prefix(':') {
         Some(port) => parse_port(port)?,
         None if after.is_empty() => DEFAULT_PORT,
         None => return Err(invalid(format!("unexpected '{}' after host", after))),
      };
      return Ok((host.to_string(), port));
   }

   match address.rsplit_once(':') {
      Some((host, port)) => Ok((host.to_string(), parse_port(port)?)),
      None => Ok((address.to_string(), DEFAULT_PORT)),
   }
}

fn parse_port(port: &str) -> Result<u16, OpenError> {
   port
      .parse()
      .map_err(|_| invalid(format!("invalid port '{}'", port)))
}

fn invalid(message: impl Into<String>) -> OpenError {
   OpenError::InvalidLocator(message.into())
}

impl fmt::Debug for Locator {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.debug_struct("Locator")
         .field("username", &self.username)
         .field("password", &"<redacted>")
         .field("host", &self.host)
         .field("port", &self.port)
         .field("db_name", &self.db_name)
         .field("parse_time", &self.parse_time)
         .field("charset", &self.charset)
         .field("tls", &self.tls)
         .field("params", &self.params)
         .finish()
   }
}

#[cfg(test)]
mod tests {
   use super::*;

   fn config() -> ConnectionConfig {
      ConnectionConfig {
         host: "db.internal:3307".into(),
         db_name: "orders".into(),
         username: "svc".into(),
         password: "s3cret".into(),
         ..Default::default()
      }
   }

   #[test]
   fn test_format_without_ca() {
      assert_eq!(
         format_locator(&config()),
         "svc:s3cret@tcp(db.internal:3307)/orders?parseTime=true&charset=utf8&tls=false"
      );
   }

   #[test]
   fn test_format_with_ca() {
      let config = ConnectionConfig {
         ca_file_path: Some("ca.pem".into()),
         charset: "utf8mb4".into(),
         ..config()
      };
      assert_eq!(
         format_locator(&config),
         "svc:s3cret@tcp(db.internal:3307)/orders?parseTime=true&charset=utf8mb4&tls=custom"
      );
   }

   #[test]
   fn test_parse_formatted_locator() {
      let locator = Locator::parse(&format_locator(&config())).unwrap();
      assert_eq!(locator.username, "svc");
      assert_eq!(locator.password, "s3cret");
      assert_eq!(locator.host, "db.internal");
      assert_eq!(locator.port, 3307);
      assert_eq!(locator.db_name, "orders");
      assert!(locator.parse_time);
      assert_eq!(locator.charset.as_deref(), Some("utf8"));
      assert_eq!(locator.tls.as_deref(), Some("false"));
      assert!(locator.params.is_empty());
   }

   #[test]
   fn test_parse_password_with_at_sign() {
      let locator = Locator::parse("app:p@ss@word@tcp(localhost)/db").unwrap();
      assert_eq!(locator.username, "app");
      assert_eq!(locator.password, "p@ss@word");
      assert_eq!(locator.host, "localhost");
      assert_eq!(locator.port, 3306);
   }

   #[test]
   fn test_parse_password_with_reserved_characters() {
      for password in ["pa?ss", "pa/ss", "p&w=1", "a?b/c&d@e"] {
         let config = ConnectionConfig {
            password: password.into(),
            ..config()
         };
         let locator = Locator::parse(&format_locator(&config)).unwrap();
         assert_eq!(locator.username, "svc");
         assert_eq!(locator.password, password);
         assert_eq!(locator.host, "db.internal");
         assert_eq!(locator.db_name, "orders");
         assert_eq!(locator.charset.as_deref(), Some("utf8"));
         assert_eq!(locator.tls.as_deref(), Some("false"));
         assert!(locator.params.is_empty());
      }
   }

   #[test]
   fn test_parse_ipv6_and_extra_params() {
      let locator = Locator::parse("u:p@tcp([::1]:3310)/db?timeout=5s&tls=custom").unwrap();
      assert_eq!(locator.host, "::1");
      assert_eq!(locator.port, 3310);
      assert_eq!(locator.tls.as_deref(), Some("custom"));
      assert_eq!(locator.params, vec![("timeout".to_string(), "5s".to_string())]);
   }

   #[test]
   fn test_parse_rejects_malformed() {
      for bad in [
         "u:p@unix(/tmp/mysql.sock)/db",
         "u:p@tcp(localhost/db",
         "u:p@tcp(localhost:port)/db",
         "u:p@tcp(localhost)",
         "u:p@tcp()/db",
         "u:p@tcp(localhost)/db?parseTime=maybe",
         "u:p@tcp(localhost)/db?charset",
      ] {
         assert!(
            matches!(Locator::parse(bad), Err(OpenError::InvalidLocator(_))),
            "expected '{}' to be rejected",
            bad
         );
      }
   }

   #[test]
   fn test_debug_redacts_password() {
      let locator = Locator::parse("u:topsecret@tcp(h)/db").unwrap();
      assert!(!format!("{:?}", locator).contains("topsecret"));
   }
}
