//! Named TLS trust profiles
//!
//! A locator references its trust profile by name (`tls=custom`), and the driver
//! resolves that name when it opens the pool. Profiles therefore live in a
//! registry shared by every builder that wants to resolve them. The registry is
//! an explicit value so tests and multi-tenant callers can keep their own; the
//! process-wide instance is available through [`TlsRegistry::global`].

use std::collections::HashMap;
use std::fmt;
use std::io::Cursor;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use rustls::{ClientConfig, RootCertStore, SupportedProtocolVersion};
use rustls_pki_types::CertificateDer;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::TlsError;

static TLS13_ONLY: &[&SupportedProtocolVersion] = &[&rustls::version::TLS13];

/// Minimum protocol version accepted by a trust profile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsVersion {
   Tls12,
   Tls13,
}

impl TlsVersion {
   fn protocol_versions(&self) -> &'static [&'static SupportedProtocolVersion] {
      match self {
         Self::Tls12 => rustls::ALL_VERSIONS,
         Self::Tls13 => TLS13_ONLY,
      }
   }
}

impl fmt::Display for TlsVersion {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      match self {
         Self::Tls12 => write!(f, "TLSv1.2"),
         Self::Tls13 => write!(f, "TLSv1.3"),
      }
   }
}

/// A registered trust profile: a minimum protocol version plus the exact set of
/// trusted root certificates taken from a PEM bundle
pub struct TlsProfile {
   name: String,
   min_version: TlsVersion,
   pem: Vec<u8>,
   certificate_count: usize,
   client_config: Arc<ClientConfig>,
}

impl TlsProfile {
   fn from_pem(name: &str, pem: &[u8], min_version: TlsVersion) -> Result<Self, TlsError> {
      let certs = rustls_pemfile::certs(&mut Cursor::new(pem))
         .collect::<Result<Vec<CertificateDer<'static>>, _>>()
         .map_err(TlsError::Pem)?;

      let mut roots = RootCertStore::empty();
      let (added, ignored) = roots.add_parsable_certificates(certs);
      if added == 0 {
         return Err(TlsError::NoCertificates);
      }
      if ignored > 0 {
         warn!(profile = name, ignored, "Skipped unparsable certificates in CA bundle");
      }

      let provider = Arc::new(rustls::crypto::ring::default_provider());
      let client_config = ClientConfig::builder_with_provider(provider)
         .with_protocol_versions(min_version.protocol_versions())?
         .with_root_certificates(roots)
         .with_no_client_auth();

      Ok(Self {
         name: name.to_string(),
         min_version,
         pem: pem.to_vec(),
         certificate_count: added,
         client_config: Arc::new(client_config),
      })
   }

   pub fn name(&self) -> &str {
      &self.name
   }

   pub fn min_version(&self) -> TlsVersion {
      self.min_version
   }

   /// The PEM bundle this profile was registered with
   pub fn pem(&self) -> &[u8] {
      &self.pem
   }

   /// Number of certificates trusted by this profile
   pub fn certificate_count(&self) -> usize {
      self.certificate_count
   }

   /// rustls client configuration restricted to this profile's versions and roots
   pub fn client_config(&self) -> Arc<ClientConfig> {
      Arc::clone(&self.client_config)
   }

   fn is_same_registration(&self, pem: &[u8], min_version: TlsVersion) -> bool {
      self.min_version == min_version && self.pem == pem
   }
}

impl fmt::Debug for TlsProfile {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.debug_struct("TlsProfile")
         .field("name", &self.name)
         .field("min_version", &self.min_version)
         .field("certificate_count", &self.certificate_count)
         .field("client_config", &"<ClientConfig>")
         .finish()
   }
}

/// Registry of trust profiles resolvable by name
///
/// Cloning is cheap; clones share the same profiles. Registration takes the write
/// lock for the whole parse-and-insert step, so concurrent registrations of one
/// name are serialized and the last one wins.
#[derive(Clone, Default)]
pub struct TlsRegistry(Arc<RwLock<HashMap<String, Arc<TlsProfile>>>>);

impl TlsRegistry {
   /// Create an empty registry
   pub fn new() -> Self {
      Self::default()
   }

   /// The process-wide registry used by builders that were not given one
   pub fn global() -> &'static TlsRegistry {
      static GLOBAL: OnceLock<TlsRegistry> = OnceLock::new();
      GLOBAL.get_or_init(TlsRegistry::new)
   }

   /// Register `pem` under `name`
   ///
   /// Registering the same bundle and version again returns the existing profile
   /// untouched. Registering different content replaces the previous profile.
   pub async fn register(
      &self,
      name: &str,
      pem: &[u8],
      min_version: TlsVersion,
   ) -> Result<Arc<TlsProfile>, TlsError> {
      let mut profiles = self.0.write().await;

      if let Some(existing) = profiles.get(name) {
         if existing.is_same_registration(pem, min_version) {
            debug!(profile = name, "TLS profile already registered with identical content");
            return Ok(Arc::clone(existing));
         }
         warn!(profile = name, "Replacing TLS profile with different certificate content");
      }

      let profile = Arc::new(TlsProfile::from_pem(name, pem, min_version)?);
      profiles.insert(name.to_string(), Arc::clone(&profile));

      debug!(
         profile = name,
         certificates = profile.certificate_count(),
         min_version = %min_version,
         "Registered TLS profile"
      );
      Ok(profile)
   }

   /// Read a PEM bundle from disk and register it under `name`
   pub async fn register_file(
      &self,
      name: &str,
      path: impl AsRef<Path>,
      min_version: TlsVersion,
   ) -> Result<Arc<TlsProfile>, TlsError> {
      let path = path.as_ref();
      let pem = tokio::fs::read(path).await.map_err(|source| TlsError::Io {
         path: path.to_path_buf(),
         source,
      })?;

      self.register(name, &pem, min_version).await
   }

   pub async fn get(&self, name: &str) -> Option<Arc<TlsProfile>> {
      self.0.read().await.get(name).cloned()
   }

   pub async fn contains(&self, name: &str) -> bool {
      self.0.read().await.contains_key(name)
   }

   /// Remove a profile. Pools already opened with it keep their configuration.
   pub async fn deregister(&self, name: &str) -> Option<Arc<TlsProfile>> {
      self.0.write().await.remove(name)
   }
}

impl fmt::Debug for TlsRegistry {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.debug_struct("TlsRegistry").finish_non_exhaustive()
   }
}

#[cfg(test)]
mod tests {
   use super::*;

   const CA_PEM: &[u8] = include_bytes!("../tests/fixtures/ca.pem");
   const BUNDLE_PEM: &[u8] = include_bytes!("../tests/fixtures/bundle.pem");

   #[tokio::test]
   async fn test_register_requires_tls13() {
      let registry = TlsRegistry::new();
      let profile = registry
         .register("custom", CA_PEM, TlsVersion::Tls13)
         .await
         .unwrap();

      assert_eq!(profile.name(), "custom");
      assert_eq!(profile.min_version(), TlsVersion::Tls13);
      assert_eq!(profile.certificate_count(), 1);
      assert!(registry.contains("custom").await);
   }

   #[tokio::test]
   async fn test_register_bundle_trusts_every_certificate() {
      let registry = TlsRegistry::new();
      let profile = registry
         .register("custom", BUNDLE_PEM, TlsVersion::Tls13)
         .await
         .unwrap();

      assert_eq!(profile.certificate_count(), 2);
      assert_eq!(profile.pem(), BUNDLE_PEM);
   }

   #[tokio::test]
   async fn test_register_identical_content_is_idempotent() {
      let registry = TlsRegistry::new();
      let first = registry
         .register("custom", CA_PEM, TlsVersion::Tls13)
         .await
         .unwrap();
      let second = registry
         .register("custom", CA_PEM, TlsVersion::Tls13)
         .await
         .unwrap();

      assert!(Arc::ptr_eq(&first, &second));
   }

   #[tokio::test]
   async fn test_register_different_content_replaces() {
      let registry = TlsRegistry::new();
      let first = registry
         .register("custom", CA_PEM, TlsVersion::Tls13)
         .await
         .unwrap();
      let second = registry
         .register("custom", BUNDLE_PEM, TlsVersion::Tls13)
         .await
         .unwrap();

      assert!(!Arc::ptr_eq(&first, &second));
      let current = registry.get("custom").await.unwrap();
      assert!(Arc::ptr_eq(&current, &second));
   }

   #[tokio::test]
   async fn test_register_rejects_empty_bundle() {
      let registry = TlsRegistry::new();
      let err = registry
         .register("custom", b"not a certificate", TlsVersion::Tls13)
         .await
         .unwrap_err();

      assert!(matches!(err, TlsError::NoCertificates));
      assert!(!registry.contains("custom").await);
   }

   #[tokio::test]
   async fn test_failed_replacement_keeps_previous_profile() {
      let registry = TlsRegistry::new();
      registry
         .register("custom", CA_PEM, TlsVersion::Tls13)
         .await
         .unwrap();

      assert!(
         registry
            .register("custom", b"", TlsVersion::Tls13)
            .await
            .is_err()
      );
      assert_eq!(registry.get("custom").await.unwrap().pem(), CA_PEM);
   }

   #[tokio::test]
   async fn test_register_missing_file() {
      let registry = TlsRegistry::new();
      let err = registry
         .register_file("custom", "/nonexistent/ca.pem", TlsVersion::Tls13)
         .await
         .unwrap_err();

      assert!(matches!(err, TlsError::Io { .. }));
      assert!(err.to_string().contains("/nonexistent/ca.pem"));
   }

   #[tokio::test]
   async fn test_deregister() {
      let registry = TlsRegistry::new();
      registry
         .register("custom", CA_PEM, TlsVersion::Tls12)
         .await
         .unwrap();

      assert!(registry.deregister("custom").await.is_some());
      assert!(registry.get("custom").await.is_none());
   }

   #[test]
   fn test_version_display() {
      assert_eq!(TlsVersion::Tls13.to_string(), "TLSv1.3");
      assert_eq!(TlsVersion::Tls12.to_string(), "TLSv1.2");
   }
}
