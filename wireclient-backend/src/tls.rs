//! TLS trust/verification context construction. The core never builds
//! one of these itself — callers supply a `ssl_context` to `Pool`, or this
//! module's [`default_client_config`] is used when none was given.

use rustls::ClientConfig;
use std::io;
use std::sync::Arc;

/// A `ClientConfig` using the platform's native trust store, with ALPN
/// offers left for the caller to set per connection attempt.
pub fn default_client_config() -> io::Result<Arc<ClientConfig>> {
    let mut roots = rustls::RootCertStore::empty();
    let native = rustls_native_certs::load_native_certs();
    for err in &native.errors {
        tracing::warn!(%err, "error loading a native certificate, continuing with the rest");
    }
    for cert in native.certs {
        // A malformed individual certificate is skipped rather than
        // failing the whole trust store.
        let _ = roots.add(cert);
    }
    if roots.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            "no usable native root certificates found",
        ));
    }

    let config = ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    Ok(Arc::new(config))
}

/// Clone `base` and set its ALPN protocol offer list, highest-preference
/// first (e.g. `["http/1.1", "h2"]`).
pub fn with_alpn(base: &Arc<ClientConfig>, protocols: &[&str]) -> Arc<ClientConfig> {
    let mut cfg = (**base).clone();
    cfg.alpn_protocols = protocols.iter().map(|p| p.as_bytes().to_vec()).collect();
    Arc::new(cfg)
}
