//! HTTP client construction with optional mutual TLS.
//!
//! Every certificate file is read and parsed here, at shipper construction,
//! so a broken TLS setup stops the agent before its first cycle.

use std::fs;

use reqwest::{Certificate, Client, Identity};
use tracing::{info, warn};

use super::error::ShipperBuildError;
use crate::config::shipper::ShipperConfig;

/// Builds the pooled client used by a shipper for its whole lifetime.
///
/// With TLS enabled the client presents the configured certificate/key pair.
/// A configured CA bundle replaces the built-in roots; without one the
/// built-in roots are used. `insecure_skip_verify` turns server certificate
/// verification off entirely.
pub fn build_client(config: &ShipperConfig) -> Result<Client, ShipperBuildError> {
    let mut builder = Client::builder()
        .use_rustls_tls()
        .timeout(config.timeout());

    let tls = &config.tls;
    if tls.enabled {
        let (cert_path, key_path) = tls.identity_paths().ok_or(ShipperBuildError::MissingIdentity)?;

        let mut identity_pem = read_file("client certificate", cert_path)?;
        identity_pem.push(b'\n');
        identity_pem.extend(read_file("client key", key_path)?);
        let ca_bundle = match tls.ca_path() {
            Some(path) => Some((path, read_file("CA bundle", path)?)),
            None => None,
        };

        let identity = Identity::from_pem(&identity_pem).map_err(ShipperBuildError::Identity)?;
        builder = builder.identity(identity);

        if let Some((path, pem)) = ca_bundle {
            let roots =
                Certificate::from_pem_bundle(&pem).map_err(|source| ShipperBuildError::CaBundle {
                    path: path.to_string(),
                    source,
                })?;
            if roots.is_empty() {
                warn!(path, "CA bundle contains no certificates; server verification will fail");
            }
            builder = builder.tls_built_in_root_certs(false);
            for root in roots {
                builder = builder.add_root_certificate(root);
            }
        }

        if tls.insecure_skip_verify {
            warn!("TLS server certificate verification is disabled; do not use this in production");
            builder = builder.danger_accept_invalid_certs(true);
        }

        info!(cert = cert_path, ca = tls.ca_path().unwrap_or("<built-in>"), "TLS client identity loaded");
    }

    builder.build().map_err(ShipperBuildError::Client)
}

fn read_file(kind: &'static str, path: &str) -> Result<Vec<u8>, ShipperBuildError> {
    fs::read(path).map_err(|source| ShipperBuildError::ReadFile {
        kind,
        path: path.to_string(),
        source,
    })
}
