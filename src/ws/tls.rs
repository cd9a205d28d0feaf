//! TLS context construction for feed connections

use native_tls::{Protocol, TlsConnector};
use tokio_tungstenite::Connector;
use tracing::warn;

/// Build the TLS configuration for one connection attempt. Pinning the
/// minimum protocol to TLS 1.0 keeps the two legacy SSL versions disabled on
/// every backend; key exchange is ephemeral per session with the modern
/// stacks, so no extra switch is needed for that. Returns `None` on
/// construction failure so the caller falls back to the transport's default
/// context — a degraded connection attempt beats none.
pub(crate) fn build_connector() -> Option<Connector> {
    match TlsConnector::builder()
        .min_protocol_version(Some(Protocol::Tlsv10))
        .build()
    {
        Ok(connector) => Some(Connector::NativeTls(connector)),
        Err(e) => {
            warn!(error = %e, "failed to build TLS context, using default");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connector_builds_on_this_platform() {
        assert!(build_connector().is_some());
    }
}
