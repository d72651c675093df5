//! TLS client setup for direct samples.

use rustls_pki_types::ServerName;
use std::sync::{Arc, OnceLock};
use tokio::net::TcpStream;
use tokio_rustls::{client::TlsStream, TlsConnector};

/// Source of rustls client configuration.
pub trait TlsProvider: Send + Sync {
    fn client_config(&self) -> Arc<rustls::ClientConfig>;

    fn connector(&self) -> TlsConnector {
        TlsConnector::from(self.client_config())
    }
}

/// Provider trusting the Mozilla root set from webpki-roots.
#[derive(Default)]
pub struct RustlsTlsProvider;

impl TlsProvider for RustlsTlsProvider {
    fn client_config(&self) -> Arc<rustls::ClientConfig> {
        create_tls_config()
    }
}

static TLS_CONFIG: OnceLock<Arc<rustls::ClientConfig>> = OnceLock::new();

/// Shared client configuration: webpki roots, no client auth, TLS 1.2/1.3.
///
/// Built once; every direct sample pays for a fresh handshake but not for
/// re-parsing the root store.
pub fn create_tls_config() -> Arc<rustls::ClientConfig> {
    TLS_CONFIG
        .get_or_init(|| {
            let root_store =
                rustls::RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

            Arc::new(
                rustls::ClientConfig::builder()
                    .with_root_certificates(root_store)
                    .with_no_client_auth(),
            )
        })
        .clone()
}

/// Runs a TLS handshake for `server_name` over an established TCP stream.
pub async fn connect_tls<P: TlsProvider + ?Sized>(
    provider: &P,
    tcp_stream: TcpStream,
    server_name: &str,
) -> Result<TlsStream<TcpStream>, String> {
    let server_name = ServerName::try_from(server_name.to_string())
        .map_err(|e| format!("Invalid server name: {}", e))?;

    provider
        .connector()
        .connect(server_name, tcp_stream)
        .await
        .map_err(|e| format!("TLS handshake failed: {}", e))
}
