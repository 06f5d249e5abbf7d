//! Server module for running Terraform providers
//!
//! Implements the go-plugin side of the handshake: Terraform launches the
//! provider binary with a magic cookie and, when AutoMTLS is on, its own
//! client certificate in `PLUGIN_CLIENT_CERT`. The provider answers with one
//! line on stdout naming the protocol, the listen address and its server
//! certificate.

use crate::error::{Result, TfplugError};
use crate::grpc::GrpcProviderServer;
use crate::proto::ProviderServer;
use crate::provider::Provider;
use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine;
use std::io::Write;
use tonic::transport::{Certificate, Identity, Server, ServerTlsConfig};
use tracing::info;

pub const MAGIC_COOKIE_KEY: &str = "TF_PLUGIN_MAGIC_COOKIE";
pub const MAGIC_COOKIE_VALUE: &str =
    "d602bf8f470bc67ca7faa0386276bbdd4330efaf76d1a219cb4d6991ca9872b2";

const CORE_PROTOCOL_VERSION: u32 = 1;
const PLUGIN_PROTOCOL_VERSION: u32 = 6;

/// Server configuration for running a Terraform provider
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Maximum message size in bytes
    pub max_message_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_message_size: 256 << 20, // 256MB
        }
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }
}

/// Fails unless the process was started by Terraform
pub fn check_magic_cookie() -> Result<()> {
    match std::env::var(MAGIC_COOKIE_KEY) {
        Ok(value) if value == MAGIC_COOKIE_VALUE => Ok(()),
        _ => Err(TfplugError::HandshakeError(
            "This binary is a plugin. These are not meant to be executed directly. \
             Please execute the program that consumes these plugins, which will \
             load any plugins automatically"
                .to_string(),
        )),
    }
}

/// Self-signed server certificate for AutoMTLS
struct ServerCertificate {
    cert_pem: String,
    key_pem: String,
    cert_der: Vec<u8>,
}

fn generate_certificate() -> Result<ServerCertificate> {
    let certified = rcgen::generate_simple_self_signed(vec!["localhost".to_string()])
        .map_err(|e| TfplugError::TlsError(format!("certificate generation failed: {}", e)))?;

    Ok(ServerCertificate {
        cert_pem: certified.cert.pem(),
        key_pem: certified.key_pair.serialize_pem(),
        cert_der: certified.cert.der().to_vec(),
    })
}

/// The line go-plugin expects on stdout
pub fn handshake_line(port: u16, server_cert_der: Option<&[u8]>) -> String {
    let mut line = format!(
        "{}|{}|tcp|127.0.0.1:{}|grpc",
        CORE_PROTOCOL_VERSION, PLUGIN_PROTOCOL_VERSION, port
    );
    if let Some(der) = server_cert_der {
        line.push('|');
        line.push_str(&STANDARD_NO_PAD.encode(der));
    }
    line
}

/// Main entry point for running a provider
pub async fn serve<P: Provider + 'static>(provider: P, config: ServerConfig) -> Result<()> {
    check_magic_cookie()?;

    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let grpc_server = GrpcProviderServer::new(provider);
    let provider_service = ProviderServer::new(grpc_server)
        .max_decoding_message_size(config.max_message_size)
        .max_encoding_message_size(config.max_message_size);

    let mut builder = Server::builder();
    let mut server_cert_der = None;

    // AutoMTLS is on whenever Terraform hands us its client certificate
    if let Ok(client_cert) = std::env::var("PLUGIN_CLIENT_CERT") {
        let cert = generate_certificate()?;
        let tls_config = ServerTlsConfig::new()
            .identity(Identity::from_pem(&cert.cert_pem, &cert.key_pem))
            .client_ca_root(Certificate::from_pem(client_cert));
        builder = builder
            .tls_config(tls_config)
            .map_err(|e| TfplugError::TlsError(e.to_string()))?;
        server_cert_der = Some(cert.cert_der);
    }

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();

    let mut stdout = std::io::stdout();
    writeln!(stdout, "{}", handshake_line(port, server_cert_der.as_deref()))?;
    stdout.flush()?;

    info!(port, tls = server_cert_der.is_some(), "provider server listening");

    let incoming = tokio_stream::wrappers::TcpListenerStream::new(listener);
    // Terraform stops plugins through StopProvider and then kills the
    // process, so interrupts are not treated as a shutdown request
    builder
        .add_service(provider_service)
        .serve_with_incoming(incoming)
        .await?;

    Ok(())
}

/// Convenience function to run a provider with default configuration
pub async fn serve_default<P: Provider + 'static>(provider: P) -> Result<()> {
    serve(provider, ServerConfig::default()).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handshake_line_without_tls() {
        assert_eq!(handshake_line(4242, None), "1|6|tcp|127.0.0.1:4242|grpc");
    }

    #[test]
    fn handshake_line_carries_unpadded_certificate() {
        let line = handshake_line(1, Some(&[1, 2, 3, 4]));
        assert_eq!(line, "1|6|tcp|127.0.0.1:1|grpc|AQIDBA");
    }

    #[test]
    fn generated_certificate_is_pem() {
        let cert = generate_certificate().unwrap();
        assert!(cert.cert_pem.starts_with("-----BEGIN CERTIFICATE-----"));
        assert!(cert.key_pem.contains("PRIVATE KEY"));
        assert!(!cert.cert_der.is_empty());
    }
}
