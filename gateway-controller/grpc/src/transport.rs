use crate::proto::routing_service_client::RoutingServiceClient;
use std::time::Duration;
use tonic::transport::{Certificate, Channel, ClientTlsConfig, Endpoint, Identity};

/// Everything needed to dial the proxy's control channel.
#[derive(Clone, Debug)]
pub struct ConnectOptions {
    /// "host:port" of the proxy's gRPC endpoint.
    pub address: String,
    pub tls: Option<TlsOptions>,
    pub connect_timeout: Duration,
    /// Per-request deadline applied to every RPC on the channel.
    pub request_timeout: Duration,
    pub keepalive_interval: Duration,
}

#[derive(Clone, Debug)]
pub struct TlsOptions {
    /// Client certificate and key PEMs for mutual TLS.
    pub identity: Option<(Vec<u8>, Vec<u8>)>,
    /// CA PEM used to verify the proxy's certificate.
    pub ca: Option<Vec<u8>>,
    /// Overrides the server name used for verification.
    pub server_name: Option<String>,
}

/// Dials the proxy and returns a ready client. The channel carries keepalive
/// pings and a per-request deadline; a dial failure surfaces here rather than
/// on first use.
pub async fn connect(
    opts: &ConnectOptions,
) -> Result<RoutingServiceClient<Channel>, tonic::transport::Error> {
    let scheme = if opts.tls.is_some() { "https" } else { "http" };

    let mut endpoint = Endpoint::from_shared(format!("{}://{}", scheme, opts.address))?
        .connect_timeout(opts.connect_timeout)
        .timeout(opts.request_timeout)
        .http2_keep_alive_interval(opts.keepalive_interval)
        .keep_alive_timeout(opts.connect_timeout)
        .keep_alive_while_idle(true);

    if let Some(tls) = &opts.tls {
        let mut tls_config = ClientTlsConfig::new();
        if let Some(name) = &tls.server_name {
            tls_config = tls_config.domain_name(name.clone());
        }
        if let Some((cert, key)) = &tls.identity {
            tls_config = tls_config.identity(Identity::from_pem(cert, key));
        }
        if let Some(ca) = &tls.ca {
            tls_config = tls_config.ca_certificate(Certificate::from_pem(ca));
        }
        endpoint = endpoint.tls_config(tls_config)?;
    }

    let channel = endpoint.connect().await?;
    Ok(RoutingServiceClient::new(channel))
}
