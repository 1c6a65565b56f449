//! Resolution of the proxy connection parameters from the GatewayClass
//! parametersRef chain: GatewayClass → PingoraConfig → credential Secret.

use anyhow::{bail, Context, Result};
use kube::Api;
use pingora_gateway_controller_grpc::{ConnectOptions, TlsOptions};
use pingora_gateway_controller_k8s_api::{
    gateway::GatewayClass,
    pingora::{PingoraConfig, PINGORA_CONFIG_GROUP, PINGORA_CONFIG_KIND},
    Client, ResourceExt, Secret,
};
use std::time::Duration;

/// Everything resolved from a PingoraConfig and its credential secret.
#[derive(Clone, Debug)]
pub struct ResolvedProxyConfig {
    pub address: String,

    pub tls_enabled: bool,
    pub tls_cert: Option<Vec<u8>>,
    pub tls_key: Option<Vec<u8>>,
    pub tls_ca: Option<Vec<u8>>,
    pub tls_insecure_skip_verify: bool,
    pub tls_server_name: Option<String>,

    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub keepalive_time: Duration,
    pub max_retries: i32,
    pub retry_backoff: Duration,

    /// Name of the source PingoraConfig, for watches and status writes.
    pub config_name: String,
}

impl ResolvedProxyConfig {
    pub fn connect_options(&self) -> ConnectOptions {
        let tls = self.tls_enabled.then(|| TlsOptions {
            identity: match (&self.tls_cert, &self.tls_key) {
                (Some(cert), Some(key)) => Some((cert.clone(), key.clone())),
                _ => None,
            },
            ca: self.tls_ca.clone(),
            server_name: self.tls_server_name.clone(),
        });

        ConnectOptions {
            address: self.address.clone(),
            tls,
            connect_timeout: self.connect_timeout,
            request_timeout: self.request_timeout,
            keepalive_interval: self.keepalive_time,
        }
    }
}

/// Resolves PingoraConfig from a GatewayClass parametersRef.
pub struct ConfigResolver {
    client: Client,
    default_namespace: String,
}

impl ConfigResolver {
    pub fn new(client: Client, default_namespace: String) -> Self {
        Self {
            client,
            default_namespace,
        }
    }

    pub async fn resolve_from_class_name(
        &self,
        gateway_class_name: &str,
    ) -> Result<ResolvedProxyConfig> {
        let gateway_class = Api::<GatewayClass>::all(self.client.clone())
            .get(gateway_class_name)
            .await
            .with_context(|| format!("failed to get GatewayClass {}", gateway_class_name))?;

        self.resolve_from_class(&gateway_class).await
    }

    pub async fn resolve_from_class(
        &self,
        gateway_class: &GatewayClass,
    ) -> Result<ResolvedProxyConfig> {
        let config = self.config_for_class(gateway_class).await?;
        self.resolve_config(&config).await
    }

    /// The PingoraConfig a GatewayClass points at, with the parametersRef
    /// group and kind validated.
    pub async fn config_for_class(&self, gateway_class: &GatewayClass) -> Result<PingoraConfig> {
        let parameters_ref = gateway_class
            .spec
            .parameters_ref
            .as_ref()
            .context("GatewayClass has no parametersRef")?;

        if parameters_ref.group != PINGORA_CONFIG_GROUP {
            bail!(
                "unsupported parametersRef group: {} (expected {})",
                parameters_ref.group,
                PINGORA_CONFIG_GROUP
            );
        }
        if parameters_ref.kind != PINGORA_CONFIG_KIND {
            bail!(
                "unsupported parametersRef kind: {} (expected {})",
                parameters_ref.kind,
                PINGORA_CONFIG_KIND
            );
        }

        Api::<PingoraConfig>::all(self.client.clone())
            .get(&parameters_ref.name)
            .await
            .with_context(|| format!("failed to get PingoraConfig {}", parameters_ref.name))
    }

    async fn resolve_config(&self, config: &PingoraConfig) -> Result<ResolvedProxyConfig> {
        if config.spec.address.is_empty() {
            bail!("address is required in PingoraConfig");
        }

        let mut resolved = ResolvedProxyConfig {
            address: config.spec.address.clone(),
            tls_enabled: config.spec.tls_enabled(),
            tls_cert: None,
            tls_key: None,
            tls_ca: None,
            tls_insecure_skip_verify: false,
            tls_server_name: None,
            connect_timeout: Duration::from_secs(config.spec.connect_timeout_seconds() as u64),
            request_timeout: Duration::from_secs(config.spec.request_timeout_seconds() as u64),
            keepalive_time: Duration::from_secs(config.spec.keepalive_time_seconds() as u64),
            max_retries: config.spec.max_retries(),
            retry_backoff: Duration::from_millis(config.spec.retry_backoff_ms() as u64),
            config_name: config.name_any(),
        };

        if let Some(tls) = config.spec.tls.as_ref().filter(|tls| tls.enabled) {
            resolved.tls_insecure_skip_verify = tls.insecure_skip_verify;
            resolved.tls_server_name = tls.server_name.clone();

            if let Some(secret_ref) = &tls.secret_ref {
                let secret = self
                    .get_secret(&secret_ref.name, secret_ref.namespace.as_deref())
                    .await
                    .context("failed to get TLS secret")?;

                let data = secret.data.unwrap_or_default();
                resolved.tls_cert = data.get("tls.crt").map(|b| b.0.clone());
                resolved.tls_key = data.get("tls.key").map(|b| b.0.clone());
                resolved.tls_ca = data.get("ca.crt").map(|b| b.0.clone());
            }
        }

        Ok(resolved)
    }

    async fn get_secret(&self, name: &str, namespace: Option<&str>) -> Result<Secret> {
        let namespace = namespace.unwrap_or(&self.default_namespace);
        Api::<Secret>::namespaced(self.client.clone(), namespace)
            .get(name)
            .await
            .with_context(|| format!("failed to get secret {}/{}", namespace, name))
    }
}
