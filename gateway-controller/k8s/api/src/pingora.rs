use k8s_openapi::apimachinery::pkg::apis::meta::v1::{Condition, Time};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// API group of the PingoraConfig CRD, as referenced by a GatewayClass
/// parametersRef.
pub const PINGORA_CONFIG_GROUP: &str = "pingora.dev";

/// Kind of the PingoraConfig CRD.
pub const PINGORA_CONFIG_KIND: &str = "PingoraConfig";

/// Default gRPC connection tuning values.
pub const DEFAULT_CONNECT_TIMEOUT_SECONDS: i32 = 5;
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: i32 = 30;
pub const DEFAULT_KEEPALIVE_TIME_SECONDS: i32 = 30;
pub const DEFAULT_MAX_RETRIES: i32 = 3;
pub const DEFAULT_RETRY_BACKOFF_MS: i32 = 1000;

/// PingoraConfig tells the controller how to reach the Pingora proxy's
/// control channel. It is cluster-scoped and referenced from a GatewayClass
/// via parametersRef.
#[derive(
    Clone,
    Debug,
    Default,
    kube::CustomResource,
    serde::Deserialize,
    serde::Serialize,
    schemars::JsonSchema,
)]
#[kube(
    group = "pingora.dev",
    version = "v1alpha1",
    kind = "PingoraConfig",
    root = "PingoraConfig",
    status = "PingoraConfigStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct PingoraConfigSpec {
    /// Address of the proxy's gRPC endpoint, "host:port". Required and
    /// non-empty.
    pub address: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection: Option<ConnectionConfig>,
}

/// TLS settings for the gRPC connection to the proxy.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TlsConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Secret holding "tls.crt" and "tls.key", optionally "ca.crt" for
    /// server verification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<SecretReference>,

    #[serde(default)]
    pub insecure_skip_verify: bool,

    /// Overrides the server name used for TLS verification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_name: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecretReference {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect_timeout_seconds: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_seconds: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keepalive_time_seconds: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_backoff_ms: Option<i32>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PingoraConfigStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    /// Whether the controller currently holds a working connection to the
    /// proxy.
    #[serde(default)]
    pub connected: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync_time: Option<Time>,

    /// Last version number pushed to the proxy.
    #[serde(default)]
    pub config_version: u64,
}

impl PingoraConfigSpec {
    pub fn tls_enabled(&self) -> bool {
        self.tls.as_ref().is_some_and(|tls| tls.enabled)
    }

    pub fn connect_timeout_seconds(&self) -> i32 {
        self.connection
            .as_ref()
            .and_then(|c| c.connect_timeout_seconds)
            .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECONDS)
    }

    pub fn request_timeout_seconds(&self) -> i32 {
        self.connection
            .as_ref()
            .and_then(|c| c.request_timeout_seconds)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECONDS)
    }

    pub fn keepalive_time_seconds(&self) -> i32 {
        self.connection
            .as_ref()
            .and_then(|c| c.keepalive_time_seconds)
            .unwrap_or(DEFAULT_KEEPALIVE_TIME_SECONDS)
    }

    pub fn max_retries(&self) -> i32 {
        self.connection
            .as_ref()
            .and_then(|c| c.max_retries)
            .unwrap_or(DEFAULT_MAX_RETRIES)
    }

    pub fn retry_backoff_ms(&self) -> i32 {
        self.connection
            .as_ref()
            .and_then(|c| c.retry_backoff_ms)
            .unwrap_or(DEFAULT_RETRY_BACKOFF_MS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_defaults_apply_when_unset() {
        let spec = PingoraConfigSpec {
            address: "proxy.pingora-system.svc.cluster.local:50051".to_string(),
            ..Default::default()
        };
        assert!(!spec.tls_enabled());
        assert_eq!(spec.connect_timeout_seconds(), 5);
        assert_eq!(spec.request_timeout_seconds(), 30);
        assert_eq!(spec.keepalive_time_seconds(), 30);
        assert_eq!(spec.max_retries(), 3);
        assert_eq!(spec.retry_backoff_ms(), 1000);
    }

    #[test]
    fn connection_overrides_take_precedence() {
        let spec = PingoraConfigSpec {
            address: "proxy:50051".to_string(),
            connection: Some(ConnectionConfig {
                connect_timeout_seconds: Some(2),
                request_timeout_seconds: Some(10),
                keepalive_time_seconds: Some(60),
                max_retries: Some(0),
                retry_backoff_ms: Some(250),
            }),
            ..Default::default()
        };
        assert_eq!(spec.connect_timeout_seconds(), 2);
        assert_eq!(spec.request_timeout_seconds(), 10);
        assert_eq!(spec.keepalive_time_seconds(), 60);
        assert_eq!(spec.max_retries(), 0);
        assert_eq!(spec.retry_backoff_ms(), 250);
    }

    #[test]
    fn tls_enabled_requires_flag() {
        let spec = PingoraConfigSpec {
            address: "proxy:50051".to_string(),
            tls: Some(TlsConfig {
                enabled: false,
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(!spec.tls_enabled());
    }
}
