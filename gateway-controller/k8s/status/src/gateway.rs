//! Gateway status: addresses, top-level conditions, and per-listener
//! statuses with attached-route counts.

use crate::{conditions, retry};
use anyhow::{Context, Result};
use chrono::Utc;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::Api;
use pingora_gateway_controller_k8s_api::{
    gateway::{Gateway, GatewayStatus, GatewayStatusAddress, ListenerStatus},
    Client, PostParams, Resource, ResourceExt, RouteGroupKind, GATEWAY_API_GROUP,
};
use pingora_gateway_controller_k8s_index::count_attached_routes;

const REASON_INVALID_PARAMETERS: &str = "InvalidParameters";
const GATEWAY_ACCEPTED_MESSAGE: &str = "Gateway accepted by Pingora controller";
const GATEWAY_PROGRAMMED_MESSAGE: &str = "Gateway programmed in Pingora proxy";

pub struct GatewayStatusWriter {
    client: Client,
}

impl GatewayStatusWriter {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// The success path: Accepted and Programmed, the proxy address, and one
    /// ListenerStatus per listener with its attached-route count.
    pub async fn write_ready(&self, gateway: &Gateway, proxy_address: &str) -> Result<()> {
        let namespace = gateway.namespace().unwrap_or_default();
        let name = gateway.name_any();
        let api = Api::<Gateway>::namespaced(self.client.clone(), &namespace);

        retry::on_conflict(|| {
            let api = api.clone();
            let name = name.clone();
            async move { self.write_ready_once(&api, &name, proxy_address).await }
        })
        .await
        .with_context(|| format!("failed to update gateway status for {}/{}", namespace, name))
    }

    async fn write_ready_once(
        &self,
        api: &Api<Gateway>,
        name: &str,
        proxy_address: &str,
    ) -> Result<(), kube::Error> {
        let mut fresh = match api.get_opt(name).await? {
            Some(gateway) => gateway,
            None => return Ok(()),
        };

        let generation = fresh.meta().generation;
        let now = Time(Utc::now());
        let attached = count_attached_routes(&self.client, &fresh).await;

        let supported_kinds = vec![
            RouteGroupKind {
                group: Some(GATEWAY_API_GROUP.to_string()),
                kind: "HTTPRoute".to_string(),
            },
            RouteGroupKind {
                group: Some(GATEWAY_API_GROUP.to_string()),
                kind: "GRPCRoute".to_string(),
            },
        ];

        let mut status = GatewayStatus {
            addresses: vec![GatewayStatusAddress {
                r#type: Some("Hostname".to_string()),
                value: proxy_address.to_string(),
            }],
            conditions: vec![
                conditions::condition(
                    conditions::CONDITION_ACCEPTED,
                    true,
                    "Accepted",
                    GATEWAY_ACCEPTED_MESSAGE,
                    generation,
                    now.clone(),
                ),
                conditions::condition(
                    conditions::CONDITION_PROGRAMMED,
                    true,
                    "Programmed",
                    GATEWAY_PROGRAMMED_MESSAGE,
                    generation,
                    now.clone(),
                ),
            ],
            listeners: fresh
                .spec
                .listeners
                .iter()
                .map(|listener| ListenerStatus {
                    name: listener.name.clone(),
                    supported_kinds: supported_kinds.clone(),
                    attached_routes: attached.get(&listener.name).copied().unwrap_or(0),
                    conditions: vec![
                        conditions::condition(
                            conditions::CONDITION_ACCEPTED,
                            true,
                            "Accepted",
                            "Listener accepted",
                            generation,
                            now.clone(),
                        ),
                        conditions::condition(
                            conditions::CONDITION_PROGRAMMED,
                            true,
                            "Programmed",
                            "Listener programmed",
                            generation,
                            now.clone(),
                        ),
                        conditions::condition(
                            conditions::CONDITION_RESOLVED_REFS,
                            true,
                            "ResolvedRefs",
                            "References resolved",
                            generation,
                            now.clone(),
                        ),
                    ],
                })
                .collect(),
        };

        if let Some(previous) = &fresh.status {
            conditions::preserve_transition_times(&mut status.conditions, &previous.conditions);
            for listener_status in status.listeners.iter_mut() {
                if let Some(previous_listener) = previous
                    .listeners
                    .iter()
                    .find(|l| l.name == listener_status.name)
                {
                    conditions::preserve_transition_times(
                        &mut listener_status.conditions,
                        &previous_listener.conditions,
                    );
                }
            }
        }

        if fresh.status.as_ref() == Some(&status) {
            return Ok(());
        }

        fresh.status = Some(status);
        let data = serde_json::to_vec(&fresh).map_err(kube::Error::SerdeError)?;
        api.replace_status(name, &PostParams::default(), data)
            .await?;
        Ok(())
    }

    /// The resolution-failure path: `Accepted=False/InvalidParameters` with
    /// the resolver's error. Addresses and listener statuses are left as
    /// they were.
    pub async fn write_config_error(&self, gateway: &Gateway, error_text: &str) -> Result<()> {
        let namespace = gateway.namespace().unwrap_or_default();
        let name = gateway.name_any();
        let api = Api::<Gateway>::namespaced(self.client.clone(), &namespace);
        let message = format!("Failed to resolve PingoraConfig: {}", error_text);

        retry::on_conflict(|| {
            let api = api.clone();
            let name = name.clone();
            let message = message.clone();
            async move {
                let mut fresh = match api.get_opt(&name).await? {
                    Some(gateway) => gateway,
                    None => return Ok(()),
                };

                let generation = fresh.meta().generation;
                let now = Time(Utc::now());

                let mut conditions = vec![conditions::condition(
                    conditions::CONDITION_ACCEPTED,
                    false,
                    REASON_INVALID_PARAMETERS,
                    &message,
                    generation,
                    now,
                )];

                let mut status = fresh.status.clone().unwrap_or_default();
                conditions::preserve_transition_times(&mut conditions, &status.conditions);
                status.conditions = conditions;

                if fresh.status.as_ref() == Some(&status) {
                    return Ok(());
                }

                fresh.status = Some(status);
                let data = serde_json::to_vec(&fresh).map_err(kube::Error::SerdeError)?;
                api.replace_status(&name, &PostParams::default(), data)
                    .await?;
                Ok(())
            }
        })
        .await
        .with_context(|| format!("failed to update gateway status for {}/{}", namespace, name))
    }
}
