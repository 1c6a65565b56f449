//! PingoraConfig status: connection state, last sync time and the applied
//! version.

use crate::{conditions, retry};
use anyhow::{Context, Result};
use chrono::Utc;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::Api;
use pingora_gateway_controller_k8s_api::{
    pingora::PingoraConfig,
    Client, PostParams, Resource,
};

const REASON_SYNCED: &str = "Synced";
const REASON_SYNC_FAILED: &str = "SyncFailed";

pub struct ConfigStatusWriter {
    client: Client,
}

impl ConfigStatusWriter {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Records the outcome of one push attempt on the active PingoraConfig.
    /// On success the sync time and version advance; on failure only the
    /// connection state and Ready condition change.
    pub async fn record_push(
        &self,
        config_name: &str,
        version: u64,
        error: Option<&str>,
    ) -> Result<()> {
        let api = Api::<PingoraConfig>::all(self.client.clone());

        retry::on_conflict(|| {
            let api = api.clone();
            async move {
                let mut fresh = match api.get_opt(config_name).await? {
                    Some(config) => config,
                    None => return Ok(()),
                };

                let generation = fresh.meta().generation;
                let now = Time(Utc::now());

                let mut status = fresh.status.clone().unwrap_or_default();
                status.connected = error.is_none();
                if error.is_none() {
                    status.last_sync_time = Some(now.clone());
                    status.config_version = version;
                }

                let (reason, message) = match error {
                    None => (REASON_SYNCED, format!("Routes synced at version {}", version)),
                    Some(error) => (REASON_SYNC_FAILED, error.to_string()),
                };
                let mut new_conditions = vec![conditions::condition(
                    conditions::CONDITION_READY,
                    error.is_none(),
                    reason,
                    &message,
                    generation,
                    now,
                )];
                conditions::preserve_transition_times(&mut new_conditions, &status.conditions);
                status.conditions = new_conditions;

                if fresh.status.as_ref() == Some(&status) {
                    return Ok(());
                }

                fresh.status = Some(status);
                let data = serde_json::to_vec(&fresh).map_err(kube::Error::SerdeError)?;
                api.replace_status(config_name, &PostParams::default(), data)
                    .await?;
                Ok(())
            }
        })
        .await
        .with_context(|| format!("failed to update PingoraConfig status for {}", config_name))
    }
}
