//! Per-parent route status: the `Accepted` and `ResolvedRefs` conditions on
//! HTTPRoute and GRPCRoute resources.

use crate::{conditions, retry};
use anyhow::{Context, Result};
use chrono::Utc;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::Api;
use pingora_gateway_controller_core::{BindingReason, BindingResult, ParentBindings};
use pingora_gateway_controller_k8s_api::{
    gateway::Gateway,
    Client, ParentReference, PostParams, ResourceExt, RouteParentStatus,
};
use pingora_gateway_controller_k8s_index::{
    routes::{parent_gateway_namespace, parent_ref_is_gateway},
    ClusterInfo, GatewayRoute,
};
use std::sync::Arc;

const ROUTE_ACCEPTED_MESSAGE: &str = "Route accepted and programmed in Pingora proxy";
const RESOLVED_REFS_MESSAGE: &str = "References resolved";
const REASON_RESOLVED_REFS: &str = "ResolvedRefs";

/// Writes `status.parents` on a route, rebuilding it from the route's
/// parentRefs under a conflict-retry loop.
pub struct RouteStatusWriter {
    client: Client,
    info: Arc<ClusterInfo>,
}

impl RouteStatusWriter {
    pub fn new(client: Client, info: Arc<ClusterInfo>) -> Self {
        Self { client, info }
    }

    /// Rebuilds and writes the route's parent statuses. `bindings` carries
    /// the per-parent-index results from the last sync; `sync_error`
    /// overrides every parent's `Accepted` condition with `Pending`.
    pub async fn write<R: GatewayRoute>(
        &self,
        namespace: &str,
        name: &str,
        bindings: &ParentBindings,
        sync_error: Option<&str>,
    ) -> Result<()> {
        let api = Api::<R>::namespaced(self.client.clone(), namespace);

        retry::on_conflict(|| {
            let api = api.clone();
            async move { self.write_once(&api, name, bindings, sync_error).await }
        })
        .await
        .with_context(|| format!("failed to update {} status for {}/{}", R::KIND, namespace, name))
    }

    async fn write_once<R: GatewayRoute>(
        &self,
        api: &Api<R>,
        name: &str,
        bindings: &ParentBindings,
        sync_error: Option<&str>,
    ) -> Result<(), kube::Error> {
        // A route deleted mid-flight has no status to write.
        let mut fresh = match api.get_opt(name).await? {
            Some(route) => route,
            None => return Ok(()),
        };

        let route_namespace = fresh.namespace().unwrap_or_default();
        let generation = fresh.meta().generation;
        let now = Time(Utc::now());

        let mut parents = Vec::new();

        for (index, parent_ref) in fresh.parent_refs().iter().enumerate() {
            if !parent_ref_is_gateway(parent_ref) {
                continue;
            }

            let gateway_namespace = parent_gateway_namespace(&route_namespace, parent_ref);
            let gateway = match Api::<Gateway>::namespaced(self.client.clone(), gateway_namespace)
                .get_opt(&parent_ref.name)
                .await?
            {
                Some(gateway) => gateway,
                None => continue,
            };

            if gateway.spec.gateway_class_name != self.info.gateway_class_name {
                continue;
            }

            let (accepted, reason, message) =
                accepted_condition_parts(bindings.get(&index), sync_error);

            let status_ref = ParentReference {
                group: parent_ref.group.clone(),
                kind: parent_ref.kind.clone(),
                namespace: Some(gateway_namespace.to_string()),
                name: parent_ref.name.clone(),
                section_name: parent_ref.section_name.clone(),
                port: None,
            };

            let mut conditions = vec![
                conditions::condition(
                    conditions::CONDITION_ACCEPTED,
                    accepted,
                    reason,
                    &message,
                    generation,
                    now.clone(),
                ),
                conditions::condition(
                    conditions::CONDITION_RESOLVED_REFS,
                    true,
                    REASON_RESOLVED_REFS,
                    RESOLVED_REFS_MESSAGE,
                    generation,
                    now.clone(),
                ),
            ];

            if let Some(previous) = fresh
                .status_parents()
                .iter()
                .find(|p| p.parent_ref == status_ref)
            {
                conditions::preserve_transition_times(&mut conditions, &previous.conditions);
            }

            parents.push(RouteParentStatus {
                parent_ref: status_ref,
                controller_name: self.info.controller_name.clone(),
                conditions,
            });
        }

        // Rewriting an identical status would only churn the API server and
        // re-trigger our own watch.
        if fresh.status_parents() == parents.as_slice() {
            return Ok(());
        }

        fresh.set_status_parents(parents);
        let data = serde_json::to_vec(&fresh).map_err(kube::Error::SerdeError)?;
        api.replace_status(name, &PostParams::default(), data)
            .await?;
        Ok(())
    }
}

/// The `Accepted` condition for one parent: a sync error forces `Pending`, a
/// rejected binding carries its own reason, anything else is accepted.
fn accepted_condition_parts(
    binding: Option<&BindingResult>,
    sync_error: Option<&str>,
) -> (bool, &'static str, String) {
    if let Some(error) = sync_error {
        return (false, BindingReason::Pending.as_str(), error.to_string());
    }

    if let Some(result) = binding {
        if !result.accepted {
            return (false, result.reason.as_str(), result.message.clone());
        }
    }

    (
        true,
        BindingReason::Accepted.as_str(),
        ROUTE_ACCEPTED_MESSAGE.to_string(),
    )
}
