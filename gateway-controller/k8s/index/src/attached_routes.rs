//! Per-listener attached-route counting for Gateway status.

use crate::{
    routes::{parent_gateway_namespace, parent_ref_is_gateway, GatewayRoute},
    BindingValidator,
};
use kube::Api;
use pingora_gateway_controller_k8s_api::{
    gateway::Gateway,
    grpcroute::GrpcRoute,
    httproute::HttpRoute,
    Client, ListParams, ResourceExt,
};
use std::collections::BTreeMap;

/// Counts, per listener, the (route, parentRef) pairs whose binding was
/// accepted and matched that listener. Both route kinds contribute. A list
/// failure for one kind logs and leaves that kind uncounted rather than
/// failing the reconcile.
pub async fn count_attached_routes(
    client: &Client,
    gateway: &Gateway,
) -> BTreeMap<String, i32> {
    let mut counts: BTreeMap<String, i32> = gateway
        .spec
        .listeners
        .iter()
        .map(|listener| (listener.name.clone(), 0))
        .collect();

    let validator = BindingValidator::new(client.clone());

    count_kind::<HttpRoute>(client, &validator, gateway, &mut counts).await;
    count_kind::<GrpcRoute>(client, &validator, gateway, &mut counts).await;

    counts
}

async fn count_kind<R: GatewayRoute>(
    client: &Client,
    validator: &BindingValidator,
    gateway: &Gateway,
    counts: &mut BTreeMap<String, i32>,
) {
    let routes = match Api::<R>::all(client.clone()).list(&ListParams::default()).await {
        Ok(list) => list.items,
        Err(error) => {
            tracing::warn!(kind = %R::KIND, %error, "failed to list routes for attached count");
            return;
        }
    };

    for route in &routes {
        let route_namespace = route.namespace().unwrap_or_default();

        for parent_ref in route.parent_refs() {
            if !parent_ref_is_gateway(parent_ref) {
                continue;
            }
            if !ref_matches_gateway(parent_ref, gateway, &route_namespace) {
                continue;
            }

            let info = route.route_info(parent_ref.section_name.clone());
            match validator.validate_binding(gateway, &info).await {
                Ok(result) if result.accepted => {
                    for listener in &result.matched_listeners {
                        if let Some(count) = counts.get_mut(listener) {
                            *count += 1;
                        }
                    }
                }
                Ok(_) => {}
                Err(error) => {
                    tracing::warn!(
                        route = %format!("{}/{}", info.namespace, info.name),
                        %error,
                        "failed to validate binding while counting attached routes",
                    );
                }
            }
        }
    }
}

fn ref_matches_gateway(
    parent_ref: &pingora_gateway_controller_k8s_api::ParentReference,
    gateway: &Gateway,
    route_namespace: &str,
) -> bool {
    if parent_ref.name != gateway.name_any() {
        return false;
    }

    parent_gateway_namespace(route_namespace, parent_ref)
        == gateway.namespace().unwrap_or_default()
}
