//! The Gateway reconciler: resolves the proxy connection parameters and
//! publishes Gateway status.

use crate::{mappers, mappers::SeenGenerations, Error, Stores};
use futures::StreamExt;
use kube::{
    runtime::{controller::Action, watcher, Controller},
    Api,
};
use pingora_gateway_controller_k8s_api::{
    gateway::{Gateway, GatewayClass},
    pingora::PingoraConfig,
    Client, ResourceExt,
};
use pingora_gateway_controller_k8s_index::ClusterInfo;
use pingora_gateway_controller_k8s_status::GatewayStatusWriter;
use pingora_gateway_controller_sync::ConfigResolver;
use std::{sync::Arc, time::Duration};

/// Requeue delay when the PingoraConfig cannot be resolved.
const CONFIG_ERROR_REQUEUE: Duration = Duration::from_secs(30);

pub struct GatewayCtx {
    pub client: Client,
    pub info: Arc<ClusterInfo>,
    pub resolver: ConfigResolver,
    pub status: GatewayStatusWriter,
}

pub async fn reconcile(gateway: Arc<Gateway>, ctx: Arc<GatewayCtx>) -> Result<Action, Error> {
    if gateway.spec.gateway_class_name != ctx.info.gateway_class_name {
        return Ok(Action::await_change());
    }

    tracing::info!(
        gateway = %gateway.name_any(),
        namespace = %gateway.namespace().unwrap_or_default(),
        "reconciling gateway",
    );

    let resolved = match ctx
        .resolver
        .resolve_from_class_name(&ctx.info.gateway_class_name)
        .await
    {
        Ok(resolved) => resolved,
        Err(error) => {
            tracing::error!(
                error = %format!("{error:#}"),
                "failed to resolve config from PingoraConfig",
            );
            if let Err(status_error) = ctx
                .status
                .write_config_error(&gateway, &format!("{error:#}"))
                .await
            {
                tracing::error!(
                    error = %format!("{status_error:#}"),
                    "failed to update gateway status",
                );
            }
            return Ok(Action::requeue(CONFIG_ERROR_REQUEUE));
        }
    };

    // A Gateway on its way out needs no status; the route reconcilers pick
    // up the deletion cascade.
    if gateway.metadata.deletion_timestamp.is_some() {
        return Ok(Action::await_change());
    }

    ctx.status
        .write_ready(&gateway, &resolved.address)
        .await
        .map_err(Error::Status)?;

    Ok(Action::await_change())
}

fn error_policy(_gateway: Arc<Gateway>, error: &Error, _ctx: Arc<GatewayCtx>) -> Action {
    tracing::warn!(%error, "gateway reconcile failed");
    Action::requeue(Duration::from_secs(5))
}

pub async fn run(ctx: GatewayCtx, stores: Stores) {
    let gateways = Api::<Gateway>::all(ctx.client.clone());
    let gateway_classes = Api::<GatewayClass>::all(ctx.client.clone());
    let configs = Api::<PingoraConfig>::all(ctx.client.clone());

    let class_name = ctx.info.gateway_class_name.clone();

    let class_mapper = {
        let gateway_store = stores.gateways.clone();
        let class_name = class_name.clone();
        move |gateway_class: GatewayClass| {
            if gateway_class.name_any() != class_name {
                return Vec::new();
            }
            mappers::gateways_for_class(&gateway_store.state(), &class_name)
        }
    };

    let config_mapper = {
        let gateway_store = stores.gateways.clone();
        let class_store = stores.gateway_classes.clone();
        let class_name = class_name.clone();
        let seen = Arc::new(SeenGenerations::default());
        move |config: PingoraConfig| {
            if !seen.changed(&config.name_any(), config.metadata.generation) {
                return Vec::new();
            }
            let gateway_class = match class_store
                .get(&kube::runtime::reflector::ObjectRef::new(&class_name))
            {
                Some(gateway_class) => gateway_class,
                None => return Vec::new(),
            };
            if !mappers::config_matches_class(&config, &gateway_class) {
                return Vec::new();
            }
            mappers::gateways_for_class(&gateway_store.state(), &class_name)
        }
    };

    Controller::new(gateways, watcher::Config::default())
        .shutdown_on_signal()
        .watches(gateway_classes, watcher::Config::default(), class_mapper)
        .watches(configs, watcher::Config::default(), config_mapper)
        .run(reconcile, error_policy, Arc::new(ctx))
        .filter_map(|result| async move { result.ok() })
        .for_each(|_| futures::future::ready(()))
        .await;
}
