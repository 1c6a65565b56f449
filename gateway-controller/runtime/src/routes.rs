//! The route reconcilers. One design, two instantiations: the HTTPRoute and
//! GRPCRoute controllers share this module, the syncer, and the status
//! writer.

use crate::{mappers, mappers::SeenGenerations, Error, Stores};
use futures::StreamExt;
use kube::{
    runtime::{controller::Action, reflector::Store, watcher, Controller},
    Api,
};
use pingora_gateway_controller_core::ParentBindings;
use pingora_gateway_controller_k8s_api::{
    gateway::Gateway,
    grpcroute::GrpcRoute,
    httproute::HttpRoute,
    pingora::PingoraConfig,
    referencegrant::ReferenceGrant,
    Client, ListParams, ResourceExt, Secret,
};
use pingora_gateway_controller_k8s_index::{routes::is_route_accepted, BindingValidator, ClusterInfo};
use pingora_gateway_controller_k8s_status::RouteStatusWriter;
use pingora_gateway_controller_sync::{RouteSyncer, SnapshotRoutes};
use std::{
    marker::PhantomData,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

/// Requeue delay while the startup sync has not completed.
const STARTUP_PENDING_REQUEUE: Duration = Duration::from_secs(1);

/// A route kind this runtime drives end to end.
pub trait RuntimeRoute: SnapshotRoutes {
    fn store(stores: &Stores) -> Store<Self>;
}

impl RuntimeRoute for HttpRoute {
    fn store(stores: &Stores) -> Store<Self> {
        stores.http_routes.clone()
    }
}

impl RuntimeRoute for GrpcRoute {
    fn store(stores: &Stores) -> Store<Self> {
        stores.grpc_routes.clone()
    }
}

pub struct RouteCtx<R> {
    pub client: Client,
    pub info: Arc<ClusterInfo>,
    pub syncer: Arc<RouteSyncer>,
    pub status: Arc<RouteStatusWriter>,
    pub validator: BindingValidator,

    // Set exactly once, by the startup sync; reconciles spin with a short
    // requeue until then so incremental updates cannot race the first full
    // push.
    started: Arc<AtomicBool>,

    _kind: PhantomData<fn() -> R>,
}

impl<R> RouteCtx<R> {
    pub fn new(
        client: Client,
        info: Arc<ClusterInfo>,
        syncer: Arc<RouteSyncer>,
        status: Arc<RouteStatusWriter>,
    ) -> Self {
        Self {
            validator: BindingValidator::new(client.clone()),
            client,
            info,
            syncer,
            status,
            started: Arc::new(AtomicBool::new(false)),
            _kind: PhantomData,
        }
    }
}

pub async fn reconcile<R: RuntimeRoute>(
    route: Arc<R>,
    ctx: Arc<RouteCtx<R>>,
) -> Result<Action, Error> {
    if !ctx.started.load(Ordering::SeqCst) {
        return Ok(Action::requeue(STARTUP_PENDING_REQUEUE));
    }

    if !is_route_accepted(
        &ctx.client,
        &ctx.validator,
        &ctx.info.gateway_class_name,
        route.as_ref(),
    )
    .await
    {
        return Ok(Action::await_change());
    }

    tracing::info!(
        route = %format!("{}/{}", route.namespace().unwrap_or_default(), route.name_any()),
        kind = %R::KIND,
        "reconciling route",
    );

    sync_and_update_status(&ctx).await
}

fn error_policy<R: RuntimeRoute>(_route: Arc<R>, error: &Error, _ctx: Arc<RouteCtx<R>>) -> Action {
    tracing::warn!(%error, kind = %R::KIND, "route reconcile failed");
    Action::requeue(Duration::from_secs(5))
}

/// One full sync followed by a status write for every route of this kind in
/// the snapshot. Used by normal reconciles, the startup sync, and the
/// deletion watcher.
async fn sync_and_update_status<R: RuntimeRoute>(ctx: &RouteCtx<R>) -> Result<Action, Error> {
    let outcome = ctx.syncer.sync_all().await;
    let sync_error = outcome.error.as_ref().map(|error| format!("{error:#}"));

    let mut status_error = None;
    if let Some(snapshot) = &outcome.snapshot {
        let bindings_by_route = R::bindings(snapshot);
        let no_bindings = ParentBindings::new();

        for route in R::routes(snapshot) {
            let namespace = route.namespace().unwrap_or_default();
            let name = route.name_any();
            let key = format!("{}/{}", namespace, name);
            let bindings = bindings_by_route.get(&key).unwrap_or(&no_bindings);

            if let Err(error) = ctx
                .status
                .write::<R>(&namespace, &name, bindings, sync_error.as_deref())
                .await
            {
                tracing::error!(
                    route = %key,
                    error = %format!("{error:#}"),
                    "failed to update route status",
                );
                if status_error.is_none() {
                    status_error = Some(error);
                }
            }
        }
    }

    // A push failure without an explicit requeue is not retriable; the route
    // statuses already carry it.
    if outcome.error.is_some() && outcome.requeue_after.is_none() {
        return Ok(Action::await_change());
    }

    if let Some(error) = status_error {
        return Err(Error::Status(error));
    }

    if let Some(delay) = outcome.requeue_after {
        return Ok(Action::requeue(delay));
    }

    Ok(Action::await_change())
}

/// The startup barrier: one full sync before the reconcile loop does real
/// work. The flag flips whether or not the sync succeeded, so a dead proxy
/// cannot wedge the controller.
pub fn spawn_startup_sync<R: RuntimeRoute>(ctx: Arc<RouteCtx<R>>) {
    tokio::spawn(async move {
        tracing::info!(kind = %R::KIND, "performing startup sync of Pingora configuration");
        match sync_and_update_status(&ctx).await {
            Ok(_) => tracing::info!(kind = %R::KIND, "startup sync completed"),
            Err(error) => {
                tracing::error!(kind = %R::KIND, %error, "startup sync failed");
            }
        }
        ctx.started.store(true, Ordering::SeqCst);
    });
}

/// Deletions do not reach the reconciler (no finalizers are used), so a
/// dedicated watch triggers the full re-sync that drops the route from the
/// proxy table.
pub fn spawn_deletion_watcher<R: RuntimeRoute>(ctx: Arc<RouteCtx<R>>) {
    tokio::spawn(async move {
        let api = Api::<R>::all(ctx.client.clone());
        let mut stream = watcher(api, watcher::Config::default()).boxed();

        while let Some(event) = stream.next().await {
            match event {
                Ok(watcher::Event::Deleted(route)) => {
                    tracing::info!(
                        route = %format!(
                            "{}/{}",
                            route.namespace().unwrap_or_default(),
                            route.name_any(),
                        ),
                        kind = %R::KIND,
                        "route deleted, triggering full sync",
                    );
                    if let Err(error) = sync_and_update_status(&ctx).await {
                        tracing::warn!(%error, kind = %R::KIND, "post-deletion sync failed");
                    }
                }
                Ok(_) => {}
                Err(error) => {
                    tracing::warn!(%error, kind = %R::KIND, "route watch error");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    });
}

pub async fn run<R: RuntimeRoute>(ctx: Arc<RouteCtx<R>>, stores: Stores, secret_namespace: String) {
    let routes = Api::<R>::all(ctx.client.clone());
    let gateways = Api::<Gateway>::all(ctx.client.clone());
    let configs = Api::<PingoraConfig>::all(ctx.client.clone());
    let secrets = Api::<Secret>::all(ctx.client.clone());
    let grants = Api::<ReferenceGrant>::all(ctx.client.clone());

    let class_name = ctx.info.gateway_class_name.clone();

    let gateway_mapper = {
        let route_store = R::store(&stores);
        let class_name = class_name.clone();
        move |gateway: Gateway| {
            mappers::routes_for_gateway(&gateway, &class_name, &route_store.state())
        }
    };

    let config_mapper = {
        let route_store = R::store(&stores);
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
            mappers::routes_attached_to_class(
                &route_store.state(),
                &gateway_store.state(),
                &class_name,
            )
        }
    };

    let secret_mapper = {
        let route_store = R::store(&stores);
        let gateway_store = stores.gateways.clone();
        let class_store = stores.gateway_classes.clone();
        let config_store = stores.configs.clone();
        let class_name = class_name.clone();
        move |secret: Secret| {
            let gateway_class = match class_store
                .get(&kube::runtime::reflector::ObjectRef::new(&class_name))
            {
                Some(gateway_class) => gateway_class,
                None => return Vec::new(),
            };
            let parameters_ref = match &gateway_class.spec.parameters_ref {
                Some(parameters_ref) => parameters_ref,
                None => return Vec::new(),
            };
            let config = match config_store
                .get(&kube::runtime::reflector::ObjectRef::new(&parameters_ref.name))
            {
                Some(config) => config,
                None => return Vec::new(),
            };
            if !mappers::secret_matches_config(&secret, &config, &secret_namespace) {
                return Vec::new();
            }
            mappers::routes_attached_to_class(
                &route_store.state(),
                &gateway_store.state(),
                &class_name,
            )
        }
    };

    let grant_mapper = {
        let route_store = R::store(&stores);
        let gateway_store = stores.gateways.clone();
        let class_name = class_name.clone();
        move |grant: ReferenceGrant| {
            mappers::routes_for_reference_grant(
                &grant.namespace().unwrap_or_default(),
                &route_store.state(),
                &gateway_store.state(),
                &class_name,
            )
        }
    };

    // Listing up front surfaces a missing CRD as a startup failure instead
    // of a silent dead watch.
    if let Err(error) = routes.list(&ListParams::default().limit(1)).await {
        tracing::error!(%error, kind = %R::KIND, "cannot list route resources");
    }

    Controller::new(routes, watcher::Config::default())
        .shutdown_on_signal()
        .watches(gateways, watcher::Config::default(), gateway_mapper)
        .watches(configs, watcher::Config::default(), config_mapper)
        .watches(secrets, watcher::Config::default(), secret_mapper)
        .watches(grants, watcher::Config::default(), grant_mapper)
        .run(reconcile, error_policy, ctx)
        .filter_map(|result| async move { result.ok() })
        .for_each(|_| futures::future::ready(()))
        .await;
}
