//! The route syncer: collects every relevant route cluster-wide, converts
//! them to the wire model, and pushes the full table to the proxy with a
//! monotonic version. Both route reconcilers drive the same syncer; pushes
//! are strictly serialized.

use crate::{
    builder::RouteTableBuilder,
    channel::{GrpcProxyChannel, ProxyChannel},
    metrics::SyncMetrics,
    resolver::ConfigResolver,
};
use ahash::AHashMap;
use anyhow::{anyhow, Context, Result};
use kube::Api;
use parking_lot::RwLock;
use pingora_gateway_controller_core::ParentBindings;
use pingora_gateway_controller_grpc::proto;
use pingora_gateway_controller_k8s_api::{
    gateway::Gateway,
    grpcroute::GrpcRoute,
    httproute::HttpRoute,
    Client, ListParams, ResourceExt,
};
use pingora_gateway_controller_k8s_index::{
    routes::{parent_gateway_namespace, parent_ref_is_gateway},
    BindingValidator, ClusterInfo, GatewayRoute,
};
use pingora_gateway_controller_k8s_status::ConfigStatusWriter;
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};
use tokio::sync::Mutex;

/// Requeue delay after connection or push failures.
const SYNC_ERROR_REQUEUE: Duration = Duration::from_secs(30);

/// The set of accepted routes that reached the proxy in one push, plus the
/// per-route, per-parent binding results, keyed "<namespace>/<name>".
pub struct SyncSnapshot {
    pub http_routes: Vec<HttpRoute>,
    pub grpc_routes: Vec<GrpcRoute>,
    pub http_bindings: AHashMap<String, ParentBindings>,
    pub grpc_bindings: AHashMap<String, ParentBindings>,
}

/// What one SyncAll produced: the snapshot (when route collection got that
/// far), an explicit requeue delay for retryable failures, and the error to
/// surface in route statuses.
pub struct SyncOutcome {
    pub snapshot: Option<SyncSnapshot>,
    pub requeue_after: Option<Duration>,
    pub error: Option<anyhow::Error>,
}

/// Generic access to one kind's slice of a snapshot.
pub trait SnapshotRoutes: GatewayRoute {
    fn routes(snapshot: &SyncSnapshot) -> &[Self];
    fn bindings(snapshot: &SyncSnapshot) -> &AHashMap<String, ParentBindings>;
}

impl SnapshotRoutes for HttpRoute {
    fn routes(snapshot: &SyncSnapshot) -> &[Self] {
        &snapshot.http_routes
    }

    fn bindings(snapshot: &SyncSnapshot) -> &AHashMap<String, ParentBindings> {
        &snapshot.http_bindings
    }
}

impl SnapshotRoutes for GrpcRoute {
    fn routes(snapshot: &SyncSnapshot) -> &[Self] {
        &snapshot.grpc_routes
    }

    fn bindings(snapshot: &SyncSnapshot) -> &AHashMap<String, ParentBindings> {
        &snapshot.grpc_bindings
    }
}

struct Conn<C> {
    channel: C,
    config_name: String,
}

/// Owns the proxy connection and the version counter. `sync_all` is the only
/// push path and is fully serialized.
pub struct RouteSyncer<C: ProxyChannel = GrpcProxyChannel> {
    client: Client,
    info: Arc<ClusterInfo>,
    resolver: ConfigResolver,
    builder: RouteTableBuilder,
    validator: BindingValidator,
    config_status: ConfigStatusWriter,
    metrics: SyncMetrics,

    // Guards never cross an await; the channel handle is cloned out for the
    // duration of an RPC.
    conn: RwLock<Option<Conn<C>>>,

    // Incremented once per attempted push; failed versions are never
    // reissued.
    version: AtomicU64,

    // Serializes entire sync passes, strictly coarser than `conn`.
    sync_lock: Mutex<()>,
}

impl<C: ProxyChannel> RouteSyncer<C> {
    pub fn new(
        client: Client,
        info: Arc<ClusterInfo>,
        metrics: SyncMetrics,
        secret_namespace: String,
    ) -> Self {
        Self {
            resolver: ConfigResolver::new(client.clone(), secret_namespace),
            builder: RouteTableBuilder::new(info.cluster_domain.clone()),
            validator: BindingValidator::new(client.clone()),
            config_status: ConfigStatusWriter::new(client.clone()),
            metrics,
            client,
            info,
            conn: RwLock::new(None),
            version: AtomicU64::new(0),
            sync_lock: Mutex::new(()),
        }
    }

    /// Resolves the active PingoraConfig and dials the proxy, replacing any
    /// existing connection.
    pub async fn connect(&self) -> Result<()> {
        let resolved = self
            .resolver
            .resolve_from_class_name(&self.info.gateway_class_name)
            .await
            .context("failed to resolve Pingora config")?;

        let channel = C::connect(&resolved.connect_options())
            .await
            .context("failed to create gRPC connection")?;

        *self.conn.write() = Some(Conn {
            channel,
            config_name: resolved.config_name.clone(),
        });

        tracing::info!(address = %resolved.address, "connected to Pingora proxy");
        Ok(())
    }

    pub fn close(&self) {
        *self.conn.write() = None;
    }

    pub fn is_connected(&self) -> bool {
        self.conn.read().is_some()
    }

    /// Name of the PingoraConfig behind the current connection.
    pub fn config_name(&self) -> Option<String> {
        self.conn.read().as_ref().map(|c| c.config_name.clone())
    }

    pub fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    /// Collects all relevant routes, pushes the full table, and returns the
    /// snapshot with per-parent binding results for the status writers.
    pub async fn sync_all(&self) -> SyncOutcome {
        let _guard = self.sync_lock.lock().await;
        let start = Instant::now();

        if !self.is_connected() {
            if let Err(error) = self.connect().await {
                tracing::error!(error = %format!("{error:#}"), "failed to connect to Pingora proxy");
                self.metrics.record_sync_duration("error", start.elapsed());
                self.metrics.record_sync_error("connection_failed");
                return SyncOutcome {
                    snapshot: None,
                    requeue_after: Some(SYNC_ERROR_REQUEUE),
                    error: None,
                };
            }
        }

        let (http_routes, http_bindings) = match self.relevant_routes::<HttpRoute>().await {
            Ok(collected) => collected,
            Err(error) => {
                return SyncOutcome {
                    snapshot: None,
                    requeue_after: None,
                    error: Some(error),
                }
            }
        };
        let (grpc_routes, grpc_bindings) = match self.relevant_routes::<GrpcRoute>().await {
            Ok(collected) => collected,
            Err(error) => {
                return SyncOutcome {
                    snapshot: None,
                    requeue_after: None,
                    error: Some(error),
                }
            }
        };

        tracing::info!(
            http_routes = http_routes.len(),
            grpc_routes = grpc_routes.len(),
            "syncing routes to Pingora",
        );

        let request = proto::UpdateRoutesRequest {
            http_routes: http_routes
                .iter()
                .map(|route| self.builder.build_http_route(route))
                .collect(),
            grpc_routes: grpc_routes
                .iter()
                .map(|route| self.builder.build_grpc_route(route))
                .collect(),
            version: self.version.fetch_add(1, Ordering::SeqCst) + 1,
        };
        let version = request.version;

        let snapshot = SyncSnapshot {
            http_routes,
            grpc_routes,
            http_bindings,
            grpc_bindings,
        };

        let conn = self
            .conn
            .read()
            .as_ref()
            .map(|c| (c.channel.clone(), c.config_name.clone()));
        let (mut channel, config_name) = match conn {
            Some(conn) => conn,
            None => {
                self.metrics.record_sync_duration("error", start.elapsed());
                self.metrics.record_sync_error("not_connected");
                return SyncOutcome {
                    snapshot: Some(snapshot),
                    requeue_after: Some(SYNC_ERROR_REQUEUE),
                    error: None,
                };
            }
        };

        let grpc_start = Instant::now();
        let response = channel.update_routes(request).await;
        let grpc_elapsed = grpc_start.elapsed();

        let failure = match response {
            Err(status) => {
                self.metrics.record_grpc_call("UpdateRoutes", "error", grpc_elapsed);
                self.metrics.record_sync_error("grpc_error");
                Some(anyhow!("failed to update routes via gRPC: {status}"))
            }
            Ok(response) if !response.success => {
                self.metrics.record_grpc_call("UpdateRoutes", "failed", grpc_elapsed);
                self.metrics.record_sync_error("update_failed");
                Some(anyhow!("route update failed: {}", response.error))
            }
            Ok(response) if response.applied_version != version => {
                self.metrics.record_grpc_call("UpdateRoutes", "failed", grpc_elapsed);
                self.metrics.record_sync_error("update_failed");
                Some(anyhow!(
                    "proxy applied version {} for push {}",
                    response.applied_version,
                    version,
                ))
            }
            Ok(response) => {
                self.metrics.record_grpc_call("UpdateRoutes", "success", grpc_elapsed);
                self.metrics.record_sync_duration("success", start.elapsed());
                self.metrics
                    .record_synced_routes("http", snapshot.http_routes.len());
                self.metrics
                    .record_synced_routes("grpc", snapshot.grpc_routes.len());
                tracing::info!(
                    http_route_count = response.http_route_count,
                    grpc_route_count = response.grpc_route_count,
                    version = response.applied_version,
                    "successfully updated routes in Pingora",
                );
                None
            }
        };

        match failure {
            Some(error) => {
                tracing::error!(error = %format!("{error:#}"), version, "route push failed");
                self.metrics.record_sync_duration("error", start.elapsed());
                // Drop the handle; the next sync re-resolves and re-dials.
                self.close();
                self.record_config_status(&config_name, version, Some(&format!("{error:#}")))
                    .await;
                SyncOutcome {
                    snapshot: Some(snapshot),
                    requeue_after: Some(SYNC_ERROR_REQUEUE),
                    error: Some(error),
                }
            }
            None => {
                self.record_config_status(&config_name, version, None).await;
                SyncOutcome {
                    snapshot: Some(snapshot),
                    requeue_after: None,
                    error: None,
                }
            }
        }
    }

    /// Reads back the proxy's current table; debug and inspection only.
    pub async fn get_routes(&self) -> Result<proto::GetRoutesResponse> {
        let mut channel = self
            .conn
            .read()
            .as_ref()
            .map(|c| c.channel.clone())
            .context("not connected to Pingora proxy")?;

        let start = Instant::now();
        match channel.get_routes().await {
            Ok(response) => {
                self.metrics
                    .record_grpc_call("GetRoutes", "success", start.elapsed());
                Ok(response)
            }
            Err(status) => {
                self.metrics
                    .record_grpc_call("GetRoutes", "error", start.elapsed());
                Err(anyhow!("failed to get routes: {status}"))
            }
        }
    }

    /// Proxy liveness probe.
    pub async fn health(&self) -> Result<proto::HealthResponse> {
        let mut channel = self
            .conn
            .read()
            .as_ref()
            .map(|c| c.channel.clone())
            .context("not connected to Pingora proxy")?;

        let start = Instant::now();
        match channel.health().await {
            Ok(response) => {
                self.metrics
                    .record_grpc_call("Health", "success", start.elapsed());
                Ok(response)
            }
            Err(status) => {
                self.metrics
                    .record_grpc_call("Health", "error", start.elapsed());
                Err(anyhow!("failed to check health: {status}"))
            }
        }
    }

    /// A route is relevant iff at least one qualifying parent (a Gateway of
    /// this controller's class) accepts it. Every qualifying parent's result
    /// is retained for the status writers, accepted or not.
    async fn relevant_routes<R: GatewayRoute>(
        &self,
    ) -> Result<(Vec<R>, AHashMap<String, ParentBindings>)> {
        let routes = Api::<R>::all(self.client.clone())
            .list(&ListParams::default())
            .await
            .with_context(|| format!("failed to list {}s", R::KIND))?;

        let mut relevant = Vec::new();
        let mut bindings = AHashMap::new();

        for route in &routes.items {
            let route_namespace = route.namespace().unwrap_or_default();
            let key = format!("{}/{}", route_namespace, route.name_any());

            let mut per_parent = ParentBindings::new();
            let mut has_accepted = false;

            for (index, parent_ref) in route.parent_refs().iter().enumerate() {
                if !parent_ref_is_gateway(parent_ref) {
                    continue;
                }

                let namespace = parent_gateway_namespace(&route_namespace, parent_ref);
                let gateway = match Api::<Gateway>::namespaced(self.client.clone(), namespace)
                    .get_opt(&parent_ref.name)
                    .await
                {
                    Ok(Some(gateway)) => gateway,
                    Ok(None) => continue,
                    Err(error) => {
                        tracing::debug!(%error, gateway = %parent_ref.name, "failed to get parent gateway");
                        continue;
                    }
                };

                if gateway.spec.gateway_class_name != self.info.gateway_class_name {
                    continue;
                }

                let info = route.route_info(parent_ref.section_name.clone());
                match self.validator.validate_binding(&gateway, &info).await {
                    Ok(result) => {
                        if result.accepted {
                            has_accepted = true;
                        }
                        per_parent.insert(index, result);
                    }
                    Err(error) => {
                        tracing::error!(
                            route = %key,
                            gateway = %parent_ref.name,
                            %error,
                            "failed to validate route binding",
                        );
                    }
                }
            }

            bindings.insert(key, per_parent);
            if has_accepted {
                relevant.push(route.clone());
            }
        }

        Ok((relevant, bindings))
    }

    async fn record_config_status(&self, config_name: &str, version: u64, error: Option<&str>) {
        if let Err(error) = self
            .config_status
            .record_push(config_name, version, error)
            .await
        {
            tracing::warn!(error = %format!("{error:#}"), "failed to record PingoraConfig status");
        }
    }

    #[cfg(test)]
    pub(crate) fn install_channel(&self, channel: C, config_name: &str) {
        *self.conn.write() = Some(Conn {
            channel,
            config_name: config_name.to_string(),
        });
    }
}
