use crate::{gateway, routes, Stores};
use anyhow::{bail, Result};
use clap::Parser;
use pingora_gateway_controller_k8s_api::{grpcroute::GrpcRoute, httproute::HttpRoute};
use pingora_gateway_controller_k8s_index::ClusterInfo;
use pingora_gateway_controller_k8s_status::{GatewayStatusWriter, RouteStatusWriter};
use pingora_gateway_controller_sync::{ConfigResolver, RouteSyncer, SyncMetrics};
use prometheus_client::registry::Registry;
use std::sync::Arc;
use tracing::{info_span, Instrument};

#[derive(Debug, Parser)]
#[clap(
    name = "pingora-gateway-controller",
    about = "Kubernetes Gateway API controller for the Pingora proxy"
)]
pub struct Args {
    #[clap(
        long,
        env = "PINGORA_LOG_LEVEL",
        default_value = "pingora=info,warn"
    )]
    log_level: kubert::LogFilter,

    #[clap(long, env = "PINGORA_LOG_FORMAT", default_value = "json")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    #[clap(flatten)]
    admin: kubert::AdminArgs,

    /// Kubernetes cluster domain used to build backend service addresses.
    #[clap(long, env = "PINGORA_CLUSTER_DOMAIN", default_value = "cluster.local")]
    cluster_domain: String,

    /// GatewayClass name this controller instance watches.
    #[clap(long, env = "PINGORA_GATEWAY_CLASS_NAME", default_value = "pingora")]
    gateway_class_name: String,

    /// Controller identifier reported in resource statuses.
    #[clap(
        long,
        env = "PINGORA_CONTROLLER_NAME",
        default_value = "pingora.dev/gateway-controller"
    )]
    controller_name: String,

    /// Namespace assumed for credential secret references without one.
    #[clap(long, env = "PINGORA_SECRET_NAMESPACE", default_value = "default")]
    secret_namespace: String,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            log_level,
            log_format,
            client,
            admin,
            cluster_domain,
            gateway_class_name,
            controller_name,
            secret_namespace,
        } = self;

        let mut prom = <Registry>::default();
        let sync_metrics = SyncMetrics::register(prom.sub_registry_with_prefix("pingora"));

        let runtime = kubert::Runtime::builder()
            .with_log(log_level, log_format)
            .with_admin(admin.into_builder().with_prometheus(prom))
            .with_client(client)
            .build()
            .await?;

        let client = runtime.client();

        let info = Arc::new(ClusterInfo {
            cluster_domain,
            gateway_class_name,
            controller_name,
        });
        tracing::info!(
            cluster_domain = %info.cluster_domain,
            gateway_class = %info.gateway_class_name,
            "starting pingora-gateway-controller",
        );

        let stores = Stores::spawn(&client);

        let syncer = Arc::new(RouteSyncer::new(
            client.clone(),
            info.clone(),
            sync_metrics,
            secret_namespace.clone(),
        ));
        let route_status = Arc::new(RouteStatusWriter::new(client.clone(), info.clone()));

        // Gateway reconciler.
        let gateway_ctx = gateway::GatewayCtx {
            client: client.clone(),
            info: info.clone(),
            resolver: ConfigResolver::new(client.clone(), secret_namespace.clone()),
            status: GatewayStatusWriter::new(client.clone()),
        };
        tokio::spawn(gateway::run(gateway_ctx, stores.clone()).instrument(info_span!("gateways")));

        // Route reconcilers, sharing one syncer and one status writer.
        let http_ctx = Arc::new(routes::RouteCtx::<HttpRoute>::new(
            client.clone(),
            info.clone(),
            syncer.clone(),
            route_status.clone(),
        ));
        routes::spawn_startup_sync(http_ctx.clone());
        routes::spawn_deletion_watcher(http_ctx.clone());
        tokio::spawn(
            routes::run(http_ctx, stores.clone(), secret_namespace.clone())
                .instrument(info_span!("httproutes")),
        );

        let grpc_ctx = Arc::new(routes::RouteCtx::<GrpcRoute>::new(
            client.clone(),
            info.clone(),
            syncer.clone(),
            route_status,
        ));
        routes::spawn_startup_sync(grpc_ctx.clone());
        routes::spawn_deletion_watcher(grpc_ctx.clone());
        tokio::spawn(
            routes::run(grpc_ctx, stores, secret_namespace).instrument(info_span!("grpcroutes")),
        );

        // Block on the admin server and shutdown signal; tearing down the
        // process closes the proxy channel.
        if runtime.run().await.is_err() {
            syncer.close();
            bail!("aborted");
        }

        syncer.close();
        Ok(())
    }
}
