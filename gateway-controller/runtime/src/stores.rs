//! Reflector stores backing the synchronous event mappers.

use kube::{
    runtime::{reflector, reflector::Store, watcher},
    Api, Client,
};
use pingora_gateway_controller_k8s_api::{
    gateway::{Gateway, GatewayClass},
    grpcroute::GrpcRoute,
    httproute::HttpRoute,
    pingora::PingoraConfig,
};
use serde::de::DeserializeOwned;
use std::{fmt::Debug, hash::Hash, time::Duration};

use futures::StreamExt;

/// Read handles onto the watched cluster state, used by the mappers, which
/// must answer synchronously.
#[derive(Clone)]
pub struct Stores {
    pub gateways: Store<Gateway>,
    pub gateway_classes: Store<GatewayClass>,
    pub configs: Store<PingoraConfig>,
    pub http_routes: Store<HttpRoute>,
    pub grpc_routes: Store<GrpcRoute>,
}

impl Stores {
    /// Spawns one reflector per watched kind and returns the store handles.
    pub fn spawn(client: &Client) -> Self {
        Self {
            gateways: spawn_reflector(client),
            gateway_classes: spawn_reflector(client),
            configs: spawn_reflector(client),
            http_routes: spawn_reflector(client),
            grpc_routes: spawn_reflector(client),
        }
    }
}

fn spawn_reflector<K>(client: &Client) -> Store<K>
where
    K: kube::Resource<DynamicType = ()>
        + Clone
        + DeserializeOwned
        + Debug
        + Send
        + Sync
        + 'static,
    K::DynamicType: Eq + Hash + Clone + Default,
{
    let (store, writer) = reflector::store::<K>();
    let stream = reflector(
        writer,
        watcher(Api::<K>::all(client.clone()), watcher::Config::default()),
    );

    tokio::spawn(async move {
        let mut stream = stream.boxed();
        while let Some(event) = stream.next().await {
            if let Err(error) = event {
                tracing::warn!(%error, "reflector watch error");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    });

    store
}
