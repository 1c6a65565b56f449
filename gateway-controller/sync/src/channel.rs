//! The proxy channel seam: the tonic client in production, stubs in tests.

use anyhow::{Context, Result};
use async_trait::async_trait;
use pingora_gateway_controller_grpc::{
    proto::{
        GetRoutesRequest, GetRoutesResponse, HealthRequest, HealthResponse, UpdateRoutesRequest,
        UpdateRoutesResponse,
    },
    ConnectOptions, RoutingServiceClient,
};
use tonic::transport::Channel;

/// One client handle onto the proxy's control channel. Handles are cheap to
/// clone; clones share the underlying connection.
#[async_trait]
pub trait ProxyChannel: Clone + Send + Sync + 'static {
    async fn connect(options: &ConnectOptions) -> Result<Self>;

    async fn update_routes(
        &mut self,
        request: UpdateRoutesRequest,
    ) -> Result<UpdateRoutesResponse, tonic::Status>;

    async fn get_routes(&mut self) -> Result<GetRoutesResponse, tonic::Status>;

    async fn health(&mut self) -> Result<HealthResponse, tonic::Status>;
}

#[derive(Clone, Debug)]
pub struct GrpcProxyChannel {
    client: RoutingServiceClient<Channel>,
}

#[async_trait]
impl ProxyChannel for GrpcProxyChannel {
    async fn connect(options: &ConnectOptions) -> Result<Self> {
        let client = pingora_gateway_controller_grpc::connect(options)
            .await
            .with_context(|| format!("failed to connect to Pingora proxy at {}", options.address))?;
        Ok(Self { client })
    }

    async fn update_routes(
        &mut self,
        request: UpdateRoutesRequest,
    ) -> Result<UpdateRoutesResponse, tonic::Status> {
        self.client
            .update_routes(request)
            .await
            .map(|response| response.into_inner())
    }

    async fn get_routes(&mut self) -> Result<GetRoutesResponse, tonic::Status> {
        self.client
            .get_routes(GetRoutesRequest {})
            .await
            .map(|response| response.into_inner())
    }

    async fn health(&mut self) -> Result<HealthResponse, tonic::Status> {
        self.client
            .health(HealthRequest {})
            .await
            .map(|response| response.into_inner())
    }
}
