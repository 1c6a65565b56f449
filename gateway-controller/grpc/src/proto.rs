//! Message and client definitions for the `routing.v1` protocol spoken over
//! the proxy's control channel. Kept as committed prost definitions so the
//! build does not depend on protoc.

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum PathMatchType {
    Unspecified = 0,
    Exact = 1,
    Prefix = 2,
    Regex = 3,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum HeaderMatchType {
    Unspecified = 0,
    Exact = 1,
    Regex = 2,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum QueryParamMatchType {
    Unspecified = 0,
    Exact = 1,
    Regex = 2,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum GrpcMethodMatchType {
    Unspecified = 0,
    Exact = 1,
    Regex = 2,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum BackendProtocol {
    Unspecified = 0,
    Http = 1,
    Grpc = 2,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PathMatch {
    #[prost(enumeration = "PathMatchType", tag = "1")]
    pub r#type: i32,
    #[prost(string, tag = "2")]
    pub value: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct HeaderMatch {
    #[prost(enumeration = "HeaderMatchType", tag = "1")]
    pub r#type: i32,
    #[prost(string, tag = "2")]
    pub name: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub value: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct QueryParamMatch {
    #[prost(enumeration = "QueryParamMatchType", tag = "1")]
    pub r#type: i32,
    #[prost(string, tag = "2")]
    pub name: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub value: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct HttpRouteMatch {
    #[prost(message, optional, tag = "1")]
    pub path: ::core::option::Option<PathMatch>,
    #[prost(string, tag = "2")]
    pub method: ::prost::alloc::string::String,
    #[prost(message, repeated, tag = "3")]
    pub headers: ::prost::alloc::vec::Vec<HeaderMatch>,
    #[prost(message, repeated, tag = "4")]
    pub query_params: ::prost::alloc::vec::Vec<QueryParamMatch>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GrpcMethodMatch {
    #[prost(enumeration = "GrpcMethodMatchType", tag = "1")]
    pub r#type: i32,
    #[prost(string, tag = "2")]
    pub service: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub method: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GrpcRouteMatch {
    #[prost(message, optional, tag = "1")]
    pub method: ::core::option::Option<GrpcMethodMatch>,
    #[prost(message, repeated, tag = "2")]
    pub headers: ::prost::alloc::vec::Vec<HeaderMatch>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Backend {
    /// Fully-qualified service address, "<svc>.<ns>.svc.<domain>:<port>".
    #[prost(string, tag = "1")]
    pub address: ::prost::alloc::string::String,
    #[prost(uint32, tag = "2")]
    pub weight: u32,
    #[prost(enumeration = "BackendProtocol", tag = "3")]
    pub protocol: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct HttpRouteRule {
    #[prost(message, repeated, tag = "1")]
    pub matches: ::prost::alloc::vec::Vec<HttpRouteMatch>,
    #[prost(message, repeated, tag = "2")]
    pub backends: ::prost::alloc::vec::Vec<Backend>,
    /// Request timeout in milliseconds; zero means unset.
    #[prost(uint64, tag = "3")]
    pub timeout_ms: u64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct HttpRoute {
    /// "<namespace>/<name>" of the source HTTPRoute.
    #[prost(string, tag = "1")]
    pub id: ::prost::alloc::string::String,
    #[prost(string, repeated, tag = "2")]
    pub hostnames: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
    #[prost(message, repeated, tag = "3")]
    pub rules: ::prost::alloc::vec::Vec<HttpRouteRule>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GrpcRouteRule {
    #[prost(message, repeated, tag = "1")]
    pub matches: ::prost::alloc::vec::Vec<GrpcRouteMatch>,
    #[prost(message, repeated, tag = "2")]
    pub backends: ::prost::alloc::vec::Vec<Backend>,
    #[prost(uint64, tag = "3")]
    pub timeout_ms: u64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GrpcRoute {
    /// "<namespace>/<name>" of the source GRPCRoute.
    #[prost(string, tag = "1")]
    pub id: ::prost::alloc::string::String,
    #[prost(string, repeated, tag = "2")]
    pub hostnames: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
    #[prost(message, repeated, tag = "3")]
    pub rules: ::prost::alloc::vec::Vec<GrpcRouteRule>,
}

/// Full-replacement route table push. Empty lists mean "no routes".
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UpdateRoutesRequest {
    #[prost(message, repeated, tag = "1")]
    pub http_routes: ::prost::alloc::vec::Vec<HttpRoute>,
    #[prost(message, repeated, tag = "2")]
    pub grpc_routes: ::prost::alloc::vec::Vec<GrpcRoute>,
    #[prost(uint64, tag = "3")]
    pub version: u64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UpdateRoutesResponse {
    #[prost(bool, tag = "1")]
    pub success: bool,
    #[prost(string, tag = "2")]
    pub error: ::prost::alloc::string::String,
    #[prost(uint32, tag = "3")]
    pub http_route_count: u32,
    #[prost(uint32, tag = "4")]
    pub grpc_route_count: u32,
    /// Must echo the request version on success.
    #[prost(uint64, tag = "5")]
    pub applied_version: u64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetRoutesRequest {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetRoutesResponse {
    #[prost(message, repeated, tag = "1")]
    pub http_routes: ::prost::alloc::vec::Vec<HttpRoute>,
    #[prost(message, repeated, tag = "2")]
    pub grpc_routes: ::prost::alloc::vec::Vec<GrpcRoute>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct HealthRequest {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct HealthResponse {
    #[prost(bool, tag = "1")]
    pub healthy: bool,
}

pub mod routing_service_client {
    use tonic::codegen::http::uri::PathAndQuery;
    use tonic::codegen::*;

    const SERVICE_NAME: &str = "routing.v1.RoutingService";

    /// Unary client for the proxy's routing control service.
    #[derive(Debug, Clone)]
    pub struct RoutingServiceClient<T> {
        inner: tonic::client::Grpc<T>,
    }

    impl<T> RoutingServiceClient<T>
    where
        T: tonic::client::GrpcService<tonic::body::BoxBody>,
        T::Error: Into<StdError>,
        T::ResponseBody: Body<Data = Bytes> + Send + 'static,
        <T::ResponseBody as Body>::Error: Into<StdError> + Send,
    {
        pub fn new(inner: T) -> Self {
            Self {
                inner: tonic::client::Grpc::new(inner),
            }
        }

        /// Replaces the proxy's entire route table, atomically on the remote.
        pub async fn update_routes(
            &mut self,
            request: impl tonic::IntoRequest<super::UpdateRoutesRequest>,
        ) -> std::result::Result<tonic::Response<super::UpdateRoutesResponse>, tonic::Status>
        {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::new(
                    tonic::Code::Unknown,
                    format!("Service was not ready: {}", e.into()),
                )
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = PathAndQuery::from_static("/routing.v1.RoutingService/UpdateRoutes");
            let mut req = request.into_request();
            req.extensions_mut()
                .insert(GrpcMethod::new(SERVICE_NAME, "UpdateRoutes"));
            self.inner.unary(req, path, codec).await
        }

        /// Reads back the proxy's current route table; debug and inspection
        /// only.
        pub async fn get_routes(
            &mut self,
            request: impl tonic::IntoRequest<super::GetRoutesRequest>,
        ) -> std::result::Result<tonic::Response<super::GetRoutesResponse>, tonic::Status>
        {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::new(
                    tonic::Code::Unknown,
                    format!("Service was not ready: {}", e.into()),
                )
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = PathAndQuery::from_static("/routing.v1.RoutingService/GetRoutes");
            let mut req = request.into_request();
            req.extensions_mut()
                .insert(GrpcMethod::new(SERVICE_NAME, "GetRoutes"));
            self.inner.unary(req, path, codec).await
        }

        pub async fn health(
            &mut self,
            request: impl tonic::IntoRequest<super::HealthRequest>,
        ) -> std::result::Result<tonic::Response<super::HealthResponse>, tonic::Status> {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::new(
                    tonic::Code::Unknown,
                    format!("Service was not ready: {}", e.into()),
                )
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = PathAndQuery::from_static("/routing.v1.RoutingService/Health");
            let mut req = request.into_request();
            req.extensions_mut()
                .insert(GrpcMethod::new(SERVICE_NAME, "Health"));
            self.inner.unary(req, path, codec).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    #[test]
    fn update_request_round_trips_through_encoding() {
        let req = UpdateRoutesRequest {
            http_routes: vec![HttpRoute {
                id: "ns/r1".to_string(),
                hostnames: vec!["example.com".to_string()],
                rules: vec![HttpRouteRule {
                    matches: vec![HttpRouteMatch {
                        path: Some(PathMatch {
                            r#type: PathMatchType::Prefix as i32,
                            value: "/".to_string(),
                        }),
                        ..Default::default()
                    }],
                    backends: vec![Backend {
                        address: "svc.ns.svc.cluster.local:80".to_string(),
                        weight: 1,
                        protocol: BackendProtocol::Http as i32,
                    }],
                    timeout_ms: 10_000,
                }],
            }],
            grpc_routes: vec![],
            version: 7,
        };

        let bytes = req.encode_to_vec();
        let decoded = UpdateRoutesRequest::decode(bytes.as_slice()).unwrap();
        assert_eq!(req, decoded);
    }

    #[test]
    fn stable_input_encodes_identically() {
        let route = HttpRoute {
            id: "ns/r1".to_string(),
            hostnames: vec!["a.example.com".to_string(), "b.example.com".to_string()],
            rules: vec![],
        };
        assert_eq!(route.encode_to_vec(), route.clone().encode_to_vec());
    }
}
