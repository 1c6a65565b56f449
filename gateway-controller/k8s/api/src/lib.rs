#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod duration;
pub mod gateway;
pub mod grpcroute;
pub mod httproute;
pub mod labels;
pub mod pingora;
pub mod referencegrant;
mod shared;

pub use self::labels::Labels;
pub use self::shared::{
    BackendRef, HeaderMatch, HeaderMatchType, ParentReference, QueryParamMatch,
    QueryParamMatchType, RouteGroupKind, RouteParentStatus, RouteStatus,
};
pub use k8s_openapi::{
    api::core::v1::{Namespace, Secret, Service},
    apimachinery::pkg::apis::meta::v1::{Condition, Time},
    NamespaceResourceScope,
};
pub use kube::{
    api::{Api, ListParams, ObjectMeta, Patch, PatchParams, PostParams},
    error::ErrorResponse,
    Client, Error, Resource, ResourceExt,
};

/// API group shared by all Gateway API resources.
pub const GATEWAY_API_GROUP: &str = "gateway.networking.k8s.io";
