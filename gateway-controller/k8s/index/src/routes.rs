//! The capability set shared by the two route kinds, and the helpers that
//! let the evaluator, the mappers and the syncer treat them uniformly.

use crate::BindingValidator;
use kube::Api;
use pingora_gateway_controller_core::{RouteInfo, RouteKind};
use pingora_gateway_controller_k8s_api::{
    gateway::Gateway,
    grpcroute::{GrpcRoute, GrpcRouteStatus},
    httproute::{HttpRoute, HttpRouteStatus},
    BackendRef, Client, NamespaceResourceScope, ParentReference, ResourceExt, RouteParentStatus,
    RouteStatus,
};

pub const KIND_GATEWAY: &str = "Gateway";

/// What both route kinds expose to the rest of the controller.
pub trait GatewayRoute:
    kube::Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + Clone
    + std::fmt::Debug
    + serde::Serialize
    + serde::de::DeserializeOwned
    + Send
    + Sync
    + Sized
    + 'static
{
    const KIND: RouteKind;

    fn hostnames(&self) -> Vec<String>;

    fn parent_refs(&self) -> &[ParentReference];

    fn status_parents(&self) -> &[RouteParentStatus];

    fn set_status_parents(&mut self, parents: Vec<RouteParentStatus>);

    /// Every backend reference across all rules, in rule order.
    fn backend_refs(&self) -> Vec<&BackendRef>;

    fn route_info(&self, section_name: Option<String>) -> RouteInfo {
        RouteInfo {
            name: self.name_any(),
            namespace: self.namespace().unwrap_or_default(),
            hostnames: self.hostnames(),
            kind: Self::KIND,
            section_name,
        }
    }

    /// Namespaces referenced by backends that differ from the route's own
    /// namespace, deduplicated in first-seen order.
    fn cross_namespace_backend_namespaces(&self) -> Vec<String> {
        let own = self.namespace().unwrap_or_default();
        let mut namespaces: Vec<String> = Vec::new();
        for backend in self.backend_refs() {
            if let Some(ns) = &backend.namespace {
                if ns != &own && !namespaces.contains(ns) {
                    namespaces.push(ns.clone());
                }
            }
        }
        namespaces
    }
}

impl GatewayRoute for HttpRoute {
    const KIND: RouteKind = RouteKind::Http;

    fn hostnames(&self) -> Vec<String> {
        self.spec.hostnames.clone().unwrap_or_default()
    }

    fn parent_refs(&self) -> &[ParentReference] {
        self.spec.parent_refs.as_deref().unwrap_or(&[])
    }

    fn status_parents(&self) -> &[RouteParentStatus] {
        self.status
            .as_ref()
            .map(|s| s.inner.parents.as_slice())
            .unwrap_or(&[])
    }

    fn set_status_parents(&mut self, parents: Vec<RouteParentStatus>) {
        self.status = Some(HttpRouteStatus {
            inner: RouteStatus { parents },
        });
    }

    fn backend_refs(&self) -> Vec<&BackendRef> {
        self.spec
            .rules
            .iter()
            .flatten()
            .flat_map(|rule| rule.backend_refs.iter().flatten())
            .collect()
    }
}

impl GatewayRoute for GrpcRoute {
    const KIND: RouteKind = RouteKind::Grpc;

    fn hostnames(&self) -> Vec<String> {
        self.spec.hostnames.clone().unwrap_or_default()
    }

    fn parent_refs(&self) -> &[ParentReference] {
        self.spec.parent_refs.as_deref().unwrap_or(&[])
    }

    fn status_parents(&self) -> &[RouteParentStatus] {
        self.status
            .as_ref()
            .map(|s| s.inner.parents.as_slice())
            .unwrap_or(&[])
    }

    fn set_status_parents(&mut self, parents: Vec<RouteParentStatus>) {
        self.status = Some(GrpcRouteStatus {
            inner: RouteStatus { parents },
        });
    }

    fn backend_refs(&self) -> Vec<&BackendRef> {
        self.spec
            .rules
            .iter()
            .flatten()
            .flat_map(|rule| rule.backend_refs.iter().flatten())
            .collect()
    }
}

/// A parent ref with no kind, or kind "Gateway", targets a Gateway.
pub fn parent_ref_is_gateway(parent_ref: &ParentReference) -> bool {
    matches!(parent_ref.kind.as_deref(), None | Some(KIND_GATEWAY))
}

/// A parent ref without a namespace refers into the route's own namespace.
pub fn parent_gateway_namespace<'a>(
    route_namespace: &'a str,
    parent_ref: &'a ParentReference,
) -> &'a str {
    parent_ref
        .namespace
        .as_deref()
        .unwrap_or(route_namespace)
}

/// Whether the route has at least one accepted binding to a Gateway of the
/// given class. Lookup failures skip the parent rather than failing the
/// whole check.
pub async fn is_route_accepted<R: GatewayRoute>(
    client: &Client,
    validator: &BindingValidator,
    gateway_class_name: &str,
    route: &R,
) -> bool {
    let route_namespace = route.namespace().unwrap_or_default();

    for parent_ref in route.parent_refs() {
        if !parent_ref_is_gateway(parent_ref) {
            continue;
        }

        let namespace = parent_gateway_namespace(&route_namespace, parent_ref);
        let gateway = match Api::<Gateway>::namespaced(client.clone(), namespace)
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

        if gateway.spec.gateway_class_name != gateway_class_name {
            continue;
        }

        let info = route.route_info(parent_ref.section_name.clone());
        match validator.validate_binding(&gateway, &info).await {
            Ok(result) if result.accepted => return true,
            Ok(_) => {}
            Err(error) => {
                tracing::warn!(
                    route = %format!("{}/{}", info.namespace, info.name),
                    gateway = %parent_ref.name,
                    %error,
                    "failed to validate route binding",
                );
            }
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use pingora_gateway_controller_k8s_api::{
        httproute::{HttpRouteRule, HttpRouteSpec},
        ObjectMeta,
    };

    fn backend(name: &str, namespace: Option<&str>) -> BackendRef {
        BackendRef {
            name: name.to_string(),
            namespace: namespace.map(str::to_string),
            port: Some(80),
            ..Default::default()
        }
    }

    fn route_with_backends(backends: Vec<BackendRef>) -> HttpRoute {
        HttpRoute {
            metadata: ObjectMeta {
                name: Some("r1".to_string()),
                namespace: Some("ns-a".to_string()),
                ..Default::default()
            },
            spec: HttpRouteSpec {
                parent_refs: None,
                hostnames: Some(vec!["example.com".to_string()]),
                rules: Some(vec![HttpRouteRule {
                    matches: None,
                    backend_refs: Some(backends),
                    timeouts: None,
                }]),
            },
            status: None,
        }
    }

    #[test]
    fn route_info_reflects_the_route() {
        let route = route_with_backends(vec![]);
        let info = route.route_info(Some("http".to_string()));
        assert_eq!(info.name, "r1");
        assert_eq!(info.namespace, "ns-a");
        assert_eq!(info.hostnames, vec!["example.com".to_string()]);
        assert_eq!(info.kind, RouteKind::Http);
        assert_eq!(info.section_name.as_deref(), Some("http"));
    }

    #[test]
    fn cross_namespace_backends_are_deduplicated() {
        let route = route_with_backends(vec![
            backend("a", Some("ns-b")),
            backend("b", Some("ns-b")),
            backend("c", Some("ns-a")),
            backend("d", None),
            backend("e", Some("ns-c")),
        ]);
        assert_eq!(
            route.cross_namespace_backend_namespaces(),
            vec!["ns-b".to_string(), "ns-c".to_string()]
        );
    }

    #[test]
    fn parent_ref_kind_gate() {
        let mut parent_ref = ParentReference {
            name: "gw".to_string(),
            ..Default::default()
        };
        assert!(parent_ref_is_gateway(&parent_ref));

        parent_ref.kind = Some("Gateway".to_string());
        assert!(parent_ref_is_gateway(&parent_ref));

        parent_ref.kind = Some("Service".to_string());
        assert!(!parent_ref_is_gateway(&parent_ref));
    }

    #[test]
    fn parent_namespace_defaults_to_route_namespace() {
        let parent_ref = ParentReference {
            name: "gw".to_string(),
            ..Default::default()
        };
        assert_eq!(parent_gateway_namespace("ns-a", &parent_ref), "ns-a");

        let parent_ref = ParentReference {
            name: "gw".to_string(),
            namespace: Some("ns-b".to_string()),
            ..Default::default()
        };
        assert_eq!(parent_gateway_namespace("ns-a", &parent_ref), "ns-b");
    }
}
