//! Translation of events on related resources into route and Gateway
//! reconcile requests. Mappers run synchronously inside the watch machinery,
//! so they only read reflector stores.

use kube::runtime::reflector::ObjectRef;
use parking_lot::Mutex;
use pingora_gateway_controller_k8s_api::{
    gateway::{Gateway, GatewayClass},
    pingora::{PingoraConfig, PINGORA_CONFIG_GROUP, PINGORA_CONFIG_KIND},
    ResourceExt, Secret,
};
use pingora_gateway_controller_k8s_index::routes::{
    parent_gateway_namespace, parent_ref_is_gateway, GatewayRoute,
};
use std::{collections::HashMap, sync::Arc};

/// Tracks the last observed spec generation per object so that status-only
/// updates (our own writes included) do not fan out into reconciles.
#[derive(Default)]
pub struct SeenGenerations(Mutex<HashMap<String, i64>>);

impl SeenGenerations {
    pub fn changed(&self, name: &str, generation: Option<i64>) -> bool {
        let generation = generation.unwrap_or_default();
        match self.0.lock().insert(name.to_string(), generation) {
            Some(previous) => previous != generation,
            None => true,
        }
    }
}

pub fn object_ref<R: GatewayRoute>(route: &R) -> ObjectRef<R> {
    ObjectRef::new(&route.name_any()).within(&route.namespace().unwrap_or_default())
}

/// Whether the route has any parent ref resolving to this Gateway.
fn route_references_gateway<R: GatewayRoute>(route: &R, gateway: &Gateway) -> bool {
    let route_namespace = route.namespace().unwrap_or_default();
    let gateway_namespace = gateway.namespace().unwrap_or_default();
    let gateway_name = gateway.name_any();

    route.parent_refs().iter().any(|parent_ref| {
        parent_ref_is_gateway(parent_ref)
            && parent_ref.name == gateway_name
            && parent_gateway_namespace(&route_namespace, parent_ref) == gateway_namespace
    })
}

/// Gateway change → routes referencing that Gateway.
pub fn routes_for_gateway<R: GatewayRoute>(
    gateway: &Gateway,
    gateway_class_name: &str,
    routes: &[Arc<R>],
) -> Vec<ObjectRef<R>> {
    if gateway.spec.gateway_class_name != gateway_class_name {
        return Vec::new();
    }

    routes
        .iter()
        .filter(|route| route_references_gateway(route.as_ref(), gateway))
        .map(|route| object_ref(route.as_ref()))
        .collect()
}

/// Routes with any parent ref resolving to a Gateway of the class.
pub fn routes_attached_to_class<R: GatewayRoute>(
    routes: &[Arc<R>],
    gateways: &[Arc<Gateway>],
    gateway_class_name: &str,
) -> Vec<ObjectRef<R>> {
    routes
        .iter()
        .filter(|route| {
            gateways
                .iter()
                .filter(|gateway| gateway.spec.gateway_class_name == gateway_class_name)
                .any(|gateway| route_references_gateway(route.as_ref(), gateway))
        })
        .map(|route| object_ref(route.as_ref()))
        .collect()
}

/// ReferenceGrant change → class-attached routes whose backends cross into
/// the grant's namespace.
pub fn routes_for_reference_grant<R: GatewayRoute>(
    grant_namespace: &str,
    routes: &[Arc<R>],
    gateways: &[Arc<Gateway>],
    gateway_class_name: &str,
) -> Vec<ObjectRef<R>> {
    routes
        .iter()
        .filter(|route| {
            route
                .cross_namespace_backend_namespaces()
                .iter()
                .any(|ns| ns == grant_namespace)
        })
        .filter(|route| {
            gateways
                .iter()
                .filter(|gateway| gateway.spec.gateway_class_name == gateway_class_name)
                .any(|gateway| route_references_gateway(route.as_ref(), gateway))
        })
        .map(|route| object_ref(route.as_ref()))
        .collect()
}

/// Whether this PingoraConfig is the one the GatewayClass points at.
pub fn config_matches_class(config: &PingoraConfig, gateway_class: &GatewayClass) -> bool {
    match &gateway_class.spec.parameters_ref {
        Some(parameters_ref) => {
            parameters_ref.group == PINGORA_CONFIG_GROUP
                && parameters_ref.kind == PINGORA_CONFIG_KIND
                && parameters_ref.name == config.name_any()
        }
        None => false,
    }
}

/// Whether this Secret is the active config's credential secret.
pub fn secret_matches_config(
    secret: &Secret,
    config: &PingoraConfig,
    default_namespace: &str,
) -> bool {
    let secret_ref = match config.spec.tls.as_ref().and_then(|tls| tls.secret_ref.as_ref()) {
        Some(secret_ref) => secret_ref,
        None => return false,
    };

    let expected_namespace = secret_ref.namespace.as_deref().unwrap_or(default_namespace);
    secret.name_any() == secret_ref.name
        && secret.namespace().as_deref() == Some(expected_namespace)
}

/// GatewayClass or PingoraConfig change → all Gateways of the class.
pub fn gateways_for_class(
    gateways: &[Arc<Gateway>],
    gateway_class_name: &str,
) -> Vec<ObjectRef<Gateway>> {
    gateways
        .iter()
        .filter(|gateway| gateway.spec.gateway_class_name == gateway_class_name)
        .map(|gateway| {
            ObjectRef::new(&gateway.name_any()).within(&gateway.namespace().unwrap_or_default())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pingora_gateway_controller_k8s_api::{
        gateway::{GatewaySpec, ParametersReference},
        httproute::{HttpRoute, HttpRouteSpec},
        pingora::{PingoraConfigSpec, SecretReference, TlsConfig},
        BackendRef, ObjectMeta, ParentReference,
    };

    fn gateway(name: &str, ns: &str, class: &str) -> Arc<Gateway> {
        Arc::new(Gateway {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(ns.to_string()),
                ..Default::default()
            },
            spec: GatewaySpec {
                gateway_class_name: class.to_string(),
                listeners: vec![],
            },
            status: None,
        })
    }

    fn route(name: &str, ns: &str, parent: &str, backend_ns: Option<&str>) -> Arc<HttpRoute> {
        Arc::new(HttpRoute {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(ns.to_string()),
                ..Default::default()
            },
            spec: HttpRouteSpec {
                parent_refs: Some(vec![ParentReference {
                    name: parent.to_string(),
                    ..Default::default()
                }]),
                hostnames: None,
                rules: Some(vec![
                    pingora_gateway_controller_k8s_api::httproute::HttpRouteRule {
                        matches: None,
                        backend_refs: Some(vec![BackendRef {
                            name: "svc".to_string(),
                            namespace: backend_ns.map(str::to_string),
                            port: Some(80),
                            ..Default::default()
                        }]),
                        timeouts: None,
                    },
                ]),
            },
            status: None,
        })
    }

    #[test]
    fn gateway_change_maps_to_referencing_routes() {
        let gw = gateway("gw", "ns", "pingora");
        let routes = vec![route("r1", "ns", "gw", None), route("r2", "ns", "other", None)];

        let refs = routes_for_gateway(&gw, "pingora", &routes);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].name, "r1");

        // A foreign-class gateway maps to nothing.
        let foreign = gateway("gw", "ns", "someone-else");
        assert!(routes_for_gateway(&foreign, "pingora", &routes).is_empty());
    }

    #[test]
    fn class_attachment_requires_a_class_gateway() {
        let gateways = vec![gateway("gw", "ns", "pingora"), gateway("other", "ns", "else")];
        let routes = vec![
            route("r1", "ns", "gw", None),
            route("r2", "ns", "other", None),
            route("r3", "ns", "missing", None),
        ];

        let refs = routes_attached_to_class(&routes, &gateways, "pingora");
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].name, "r1");
    }

    #[test]
    fn grants_map_to_routes_with_backends_in_their_namespace() {
        let gateways = vec![gateway("gw", "ns", "pingora")];
        let routes = vec![
            route("r1", "ns", "gw", Some("ns-b")),
            route("r2", "ns", "gw", None),
            route("r3", "ns", "gw", Some("ns-c")),
        ];

        let refs = routes_for_reference_grant("ns-b", &routes, &gateways, "pingora");
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].name, "r1");
    }

    #[test]
    fn config_matching_validates_the_parameters_ref() {
        let config = PingoraConfig {
            metadata: ObjectMeta {
                name: Some("proxy".to_string()),
                ..Default::default()
            },
            spec: PingoraConfigSpec {
                address: "proxy:50051".to_string(),
                ..Default::default()
            },
            status: None,
        };

        let mut class = GatewayClass {
            metadata: ObjectMeta {
                name: Some("pingora".to_string()),
                ..Default::default()
            },
            spec: Default::default(),
        };
        assert!(!config_matches_class(&config, &class));

        class.spec.parameters_ref = Some(ParametersReference {
            group: PINGORA_CONFIG_GROUP.to_string(),
            kind: PINGORA_CONFIG_KIND.to_string(),
            name: "proxy".to_string(),
        });
        assert!(config_matches_class(&config, &class));

        class.spec.parameters_ref.as_mut().unwrap().name = "other".to_string();
        assert!(!config_matches_class(&config, &class));
    }

    #[test]
    fn secret_matching_defaults_the_namespace() {
        let mut config = PingoraConfig {
            metadata: ObjectMeta {
                name: Some("proxy".to_string()),
                ..Default::default()
            },
            spec: PingoraConfigSpec {
                address: "proxy:50051".to_string(),
                tls: Some(TlsConfig {
                    enabled: true,
                    secret_ref: Some(SecretReference {
                        name: "proxy-tls".to_string(),
                        namespace: None,
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            },
            status: None,
        };

        let secret = |name: &str, ns: &str| Secret {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(ns.to_string()),
                ..Default::default()
            },
            ..Default::default()
        };

        assert!(secret_matches_config(
            &secret("proxy-tls", "default"),
            &config,
            "default"
        ));
        assert!(!secret_matches_config(
            &secret("proxy-tls", "other"),
            &config,
            "default"
        ));
        assert!(!secret_matches_config(
            &secret("unrelated", "default"),
            &config,
            "default"
        ));

        config
            .spec
            .tls
            .as_mut()
            .unwrap()
            .secret_ref
            .as_mut()
            .unwrap()
            .namespace = Some("pingora-system".to_string());
        assert!(secret_matches_config(
            &secret("proxy-tls", "pingora-system"),
            &config,
            "default"
        ));
    }

    #[test]
    fn seen_generations_gate_on_spec_changes() {
        let seen = SeenGenerations::default();
        assert!(seen.changed("proxy", Some(1)));
        // A status-only update leaves the generation alone.
        assert!(!seen.changed("proxy", Some(1)));
        assert!(seen.changed("proxy", Some(2)));
    }

    #[test]
    fn gateways_for_class_filters_by_class() {
        let gateways = vec![
            gateway("gw-a", "ns", "pingora"),
            gateway("gw-b", "other-ns", "pingora"),
            gateway("gw-c", "ns", "else"),
        ];
        let refs = gateways_for_class(&gateways, "pingora");
        let names: Vec<_> = refs.iter().map(|r| r.name.clone()).collect();
        assert_eq!(names, vec!["gw-a".to_string(), "gw-b".to_string()]);
    }
}
