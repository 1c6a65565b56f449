//! Conversion of Gateway API routes into the proxy's wire model.

use pingora_gateway_controller_grpc::proto;
use pingora_gateway_controller_k8s_api::{
    duration::K8sDuration,
    grpcroute::{GrpcMethodMatch, GrpcMethodMatchType, GrpcRoute, GrpcRouteMatch, GrpcRouteRule},
    httproute::{HttpPathMatch, HttpRoute, HttpRouteMatch, HttpRouteRule, PathMatchType},
    BackendRef, HeaderMatch, HeaderMatchType, QueryParamMatch, QueryParamMatchType, ResourceExt,
};

/// Builds proxy route-table messages from route resources.
pub struct RouteTableBuilder {
    cluster_domain: String,
}

impl RouteTableBuilder {
    pub fn new(cluster_domain: String) -> Self {
        Self { cluster_domain }
    }

    pub fn build_http_route(&self, route: &HttpRoute) -> proto::HttpRoute {
        let namespace = route.namespace().unwrap_or_default();
        proto::HttpRoute {
            id: format!("{}/{}", namespace, route.name_any()),
            hostnames: route.spec.hostnames.clone().unwrap_or_default(),
            rules: route
                .spec
                .rules
                .iter()
                .flatten()
                .map(|rule| self.build_http_rule(&namespace, rule))
                .collect(),
        }
    }

    pub fn build_grpc_route(&self, route: &GrpcRoute) -> proto::GrpcRoute {
        let namespace = route.namespace().unwrap_or_default();
        proto::GrpcRoute {
            id: format!("{}/{}", namespace, route.name_any()),
            hostnames: route.spec.hostnames.clone().unwrap_or_default(),
            rules: route
                .spec
                .rules
                .iter()
                .flatten()
                .map(|rule| self.build_grpc_rule(&namespace, rule))
                .collect(),
        }
    }

    fn build_http_rule(&self, namespace: &str, rule: &HttpRouteRule) -> proto::HttpRouteRule {
        let matches = match rule.matches.as_deref() {
            // A rule without matches matches every request.
            None | Some([]) => vec![proto::HttpRouteMatch {
                path: Some(proto::PathMatch {
                    r#type: proto::PathMatchType::Prefix as i32,
                    value: "/".to_string(),
                }),
                ..Default::default()
            }],
            Some(matches) => matches.iter().map(build_http_match).collect(),
        };

        proto::HttpRouteRule {
            matches,
            backends: self.build_backends(namespace, rule.backend_refs.as_deref()),
            timeout_ms: request_timeout_ms(rule),
        }
    }

    fn build_grpc_rule(&self, namespace: &str, rule: &GrpcRouteRule) -> proto::GrpcRouteRule {
        proto::GrpcRouteRule {
            matches: rule
                .matches
                .iter()
                .flatten()
                .map(build_grpc_match)
                .collect(),
            backends: self.build_backends(namespace, rule.backend_refs.as_deref()),
            timeout_ms: 0,
        }
    }

    fn build_backends(
        &self,
        namespace: &str,
        backend_refs: Option<&[BackendRef]>,
    ) -> Vec<proto::Backend> {
        backend_refs
            .into_iter()
            .flatten()
            .filter_map(|backend_ref| self.build_backend(namespace, backend_ref))
            .collect()
    }

    fn build_backend(&self, namespace: &str, backend_ref: &BackendRef) -> Option<proto::Backend> {
        // Only Service backends are supported.
        if let Some(kind) = backend_ref.kind.as_deref() {
            if kind != "Service" {
                return None;
            }
        }

        // A Service backend without a port has no address to forward to.
        let port = backend_ref.port?;
        let backend_namespace = backend_ref.namespace.as_deref().unwrap_or(namespace);
        let address = format!(
            "{}.{}.svc.{}:{}",
            backend_ref.name, backend_namespace, self.cluster_domain, port
        );

        let weight = match backend_ref.weight {
            Some(weight) if weight > 0 => weight as u32,
            _ => 1,
        };

        Some(proto::Backend {
            address,
            weight,
            protocol: proto::BackendProtocol::Http as i32,
        })
    }
}

/// Request timeout in whole milliseconds; unparsable or non-positive values
/// are silently omitted.
fn request_timeout_ms(rule: &HttpRouteRule) -> u64 {
    let raw = match rule.timeouts.as_ref().and_then(|t| t.request.as_deref()) {
        Some(raw) => raw,
        None => return 0,
    };

    match raw.parse::<K8sDuration>() {
        Ok(duration) => u64::try_from(duration.as_millis()).unwrap_or(0),
        Err(_) => 0,
    }
}

fn build_http_match(route_match: &HttpRouteMatch) -> proto::HttpRouteMatch {
    proto::HttpRouteMatch {
        path: route_match.path.as_ref().map(build_path_match),
        method: route_match.method.clone().unwrap_or_default(),
        headers: route_match
            .headers
            .iter()
            .flatten()
            .map(build_header_match)
            .collect(),
        query_params: route_match
            .query_params
            .iter()
            .flatten()
            .map(build_query_param_match)
            .collect(),
    }
}

fn build_path_match(path: &HttpPathMatch) -> proto::PathMatch {
    let r#type = match path.r#type.unwrap_or_default() {
        PathMatchType::Exact => proto::PathMatchType::Exact,
        PathMatchType::PathPrefix => proto::PathMatchType::Prefix,
        PathMatchType::RegularExpression => proto::PathMatchType::Regex,
    };

    proto::PathMatch {
        r#type: r#type as i32,
        value: path.value.clone().unwrap_or_default(),
    }
}

fn build_header_match(header: &HeaderMatch) -> proto::HeaderMatch {
    let r#type = match header.r#type.unwrap_or_default() {
        HeaderMatchType::Exact => proto::HeaderMatchType::Exact,
        HeaderMatchType::RegularExpression => proto::HeaderMatchType::Regex,
    };

    proto::HeaderMatch {
        r#type: r#type as i32,
        name: header.name.clone(),
        value: header.value.clone(),
    }
}

fn build_query_param_match(param: &QueryParamMatch) -> proto::QueryParamMatch {
    let r#type = match param.r#type.unwrap_or_default() {
        QueryParamMatchType::Exact => proto::QueryParamMatchType::Exact,
        QueryParamMatchType::RegularExpression => proto::QueryParamMatchType::Regex,
    };

    proto::QueryParamMatch {
        r#type: r#type as i32,
        name: param.name.clone(),
        value: param.value.clone(),
    }
}

fn build_grpc_match(route_match: &GrpcRouteMatch) -> proto::GrpcRouteMatch {
    proto::GrpcRouteMatch {
        method: route_match.method.as_ref().map(build_grpc_method_match),
        headers: route_match
            .headers
            .iter()
            .flatten()
            .map(build_header_match)
            .collect(),
    }
}

fn build_grpc_method_match(method: &GrpcMethodMatch) -> proto::GrpcMethodMatch {
    let r#type = match method.r#type.unwrap_or_default() {
        GrpcMethodMatchType::Exact => proto::GrpcMethodMatchType::Exact,
        GrpcMethodMatchType::RegularExpression => proto::GrpcMethodMatchType::Regex,
    };

    proto::GrpcMethodMatch {
        r#type: r#type as i32,
        service: method.service.clone().unwrap_or_default(),
        method: method.method.clone().unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pingora_gateway_controller_k8s_api::{
        httproute::{HttpRouteSpec, HttpRouteTimeouts},
        ObjectMeta,
    };

    fn builder() -> RouteTableBuilder {
        RouteTableBuilder::new("cluster.local".to_string())
    }

    fn http_route(rules: Vec<HttpRouteRule>) -> HttpRoute {
        HttpRoute {
            metadata: ObjectMeta {
                name: Some("r1".to_string()),
                namespace: Some("ns".to_string()),
                ..Default::default()
            },
            spec: HttpRouteSpec {
                parent_refs: None,
                hostnames: Some(vec!["example.com".to_string()]),
                rules: Some(rules),
            },
            status: None,
        }
    }

    fn backend(name: &str, port: i32) -> BackendRef {
        BackendRef {
            name: name.to_string(),
            port: Some(port),
            ..Default::default()
        }
    }

    #[test]
    fn builds_id_hostnames_and_default_match() {
        let route = http_route(vec![HttpRouteRule {
            matches: None,
            backend_refs: Some(vec![backend("svc", 80)]),
            timeouts: None,
        }]);

        let wire = builder().build_http_route(&route);
        assert_eq!(wire.id, "ns/r1");
        assert_eq!(wire.hostnames, vec!["example.com".to_string()]);
        assert_eq!(wire.rules.len(), 1);

        let rule = &wire.rules[0];
        assert_eq!(rule.matches.len(), 1);
        let path = rule.matches[0].path.as_ref().unwrap();
        assert_eq!(path.r#type, proto::PathMatchType::Prefix as i32);
        assert_eq!(path.value, "/");

        assert_eq!(rule.backends.len(), 1);
        assert_eq!(rule.backends[0].address, "svc.ns.svc.cluster.local:80");
        assert_eq!(rule.backends[0].weight, 1);
    }

    #[test]
    fn backend_namespace_defaults_to_route_namespace() {
        let mut cross = backend("svc", 80);
        cross.namespace = Some("ns-b".to_string());
        let route = http_route(vec![HttpRouteRule {
            matches: None,
            backend_refs: Some(vec![cross]),
            timeouts: None,
        }]);

        let wire = builder().build_http_route(&route);
        assert_eq!(
            wire.rules[0].backends[0].address,
            "svc.ns-b.svc.cluster.local:80"
        );
    }

    #[test]
    fn non_service_backends_are_skipped() {
        let mut foreign = backend("svc", 80);
        foreign.kind = Some("UnmanagedThing".to_string());
        let route = http_route(vec![HttpRouteRule {
            matches: None,
            backend_refs: Some(vec![foreign, backend("kept", 8080)]),
            timeouts: None,
        }]);

        let wire = builder().build_http_route(&route);
        assert_eq!(wire.rules[0].backends.len(), 1);
        assert_eq!(
            wire.rules[0].backends[0].address,
            "kept.ns.svc.cluster.local:8080"
        );
    }

    #[test]
    fn weights_default_and_pass_through() {
        let mut weighted = backend("a", 80);
        weighted.weight = Some(70);
        let mut disabled = backend("b", 80);
        disabled.weight = Some(0);
        let route = http_route(vec![HttpRouteRule {
            matches: None,
            backend_refs: Some(vec![weighted, disabled, backend("c", 80)]),
            timeouts: None,
        }]);

        let wire = builder().build_http_route(&route);
        let weights: Vec<u32> = wire.rules[0].backends.iter().map(|b| b.weight).collect();
        // Zero-weight backends stay in the weighted set at the default.
        assert_eq!(weights, vec![70, 1, 1]);
    }

    #[test]
    fn request_timeout_parses_to_millis() {
        let rule = |request: &str| HttpRouteRule {
            matches: None,
            backend_refs: None,
            timeouts: Some(HttpRouteTimeouts {
                request: Some(request.to_string()),
                backend_request: None,
            }),
        };

        let wire = builder().build_http_route(&http_route(vec![
            rule("10s"),
            rule("500ms"),
            rule("1m"),
            rule("not-a-duration"),
            rule("0"),
        ]));
        let timeouts: Vec<u64> = wire.rules.iter().map(|r| r.timeout_ms).collect();
        assert_eq!(timeouts, vec![10_000, 500, 60_000, 0, 0]);
    }

    #[test]
    fn explicit_matches_are_converted() {
        use pingora_gateway_controller_k8s_api::httproute::HttpPathMatch;

        let route = http_route(vec![HttpRouteRule {
            matches: Some(vec![HttpRouteMatch {
                path: Some(HttpPathMatch {
                    r#type: Some(PathMatchType::Exact),
                    value: Some("/api".to_string()),
                }),
                method: Some("GET".to_string()),
                headers: Some(vec![HeaderMatch {
                    r#type: None,
                    name: "x-debug".to_string(),
                    value: "1".to_string(),
                }]),
                query_params: Some(vec![QueryParamMatch {
                    r#type: Some(QueryParamMatchType::RegularExpression),
                    name: "v".to_string(),
                    value: "[0-9]+".to_string(),
                }]),
            }]),
            backend_refs: None,
            timeouts: None,
        }]);

        let wire = builder().build_http_route(&route);
        let m = &wire.rules[0].matches[0];
        assert_eq!(
            m.path.as_ref().unwrap().r#type,
            proto::PathMatchType::Exact as i32
        );
        assert_eq!(m.method, "GET");
        // A header match without a type defaults to exact.
        assert_eq!(m.headers[0].r#type, proto::HeaderMatchType::Exact as i32);
        assert_eq!(
            m.query_params[0].r#type,
            proto::QueryParamMatchType::Regex as i32
        );
    }

    #[test]
    fn grpc_method_match_defaults_to_exact() {
        use pingora_gateway_controller_k8s_api::grpcroute::GrpcRouteSpec;

        let route = GrpcRoute {
            metadata: ObjectMeta {
                name: Some("g1".to_string()),
                namespace: Some("ns".to_string()),
                ..Default::default()
            },
            spec: GrpcRouteSpec {
                parent_refs: None,
                hostnames: Some(vec!["grpc.example.com".to_string()]),
                rules: Some(vec![GrpcRouteRule {
                    matches: Some(vec![GrpcRouteMatch {
                        method: Some(GrpcMethodMatch {
                            r#type: None,
                            service: Some("pkg.Svc".to_string()),
                            method: Some("Get".to_string()),
                        }),
                        headers: None,
                    }]),
                    backend_refs: Some(vec![backend("svc", 50051)]),
                }]),
            },
            status: None,
        };

        let wire = builder().build_grpc_route(&route);
        assert_eq!(wire.id, "ns/g1");
        let method = wire.rules[0].matches[0].method.as_ref().unwrap();
        assert_eq!(method.r#type, proto::GrpcMethodMatchType::Exact as i32);
        assert_eq!(method.service, "pkg.Svc");
        assert_eq!(method.method, "Get");
        assert_eq!(
            wire.rules[0].backends[0].address,
            "svc.ns.svc.cluster.local:50051"
        );
    }

    #[test]
    fn building_twice_yields_identical_output() {
        let route = http_route(vec![HttpRouteRule {
            matches: None,
            backend_refs: Some(vec![backend("svc", 80)]),
            timeouts: Some(HttpRouteTimeouts {
                request: Some("10s".to_string()),
                backend_request: None,
            }),
        }]);
        let b = builder();
        assert_eq!(b.build_http_route(&route), b.build_http_route(&route));
    }
}
