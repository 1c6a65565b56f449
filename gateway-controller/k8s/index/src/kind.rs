//! The route-kind gate: which route kinds a listener admits.

use pingora_gateway_controller_core::RouteKind;
use pingora_gateway_controller_k8s_api::{
    gateway::AllowedRoutes, RouteGroupKind, GATEWAY_API_GROUP,
};

/// Returns true iff the listener admits the given route kind.
///
/// An explicit non-empty allowedRoutes.kinds list is taken verbatim;
/// otherwise the defaults are derived from the listener protocol.
pub fn is_route_kind_allowed(
    allowed_routes: Option<&AllowedRoutes>,
    protocol: &str,
    kind: RouteKind,
) -> bool {
    allowed_kinds(allowed_routes, protocol)
        .iter()
        .any(|allowed| kind_matches(allowed, kind))
}

fn allowed_kinds(allowed_routes: Option<&AllowedRoutes>, protocol: &str) -> Vec<RouteGroupKind> {
    if let Some(kinds) = allowed_routes.and_then(|ar| ar.kinds.as_ref()) {
        if !kinds.is_empty() {
            return kinds.clone();
        }
    }

    default_kinds_for_protocol(protocol)
}

fn default_kinds_for_protocol(protocol: &str) -> Vec<RouteGroupKind> {
    let gateway_kind = |kind: &str| RouteGroupKind {
        group: Some(GATEWAY_API_GROUP.to_string()),
        kind: kind.to_string(),
    };

    match protocol {
        "TLS" => vec![gateway_kind("TLSRoute")],
        "TCP" => vec![gateway_kind("TCPRoute")],
        "UDP" => vec![gateway_kind("UDPRoute")],
        // HTTP, HTTPS and anything unknown get the HTTP-like defaults; an
        // unrecognized protocol admits rather than rejects.
        _ => vec![gateway_kind("HTTPRoute"), gateway_kind("GRPCRoute")],
    }
}

fn kind_matches(allowed: &RouteGroupKind, kind: RouteKind) -> bool {
    if allowed.kind != kind.kind() {
        return false;
    }

    // A nil or empty group resolves to the Gateway API group.
    match allowed.group.as_deref() {
        None | Some("") => true,
        Some(group) => group == GATEWAY_API_GROUP,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allowed(kinds: Vec<RouteGroupKind>) -> AllowedRoutes {
        AllowedRoutes {
            namespaces: None,
            kinds: Some(kinds),
        }
    }

    #[test]
    fn http_protocols_default_to_both_route_kinds() {
        for protocol in ["HTTP", "HTTPS"] {
            assert!(is_route_kind_allowed(None, protocol, RouteKind::Http));
            assert!(is_route_kind_allowed(None, protocol, RouteKind::Grpc));
        }
    }

    #[test]
    fn l4_protocols_reject_http_routes() {
        for protocol in ["TLS", "TCP", "UDP"] {
            assert!(!is_route_kind_allowed(None, protocol, RouteKind::Http));
            assert!(!is_route_kind_allowed(None, protocol, RouteKind::Grpc));
        }
    }

    #[test]
    fn unknown_protocol_behaves_like_http() {
        assert!(is_route_kind_allowed(None, "CARRIER-PIGEON", RouteKind::Http));
        assert!(is_route_kind_allowed(None, "CARRIER-PIGEON", RouteKind::Grpc));
    }

    #[test]
    fn explicit_kinds_are_taken_verbatim() {
        let ar = allowed(vec![RouteGroupKind {
            group: None,
            kind: "HTTPRoute".to_string(),
        }]);
        assert!(is_route_kind_allowed(Some(&ar), "HTTP", RouteKind::Http));
        assert!(!is_route_kind_allowed(Some(&ar), "HTTP", RouteKind::Grpc));
    }

    #[test]
    fn empty_kind_list_falls_back_to_protocol_defaults() {
        let ar = allowed(vec![]);
        assert!(is_route_kind_allowed(Some(&ar), "HTTP", RouteKind::Grpc));
    }

    #[test]
    fn foreign_group_is_rejected() {
        let ar = allowed(vec![RouteGroupKind {
            group: Some("example.com".to_string()),
            kind: "HTTPRoute".to_string(),
        }]);
        assert!(!is_route_kind_allowed(Some(&ar), "HTTP", RouteKind::Http));
    }

    #[test]
    fn empty_group_resolves_to_gateway_api_group() {
        let ar = allowed(vec![RouteGroupKind {
            group: Some(String::new()),
            kind: "GRPCRoute".to_string(),
        }]);
        assert!(is_route_kind_allowed(Some(&ar), "HTTP", RouteKind::Grpc));
    }
}
