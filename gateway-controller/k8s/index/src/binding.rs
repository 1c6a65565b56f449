//! The binding evaluator: walks a Gateway's listeners and decides whether a
//! route attaches, and to which listeners.

use crate::kind;
use anyhow::Result;
use pingora_gateway_controller_core::{BindingReason, BindingResult, RouteInfo};
use pingora_gateway_controller_k8s_api::{
    gateway::{Gateway, Listener},
    ResourceExt,
};

pub use crate::namespace::BindingValidator;

impl BindingValidator {
    /// Evaluates one route against one Gateway, returning the accepted
    /// listeners or the reason the route was rejected.
    pub async fn validate_binding(
        &self,
        gateway: &Gateway,
        route: &RouteInfo,
    ) -> Result<BindingResult> {
        let (matched, rejection) = self.find_matching_listeners(gateway, route).await?;

        if matched.is_empty() {
            let reason = rejection.unwrap_or(BindingReason::NoMatchingParent);
            return Ok(BindingResult::rejected(reason));
        }

        Ok(BindingResult::accepted(matched))
    }

    async fn find_matching_listeners(
        &self,
        gateway: &Gateway,
        route: &RouteInfo,
    ) -> Result<(Vec<String>, Option<BindingReason>)> {
        if gateway.spec.listeners.is_empty() {
            return Ok((Vec::new(), Some(BindingReason::NoMatchingParent)));
        }

        let gateway_namespace = gateway.namespace().unwrap_or_default();

        let mut matched = Vec::new();
        let mut last_rejection = None;

        for listener in &gateway.spec.listeners {
            if let Some(section) = &route.section_name {
                if section != &listener.name {
                    continue;
                }
            }

            let reason = self
                .listener_accepts_route(listener, &gateway_namespace, route)
                .await?;

            if reason == BindingReason::Accepted {
                matched.push(listener.name.clone());
            } else {
                last_rejection = Some(reason);
            }
        }

        if matched.is_empty() {
            // A section-name that matched nothing is indistinguishable from a
            // missing parent.
            if route.section_name.is_some() {
                return Ok((Vec::new(), Some(BindingReason::NoMatchingParent)));
            }

            return Ok((
                Vec::new(),
                last_rejection.or(Some(BindingReason::NoMatchingParent)),
            ));
        }

        Ok((matched, None))
    }

    async fn listener_accepts_route(
        &self,
        listener: &Listener,
        gateway_namespace: &str,
        route: &RouteInfo,
    ) -> Result<BindingReason> {
        if !pingora_gateway_controller_core::hostname::hostnames_intersect(
            listener.hostname.as_deref(),
            &route.hostnames,
        ) {
            return Ok(BindingReason::NoMatchingListenerHostname);
        }

        let allowed = self
            .is_namespace_allowed(
                listener.allowed_routes.as_ref(),
                gateway_namespace,
                &route.namespace,
            )
            .await?;
        if !allowed {
            return Ok(BindingReason::NotAllowedByListeners);
        }

        if !kind::is_route_kind_allowed(
            listener.allowed_routes.as_ref(),
            &listener.protocol,
            route.kind,
        ) {
            return Ok(BindingReason::NotAllowedByListeners);
        }

        Ok(BindingReason::Accepted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_client;
    use pingora_gateway_controller_core::RouteKind;
    use pingora_gateway_controller_k8s_api::{
        gateway::{AllowedRoutes, FromNamespaces, GatewaySpec, RouteNamespaces},
        ObjectMeta,
    };

    fn listener(name: &str, protocol: &str, hostname: Option<&str>) -> Listener {
        Listener {
            name: name.to_string(),
            hostname: hostname.map(str::to_string),
            port: 80,
            protocol: protocol.to_string(),
            allowed_routes: None,
        }
    }

    fn gateway(ns: &str, listeners: Vec<Listener>) -> Gateway {
        Gateway {
            metadata: ObjectMeta {
                name: Some("gw".to_string()),
                namespace: Some(ns.to_string()),
                ..Default::default()
            },
            spec: GatewaySpec {
                gateway_class_name: "pingora".to_string(),
                listeners,
            },
            status: None,
        }
    }

    fn route(ns: &str, hostnames: &[&str], section: Option<&str>) -> RouteInfo {
        RouteInfo {
            name: "r1".to_string(),
            namespace: ns.to_string(),
            hostnames: hostnames.iter().map(|h| h.to_string()).collect(),
            kind: RouteKind::Http,
            section_name: section.map(str::to_string),
        }
    }

    fn validator() -> BindingValidator {
        BindingValidator::new(test_client::unreachable())
    }

    #[tokio::test]
    async fn accepts_same_namespace_route_on_plain_listener() {
        let gw = gateway("ns", vec![listener("http", "HTTP", None)]);
        let result = validator()
            .validate_binding(&gw, &route("ns", &["example.com"], None))
            .await
            .unwrap();
        assert!(result.accepted);
        assert_eq!(result.matched_listeners, vec!["http".to_string()]);
        assert_eq!(result.message, "Route accepted");
    }

    #[tokio::test]
    async fn gateway_without_listeners_is_no_matching_parent() {
        let gw = gateway("ns", vec![]);
        let result = validator()
            .validate_binding(&gw, &route("ns", &[], None))
            .await
            .unwrap();
        assert!(!result.accepted);
        assert_eq!(result.reason, BindingReason::NoMatchingParent);
    }

    #[tokio::test]
    async fn hostname_mismatch_is_reported() {
        let gw = gateway("ns", vec![listener("http", "HTTP", Some("*.example.com"))]);
        let result = validator()
            .validate_binding(&gw, &route("ns", &["other.com"], None))
            .await
            .unwrap();
        assert!(!result.accepted);
        assert_eq!(result.reason, BindingReason::NoMatchingListenerHostname);
    }

    #[tokio::test]
    async fn wildcard_does_not_match_apex() {
        let gw = gateway("ns", vec![listener("http", "HTTP", Some("*.example.com"))]);
        let result = validator()
            .validate_binding(&gw, &route("ns", &["example.com"], None))
            .await
            .unwrap();
        assert!(!result.accepted);
        assert_eq!(result.reason, BindingReason::NoMatchingListenerHostname);
    }

    #[tokio::test]
    async fn cross_namespace_route_is_rejected_by_default() {
        let gw = gateway("ns", vec![listener("http", "HTTP", None)]);
        let result = validator()
            .validate_binding(&gw, &route("other", &[], None))
            .await
            .unwrap();
        assert!(!result.accepted);
        assert_eq!(result.reason, BindingReason::NotAllowedByListeners);
    }

    #[tokio::test]
    async fn disallowed_kind_is_rejected() {
        let gw = gateway("ns", vec![listener("tcp", "TCP", None)]);
        let result = validator()
            .validate_binding(&gw, &route("ns", &[], None))
            .await
            .unwrap();
        assert!(!result.accepted);
        assert_eq!(result.reason, BindingReason::NotAllowedByListeners);
    }

    #[tokio::test]
    async fn section_name_restricts_the_walk() {
        let gw = gateway(
            "ns",
            vec![
                listener("http", "HTTP", Some("*.a.com")),
                listener("https", "HTTPS", Some("*.b.com")),
            ],
        );
        let result = validator()
            .validate_binding(&gw, &route("ns", &["x.b.com"], Some("https")))
            .await
            .unwrap();
        assert!(result.accepted);
        assert_eq!(result.matched_listeners, vec!["https".to_string()]);
    }

    #[tokio::test]
    async fn section_name_without_matching_listener_is_no_matching_parent() {
        let gw = gateway("ns", vec![listener("http", "HTTP", None)]);
        let result = validator()
            .validate_binding(&gw, &route("ns", &[], Some("missing")))
            .await
            .unwrap();
        assert!(!result.accepted);
        assert_eq!(result.reason, BindingReason::NoMatchingParent);
    }

    #[tokio::test]
    async fn section_name_with_rejected_listener_is_no_matching_parent() {
        let gw = gateway("ns", vec![listener("http", "HTTP", Some("*.a.com"))]);
        let result = validator()
            .validate_binding(&gw, &route("ns", &["x.b.com"], Some("http")))
            .await
            .unwrap();
        assert!(!result.accepted);
        assert_eq!(result.reason, BindingReason::NoMatchingParent);
    }

    #[tokio::test]
    async fn most_recent_rejection_reason_wins() {
        let gw = gateway(
            "ns",
            vec![
                listener("a", "HTTP", Some("*.a.com")),
                listener("b", "TCP", None),
            ],
        );
        let result = validator()
            .validate_binding(&gw, &route("ns", &["x.b.com"], None))
            .await
            .unwrap();
        assert!(!result.accepted);
        assert_eq!(result.reason, BindingReason::NotAllowedByListeners);
    }

    #[tokio::test]
    async fn route_can_match_multiple_listeners() {
        let gw = gateway(
            "ns",
            vec![
                listener("http", "HTTP", None),
                listener("https", "HTTPS", None),
            ],
        );
        let result = validator()
            .validate_binding(&gw, &route("ns", &["example.com"], None))
            .await
            .unwrap();
        assert!(result.accepted);
        assert_eq!(
            result.matched_listeners,
            vec!["http".to_string(), "https".to_string()]
        );
    }

    #[tokio::test]
    async fn allowed_routes_all_admits_cross_namespace() {
        let mut l = listener("http", "HTTP", None);
        l.allowed_routes = Some(AllowedRoutes {
            namespaces: Some(RouteNamespaces {
                from: Some(FromNamespaces::All),
                selector: None,
            }),
            kinds: None,
        });
        let gw = gateway("ns", vec![l]);
        let result = validator()
            .validate_binding(&gw, &route("other", &[], None))
            .await
            .unwrap();
        assert!(result.accepted);
    }
}
