//! The namespace gate: whether a listener's allowedRoutes admits a route's
//! namespace.

use anyhow::Result;
use kube::Api;
use pingora_gateway_controller_k8s_api::{
    gateway::{AllowedRoutes, FromNamespaces},
    Client, Labels, Namespace,
};

/// Validates route-to-listener bindings against a Gateway's listeners.
pub struct BindingValidator {
    client: Client,
}

impl BindingValidator {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Whether a route in `route_namespace` may attach to a listener of a
    /// Gateway in `gateway_namespace`, per the listener's allowedRoutes.
    pub async fn is_namespace_allowed(
        &self,
        allowed_routes: Option<&AllowedRoutes>,
        gateway_namespace: &str,
        route_namespace: &str,
    ) -> Result<bool> {
        match namespace_from(allowed_routes) {
            FromNamespaces::Same => Ok(gateway_namespace == route_namespace),
            FromNamespaces::All => Ok(true),
            FromNamespaces::None => Ok(false),
            FromNamespaces::Selector => {
                self.namespace_matches_selector(allowed_routes, route_namespace)
                    .await
            }
        }
    }

    async fn namespace_matches_selector(
        &self,
        allowed_routes: Option<&AllowedRoutes>,
        route_namespace: &str,
    ) -> Result<bool> {
        let selector = match allowed_routes
            .and_then(|ar| ar.namespaces.as_ref())
            .and_then(|ns| ns.selector.as_ref())
        {
            Some(selector) => selector,
            None => return Ok(false),
        };

        // A namespace that cannot be found is denied, not an error.
        let namespace = match Api::<Namespace>::all(self.client.clone())
            .get_opt(route_namespace)
            .await?
        {
            Some(ns) => ns,
            None => return Ok(false),
        };

        let labels = Labels::from(namespace.metadata.labels);
        Ok(selector.matches(&labels))
    }
}

/// The effective `from` policy; absent fields default to Same.
pub(crate) fn namespace_from(allowed_routes: Option<&AllowedRoutes>) -> FromNamespaces {
    allowed_routes
        .and_then(|ar| ar.namespaces.as_ref())
        .and_then(|ns| ns.from)
        .unwrap_or(FromNamespaces::Same)
}
