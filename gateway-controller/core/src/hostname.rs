//! Hostname intersection between a listener and a route, per the Gateway
//! API attachment rules.

/// Returns true iff the listener hostname and the route hostname list have a
/// non-empty intersection.
///
/// An absent or empty listener hostname accepts every route, and a route
/// without hostnames matches every listener. Otherwise at least one route
/// hostname must match the listener hostname.
pub fn hostnames_intersect<S: AsRef<str>>(listener: Option<&str>, route_hostnames: &[S]) -> bool {
    let listener = match listener {
        Some(h) if !h.is_empty() => h,
        _ => return true,
    };

    if route_hostnames.is_empty() {
        return true;
    }

    route_hostnames
        .iter()
        .any(|route| hostname_matches(listener, route.as_ref()))
}

/// Compares one listener hostname against one route hostname. Either side may
/// carry a single leading wildcard label (`*.example.com`). DNS names are
/// case-insensitive, so both sides are folded to lowercase first.
fn hostname_matches(listener: &str, route: &str) -> bool {
    let listener = listener.to_ascii_lowercase();
    let route = route.to_ascii_lowercase();

    if listener == route {
        return true;
    }

    let listener_is_wildcard = listener.starts_with("*.");
    let route_is_wildcard = route.starts_with("*.");

    if listener_is_wildcard && route_is_wildcard {
        return listener[1..] == route[1..];
    }

    if listener_is_wildcard {
        return matches_wildcard(&listener, &route);
    }

    if route_is_wildcard {
        return matches_wildcard(&route, &listener);
    }

    false
}

/// Whether `host` falls under the `*.suffix` pattern `wildcard`.
///
/// Multi-level subdomains match (`bar.foo.example.com` under
/// `*.example.com`), consistent with Envoy, Istio and Kong. The apex domain
/// itself never matches its own wildcard.
fn matches_wildcard(wildcard: &str, host: &str) -> bool {
    let suffix = &wildcard[1..];

    if !host.ends_with(suffix) {
        return false;
    }

    host != &suffix[1..]
}
