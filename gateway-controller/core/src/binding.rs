//! The route-to-listener binding model shared by the evaluator, the syncer
//! and the status writers.

/// The two route kinds that share the binding model.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum RouteKind {
    Http,
    Grpc,
}

impl RouteKind {
    /// The Kubernetes kind name.
    pub fn kind(&self) -> &'static str {
        match self {
            RouteKind::Http => "HTTPRoute",
            RouteKind::Grpc => "GRPCRoute",
        }
    }

    /// The route-type label used in metrics.
    pub fn as_metric_label(&self) -> &'static str {
        match self {
            RouteKind::Http => "http",
            RouteKind::Grpc => "grpc",
        }
    }
}

impl std::fmt::Display for RouteKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.kind())
    }
}

/// The slice of a route the binding evaluator needs.
#[derive(Clone, Debug)]
pub struct RouteInfo {
    pub name: String,
    pub namespace: String,
    pub hostnames: Vec<String>,
    pub kind: RouteKind,
    /// Restricts the binding to the named listener when set.
    pub section_name: Option<String>,
}

/// Why a binding was rejected (or that it was not).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BindingReason {
    Accepted,
    NoMatchingListenerHostname,
    NotAllowedByListeners,
    NoMatchingParent,
    /// The push to the proxy failed; the route is accepted but not yet
    /// programmed.
    Pending,
}

impl BindingReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            BindingReason::Accepted => "Accepted",
            BindingReason::NoMatchingListenerHostname => "NoMatchingListenerHostname",
            BindingReason::NotAllowedByListeners => "NotAllowedByListeners",
            BindingReason::NoMatchingParent => "NoMatchingParent",
            BindingReason::Pending => "Pending",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            BindingReason::Accepted => "Route accepted",
            BindingReason::NoMatchingListenerHostname => {
                "No listener hostname matches route hostnames"
            }
            BindingReason::NotAllowedByListeners => {
                "Route not allowed by listener allowedRoutes policy"
            }
            BindingReason::NoMatchingParent => "No matching listener found",
            BindingReason::Pending => "Route not accepted",
        }
    }
}

/// Binding results for one route, keyed by parent-ref index. A route with
/// multiple parents yields one result per qualifying parent.
pub type ParentBindings = std::collections::HashMap<usize, BindingResult>;

/// The outcome of evaluating one route parent-ref against one Gateway.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BindingResult {
    pub accepted: bool,
    pub reason: BindingReason,
    pub message: String,
    /// Listener names the route bound to, in listener declaration order.
    pub matched_listeners: Vec<String>,
}

impl BindingResult {
    pub fn accepted(matched_listeners: Vec<String>) -> Self {
        Self {
            accepted: true,
            reason: BindingReason::Accepted,
            message: BindingReason::Accepted.message().to_string(),
            matched_listeners,
        }
    }

    pub fn rejected(reason: BindingReason) -> Self {
        Self {
            accepted: false,
            reason,
            message: reason.message().to_string(),
            matched_listeners: Vec::new(),
        }
    }
}
