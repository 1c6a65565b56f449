/// Holds the process-wide cluster parameters every component needs.
#[derive(Clone, Debug)]
pub struct ClusterInfo {
    /// E.g. "cluster.local".
    pub cluster_domain: String,

    /// The GatewayClass this controller instance watches.
    pub gateway_class_name: String,

    /// The controller identifier reported in route statuses.
    pub controller_name: String,
}

impl ClusterInfo {
    /// The in-cluster DNS authority for a Service port.
    pub fn service_dns_authority(&self, ns: &str, svc: &str, port: i32) -> String {
        format!("{}.{}.svc.{}:{}", svc, ns, self.cluster_domain, port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_authority_includes_domain_and_port() {
        let info = ClusterInfo {
            cluster_domain: "cluster.local".to_string(),
            gateway_class_name: "pingora".to_string(),
            controller_name: "pingora.dev/gateway-controller".to_string(),
        };
        assert_eq!(
            info.service_dns_authority("ns", "svc", 80),
            "svc.ns.svc.cluster.local:80"
        );
    }
}
