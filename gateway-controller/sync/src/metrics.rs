//! Sync and proxy-channel metrics. The names and label sets are contracts:
//! downstream alerting keys on them.

use prometheus_client::{
    encoding::{EncodeLabelSet, LabelSetEncoder},
    metrics::{counter::Counter, family::Family, gauge::Gauge, histogram::Histogram},
    registry::{Registry, Unit},
};
use std::time::Duration;

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct OutcomeLabels {
    status: &'static str,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct ErrorTypeLabels {
    error_type: &'static str,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct MethodLabels {
    method: &'static str,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct MethodStatusLabels {
    method: &'static str,
    status: &'static str,
}

// `type` is a raw identifier, so this label set is encoded by hand.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
struct RouteTypeLabels {
    route_type: &'static str,
}

impl EncodeLabelSet for RouteTypeLabels {
    fn encode(&self, mut encoder: LabelSetEncoder<'_>) -> Result<(), std::fmt::Error> {
        use std::fmt::Write;
        let mut label = encoder.encode_label();
        let mut key = label.encode_label_key()?;
        key.write_str("type")?;
        let mut value = key.encode_label_value()?;
        value.write_str(self.route_type)?;
        value.finish()
    }
}

/// Metrics recorded by the route syncer.
#[derive(Clone, Debug)]
pub struct SyncMetrics {
    sync_duration: Family<OutcomeLabels, Histogram>,
    synced_routes: Family<RouteTypeLabels, Gauge>,
    sync_errors: Family<ErrorTypeLabels, Counter>,
    grpc_duration: Family<MethodLabels, Histogram>,
    grpc_calls: Family<MethodStatusLabels, Counter>,
}

impl SyncMetrics {
    pub fn register(reg: &mut Registry) -> Self {
        let sync_duration = Family::<OutcomeLabels, Histogram>::new_with_constructor(|| {
            Histogram::new([0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0].into_iter())
        });
        reg.register_with_unit(
            "sync_duration",
            "Duration of route synchronization to the Pingora proxy",
            Unit::Seconds,
            sync_duration.clone(),
        );

        let synced_routes = Family::<RouteTypeLabels, Gauge>::default();
        reg.register(
            "synced_routes",
            "Number of routes synced by type",
            synced_routes.clone(),
        );

        let sync_errors = Family::<ErrorTypeLabels, Counter>::default();
        reg.register(
            "sync_errors",
            "Total sync errors by type",
            sync_errors.clone(),
        );

        let grpc_duration = Family::<MethodLabels, Histogram>::new_with_constructor(|| {
            Histogram::new([0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0].into_iter())
        });
        reg.register_with_unit(
            "grpc_duration",
            "Duration of gRPC calls to the Pingora proxy",
            Unit::Seconds,
            grpc_duration.clone(),
        );

        let grpc_calls = Family::<MethodStatusLabels, Counter>::default();
        reg.register(
            "grpc_calls",
            "Total gRPC calls to the Pingora proxy",
            grpc_calls.clone(),
        );

        Self {
            sync_duration,
            synced_routes,
            sync_errors,
            grpc_duration,
            grpc_calls,
        }
    }

    pub fn record_sync_duration(&self, status: &'static str, elapsed: Duration) {
        self.sync_duration
            .get_or_create(&OutcomeLabels { status })
            .observe(elapsed.as_secs_f64());
    }

    pub fn record_synced_routes(&self, route_type: &'static str, count: usize) {
        self.synced_routes
            .get_or_create(&RouteTypeLabels { route_type })
            .set(count as i64);
    }

    pub fn record_sync_error(&self, error_type: &'static str) {
        self.sync_errors
            .get_or_create(&ErrorTypeLabels { error_type })
            .inc();
    }

    pub fn record_grpc_call(&self, method: &'static str, status: &'static str, elapsed: Duration) {
        self.grpc_duration
            .get_or_create(&MethodLabels { method })
            .observe(elapsed.as_secs_f64());
        self.grpc_calls
            .get_or_create(&MethodStatusLabels { method, status })
            .inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus_client::encoding::text::encode;

    #[test]
    fn exposition_carries_the_contract_names() {
        let mut registry = Registry::with_prefix("pingora");
        let metrics = SyncMetrics::register(&mut registry);

        metrics.record_sync_duration("success", Duration::from_millis(120));
        metrics.record_synced_routes("http", 3);
        metrics.record_sync_error("connection_failed");
        metrics.record_grpc_call("UpdateRoutes", "success", Duration::from_millis(15));

        let mut out = String::new();
        encode(&mut out, &registry).unwrap();

        assert!(out.contains("pingora_sync_duration_seconds"));
        assert!(out.contains("pingora_synced_routes{type=\"http\"} 3"));
        assert!(out.contains("pingora_sync_errors_total{error_type=\"connection_failed\"} 1"));
        assert!(out.contains("pingora_grpc_duration_seconds"));
        assert!(out.contains(
            "pingora_grpc_calls_total{method=\"UpdateRoutes\",status=\"success\"} 1"
        ));
    }
}
