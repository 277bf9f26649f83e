//! Metrics definitions for service discovery.

use shared::metrics_defs::{MetricDef, MetricType};

pub const LOOKUP_FAILURES: MetricDef = MetricDef {
    name: "registry.lookup.failures",
    metric_type: MetricType::Counter,
    description: "Endpoint lookups that failed and were left out of the result",
};

pub const ALL_METRICS: &[MetricDef] = &[LOOKUP_FAILURES];
