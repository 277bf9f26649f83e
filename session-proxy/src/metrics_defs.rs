use shared::metrics_defs::{MetricDef, MetricType};

pub const FORWARD_REQUESTS: MetricDef = MetricDef {
    name: "forward.requests",
    metric_type: MetricType::Counter,
    description: "Session requests forwarded to the session service. Tagged with outcome.",
};

pub const FORWARD_DURATION: MetricDef = MetricDef {
    name: "forward.duration",
    metric_type: MetricType::Histogram,
    description: "Seconds from receiving a session request until its response has been relayed. \
                  Tagged with outcome.",
};

pub const ALL_METRICS: &[MetricDef] = &[FORWARD_REQUESTS, FORWARD_DURATION];
