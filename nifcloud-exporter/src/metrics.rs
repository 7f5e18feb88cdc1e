//! Metric naming and the fixed RDB metric catalog.

/// Labels attached to every per-instance RDB sample, in exposition order.
pub const RDB_LABELS: &[&str] = &["env", "region", "db_instance"];

/// Provider-side names of the RDB metrics queried for every instance.
pub const RDB_METRIC_NAMES: &[&str] = &[
    "BinLogDiskUsage",
    "CPUUtilization",
    "DatabaseConnections",
    "DiskQueueDepth",
    "FreeableMemory",
    "FreeStorageSpace",
    "ReplicaLag",
    "SwapUsage",
    "ReadIOPS",
    "WriteIOPS",
    "ReadThroughput",
    "WriteThroughput",
];

pub const SCRAPE_DURATION_NAME: &str = "nifcloud_scrape_duration_seconds";
pub const FAILURE_REQUESTS_NAME: &str = "nifcloud_failure_requests";
pub const REQUESTS_TOTAL_NAME: &str = "nifcloud_requests_total";

/// Prometheus metric type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Gauge,
    Counter,
}

impl MetricKind {
    /// The type name used in `# TYPE` comments.
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Gauge => "gauge",
            MetricKind::Counter => "counter",
        }
    }
}

/// Static schema of one exposition family.
#[derive(Debug, Clone)]
pub struct MetricDesc {
    pub name: String,
    pub help: String,
    pub kind: MetricKind,
    pub labels: &'static [&'static str],
}

/// One catalog entry: a provider metric and the family it is exposed as.
#[derive(Debug, Clone)]
pub struct RdbMetric {
    /// Name sent in `NiftyGetMetricStatistics` requests, e.g. `CPUUtilization`.
    pub api_name: &'static str,
    /// Exposition family name, e.g. `nifcloud_rdb_cpu_utilization`.
    pub fq_name: String,
}

impl RdbMetric {
    /// Exposition schema for this entry. The provider name doubles as the
    /// help text.
    pub fn desc(&self) -> MetricDesc {
        MetricDesc {
            name: self.fq_name.clone(),
            help: self.api_name.to_string(),
            kind: MetricKind::Gauge,
            labels: RDB_LABELS,
        }
    }
}

/// Builds the fixed per-instance metric catalog, one entry per provider
/// metric, in exposition order.
pub fn rdb_metric_catalog() -> Vec<RdbMetric> {
    RDB_METRIC_NAMES
        .iter()
        .map(|name| RdbMetric {
            api_name: name,
            fq_name: format!("nifcloud_rdb_{}", to_snake_case(name)),
        })
        .collect()
}

/// Exposition schema for the exporter's own health metrics, in the order
/// they are advertised and emitted.
pub fn health_descs() -> Vec<MetricDesc> {
    vec![
        MetricDesc {
            name: SCRAPE_DURATION_NAME.to_string(),
            help: "Time this NIFCLOUD scrape took, in seconds.".to_string(),
            kind: MetricKind::Gauge,
            labels: &[],
        },
        MetricDesc {
            name: FAILURE_REQUESTS_NAME.to_string(),
            help: "The number of failure request made by this scrape.".to_string(),
            kind: MetricKind::Counter,
            labels: &[],
        },
        MetricDesc {
            name: REQUESTS_TOTAL_NAME.to_string(),
            help: "API requests made to NIFCLOUD".to_string(),
            kind: MetricKind::Counter,
            labels: &[],
        },
    ]
}

/// Converts a provider metric name to snake case.
///
/// An underscore is inserted before an uppercase letter that starts a new
/// word: one that is followed or preceded by a lowercase letter. Uppercase
/// runs stay together until their last letter, so `CPUUtilization` becomes
/// `cpu_utilization` and `ReadIOPS` becomes `read_iops`.
pub fn to_snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if i > 0
            && c.is_uppercase()
            && (chars.get(i + 1).is_some_and(|next| next.is_lowercase())
                || chars[i - 1].is_lowercase())
        {
            out.push('_');
        }
        out.extend(c.to_lowercase());
    }

    out
}
