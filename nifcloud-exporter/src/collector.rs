//! Collector that scrapes the configured RDB instances on demand.
//!
//! Each exposition pass fans out one task per (environment, instance) pair.
//! A task walks the metric catalog serially, issuing one API call per metric
//! and forwarding produced samples over a shared channel. The pass completes
//! only after every task has finished, then appends the health samples.

use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use nifcloud_rdb::{
    Credential, Dimension, MetricStatistics, NiftyGetMetricStatisticsInput, RdbClient,
};

use crate::config::{Config, RdbEnv};
use crate::metrics::{
    FAILURE_REQUESTS_NAME, MetricDesc, REQUESTS_TOTAL_NAME, RdbMetric, SCRAPE_DURATION_NAME,
    health_descs, rdb_metric_catalog,
};

/// Dimension name scoping a query to one database instance.
const INSTANCE_DIMENSION: &str = "DBInstanceIdentifier";

/// One exposition sample, with label values in schema order.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub name: String,
    pub label_values: Vec<String>,
    pub value: f64,
}

/// Process-lifetime scrape health. The request and failure counters are
/// cumulative across passes, the duration gauge is overwritten by each pass.
#[derive(Debug, Default)]
pub struct ScrapeStats {
    requests_total: AtomicU64,
    failure_requests: AtomicU64,
    scrape_duration_bits: AtomicU64,
}

impl ScrapeStats {
    fn inc_requests(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
    }

    fn inc_failures(&self) {
        self.failure_requests.fetch_add(1, Ordering::Relaxed);
    }

    fn set_scrape_duration(&self, seconds: f64) {
        self.scrape_duration_bits
            .store(seconds.to_bits(), Ordering::Relaxed);
    }

    /// Total API requests issued since startup.
    pub fn requests_total(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    /// Total failed API requests since startup.
    pub fn failure_requests(&self) -> u64 {
        self.failure_requests.load(Ordering::Relaxed)
    }

    /// Duration of the most recent pass, in seconds.
    pub fn scrape_duration(&self) -> f64 {
        f64::from_bits(self.scrape_duration_bits.load(Ordering::Relaxed))
    }
}

/// Result of one metric query. `failed` drives the failure counter; an
/// empty response is not a failure.
#[derive(Debug, Default)]
struct ScrapeOutcome {
    sample: Option<Sample>,
    failed: bool,
}

/// Queries one metric for one instance. A produced sample carries the sum
/// statistic of the first returned datapoint. Errors are swallowed here;
/// the caller accounts for them through the outcome.
async fn scrape_metric<C: MetricStatistics>(
    client: &C,
    metric: &RdbMetric,
    labels: &[String],
    instance: &str,
    start_time: &str,
) -> ScrapeOutcome {
    let input = NiftyGetMetricStatisticsInput {
        dimensions: vec![Dimension {
            name: INSTANCE_DIMENSION.to_string(),
            value: instance.to_string(),
        }],
        metric_name: metric.api_name.to_string(),
        start_time: start_time.to_string(),
    };

    let output = match client.nifty_get_metric_statistics(&input).await {
        Ok(output) => output,
        Err(error) => {
            debug!(
                metric = metric.api_name,
                db_instance = instance,
                %error,
                "Metric query failed"
            );
            return ScrapeOutcome {
                sample: None,
                failed: true,
            };
        }
    };

    let sample = output.datapoints.first().map(|first| Sample {
        name: metric.fq_name.clone(),
        label_values: labels.to_vec(),
        value: first.sum,
    });

    ScrapeOutcome {
        sample,
        failed: false,
    }
}

/// Scrapes the full catalog for one instance, serially. Every attempt
/// counts one request before the result is known.
async fn scrape_instance<C: MetricStatistics>(
    client: &C,
    catalog: &[RdbMetric],
    stats: &ScrapeStats,
    labels: &[String],
    instance: &str,
    tx: &mpsc::UnboundedSender<Sample>,
) {
    let start_time = lookback_start_time(Utc::now());

    for metric in catalog {
        stats.inc_requests();
        let outcome = scrape_metric(client, metric, labels, instance, &start_time).await;
        if outcome.failed {
            stats.inc_failures();
        }
        if let Some(sample) = outcome.sample {
            // Receiver gone means the pass is already over.
            if tx.send(sample).is_err() {
                return;
            }
        }
    }
}

/// Start of the query window: one minute before `now`, in the unpadded
/// `YYYY-M-D HH:MM` form the statistics API expects.
fn lookback_start_time(now: DateTime<Utc>) -> String {
    (now - chrono::Duration::minutes(1))
        .format("%Y-%-m-%-d %H:%M")
        .to_string()
}

struct EnvScraper<C> {
    env: RdbEnv,
    client: Arc<C>,
}

/// Collector over every configured environment, generic over the API client
/// so passes can run against stub implementations in tests.
pub struct NifcloudCollector<C> {
    envs: Vec<EnvScraper<C>>,
    catalog: Arc<Vec<RdbMetric>>,
    stats: Arc<ScrapeStats>,
}

/// Shareable collector handle.
pub type SharedCollector<C> = Arc<NifcloudCollector<C>>;

impl NifcloudCollector<RdbClient> {
    /// Builds a collector with one regional API client per environment.
    pub fn from_config(config: &Config) -> Self {
        let envs = config
            .rdb
            .iter()
            .map(|env| EnvScraper {
                client: Arc::new(RdbClient::new(
                    &env.region,
                    Credential::new(&env.access_key_id, &env.secret_access_key),
                )),
                env: env.clone(),
            })
            .collect();
        Self::from_scrapers(envs)
    }
}

impl<C: MetricStatistics + 'static> NifcloudCollector<C> {
    /// Builds a collector over explicit per-environment clients.
    pub fn with_clients(envs: Vec<(RdbEnv, C)>) -> Self {
        Self::from_scrapers(
            envs.into_iter()
                .map(|(env, client)| EnvScraper {
                    env,
                    client: Arc::new(client),
                })
                .collect(),
        )
    }

    fn from_scrapers(envs: Vec<EnvScraper<C>>) -> Self {
        Self {
            envs,
            catalog: Arc::new(rdb_metric_catalog()),
            stats: Arc::new(ScrapeStats::default()),
        }
    }

    /// Scrape health counters.
    pub fn stats(&self) -> &ScrapeStats {
        &self.stats
    }

    /// Every family this collector can emit: the three health metrics
    /// first, then the per-instance catalog.
    pub fn describe(&self) -> Vec<MetricDesc> {
        let mut descs = health_descs();
        descs.extend(self.catalog.iter().map(RdbMetric::desc));
        descs
    }

    /// Runs one full scrape pass and returns every produced sample plus the
    /// three health samples.
    ///
    /// Passes are not serialized: overlapping invocations run independently
    /// and share only the health counters.
    pub async fn collect(&self) -> Vec<Sample> {
        let started = Instant::now();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let mut tasks = Vec::new();
        for scraper in &self.envs {
            for instance in &scraper.env.instances {
                let client = Arc::clone(&scraper.client);
                let catalog = Arc::clone(&self.catalog);
                let stats = Arc::clone(&self.stats);
                let labels = vec![
                    scraper.env.name.clone(),
                    scraper.env.region.clone(),
                    instance.name.clone(),
                ];
                let instance = instance.name.clone();
                let tx = tx.clone();

                tasks.push(tokio::spawn(async move {
                    scrape_instance(client.as_ref(), &catalog, &stats, &labels, &instance, &tx)
                        .await;
                }));
            }
        }
        drop(tx);

        // The channel closes once every task has dropped its sender.
        let mut samples = Vec::new();
        while let Some(sample) = rx.recv().await {
            samples.push(sample);
        }
        for task in tasks {
            // A panicked task loses its samples but never aborts the pass.
            if let Err(error) = task.await {
                warn!(%error, "Scrape task failed");
            }
        }

        let duration = started.elapsed().as_secs_f64();
        self.stats.set_scrape_duration(duration);

        samples.push(Sample {
            name: SCRAPE_DURATION_NAME.to_string(),
            label_values: Vec::new(),
            value: duration,
        });
        samples.push(Sample {
            name: FAILURE_REQUESTS_NAME.to_string(),
            label_values: Vec::new(),
            value: self.stats.failure_requests() as f64,
        });
        samples.push(Sample {
            name: REQUESTS_TOTAL_NAME.to_string(),
            label_values: Vec::new(),
            value: self.stats.requests_total() as f64,
        });

        debug!(
            samples = samples.len(),
            duration_seconds = duration,
            "Scrape pass complete"
        );

        samples
    }

    /// Runs a scrape pass and renders it in Prometheus text format.
    pub async fn render(&self) -> String {
        let samples = self.collect().await;
        render_exposition(&self.describe(), &samples)
    }
}

/// Renders samples grouped into families, sorted by family name. Families
/// with no samples are omitted.
fn render_exposition(descs: &[MetricDesc], samples: &[Sample]) -> String {
    let mut output = Vec::with_capacity(samples.len() * 100);

    let mut descs: Vec<&MetricDesc> = descs.iter().collect();
    descs.sort_by(|a, b| a.name.cmp(&b.name));

    for desc in descs {
        let series: Vec<&Sample> = samples.iter().filter(|s| s.name == desc.name).collect();
        if series.is_empty() {
            continue;
        }

        writeln!(output, "# HELP {} {}", desc.name, desc.help).ok();
        writeln!(output, "# TYPE {} {}", desc.name, desc.kind.as_str()).ok();

        for sample in series {
            writeln!(
                output,
                "{}{} {}",
                sample.name,
                format_labels(desc.labels, &sample.label_values),
                format_value(sample.value)
            )
            .ok();
        }
    }

    String::from_utf8(output).unwrap_or_default()
}

/// Format label names and values for Prometheus exposition format.
fn format_labels(names: &[&str], values: &[String]) -> String {
    if values.is_empty() {
        return String::new();
    }

    let parts: Vec<String> = names
        .iter()
        .zip(values)
        .map(|(name, value)| format!("{}=\"{}\"", name, escape_label_value(value)))
        .collect();

    format!("{{{}}}", parts.join(","))
}

/// Escape special characters in label values.
fn escape_label_value(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '"' => result.push_str("\\\""),
            '\n' => result.push_str("\\n"),
            _ => result.push(c),
        }
    }
    result
}

/// Format a floating point value for Prometheus.
fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value.is_sign_positive() {
            "+Inf".to_string()
        } else {
            "-Inf".to_string()
        }
    } else if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{}", value)
    }
}
