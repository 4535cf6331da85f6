//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Exposes the counters and gauges for resume persistence and state sync.

use std::sync::Arc;

use prometheus::{
    Encoder, Error as PrometheusError, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use serde::Serialize;

use crate::error::{MetricStage, Result, TelemetryError};

/// Outcome labels recorded for resume loads.
pub const LOAD_OUTCOMES: [&str; 5] = ["restored", "not_found", "corrupt", "version_mismatch", "io"];

/// Prometheus-backed metrics registry shared across the workspace.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    resume_loads_total: IntCounterVec,
    resume_saves_total: IntCounterVec,
    sync_applies_total: IntCounter,
    sync_fields_changed_total: IntCounter,
    tracked_torrents: IntGauge,
}

/// Snapshot of selected gauges and counters for health reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Loads that restored persisted data.
    pub resume_loads_restored: u64,
    /// Loads that fell back because data was missing, corrupt, or unreadable.
    pub resume_loads_degraded: u64,
    /// Snapshots written successfully.
    pub resume_saves_ok: u64,
    /// Snapshot writes that failed.
    pub resume_saves_failed: u64,
    /// Engine snapshots applied.
    pub sync_applies_total: u64,
    /// Field changes detected across all applies.
    pub sync_fields_changed_total: u64,
    /// Torrents currently tracked.
    pub tracked_torrents: i64,
}

pub(crate) fn register<C>(registry: &Registry, name: &'static str, collector: C) -> Result<C>
where
    C: prometheus::core::Collector + Clone + 'static,
{
    registry
        .register(Box::new(collector.clone()))
        .map_err(TelemetryError::metric(MetricStage::Register, name))?;
    Ok(collector)
}

fn counter_vec(name: &'static str, help: &str, labels: &[&str]) -> Result<IntCounterVec> {
    IntCounterVec::new(Opts::new(name, help), labels)
        .map_err(TelemetryError::metric(MetricStage::Build, name))
}

pub(crate) fn counter(name: &'static str, help: &str) -> Result<IntCounter> {
    IntCounter::with_opts(Opts::new(name, help))
        .map_err(TelemetryError::metric(MetricStage::Build, name))
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be
    /// built or registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let resume_loads_total = register(
            &registry,
            "resume_loads_total",
            counter_vec(
                "resume_loads_total",
                "Resume loads by outcome",
                &["outcome"],
            )?,
        )?;
        let resume_saves_total = register(
            &registry,
            "resume_saves_total",
            counter_vec(
                "resume_saves_total",
                "Resume snapshot writes by outcome",
                &["outcome"],
            )?,
        )?;
        let sync_applies_total = register(
            &registry,
            "sync_applies_total",
            counter("sync_applies_total", "Engine snapshots applied to records")?,
        )?;
        let sync_fields_changed_total = register(
            &registry,
            "sync_fields_changed_total",
            counter(
                "sync_fields_changed_total",
                "Field changes detected while applying engine snapshots",
            )?,
        )?;
        let tracked_torrents = register(
            &registry,
            "tracked_torrents",
            IntGauge::with_opts(Opts::new("tracked_torrents", "Torrents currently tracked"))
                .map_err(TelemetryError::metric(MetricStage::Build, "tracked_torrents"))?,
        )?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                resume_loads_total,
                resume_saves_total,
                sync_applies_total,
                sync_fields_changed_total,
                tracked_torrents,
            }),
        })
    }

    /// Count a resume load under `outcome` (`restored` or an issue label).
    pub fn inc_resume_load(&self, outcome: &str) {
        self.inner
            .resume_loads_total
            .with_label_values(&[outcome])
            .inc();
    }

    /// Count a resume save.
    pub fn inc_resume_save(&self, ok: bool) {
        let outcome = if ok { "ok" } else { "failed" };
        self.inner
            .resume_saves_total
            .with_label_values(&[outcome])
            .inc();
    }

    /// Count an applied engine snapshot and the number of fields it changed.
    pub fn observe_apply(&self, changed_fields: usize) {
        self.inner.sync_applies_total.inc();
        self.inner
            .sync_fields_changed_total
            .inc_by(u64::try_from(changed_fields).unwrap_or(u64::MAX));
    }

    /// Set the tracked torrent gauge.
    pub fn set_tracked_torrents(&self, count: usize) {
        self.inner
            .tracked_torrents
            .set(i64::try_from(count).unwrap_or(i64::MAX));
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(TelemetryError::metric(MetricStage::Render, "registry"))?;
        String::from_utf8(buffer).map_err(|err| TelemetryError::Metric {
            stage: MetricStage::Render,
            metric: "registry",
            source: PrometheusError::Msg(err.to_string()),
        })
    }

    /// Take a point-in-time snapshot of the most relevant gauges and counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let loads = |outcome: &str| {
            self.inner
                .resume_loads_total
                .with_label_values(&[outcome])
                .get()
        };
        let saves = |outcome: &str| {
            self.inner
                .resume_saves_total
                .with_label_values(&[outcome])
                .get()
        };
        MetricsSnapshot {
            resume_loads_restored: loads("restored"),
            resume_loads_degraded: LOAD_OUTCOMES[1..].iter().copied().map(loads).sum(),
            resume_saves_ok: saves("ok"),
            resume_saves_failed: saves("failed"),
            sync_applies_total: self.inner.sync_applies_total.get(),
            sync_fields_changed_total: self.inner.sync_fields_changed_total.get(),
            tracked_torrents: self.inner.tracked_torrents.get(),
        }
    }
}
