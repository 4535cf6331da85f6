//! Telemetry failures.
//!
//! Only two things can go wrong here: the global subscriber is already set, or
//! a Prometheus collector is rejected. Rendering failures reuse the collector
//! variant with the `render` stage.

use prometheus::Error as PrometheusError;
use thiserror::Error;

use crate::init::LogFormat;

/// Result alias for telemetry operations.
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Step of the metrics lifecycle that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricStage {
    /// Building the collector from its options.
    Build,
    /// Adding the collector to the registry.
    Register,
    /// Encoding the registry as text exposition.
    Render,
}

impl MetricStage {
    /// Stable label for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Build => "build",
            Self::Register => "register",
            Self::Render => "render",
        }
    }
}

/// Errors raised by telemetry helpers.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A global tracing subscriber was already installed.
    #[error("tracing subscriber already installed")]
    SubscriberInstall {
        /// Format that was being installed.
        format: LogFormat,
        /// Underlying tracing subscriber error.
        #[source]
        source: tracing_subscriber::util::TryInitError,
    },
    /// A metrics collector was rejected.
    #[error("metrics collector rejected")]
    Metric {
        /// Lifecycle step that failed.
        stage: MetricStage,
        /// Metric name, or `registry` when rendering.
        metric: &'static str,
        /// Underlying Prometheus error.
        #[source]
        source: PrometheusError,
    },
}

impl TelemetryError {
    pub(crate) fn metric(
        stage: MetricStage,
        metric: &'static str,
    ) -> impl FnOnce(PrometheusError) -> Self {
        move |source| Self::Metric {
            stage,
            metric,
            source,
        }
    }
}
