use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One named measurement as it travels over the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct MetricPayload {
    /// Metric name (e.g. "CPU Usage")
    pub name: String,
    /// Measured value
    pub value: f64,
    /// Unit of the value (e.g. "%", "MB")
    pub unit: String,
}

impl MetricPayload {
    pub fn new(name: impl Into<String>, value: f64, unit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value,
            unit: unit.into(),
        }
    }
}

/// Snapshot body accepted by `POST /v1/metrics` (the request is an array of these).
///
/// # Examples
///
/// ```
/// use snapmon_common::types::SnapshotPayload;
///
/// let payload: SnapshotPayload = serde_json::from_str(
///     r#"{"origin":"host-a","timestamp":"2024-01-01T00:00:00+00:00",
///        "metrics":[{"name":"CPU Usage","value":12.5,"unit":"%"}]}"#,
/// )
/// .unwrap();
/// assert_eq!(payload.origin, "host-a");
/// assert_eq!(payload.metrics[0].unit, "%");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct SnapshotPayload {
    /// Device that produced the snapshot
    pub origin: String,
    /// ISO-8601 capture time
    pub timestamp: String,
    /// Measurements in capture order
    pub metrics: Vec<MetricPayload>,
}

/// Snapshot sampled from the local machine.
///
/// Samplers report the host as `device_name`; it becomes the `origin` of the
/// payload sent for ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct LocalSnapshot {
    /// Host name of the sampled machine
    pub device_name: String,
    /// RFC 3339 capture time (UTC)
    pub timestamp: String,
    /// Sampled measurements
    pub metrics: Vec<MetricPayload>,
}

impl From<LocalSnapshot> for SnapshotPayload {
    fn from(local: LocalSnapshot) -> Self {
        Self {
            origin: local.device_name,
            timestamp: local.timestamp,
            metrics: local.metrics,
        }
    }
}

/// A validated snapshot that has not been persisted yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSnapshot {
    pub origin: String,
    pub timestamp: DateTime<Utc>,
    pub metrics: Vec<MetricPayload>,
}

/// A persisted measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Metric {
    /// Store-assigned ID
    pub id: i64,
    /// Metric name
    pub name: String,
    /// Measured value
    pub value: f64,
    /// Unit of the value
    pub unit: String,
    /// ID of the owning snapshot
    pub snapshot_id: i64,
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}{}", self.name, self.value, self.unit)
    }
}

/// A persisted point-in-time capture together with its metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct MetricSnapshot {
    /// Store-assigned ID, increasing in insertion order
    pub id: i64,
    /// Device that produced the snapshot
    pub origin: String,
    /// Capture time (UTC)
    pub timestamp: DateTime<Utc>,
    /// Metrics in insertion order
    pub metrics: Vec<Metric>,
}

impl MetricSnapshot {
    /// One-line rendering used for console-style log summaries.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::{TimeZone, Utc};
    /// use snapmon_common::types::{Metric, MetricSnapshot};
    ///
    /// let snapshot = MetricSnapshot {
    ///     id: 7,
    ///     origin: "host-a".into(),
    ///     timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
    ///     metrics: vec![Metric {
    ///         id: 1,
    ///         name: "CPU Usage".into(),
    ///         value: 12.5,
    ///         unit: "%".into(),
    ///         snapshot_id: 7,
    ///     }],
    /// };
    /// assert_eq!(
    ///     snapshot.summary(),
    ///     "#7 host-a @ 01-01-2024 00:00:00 [CPU Usage=12.5%]"
    /// );
    /// ```
    pub fn summary(&self) -> String {
        let metrics: Vec<String> = self.metrics.iter().map(ToString::to_string).collect();
        format!(
            "#{} {} @ {} [{}]",
            self.id,
            self.origin,
            self.timestamp.format("%d-%m-%Y %H:%M:%S"),
            metrics.join(", ")
        )
    }
}
