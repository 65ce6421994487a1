//! Health and diagnostics reporting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{StoreError, StoreErrorKind};
use crate::store::DocumentStore;

/// A step of the store health probe. Failed probes report the step in the
/// `operation` of their [`StoreError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStep {
    Initialize,
    ReadSchema,
    ReadCount,
}

impl HealthStep {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initialize => "initialize",
            Self::ReadSchema => "read_schema",
            Self::ReadCount => "read_count",
        }
    }

    pub fn from_operation(operation: &str) -> Option<Self> {
        match operation {
            "initialize" => Some(Self::Initialize),
            "read_schema" => Some(Self::ReadSchema),
            "read_count" => Some(Self::ReadCount),
            _ => None,
        }
    }
}

/// What a successful store probe observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreProbe {
    pub document_count: usize,
    pub schema_version: Option<i64>,
}

/// Extra diagnostic information attached to a [`HealthReport`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthDetails {
    pub backend: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_step: Option<HealthStep>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<StoreErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<i64>,
    pub checked_at: DateTime<Utc>,
}

/// Result of an on-demand store health check. Never an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HealthDetails>,
}

impl HealthReport {
    fn healthy(backend: &str, probe: StoreProbe) -> Self {
        Self {
            ok: true,
            document_count: Some(probe.document_count),
            error: None,
            details: Some(HealthDetails {
                backend: backend.to_string(),
                failed_step: None,
                error_kind: None,
                schema_version: probe.schema_version,
                checked_at: Utc::now(),
            }),
        }
    }

    fn failed(backend: &str, error: &StoreError) -> Self {
        Self {
            ok: false,
            document_count: None,
            error: Some(error.message.clone()),
            details: Some(HealthDetails {
                backend: backend.to_string(),
                failed_step: HealthStep::from_operation(&error.operation),
                error_kind: Some(error.kind),
                schema_version: None,
                checked_at: Utc::now(),
            }),
        }
    }
}

/// Run a fresh connectivity and count probe against `store`.
pub async fn check_health(store: &dyn DocumentStore) -> HealthReport {
    match store.probe().await {
        Ok(probe) => {
            info!(
                backend = store.backend(),
                document_count = probe.document_count,
                "store healthy"
            );
            HealthReport::healthy(store.backend(), probe)
        }
        Err(e) => {
            warn!(
                backend = store.backend(),
                operation = %e.operation,
                error = %e.message,
                "store health check failed"
            );
            HealthReport::failed(store.backend(), &e)
        }
    }
}

/// Connectivity state of the embedding service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceState {
    Ok,
    Error,
    Info,
}

/// Result of probing the remote embedding service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingServiceStatus {
    pub state: ServiceState,
    pub message: String,
}

impl EmbeddingServiceStatus {
    pub fn new(state: ServiceState, message: impl Into<String>) -> Self {
        Self { state, message: message.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_round_trip_through_operation_names() {
        for step in [HealthStep::Initialize, HealthStep::ReadSchema, HealthStep::ReadCount] {
            assert_eq!(HealthStep::from_operation(step.as_str()), Some(step));
        }
        assert_eq!(HealthStep::from_operation("put_entries"), None);
    }

    #[test]
    fn failed_report_carries_step_and_kind() {
        let error = StoreError::new(StoreErrorKind::Connection, "initialize", "unable to open");
        let report = HealthReport::failed("sqlite", &error);
        assert!(!report.ok);
        assert_eq!(report.error.as_deref(), Some("unable to open"));
        let details = report.details.unwrap();
        assert_eq!(details.failed_step, Some(HealthStep::Initialize));
        assert_eq!(details.error_kind, Some(StoreErrorKind::Connection));
    }
}
