//! Audit trail for forwarding-table resource changes.
//!
//! Every hardware object the host table creates or destroys, every warm-boot
//! reconciliation and every invariant violation produces one [`AuditRecord`].
//! Records are emitted through `tracing` on the `audit` target with the full
//! record attached as JSON, so they can be filtered out of the regular log
//! stream and shipped to a collector unchanged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Audit event categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditCategory {
    ResourceCreate,
    ResourceDelete,
    /// Daemon start, stop and configuration load.
    SystemLifecycle,
    WarmRestart,
    /// Internal-consistency violations and hardware failures.
    ErrorCondition,
}

impl fmt::Display for AuditCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditCategory::ResourceCreate => write!(f, "RESOURCE_CREATE"),
            AuditCategory::ResourceDelete => write!(f, "RESOURCE_DELETE"),
            AuditCategory::SystemLifecycle => write!(f, "SYSTEM_LIFECYCLE"),
            AuditCategory::WarmRestart => write!(f, "WARM_RESTART"),
            AuditCategory::ErrorCondition => write!(f, "ERROR_CONDITION"),
        }
    }
}

/// Outcome of an audited action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditOutcome {
    Success,
    Failure,
    InProgress,
}

impl fmt::Display for AuditOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditOutcome::Success => write!(f, "success"),
            AuditOutcome::Failure => write!(f, "failure"),
            AuditOutcome::InProgress => write!(f, "in_progress"),
        }
    }
}

/// One structured audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,
    pub category: AuditCategory,
    /// Component that generated the event.
    pub source: String,
    pub action: String,
    pub outcome: AuditOutcome,

    /// Hardware id or table key of the affected object.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,

    /// e.g. "l3_host", "egress", "ecmp_group"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AuditRecord {
    /// Creates a record stamped with the current UTC time; outcome starts as `InProgress`.
    pub fn new(
        category: AuditCategory,
        source: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            category,
            source: source.into(),
            action: action.into(),
            outcome: AuditOutcome::InProgress,
            object_id: None,
            object_type: None,
            details: None,
            error: None,
        }
    }

    pub fn with_outcome(mut self, outcome: AuditOutcome) -> Self {
        self.outcome = outcome;
        self
    }

    pub fn with_object_id(mut self, id: impl Into<String>) -> Self {
        self.object_id = Some(id.into());
        self
    }

    pub fn with_object_type(mut self, obj_type: impl Into<String>) -> Self {
        self.object_type = Some(obj_type.into());
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Sets the error message and marks the outcome as `Failure`.
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self.outcome = AuditOutcome::Failure;
        self
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|e| format!(r#"{{"error":"serialization_failed","message":"{}"}}"#, e))
    }
}

/// Logs `record` on the `audit` target.
///
/// Successes log at info, in-progress records at debug and failures at warn.
/// The full record is attached as the `audit_json` field.
pub fn emit(record: &AuditRecord) {
    let json = record.to_json();
    let object = record.object_id.as_deref().unwrap_or("-");
    match record.outcome {
        AuditOutcome::Success => tracing::info!(
            target: "audit",
            category = %record.category,
            source = %record.source,
            audit_json = %json,
            "AUDIT: {} {} {} {}",
            record.category,
            record.action,
            object,
            record.outcome
        ),
        AuditOutcome::InProgress => tracing::debug!(
            target: "audit",
            category = %record.category,
            source = %record.source,
            audit_json = %json,
            "AUDIT: {} {} {} {}",
            record.category,
            record.action,
            object,
            record.outcome
        ),
        AuditOutcome::Failure => tracing::warn!(
            target: "audit",
            category = %record.category,
            source = %record.source,
            error = record.error.as_deref().unwrap_or(""),
            audit_json = %json,
            "AUDIT: {} {} {} {}",
            record.category,
            record.action,
            object,
            record.outcome
        ),
    }
}

/// Emits an [`AuditRecord`] through [`emit`].
///
/// ```ignore
/// audit_log!(AuditRecord::new(AuditCategory::ResourceCreate, "HostTable", "add_host")
///     .with_outcome(AuditOutcome::Success)
///     .with_object_id("vrf0/10.0.0.1")
///     .with_object_type("l3_host"));
/// ```
#[macro_export]
macro_rules! audit_log {
    ($record:expr) => {
        $crate::audit::emit(&$record)
    };
}

/// Reports an internal-consistency violation and terminates.
///
/// Logs at error level, emits an `ERROR_CONDITION` audit record and panics.
/// Release builds are compiled with `panic = "abort"`, so this never unwinds
/// in production.
#[macro_export]
macro_rules! fatal {
    ($($arg:tt)*) => {{
        let message = format!($($arg)*);
        log::error!("FATAL: {}", message);
        $crate::audit_log!($crate::audit::AuditRecord::new(
            $crate::audit::AuditCategory::ErrorCondition,
            "HostTable",
            "invariant_violation",
        )
        .with_error(message.clone()));
        panic!("{}", message)
    }};
}
