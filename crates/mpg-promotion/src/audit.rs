use anyhow::Result;
use mpg_audit::{AuditEvent, AuditWriter};
use serde_json::json;
use uuid::Uuid;

use crate::error::PromotionError;
use crate::types::PromotionReport;

pub const AUDIT_TOPIC: &str = "promotion";

/// One audit line per completed invocation; the event type is the run status.
pub fn append_decision_event(
    writer: &mut AuditWriter,
    run_id: Uuid,
    report: &PromotionReport,
) -> Result<AuditEvent> {
    let payload = serde_json::to_value(report)?;
    writer.append(run_id, AUDIT_TOPIC, report.status.as_str(), payload)
}

/// Audit line for an invocation that ended in a fatal error.
pub fn append_failure_event(
    writer: &mut AuditWriter,
    run_id: Uuid,
    model: &str,
    alias: &str,
    err: &PromotionError,
) -> Result<AuditEvent> {
    writer.append(
        run_id,
        AUDIT_TOPIC,
        "failed",
        json!({
            "model": model,
            "alias": alias,
            "error_code": err.code(),
            "error": err.to_string(),
        }),
    )
}
