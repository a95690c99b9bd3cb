use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use shared_types::{StepKind, StepPayload, UNKNOWN_AGENT};

// ── Errors ───────────────────────────────────────────────────────────────────

/// Why a single raw record could not become a step.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    #[error("record is not a JSON object")]
    NotAnObject,

    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}

/// A record that parsed cleanly but has not been placed in the timeline yet.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRecord {
    pub agent_role: String,
    pub agent_key: String,
    pub timestamp: DateTime<Utc>,
    pub data: StepPayload,
}

// ── Field helpers ────────────────────────────────────────────────────────────

fn first_field<'a>(
    record: &'a serde_json::Value,
    keys: &[&str],
) -> Option<&'a serde_json::Value> {
    keys.iter()
        .filter_map(|key| record.get(*key))
        .find(|value| !value.is_null())
}

/// First non-blank string among `keys`; blank aliases fall through.
fn first_str<'a>(record: &'a serde_json::Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|key| record.get(*key).and_then(|v| v.as_str()))
        .find(|value| !value.trim().is_empty())
}

// ── Agent role ───────────────────────────────────────────────────────────────

/// Returns `(display_role, agent_key)`. Blank or missing roles collapse to
/// the `unknown` group.
pub fn normalize_agent_role(raw: Option<&str>) -> (String, String) {
    match raw.map(str::trim).filter(|role| !role.is_empty()) {
        Some(role) => (role.to_string(), role.to_lowercase()),
        None => (UNKNOWN_AGENT.to_string(), UNKNOWN_AGENT.to_string()),
    }
}

pub fn agent_attribution(record: &serde_json::Value) -> Option<&str> {
    first_str(record, &["agent_role", "agentRole", "agent", "role"])
}

// ── Time helpers ─────────────────────────────────────────────────────────────

pub fn parse_timestamp(value: &serde_json::Value) -> Result<DateTime<Utc>, RecordError> {
    match value {
        serde_json::Value::String(raw) => {
            let raw = raw.trim();
            DateTime::parse_from_rfc3339(raw)
                .map(|dt| dt.with_timezone(&Utc))
                .or_else(|_| {
                    // Backends that serialize naive datetimes omit the offset; treat as UTC.
                    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                        .map(|naive| naive.and_utc())
                })
                .map_err(|_| RecordError::InvalidTimestamp(raw.to_string()))
        }
        serde_json::Value::Number(number) => number
            .as_i64()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single())
            .ok_or_else(|| RecordError::InvalidTimestamp(number.to_string())),
        other => Err(RecordError::InvalidTimestamp(other.to_string())),
    }
}

fn record_timestamp(record: &serde_json::Value) -> Result<DateTime<Utc>, RecordError> {
    let value = first_field(record, &["timestamp", "created_at", "createdAt"])
        .ok_or(RecordError::MissingField("timestamp"))?;
    parse_timestamp(value)
}

pub fn duration_between_ms(start: &DateTime<Utc>, end: &DateTime<Utc>) -> i64 {
    (*end - *start).num_milliseconds().max(0)
}

// ── Payload parsers ──────────────────────────────────────────────────────────

fn compliance_outcome(record: &serde_json::Value) -> Option<bool> {
    if let Some(passed) = record.get("passed").and_then(|v| v.as_bool()) {
        return Some(passed);
    }
    match record
        .get("status")
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_ascii_lowercase())
        .as_deref()
    {
        Some("passed" | "pass" | "ok" | "approved") => Some(true),
        Some("failed" | "fail" | "rejected" | "blocked") => Some(false),
        _ => None,
    }
}

fn tool_call_success(record: &serde_json::Value) -> Option<bool> {
    record
        .get("success")
        .and_then(|v| v.as_bool())
        .or_else(|| {
            record
                .get("data")
                .and_then(|d| d.get("success"))
                .and_then(|v| v.as_bool())
        })
        .or_else(|| {
            record
                .get("result")
                .and_then(|r| r.get("success"))
                .and_then(|v| v.as_bool())
        })
}

fn parse_payload(kind: StepKind, record: &serde_json::Value) -> Result<StepPayload, RecordError> {
    let payload = match kind {
        StepKind::Memory => StepPayload::Memory {
            record: record.clone(),
        },
        StepKind::Compliance => StepPayload::Compliance {
            passed: compliance_outcome(record).ok_or(RecordError::MissingField("passed"))?,
            check: first_str(record, &["check", "rule", "check_name"]).map(ToString::to_string),
            record: record.clone(),
        },
        StepKind::X402 => StepPayload::X402 {
            record: record.clone(),
        },
        StepKind::ToolCall => StepPayload::ToolCall {
            tool_name: first_str(record, &["tool_name", "tool", "name"])
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .ok_or(RecordError::MissingField("tool_name"))?
                .to_string(),
            success: tool_call_success(record),
            record: record.clone(),
        },
    };
    Ok(payload)
}

/// Parse one raw record of the given kind.
pub fn parse_record(
    kind: StepKind,
    record: &serde_json::Value,
) -> Result<ParsedRecord, RecordError> {
    if !record.is_object() {
        return Err(RecordError::NotAnObject);
    }

    let timestamp = record_timestamp(record)?;
    let data = parse_payload(kind, record)?;
    let (agent_role, agent_key) = normalize_agent_role(agent_attribution(record));

    Ok(ParsedRecord {
        agent_role,
        agent_key,
        timestamp,
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_agent_role_keeps_display_casing() {
        assert_eq!(
            normalize_agent_role(Some("  Compliance-Agent ")),
            ("Compliance-Agent".to_string(), "compliance-agent".to_string())
        );
        assert_eq!(
            normalize_agent_role(Some("   ")),
            ("unknown".to_string(), "unknown".to_string())
        );
        assert_eq!(
            normalize_agent_role(None),
            ("unknown".to_string(), "unknown".to_string())
        );
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let rfc = parse_timestamp(&json!("2026-03-01T12:00:00+02:00")).unwrap();
        assert_eq!(rfc.to_rfc3339(), "2026-03-01T10:00:00+00:00");

        let naive = parse_timestamp(&json!("2026-03-01T10:00:00.250")).unwrap();
        assert_eq!(naive.timestamp_millis() % 1000, 250);

        let millis = parse_timestamp(&json!(1_767_225_600_000_i64)).unwrap();
        assert_eq!(millis.timestamp(), 1_767_225_600);

        assert!(matches!(
            parse_timestamp(&json!("yesterday")),
            Err(RecordError::InvalidTimestamp(_))
        ));
        assert!(parse_timestamp(&json!(true)).is_err());
    }

    #[test]
    fn test_compliance_requires_outcome() {
        let ok = parse_record(
            StepKind::Compliance,
            &json!({"timestamp": "2026-03-01T10:00:00Z", "status": "FAILED", "rule": "kyc"}),
        )
        .unwrap();
        assert!(matches!(
            ok.data,
            StepPayload::Compliance { passed: false, ref check, .. } if check.as_deref() == Some("kyc")
        ));

        let missing = parse_record(
            StepKind::Compliance,
            &json!({"timestamp": "2026-03-01T10:00:00Z"}),
        );
        assert_eq!(missing, Err(RecordError::MissingField("passed")));
    }

    #[test]
    fn test_tool_call_success_lookup_order() {
        let nested = parse_record(
            StepKind::ToolCall,
            &json!({
                "timestamp": "2026-03-01T10:00:00Z",
                "tool_name": "fetch_quote",
                "data": {"success": false},
            }),
        )
        .unwrap();
        assert!(nested.data.is_failure());

        let result = parse_record(
            StepKind::ToolCall,
            &json!({
                "timestamp": "2026-03-01T10:00:00Z",
                "tool": "fetch_quote",
                "result": {"success": true},
            }),
        )
        .unwrap();
        assert!(matches!(
            result.data,
            StepPayload::ToolCall { success: Some(true), .. }
        ));

        let nameless = parse_record(
            StepKind::ToolCall,
            &json!({"timestamp": "2026-03-01T10:00:00Z", "success": true}),
        );
        assert_eq!(nameless, Err(RecordError::MissingField("tool_name")));
    }

    #[test]
    fn test_rejects_non_objects_and_missing_timestamps() {
        assert_eq!(
            parse_record(StepKind::Memory, &json!("memory write")),
            Err(RecordError::NotAnObject)
        );
        assert_eq!(
            parse_record(StepKind::X402, &json!({"amount": "1.00"})),
            Err(RecordError::MissingField("timestamp"))
        );
    }

    #[test]
    fn test_agent_attribution_fallbacks() {
        let parsed = parse_record(
            StepKind::Memory,
            &json!({"createdAt": "2026-03-01T10:00:00Z", "agentRole": "Planner"}),
        )
        .unwrap();
        assert_eq!(parsed.agent_role, "Planner");
        assert_eq!(parsed.agent_key, "planner");
    }

    #[test]
    fn test_blank_alias_falls_through_to_next_key() {
        let parsed = parse_record(
            StepKind::Memory,
            &json!({"timestamp": "2026-03-01T10:00:00Z", "agent_role": "  ", "agent": "Planner"}),
        )
        .unwrap();
        assert_eq!(parsed.agent_role, "Planner");
        assert_eq!(parsed.agent_key, "planner");

        let tool = parse_record(
            StepKind::ToolCall,
            &json!({"timestamp": "2026-03-01T10:00:00Z", "tool_name": "", "tool": "search"}),
        )
        .unwrap();
        assert!(matches!(tool.data, StepPayload::ToolCall { ref tool_name, .. } if tool_name == "search"));
    }
}
