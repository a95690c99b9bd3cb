//! Timeline builder - merges the raw record lists of a run into one ordered
//! sequence of replay steps.
//!
//! Ordering is `(timestamp, kind priority, source index)`, and `index` is
//! assigned only after sorting, so identical input always produces an
//! identical timeline. Malformed records are skipped and reported, never
//! fatal.

pub mod parsers;

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use shared_types::{ReplayStep, RunRecord, StepKind, StepPayload, TimelineSummary};

pub use parsers::{normalize_agent_role, parse_record, ParsedRecord, RecordError};

/// A raw record that was left out of the timeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRecord {
    pub kind: StepKind,
    /// Position of the record within its source list.
    pub source_index: usize,
    pub reason: RecordError,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Timeline {
    pub run_id: String,
    pub steps: Vec<ReplayStep>,
    pub skipped: Vec<SkippedRecord>,
}

impl Timeline {
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn summary(&self) -> TimelineSummary {
        summarize(&self.steps, self.skipped.len())
    }
}

struct Pending {
    timestamp: DateTime<Utc>,
    kind: StepKind,
    source_index: usize,
    record: ParsedRecord,
}

fn source_lists(run: &RunRecord) -> [(StepKind, &[serde_json::Value]); 4] {
    [
        (StepKind::Memory, run.memory.as_slice()),
        (StepKind::Compliance, run.compliance.as_slice()),
        (StepKind::X402, run.x402.as_slice()),
        (StepKind::ToolCall, run.tool_calls.as_slice()),
    ]
}

/// Build the replay timeline for a run.
pub fn build_timeline(run: &RunRecord) -> Timeline {
    let mut pending: Vec<Pending> = Vec::new();
    let mut skipped: Vec<SkippedRecord> = Vec::new();

    for (kind, records) in source_lists(run) {
        for (source_index, raw) in records.iter().enumerate() {
            match parse_record(kind, raw) {
                Ok(record) => pending.push(Pending {
                    timestamp: record.timestamp,
                    kind,
                    source_index,
                    record,
                }),
                Err(reason) => {
                    tracing::warn!(
                        run_id = %run.run_id,
                        kind = %kind,
                        source_index,
                        reason = %reason,
                        "Skipping malformed run record"
                    );
                    skipped.push(SkippedRecord {
                        kind,
                        source_index,
                        reason,
                    });
                }
            }
        }
    }

    pending.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then(a.kind.cmp(&b.kind))
            .then(a.source_index.cmp(&b.source_index))
    });

    let steps: Vec<ReplayStep> = pending
        .into_iter()
        .enumerate()
        .map(|(index, entry)| ReplayStep {
            index,
            agent_role: entry.record.agent_role,
            agent_key: entry.record.agent_key,
            timestamp: entry.record.timestamp,
            data: entry.record.data,
        })
        .collect();

    tracing::debug!(
        run_id = %run.run_id,
        total_steps = steps.len(),
        skipped = skipped.len(),
        "Built replay timeline"
    );

    Timeline {
        run_id: run.run_id.clone(),
        steps,
        skipped,
    }
}

pub fn summarize(steps: &[ReplayStep], skipped_records: usize) -> TimelineSummary {
    let mut summary = TimelineSummary {
        total_steps: steps.len(),
        skipped_records,
        ..Default::default()
    };
    let mut agents: BTreeSet<&str> = BTreeSet::new();

    for step in steps {
        match step.kind() {
            StepKind::Memory => summary.memory_steps += 1,
            StepKind::Compliance => summary.compliance_steps += 1,
            StepKind::X402 => summary.x402_steps += 1,
            StepKind::ToolCall => summary.tool_call_steps += 1,
        }
        if step.is_failure() {
            summary.failures += 1;
        }
        agents.insert(step.agent_key.as_str());
    }
    summary.agent_count = agents.len();

    // Steps are ordered by timestamp, so the ends of the sequence bound the run.
    summary.started_at = steps.first().map(|step| step.timestamp);
    summary.ended_at = steps.last().map(|step| step.timestamp);
    summary.duration_ms = match (&summary.started_at, &summary.ended_at) {
        (Some(start), Some(end)) => Some(parsers::duration_between_ms(start, end)),
        _ => None,
    };

    summary
}

/// One-line label for step lists and the terminal player.
pub fn describe_step(step: &ReplayStep) -> String {
    match &step.data {
        StepPayload::Memory { record } => match record
            .get("key")
            .or_else(|| record.get("namespace"))
            .and_then(|v| v.as_str())
        {
            Some(key) => format!("memory write {key}"),
            None => "memory write".to_string(),
        },
        StepPayload::Compliance { passed, check, .. } => {
            let outcome = if *passed { "passed" } else { "failed" };
            match check {
                Some(check) => format!("compliance {check} {outcome}"),
                None => format!("compliance check {outcome}"),
            }
        }
        StepPayload::X402 { record } => {
            let amount = record.get("amount").and_then(|v| match v {
                serde_json::Value::String(s) => Some(s.clone()),
                serde_json::Value::Number(n) => Some(n.to_string()),
                _ => None,
            });
            match amount {
                Some(amount) => format!("x402 payment {amount}"),
                None => "x402 request".to_string(),
            }
        }
        StepPayload::ToolCall {
            tool_name, success, ..
        } => {
            let outcome = match success {
                Some(true) => "ok",
                Some(false) => "failed",
                None => "pending",
            };
            format!("tool_call {tool_name} {outcome}")
        }
    }
}
