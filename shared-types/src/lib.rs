//! Shared types between the replay core and the dashboard frontend
//!
//! These types are used by both:
//! - The replay engine (native Rust, ractor actors)
//! - The browser run view (TypeScript via ts-rs bindings)
//!
//! Serializable with serde for JSON over HTTP

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ============================================================================
// Constants
// ============================================================================

/// Autoplay tick interval at 1x speed.
pub const DEFAULT_BASE_INTERVAL_MS: u64 = 1_000;

/// Agent key assigned to records without an agent attribution.
pub const UNKNOWN_AGENT: &str = "unknown";

/// Deep-link query parameter carrying a step index.
pub const STEP_LINK_PARAM: &str = "step";

// ============================================================================
// Run Record (input)
// ============================================================================

/// Raw run record as returned by the backend.
///
/// Entries stay as raw JSON until the timeline builder parses them, so one
/// malformed entry never fails deserialization of the whole run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, TS)]
#[ts(export, export_to = "../../web/src/types/generated.ts")]
pub struct RunRecord {
    #[serde(default)]
    pub run_id: String,

    #[serde(default, alias = "memory_entries", alias = "memories")]
    #[ts(type = "unknown[]")]
    pub memory: Vec<serde_json::Value>,

    #[serde(default, alias = "compliance_events")]
    #[ts(type = "unknown[]")]
    pub compliance: Vec<serde_json::Value>,

    #[serde(default, alias = "x402_requests", alias = "payments")]
    #[ts(type = "unknown[]")]
    pub x402: Vec<serde_json::Value>,

    #[serde(default, alias = "toolCalls")]
    #[ts(type = "unknown[]")]
    pub tool_calls: Vec<serde_json::Value>,
}

// ============================================================================
// Replay Steps
// ============================================================================

/// Closed set of step kinds. Declaration order is the tie-break priority
/// used when two records share a timestamp.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, TS,
)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "../../web/src/types/generated.ts")]
pub enum StepKind {
    Memory,
    Compliance,
    X402,
    ToolCall,
}

impl StepKind {
    pub const ALL: [StepKind; 4] = [
        StepKind::Memory,
        StepKind::Compliance,
        StepKind::X402,
        StepKind::ToolCall,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StepKind::Memory => "memory",
            StepKind::Compliance => "compliance",
            StepKind::X402 => "x402",
            StepKind::ToolCall => "tool_call",
        }
    }
}

impl std::fmt::Display for StepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind-specific step payload. The original record is kept verbatim.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[serde(tag = "type", rename_all = "snake_case")]
#[ts(export, export_to = "../../web/src/types/generated.ts")]
pub enum StepPayload {
    Memory {
        #[ts(type = "unknown")]
        record: serde_json::Value,
    },
    Compliance {
        passed: bool,
        check: Option<String>,
        #[ts(type = "unknown")]
        record: serde_json::Value,
    },
    X402 {
        #[ts(type = "unknown")]
        record: serde_json::Value,
    },
    ToolCall {
        tool_name: String,
        /// `None` when the record carries no outcome; that is not a failure.
        success: Option<bool>,
        #[ts(type = "unknown")]
        record: serde_json::Value,
    },
}

impl StepPayload {
    pub fn kind(&self) -> StepKind {
        match self {
            StepPayload::Memory { .. } => StepKind::Memory,
            StepPayload::Compliance { .. } => StepKind::Compliance,
            StepPayload::X402 { .. } => StepKind::X402,
            StepPayload::ToolCall { .. } => StepKind::ToolCall,
        }
    }

    /// A failed compliance check or a tool call that reported `success: false`.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            StepPayload::Compliance { passed: false, .. }
                | StepPayload::ToolCall {
                    success: Some(false),
                    ..
                }
        )
    }

    pub fn record(&self) -> &serde_json::Value {
        match self {
            StepPayload::Memory { record }
            | StepPayload::Compliance { record, .. }
            | StepPayload::X402 { record }
            | StepPayload::ToolCall { record, .. } => record,
        }
    }
}

/// One normalized event in a run's replay timeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[ts(export, export_to = "../../web/src/types/generated.ts")]
pub struct ReplayStep {
    /// Position in the ordered sequence; the only ordering key downstream.
    pub index: usize,

    /// Agent role as written in the source record (trimmed), for display.
    pub agent_role: String,

    /// Lower-cased role used for matching and grouping.
    pub agent_key: String,

    /// When the underlying event happened. Display only.
    pub timestamp: DateTime<Utc>,

    pub data: StepPayload,
}

impl ReplayStep {
    pub fn kind(&self) -> StepKind {
        self.data.kind()
    }

    pub fn is_failure(&self) -> bool {
        self.data.is_failure()
    }
}

// ============================================================================
// Playback
// ============================================================================

/// Supported autoplay speed multipliers.
///
/// Serialized as the bare multiplier, so fields holding it are typed
/// `number` on the TypeScript side.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "f64", into = "f64")]
pub enum PlaybackSpeed {
    Quarter,
    Half,
    #[default]
    Normal,
    Double,
    Quadruple,
}

impl PlaybackSpeed {
    pub const ALL: [PlaybackSpeed; 5] = [
        PlaybackSpeed::Quarter,
        PlaybackSpeed::Half,
        PlaybackSpeed::Normal,
        PlaybackSpeed::Double,
        PlaybackSpeed::Quadruple,
    ];

    pub fn multiplier(&self) -> f64 {
        match self {
            PlaybackSpeed::Quarter => 0.25,
            PlaybackSpeed::Half => 0.5,
            PlaybackSpeed::Normal => 1.0,
            PlaybackSpeed::Double => 2.0,
            PlaybackSpeed::Quadruple => 4.0,
        }
    }

    /// Exact match against the supported set; anything else is `None`.
    pub fn from_multiplier(value: f64) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|speed| (speed.multiplier() - value).abs() < f64::EPSILON)
    }
}

impl TryFrom<f64> for PlaybackSpeed {
    type Error = String;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::from_multiplier(value)
            .ok_or_else(|| format!("unsupported playback speed {value}; expected 0.25, 0.5, 1, 2 or 4"))
    }
}

impl From<PlaybackSpeed> for f64 {
    fn from(speed: PlaybackSpeed) -> Self {
        speed.multiplier()
    }
}

impl std::fmt::Display for PlaybackSpeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x", self.multiplier())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "../../web/src/types/generated.ts")]
pub enum ReplayPhase {
    /// No steps loaded.
    Idle,
    Paused,
    Playing,
}

// ============================================================================
// Agent Flow
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "../../web/src/types/generated.ts")]
pub enum AgentStatus {
    Pending,
    Active,
    Completed,
    Error,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStatus::Pending => "pending",
            AgentStatus::Active => "active",
            AgentStatus::Completed => "completed",
            AgentStatus::Error => "error",
        }
    }
}

/// Steps grouped by the agent that produced them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[ts(export, export_to = "../../web/src/types/generated.ts")]
pub struct AgentNode {
    /// Display role, casing from the first step seen for this agent.
    pub agent_role: String,
    pub agent_key: String,
    /// Step indices in encounter order.
    pub steps: Vec<usize>,
    pub first_step_index: usize,
    pub last_step_index: usize,
    pub status: AgentStatus,
    /// 0..=100, for the node's progress bar.
    pub progress_percent: f64,
}

/// Handoff between two consecutive agent nodes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, TS)]
#[ts(export, export_to = "../../web/src/types/generated.ts")]
pub struct FlowEdge {
    pub from: String,
    pub to: String,
    pub label: String,
}

// ============================================================================
// Summaries / Snapshots
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, TS)]
#[ts(export, export_to = "../../web/src/types/generated.ts")]
pub struct TimelineSummary {
    pub total_steps: usize,
    pub memory_steps: usize,
    pub compliance_steps: usize,
    pub x402_steps: usize,
    pub tool_call_steps: usize,
    pub failures: usize,
    pub agent_count: usize,
    pub skipped_records: usize,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    #[ts(type = "number | null")]
    pub duration_ms: Option<i64>,
}

/// Everything the presentation layer reads, in one value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[ts(export, export_to = "../../web/src/types/generated.ts")]
pub struct ReplaySnapshot {
    pub run_id: Option<String>,
    pub phase: ReplayPhase,
    pub current_step_index: usize,
    pub total_steps: usize,
    pub is_playing: bool,
    #[ts(type = "number")]
    pub playback_speed: PlaybackSpeed,
    pub is_first_step: bool,
    pub is_last_step: bool,
    pub progress_ratio: f64,
    pub current_step: Option<ReplayStep>,
    pub agent_nodes: Vec<AgentNode>,
    pub flow_edges: Vec<FlowEdge>,
}

impl Default for ReplaySnapshot {
    fn default() -> Self {
        Self {
            run_id: None,
            phase: ReplayPhase::Idle,
            current_step_index: 0,
            total_steps: 0,
            is_playing: false,
            playback_speed: PlaybackSpeed::Normal,
            is_first_step: true,
            is_last_step: true,
            progress_ratio: 0.0,
            current_step: None,
            agent_nodes: Vec::new(),
            flow_edges: Vec::new(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
