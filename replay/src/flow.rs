//! Agent flow projection - derives the agent-centric view of a timeline.
//!
//! Pure functions over `(steps, current_step_index)`; recomputed whole on
//! every change, never patched.

use indexmap::IndexMap;
use shared_types::{AgentNode, AgentStatus, FlowEdge, ReplayStep};

/// Fallback label for agent pairs without a dedicated transition.
pub const DEFAULT_TRANSITION_LABEL: &str = "Handoff";

struct NodeAccumulator {
    agent_role: String,
    steps: Vec<usize>,
    has_failure: bool,
}

/// One node per distinct agent key, in order of first appearance.
pub fn project_agent_nodes(steps: &[ReplayStep], current_step_index: usize) -> Vec<AgentNode> {
    // IndexMap keeps first-seen order explicit.
    let mut by_agent: IndexMap<&str, NodeAccumulator> = IndexMap::new();

    for step in steps {
        let entry = by_agent
            .entry(step.agent_key.as_str())
            .or_insert_with(|| NodeAccumulator {
                agent_role: step.agent_role.clone(),
                steps: Vec::new(),
                has_failure: false,
            });
        entry.steps.push(step.index);
        entry.has_failure |= step.is_failure();
    }

    by_agent
        .into_iter()
        .filter_map(|(agent_key, acc)| {
            let first_step_index = *acc.steps.first()?;
            let last_step_index = *acc.steps.last()?;
            let status = node_status(
                acc.has_failure,
                first_step_index,
                last_step_index,
                current_step_index,
            );
            let progress_percent = node_progress_percent(
                first_step_index,
                last_step_index,
                acc.steps.len(),
                current_step_index,
            );
            Some(AgentNode {
                agent_role: acc.agent_role,
                agent_key: agent_key.to_string(),
                steps: acc.steps,
                first_step_index,
                last_step_index,
                status,
                progress_percent,
            })
        })
        .collect()
}

/// Error wins over position; then active, completed, pending.
pub fn node_status(
    has_failure: bool,
    first_step_index: usize,
    last_step_index: usize,
    current_step_index: usize,
) -> AgentStatus {
    if has_failure {
        AgentStatus::Error
    } else if (first_step_index..=last_step_index).contains(&current_step_index) {
        AgentStatus::Active
    } else if last_step_index < current_step_index {
        AgentStatus::Completed
    } else {
        AgentStatus::Pending
    }
}

/// Percentage for the node's progress bar, clamped to `0..=100`.
pub fn node_progress_percent(
    first_step_index: usize,
    last_step_index: usize,
    step_count: usize,
    current_step_index: usize,
) -> f64 {
    if current_step_index < first_step_index {
        return 0.0;
    }
    if current_step_index >= last_step_index || step_count == 0 {
        return 100.0;
    }
    let covered = (current_step_index - first_step_index + 1) as f64;
    (covered / step_count as f64 * 100.0).clamp(0.0, 100.0)
}

/// Label for the edge between two agents. Never fails on unknown pairs.
pub fn transition_label(from_key: &str, to_key: &str) -> &'static str {
    match (from_key, to_key) {
        ("orchestrator" | "planner", "research" | "researcher") => "Research request",
        ("orchestrator" | "planner", "compliance") => "Compliance review",
        ("research" | "researcher", "analyst" | "analysis") => "Findings",
        ("analyst" | "analysis", "compliance") => "Risk review",
        ("compliance", "payment" | "payments" | "treasury") => "Approved for payment",
        ("payment" | "payments" | "treasury", "executor" | "execution") => "Payment settled",
        (_, "memory") => "Store context",
        ("memory", _) => "Recall context",
        _ => DEFAULT_TRANSITION_LABEL,
    }
}

/// Edges between consecutive nodes, in node order.
pub fn flow_edges(nodes: &[AgentNode]) -> Vec<FlowEdge> {
    nodes
        .windows(2)
        .map(|pair| FlowEdge {
            from: pair[0].agent_key.clone(),
            to: pair[1].agent_key.clone(),
            label: transition_label(&pair[0].agent_key, &pair[1].agent_key).to_string(),
        })
        .collect()
}

/// First step index of the agent whose key matches `role` case-insensitively.
pub fn find_agent_first_step(steps: &[ReplayStep], role: &str) -> Option<usize> {
    let wanted = role.trim().to_lowercase();
    steps
        .iter()
        .find(|step| step.agent_key == wanted)
        .map(|step| step.index)
}
