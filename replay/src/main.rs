use std::path::PathBuf;

use clap::Parser;
use replay::actors::{ReplayPlayer, ReplayPlayerArguments};
use replay::config::ReplayConfig;
use replay::deep_link::{parse_step_param, parse_step_value};
use replay::machine::ReplayAction;
use replay::source::{load_run_record, RunSource};
use replay::timeline::{build_timeline, describe_step};
use shared_types::{ReplayPhase, ReplaySnapshot};
use tokio::task::JoinHandle;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "replay", version, about = "Replay a completed agent run step by step")]
struct Args {
    /// Run record JSON file
    #[arg(conflicts_with = "run_id")]
    file: Option<PathBuf>,

    /// Fetch the run from the dashboard API instead of a file
    #[arg(long)]
    run_id: Option<String>,

    /// Step to start from (clamped into range)
    #[arg(long, allow_hyphen_values = true, value_parser = parse_step_arg)]
    step: Option<i64>,

    /// Shareable run view link carrying the start step
    #[arg(long, conflicts_with = "step")]
    link: Option<String>,

    /// Playback speed multiplier: 0.25, 0.5, 1, 2 or 4
    #[arg(long)]
    speed: Option<f64>,

    /// Print the summary and agent flow without autoplaying
    #[arg(long)]
    no_play: bool,

    /// Emit one JSON snapshot per change instead of step labels
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "replay=info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let config = ReplayConfig::from_env()?;

    let source = match (&args.file, &args.run_id) {
        (Some(path), _) => RunSource::File(path.clone()),
        (None, Some(run_id)) => RunSource::Api {
            run_id: run_id.clone(),
        },
        (None, None) => anyhow::bail!("provide a run record file or --run-id"),
    };

    let record = load_run_record(&source, &config).await?;
    let timeline = build_timeline(&record);
    let summary = timeline.summary();
    info!(
        run_id = %timeline.run_id,
        total_steps = summary.total_steps,
        skipped = summary.skipped_records,
        "Timeline ready"
    );

    let start_step = match (&args.step, &args.link) {
        (Some(step), _) => Some(*step),
        (None, Some(link)) => parse_step_param(link, &config.step_param),
        (None, None) => None,
    };

    let (player, handle) = start_player(
        ReplayPlayerArguments {
            base_interval: config.base_interval,
            initial_speed: config.default_speed,
            run_id: Some(timeline.run_id.clone()),
            steps: timeline.steps,
            start_step,
        },
        args.speed,
    )
    .await?;

    let initial = player.snapshot().await?;
    if !args.json {
        print_overview(&initial, &summary);
    }
    if args.no_play {
        if args.json {
            println!("{}", serde_json::to_string(&initial)?);
        }
        player.stop();
        handle.await?;
        return Ok(());
    }

    let mut updates = player.subscribe().await?;
    print_snapshot(&initial, args.json)?;
    let started = player.dispatch(ReplayAction::Play).await?;
    if !started.is_playing {
        info!(current_step_index = started.current_step_index, "Nothing left to play");
    }

    let mut last_index = initial.current_step_index;
    while updates.borrow().is_playing {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();
                if snapshot.current_step_index != last_index {
                    last_index = snapshot.current_step_index;
                    print_snapshot(&snapshot, args.json)?;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping replay");
                break;
            }
        }
    }

    player.stop();
    handle.await?;
    Ok(())
}

/// Spawn the player and apply the requested speed. A rejected speed stops
/// the player before the error is returned.
async fn start_player(
    args: ReplayPlayerArguments,
    speed: Option<f64>,
) -> anyhow::Result<(ReplayPlayer, JoinHandle<()>)> {
    let (player, handle) = ReplayPlayer::spawn(args).await?;
    if let Some(multiplier) = speed {
        if let Err(err) = player.set_speed_multiplier(multiplier).await {
            player.stop();
            handle.await?;
            return Err(err.into());
        }
    }
    Ok((player, handle))
}

fn parse_step_arg(raw: &str) -> Result<i64, String> {
    parse_step_value(raw).ok_or_else(|| format!("'{raw}' is not an integer step index"))
}

fn print_overview(snapshot: &ReplaySnapshot, summary: &shared_types::TimelineSummary) {
    println!(
        "run {} | {} steps ({} memory, {} compliance, {} x402, {} tool calls) | {} failures | {} agents",
        snapshot.run_id.as_deref().unwrap_or("-"),
        summary.total_steps,
        summary.memory_steps,
        summary.compliance_steps,
        summary.x402_steps,
        summary.tool_call_steps,
        summary.failures,
        summary.agent_count,
    );
    if let Some(duration_ms) = summary.duration_ms {
        println!("span {:.1}s", duration_ms as f64 / 1000.0);
    }
    if summary.skipped_records > 0 {
        println!("{} malformed records skipped", summary.skipped_records);
    }

    for node in &snapshot.agent_nodes {
        println!(
            "  [{}] {} steps {}..={} ({})",
            node.status.as_str(),
            node.agent_role,
            node.first_step_index,
            node.last_step_index,
            node.steps.len()
        );
    }
    for edge in &snapshot.flow_edges {
        println!("  {} -> {}: {}", edge.from, edge.to, edge.label);
    }
}

fn print_snapshot(snapshot: &ReplaySnapshot, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string(snapshot)?);
        return Ok(());
    }
    if snapshot.phase == ReplayPhase::Idle {
        println!("(no steps)");
        return Ok(());
    }
    if let Some(step) = &snapshot.current_step {
        let marker = if step.is_failure() { "!" } else { " " };
        println!(
            "{marker} {:>4}/{} {} {:<14} {}",
            step.index + 1,
            snapshot.total_steps,
            step.timestamp.format("%H:%M:%S%.3f"),
            step.agent_role,
            describe_step(step)
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_flag_saturates_huge_values() {
        let args = Args::try_parse_from(["replay", "run.json", "--step", "99999999999999999999"])
            .expect("huge step accepted");
        assert_eq!(args.step, Some(i64::MAX));

        let args = Args::try_parse_from(["replay", "run.json", "--step", "-3"]).expect("negative step");
        assert_eq!(args.step, Some(-3));

        assert!(Args::try_parse_from(["replay", "run.json", "--step", "last"]).is_err());
    }

    #[tokio::test]
    async fn test_rejected_speed_returns_error_after_teardown() {
        let err = start_player(ReplayPlayerArguments::default(), Some(3.0))
            .await
            .expect_err("3x is not a supported speed");
        assert!(err.to_string().contains("unsupported playback speed 3"));
    }

    #[tokio::test]
    async fn test_supported_speed_is_applied() {
        let (player, handle) = start_player(ReplayPlayerArguments::default(), Some(0.5))
            .await
            .expect("player started");
        let snapshot = player.snapshot().await.expect("snapshot");
        assert_eq!(snapshot.playback_speed, shared_types::PlaybackSpeed::Half);
        player.stop();
        handle.await.expect("player task");
    }
}
