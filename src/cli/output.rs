//! CLI output formatting

use crate::{
    core::{ExecutionStatus, StateId},
    execution::ExecutionEvent,
    persistence::ExecutionSummary,
};
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "!");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

/// Create a progress bar over a batch of runs
pub fn create_progress_bar(total: usize) -> ProgressBar {
    let progress = ProgressBar::new(total as u64);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    progress.set_style(style);
    progress.enable_steady_tick(Duration::from_millis(100));
    progress
}

/// Format an execution status for display
pub fn format_status(status: ExecutionStatus) -> String {
    match status {
        ExecutionStatus::Pending => style("PENDING").dim().to_string(),
        ExecutionStatus::Running => style("RUNNING").yellow().to_string(),
        ExecutionStatus::Succeeded => style("SUCCEEDED").green().to_string(),
        ExecutionStatus::Failed => style("FAILED").red().to_string(),
    }
}

/// Visited states joined with arrows
pub fn format_path(path: &[StateId]) -> String {
    path.iter()
        .map(StateId::as_str)
        .collect::<Vec<_>>()
        .join(" → ")
}

fn short_id(id: &uuid::Uuid) -> String {
    id.to_string()[..8].to_string()
}

/// Format execution summary for display
pub fn format_execution_summary(summary: &ExecutionSummary) -> String {
    let status_icon = match summary.status {
        ExecutionStatus::Succeeded => CHECK,
        ExecutionStatus::Failed => CROSS,
        ExecutionStatus::Running => SPINNER,
        ExecutionStatus::Pending => INFO,
    };

    let mut line = format!(
        "{} {} - {} - {} - {}",
        status_icon,
        style(short_id(&summary.execution_id)).dim(),
        style(&summary.run_name).bold(),
        format_status(summary.status),
        style(summary.path.last().map(StateId::as_str).unwrap_or("-")).cyan()
    );
    if let Some(failed) = summary.failed_state {
        line.push_str(&format!(" (failed at {})", style(failed).red()));
    }
    line
}

/// Format an execution event for display
pub fn format_execution_event(event: &ExecutionEvent, error_threshold: f64) -> String {
    match event {
        ExecutionEvent::RunStarted {
            execution_id,
            run_name,
        } => format!(
            "{} Starting run {} ({})",
            ROCKET,
            style(run_name).bold(),
            style(short_id(execution_id)).dim()
        ),
        ExecutionEvent::StateEntered {
            execution_id,
            state,
        } => format!(
            "{} {} {}",
            SPINNER,
            style(short_id(execution_id)).dim(),
            style(state.display_name(error_threshold)).cyan()
        ),
        ExecutionEvent::StepSucceeded {
            execution_id,
            state,
        } => format!(
            "{} {} {}",
            CHECK,
            style(short_id(execution_id)).dim(),
            style(state.display_name(error_threshold)).green()
        ),
        ExecutionEvent::GateEvaluated {
            execution_id,
            state,
            passed,
            next,
        } => format!(
            "{} {} {} {} → {}",
            INFO,
            style(short_id(execution_id)).dim(),
            style(state.display_name(error_threshold)).bold(),
            if *passed {
                style("yes").green().to_string()
            } else {
                style("no").yellow().to_string()
            },
            style(next.display_name(error_threshold)).cyan()
        ),
        ExecutionEvent::StepFailed {
            execution_id,
            state,
            error,
        } => format!(
            "{} {} {}: {}",
            CROSS,
            style(short_id(execution_id)).dim(),
            style(state.display_name(error_threshold)).red(),
            style(error).dim()
        ),
        ExecutionEvent::RunCompleted {
            execution_id,
            status,
        } => {
            let status_str = match status {
                ExecutionStatus::Succeeded => format!("{} completed", style("successfully").green()),
                ExecutionStatus::Failed => style("failed").red().to_string(),
                other => format!("{}", other),
            };
            format!(
                "{} Run ({}) {}",
                INFO,
                style(short_id(execution_id)).dim(),
                status_str
            )
        }
    }
}

pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
