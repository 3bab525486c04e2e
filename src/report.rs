// src/report.rs

//! Rendering grading results for the terminal or for machines.

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde_json::{json, Value};
use std::fmt::Write as _;
use std::io::IsTerminal;

use crate::activity::{Activity, Correction, CorrectionState};
use crate::engine::events::GradingEvent;
use crate::score::{ActivitySummary, Standing};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputMode {
    /// Human-readable text
    #[default]
    Simple,
    /// One-line JSON
    Json,
    /// Indented JSON
    Pretty,
}

pub fn render(
    activity: &Activity,
    summary: &ActivitySummary,
    events: &[GradingEvent],
    mode: OutputMode,
    use_color: bool,
) -> Result<String> {
    match mode {
        OutputMode::Simple => Ok(format_simple(activity, summary, use_color)),
        OutputMode::Json => serde_json::to_string(&envelope(activity, summary, events))
            .context("Failed to format report as JSON"),
        OutputMode::Pretty => serde_json::to_string_pretty(&envelope(activity, summary, events))
            .context("Failed to format report as pretty JSON"),
    }
}

fn envelope(activity: &Activity, summary: &ActivitySummary, events: &[GradingEvent]) -> Value {
    json!({
        "ok": summary.all_correct(),
        "title": activity.title,
        "summary": summary,
        "questions": activity.questions,
        "events": events,
    })
}

fn format_simple(activity: &Activity, summary: &ActivitySummary, use_color: bool) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "{}", activity.title);
    let _ = writeln!(
        out,
        "{}",
        paint(
            &format!(
                "Correct: {} of {} ({} pts)",
                summary.correct, summary.total, summary.points
            ),
            summary.standing,
            use_color
        )
    );

    for (question, qs) in activity.questions.iter().zip(&summary.questions) {
        out.push('\n');
        let mut heading = question.description.clone();
        if let Some(points) = qs.points {
            let _ = write!(heading, " ({} pts)", points);
        }
        let _ = writeln!(out, "{}", heading);

        let mut tally = format!("Correct: {} of {}", qs.correct, qs.total);
        if qs.fully_correct {
            if let Some(points) = qs.points {
                let _ = write!(tally, " (+{} pts)", points);
            }
        }
        let _ = writeln!(out, "  {}", paint(&tally, qs.standing, use_color));

        for (i, correction) in question.corrections.iter().enumerate() {
            format_correction(&mut out, i + 1, correction, use_color);
        }
    }

    out.trim_end().to_string()
}

fn format_correction(out: &mut String, number: usize, correction: &Correction, use_color: bool) {
    let state = correction.state();

    let _ = writeln!(out, "  [{}] Command: {}", number, correction.command_line());
    if !correction.stdin.is_empty() {
        let _ = writeln!(out, "      Input:");
        push_indented(out, &correction.stdin);
    }

    let standing = match state {
        CorrectionState::Correct(_) => Standing::All,
        CorrectionState::Incorrect(_) => Standing::None,
        CorrectionState::NotRun | CorrectionState::Running => Standing::Some,
    };
    let _ = writeln!(
        out,
        "      Result: {}",
        paint(state.label(), standing, use_color)
    );

    if let Some(result) = state.result() {
        if !result.stdout.is_empty() {
            let _ = writeln!(out, "      Output:");
            push_indented(out, &result.stdout);
        }
        if !result.stderr.is_empty() {
            let _ = writeln!(out, "      Error ({}):", result.exit_code);
            push_indented(out, &result.stderr);
        }
    }
}

fn push_indented(out: &mut String, text: &str) {
    for line in text.trim_end_matches('\n').lines() {
        let _ = writeln!(out, "        {}", line);
    }
}

/// Colour only when stdout is a terminal and `NO_COLOR` is unset.
pub fn should_use_color() -> bool {
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }
    std::io::stdout().is_terminal()
}

fn paint(text: &str, standing: Standing, use_color: bool) -> String {
    if !use_color {
        return text.to_string();
    }
    let color = match standing {
        Standing::All => "32",
        Standing::Some => "33",
        Standing::None => "31",
    };
    format!("\x1b[{}m{}\x1b[0m", color, text)
}
