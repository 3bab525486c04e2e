// src/runner.rs

use crate::activity::Activity;
use crate::cli::{Cli, Command};
use crate::config::load_activity;
use crate::engine::events::GradingEvent;
use crate::engine::sink::EventSink;
use crate::engine::Grader;
use crate::report::{render, should_use_color, OutputMode};
use crate::sinks::{CollectingEventSink, TracingEventSink};

use anyhow::{bail, Context, Result};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Events arriving this close together trigger a single re-grade.
const WATCH_DEBOUNCE: Duration = Duration::from_millis(150);

#[derive(Debug, Clone)]
struct GradeOptions {
    question: Option<usize>,
    output: OutputMode,
    jobs: Option<usize>,
}

/// Entry point from `main.rs`.
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Init => init_scaffold(),

        Command::Validate { config } => validate(&config),

        Command::Grade {
            config,
            question,
            output,
            jobs,
            watch,
        } => {
            let opts = GradeOptions {
                question,
                output,
                jobs,
            };

            if watch {
                grade_with_watch(&config, &opts).await
            } else {
                let activity = load(&config)?;
                if !grade(activity, &opts).await? {
                    bail!("Grading failed: not every question is fully correct");
                }
                Ok(())
            }
        }
    }
}

fn load(config: &Path) -> Result<Activity> {
    load_activity(config).with_context(|| format!("Unable to load activity from {:?}", config))
}

/* ---------------- validate ---------------- */

fn validate(config: &Path) -> Result<()> {
    let activity = load(config)?;
    let corrections: usize = activity
        .questions
        .iter()
        .map(|q| q.corrections.len())
        .sum();

    println!(
        "OK: {} ({} questions, {} corrections)",
        activity.title,
        activity.questions.len(),
        corrections
    );
    Ok(())
}

/* ---------------- core grading ---------------- */

/// Sends every event to the log and keeps a copy for the JSON report.
#[derive(Default)]
struct ReportSink {
    collected: CollectingEventSink,
    log: TracingEventSink,
}

impl EventSink for ReportSink {
    fn emit(&self, event: GradingEvent) {
        self.log.emit(event.clone());
        self.collected.emit(event);
    }
}

/// Grade and print the report. Returns whether everything graded passed.
async fn grade(activity: Activity, opts: &GradeOptions) -> Result<bool> {
    let sink = Arc::new(ReportSink::default());
    let mut grader = Grader::new(activity, sink.clone());
    if let Some(jobs) = opts.jobs {
        grader = grader.with_jobs(jobs);
    }

    let passed = match opts.question {
        Some(number) => {
            let index = number
                .checked_sub(1)
                .context("Questions are numbered from 1")?;
            grader.run_question(index).await?.fully_correct
        }
        None => grader.run_all().await.all_correct(),
    };

    // Summary is recomputed only after every run above has been joined.
    let summary = grader.summary();
    let rendered = render(
        grader.activity(),
        &summary,
        &sink.collected.events(),
        opts.output,
        should_use_color(),
    )?;
    println!("{}", rendered);

    Ok(passed)
}

/* ---------------- watch mode ---------------- */

async fn grade_with_watch(config: &Path, opts: &GradeOptions) -> Result<()> {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

    loop {
        clear_screen();

        let mut watcher: RecommendedWatcher = {
            let tx = tx.clone();
            notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
                let _ = tx.send(res);
            })
            .context("Failed to initialise file watcher")?
        };

        // Always watch the config itself
        watcher
            .watch(config, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch {:?}", config))?;

        // Reload config each run so edits apply immediately
        match load(config) {
            Ok(activity) => {
                for script in script_paths(&activity) {
                    if let Err(e) = watcher.watch(&script, RecursiveMode::NonRecursive) {
                        tracing::warn!(
                            script = %script.display(),
                            error = %e,
                            "not watching script"
                        );
                    }
                }

                match grade(activity, opts).await {
                    Ok(true) => eprintln!("OK"),
                    Ok(false) => eprintln!("FAILED"),
                    Err(e) => eprintln!("Error: {e:#}"),
                }
            }
            Err(e) => eprintln!("Error: {e:#}"),
        }

        // Block until something changes, then swallow the burst
        if rx.recv().await.is_none() {
            return Ok(());
        }
        tokio::time::sleep(WATCH_DEBOUNCE).await;
        while rx.try_recv().is_ok() {}

        drop(watcher);
    }
}

/// Distinct script files of the activity, as the processes will see them.
fn script_paths(activity: &Activity) -> BTreeSet<PathBuf> {
    activity
        .questions
        .iter()
        .flat_map(|q| &q.corrections)
        .map(|c| match &c.workdir {
            Some(dir) => dir.join(&c.script),
            None => PathBuf::from(&c.script),
        })
        .collect()
}

fn clear_screen() {
    print!("\x1b[2J\x1b[H");
    let _ = std::io::stdout().flush();
}

/* ---------------- init ---------------- */

fn init_scaffold() -> Result<()> {
    write_if_missing(Path::new("config.yaml"), default_config_yaml())?;

    let scripts = Path::new("scripts");
    std::fs::create_dir_all(scripts)
        .with_context(|| format!("Failed to create directory {:?}", scripts))?;
    write_if_missing(&scripts.join("hello.sh"), default_script())?;

    Ok(())
}

fn write_if_missing(path: &Path, content: &str) -> Result<()> {
    if path.exists() {
        eprintln!("{} already exists (skipping)", path.display());
        return Ok(());
    }
    std::fs::write(path, content).with_context(|| format!("Failed to write {:?}", path))?;
    eprintln!("Created {}", path.display());
    Ok(())
}

fn default_config_yaml() -> &'static str {
    r#"titulo: Example activity

# Defaults below are inherited by every question and correction
comando: sh
msg_erro: Unexpected output.
func_expect: regex_match

questoes:
  - descricao: Greets by name
    pontos: 1
    script: scripts/hello.sh
    verificacoes:
      - args_expect: "^Hello, "
    correcoes:
      - args: Ada
        mais_verificacoes:
          - args_expect: "Ada!$"
      - entrada: |
          Grace
        mais_verificacoes:
          - args_expect: "Grace!$"
          - func_expect: not_regex_match
            args_expect: Ada
"#
}

fn default_script() -> &'static str {
    r#"#!/bin/sh
name="$1"
if [ -z "$name" ]; then
  read -r name
fi
echo "Hello, $name!"
"#
}
