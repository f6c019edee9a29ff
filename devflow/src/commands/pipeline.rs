//! One-shot pipeline commands: build, test, install, run and release.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Result};
use owo_colors::OwoColorize;
use tokio::sync::Notify;

use devflow_core::{
    CommandPipeline, Error, ExitPolicy, Job, PipelineEvent, PipelineOutcome, ShellSpawner, Verb,
};

use crate::formatting::{
    create_progress_bar, format_duration, print_command_table, print_error, print_key_value,
    print_section_header, print_success, print_summary_box, print_warning, CommandRow,
    SectionStyle, Status,
};

use super::{create_runtime, load_config, requested};

pub fn cmd_pipeline(dir: PathBuf, verb: Verb, commands: Vec<String>, strict: bool) -> Result<()> {
    let config = load_config(&dir)?;
    let set = config
        .resolve(verb, requested(commands))
        .ok_or_else(|| anyhow!("No command configured for '{}'", verb))?;

    let title = match verb {
        Verb::Build => "Building",
        Verb::Test => "Running tests",
        Verb::Install => "Installing dependencies",
        Verb::Release => "Releasing",
        Verb::Watch => "Running",
    };
    run_job(&dir, title, Job::from_set(&set), strict)
}

pub fn cmd_run(dir: PathBuf, commands: Vec<String>, strict: bool) -> Result<()> {
    if commands.iter().all(|c| c.trim().is_empty()) {
        return Err(anyhow!("No commands given"));
    }
    run_job(&dir, "Running", Job::new(commands), strict)
}

pub fn cmd_release(dir: PathBuf, tag: Option<String>, dry_run: bool, strict: bool) -> Result<()> {
    let config = load_config(&dir)?;
    let set = config
        .resolve(Verb::Release, None)
        .ok_or_else(|| anyhow!("No command configured for 'release'"))?;

    let mut commands = Vec::new();
    if let Some(tag) = tag {
        if tag.is_empty() || tag.chars().any(|c| c.is_whitespace() || c == '\'' || c == '"') {
            return Err(anyhow!("Invalid tag name: {:?}", tag));
        }
        commands.push(format!("git tag {}", tag));
    }
    commands.extend(set.commands());

    if dry_run {
        print_section_header("Release (dry run)", SectionStyle::Secondary);
        for (index, command) in commands.iter().enumerate() {
            println!("  {} {}", format!("[{}]", index + 1).bright_black().bold(), command);
        }
        println!();
        return Ok(());
    }

    run_job(&dir, "Releasing", Job::new(commands), strict)
}

fn run_job(dir: &Path, title: &str, job: Job, strict: bool) -> Result<()> {
    let start = Instant::now();
    let job = job.with_cwd(dir);
    let policy = if strict {
        ExitPolicy::Strict
    } else {
        ExitPolicy::Ignore
    };

    print_section_header(title, SectionStyle::Primary);
    print_key_value("Directory", &dir.display().to_string());
    print_key_value("Commands", &job.len().to_string());
    println!();

    // Commands share the terminal: they can prompt, and Ctrl-C reaches them too.
    let pipeline =
        CommandPipeline::new(Arc::new(ShellSpawner::foreground())).with_exit_policy(policy);

    let interrupt = Arc::new(Notify::new());
    let interrupt_clone = Arc::clone(&interrupt);
    ctrlc::set_handler(move || {
        interrupt_clone.notify_one();
    })
    .map_err(|e| anyhow!("Failed to set signal handler: {}", e))?;

    let pb = create_progress_bar(job.len() as u64);
    let mut rows: Vec<CommandRow> = Vec::with_capacity(job.len());

    let rt = create_runtime()?;
    let on_event = |event: PipelineEvent| match event {
        PipelineEvent::Started { index, command } => {
            pb.set_message(command.clone());
            pb.suspend(|| {
                println!("  {} {}", format!("[{}]", index + 1).bright_black().bold(), command.cyan().bold());
            });
        }
        PipelineEvent::Data { index, line } => pb.suspend(|| {
            println!("  {} {}", format!("[{}]", index + 1).bright_black().bold(), line);
        }),
        PipelineEvent::Error { index, line } => pb.suspend(|| {
            eprintln!("  {} {}", format!("[{}]", index + 1).bright_black().bold(), line.bright_red());
        }),
        PipelineEvent::Exited { index, code } => {
            pb.inc(1);
            let (status, detail) = match code {
                Some(0) => (Status::Success, String::new()),
                Some(code) => (Status::Warning, format!("exit status {}", code)),
                None => (Status::Warning, "terminated by signal".to_string()),
            };
            rows.push(CommandRow {
                command: job.commands()[index].clone(),
                status,
                detail,
            });
        }
    };
    let outcome = rt.block_on(pipeline.run_until(&job, on_event, interrupt.notified()));
    pb.finish_and_clear();

    if let PipelineOutcome::Failed {
        error: Error::Interrupted { command },
        ..
    } = &outcome
    {
        println!();
        print_warning(&format!("Interrupted while running '{}'", command));
        std::process::exit(130);
    }

    println!();
    if let PipelineOutcome::Failed { index, command, error } = &outcome {
        // Drop the failed command's own exit row, if it reported one.
        rows.truncate(*index);
        rows.push(CommandRow {
            command: command.clone(),
            status: Status::Error,
            detail: error.to_string(),
        });
        for skipped in &job.commands()[index + 1..] {
            rows.push(CommandRow {
                command: skipped.clone(),
                status: Status::Warning,
                detail: "skipped".to_string(),
            });
        }
    }
    print_command_table(&rows);
    println!();

    let duration_str = format_duration(start.elapsed().as_secs_f64());
    print_summary_box("Summary", &[("Duration", &duration_str)]);
    println!();

    match outcome {
        PipelineOutcome::Success => {
            print_success(&format!("{} command(s) finished", job.len()));
            Ok(())
        }
        PipelineOutcome::Failed { command, error, .. } => {
            print_error(&format!("'{}' failed: {}", command, error));
            std::process::exit(1);
        }
    }
}
