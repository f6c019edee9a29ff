//! Watch mode command.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use owo_colors::OwoColorize;
use tokio::sync::Notify;

use devflow_core::debounce::DEFAULT_DEBOUNCE;
use devflow_core::{ShellSpawner, Verb, WatchEvent, WatchOptions, WatchRunner};

use crate::formatting::{
    print_error, print_key_value, print_section_header, print_separator, print_warning,
    SectionStyle,
};

use super::{create_runtime, load_config, requested};

pub fn cmd_watch(
    dir: PathBuf,
    commands: Vec<String>,
    path: Option<PathBuf>,
    ignore: Vec<String>,
    debounce_ms: Option<u64>,
) -> Result<()> {
    let config = load_config(&dir)?;

    let mut ignore_patterns = config.watch.ignore.clone();
    ignore_patterns.extend(ignore);
    let debounce = debounce_ms
        .or(config.watch.debounce_ms)
        .map(Duration::from_millis)
        .unwrap_or(DEFAULT_DEBOUNCE);

    let options = WatchOptions {
        command: config.resolve(Verb::Watch, requested(commands)),
        path: path.or_else(|| config.watch.path.clone()),
        context: Some(dir),
        ignore: ignore_patterns,
        debounce,
    };

    let mut runner =
        WatchRunner::new(options, Arc::new(ShellSpawner::new()))?.with_event_handler(print_event);

    let stop = Arc::new(Notify::new());
    let stop_clone = Arc::clone(&stop);
    ctrlc::set_handler(move || {
        stop_clone.notify_one();
    })
    .map_err(|e| anyhow::anyhow!("Failed to set signal handler: {}", e))?;

    print_section_header("Watch Mode", SectionStyle::Primary);
    print_key_value("Watching", &runner.path().display().to_string());
    print_key_value("Command", &runner.commands().join(" & "));
    print_key_value("Debounce", &format!("{}ms", debounce.as_millis()));
    println!("  Press Ctrl+C to stop");
    println!();

    let rt = create_runtime()?;
    rt.block_on(runner.run_until(stop.notified()))?;

    println!();
    print_warning("Stopped watch mode");
    Ok(())
}

fn print_event(event: WatchEvent) {
    match event {
        WatchEvent::Started { first: false, .. } => print_separator(),
        WatchEvent::Output {
            command_index,
            line,
            is_stderr,
            ..
        } => {
            let prefix = format!("[{}]", command_index + 1);
            if is_stderr {
                eprintln!("  {} {}", prefix.bright_black().bold(), line.bright_red());
            } else {
                println!("  {} {}", prefix.bright_black().bold(), line);
            }
        }
        WatchEvent::Exited {
            command_index,
            code: Some(code),
            ..
        } if code != 0 => {
            print_warning(&format!("[{}] exited with status {}", command_index + 1, code));
        }
        WatchEvent::SpawnFailed {
            command_index,
            message,
            ..
        } => print_error(&format!("[{}] {}", command_index + 1, message)),
        _ => {}
    }
}
