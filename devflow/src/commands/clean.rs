//! Removal of build output.

use std::path::PathBuf;

use anyhow::Result;
use owo_colors::OwoColorize;

use devflow_core::clean_paths;

use crate::formatting::{print_section_header, print_success, print_warning, SectionStyle};

use super::load_config;

pub fn cmd_clean(dir: PathBuf, paths: Vec<PathBuf>, dry_run: bool) -> Result<()> {
    let config = load_config(&dir)?;
    let paths = if paths.is_empty() {
        config.clean.paths
    } else {
        paths
    };

    if dry_run {
        print_section_header("Clean (dry run)", SectionStyle::Warning);
        for path in &paths {
            let target = dir.join(path);
            let marker = if target.exists() {
                "would remove".yellow().to_string()
            } else {
                "missing".bright_black().to_string()
            };
            println!("  {} {}", marker, target.display());
        }
        println!();
        return Ok(());
    }

    print_section_header("Cleaning", SectionStyle::Primary);
    let removed = clean_paths(&dir, &paths)?;
    if removed.is_empty() {
        print_warning("Nothing to clean");
    } else {
        for path in &removed {
            println!("  {} {}", "→".cyan(), path.display().bright_black());
        }
        println!();
        print_success(&format!("Removed {} path(s)", removed.len()));
    }
    println!();

    Ok(())
}
