//! Command-line interface for dirsort.
//!
//! Parses arguments, merges them over the configuration file, and drives an
//! [`Organizer`] on its background worker while showing progress.

use crate::config::{Configuration, DuplicateStrategy, OrganizationMode};
use crate::events::{self, Event, FileOutcome};
use crate::file_category::FileMapper;
use crate::organizer::Organizer;
use crate::output::OutputFormatter;
use crate::undo::UndoStack;
use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser};
use indicatif::ProgressBar;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// dirsort - sort files into category folders, with undo
///
/// Scans the source folders, classifies every file by type, date, size, or
/// extension, and moves it into a matching folder under the target.
#[derive(Parser, Debug)]
#[command(name = "dirsort")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Source folders to organize
    #[arg(required_unless_present_any = ["undo", "types"])]
    pub sources: Vec<PathBuf>,

    /// Folder that receives the organized files
    #[arg(short, long)]
    pub target: Option<PathBuf>,

    /// How files are grouped
    #[arg(short, long, value_enum)]
    pub mode: Option<OrganizationMode>,

    /// What to do when a destination name is taken
    #[arg(short, long, value_enum)]
    pub duplicates: Option<DuplicateStrategy>,

    /// Files at or below this many bytes count as junk (by-type mode)
    #[arg(long)]
    pub junk_threshold: Option<u64>,

    /// Show what would be done without moving anything
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Only look at files directly inside the source folders
    #[arg(long)]
    pub no_recursive: bool,

    /// Remove folders left empty in the sources after the run
    #[arg(long)]
    pub remove_empty_dirs: bool,

    /// Additional folder whose files must never be moved
    #[arg(long = "protect", value_name = "DIR")]
    pub protect: Vec<PathBuf>,

    /// Path to configuration file (TOML format)
    #[arg(short = 'C', long)]
    pub config: Option<PathBuf>,

    /// Write the effective configuration to this file
    #[arg(long, value_name = "FILE")]
    pub save_config: Option<PathBuf>,

    /// Revert the last run recorded in the target folder
    #[arg(long, conflicts_with = "dry_run")]
    pub undo: bool,

    /// List the supported file types per category and exit
    #[arg(long, conflicts_with_all = ["undo", "cleanup"])]
    pub types: bool,

    /// Only remove empty folders from the sources
    #[arg(long, conflicts_with = "undo")]
    pub cleanup: bool,

    /// Report groups of files with identical content, without moving anything
    #[arg(long, conflicts_with_all = ["undo", "cleanup"])]
    pub find_duplicates: bool,

    /// Also write logs to this file
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Applies the command-line arguments over `config`.
    pub fn merge_with_config(&self, mut config: Configuration) -> Configuration {
        if !self.sources.is_empty() {
            config.sources = self.sources.clone();
        }
        if let Some(ref target) = self.target {
            config.target = target.clone();
        }
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(duplicates) = self.duplicates {
            config.duplicates = duplicates;
        }
        if let Some(junk_threshold) = self.junk_threshold {
            config.junk_threshold = junk_threshold;
        }
        if self.dry_run {
            config.dry_run = true;
        }
        if self.no_recursive {
            config.recursive = false;
        }
        if self.remove_empty_dirs {
            config.remove_empty_dirs = true;
        }
        if self.find_duplicates {
            config.find_duplicates = true;
        }
        config.protected_dirs.extend(self.protect.iter().cloned());

        config
    }
}

/// Runs the command described by `cli`.
pub fn run(cli: &Cli) -> Result<()> {
    let file_config =
        Configuration::load(cli.config.as_deref()).context("Error loading configuration")?;
    let config = cli.merge_with_config(file_config);

    if let Some(ref path) = cli.save_config {
        config
            .save(path)
            .with_context(|| format!("Error saving configuration to {}", path.display()))?;
        OutputFormatter::success(&format!("Configuration saved to {}", path.display()));
    }

    if cli.types {
        OutputFormatter::print_types(&FileMapper::default().extensions_by_category());
        return Ok(());
    }
    if cli.undo {
        return undo_last_run(&config.target);
    }
    if cli.cleanup {
        return cleanup(config);
    }
    if cli.find_duplicates {
        return find_duplicates(config);
    }
    if config.dry_run {
        return preview(config);
    }
    organize(config)
}

fn preview(config: Configuration) -> Result<()> {
    let target = config.target.clone();
    let organizer = Organizer::new(config);
    let plan = organizer.plan()?;

    OutputFormatter::print_plan(&plan, &target);
    OutputFormatter::success("Dry run complete. No files were modified.");
    Ok(())
}

fn cleanup(config: Configuration) -> Result<()> {
    if config.dry_run {
        OutputFormatter::dry_run_notice("Empty folder cleanup skipped.");
        return Ok(());
    }
    let removed = Organizer::new(config).cleanup_empty_dirs()?;
    OutputFormatter::success(&format!("Removed {} empty folders", removed));
    Ok(())
}

fn find_duplicates(config: Configuration) -> Result<()> {
    let organizer = Organizer::new(config);
    let plan = organizer.plan()?;
    OutputFormatter::print_duplicate_groups(&plan.duplicate_groups);
    Ok(())
}

fn organize(config: Configuration) -> Result<()> {
    let target = config.target.clone();
    let (sender, receiver) = events::channel();
    let organizer = Organizer::new(config).with_events(sender);
    let handle = organizer.start()?;

    let pb = OutputFormatter::create_progress_bar(0);
    loop {
        match receiver.recv_timeout(Duration::from_millis(50)) {
            Some(event) => show_progress(&pb, event),
            None if handle.is_finished() => {
                while let Some(event) = receiver.try_recv() {
                    show_progress(&pb, event);
                }
                break;
            }
            None => {}
        }
    }

    let report = handle.join()?;
    pb.finish_and_clear();
    OutputFormatter::print_report(&report);

    if report.undo.is_empty() {
        return Ok(());
    }
    match report.undo.save(&target) {
        Ok(()) => {
            info!(target = %target.display(), "Saved run history");
            OutputFormatter::info(&format!(
                "History saved. Use 'dirsort --undo -t {}' to revert changes.",
                target.display()
            ));
        }
        Err(e) => OutputFormatter::warning(&format!("Could not save history: {}", e)),
    }
    Ok(())
}

fn show_progress(pb: &ProgressBar, event: Event) {
    match event {
        Event::PlanReady { entries } => pb.set_length(entries as u64),
        Event::FileProcessed {
            path,
            outcome,
            progress,
        } => {
            pb.set_position(progress.processed as u64);
            if let Some(name) = path.file_name() {
                pb.set_message(name.to_string_lossy().to_string());
            }
            if let FileOutcome::Failed { message } = outcome {
                pb.println(format!("✗ {}", message));
            }
        }
        _ => {}
    }
}

fn undo_last_run(target: &Path) -> Result<()> {
    if target.as_os_str().is_empty() {
        bail!("--undo needs the target folder of the run (-t)");
    }

    let Some(stack) = UndoStack::load(target)? else {
        OutputFormatter::info(&format!("No history found in {}", target.display()));
        return Ok(());
    };

    OutputFormatter::info(&format!("Undoing {} moves...", stack.len()));
    let report = stack.undo_all();
    OutputFormatter::print_undo(&report);

    if report.is_complete_success() {
        UndoStack::delete(target)?;
    } else {
        OutputFormatter::warning("History file was kept. Fix the issues above and try again.");
    }
    Ok(())
}
