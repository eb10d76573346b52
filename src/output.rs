//! Output formatting and styling module.
//!
//! All terminal output of the binary goes through [`OutputFormatter`], so the
//! engine itself never prints.

use crate::organizer::{OrganizationPlan, PlanAction, RunReport};
use crate::undo::UndoReport;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Manages all CLI output with consistent styling and formatting.
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use dirsort::output::OutputFormatter;
    /// OutputFormatter::success("Files organized");
    /// ```
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message in red with an X mark.
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Prints a warning message in yellow with a warning symbol.
    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    /// Creates a progress bar for `total` files.
    pub fn create_progress_bar(total: u64) -> ProgressBar {
        let pb = ProgressBar::new(total);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░");
        pb.set_style(style);
        pb
    }

    /// Prints file counts per category.
    ///
    /// ```no_run
    /// use dirsort::output::OutputFormatter;
    /// use std::collections::BTreeMap;
    ///
    /// let mut counts = BTreeMap::new();
    /// counts.insert("Documents".to_string(), 15);
    /// counts.insert("Images".to_string(), 8);
    /// OutputFormatter::summary_table(&counts, 23);
    /// ```
    pub fn summary_table(category_counts: &BTreeMap<String, usize>, total_files: usize) {
        Self::header("SUMMARY");

        let width = category_counts
            .keys()
            .map(|name| name.len())
            .max()
            .unwrap_or(0)
            .max(8);

        println!("{:<width$} | {}", "Category".bold(), "Files".bold());
        println!("{}", "-".repeat(width + 10));
        for (category, count) in category_counts {
            println!(
                "{:<width$} | {} {}",
                category,
                count.to_string().green(),
                plural(*count)
            );
        }
        println!("{}", "-".repeat(width + 10));
        println!(
            "{:<width$} | {} {}",
            "Total".bold(),
            total_files.to_string().green().bold(),
            plural(total_files)
        );
    }

    pub fn dry_run_notice(message: &str) {
        println!("{}", format!("[DRY RUN] {}", message).yellow());
    }

    /// Prints every planned move, then the plan statistics.
    pub fn print_plan(plan: &OrganizationPlan, target: &Path) {
        if plan.is_empty() {
            Self::info("No files found to organize.");
            return;
        }

        Self::dry_run_notice("Files would be organized as follows:");
        for entry in &plan.entries {
            println!(" - {}", entry.record.path.display());
            match &entry.action {
                PlanAction::Move => {
                    println!("   → {}", relative_to(&entry.destination, target));
                }
                PlanAction::Replace => {
                    println!(
                        "   → {} {}",
                        relative_to(&entry.destination, target),
                        "(replaces existing)".yellow()
                    );
                }
                PlanAction::Skip { reason } => println!("   {} {}", "skip:".yellow(), reason),
                PlanAction::Unresolved(error) => println!("   {} {}", "error:".red(), error.message),
            }
        }

        Self::summary_table(&plan.category_counts(), plan.len());
        println!(
            "\n{} moves, {} skips, {} unresolved, {} junk, {}",
            plan.move_count(),
            plan.skip_count(),
            plan.unresolved().count(),
            plan.junk_count(),
            format_bytes(plan.total_bytes())
        );
        if plan.protected_count() > 0 {
            Self::warning(&format!(
                "{} files are inside protected folders and will not be moved",
                plan.protected_count()
            ));
        }
        if plan.duplicate_group_count() > 0 {
            println!(
                "{} groups of files with identical content",
                plan.duplicate_group_count()
            );
        }
    }

    /// Prints each group of identical files.
    pub fn print_duplicate_groups(groups: &[Vec<PathBuf>]) {
        if groups.is_empty() {
            Self::success("No duplicate files found.");
            return;
        }

        Self::header("DUPLICATES");
        for (i, group) in groups.iter().enumerate() {
            println!("{} ({} files)", format!("Group {}", i + 1).bold(), group.len());
            for path in group {
                println!("   {}", path.display());
            }
        }
        let redundant: usize = groups.iter().map(|group| group.len() - 1).sum();
        Self::info(&format!(
            "{} groups, {} redundant copies",
            groups.len(),
            redundant
        ));
    }

    /// Prints the extension table, one category per line.
    pub fn print_types(listing: &BTreeMap<&'static str, Vec<String>>) {
        Self::header("SUPPORTED FILE TYPES");
        for (category, extensions) in listing {
            println!(
                "{} ({}): {}",
                category.bold(),
                extensions.len(),
                extensions.join(", ")
            );
        }
        Self::info("Other extensions are identified by content, or go to Other.");
    }

    /// Prints the outcome of an executed run.
    pub fn print_report(report: &RunReport) {
        Self::header("RESULT");
        println!("  Moved:   {}", report.moved.to_string().green());
        println!("  Skipped: {}", report.skipped.to_string().yellow());
        println!("  Errors:  {}", report.errored.to_string().red());
        if report.removed_dirs > 0 {
            println!("  Removed empty folders: {}", report.removed_dirs);
        }
        println!("  Time:    {:.2?}", report.elapsed);

        for error in &report.errors {
            Self::error(&error.to_string());
        }
        if report.was_cancelled() {
            Self::warning(&format!(
                "Run cancelled after {} of {} files",
                report.processed(),
                report.total
            ));
        }
    }

    pub fn print_undo(report: &UndoReport) {
        Self::success(&format!("Restored {} files", report.restored));
        if !report.failures.is_empty() {
            Self::warning(&format!("{} files could not be restored:", report.failures.len()));
            for failure in &report.failures {
                eprintln!(
                    "    - {} → {}: {}",
                    failure.path.display(),
                    failure.original_path.display(),
                    failure.reason
                );
            }
        }
    }
}

fn plural(count: usize) -> &'static str {
    if count == 1 { "file" } else { "files" }
}

fn relative_to(path: &Path, base: &Path) -> String {
    path.strip_prefix(base).unwrap_or(path).display().to_string()
}

/// Formats a byte count with a binary unit.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
