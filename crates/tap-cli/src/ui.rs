//! Terminal output.

use crossterm::style::Stylize;
use tap_core::{InstallStage, Reporter, Version};

/// Line-oriented reporter for interactive and CI use.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleReporter {
    quiet: bool,
}

impl ConsoleReporter {
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }
}

impl Reporter for ConsoleReporter {
    fn section(&self, title: &str) {
        if !self.quiet {
            println!("{}", title.bold());
        }
    }

    fn stage(&self, version: &Version, stage: InstallStage) {
        if self.quiet || stage == InstallStage::Done {
            return;
        }
        println!("  {} {} {}", "•".dark_grey(), stage, version.as_str().dark_grey());
    }

    fn downloading(&self, _version: &Version, current: u64, total: Option<u64>) {
        if self.quiet {
            return;
        }
        // One line once the body is complete; no redraws.
        if total == Some(current) && current > 0 {
            println!("  {} {}", "↓".dark_grey(), format_size(current).dark_grey());
        }
    }

    fn done(&self, version: &Version, detail: &str) {
        println!("{} {} installed to {}", "✓".green().bold(), version, detail);
    }

    fn failed(&self, version: &Version, reason: &str) {
        eprintln!("{} {} {}", "✗".red().bold(), version, reason.red());
    }

    fn info(&self, msg: &str) {
        if !self.quiet {
            println!("{msg}");
        }
    }

    fn warning(&self, msg: &str) {
        eprintln!("{} {}", "warning:".yellow().bold(), msg);
    }
}

/// Human readable byte count.
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}
