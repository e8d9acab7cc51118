//! Console output for the `xpdemo` subcommands.
//!
//! Progress goes to stdout. `tracing` logs go to stderr.

use std::fmt::Display;
use std::time::Duration;

use colored::{ColoredString, Colorize};
use indicatif::{ProgressBar, ProgressStyle};

const RULE_WIDTH: usize = 70;

fn mark(symbol: ColoredString, message: impl Display) {
    println!("{symbol} {message}");
}

pub fn print_banner() {
    println!();
    println!("  {}", "Crossplane AWS Demo".cyan().bold());
    println!(
        "  {}",
        "VPC · Security Groups · RDS · S3 · Web workload".bright_black()
    );
    println!();
}

pub fn print_section(title: &str) {
    let rule = "═".repeat(RULE_WIDTH);
    println!();
    println!("{}", rule.bright_black());
    println!("{}", title.cyan().bold());
    println!("{}", rule.bright_black());
    println!();
}

/// Header for one cleanup category or install step.
pub fn print_step(message: &str) {
    mark("▶".cyan(), message.bold());
}

/// Install step header, prefixed with `[current/total]`.
pub fn print_progress_step(current: u8, total: u8, message: &str) {
    print!("{} ", format!("[{current}/{total}]").bright_black());
    print_step(message);
}

pub fn print_success(message: &str) {
    mark("✓".green().bold(), message.green());
}

pub fn print_warning(message: &str) {
    mark("⚠".yellow().bold(), message.yellow());
}

pub fn print_error(message: &str) {
    mark("✗".red().bold(), message.red());
}

pub fn print_info(message: &str) {
    mark("ℹ".blue().bold(), message);
}

/// Indented sub-step line.
pub fn print_progress(message: &str) {
    print!("  ");
    mark("→".cyan(), message);
}

/// Outcome of one tool check or readiness wait.
pub fn print_check_result(name: &str, passed: bool, detail: Option<&str>) {
    let symbol = if passed { "✓".green() } else { "✗".red() };
    print!("  ");
    match detail {
        Some(detail) => mark(symbol, format_args!("{name} - {detail}")),
        None => mark(symbol, name),
    }
}

pub fn print_kv(key: &str, value: &str) {
    println!("  {} {}", format!("{key}:").bright_black(), value.green());
}

/// Spinner shown while blocking on a readiness wait.
///
/// Hidden automatically when stderr is not a terminal.
#[must_use]
pub fn spinner(message: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("  {spinner:.cyan} {msg} {elapsed:.dim}") {
        bar.set_style(style);
    }
    bar.set_message(message.to_string());
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spinner_carries_message() {
        let bar = spinner("Waiting for vpc");
        assert_eq!(bar.message(), "Waiting for vpc");
        bar.finish_and_clear();
        assert!(bar.is_finished());
    }
}
