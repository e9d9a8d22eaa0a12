use colored::*;
use indicatif::{ProgressBar, ProgressStyle};

/// Spinner for long-running steps.
pub fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.set_message(message.to_string());
    pb
}

/// Print a success message with green checkmark
pub fn success(message: &str) {
    println!("{} {}", "✓".bright_green().bold(), message.bright_green());
}

/// Print a warning message with yellow warning icon
pub fn warning(message: &str) {
    println!("{} {}", "⚠".bright_yellow().bold(), message.yellow());
}

/// Print an info message with blue info icon
pub fn info(message: &str) {
    println!("{} {}", "ℹ".bright_blue().bold(), message);
}

/// Format file size in human-readable format
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];

    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", size as u64, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}

/// Create a table-style output for key-value pairs
pub fn print_table(title: &str, items: &[(String, String)]) {
    if !title.is_empty() {
        println!("{}", title.bright_blue().bold());
    }

    let max_key_width = items.iter().map(|(k, _)| k.len()).max().unwrap_or(0);

    for (key, value) in items {
        println!(
            "  {:<width$} {}",
            key.dimmed(),
            value,
            width = max_key_width
        );
    }
}
