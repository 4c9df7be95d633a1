//! Output formatting utilities

use console::style;
use rdebrid_core::BatchReport;

/// Format bytes as human-readable
pub fn format_bytes(bytes: u64) -> String {
    human_bytes::human_bytes(bytes as f64)
}

/// Format speed as human-readable
pub fn format_speed(bytes_per_sec: u64) -> String {
    format!("{}/s", human_bytes::human_bytes(bytes_per_sec as f64))
}

/// Size label for a file whose size may be unknown
pub fn format_size(size: Option<u64>) -> String {
    size.map(format_bytes).unwrap_or_else(|| "size unknown".to_string())
}

/// "N succeeded, M failed" for a finished batch
pub fn summary_counts(report: &BatchReport) -> String {
    format!(
        "{} succeeded, {} failed",
        report.completed.len(),
        report.failed.len()
    )
}

/// Print the end-of-run summary
pub fn print_summary(report: &BatchReport) {
    println!();
    if report.is_success() {
        println!(
            "{} Done! {}",
            style("✓").green().bold(),
            summary_counts(report)
        );
        return;
    }

    println!("{} {}", style("!").yellow().bold(), summary_counts(report));
    for failure in &report.failed {
        println!("  {} {}", style("✗").red(), failure.link);
        println!("    {}", style(&failure.error).red());
    }
}
