//! Output formatting utilities

use crate::error::CliResult;
use colored::*;
use idempotence::SuiteReport;

/// Output format for reports
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable report
    #[default]
    Text,
    /// JSON format
    Json,
    /// YAML format
    Yaml,
}

/// Print a report in the requested format
pub fn print_report(report: &SuiteReport, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Text => {
            print!("{}", report.to_text());
            let summary = &report.summary;
            if !summary.idempotent {
                print_error(&format!(
                    "{} of {} probe(s) broke idempotence",
                    summary.failed, summary.total
                ));
            } else if summary.warned > 0 {
                print_warning(&format!(
                    "Idempotent, with {} tolerated failure(s)",
                    summary.warned
                ));
            } else if summary.skipped == summary.total {
                print_info("Nothing verified: every probe was skipped");
            } else {
                print_success("All verified probes are idempotent");
            }
        }
        OutputFormat::Json => println!("{}", report.to_json()?),
        OutputFormat::Yaml => print!("{}", report.to_yaml()?),
    }
    Ok(())
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue(), message);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_default() {
        assert_eq!(OutputFormat::default(), OutputFormat::Text);
    }
}
